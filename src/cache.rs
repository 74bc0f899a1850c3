//! # Query Plan Cache
//!
//! Parsing SPARQL is far more expensive than looking up a string, and the
//! helper sees the same handful of query texts over and over. This cache maps
//! query text to an immutable, shared [`QueryPlan`].
//!
//! ```text
//! get(text) ──► lock ──► hit? ──yes──► Arc<QueryPlan>
//!                          │
//!                          no
//!                          ▼
//!               unlock, parse text
//!                          │
//!               ok ──► lock, insert ──► Arc<QueryPlan>
//!               err ─────────────────► Error::MalformedQuery (nothing cached)
//! ```
//!
//! # Rust Pattern: Parse Outside the Lock
//!
//! The mutex is only held for the map operations. Two threads that miss on
//! the same text at once may both parse it; the first insert wins and the
//! second thread returns the plan already in the map, so every caller still
//! sees one shared plan per text.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use lru::LruCache;
use tracing::trace;

use crate::plan::QueryPlan;
use crate::Result;

/// Default number of plans kept before the least recently used is evicted.
pub const DEFAULT_QUERY_CACHE_CAPACITY: usize = 1000;

/// Counters for cache behaviour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Successful and failed parse attempts.
    pub parses: u64,
}

/// Thread-safe LRU map from query text to parsed plan.
pub struct QueryPlanCache {
    plans: Mutex<LruCache<String, Arc<QueryPlan>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    parses: AtomicU64,
}

impl QueryPlanCache {
    /// Creates a cache holding at most `capacity` plans (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            plans: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            parses: AtomicU64::new(0),
        }
    }

    /// Process-wide cache with the default capacity.
    pub fn global() -> &'static QueryPlanCache {
        static GLOBAL: OnceLock<QueryPlanCache> = OnceLock::new();
        GLOBAL.get_or_init(QueryPlanCache::default)
    }

    /// Returns the plan for `text`, parsing it on first use.
    ///
    /// A query that fails to parse returns `Error::MalformedQuery` and leaves
    /// the cache untouched.
    pub fn get(&self, text: &str) -> Result<Arc<QueryPlan>> {
        if let Some(plan) = self.lock().get(text) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Arc::clone(plan));
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        self.parses.fetch_add(1, Ordering::Relaxed);
        let parsed = Arc::new(QueryPlan::parse(text)?);
        trace!(form = parsed.form().name(), "parsed query plan");

        let mut plans = self.lock();
        if let Some(existing) = plans.get(text) {
            return Ok(Arc::clone(existing));
        }
        plans.put(text.to_string(), Arc::clone(&parsed));
        Ok(parsed)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.lock().cap().get()
    }

    pub fn contains(&self, text: &str) -> bool {
        self.lock().contains(text)
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            parses: self.parses.load(Ordering::Relaxed),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<String, Arc<QueryPlan>>> {
        // A panic while holding the lock cannot leave the map half-updated.
        self.plans.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for QueryPlanCache {
    fn default() -> Self {
        Self::new(DEFAULT_QUERY_CACHE_CAPACITY)
    }
}

impl std::fmt::Debug for QueryPlanCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryPlanCache")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use std::thread;

    const ASK_ANY: &str = "ASK { ?s ?p ?o }";

    #[test]
    fn test_same_text_parses_once() {
        let cache = QueryPlanCache::new(8);

        let first = cache.get(ASK_ANY).expect("valid query");
        let second = cache.get(ASK_ANY).expect("valid query");

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(
            cache.stats(),
            CacheStats {
                hits: 1,
                misses: 1,
                parses: 1
            }
        );
    }

    #[test]
    fn test_malformed_query_is_not_cached() {
        let cache = QueryPlanCache::new(8);

        let err = cache.get("SELECT WHERE {").expect_err("malformed");
        assert!(matches!(err, Error::MalformedQuery { .. }));
        assert!(cache.is_empty());

        // Asking again parses again.
        let _ = cache.get("SELECT WHERE {");
        assert_eq!(cache.stats().parses, 2);
    }

    #[test]
    fn test_least_recently_used_is_evicted() {
        let cache = QueryPlanCache::new(2);
        cache.get("ASK { ?a ?b ?c }").expect("valid");
        cache.get("ASK { ?d ?e ?f }").expect("valid");
        cache.get("ASK { ?a ?b ?c }").expect("valid");
        cache.get("ASK { ?g ?h ?i }").expect("valid");

        assert_eq!(cache.len(), 2);
        assert!(cache.contains("ASK { ?a ?b ?c }"));
        assert!(!cache.contains("ASK { ?d ?e ?f }"));
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        assert_eq!(QueryPlanCache::new(0).capacity(), 1);
        assert_eq!(QueryPlanCache::default().capacity(), DEFAULT_QUERY_CACHE_CAPACITY);
    }

    #[test]
    fn test_concurrent_gets_share_one_plan() {
        let cache = Arc::new(QueryPlanCache::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || cache.get(ASK_ANY).expect("valid query"))
            })
            .collect();
        let plans: Vec<_> = handles
            .into_iter()
            .map(|h| h.join().expect("thread completes"))
            .collect();

        assert_eq!(cache.len(), 1);
        assert!(plans.iter().all(|p| Arc::ptr_eq(p, &plans[0])));
    }
}
