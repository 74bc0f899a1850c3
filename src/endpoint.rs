//! # Query Endpoints
//!
//! One interface over the places a query can run:
//!
//! ```text
//!                  ┌──────────────────┐
//!                  │  dyn Endpoint    │  select / process_select /
//!                  └────────┬─────────┘  construct / ask
//!            ┌──────────────┼───────────────────┐
//!            ▼              ▼                   ▼
//!     GraphEndpoint   StoreEndpoint      (remote service)
//!     RwLock<Graph>   Arc<TripleStore>   implement the trait
//! ```
//!
//! # Systems Concept: Transaction-Scoped Iteration
//!
//! For the durable store, pattern evaluation AND the per-row callback both
//! run inside one read transaction. Every row handed to a callback is an
//! owned [`Solution`], copied out of SQLite before the callback sees it, so
//! a caller may keep rows after the transaction (or the whole store) is
//! gone.
//!
//! The in-memory graph follows the same rule with its read lock standing in
//! for the transaction. A callback must therefore not write to the endpoint
//! it is reading from.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use oxrdf::{Graph, NamedNode, Subject, Term, Triple, TripleRef};

use crate::batch::Batch;
use crate::eval::{self, Bindings, Solution, TripleSource};
use crate::namespaces;
use crate::plan::QueryPlan;
use crate::progress::{ProgressLogger, DEFAULT_PROGRESS_INTERVAL};
use crate::store::TripleStore;
use crate::Result;

/// Row callback for [`Endpoint::process_select`].
pub type RowCallback<'a> = dyn FnMut(Solution) -> Result<()> + 'a;

/// A queryable backing store.
///
/// Implementations exist for an in-memory graph and the durable store. A
/// remote SPARQL service would implement the same four operations.
pub trait Endpoint: Send + Sync {
    /// Evaluates a SELECT plan and calls `on_row` once per row, returning the
    /// row count. `label` names the query in progress logs.
    ///
    /// The first error from `on_row` stops iteration and is returned.
    fn process_select(
        &self,
        label: &str,
        plan: &QueryPlan,
        bindings: &Bindings,
        on_row: &mut RowCallback<'_>,
    ) -> Result<u64>;

    /// Evaluates a SELECT plan and collects the rows.
    fn select(&self, plan: &QueryPlan, bindings: &Bindings) -> Result<Vec<Solution>> {
        let mut rows = Vec::new();
        self.process_select("select", plan, bindings, &mut |row| {
            rows.push(row);
            Ok(())
        })?;
        Ok(rows)
    }

    /// Evaluates a CONSTRUCT plan, merging into `seed` when given.
    fn construct(&self, plan: &QueryPlan, bindings: &Bindings, seed: Option<Batch>) -> Result<Batch>;

    /// Evaluates an ASK plan.
    fn ask(&self, plan: &QueryPlan, bindings: &Bindings) -> Result<bool>;
}

/// Seed for a CONSTRUCT result: the caller's batch, or an empty batch that
/// carries the registered prefixes.
fn construct_seed(seed: Option<Batch>) -> Batch {
    seed.unwrap_or_else(|| Batch::with_prefixes(namespaces::snapshot()))
}

fn deliver(
    label: &str,
    interval: u64,
    rows: Vec<Solution>,
    on_row: &mut RowCallback<'_>,
) -> Result<u64> {
    let mut progress = ProgressLogger::new(label, interval);
    for row in rows {
        progress.tick();
        on_row(row)?;
    }
    Ok(progress.finish())
}

// =============================================================================
// In-Memory Graph
// =============================================================================

impl TripleSource for Graph {
    fn triples_matching(
        &self,
        subject: Option<&Subject>,
        predicate: Option<&NamedNode>,
        object: Option<&Term>,
    ) -> Result<Vec<Triple>> {
        let accept = |t: &TripleRef<'_>| {
            predicate.map_or(true, |p| t.predicate == p.as_ref())
                && object.map_or(true, |o| t.object == o.as_ref())
        };
        let found = match (subject, object) {
            (Some(s), _) => self
                .triples_for_subject(s)
                .filter(|t| accept(t))
                .map(TripleRef::into_owned)
                .collect(),
            (None, Some(o)) => self
                .triples_for_object(o)
                .filter(|t| accept(t))
                .map(TripleRef::into_owned)
                .collect(),
            (None, None) => self
                .iter()
                .filter(|t| accept(t))
                .map(TripleRef::into_owned)
                .collect(),
        };
        Ok(found)
    }
}

/// Mutable in-memory graph.
#[derive(Debug)]
pub struct GraphEndpoint {
    graph: RwLock<Graph>,
    progress_interval: u64,
}

impl GraphEndpoint {
    pub fn new() -> Self {
        Self::from_graph(Graph::new())
    }

    pub fn from_graph(graph: Graph) -> Self {
        Self {
            graph: RwLock::new(graph),
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }

    pub fn with_progress_interval(mut self, interval: u64) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Adds every statement of `batch`. Returns how many were new.
    pub fn insert_batch(&self, batch: &Batch) -> usize {
        let mut graph = self.write_graph();
        batch.iter().filter(|t| graph.insert(*t)).count()
    }

    pub fn len(&self) -> usize {
        self.read_graph().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_graph().is_empty()
    }

    pub fn contains(&self, triple: &Triple) -> bool {
        self.read_graph().contains(triple)
    }

    /// Copy of the current graph.
    pub fn snapshot(&self) -> Graph {
        self.read_graph().clone()
    }

    fn read_graph(&self) -> RwLockReadGuard<'_, Graph> {
        self.graph.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_graph(&self) -> RwLockWriteGuard<'_, Graph> {
        self.graph.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for GraphEndpoint {
    fn default() -> Self {
        Self::new()
    }
}

impl Endpoint for GraphEndpoint {
    fn process_select(
        &self,
        label: &str,
        plan: &QueryPlan,
        bindings: &Bindings,
        on_row: &mut RowCallback<'_>,
    ) -> Result<u64> {
        let graph = self.read_graph();
        let rows = eval::select(&*graph, plan, bindings)?;
        deliver(label, self.progress_interval, rows, on_row)
    }

    fn construct(&self, plan: &QueryPlan, bindings: &Bindings, seed: Option<Batch>) -> Result<Batch> {
        let graph = self.read_graph();
        eval::construct(&*graph, plan, bindings, construct_seed(seed))
    }

    fn ask(&self, plan: &QueryPlan, bindings: &Bindings) -> Result<bool> {
        let graph = self.read_graph();
        eval::ask(&*graph, plan, bindings)
    }
}

// =============================================================================
// Durable Store
// =============================================================================

/// Queries against a [`TripleStore`], one read transaction per call.
#[derive(Debug, Clone)]
pub struct StoreEndpoint {
    store: Arc<TripleStore>,
    progress_interval: u64,
}

impl StoreEndpoint {
    pub fn new(store: Arc<TripleStore>) -> Self {
        Self {
            store,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }

    pub fn with_progress_interval(mut self, interval: u64) -> Self {
        self.progress_interval = interval;
        self
    }

    pub fn store(&self) -> &Arc<TripleStore> {
        &self.store
    }
}

impl Endpoint for StoreEndpoint {
    fn process_select(
        &self,
        label: &str,
        plan: &QueryPlan,
        bindings: &Bindings,
        on_row: &mut RowCallback<'_>,
    ) -> Result<u64> {
        self.store.read(|reader| {
            let rows = eval::select(reader, plan, bindings)?;
            deliver(label, self.progress_interval, rows, on_row)
        })
    }

    fn construct(&self, plan: &QueryPlan, bindings: &Bindings, seed: Option<Batch>) -> Result<Batch> {
        self.store
            .read(|reader| eval::construct(reader, plan, bindings, construct_seed(seed)))
    }

    fn ask(&self, plan: &QueryPlan, bindings: &Bindings) -> Result<bool> {
        self.store.read(|reader| eval::ask(reader, plan, bindings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use oxrdf::Literal;

    fn ex(local: &str) -> NamedNode {
        NamedNode::new_unchecked(format!("http://example.org/{local}"))
    }

    fn sample() -> Batch {
        vec![
            Triple::new(ex("alice"), ex("knows"), ex("bob")),
            Triple::new(ex("bob"), ex("knows"), ex("carol")),
            Triple::new(ex("alice"), ex("name"), Literal::new_simple_literal("Alice")),
        ]
        .into_iter()
        .collect()
    }

    fn plan(text: &str) -> QueryPlan {
        QueryPlan::parse(&format!("PREFIX ex: <http://example.org/>\n{text}")).expect("valid query")
    }

    /// Both endpoints must answer identically.
    fn endpoints() -> Vec<Box<dyn Endpoint>> {
        let graph = GraphEndpoint::new();
        graph.insert_batch(&sample());

        let store = TripleStore::in_memory().expect("in-memory store");
        store.insert_batch(&sample()).expect("insert");

        vec![Box::new(graph), Box::new(StoreEndpoint::new(Arc::new(store)))]
    }

    #[test]
    fn test_select_same_on_every_endpoint() {
        let select = plan("SELECT ?x ?y WHERE { ?x ex:knows ?y } ORDER BY ?x");
        for endpoint in endpoints() {
            let rows = endpoint.select(&select, &Bindings::new()).expect("evaluates");
            assert_eq!(rows.len(), 2);
            assert_eq!(rows[0].get("x"), Some(&Term::from(ex("alice"))));
        }
    }

    #[test]
    fn test_process_select_stops_on_callback_error() {
        let select = plan("SELECT ?x WHERE { ?x ex:knows ?y }");
        for endpoint in endpoints() {
            let mut seen = 0;
            let err = endpoint
                .process_select("test", &select, &Bindings::new(), &mut |_row| {
                    seen += 1;
                    Err(Error::Job("stop".to_string()))
                })
                .expect_err("callback fails");
            assert!(matches!(err, Error::Job(_)));
            assert_eq!(seen, 1);
        }
    }

    #[test]
    fn test_construct_and_ask() {
        let construct = plan("CONSTRUCT { ?y ex:knownBy ?x } WHERE { ?x ex:knows ?y }");
        let ask = plan("ASK { ex:alice ex:name \"Alice\" }");
        for endpoint in endpoints() {
            let graph = endpoint
                .construct(&construct, &Bindings::new(), None)
                .expect("evaluates");
            assert_eq!(graph.len(), 2);
            assert!(graph.contains(&Triple::new(ex("bob"), ex("knownBy"), ex("alice"))));
            assert!(endpoint.ask(&ask, &Bindings::new()).expect("evaluates"));
        }
    }

    #[test]
    fn test_graph_insert_counts_new_triples() {
        let graph = GraphEndpoint::new();
        assert_eq!(graph.insert_batch(&sample()), 3);
        assert_eq!(graph.insert_batch(&sample()), 0);
        assert_eq!(graph.len(), 3);
    }

    #[test]
    fn test_closed_store_is_not_open() {
        let store = Arc::new(TripleStore::new());
        let endpoint = StoreEndpoint::new(store);
        let err = endpoint
            .ask(&plan("ASK { ?s ?p ?o }"), &Bindings::new())
            .expect_err("store was never opened");
        assert!(matches!(err, Error::NotOpen(_)));
    }
}
