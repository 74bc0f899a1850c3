//! # Sized Batch Collector
//!
//! The collector owns two decisions: how a fresh batch is created, and when
//! an open batch is full enough to flush. It never blocks and never fails.
//!
//! ```text
//!   push ──► batch_size(batch) >= max_batch_size ? ──yes──► flush
//!                                                 └─no───► keep filling
//! ```
//!
//! The size is a flush-timing measure only. The dispatcher discounts context
//! statements injected into a fresh batch, so a flushed batch may hold more
//! statements than `max_batch_size`: the producer's own plus the context.

use std::marker::PhantomData;

use crate::batch::{Batch, BatchContainer};
use crate::namespaces;

/// Default maximum batch size (statements).
pub const DEFAULT_MAX_BATCH_SIZE: usize = 10_000;

/// Creates batches and decides when they are full.
///
/// # Rust Pattern: Associated Types
///
/// Each collector produces exactly one kind of batch, so the batch type is an
/// associated type rather than a generic parameter. The dispatcher can then
/// be generic over just `C: BatchCollector`.
pub trait BatchCollector: Send + Sync + 'static {
    type Batch: BatchContainer;

    /// Produces a fresh, empty batch.
    fn new_batch(&self) -> Self::Batch;

    fn max_batch_size(&self) -> usize;

    /// Measure used for the flush decision. Must not decrease as a batch fills.
    fn batch_size(&self, batch: &Self::Batch) -> usize {
        batch.size()
    }

    /// True iff `batch_size(batch) >= max_batch_size()`.
    fn should_flush(&self, batch: &Self::Batch) -> bool {
        self.should_flush_with(batch, 0)
    }

    /// Like [`should_flush`](Self::should_flush) for a batch that started out
    /// holding `injected` context statements, which do not count.
    fn should_flush_with(&self, batch: &Self::Batch, injected: usize) -> bool {
        self.batch_size(batch).saturating_sub(injected) >= self.max_batch_size()
    }
}

// =============================================================================
// Statement Collector
// =============================================================================

/// Collector for RDF statement batches.
///
/// New batches carry a copy of the process-wide namespace registry unless
/// that is switched off with [`without_namespaces`](Self::without_namespaces).
#[derive(Debug, Clone)]
pub struct StatementCollector {
    max_batch_size: usize,
    copy_namespaces: bool,
}

impl StatementCollector {
    /// Creates a collector flushing at `max_batch_size` statements.
    ///
    /// A maximum of zero is treated as one: every statement is its own batch.
    pub fn new(max_batch_size: usize) -> Self {
        Self {
            max_batch_size: max_batch_size.max(1),
            copy_namespaces: true,
        }
    }

    /// New batches start without registry prefixes.
    pub fn without_namespaces(mut self) -> Self {
        self.copy_namespaces = false;
        self
    }
}

impl Default for StatementCollector {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BATCH_SIZE)
    }
}

impl BatchCollector for StatementCollector {
    type Batch = Batch;

    fn new_batch(&self) -> Batch {
        if self.copy_namespaces {
            Batch::with_prefixes(namespaces::snapshot())
        } else {
            Batch::new()
        }
    }

    fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }
}

// =============================================================================
// Generic Item Collector
// =============================================================================

/// Collector batching arbitrary items into `Vec<T>`.
///
/// Useful for pushing query rows (or anything else) through the same worker
/// pool as statement batches.
#[derive(Debug)]
pub struct VecCollector<T> {
    max_batch_size: usize,
    _items: PhantomData<fn() -> T>,
}

impl<T> VecCollector<T> {
    pub fn new(max_batch_size: usize) -> Self {
        Self {
            max_batch_size: max_batch_size.max(1),
            _items: PhantomData,
        }
    }
}

impl<T> Clone for VecCollector<T> {
    fn clone(&self) -> Self {
        Self::new(self.max_batch_size)
    }
}

impl<T: Clone + Send + 'static> BatchCollector for VecCollector<T> {
    type Batch = Vec<T>;

    fn new_batch(&self) -> Vec<T> {
        Vec::with_capacity(self.max_batch_size)
    }

    fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }
}
