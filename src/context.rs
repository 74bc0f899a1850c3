//! # Context Replication
//!
//! Some consumers expect every batch to be self-contained, e.g. each batch
//! must carry the ontology its statements refer to. The context layer keeps
//! one shared "context batch" per dispatcher and updates it on every real
//! flush, in one of two modes:
//!
//! ```text
//!  Accumulate                                 Inject
//!  ──────────                                 ──────
//!  flushed ──merge──► context                 context ──merge──► replacement
//!  (context grows with everything seen)       (each new batch starts pre-filled)
//! ```
//!
//! The modes are mutually exclusive and fixed at construction. With no
//! context and accumulate mode off, the layer does nothing.
//!
//! Every fresh batch comes back with the number of statements injected into
//! it. The dispatcher subtracts that from the flush measure, so a batch is
//! full when the producer has appended `max_batch_size` statements of its
//! own, however large the context is.
//!
//! ## Systems Concept: One Critical Section
//!
//! The context is only read or written inside the flush transition, which
//! holds [`ContextReplication`]'s mutex for its whole duration. Creating
//! the replacement batch happens inside that same section, so a replacement
//! always sees a consistent context snapshot.

use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::batch::BatchContainer;
use crate::collector::BatchCollector;

/// How the context batch is maintained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextMode {
    /// Merge the context into every replacement batch. Does nothing until a
    /// context has been assigned.
    #[default]
    Inject,
    /// Merge every flushed batch, in full, into the context.
    Accumulate,
}

impl ContextMode {
    /// Maps the classic "duplicate TBox" flag: `true` accumulates.
    pub fn from_duplicate_flag(duplicate: bool) -> Self {
        if duplicate {
            ContextMode::Accumulate
        } else {
            ContextMode::Inject
        }
    }
}

/// The shared context batch and the lock guarding the flush transition.
#[derive(Debug)]
pub struct ContextReplication<B> {
    mode: ContextMode,
    context: Mutex<Option<B>>,
}

impl<B: BatchContainer> ContextReplication<B> {
    pub fn new(mode: ContextMode) -> Self {
        Self {
            mode,
            context: Mutex::new(None),
        }
    }

    /// Starts with an externally assigned context.
    pub fn with_context(mode: ContextMode, context: B) -> Self {
        Self {
            mode,
            context: Mutex::new(Some(context)),
        }
    }

    pub fn mode(&self) -> ContextMode {
        self.mode
    }

    /// Replaces the context. Batches created afterwards see the new content.
    pub fn set_context(&self, context: B) {
        *self.lock() = Some(context);
    }

    /// Takes the context out, leaving none behind.
    pub fn take_context(&self) -> Option<B> {
        self.lock().take()
    }

    /// Fresh batch from the collector, pre-filled with the context when
    /// injecting, and the size of what was injected.
    pub(crate) fn new_batch<C>(&self, collector: &C) -> (B, usize)
    where
        C: BatchCollector<Batch = B>,
    {
        let context = self.lock();
        Self::fresh(self.mode, collector, context.as_ref())
    }

    /// The flush transition: updates the context from `flushed` and returns
    /// the batch that replaces it, with its injected size.
    pub(crate) fn on_flush<C>(&self, collector: &C, flushed: &B) -> (B, usize)
    where
        C: BatchCollector<Batch = B>,
    {
        let mut context = self.lock();
        if self.mode == ContextMode::Accumulate {
            context
                .get_or_insert_with(|| collector.new_batch())
                .merge(flushed);
        }
        Self::fresh(self.mode, collector, context.as_ref())
    }

    fn fresh<C>(mode: ContextMode, collector: &C, context: Option<&B>) -> (B, usize)
    where
        C: BatchCollector<Batch = B>,
    {
        let mut batch = collector.new_batch();
        let base = collector.batch_size(&batch);
        if let (ContextMode::Inject, Some(context)) = (mode, context) {
            batch.merge(context);
        }
        let injected = collector.batch_size(&batch).saturating_sub(base);
        (batch, injected)
    }

    // Every writer leaves the Option in a valid state, so poisoning only
    // means some other thread panicked; the data is still usable.
    fn lock(&self) -> MutexGuard<'_, Option<B>> {
        self.context
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<B: BatchContainer + Clone> ContextReplication<B> {
    /// Copy of the current context.
    pub fn snapshot(&self) -> Option<B> {
        self.lock().clone()
    }
}
