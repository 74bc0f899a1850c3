//! # Batch Sinks
//!
//! Jobs that take a flushed [`Batch`] and merge it somewhere.
//!
//! [`StoreLoader`] is the transactional one: each batch is written in a
//! single `BEGIN IMMEDIATE ... COMMIT`, so readers see either none of a
//! batch or all of it. A failed transaction fails the job. Nothing is
//! retried; the dispatcher records the failure and carries on with the
//! next batch.

use std::sync::Arc;

use tracing::debug;

use crate::batch::Batch;
use crate::dispatcher::BatchJob;
use crate::endpoint::GraphEndpoint;
use crate::store::TripleStore;
use crate::Result;

/// Writes each batch to a [`TripleStore`] in its own write transaction.
#[derive(Debug, Clone)]
pub struct StoreLoader {
    store: Arc<TripleStore>,
}

impl StoreLoader {
    pub fn new(store: Arc<TripleStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<TripleStore> {
        &self.store
    }
}

impl BatchJob<Batch> for StoreLoader {
    fn run(&self, batch: Batch) -> Result<()> {
        let inserted = self.store.insert_batch(&batch)?;
        debug!(
            statements = batch.len(),
            inserted,
            duplicates = batch.len() - inserted,
            "batch committed"
        );
        Ok(())
    }
}

/// Adds each batch to an in-memory [`GraphEndpoint`].
#[derive(Debug, Clone)]
pub struct GraphLoader {
    graph: Arc<GraphEndpoint>,
}

impl GraphLoader {
    pub fn new(graph: Arc<GraphEndpoint>) -> Self {
        Self { graph }
    }

    pub fn graph(&self) -> &Arc<GraphEndpoint> {
        &self.graph
    }
}

impl BatchJob<Batch> for GraphLoader {
    fn run(&self, batch: Batch) -> Result<()> {
        let inserted = self.graph.insert_batch(&batch);
        debug!(statements = batch.len(), inserted, "batch added to graph");
        Ok(())
    }
}
