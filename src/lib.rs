//! # tripleflow - Streaming RDF Batch Loader
//!
//! tripleflow turns a stream of RDF statements into fixed-size batches and
//! hands them to a bounded pool of worker threads. It also runs SPARQL-style
//! queries through a shared plan cache against an in-memory graph or a
//! durable SQLite store.
//!
//! - **Bounded batching**: memory is one open batch plus the batches in flight
//! - **Backpressure**: the producer blocks while every worker is busy
//! - **Context replication**: share a schema batch with every job, or
//!   accumulate everything seen so far
//! - **Transactional queries**: rows are owned copies taken inside one read
//!   transaction
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────┐   events    ┌──────────────┐  full batch  ┌─────────────────┐
//! │ Turtle / NT  │ ──────────► │ StreamLoader │ ───────────► │ BatchDispatcher │
//! │   parser     │             │  (producer)  │  (blocks)    │  N worker pool  │
//! └──────────────┘             └──────────────┘              └────────┬────────┘
//!                                                                     │ job(batch)
//!                                                                     ▼
//! ┌──────────────┐   plan      ┌──────────────┐   read txn   ┌─────────────────┐
//! │ QueryHelper  │ ──────────► │   Endpoint   │ ───────────► │   TripleStore   │
//! │ + plan cache │             │ graph/store  │              │ SQLite, 1 writer│
//! └──────────────┘             └──────────────┘              └─────────────────┘
//! ```
//!
//! ## Core Invariants
//!
//! 1. **Bounded batches**: a batch is flushed as soon as the producer has
//!    appended the maximum; injected context does not count, and only the
//!    final forced flush may carry fewer new statements
//! 2. **Arrival order**: statements inside one batch keep source order
//! 3. **Completion barrier**: `await_completion` returns after every job has
//!    returned, and a load that fails joins its workers before reporting
//! 4. **Atomic merges**: each batch is committed in one write transaction
//! 5. **Parse once**: a query text is parsed at most once while cached, and
//!    malformed text is never cached
//!
//! ## Module Organization
//!
//! - [`error`]: the crate-wide error enum
//! - [`batch`], [`collector`], [`context`], [`dispatcher`], [`stream`]: the
//!   ingestion pipeline
//! - [`parse`]: drives the Turtle and N-Triples parsers
//! - [`store`], [`codec`], [`sink`]: durable storage
//! - [`plan`], [`eval`], [`cache`], [`endpoint`], [`helper`]: queries
//! - [`tester`]: ASK checks from strings, files and directories
//! - [`config`], [`api`]: configuration and the async entry point

// =============================================================================
// Module Declarations
// =============================================================================

/// Error types for every failure mode.
pub mod error;

/// Batch contract and the statement batch.
pub mod batch;

/// Process-wide namespace prefix registry.
pub mod namespaces;

/// Batch factories and the flush decision.
pub mod collector;

/// Context batch replication (inject / accumulate).
pub mod context;

/// Worker pool, backpressure and the completion barrier.
///
/// The main entry point is [`BatchDispatcher`](dispatcher::BatchDispatcher).
pub mod dispatcher;

/// Parser event interface and the streaming loader.
pub mod stream;

/// Turtle and N-Triples parsing into a [`StatementSink`].
pub mod parse;

/// RDF term to SQLite column encoding.
pub mod codec;

/// Durable SQLite triple store.
///
/// Single writer connection, pooled read-only connections, WAL mode.
pub mod store;

/// Batch jobs that merge into a store or a graph.
pub mod sink;

/// SPARQL text to immutable query plan.
pub mod plan;

/// Query plan evaluation.
pub mod eval;

/// LRU cache of parsed query plans.
pub mod cache;

/// In-memory and durable query endpoints.
pub mod endpoint;

/// Cached query surface over one endpoint.
pub mod helper;

/// ASK-based checks over an endpoint.
pub mod tester;

/// Periodic progress logging.
pub mod progress;

/// Pipeline configuration, loadable from TOML.
pub mod config;

/// Async API over Tokio's blocking pool.
///
/// The main entry point is [`TripleDb`](api::TripleDb).
pub mod api;

// =============================================================================
// Re-exports
// =============================================================================

pub use api::TripleDb;
pub use batch::{Batch, BatchContainer, Statement};
pub use cache::{CacheStats, QueryPlanCache};
pub use collector::{BatchCollector, StatementCollector, VecCollector};
pub use config::PipelineConfig;
pub use context::ContextMode;
pub use dispatcher::{BatchDispatcher, BatchJob, DispatchReport, DispatcherConfig, JobFailure};
pub use endpoint::{Endpoint, GraphEndpoint, StoreEndpoint};
pub use error::{Error, Result};
pub use eval::{Bindings, Solution, TripleSource};
pub use helper::{QueryHelper, QueryResults};
pub use parse::RdfSyntax;
pub use plan::QueryPlan;
pub use sink::{GraphLoader, StoreLoader};
pub use store::TripleStore;
pub use stream::{StatementSink, StreamLoader};
pub use tester::SparqlTester;
