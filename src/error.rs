//! # Error Handling for tripleflow
//!
//! This module defines the error types used throughout the crate. A single
//! error enum ([`Error`]) covers loading, dispatching, storage and querying,
//! which keeps signatures uniform across the pipeline.
//!
//! ## Rust Pattern: thiserror
//!
//! We use the `thiserror` crate to derive `std::error::Error` implementations:
//! - `Display` comes from the `#[error(...)]` attributes
//! - `From` conversions come from `#[from]`
//! - Source chaining comes from `#[source]`
//!
//! ## Error Categories
//!
//! | Category | Examples | Typical Response |
//! |----------|----------|------------------|
//! | Query | Malformed or unsupported SPARQL | Fix the query text |
//! | Batch jobs | A worker job failed on one batch | Inspect failures after the run |
//! | Transaction | Begin/commit failed, store busy | Propagate to the caller |
//! | Lifecycle | Store used before `open` | Fatal, fix the calling code |
//! | Input | Bad Turtle, unknown prefix | Fix the data |
//!
//! None of these are retried automatically. Retry policy belongs to whoever
//! owns the job or the store.

use thiserror::Error;

use crate::dispatcher::JobFailure;

// =============================================================================
// Error Type
// =============================================================================

/// All errors that can occur in tripleflow operations.
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Query Errors
    // =========================================================================

    /// The query text could not be parsed.
    ///
    /// # When This Happens
    ///
    /// [`QueryPlanCache::get`](crate::cache::QueryPlanCache::get) parses text
    /// it has not seen before. A syntax error is returned right away and the
    /// text is never inserted into the cache, so the next call parses again.
    #[error("malformed query: {message}\n{query}")]
    MalformedQuery {
        /// The offending query text, as given by the caller
        query: String,
        /// Parser diagnostic
        message: String,
    },

    /// The query parsed, but uses a construct the evaluator does not run.
    ///
    /// Treated like [`Error::MalformedQuery`]: never cached.
    #[error("unsupported query feature: {feature}")]
    UnsupportedQuery {
        /// Short name of the SPARQL construct
        feature: String,
    },

    /// A plan of one form was run through an operation expecting another,
    /// e.g. an ASK query passed to `select`.
    #[error("expected a {expected} query, got a {actual} query")]
    WrongQueryForm {
        /// Form the operation runs
        expected: &'static str,
        /// Form of the plan that was supplied
        actual: &'static str,
    },

    /// An ASK check answered false.
    ///
    /// Returned by [`SparqlTester`](crate::tester::SparqlTester) with the
    /// caller's message and the full query that was run.
    #[error("{message}\n{query}")]
    CheckFailed {
        /// What the check was supposed to show
        message: String,
        /// The query, prolog included
        query: String,
    },

    // =========================================================================
    // Batch Job Errors
    // =========================================================================

    /// One or more worker jobs failed during a pipeline run.
    ///
    /// # When This Happens
    ///
    /// Returned by
    /// [`BatchDispatcher::await_completion`](crate::dispatcher::BatchDispatcher::await_completion)
    /// once every job has returned. Batches are independent, so a failing
    /// job never stops the producer. The failures are only reported here,
    /// at the end of the run.
    #[error("{} batch job(s) failed{}", failures.len(), first_failure(failures))]
    BatchJobs {
        /// Every failure of the run, in the order jobs reported them
        failures: Vec<JobFailure>,
    },

    /// Loading stopped on `cause`, and jobs that had already been handed
    /// batches failed too.
    ///
    /// # When This Happens
    ///
    /// [`StreamLoader::load`](crate::stream::StreamLoader::load) hit bad
    /// input (or a failed final flush) after some batches were dispatched.
    /// The loader still waits for every dispatched job before returning, so
    /// nothing is writing by the time the caller sees this.
    #[error("{cause}; {} batch job(s) also failed{}", failures.len(), first_failure(failures))]
    Interrupted {
        /// The error that stopped the input
        #[source]
        cause: Box<Error>,
        /// Job failures collected before the workers were joined
        failures: Vec<JobFailure>,
    },

    /// A job rejected its batch, or panicked while processing it.
    #[error("batch job failed: {0}")]
    Job(String),

    /// The worker pool is gone, so the batch could not be handed off.
    #[error("worker pool has shut down")]
    PoolShutdown,

    // =========================================================================
    // Storage Errors
    // =========================================================================

    /// A read or write transaction could not begin or commit.
    ///
    /// # Systems Concept: All or Nothing
    ///
    /// A write transaction that fails is rolled back as a whole, so readers
    /// never see a half-merged batch.
    #[error("transaction failed during {operation}: {source}")]
    Transaction {
        /// What the store was doing (e.g. "commit write")
        operation: &'static str,
        /// Underlying SQLite failure
        #[source]
        source: rusqlite::Error,
    },

    /// The store was used before `open`, or after `close`.
    #[error("resource not open: {0}")]
    NotOpen(String),

    /// SQLite operation failed.
    ///
    /// # Rust Pattern: #[from]
    ///
    /// The `#[from]` attribute lets `?` convert `rusqlite::Error` for us.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Schema version mismatch or a corrupt row.
    #[error("schema error: {0}")]
    Schema(String),

    // =========================================================================
    // Input Errors
    // =========================================================================

    /// The RDF input could not be parsed.
    #[error("syntax error: {0}")]
    Syntax(String),

    /// A prefixed name used a prefix nobody registered.
    #[error("unknown namespace prefix '{0}'")]
    UnknownPrefix(String),

    /// A string is not a valid IRI.
    #[error("invalid IRI: {0}")]
    InvalidIri(String),

    /// Configuration rejected by validation or TOML decoding.
    #[error("configuration error: {0}")]
    Config(String),

    /// File I/O failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// `cause`, or [`Error::Interrupted`] when there are job failures to
    /// report alongside it.
    pub(crate) fn with_failures(cause: Error, failures: Vec<JobFailure>) -> Error {
        if failures.is_empty() {
            cause
        } else {
            Error::Interrupted {
                cause: Box::new(cause),
                failures,
            }
        }
    }
}

fn first_failure(failures: &[JobFailure]) -> String {
    match failures.first() {
        Some(failure) => format!(", first: {failure}"),
        None => String::new(),
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// A `Result` type alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

// =============================================================================
// Tests
// =============================================================================
