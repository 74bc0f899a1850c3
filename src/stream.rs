//! # Stream Adapter
//!
//! Push-style parsers emit four kinds of events, in order:
//!
//! ```text
//! start ─► statement* / namespace* ─► end
//! ```
//!
//! [`StatementSink`] is that event interface. [`StreamLoader`] implements it
//! on top of a [`BatchDispatcher`]. Each statement goes into the open batch,
//! each namespace is recorded on it, and `end` forces the final flush and
//! runs the completion barrier. Only the open batch and the batches in
//! flight are ever in memory.
//!
//! The barrier runs on every exit path. When the input fails partway, the
//! statements received so far are flushed and every dispatched job returns
//! before the error reaches the caller.

use std::io::Read;

use oxrdf::Triple;
use tracing::{debug, warn};

use crate::batch::Batch;
use crate::collector::BatchCollector;
use crate::dispatcher::{BatchDispatcher, BatchJob, DispatchReport, DispatcherConfig};
use crate::parse::{self, RdfSyntax};
use crate::{Error, Result};

/// Receiver of parser events.
pub trait StatementSink {
    /// Input is about to begin.
    fn start(&mut self) -> Result<()>;

    /// One statement, in document order.
    fn statement(&mut self, statement: Triple) -> Result<()>;

    /// The document bound `prefix` to `namespace`.
    fn namespace(&mut self, prefix: &str, namespace: &str) -> Result<()>;

    /// Input is exhausted.
    fn end(&mut self) -> Result<()>;
}

/// Loads a statement stream through a dispatcher.
///
/// # Example
///
/// ```rust,no_run
/// use tripleflow::{DispatcherConfig, RdfSyntax, StatementCollector, StreamLoader};
///
/// let loader = StreamLoader::new(
///     StatementCollector::new(10_000),
///     |batch: tripleflow::Batch| -> tripleflow::Result<()> {
///         println!("{} statements", batch.len());
///         Ok(())
///     },
///     DispatcherConfig::new(4),
/// )?;
/// let file = std::fs::File::open("data.ttl")?;
/// let report = loader.load(file, RdfSyntax::Turtle, None)?;
/// println!("{} batches", report.dispatched);
/// # Ok::<(), tripleflow::Error>(())
/// ```
pub struct StreamLoader<C: BatchCollector<Batch = Batch>> {
    dispatcher: Option<BatchDispatcher<C>>,
    current: Option<Batch>,
    report: Option<DispatchReport<Batch>>,
    statements: u64,
}

impl<C: BatchCollector<Batch = Batch>> StreamLoader<C> {
    /// Builds the dispatcher and wraps it.
    pub fn new(
        collector: C,
        job: impl BatchJob<Batch>,
        config: DispatcherConfig,
    ) -> Result<Self> {
        Ok(Self::from_dispatcher(BatchDispatcher::new(collector, job, config)?))
    }

    pub fn from_dispatcher(dispatcher: BatchDispatcher<C>) -> Self {
        Self {
            dispatcher: Some(dispatcher),
            current: None,
            report: None,
            statements: 0,
        }
    }

    /// The underlying dispatcher, until `end` has run.
    pub fn dispatcher(&self) -> Option<&BatchDispatcher<C>> {
        self.dispatcher.as_ref()
    }

    /// Statements received so far.
    pub fn statement_count(&self) -> u64 {
        self.statements
    }

    /// Parses `reader` and loads everything it contains, then runs the barrier.
    ///
    /// # Errors
    ///
    /// The parse error if the input is bad, [`Error::Interrupted`] if jobs
    /// failed as well, [`Error::BatchJobs`] if only jobs failed. In every
    /// case the workers have been joined.
    pub fn load<R: Read>(
        mut self,
        reader: R,
        syntax: RdfSyntax,
        base_iri: Option<&str>,
    ) -> Result<DispatchReport<Batch>> {
        match parse::parse_into(reader, syntax, base_iri, &mut self) {
            Ok(()) => self.finish(),
            Err(cause) => Err(self.abort(cause)),
        }
    }

    /// Ends the stream if needed and returns the run's report.
    ///
    /// # Errors
    ///
    /// [`Error::BatchJobs`] if any job failed.
    pub fn finish(mut self) -> Result<DispatchReport<Batch>> {
        if self.report.is_none() {
            if let Err(cause) = self.end() {
                return Err(self.abort(cause));
            }
        }
        self.report
            .take()
            .ok_or_else(|| Error::NotOpen("stream loader produced no report".to_string()))?
            .into_result()
    }

    /// Stops after `cause`: flushes what was received, waits for the jobs
    /// and folds their failures into the returned error.
    fn abort(mut self, cause: Error) -> Error {
        if self.report.is_none() {
            if let Err(err) = self.end() {
                warn!(%err, "final flush after failed input");
            }
        }
        let failures = self
            .report
            .take()
            .map(|report| report.failures)
            .unwrap_or_default();
        warn!(
            statements = self.statements,
            failed_jobs = failures.len(),
            error = %cause,
            "statement stream aborted"
        );
        Error::with_failures(cause, failures)
    }

    fn open_dispatcher(&self) -> Result<&BatchDispatcher<C>> {
        self.dispatcher
            .as_ref()
            .ok_or_else(|| Error::NotOpen("stream loader already ended".to_string()))
    }

    /// Open batch, creating it if `start` was skipped.
    fn current_batch(&mut self) -> Result<Batch> {
        match self.current.take() {
            Some(batch) => Ok(batch),
            None => Ok(self.open_dispatcher()?.new_batch()),
        }
    }
}

impl<C: BatchCollector<Batch = Batch>> StatementSink for StreamLoader<C> {
    fn start(&mut self) -> Result<()> {
        let batch = self.open_dispatcher()?.new_batch();
        self.current = Some(batch);
        Ok(())
    }

    fn statement(&mut self, statement: Triple) -> Result<()> {
        let mut batch = self.current_batch()?;
        batch.push(statement);
        self.statements += 1;
        let batch = self.open_dispatcher()?.submit(batch)?;
        self.current = Some(batch);
        Ok(())
    }

    fn namespace(&mut self, prefix: &str, namespace: &str) -> Result<()> {
        let mut batch = self.current_batch()?;
        batch.set_prefix(prefix, namespace);
        self.current = Some(batch);
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        let dispatcher = self
            .dispatcher
            .take()
            .ok_or_else(|| Error::NotOpen("stream loader already ended".to_string()))?;

        // The barrier runs even if the last flush fails.
        let flushed = match self.current.take() {
            Some(batch) => dispatcher.flush(batch).map(drop),
            None => Ok(()),
        };
        debug!(statements = self.statements, "end of statement stream");
        self.report = Some(dispatcher.finish());
        flushed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::StatementCollector;
    use oxrdf::{Literal, NamedNode};
    use std::sync::{Arc, Mutex};

    fn stmt(i: usize) -> Triple {
        Triple::new(
            NamedNode::new_unchecked(format!("http://example.org/s{i}")),
            NamedNode::new_unchecked("http://example.org/p"),
            Literal::from(i as i64),
        )
    }

    fn recording_loader(max: usize) -> (StreamLoader<StatementCollector>, Arc<Mutex<Vec<Batch>>>) {
        let batches = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&batches);
        let loader = StreamLoader::new(
            StatementCollector::new(max).without_namespaces(),
            move |batch: Batch| -> Result<()> {
                sink.lock().expect("batches lock").push(batch);
                Ok(())
            },
            DispatcherConfig::new(1),
        )
        .expect("spawn loader");
        (loader, batches)
    }

    #[test]
    fn test_events_drive_batches() {
        let (mut loader, batches) = recording_loader(3);

        loader.start().expect("start");
        loader
            .namespace("ex", "http://example.org/")
            .expect("namespace");
        for i in 0..7 {
            loader.statement(stmt(i)).expect("statement");
        }
        loader.end().expect("end");
        let report = loader.finish().expect("no job fails");

        assert_eq!(report.dispatched, 3);
        let batches = batches.lock().expect("batches lock");
        let sizes: Vec<_> = batches.iter().map(Batch::len).collect();
        assert_eq!(sizes, vec![3, 3, 1]);
        assert_eq!(
            batches[0].prefixes().get("ex").map(String::as_str),
            Some("http://example.org/")
        );
        // Single worker: batches arrive in dispatch order, statements in
        // arrival order.
        let all: Vec<_> = batches.iter().flat_map(|b| b.iter().cloned()).collect();
        assert_eq!(all, (0..7).map(stmt).collect::<Vec<_>>());
    }

    #[test]
    fn test_events_after_end_are_rejected() {
        let (mut loader, _batches) = recording_loader(3);
        loader.start().expect("start");
        loader.end().expect("end");

        assert!(matches!(loader.statement(stmt(0)), Err(Error::NotOpen(_))));
        assert!(matches!(loader.end(), Err(Error::NotOpen(_))));
    }

    #[test]
    fn test_empty_stream_dispatches_nothing() {
        let (loader, batches) = recording_loader(3);
        let report = loader.finish().expect("no job fails");
        assert_eq!(report.dispatched, 0);
        assert!(batches.lock().expect("batches lock").is_empty());
    }
}
