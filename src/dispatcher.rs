//! # Batch Dispatcher
//!
//! The dispatcher is the concurrency core of the loader. The producer thread
//! fills a batch, and when the collector says it is full the dispatcher hands
//! it to exactly one worker thread, returning a fresh batch to keep filling.
//!
//! ## Architecture
//!
//! ```text
//!                 ┌─────────────────────────────────────────────┐
//!  producer       │              BatchDispatcher                │
//!  ────────       │                                             │
//!  submit(batch) ─┼─► should_flush? ──no──► same batch back     │
//!                 │        │yes                                 │
//!                 │        ▼                                    │
//!                 │  ContextReplication::on_flush  (locked)     │
//!                 │        │                                    │
//!                 │        ▼                                    │
//!                 │  sync_channel(0) ── blocks while all ──┐    │
//!                 │        │            workers are busy   │    │
//!                 └────────┼───────────────────────────────┼────┘
//!                          ▼                               │
//!            ┌────────────┬────────────┬────────────┐      │
//!            │ worker-0   │ worker-1   │ worker-N-1 │ ◄────┘
//!            │ job(batch) │ job(batch) │ job(batch) │   backpressure
//!            └────────────┴────────────┴────────────┘
//! ```
//!
//! ## Systems Concept: Rendezvous Channel as Backpressure
//!
//! The channel has capacity zero, so a `send` only completes when a worker is
//! actually waiting in `recv`. With `N` workers at most `N` batches are in
//! flight plus the one the producer is filling. A slow sink therefore slows
//! the producer down instead of growing a queue.
//!
//! ## Flush Measure
//!
//! In inject mode a fresh batch already holds the context. The dispatcher
//! remembers how many statements were injected into the open batch and only
//! counts what the producer appended on top, so `N` statements with a
//! maximum of `B` always give `N / B` full batches plus the remainder.
//!
//! ## Failure Semantics
//!
//! A job error (or panic) is recorded with the batch's sequence number and
//! the pool keeps going. Batches are independent units of work. Nothing is
//! retried. All failures are reported by [`BatchDispatcher::await_completion`].

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, available_parallelism, JoinHandle};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::batch::BatchContainer;
use crate::collector::BatchCollector;
use crate::context::{ContextMode, ContextReplication};
use crate::{Error, Result};

// =============================================================================
// Configuration
// =============================================================================

/// Smallest pool we will spawn.
const MIN_WORKERS: usize = 1;

/// Thread name prefix, visible in debuggers and `top -H`.
const WORKER_THREAD_PREFIX: &str = "tripleflow-worker";

/// Worker count when none is configured: one per available core.
pub fn default_pool_size() -> usize {
    available_parallelism()
        .map(|n| n.get())
        .unwrap_or(MIN_WORKERS)
}

/// Immutable dispatcher settings, passed once at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Number of worker threads (clamped to at least 1).
    pub pool_size: usize,
    /// How the shared context batch is maintained.
    pub context_mode: ContextMode,
}

impl DispatcherConfig {
    pub fn new(pool_size: usize) -> Self {
        Self {
            pool_size,
            ..Self::default()
        }
    }

    pub fn with_context_mode(mut self, context_mode: ContextMode) -> Self {
        self.context_mode = context_mode;
        self
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            pool_size: default_pool_size(),
            context_mode: ContextMode::default(),
        }
    }
}

// =============================================================================
// Jobs
// =============================================================================

/// Work performed on one flushed batch.
///
/// # Rust Pattern: Blanket Impl for Closures
///
/// Any `Fn(B) -> Result<()>` that is `Send + Sync` is a job, so tests and
/// small callers can pass a closure, while reusable sinks such as
/// [`StoreLoader`](crate::sink::StoreLoader) implement the trait directly.
pub trait BatchJob<B>: Send + Sync + 'static {
    fn run(&self, batch: B) -> Result<()>;
}

impl<B, F> BatchJob<B> for F
where
    F: Fn(B) -> Result<()> + Send + Sync + 'static,
{
    fn run(&self, batch: B) -> Result<()> {
        self(batch)
    }
}

/// A job that failed on one batch.
#[derive(Debug)]
pub struct JobFailure {
    /// Dispatch sequence number of the batch (0-based).
    pub sequence: u64,
    /// Size of the batch as the collector measured it.
    pub size: usize,
    /// What the job reported.
    pub error: Error,
}

impl fmt::Display for JobFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "batch #{} ({} statements): {}",
            self.sequence, self.size, self.error
        )
    }
}

/// Summary of a finished pipeline run.
#[derive(Debug)]
pub struct DispatchReport<B> {
    /// Batches handed to the pool.
    pub dispatched: u64,
    /// Jobs that returned, successfully or not.
    pub completed: u64,
    /// Jobs that failed.
    pub failures: Vec<JobFailure>,
    /// Final context batch, if one existed.
    pub context: Option<B>,
    /// Time from dispatcher construction to the end of the barrier.
    pub elapsed: Duration,
}

impl<B> DispatchReport<B> {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Turns recorded failures into [`Error::BatchJobs`].
    pub fn into_result(self) -> Result<Self> {
        if self.failures.is_empty() {
            Ok(self)
        } else {
            Err(Error::BatchJobs {
                failures: self.failures,
            })
        }
    }
}

// =============================================================================
// Dispatcher
// =============================================================================

struct Dispatch<B> {
    sequence: u64,
    batch: B,
}

/// State shared between the dispatcher and its workers.
#[derive(Default)]
struct PoolState {
    completed: AtomicU64,
    failures: Mutex<Vec<JobFailure>>,
}

impl PoolState {
    fn failures(&self) -> MutexGuard<'_, Vec<JobFailure>> {
        self.failures
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Bounded worker pool fed by a collector.
///
/// # Lifecycle
///
/// 1. [`new`](Self::new) spawns the workers.
/// 2. The producer calls [`new_batch`](Self::new_batch) once, then
///    [`submit`](Self::submit) after each append, keeping the returned batch.
/// 3. At end of stream, [`flush`](Self::flush) forces out the last batch.
/// 4. [`await_completion`](Self::await_completion) consumes the dispatcher,
///    so the barrier can only run once and nothing can be submitted after it.
///
/// Dropping the dispatcher without the barrier still closes the channel and
/// joins the workers, so no job outlives it. Failures recorded by then are
/// logged and discarded.
///
/// There is one producer: the injected size of the open batch is tracked
/// here, not on the batch.
pub struct BatchDispatcher<C: BatchCollector> {
    collector: C,
    replication: ContextReplication<C::Batch>,
    sender: Option<SyncSender<Dispatch<C::Batch>>>,
    workers: Vec<JoinHandle<()>>,
    state: Arc<PoolState>,
    dispatched: AtomicU64,
    /// Context statements injected into the batch the producer is filling.
    injected: AtomicUsize,
    started: Instant,
}

impl<C: BatchCollector> BatchDispatcher<C> {
    /// Spawns `config.pool_size` workers, each running `job` on the batches
    /// it receives.
    ///
    /// # Errors
    ///
    /// `Error::Io` if the OS refuses to spawn a thread.
    pub fn new(collector: C, job: impl BatchJob<C::Batch>, config: DispatcherConfig) -> Result<Self> {
        let pool_size = config.pool_size.max(MIN_WORKERS);
        let job: Arc<dyn BatchJob<C::Batch>> = Arc::new(job);
        let state = Arc::new(PoolState::default());

        let (sender, receiver) = mpsc::sync_channel(0);
        // Receiver is not Clone: workers take turns holding the lock while
        // they wait for the next batch.
        let receiver = Arc::new(Mutex::new(receiver));

        let mut workers = Vec::with_capacity(pool_size);
        for i in 0..pool_size {
            let job = Arc::clone(&job);
            let receiver = Arc::clone(&receiver);
            let state = Arc::clone(&state);

            let handle = thread::Builder::new()
                .name(format!("{WORKER_THREAD_PREFIX}-{i}"))
                .spawn(move || run_worker(job, receiver, state))?;
            workers.push(handle);
        }

        debug!(
            pool_size,
            max_batch_size = collector.max_batch_size(),
            context_mode = ?config.context_mode,
            "batch dispatcher started"
        );

        Ok(Self {
            collector,
            replication: ContextReplication::new(config.context_mode),
            sender: Some(sender),
            workers,
            state,
            dispatched: AtomicU64::new(0),
            injected: AtomicUsize::new(0),
            started: Instant::now(),
        })
    }

    pub fn collector(&self) -> &C {
        &self.collector
    }

    pub fn pool_size(&self) -> usize {
        self.workers.len()
    }

    pub fn context_mode(&self) -> ContextMode {
        self.replication.mode()
    }

    /// Assigns the context batch (inject mode's "prior external assignment").
    pub fn set_context(&self, context: C::Batch) {
        self.replication.set_context(context);
    }

    /// Batches handed to the pool so far.
    pub fn dispatched(&self) -> u64 {
        self.dispatched.load(Ordering::SeqCst)
    }

    /// Jobs finished so far.
    pub fn completed(&self) -> u64 {
        self.state.completed.load(Ordering::SeqCst)
    }

    /// Failures recorded so far. A producer may use this to stop early.
    pub fn failure_count(&self) -> usize {
        self.state.failures().len()
    }

    /// A fresh batch to start filling, with the context injected if any.
    pub fn new_batch(&self) -> C::Batch {
        let (batch, injected) = self.replication.new_batch(&self.collector);
        self.injected.store(injected, Ordering::SeqCst);
        batch
    }

    /// Size of `batch` without the context injected into it.
    pub fn appended_size(&self, batch: &C::Batch) -> usize {
        self.collector
            .batch_size(batch)
            .saturating_sub(self.injected.load(Ordering::SeqCst))
    }

    /// Flushes `batch` once the producer has appended `max_batch_size`
    /// statements to it.
    ///
    /// Returns the same batch when it is not full, or its replacement when
    /// it was dispatched. Blocks while every worker is busy.
    pub fn submit(&self, batch: C::Batch) -> Result<C::Batch> {
        let injected = self.injected.load(Ordering::SeqCst);
        if !self.collector.should_flush_with(&batch, injected) {
            return Ok(batch);
        }
        self.dispatch(batch, false)
    }

    /// Dispatches `batch` regardless of its size (end of stream).
    ///
    /// A batch with nothing in it, not even injected context, is returned
    /// as is instead of being sent to a job.
    pub fn flush(&self, batch: C::Batch) -> Result<C::Batch> {
        if self.collector.batch_size(&batch) == 0 {
            return Ok(batch);
        }
        self.dispatch(batch, true)
    }

    fn dispatch(&self, batch: C::Batch, forced: bool) -> Result<C::Batch> {
        let sender = self.sender.as_ref().ok_or(Error::PoolShutdown)?;
        let size = self.collector.batch_size(&batch);
        let appended = self.appended_size(&batch);
        let (replacement, injected) = self.replication.on_flush(&self.collector, &batch);

        let sequence = self.dispatched.fetch_add(1, Ordering::SeqCst);
        debug!(sequence, size, appended, forced, "dispatching batch");

        if sender.send(Dispatch { sequence, batch }).is_err() {
            self.dispatched.fetch_sub(1, Ordering::SeqCst);
            return Err(Error::PoolShutdown);
        }
        self.injected.store(injected, Ordering::SeqCst);
        Ok(replacement)
    }

    /// Closes the channel and joins every worker. Idempotent.
    fn shutdown(&mut self) {
        // Closing the channel makes each worker's recv() fail once the
        // queue is drained, which ends its loop.
        drop(self.sender.take());
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                warn!("batch worker thread panicked outside a job");
            }
        }
    }

    /// Waits for every dispatched job and returns the run's summary.
    ///
    /// Unlike [`await_completion`](Self::await_completion) this never fails.
    /// Job failures are left in the report.
    pub fn finish(mut self) -> DispatchReport<C::Batch> {
        let pool_size = self.workers.len();
        self.shutdown();

        let failures = std::mem::take(&mut *self.state.failures());
        let report = DispatchReport {
            dispatched: self.dispatched.load(Ordering::SeqCst),
            completed: self.state.completed.load(Ordering::SeqCst),
            failures,
            context: self.replication.take_context(),
            elapsed: self.started.elapsed(),
        };

        info!(
            pool_size,
            dispatched = report.dispatched,
            completed = report.completed,
            failed = report.failures.len(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "batch dispatcher finished"
        );
        report
    }

    /// Completion barrier: blocks until every dispatched job has returned.
    ///
    /// # Errors
    ///
    /// [`Error::BatchJobs`] listing every failed job, if any failed.
    pub fn await_completion(self) -> Result<DispatchReport<C::Batch>> {
        self.finish().into_result()
    }
}

impl<C: BatchCollector> Drop for BatchDispatcher<C> {
    fn drop(&mut self) {
        if self.workers.is_empty() {
            return;
        }
        self.shutdown();
        let failed = self.state.failures().len();
        if failed > 0 {
            warn!(failed, "batch dispatcher dropped without awaiting completion");
        }
    }
}

impl<C: BatchCollector> fmt::Debug for BatchDispatcher<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchDispatcher")
            .field("pool_size", &self.pool_size())
            .field("max_batch_size", &self.collector.max_batch_size())
            .field("context_mode", &self.replication.mode())
            .field("dispatched", &self.dispatched())
            .field("completed", &self.completed())
            .finish()
    }
}

/// Worker loop: take the next batch, run the job, record the outcome.
fn run_worker<B: BatchContainer>(
    job: Arc<dyn BatchJob<B>>,
    receiver: Arc<Mutex<Receiver<Dispatch<B>>>>,
    state: Arc<PoolState>,
) {
    loop {
        // Only hold the lock while waiting, never while running the job.
        let next = {
            let rx = receiver
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            rx.recv()
        };
        let Ok(Dispatch { sequence, batch }) = next else {
            break;
        };

        let size = batch.size();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| job.run(batch)));
        let error = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(err)) => Some(err),
            Err(payload) => Some(Error::Job(panic_message(payload.as_ref()))),
        };

        match error {
            None => debug!(sequence, size, "batch job completed"),
            Some(error) => {
                warn!(sequence, size, %error, "batch job failed");
                state.failures().push(JobFailure {
                    sequence,
                    size,
                    error,
                });
            }
        }
        state.completed.fetch_add(1, Ordering::SeqCst);
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("job panicked: {msg}")
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("job panicked: {msg}")
    } else {
        "job panicked".to_string()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::VecCollector;
    use std::sync::atomic::AtomicUsize;

    fn feed(dispatcher: &BatchDispatcher<VecCollector<u32>>, items: std::ops::Range<u32>) {
        let mut batch = dispatcher.new_batch();
        for item in items {
            batch.push(item);
            batch = dispatcher.submit(batch).expect("submit");
        }
        dispatcher.flush(batch).expect("final flush");
    }

    /// 25 items with a maximum of 10: two full batches, then a final 5.
    #[test]
    fn test_twenty_five_items_make_three_batches() {
        let sizes = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&sizes);

        let dispatcher = BatchDispatcher::new(
            VecCollector::new(10),
            move |batch: Vec<u32>| -> Result<()> {
                seen.lock().expect("sizes lock").push(batch.len());
                Ok(())
            },
            DispatcherConfig::new(1),
        )
        .expect("spawn dispatcher");

        feed(&dispatcher, 0..25);
        let report = dispatcher.await_completion().expect("no job fails");

        assert_eq!(report.dispatched, 3);
        assert_eq!(report.completed, 3);
        assert_eq!(*sizes.lock().expect("sizes lock"), vec![10, 10, 5]);
    }

    #[test]
    fn test_exact_multiple_sends_no_empty_tail() {
        let dispatcher = BatchDispatcher::new(
            VecCollector::new(5),
            |batch: Vec<u32>| -> Result<()> {
                assert!(!batch.is_empty());
                Ok(())
            },
            DispatcherConfig::new(2),
        )
        .expect("spawn dispatcher");

        feed(&dispatcher, 0..20);
        let report = dispatcher.await_completion().expect("no job fails");
        assert_eq!(report.dispatched, 4);
    }

    #[test]
    fn test_failures_are_collected_and_ingestion_continues() {
        let dispatcher = BatchDispatcher::new(
            VecCollector::new(2),
            |batch: Vec<u32>| -> Result<()> {
                if batch.contains(&3) {
                    Err(Error::Job("odd batch".to_string()))
                } else if batch.contains(&5) {
                    panic!("boom");
                } else {
                    Ok(())
                }
            },
            DispatcherConfig::new(2),
        )
        .expect("spawn dispatcher");

        feed(&dispatcher, 0..8);
        let report = dispatcher.finish();

        assert_eq!(report.dispatched, 4);
        assert_eq!(report.completed, 4);
        let mut sequences: Vec<_> = report.failures.iter().map(|f| f.sequence).collect();
        sequences.sort_unstable();
        assert_eq!(sequences, vec![1, 2]);
        assert!(report
            .failures
            .iter()
            .any(|f| f.error.to_string().contains("job panicked: boom")));

        match report.into_result() {
            Err(Error::BatchJobs { failures }) => assert_eq!(failures.len(), 2),
            other => panic!("expected BatchJobs, got {other:?}"),
        }
    }

    #[test]
    fn test_worker_threads_are_named() {
        let names = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&names);
        let dispatcher = BatchDispatcher::new(
            VecCollector::new(1),
            move |_batch: Vec<u32>| -> Result<()> {
                let name = thread::current().name().unwrap_or_default().to_string();
                seen.lock().expect("names lock").push(name);
                Ok(())
            },
            DispatcherConfig::new(3),
        )
        .expect("spawn dispatcher");
        assert_eq!(dispatcher.pool_size(), 3);

        feed(&dispatcher, 0..6);
        dispatcher.await_completion().expect("no job fails");

        assert!(names
            .lock()
            .expect("names lock")
            .iter()
            .all(|n| n.starts_with("tripleflow-worker-")));
    }

    #[test]
    fn test_zero_pool_size_still_runs() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let dispatcher = BatchDispatcher::new(
            VecCollector::new(4),
            move |_batch: Vec<u32>| -> Result<()> {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
            DispatcherConfig::new(0),
        )
        .expect("spawn dispatcher");
        assert_eq!(dispatcher.pool_size(), 1);

        feed(&dispatcher, 0..9);
        dispatcher.await_completion().expect("no job fails");
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    /// Dropping the dispatcher waits for the jobs already handed off.
    #[test]
    fn test_drop_joins_workers() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let dispatcher = BatchDispatcher::new(
            VecCollector::new(1),
            move |_batch: Vec<u32>| -> Result<()> {
                thread::sleep(Duration::from_millis(50));
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
            DispatcherConfig::new(2),
        )
        .expect("spawn dispatcher");

        let mut batch = dispatcher.new_batch();
        for item in 0..2 {
            batch.push(item);
            batch = dispatcher.submit(batch).expect("submit");
        }
        drop(dispatcher);

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    /// A context larger than the maximum does not shrink the batches.
    #[test]
    fn test_injected_context_is_not_counted() {
        let sizes = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&sizes);
        let dispatcher = BatchDispatcher::new(
            VecCollector::new(4),
            move |batch: Vec<u32>| -> Result<()> {
                seen.lock().expect("sizes lock").push(batch.len());
                Ok(())
            },
            DispatcherConfig::new(1),
        )
        .expect("spawn dispatcher");
        dispatcher.set_context(vec![100, 101, 102, 103, 104, 105]);

        feed(&dispatcher, 0..10);
        let report = dispatcher.await_completion().expect("no job fails");

        assert_eq!(report.dispatched, 3);
        assert_eq!(*sizes.lock().expect("sizes lock"), vec![10, 10, 8]);
    }
}
