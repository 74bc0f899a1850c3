//! Periodic progress logging for long iterations.

use std::time::Instant;

use tracing::{debug, info};

/// Default number of items between progress lines.
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 100_000;

/// Counts items and logs every `interval` of them.
#[derive(Debug)]
pub struct ProgressLogger {
    label: String,
    interval: u64,
    count: u64,
    started: Instant,
}

impl ProgressLogger {
    /// An interval of 0 disables the periodic lines.
    pub fn new(label: impl Into<String>, interval: u64) -> Self {
        Self {
            label: label.into(),
            interval,
            count: 0,
            started: Instant::now(),
        }
    }

    /// Counts one item. Returns true when a progress line was logged.
    pub fn tick(&mut self) -> bool {
        self.count += 1;
        if self.interval > 0 && self.count % self.interval == 0 {
            info!(
                label = %self.label,
                count = self.count,
                elapsed_ms = self.started.elapsed().as_millis() as u64,
                "progress"
            );
            return true;
        }
        false
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Logs the final count (at debug level) and returns it.
    pub fn finish(self) -> u64 {
        debug!(
            label = %self.label,
            count = self.count,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "finished"
        );
        self.count
    }
}
