//! Progress reporting types for file operations.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::OperationKind;

/// Progress of a running operation, emitted after every transfer chunk
/// (copy/move) or before every removal (delete).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// Overall completion, 0.0 to 100.0. Byte based for copy/move, item
    /// based for delete.
    pub total_percent: f64,
    /// Index of the item being processed.
    pub current_index: usize,
    /// Number of items in the operation.
    pub total_items: usize,
    /// Completion of the current file, 0.0 to 100.0.
    pub current_file_percent: f64,
    /// Name of the item being processed.
    pub current_file: String,
    /// Bytes per second for copy/move, items per second for delete.
    pub throughput: f64,
    /// Estimated seconds remaining.
    pub eta_seconds: u64,
}

/// Percentage of `done` in `total`; zero when the total is unknown.
pub fn percent(done: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        (done as f64 / total as f64 * 100.0).min(100.0)
    }
}

/// Units processed per second of active (unpaused) time.
pub fn throughput(done: f64, elapsed: Duration) -> f64 {
    done / elapsed.as_secs_f64().max(1e-6)
}

/// Seconds needed for `remaining` units at `rate` units per second.
pub fn eta_seconds(remaining: f64, rate: f64) -> u64 {
    if rate > 0.0 && remaining > 0.0 {
        (remaining / rate) as u64
    } else {
        0
    }
}

/// Elapsed-time accumulator that stops counting while the operation is
/// paused or waiting for the caller.
#[derive(Debug, Default)]
pub(crate) struct Stopwatch {
    accumulated: Duration,
    running_since: Option<Instant>,
}

impl Stopwatch {
    pub fn start(&mut self) {
        self.accumulated = Duration::ZERO;
        self.running_since = Some(Instant::now());
    }

    pub fn pause(&mut self) {
        if let Some(since) = self.running_since.take() {
            self.accumulated += since.elapsed();
        }
    }

    pub fn resume(&mut self) {
        if self.running_since.is_none() {
            self.running_since = Some(Instant::now());
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.accumulated + self.running_since.map(|s| s.elapsed()).unwrap_or_default()
    }
}

/// How an operation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// Every item was processed or skipped.
    Completed,
    /// The caller cancelled.
    Cancelled,
    /// A halt was answered with abort.
    Aborted,
}

/// Result of a finished operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationSummary {
    /// The type of operation.
    pub kind: OperationKind,
    /// How the operation ended.
    pub outcome: Outcome,
    /// Number of items carried out.
    pub processed: usize,
    /// Number of items left untouched after a skip response.
    pub skipped: usize,
    /// Bytes written to destinations.
    pub bytes_transferred: u64,
    /// Active time, excluding pauses and halts.
    pub elapsed: Duration,
}

impl OperationSummary {
    pub(crate) fn new(kind: OperationKind) -> Self {
        Self {
            kind,
            outcome: Outcome::Completed,
            processed: 0,
            skipped: 0,
            bytes_transferred: 0,
            elapsed: Duration::ZERO,
        }
    }

    /// Check if the operation ran to completion without skipping anything.
    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Completed && self.skipped == 0
    }

    /// Get a human-readable summary of the operation.
    pub fn summary(&self) -> String {
        let action = match self.kind {
            OperationKind::Copy => "Copied",
            OperationKind::Move => "Moved",
            OperationKind::Delete => "Deleted",
        };

        let mut line = format!("{} {} items", action, self.processed);
        if self.skipped > 0 {
            line.push_str(&format!(", {} skipped", self.skipped));
        }
        match self.outcome {
            Outcome::Completed => {}
            Outcome::Cancelled => line.push_str(" (cancelled)"),
            Outcome::Aborted => line.push_str(" (aborted)"),
        }
        line
    }
}
