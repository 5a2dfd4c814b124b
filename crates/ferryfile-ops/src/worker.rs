//! The worker side of an engine: halt handling, pause/cancel checkpoints,
//! progress snapshots and finalize. The copy/move and delete loops live in
//! `transfer.rs` and `delete.rs` as further `impl Worker` blocks.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::{Arc, PoisonError};
use std::thread;

use tracing::{debug, info, warn};

use ferryfile_core::{EngineConfig, Entry, HaltReason, UserResponse};

use crate::control::Shared;
use crate::progress::{Stopwatch, eta_seconds, percent, throughput};
use crate::{HaltEvent, Observer, OperationKind, OperationSummary, Outcome, ProgressSnapshot};

/// Why the worker stopped before running out of items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stop {
    Aborted,
    Cancelled,
}

/// What to do with the current action after a halt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Resolution {
    Proceed,
    Skip,
    Retry,
}

/// Units of work done and expected: bytes for copy/move, items for delete.
#[derive(Debug, Default)]
pub(crate) struct Tally {
    pub done: u64,
    pub total: u64,
}

pub(crate) struct Worker<E: Entry> {
    pub kind: OperationKind,
    pub config: EngineConfig,
    observer: Arc<dyn Observer<E>>,
    shared: Arc<Shared>,
    remembered: HashMap<HaltReason, UserResponse>,
    pub pending_rename: Option<String>,
    stopwatch: Stopwatch,
    pub tally: Tally,
    pub summary: OperationSummary,
}

impl<E: Entry> Worker<E> {
    pub fn new(
        kind: OperationKind,
        config: EngineConfig,
        observer: Arc<dyn Observer<E>>,
        shared: Arc<Shared>,
    ) -> Self {
        let remembered = config.preset_map();
        Self {
            kind,
            config,
            observer,
            shared,
            remembered,
            pending_rename: None,
            stopwatch: Stopwatch::default(),
            tally: Tally::default(),
            summary: OperationSummary::new(kind),
        }
    }

    /// Run the whole operation and finalize.
    pub fn run(mut self, sources: Vec<E>, destination: Option<PathBuf>) {
        self.stopwatch.start();
        info!(kind = %self.kind, sources = sources.len(), "operation started");

        let result = if sources.iter().all(|s| s.is_parent_link()) {
            Ok(())
        } else {
            match (self.kind, destination) {
                (OperationKind::Delete, _) => self.run_delete(&sources),
                (_, Some(destination)) => self.run_transfer(&sources, &destination),
                (_, None) => {
                    warn!(kind = %self.kind, "no destination given");
                    Ok(())
                }
            }
        };

        self.finalize(result);
    }

    /// Ask the caller what to do about `reason`.
    ///
    /// Memoized "-all" answers (including presets) are reused without a
    /// round-trip. Returns `Err` when the answer is abort or when the
    /// operation is cancelled while waiting.
    pub fn halt(
        &mut self,
        reason: HaltReason,
        source: &E,
        destination: Option<&E>,
        message: impl Into<String>,
    ) -> Result<Resolution, Stop> {
        if let Some(response) = self.remembered.get(&reason).cloned() {
            debug!(reason = reason.as_ref(), %response, "using remembered response");
            return self.resolve(reason, response);
        }

        let event = HaltEvent {
            reason,
            source: source.clone(),
            destination: destination.cloned(),
            message: message.into(),
        };
        warn!(
            reason = reason.as_ref(),
            path = %source.path().display(),
            message = %event.message,
            "operation halted"
        );

        self.stopwatch.pause();
        // Post before notifying so the observer may answer from inside the
        // callback.
        self.shared.lock_mailbox().post(reason);
        self.observer.on_halted(&event);

        let shared = Arc::clone(&self.shared);
        let response = {
            let guard = shared.lock_mailbox();
            let mut mailbox = shared
                .answered
                .wait_while(guard, |m| !m.is_answered() && !shared.is_cancelled())
                .unwrap_or_else(PoisonError::into_inner);
            mailbox.take()
        };
        self.stopwatch.resume();

        if self.shared.is_cancelled() {
            return Err(Stop::Cancelled);
        }
        let Some(response) = response else {
            return Err(Stop::Cancelled);
        };

        if response.is_memoizable() {
            self.remembered.insert(reason, response.clone());
        }
        self.resolve(reason, response)
    }

    fn resolve(&mut self, reason: HaltReason, response: UserResponse) -> Result<Resolution, Stop> {
        match response {
            UserResponse::Rename(name) => {
                self.pending_rename = Some(name);
                Ok(Resolution::Retry)
            }
            UserResponse::Retry => Ok(Resolution::Retry),
            UserResponse::Abort => {
                info!(reason = reason.as_ref(), "aborted by caller");
                Err(Stop::Aborted)
            }
            response if response.is_proceed() && reason.allows_proceed() => Ok(Resolution::Proceed),
            // Skip, or nothing to proceed past: leave the item alone.
            _ => Ok(Resolution::Skip),
        }
    }

    /// Poll point between actions: blocks while paused, fails on cancel.
    pub fn checkpoint(&mut self) -> Result<(), Stop> {
        if self.shared.paused.load(Ordering::SeqCst) && !self.shared.is_cancelled() {
            debug!("paused");
            self.stopwatch.pause();
            let interval = self.config.pause_poll_interval();
            while self.shared.paused.load(Ordering::SeqCst) && !self.shared.is_cancelled() {
                thread::sleep(interval);
            }
            self.stopwatch.resume();
            debug!("resumed");
        }

        if self.shared.is_cancelled() {
            Err(Stop::Cancelled)
        } else {
            Ok(())
        }
    }

    pub fn announce(&self, name: &str) {
        debug!(item = name, "current item");
        self.observer.on_current_item_changed(name);
    }

    /// Account a skipped item; its units still count as processed.
    pub fn skip(&mut self, units: u64) {
        self.tally.done += units;
        self.summary.skipped += 1;
    }

    pub fn emit_progress(&self, index: usize, total_items: usize, file_percent: f64, name: &str) {
        let rate = throughput(self.tally.done as f64, self.stopwatch.elapsed());
        let remaining = self.tally.total.saturating_sub(self.tally.done) as f64;
        let snapshot = ProgressSnapshot {
            total_percent: percent(self.tally.done, self.tally.total),
            current_index: index,
            total_items,
            current_file_percent: file_percent,
            current_file: name.to_owned(),
            throughput: rate,
            eta_seconds: eta_seconds(remaining, rate),
        };
        self.observer.on_progress(&snapshot);
    }

    fn finalize(mut self, result: Result<(), Stop>) {
        self.stopwatch.pause();
        self.summary.elapsed = self.stopwatch.elapsed();
        self.summary.outcome = match result {
            Ok(()) => Outcome::Completed,
            Err(Stop::Aborted) => Outcome::Aborted,
            Err(Stop::Cancelled) => Outcome::Cancelled,
        };

        // A halt left open by cancellation is discarded.
        *self.shared.lock_mailbox() = Default::default();
        self.shared.done.store(true, Ordering::SeqCst);
        self.shared.paused.store(false, Ordering::SeqCst);
        self.shared.in_progress.store(false, Ordering::SeqCst);

        info!(
            elapsed_ms = self.summary.elapsed.as_millis() as u64,
            bytes = self.summary.bytes_transferred,
            "{}",
            self.summary.summary()
        );
        self.observer.on_finished(&self.summary);
    }
}
