//! The caller-owned engine: one operation on one dedicated worker thread.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread::{self, JoinHandle};

use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use ferryfile_core::{EngineConfig, Entry, FsEntry, HaltReason, UserResponse};

use crate::worker::Worker;
use crate::{Control, Observer, OperationRequest, ProtocolError};

/// Errors from starting or joining an engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("The engine has already been started")]
    AlreadyStarted,

    #[error("Failed to spawn the worker thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("The worker thread panicked")]
    WorkerPanicked,
}

struct Job<E: Entry> {
    request: OperationRequest<E>,
    config: EngineConfig,
    observer: Arc<dyn Observer<E>>,
}

/// Executes exactly one copy, move or delete.
///
/// Nothing happens until [`Engine::start`]. Dropping the engine cancels the
/// operation and waits for the worker to wind down.
pub struct Engine<E: Entry = FsEntry> {
    control: Control,
    job: Option<Job<E>>,
    worker: Option<JoinHandle<()>>,
}

impl<E: Entry> Engine<E> {
    pub fn new(request: OperationRequest<E>, config: EngineConfig, observer: Arc<dyn Observer<E>>) -> Self {
        Self {
            control: Control::new(),
            job: Some(Job {
                request,
                config,
                observer,
            }),
            worker: None,
        }
    }

    /// Launch the worker thread and return once it is running.
    ///
    /// Blocks briefly on the start signal, so it must not be called from
    /// inside an async runtime worker.
    pub fn start(&mut self) -> Result<(), EngineError> {
        let job = self.job.take().ok_or(EngineError::AlreadyStarted)?;
        let (kind, sources, destination) = job.request.into_parts();

        let shared = Arc::clone(&self.control.shared);
        let worker = Worker::new(kind, job.config, job.observer, Arc::clone(&shared));
        let (ready_tx, ready_rx) = oneshot::channel();

        let handle = thread::Builder::new()
            .name(format!("ferry-{}", kind.to_string().to_lowercase()))
            .spawn(move || {
                shared.in_progress.store(true, Ordering::SeqCst);
                let _ = ready_tx.send(());
                worker.run(sources, destination);
            })
            .map_err(EngineError::Spawn)?;
        self.worker = Some(handle);

        if ready_rx.blocking_recv().is_err() {
            warn!("worker exited before signalling start");
        }
        debug!(%kind, "engine started");
        Ok(())
    }

    /// Cloneable handle for pausing, cancelling and answering halts from
    /// other threads.
    pub fn control(&self) -> Control {
        self.control.clone()
    }

    pub fn cancel(&self) {
        self.control.cancel();
    }

    pub fn toggle_pause(&self) -> bool {
        self.control.toggle_pause()
    }

    pub fn is_paused(&self) -> bool {
        self.control.is_paused()
    }

    pub fn is_working(&self) -> bool {
        self.control.is_working()
    }

    pub fn is_done(&self) -> bool {
        self.control.is_done()
    }

    pub fn deliver_user_response(&self, reason: HaltReason, response: UserResponse) -> Result<(), ProtocolError> {
        self.control.deliver_user_response(reason, response)
    }

    /// Block until the worker has finished. Returns immediately if the
    /// engine was never started or has already been joined.
    pub fn wait(&mut self) -> Result<(), EngineError> {
        match self.worker.take() {
            Some(handle) => handle.join().map_err(|_| EngineError::WorkerPanicked),
            None => Ok(()),
        }
    }
}

impl<E: Entry> Drop for Engine<E> {
    fn drop(&mut self) {
        if let Some(handle) = self.worker.take() {
            self.control.cancel();
            if handle.join().is_err() {
                warn!("worker thread panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ChannelObserver, OperationEvent, Outcome};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_start_twice_is_rejected() {
        let (observer, _rx) = ChannelObserver::new();
        let mut engine = Engine::new(
            OperationRequest::<FsEntry>::delete(Vec::new()),
            EngineConfig::default(),
            Arc::new(observer),
        );
        engine.start().unwrap();
        assert!(matches!(engine.start(), Err(EngineError::AlreadyStarted)));
        engine.wait().unwrap();
        assert!(engine.is_done());
        assert!(!engine.is_working());
    }

    #[test]
    fn test_drop_releases_a_pending_halt() {
        let temp = TempDir::new().unwrap();
        let (observer, mut rx) = ChannelObserver::new();
        let mut engine = Engine::new(
            OperationRequest::delete(vec![FsEntry::new(temp.path().join("missing"))]),
            EngineConfig::default(),
            Arc::new(observer),
        );
        engine.start().unwrap();

        // Wait for the halt, then drop without answering.
        loop {
            match rx.blocking_recv() {
                Some(OperationEvent::Halted(event)) => {
                    assert_eq!(event.reason, HaltReason::SourceMissing);
                    break;
                }
                Some(_) => continue,
                None => panic!("channel closed before halt"),
            }
        }
        drop(engine);

        let finished = std::iter::from_fn(|| rx.blocking_recv()).find_map(|event| match event {
            OperationEvent::Finished(summary) => Some(summary),
            _ => None,
        });
        assert_eq!(finished.map(|s| s.outcome), Some(Outcome::Cancelled));
    }

    #[test]
    fn test_worker_thread_is_named() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a"), "a").unwrap();

        struct NameProbe(std::sync::Mutex<Option<String>>);
        impl Observer<FsEntry> for NameProbe {
            fn on_progress(&self, _: &crate::ProgressSnapshot) {}
            fn on_halted(&self, _: &crate::HaltEvent<FsEntry>) {}
            fn on_finished(&self, _: &crate::OperationSummary) {
                *self.0.lock().unwrap() = thread::current().name().map(str::to_owned);
            }
        }

        let probe = Arc::new(NameProbe(std::sync::Mutex::new(None)));
        let mut engine = Engine::new(
            OperationRequest::delete(vec![FsEntry::new(temp.path().join("a"))]),
            EngineConfig::default(),
            probe.clone(),
        );
        engine.start().unwrap();
        engine.wait().unwrap();

        assert_eq!(probe.0.lock().unwrap().as_deref(), Some("ferry-delete"));
    }
}
