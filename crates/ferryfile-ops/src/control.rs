//! State shared between the worker thread and its callers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use ferryfile_core::{HaltReason, UserResponse};

use crate::protocol::{Mailbox, ProtocolError};

/// Flags and the response mailbox. The flags are plain atomics polled by the
/// worker; the mailbox is guarded by a mutex with a condvar the worker waits
/// on while a halt is open.
#[derive(Debug, Default)]
pub(crate) struct Shared {
    pub in_progress: AtomicBool,
    pub paused: AtomicBool,
    pub cancel_requested: AtomicBool,
    pub done: AtomicBool,
    pub mailbox: Mutex<Mailbox>,
    pub answered: Condvar,
}

impl Shared {
    /// Lock the mailbox. A panic while holding the lock leaves the mailbox in
    /// a consistent state, so poisoning is ignored.
    pub fn lock_mailbox(&self) -> MutexGuard<'_, Mailbox> {
        self.mailbox.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_requested.load(Ordering::SeqCst)
    }
}

/// Cloneable handle to a running engine: pause, cancel, query state, and
/// answer halts from any thread.
#[derive(Debug, Clone, Default)]
pub struct Control {
    pub(crate) shared: Arc<Shared>,
}

/// Handle used to answer halts. Same type as [`Control`]; the alias names the
/// role when a front end only forwards answers.
pub type Responder = Control;

impl Control {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent; also releases a worker blocked on a
    /// halt or a pause.
    pub fn cancel(&self) {
        if self.shared.cancel_requested.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!("cancel requested");
        let _guard = self.shared.lock_mailbox();
        self.shared.answered.notify_all();
    }

    /// Flip the paused flag and return the new value. Has no effect once
    /// the operation is done.
    pub fn toggle_pause(&self) -> bool {
        if self.is_done() {
            return false;
        }
        let paused = !self.shared.paused.fetch_xor(true, Ordering::SeqCst);
        debug!(paused, "pause toggled");
        paused
    }

    pub fn is_paused(&self) -> bool {
        self.shared.paused.load(Ordering::SeqCst)
    }

    /// Whether the worker has started and not yet finished.
    pub fn is_working(&self) -> bool {
        self.shared.in_progress.load(Ordering::SeqCst)
    }

    pub fn is_done(&self) -> bool {
        self.shared.done.load(Ordering::SeqCst)
    }

    /// Answer the pending halt of `reason`.
    ///
    /// The worker resumes once this returns `Ok`. A rejected answer leaves
    /// the halt pending.
    pub fn deliver_user_response(
        &self,
        reason: HaltReason,
        response: UserResponse,
    ) -> Result<(), ProtocolError> {
        if self.is_done() {
            return Err(ProtocolError::Finished);
        }
        let mut mailbox = self.shared.lock_mailbox();
        mailbox.answer(reason, response)?;
        self.shared.answered.notify_all();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_pause() {
        let control = Control::new();
        assert!(!control.is_paused());
        assert!(control.toggle_pause());
        assert!(control.is_paused());
        assert!(!control.toggle_pause());
        assert!(!control.is_paused());
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let control = Control::new();
        control.cancel();
        control.cancel();
        assert!(control.shared.is_cancelled());
    }

    #[test]
    fn test_response_after_done_is_rejected() {
        let control = Control::new();
        control.shared.done.store(true, Ordering::SeqCst);
        assert_eq!(
            control.deliver_user_response(HaltReason::SourceMissing, UserResponse::SkipThis),
            Err(ProtocolError::Finished)
        );
    }

    #[test]
    fn test_response_wakes_waiter() {
        let control = Control::new();
        control.shared.lock_mailbox().post(HaltReason::FailedToDelete);

        let waiter = {
            let shared = Arc::clone(&control.shared);
            std::thread::spawn(move || {
                let guard = shared.lock_mailbox();
                let mut guard = shared
                    .answered
                    .wait_while(guard, |m| !m.is_answered())
                    .unwrap();
                guard.take()
            })
        };

        control
            .deliver_user_response(HaltReason::FailedToDelete, UserResponse::Retry)
            .unwrap();
        assert_eq!(waiter.join().unwrap(), Some(UserResponse::Retry));
    }
}
