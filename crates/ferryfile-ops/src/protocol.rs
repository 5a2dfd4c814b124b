//! Halt/response protocol between the worker and the caller.
//!
//! At most one halt is outstanding at a time. The worker posts the halt
//! reason into a single-slot [`Mailbox`], notifies the observer, and blocks
//! until the caller answers. Answers that do not fit the mailbox state are
//! rejected with a [`ProtocolError`] instead of overwriting anything.

use thiserror::Error;

use ferryfile_core::{HaltReason, NameError, UserResponse, validate_file_name};

/// A request for a caller decision.
#[derive(Debug, Clone)]
pub struct HaltEvent<E> {
    pub reason: HaltReason,
    /// The item the engine was working on.
    pub source: E,
    /// The conflicting or unwritable destination, when there is one.
    pub destination: Option<E>,
    /// Diagnostic text from the failed action (may be empty).
    pub message: String,
}

/// Misuse of the response side of the protocol.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("No halt is waiting for a response")]
    NoPendingHalt,

    #[error("Response for '{got}' does not match the pending halt '{expected}'")]
    ReasonMismatch { expected: HaltReason, got: HaltReason },

    #[error("The pending halt has already been answered")]
    AlreadyAnswered,

    #[error("Rename is not a valid answer to '{0}'")]
    RenameNotAllowed(HaltReason),

    #[error("Invalid name: {0}")]
    InvalidName(#[from] NameError),

    #[error("The operation has already finished")]
    Finished,
}

/// Single-slot rendezvous for one halt and its answer.
#[derive(Debug, Default)]
pub(crate) enum Mailbox {
    #[default]
    Idle,
    Pending(HaltReason),
    Answered(UserResponse),
}

impl Mailbox {
    /// Open a halt. The previous one must have been consumed.
    pub fn post(&mut self, reason: HaltReason) {
        debug_assert!(matches!(self, Mailbox::Idle), "halt posted while another is open");
        *self = Mailbox::Pending(reason);
    }

    /// Store the caller's answer for the pending halt.
    pub fn answer(&mut self, reason: HaltReason, response: UserResponse) -> Result<(), ProtocolError> {
        match self {
            Mailbox::Idle => Err(ProtocolError::NoPendingHalt),
            Mailbox::Answered(_) => Err(ProtocolError::AlreadyAnswered),
            Mailbox::Pending(expected) if *expected != reason => Err(ProtocolError::ReasonMismatch {
                expected: *expected,
                got: reason,
            }),
            Mailbox::Pending(_) => {
                if let UserResponse::Rename(name) = &response {
                    if !reason.allows_rename() {
                        return Err(ProtocolError::RenameNotAllowed(reason));
                    }
                    validate_file_name(name)?;
                }
                *self = Mailbox::Answered(response);
                Ok(())
            }
        }
    }

    pub fn is_answered(&self) -> bool {
        matches!(self, Mailbox::Answered(_))
    }

    /// Consume the answer (if any) and return to idle.
    pub fn take(&mut self) -> Option<UserResponse> {
        match std::mem::take(self) {
            Mailbox::Answered(response) => Some(response),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_answer_without_halt_is_rejected() {
        let mut mailbox = Mailbox::default();
        assert_eq!(
            mailbox.answer(HaltReason::DestinationExists, UserResponse::SkipThis),
            Err(ProtocolError::NoPendingHalt)
        );
    }

    #[test]
    fn test_second_answer_is_rejected() {
        let mut mailbox = Mailbox::default();
        mailbox.post(HaltReason::FailedToDelete);
        mailbox
            .answer(HaltReason::FailedToDelete, UserResponse::Retry)
            .unwrap();
        assert_eq!(
            mailbox.answer(HaltReason::FailedToDelete, UserResponse::Abort),
            Err(ProtocolError::AlreadyAnswered)
        );
        assert_eq!(mailbox.take(), Some(UserResponse::Retry));
        assert!(matches!(mailbox, Mailbox::Idle));
    }

    #[test]
    fn test_reason_must_match() {
        let mut mailbox = Mailbox::default();
        mailbox.post(HaltReason::SourceMissing);
        let err = mailbox
            .answer(HaltReason::DestinationExists, UserResponse::SkipThis)
            .unwrap_err();
        assert!(matches!(err, ProtocolError::ReasonMismatch { .. }));
        assert!(!mailbox.is_answered());
    }

    #[test]
    fn test_rename_is_validated() {
        let mut mailbox = Mailbox::default();
        mailbox.post(HaltReason::DestinationExists);
        assert!(matches!(
            mailbox.answer(
                HaltReason::DestinationExists,
                UserResponse::Rename("a/b".into())
            ),
            Err(ProtocolError::InvalidName(_))
        ));
        mailbox
            .answer(
                HaltReason::DestinationExists,
                UserResponse::Rename("b.txt".into()),
            )
            .unwrap();

        let mut other = Mailbox::default();
        other.post(HaltReason::FailedToDelete);
        assert_eq!(
            other.answer(HaltReason::FailedToDelete, UserResponse::Rename("x".into())),
            Err(ProtocolError::RenameNotAllowed(HaltReason::FailedToDelete))
        );
    }
}
