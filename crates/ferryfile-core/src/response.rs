//! Halt reasons and the responses a caller can give to them.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumIter};

/// Why the engine stopped and asked for a decision.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, AsRefStr, EnumIter,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum HaltReason {
    /// A file already exists at the destination.
    DestinationExists,
    /// The source file is read-only and must be made writable first.
    SourceReadOnly,
    /// The existing destination file is read-only.
    DestinationReadOnly,
    /// Clearing the read-only flag failed.
    FailedToMakeWritable,
    /// The source no longer exists.
    SourceMissing,
    /// A destination directory could not be created.
    FailedToCreateDirectory,
    /// Removing a file or directory failed.
    FailedToDelete,
    /// Any other transfer failure.
    UnknownTransferError,
}

impl HaltReason {
    /// Whether a `proceed` response can move past this halt.
    ///
    /// For the remaining reasons there is nothing to proceed with; a proceed
    /// response is treated as skip.
    pub fn allows_proceed(&self) -> bool {
        matches!(
            self,
            Self::DestinationExists | Self::SourceReadOnly | Self::DestinationReadOnly
        )
    }

    /// Whether a `rename` response is meaningful for this halt.
    pub fn allows_rename(&self) -> bool {
        matches!(self, Self::DestinationExists)
    }
}

impl std::fmt::Display for HaltReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DestinationExists => write!(f, "Destination already exists"),
            Self::SourceReadOnly => write!(f, "Source is read-only"),
            Self::DestinationReadOnly => write!(f, "Destination is read-only"),
            Self::FailedToMakeWritable => write!(f, "Failed to make item writable"),
            Self::SourceMissing => write!(f, "Source does not exist"),
            Self::FailedToCreateDirectory => write!(f, "Failed to create directory"),
            Self::FailedToDelete => write!(f, "Failed to delete"),
            Self::UnknownTransferError => write!(f, "Transfer failed"),
        }
    }
}

/// A caller's answer to a halt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UserResponse {
    /// Go ahead with this item.
    ProceedThis,
    /// Go ahead with this item and every later halt of the same reason.
    ProceedAll,
    /// Leave this item as it is.
    SkipThis,
    /// Leave this item and every later item halting for the same reason.
    SkipAll,
    /// Retry the item under a new file name (not a path).
    Rename(String),
    /// Attempt the failed action again.
    Retry,
    /// Stop the whole operation.
    Abort,
}

impl UserResponse {
    /// Whether this response is remembered for the rest of the operation.
    pub fn is_memoizable(&self) -> bool {
        matches!(self, Self::ProceedAll | Self::SkipAll)
    }

    /// Whether this is a proceed response.
    pub fn is_proceed(&self) -> bool {
        matches!(self, Self::ProceedThis | Self::ProceedAll)
    }
}

impl std::fmt::Display for UserResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ProceedThis => write!(f, "Proceed"),
            Self::ProceedAll => write!(f, "Proceed for all"),
            Self::SkipThis => write!(f, "Skip"),
            Self::SkipAll => write!(f, "Skip all"),
            Self::Rename(name) => write!(f, "Rename to '{name}'"),
            Self::Retry => write!(f, "Retry"),
            Self::Abort => write!(f, "Abort"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_reason_codes_are_kebab_case() {
        assert_eq!(HaltReason::DestinationExists.as_ref(), "destination-exists");
        assert_eq!(
            HaltReason::UnknownTransferError.as_ref(),
            "unknown-transfer-error"
        );
        assert_eq!(HaltReason::iter().count(), 8);
    }

    #[test]
    fn test_memoizable_responses() {
        assert!(UserResponse::SkipAll.is_memoizable());
        assert!(UserResponse::ProceedAll.is_memoizable());
        assert!(!UserResponse::SkipThis.is_memoizable());
        assert!(!UserResponse::Rename("x".into()).is_memoizable());
        assert!(!UserResponse::Abort.is_memoizable());
    }

    #[test]
    fn test_proceedable_reasons() {
        assert!(HaltReason::DestinationExists.allows_proceed());
        assert!(HaltReason::SourceReadOnly.allows_proceed());
        assert!(!HaltReason::FailedToDelete.allows_proceed());
        assert!(!HaltReason::SourceMissing.allows_proceed());
        assert!(HaltReason::DestinationExists.allows_rename());
        assert!(!HaltReason::DestinationReadOnly.allows_rename());
    }
}
