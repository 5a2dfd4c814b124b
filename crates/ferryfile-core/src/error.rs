//! Error types for primitive entry actions.

use std::path::PathBuf;

use thiserror::Error;

/// Errors returned by the primitive actions of an [`Entry`](crate::Entry).
#[derive(Debug, Error)]
pub enum EntryError {
    /// The target of a rename or move already exists.
    #[error("Target already exists: {path}")]
    AlreadyExists { path: PathBuf },

    /// Path not found.
    #[error("Path not found: {path}")]
    NotFound { path: PathBuf },

    /// Permission denied for a path.
    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    /// A directory was expected.
    #[error("Not a directory: {path}")]
    NotADirectory { path: PathBuf },

    /// Generic I/O error.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl EntryError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            std::io::ErrorKind::AlreadyExists => Self::AlreadyExists { path },
            std::io::ErrorKind::NotADirectory => Self::NotADirectory { path },
            _ => Self::Io { path, source },
        }
    }

    /// The path the error refers to.
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::AlreadyExists { path }
            | Self::NotFound { path }
            | Self::PermissionDenied { path }
            | Self::NotADirectory { path }
            | Self::Io { path, .. } => path,
        }
    }

    /// Whether this error reports an existing target.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_error_io() {
        let err = EntryError::io(
            "/test/path",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(matches!(err, EntryError::PermissionDenied { .. }));

        let err = EntryError::io(
            "/test/path",
            std::io::Error::new(std::io::ErrorKind::AlreadyExists, "exists"),
        );
        assert!(err.is_already_exists());
        assert_eq!(err.path(), std::path::Path::new("/test/path"));
    }

    #[test]
    fn test_entry_error_keeps_source() {
        let err = EntryError::io("/disk", std::io::Error::other("disk on fire"));
        assert!(matches!(err, EntryError::Io { .. }));
        assert!(err.to_string().contains("disk on fire"));
    }
}
