//! Operation requests.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use ferryfile_core::Entry;

/// The kind of bulk operation an engine performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Copy,
    Move,
    Delete,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Copy => write!(f, "Copy"),
            Self::Move => write!(f, "Move"),
            Self::Delete => write!(f, "Delete"),
        }
    }
}

/// One operation to run: what to do, on which entries, and where to.
///
/// Requests are immutable once built and are consumed by the engine.
#[derive(Debug, Clone)]
pub struct OperationRequest<E: Entry> {
    kind: OperationKind,
    sources: Vec<E>,
    destination: Option<PathBuf>,
}

impl<E: Entry> OperationRequest<E> {
    /// Copy `sources` to `destination`.
    ///
    /// A destination that exists as a directory, or whose path ends with a
    /// separator, receives the sources. Otherwise a single file source is
    /// copied *as* the destination path.
    pub fn copy(sources: Vec<E>, destination: impl Into<PathBuf>) -> Self {
        Self {
            kind: OperationKind::Copy,
            sources,
            destination: Some(destination.into()),
        }
    }

    /// Move `sources` to `destination`, with the same destination rules as
    /// [`OperationRequest::copy`].
    pub fn move_to(sources: Vec<E>, destination: impl Into<PathBuf>) -> Self {
        Self {
            kind: OperationKind::Move,
            sources,
            destination: Some(destination.into()),
        }
    }

    /// Delete `targets` and everything below them.
    pub fn delete(targets: Vec<E>) -> Self {
        Self {
            kind: OperationKind::Delete,
            sources: targets,
            destination: None,
        }
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn sources(&self) -> &[E] {
        &self.sources
    }

    pub fn destination(&self) -> Option<&Path> {
        self.destination.as_deref()
    }

    /// Whether there is nothing to operate on (parent links do not count).
    pub fn is_empty(&self) -> bool {
        self.sources.iter().all(|s| s.is_parent_link())
    }

    pub(crate) fn into_parts(self) -> (OperationKind, Vec<E>, Option<PathBuf>) {
        (self.kind, self.sources, self.destination)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferryfile_core::FsEntry;

    #[test]
    fn test_request_constructors() {
        let copy = OperationRequest::copy(vec![FsEntry::new("/a")], "/dst");
        assert_eq!(copy.kind(), OperationKind::Copy);
        assert_eq!(copy.destination(), Some(Path::new("/dst")));

        let delete = OperationRequest::delete(vec![FsEntry::new("/a"), FsEntry::new("/b")]);
        assert_eq!(delete.kind(), OperationKind::Delete);
        assert_eq!(delete.sources().len(), 2);
        assert!(delete.destination().is_none());
    }

    #[test]
    fn test_request_of_parent_links_is_empty() {
        let request = OperationRequest::delete(vec![FsEntry::parent_link("/tmp")]);
        assert!(request.is_empty());
        assert!(OperationRequest::<FsEntry>::delete(Vec::new()).is_empty());
    }
}
