//! The `Entry` capability the operation engine drives.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::EntryError;

/// One filesystem object (file or directory) plus the primitive actions the
/// engine needs to perform on it.
///
/// The engine never interprets paths on its own beyond joining names onto
/// directories; every query and mutation goes through this trait, so tests
/// and alternative backends can supply their own implementation.
pub trait Entry: Clone + Send + 'static {
    /// Build an entry for an arbitrary path (used for destinations).
    fn locate(path: &Path) -> Self;

    /// Create a directory and any missing parents. Succeeds when the
    /// directory already exists.
    fn create_dir_all(path: &Path) -> Result<(), EntryError>;

    /// Full path of the entry.
    fn path(&self) -> &Path;

    /// Final path component, or the whole path when there is none.
    fn name(&self) -> String {
        self.path()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path().to_string_lossy().into_owned())
    }

    /// Directory containing this entry.
    fn parent_path(&self) -> PathBuf {
        self.path().parent().map(Path::to_path_buf).unwrap_or_default()
    }

    /// Whether this is the synthetic "go to parent" pseudo-entry.
    fn is_parent_link(&self) -> bool {
        false
    }

    fn exists(&self) -> bool;
    fn is_file(&self) -> bool;
    fn is_dir(&self) -> bool;
    fn is_empty_dir(&self) -> bool;
    /// Size in bytes; zero for directories.
    fn size(&self) -> u64;
    fn is_writable(&self) -> bool;
    fn modified(&self) -> Option<SystemTime>;

    /// Whether this entry lives on the same volume as `other` (or, when
    /// `other` does not exist yet, as its nearest existing ancestor).
    fn is_same_volume_as(&self, other: &Path) -> bool;

    /// Immediate children of a directory, in a stable order.
    fn children(&self) -> Result<Vec<Self>, EntryError>;

    /// Rename or move atomically into `dest_dir` under `new_name`.
    ///
    /// Must fail with [`EntryError::AlreadyExists`] instead of replacing an
    /// existing target.
    fn rename_or_move(&mut self, dest_dir: &Path, new_name: &str) -> Result<(), EntryError>;

    /// Remove a file or an empty directory.
    fn remove(&mut self) -> Result<(), EntryError>;

    fn make_writable(&mut self, writable: bool) -> Result<(), EntryError>;

    /// Copy the next chunk of at most `chunk_size` bytes into
    /// `dest_dir/new_name` (or `dest_dir/<own name>` when `new_name` is
    /// `None`). The first call opens the transfer.
    fn copy_next_chunk(
        &mut self,
        chunk_size: u64,
        dest_dir: &Path,
        new_name: Option<&str>,
    ) -> Result<(), EntryError>;

    /// Whether a chunked copy has been started and not yet finished.
    fn is_copy_in_progress(&self) -> bool;

    /// Bytes written by the current (or last finished) chunked copy.
    fn bytes_copied(&self) -> u64;

    /// Abandon an in-flight chunked copy, discarding the partial target.
    fn cancel_copy(&mut self) -> Result<(), EntryError>;
}
