//! `Entry` implementation backed by the local filesystem.

use std::fs::{self, File, Metadata, Permissions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::{Entry, EntryError};

/// A path on the local filesystem.
///
/// Metadata is never cached: every query reflects the current state on disk.
/// Symbolic links are treated as files and are never followed when listing
/// children.
#[derive(Debug)]
pub struct FsEntry {
    path: PathBuf,
    parent_link: bool,
    transfer: Option<ChunkedCopy>,
    copied: u64,
}

/// Open handles of an in-flight chunked copy.
#[derive(Debug)]
struct ChunkedCopy {
    source: File,
    target: File,
    target_path: PathBuf,
    permissions: Permissions,
}

impl FsEntry {
    /// Create an entry for a path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            parent_link: false,
            transfer: None,
            copied: 0,
        }
    }

    /// Create the ".." pseudo-entry of a directory listing.
    ///
    /// The engine ignores such entries wherever they appear in a request.
    pub fn parent_link(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(".."),
            parent_link: true,
            transfer: None,
            copied: 0,
        }
    }

    fn metadata(&self) -> Option<Metadata> {
        fs::symlink_metadata(&self.path).ok()
    }

    fn open_transfer(&self, dest_dir: &Path, new_name: Option<&str>) -> Result<ChunkedCopy, EntryError> {
        let source = File::open(&self.path).map_err(|e| EntryError::io(&self.path, e))?;
        let permissions = source
            .metadata()
            .map_err(|e| EntryError::io(&self.path, e))?
            .permissions();

        let name = new_name.map(str::to_owned).unwrap_or_else(|| self.name());
        let target_path = dest_dir.join(name);
        let target = File::create(&target_path).map_err(|e| EntryError::io(&target_path, e))?;

        Ok(ChunkedCopy {
            source,
            target,
            target_path,
            permissions,
        })
    }
}

impl Clone for FsEntry {
    /// Clones identify the same path; an in-flight transfer is not shared.
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            parent_link: self.parent_link,
            transfer: None,
            copied: self.copied,
        }
    }
}

impl Entry for FsEntry {
    fn locate(path: &Path) -> Self {
        Self::new(path)
    }

    fn create_dir_all(path: &Path) -> Result<(), EntryError> {
        fs::create_dir_all(path).map_err(|e| EntryError::io(path, e))
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn is_parent_link(&self) -> bool {
        self.parent_link
    }

    fn exists(&self) -> bool {
        self.metadata().is_some()
    }

    fn is_file(&self) -> bool {
        self.metadata()
            .map(|m| m.file_type().is_file() || m.file_type().is_symlink())
            .unwrap_or(false)
    }

    fn is_dir(&self) -> bool {
        self.metadata().map(|m| m.is_dir()).unwrap_or(false)
    }

    fn is_empty_dir(&self) -> bool {
        self.is_dir()
            && fs::read_dir(&self.path)
                .map(|mut entries| entries.next().is_none())
                .unwrap_or(false)
    }

    fn size(&self) -> u64 {
        // Follows links: a linked file is copied by content.
        fs::metadata(&self.path)
            .map(|m| if m.is_file() { m.len() } else { 0 })
            .unwrap_or(0)
    }

    fn is_writable(&self) -> bool {
        self.metadata()
            .map(|m| !m.permissions().readonly())
            .unwrap_or(false)
    }

    fn modified(&self) -> Option<SystemTime> {
        self.metadata().and_then(|m| m.modified().ok())
    }

    fn is_same_volume_as(&self, other: &Path) -> bool {
        let Some(mine) = self.metadata() else {
            return false;
        };
        let anchor = other
            .ancestors()
            .filter(|p| !p.as_os_str().is_empty())
            .find_map(|p| fs::metadata(p).ok().map(|m| (p, m)))
            .or_else(|| fs::metadata(".").ok().map(|m| (Path::new("."), m)));

        match anchor {
            Some((anchor_path, anchor_meta)) => {
                same_volume(&self.path, &mine, anchor_path, &anchor_meta)
            }
            None => false,
        }
    }

    fn children(&self) -> Result<Vec<Self>, EntryError> {
        let mut children = fs::read_dir(&self.path)
            .map_err(|e| EntryError::io(&self.path, e))?
            .map(|entry| {
                entry
                    .map(|e| FsEntry::new(e.path()))
                    .map_err(|e| EntryError::io(&self.path, e))
            })
            .collect::<Result<Vec<_>, _>>()?;
        children.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(children)
    }

    fn rename_or_move(&mut self, dest_dir: &Path, new_name: &str) -> Result<(), EntryError> {
        let target = dest_dir.join(new_name);
        if target.symlink_metadata().is_ok() {
            return Err(EntryError::AlreadyExists { path: target });
        }
        fs::rename(&self.path, &target).map_err(|e| EntryError::io(&self.path, e))?;
        self.path = target;
        Ok(())
    }

    fn remove(&mut self) -> Result<(), EntryError> {
        let metadata = fs::symlink_metadata(&self.path).map_err(|e| EntryError::io(&self.path, e))?;
        let result = if metadata.is_dir() {
            fs::remove_dir(&self.path)
        } else {
            fs::remove_file(&self.path)
        };
        result.map_err(|e| EntryError::io(&self.path, e))
    }

    fn make_writable(&mut self, writable: bool) -> Result<(), EntryError> {
        let metadata = fs::metadata(&self.path).map_err(|e| EntryError::io(&self.path, e))?;
        let permissions = toggle_write(metadata.permissions(), writable);
        fs::set_permissions(&self.path, permissions).map_err(|e| EntryError::io(&self.path, e))
    }

    fn copy_next_chunk(
        &mut self,
        chunk_size: u64,
        dest_dir: &Path,
        new_name: Option<&str>,
    ) -> Result<(), EntryError> {
        if self.transfer.is_none() {
            let transfer = self.open_transfer(dest_dir, new_name)?;
            self.copied = 0;
            self.transfer = Some(transfer);
        }
        let Some(transfer) = self.transfer.as_mut() else {
            return Ok(());
        };

        let chunk_size = chunk_size.max(1);
        let mut chunk = (&mut transfer.source).take(chunk_size);
        let written = std::io::copy(&mut chunk, &mut transfer.target)
            .map_err(|e| EntryError::io(&transfer.target_path, e))?;
        self.copied += written;

        if written < chunk_size {
            transfer
                .target
                .flush()
                .map_err(|e| EntryError::io(&transfer.target_path, e))?;
            if let Some(finished) = self.transfer.take() {
                let ChunkedCopy {
                    target,
                    target_path,
                    permissions,
                    ..
                } = finished;
                drop(target);
                fs::set_permissions(&target_path, permissions)
                    .map_err(|e| EntryError::io(&target_path, e))?;
            }
        }
        Ok(())
    }

    fn is_copy_in_progress(&self) -> bool {
        self.transfer.is_some()
    }

    fn bytes_copied(&self) -> u64 {
        self.copied
    }

    fn cancel_copy(&mut self) -> Result<(), EntryError> {
        let Some(transfer) = self.transfer.take() else {
            return Ok(());
        };
        let ChunkedCopy {
            target, target_path, ..
        } = transfer;
        drop(target);
        self.copied = 0;

        match fs::remove_file(&target_path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(EntryError::io(&target_path, e)),
            _ => Ok(()),
        }
    }
}

#[cfg(unix)]
fn same_volume(_path: &Path, mine: &Metadata, _anchor: &Path, anchor: &Metadata) -> bool {
    use std::os::unix::fs::MetadataExt;
    mine.dev() == anchor.dev()
}

#[cfg(not(unix))]
fn same_volume(path: &Path, _mine: &Metadata, anchor: &Path, _anchor: &Metadata) -> bool {
    // No device ids: compare drive prefixes of the absolute paths.
    let prefix = |p: &Path| {
        std::path::absolute(p)
            .ok()
            .and_then(|abs| abs.components().next().map(|c| c.as_os_str().to_os_string()))
    };
    prefix(path).is_some() && prefix(path) == prefix(anchor)
}

#[cfg(unix)]
fn toggle_write(mut permissions: Permissions, writable: bool) -> Permissions {
    use std::os::unix::fs::PermissionsExt;
    let mode = permissions.mode();
    permissions.set_mode(if writable { mode | 0o200 } else { mode & !0o222 });
    permissions
}

#[cfg(not(unix))]
#[allow(clippy::permissions_set_readonly_false)]
fn toggle_write(mut permissions: Permissions, writable: bool) -> Permissions {
    permissions.set_readonly(!writable);
    permissions
}
