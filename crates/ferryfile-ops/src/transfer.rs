//! Copy and move.

use std::path::Path;

use tracing::{debug, info, warn};

use ferryfile_core::{Entry, HaltReason};

use crate::OperationKind;
use crate::flatten::{WorkItem, plan_destination, plan_transfer};
use crate::progress::percent;
use crate::worker::{Resolution, Stop, Worker};

impl<E: Entry> Worker<E> {
    pub(crate) fn run_transfer(&mut self, sources: &[E], destination: &Path) -> Result<(), Stop> {
        if self.kind == OperationKind::Move && self.can_rename_in_place(sources, destination) {
            debug!(destination = %destination.display(), "moving by rename");
            return self.move_by_rename(sources, destination);
        }

        let plan = plan_transfer(sources, destination);
        let total_items = plan.items.len();
        self.tally.total = plan.total_bytes;
        info!(items = total_items, bytes = plan.total_bytes, "transfer planned");

        // Source directories that still had content when their turn came.
        let mut deferred = Vec::new();
        for (index, item) in plan.items.into_iter().enumerate() {
            self.checkpoint()?;
            self.transfer_item(index, total_items, item, &mut deferred)?;
        }

        for mut dir in deferred {
            self.checkpoint()?;
            if dir.is_empty_dir() {
                if self.remove_source(&mut dir)? {
                    self.summary.processed += 1;
                }
            } else {
                debug!(path = %dir.path().display(), "source directory kept, not empty");
            }
        }
        Ok(())
    }

    /// Move fast path: destination missing or empty and every source on the
    /// destination's volume.
    fn can_rename_in_place(&self, sources: &[E], destination: &Path) -> bool {
        let dest = E::locate(destination);
        if dest.exists() && !dest.is_empty_dir() {
            return false;
        }
        let mut roots = sources.iter().filter(|s| !s.is_parent_link());
        if self.config.verify_volume_per_source {
            roots.all(|s| s.is_same_volume_as(destination))
        } else {
            roots.next().is_some_and(|s| s.is_same_volume_as(destination))
        }
    }

    fn move_by_rename(&mut self, sources: &[E], destination: &Path) -> Result<(), Stop> {
        let plan = plan_destination(sources, destination);
        let roots: Vec<E> = sources.iter().filter(|s| !s.is_parent_link()).cloned().collect();
        let Some(first) = roots.first() else {
            return Ok(());
        };

        if !self.ensure_directory(&plan.dir, first)? {
            self.summary.skipped += roots.len();
            return Ok(());
        }

        for mut root in roots {
            self.checkpoint()?;
            let name = root.name();
            self.announce(&name);

            let mut rename: Option<String> = None;
            loop {
                if let Some(new_name) = self.pending_rename.take() {
                    rename = Some(new_name);
                }
                if !root.exists() {
                    match self.halt(HaltReason::SourceMissing, &root, None, "")? {
                        Resolution::Retry => continue,
                        _ => {
                            self.skip(0);
                            break;
                        }
                    }
                }

                let target_name = rename
                    .clone()
                    .or_else(|| plan.file_name.clone())
                    .unwrap_or_else(|| name.clone());

                match root.rename_or_move(&plan.dir, &target_name) {
                    Ok(()) => {
                        info!(path = %root.path().display(), "moved");
                        self.summary.processed += 1;
                        break;
                    }
                    Err(e) if e.is_already_exists() => {
                        let mut target = E::locate(&plan.dir.join(&target_name));
                        match self.halt(HaltReason::DestinationExists, &root, Some(&target), e.to_string())? {
                            Resolution::Proceed if target.is_dir() => {
                                debug!(path = %target.path().display(), "directory target is not replaced");
                                self.skip(0);
                                break;
                            }
                            Resolution::Proceed => {
                                if !self.remove_entry(&mut target)? {
                                    self.skip(0);
                                    break;
                                }
                            }
                            Resolution::Retry => {}
                            Resolution::Skip => {
                                self.skip(0);
                                break;
                            }
                        }
                    }
                    Err(e) => match self.halt(HaltReason::UnknownTransferError, &root, None, e.to_string())? {
                        Resolution::Retry => {}
                        _ => {
                            self.skip(0);
                            break;
                        }
                    },
                }
            }
        }
        Ok(())
    }

    fn transfer_item(
        &mut self,
        index: usize,
        total_items: usize,
        mut item: WorkItem<E>,
        deferred: &mut Vec<E>,
    ) -> Result<(), Stop> {
        let name = item.entry.name();
        self.announce(&name);
        let size = item.entry.size();

        let mut rename: Option<String> = None;
        'attempt: loop {
            if let Some(new_name) = self.pending_rename.take() {
                rename = Some(new_name);
            }

            // Source still there?
            if !item.entry.exists() {
                match self.halt(HaltReason::SourceMissing, &item.entry, None, "")? {
                    Resolution::Retry => continue 'attempt,
                    _ => {
                        self.skip(size);
                        return Ok(());
                    }
                }
            }

            let target_name = item.target_name(rename.as_deref());
            let target_path = item.target_path(rename.as_deref());
            if target_path == item.entry.path() {
                debug!(path = %target_path.display(), "target is the source, nothing to do");
                self.tally.done += size;
                return Ok(());
            }

            if item.entry.is_dir() {
                return self.transfer_directory(&mut item.entry, &target_path, deferred);
            }

            // Only an existing file conflicts. Anything else in the way fails
            // in the transfer below.
            let mut target = E::locate(&target_path);
            if target.is_file() {
                match self.halt(HaltReason::DestinationExists, &item.entry, Some(&target), "")? {
                    Resolution::Proceed => {}
                    Resolution::Retry => continue 'attempt,
                    Resolution::Skip => {
                        self.skip(size);
                        return Ok(());
                    }
                }

                if !target.is_writable() {
                    match self.halt(HaltReason::DestinationReadOnly, &target, None, "")? {
                        Resolution::Proceed => {
                            if !self.make_writable(&mut target)? {
                                self.skip(size);
                                return Ok(());
                            }
                        }
                        Resolution::Retry => continue 'attempt,
                        Resolution::Skip => {
                            self.skip(size);
                            return Ok(());
                        }
                    }
                }
            }

            if !self.ensure_directory(&item.dest_dir, &item.entry)? {
                self.skip(size);
                return Ok(());
            }

            // Chunked transfer
            let start = self.tally.done;
            loop {
                if let Err(e) =
                    item.entry
                        .copy_next_chunk(self.config.chunk_size, &item.dest_dir, Some(target_name.as_str()))
                {
                    if let Err(cleanup) = item.entry.cancel_copy() {
                        warn!(
                            path = %cleanup.path().display(),
                            error = %cleanup,
                            "failed to discard partial target"
                        );
                    }
                    self.tally.done = start;
                    match self.halt(HaltReason::UnknownTransferError, &item.entry, Some(&target), e.to_string())? {
                        Resolution::Retry => continue 'attempt,
                        _ => {
                            self.skip(size);
                            return Ok(());
                        }
                    }
                }

                let copied = item.entry.bytes_copied();
                self.tally.done = start + copied;
                self.emit_progress(index, total_items, percent(copied, size), &name);

                if !item.entry.is_copy_in_progress() {
                    break;
                }
                if let Err(stop) = self.checkpoint() {
                    if let Err(e) = item.entry.cancel_copy() {
                        warn!(
                            path = %e.path().display(),
                            error = %e,
                            "failed to discard partial target"
                        );
                    }
                    self.tally.done = start;
                    return Err(stop);
                }
            }

            let copied = item.entry.bytes_copied();
            self.summary.bytes_transferred += copied;
            info!(
                source = %item.entry.path().display(),
                target = %target_path.display(),
                bytes = copied,
                "copied"
            );

            if self.kind == OperationKind::Move && !self.remove_source(&mut item.entry)? {
                self.summary.skipped += 1;
                return Ok(());
            }
            self.summary.processed += 1;
            return Ok(());
        }
    }

    fn transfer_directory(&mut self, source: &mut E, target: &Path, deferred: &mut Vec<E>) -> Result<(), Stop> {
        if !self.ensure_directory(target, source)? {
            self.summary.skipped += 1;
            return Ok(());
        }

        if self.kind == OperationKind::Move {
            if source.is_empty_dir() {
                if !self.remove_source(source)? {
                    self.summary.skipped += 1;
                    return Ok(());
                }
            } else {
                deferred.push(source.clone());
                return Ok(());
            }
        }
        self.summary.processed += 1;
        Ok(())
    }

    /// Create `dir` if needed. `Ok(false)` when the caller chose to skip.
    fn ensure_directory(&mut self, dir: &Path, source: &E) -> Result<bool, Stop> {
        loop {
            match E::create_dir_all(dir) {
                Ok(()) => return Ok(true),
                Err(e) => {
                    let target = E::locate(dir);
                    match self.halt(HaltReason::FailedToCreateDirectory, source, Some(&target), e.to_string())? {
                        Resolution::Retry => continue,
                        _ => return Ok(false),
                    }
                }
            }
        }
    }

    /// Remove a moved source the way delete does. `Ok(false)` when the
    /// caller chose to skip.
    fn remove_source(&mut self, source: &mut E) -> Result<bool, Stop> {
        let removed = self.clear_read_only(source)? && self.remove_entry(source)?;
        if removed {
            debug!(path = %source.path().display(), "source removed");
        }
        Ok(removed)
    }

    /// Remove a file or empty directory, halting on failure.
    pub(crate) fn remove_entry(&mut self, entry: &mut E) -> Result<bool, Stop> {
        loop {
            match entry.remove() {
                Ok(()) => return Ok(true),
                Err(e) => match self.halt(HaltReason::FailedToDelete, entry, None, e.to_string())? {
                    Resolution::Retry => continue,
                    _ => return Ok(false),
                },
            }
        }
    }

    /// Halt on a read-only file and make it writable if the caller proceeds.
    /// `Ok(false)` when the caller chose to skip.
    pub(crate) fn clear_read_only(&mut self, entry: &mut E) -> Result<bool, Stop> {
        while entry.is_file() && !entry.is_writable() {
            match self.halt(HaltReason::SourceReadOnly, entry, None, "")? {
                Resolution::Proceed => return self.make_writable(entry),
                Resolution::Retry => {}
                Resolution::Skip => return Ok(false),
            }
        }
        Ok(true)
    }

    /// Make an entry writable, halting on failure.
    pub(crate) fn make_writable(&mut self, entry: &mut E) -> Result<bool, Stop> {
        loop {
            match entry.make_writable(true) {
                Ok(()) => return Ok(true),
                Err(e) => match self.halt(HaltReason::FailedToMakeWritable, entry, None, e.to_string())? {
                    Resolution::Retry => continue,
                    _ => return Ok(false),
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::SystemTime;

    use ferryfile_core::{EngineConfig, EntryError};

    use super::*;
    use crate::control::Shared;
    use crate::{HaltEvent, Observer, OperationSummary, ProgressSnapshot};

    /// Entry on a configurable volume; destinations never exist yet.
    #[derive(Debug, Clone)]
    struct Mounted {
        path: PathBuf,
        exists: bool,
        local: bool,
    }

    impl Mounted {
        fn source(path: &str, local: bool) -> Self {
            Self {
                path: PathBuf::from(path),
                exists: true,
                local,
            }
        }
    }

    impl Entry for Mounted {
        fn locate(path: &Path) -> Self {
            Self {
                path: path.to_path_buf(),
                exists: false,
                local: true,
            }
        }

        fn create_dir_all(_path: &Path) -> Result<(), EntryError> {
            Ok(())
        }

        fn path(&self) -> &Path {
            &self.path
        }

        fn exists(&self) -> bool {
            self.exists
        }

        fn is_file(&self) -> bool {
            self.exists
        }

        fn is_dir(&self) -> bool {
            false
        }

        fn is_empty_dir(&self) -> bool {
            false
        }

        fn size(&self) -> u64 {
            0
        }

        fn is_writable(&self) -> bool {
            true
        }

        fn modified(&self) -> Option<SystemTime> {
            None
        }

        fn is_same_volume_as(&self, _other: &Path) -> bool {
            self.local
        }

        fn children(&self) -> Result<Vec<Self>, EntryError> {
            Ok(Vec::new())
        }

        fn rename_or_move(&mut self, dest_dir: &Path, new_name: &str) -> Result<(), EntryError> {
            self.path = dest_dir.join(new_name);
            Ok(())
        }

        fn remove(&mut self) -> Result<(), EntryError> {
            self.exists = false;
            Ok(())
        }

        fn make_writable(&mut self, _writable: bool) -> Result<(), EntryError> {
            Ok(())
        }

        fn copy_next_chunk(
            &mut self,
            _chunk_size: u64,
            _dest_dir: &Path,
            _new_name: Option<&str>,
        ) -> Result<(), EntryError> {
            Ok(())
        }

        fn is_copy_in_progress(&self) -> bool {
            false
        }

        fn bytes_copied(&self) -> u64 {
            0
        }

        fn cancel_copy(&mut self) -> Result<(), EntryError> {
            Ok(())
        }
    }

    struct Silent;

    impl Observer<Mounted> for Silent {
        fn on_progress(&self, _snapshot: &ProgressSnapshot) {}
        fn on_halted(&self, _event: &HaltEvent<Mounted>) {}
        fn on_finished(&self, _summary: &OperationSummary) {}
    }

    fn mover(verify_volume_per_source: bool) -> Worker<Mounted> {
        let config = EngineConfig::builder()
            .verify_volume_per_source(verify_volume_per_source)
            .build()
            .unwrap();
        Worker::new(OperationKind::Move, config, Arc::new(Silent), Arc::new(Shared::default()))
    }

    #[test]
    fn test_every_source_is_checked_by_default() {
        let sources = [Mounted::source("/home/a", true), Mounted::source("/mnt/usb/b", false)];
        let dest = Path::new("/home/dst");

        assert!(EngineConfig::builder().build().unwrap().verify_volume_per_source);
        assert!(!mover(true).can_rename_in_place(&sources, dest));
        assert!(mover(false).can_rename_in_place(&sources, dest));
    }

    #[test]
    fn test_first_source_decides_when_not_checking_each() {
        let sources = [Mounted::source("/mnt/usb/a", false), Mounted::source("/home/b", true)];
        assert!(!mover(false).can_rename_in_place(&sources, Path::new("/home/dst")));
    }
}
