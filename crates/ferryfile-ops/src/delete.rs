//! Delete: every file first in enumeration order, then every directory in
//! reverse enumeration order, so a directory is only attempted once its
//! contents are gone.

use tracing::info;

use ferryfile_core::{Entry, HaltReason};

use crate::flatten::enumerate_for_delete;
use crate::worker::{Resolution, Stop, Worker};

impl<E: Entry> Worker<E> {
    pub(crate) fn run_delete(&mut self, targets: &[E]) -> Result<(), Stop> {
        let mut entries = enumerate_for_delete(targets);
        let total_items = entries.len();
        self.tally.total = total_items as u64;
        info!(items = total_items, "delete planned");

        let mut dirs = Vec::new();
        for (index, entry) in entries.iter_mut().enumerate() {
            if entry.is_dir() {
                dirs.push(index);
                continue;
            }
            self.checkpoint()?;
            self.delete_item(entry, total_items)?;
        }

        for index in dirs.into_iter().rev() {
            self.checkpoint()?;
            self.delete_item(&mut entries[index], total_items)?;
        }
        Ok(())
    }

    fn delete_item(&mut self, entry: &mut E, total_items: usize) -> Result<(), Stop> {
        let name = entry.name();
        self.announce(&name);
        self.emit_progress(self.tally.done as usize, total_items, 0.0, &name);

        loop {
            if !entry.exists() {
                match self.halt(HaltReason::SourceMissing, entry, None, "")? {
                    Resolution::Retry => continue,
                    _ => {
                        self.skip(1);
                        return Ok(());
                    }
                }
            }

            if !self.clear_read_only(entry)? || !self.remove_entry(entry)? {
                self.skip(1);
                return Ok(());
            }
            info!(path = %entry.path().display(), "deleted");
            self.tally.done += 1;
            self.summary.processed += 1;
            return Ok(());
        }
    }
}
