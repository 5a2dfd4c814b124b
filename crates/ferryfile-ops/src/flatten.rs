//! Tree flattening and destination planning.
//!
//! Copy and move work on a flat list of [`WorkItem`]s: every file and
//! directory below the sources, each directory listed after its contents so
//! that it can be removed as soon as it has been emptied. Delete works on a
//! parent-first enumeration processed in two passes by the worker.

use std::path::{Path, PathBuf};

use tracing::warn;

use ferryfile_core::Entry;

/// One entry to transfer and the directory it goes to.
#[derive(Debug, Clone)]
pub struct WorkItem<E> {
    pub entry: E,
    pub dest_dir: PathBuf,
    /// Explicit target name (single-file copy to a file path).
    pub target_name: Option<String>,
}

impl<E: Entry> WorkItem<E> {
    /// Name the item gets at the destination; `rename` wins when given.
    pub fn target_name(&self, rename: Option<&str>) -> String {
        rename
            .map(str::to_owned)
            .or_else(|| self.target_name.clone())
            .unwrap_or_else(|| self.entry.name())
    }

    pub fn target_path(&self, rename: Option<&str>) -> PathBuf {
        self.dest_dir.join(self.target_name(rename))
    }
}

/// Flattened copy/move work.
#[derive(Debug, Clone)]
pub struct TransferPlan<E> {
    pub items: Vec<WorkItem<E>>,
    /// Sum of the sizes of every file in `items`.
    pub total_bytes: u64,
}

/// Where the top-level sources land.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationPlan {
    /// Directory receiving the top-level sources.
    pub dir: PathBuf,
    /// Set when the destination path is the new name of a single file.
    pub file_name: Option<String>,
}

/// Whether `path` ends with a path separator (`dst/`).
pub fn has_trailing_separator(path: &Path) -> bool {
    path.as_os_str()
        .as_encoded_bytes()
        .last()
        .is_some_and(|b| std::path::is_separator(*b as char))
}

/// Decide how the destination path is interpreted.
///
/// With exactly one file source and a destination that does not name a
/// directory, the destination is the file's new path.
pub fn plan_destination<E: Entry>(sources: &[E], destination: &Path) -> DestinationPlan {
    let mut real = sources.iter().filter(|s| !s.is_parent_link());
    let single_file = match (real.next(), real.next()) {
        (Some(only), None) => only.is_file(),
        _ => false,
    };
    let names_directory = E::locate(destination).is_dir() || has_trailing_separator(destination);

    if single_file && !names_directory {
        let dir = destination
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let file_name = destination
            .file_name()
            .map(|n| n.to_string_lossy().into_owned());
        DestinationPlan { dir, file_name }
    } else {
        DestinationPlan {
            dir: destination.to_path_buf(),
            file_name: None,
        }
    }
}

/// Flatten copy/move sources into work items with planned destinations.
pub fn plan_transfer<E: Entry>(sources: &[E], destination: &Path) -> TransferPlan<E> {
    let plan = plan_destination(sources, destination);
    let mut items = Vec::new();
    let mut total_bytes = 0u64;

    for source in sources.iter().filter(|s| !s.is_parent_link()) {
        if source.is_dir() {
            let origin = source.parent_path();
            let mut tree = Vec::new();
            collect_contents_first(source, &mut tree);
            for entry in tree {
                total_bytes += entry.size();
                let dest_dir = rebase_parent(entry.path(), &origin, &plan.dir);
                items.push(WorkItem {
                    entry,
                    dest_dir,
                    target_name: None,
                });
            }
        } else {
            total_bytes += source.size();
            items.push(WorkItem {
                entry: source.clone(),
                dest_dir: plan.dir.clone(),
                target_name: plan.file_name.clone(),
            });
        }
    }

    TransferPlan { items, total_bytes }
}

/// Enumerate delete targets depth-first, each directory before its contents.
pub fn enumerate_for_delete<E: Entry>(targets: &[E]) -> Vec<E> {
    let mut out = Vec::new();
    for target in targets.iter().filter(|t| !t.is_parent_link()) {
        collect_parents_first(target, &mut out);
    }
    out
}

fn collect_contents_first<E: Entry>(dir: &E, out: &mut Vec<E>) {
    match dir.children() {
        Ok(children) => {
            for child in children {
                if child.is_dir() {
                    collect_contents_first(&child, out);
                } else {
                    out.push(child);
                }
            }
        }
        Err(e) => warn!(path = %dir.path().display(), error = %e, "cannot list directory"),
    }
    out.push(dir.clone());
}

fn collect_parents_first<E: Entry>(entry: &E, out: &mut Vec<E>) {
    out.push(entry.clone());
    if !entry.is_dir() {
        return;
    }
    match entry.children() {
        Ok(children) => {
            for child in &children {
                collect_parents_first(child, out);
            }
        }
        Err(e) => warn!(path = %entry.path().display(), error = %e, "cannot list directory"),
    }
}

/// Destination directory of `path`: strip the top-level source's parent
/// (`origin`) and re-root the remainder under `root`.
fn rebase_parent(path: &Path, origin: &Path, root: &Path) -> PathBuf {
    let relative = path.strip_prefix(origin).unwrap_or(path);
    root.join(relative)
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| root.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferryfile_core::FsEntry;
    use std::fs;
    use tempfile::TempDir;

    /// src/
    ///   top.txt (3 bytes)
    ///   tree/
    ///     a.txt (5 bytes)
    ///     empty/
    ///     sub/
    ///       b.txt (7 bytes)
    fn create_test_tree() -> TempDir {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        fs::create_dir_all(src.join("tree/empty")).unwrap();
        fs::create_dir_all(src.join("tree/sub")).unwrap();
        fs::write(src.join("top.txt"), "top").unwrap();
        fs::write(src.join("tree/a.txt"), "aaaaa").unwrap();
        fs::write(src.join("tree/sub/b.txt"), "bbbbbbb").unwrap();
        temp
    }

    fn relative(items: &[PathBuf], base: &Path) -> Vec<String> {
        items
            .iter()
            .map(|p| p.strip_prefix(base).unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_directories_follow_their_contents() {
        let temp = create_test_tree();
        let src = temp.path().join("src");
        let dst = temp.path().join("dst");

        let plan = plan_transfer(&[FsEntry::new(src.join("tree"))], &dst);
        let paths: Vec<PathBuf> = plan.items.iter().map(|i| i.entry.path().to_path_buf()).collect();

        assert_eq!(
            relative(&paths, &src),
            vec!["tree/a.txt", "tree/empty", "tree/sub/b.txt", "tree/sub", "tree"]
        );
        assert_eq!(plan.total_bytes, 12);
    }

    #[test]
    fn test_destinations_are_rebased() {
        let temp = create_test_tree();
        let src = temp.path().join("src");
        let dst = temp.path().join("dst");

        let plan = plan_transfer(&[FsEntry::new(src.join("tree"))], &dst);
        let targets: Vec<PathBuf> = plan.items.iter().map(|i| i.target_path(None)).collect();

        assert_eq!(
            relative(&targets, &dst),
            vec!["tree/a.txt", "tree/empty", "tree/sub/b.txt", "tree/sub", "tree"]
        );
    }

    #[test]
    fn test_single_file_to_new_name() {
        let temp = create_test_tree();
        let src = temp.path().join("src");
        let target = temp.path().join("renamed.txt");

        let plan = plan_transfer(&[FsEntry::new(src.join("top.txt"))], &target);
        assert_eq!(plan.items.len(), 1);
        assert_eq!(plan.items[0].target_path(None), target);
        assert_eq!(plan.total_bytes, 3);
    }

    #[test]
    fn test_trailing_separator_names_a_directory() {
        let temp = create_test_tree();
        let src = temp.path().join("src");
        let mut dst = temp.path().join("fresh").into_os_string();
        dst.push("/");
        let dst = PathBuf::from(dst);

        assert!(has_trailing_separator(&dst));
        let plan = plan_destination(&[FsEntry::new(src.join("top.txt"))], &dst);
        assert_eq!(plan.file_name, None);
        assert_eq!(plan.dir, dst);
    }

    #[test]
    fn test_existing_directory_receives_single_file() {
        let temp = create_test_tree();
        let src = temp.path().join("src");
        let dst = temp.path().join("dst");
        fs::create_dir(&dst).unwrap();

        let plan = plan_transfer(&[FsEntry::new(src.join("top.txt"))], &dst);
        assert_eq!(plan.items[0].target_path(None), dst.join("top.txt"));
    }

    #[test]
    fn test_rename_overrides_target_name() {
        let item = WorkItem {
            entry: FsEntry::new("/src/a.txt"),
            dest_dir: PathBuf::from("/dst"),
            target_name: Some("b.txt".into()),
        };
        assert_eq!(item.target_path(None), PathBuf::from("/dst/b.txt"));
        assert_eq!(item.target_path(Some("c.txt")), PathBuf::from("/dst/c.txt"));
    }

    #[test]
    fn test_delete_enumeration_is_parent_first() {
        let temp = create_test_tree();
        let src = temp.path().join("src");

        let list = enumerate_for_delete(&[FsEntry::new(src.join("tree")), FsEntry::parent_link(&src)]);
        let paths: Vec<PathBuf> = list.iter().map(|e| e.path().to_path_buf()).collect();

        assert_eq!(
            relative(&paths, &src),
            vec!["tree", "tree/a.txt", "tree/empty", "tree/sub", "tree/sub/b.txt"]
        );
    }

    #[test]
    fn test_parent_links_are_dropped() {
        let temp = create_test_tree();
        let src = temp.path().join("src");

        let plan = plan_transfer(
            &[FsEntry::parent_link(&src), FsEntry::new(src.join("top.txt"))],
            &temp.path().join("dst"),
        );
        assert_eq!(plan.items.len(), 1);
    }
}
