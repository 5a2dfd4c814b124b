//! File name rules for rename responses.

use std::path::Path;

use thiserror::Error;

/// Reasons a name supplied with a rename response is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    #[error("Name cannot be empty")]
    Empty,
    #[error("Name is too long (max 255 bytes)")]
    TooLong,
    #[error("Name cannot contain '{0}'")]
    InvalidChar(char),
    #[error("'.' and '..' are reserved names")]
    Reserved,
    #[error("Name cannot start or end with spaces")]
    SurroundingSpaces,
    #[error("Name cannot end with a dot")]
    TrailingDot,
}

/// Validate a bare file name (not a path).
pub fn validate_file_name(name: &str) -> Result<(), NameError> {
    if name.is_empty() {
        return Err(NameError::Empty);
    }
    if name.len() > 255 {
        return Err(NameError::TooLong);
    }
    if name == "." || name == ".." {
        return Err(NameError::Reserved);
    }

    #[cfg(windows)]
    const FORBIDDEN: &[char] = &['/', '\0', '\\', ':', '*', '?', '"', '<', '>', '|'];
    #[cfg(not(windows))]
    const FORBIDDEN: &[char] = &['/', '\0'];

    if let Some(c) = name.chars().find(|c| FORBIDDEN.contains(c)) {
        return Err(NameError::InvalidChar(c));
    }
    if name.starts_with(' ') || name.ends_with(' ') {
        return Err(NameError::SurroundingSpaces);
    }
    if name.ends_with('.') {
        return Err(NameError::TrailingDot);
    }

    Ok(())
}

/// Find a free sibling name for `path`: `file (1).txt`, `file (2).txt`, ...
///
/// Returns only the file name, ready to be used in a rename response.
pub fn suggest_free_name(path: &Path) -> String {
    let parent = path.parent().unwrap_or(Path::new(""));
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = path.extension().map(|e| e.to_string_lossy().into_owned());

    let candidate = |suffix: &dyn std::fmt::Display| match &extension {
        Some(ext) => format!("{stem} ({suffix}).{ext}"),
        None => format!("{stem} ({suffix})"),
    };

    for i in 1..1000u32 {
        let name = candidate(&i);
        if !exists_no_follow(&parent.join(&name)) {
            return name;
        }
    }

    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    candidate(&timestamp)
}

fn exists_no_follow(path: &Path) -> bool {
    path.symlink_metadata().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_validate_file_name_valid() {
        assert!(validate_file_name("test.txt").is_ok());
        assert!(validate_file_name("my-file").is_ok());
        assert!(validate_file_name(".hidden").is_ok());
        assert!(validate_file_name("file with spaces").is_ok());
    }

    #[test]
    fn test_validate_file_name_invalid() {
        assert_eq!(validate_file_name(""), Err(NameError::Empty));
        assert_eq!(
            validate_file_name("dir/file"),
            Err(NameError::InvalidChar('/'))
        );
        assert_eq!(validate_file_name(".."), Err(NameError::Reserved));
        assert_eq!(validate_file_name("file "), Err(NameError::SurroundingSpaces));
        assert_eq!(validate_file_name("file."), Err(NameError::TrailingDot));
        assert_eq!(validate_file_name(&"a".repeat(256)), Err(NameError::TooLong));
    }

    #[test]
    fn test_suggest_free_name_skips_taken() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("report.txt"), "a").unwrap();
        fs::write(temp.path().join("report (1).txt"), "b").unwrap();

        let name = suggest_free_name(&temp.path().join("report.txt"));
        assert_eq!(name, "report (2).txt");
    }

    #[test]
    fn test_suggest_free_name_no_extension() {
        let temp = TempDir::new().unwrap();
        let name = suggest_free_name(&temp.path().join("notes"));
        assert_eq!(name, "notes (1)");
    }
}
