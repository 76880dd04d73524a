//! Filesystem helpers for symbol cache directories.
//!
//! Symbol caches are small trees of downloaded files. These helpers walk them
//! without following directory symlinks and never fail hard: unreadable
//! entries are skipped and logged at `trace`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Recursively collect every regular file under `root`.
///
/// Returns an empty list when `root` does not exist or is not a directory.
/// Results are sorted so callers get a stable order across runs.
#[must_use]
pub fn walk_files(root: &Path) -> Vec<PathBuf>
{
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) => {
                tracing::trace!(dir = %dir.display(), %err, "skipping unreadable directory");
                continue;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            match entry.file_type() {
                Ok(kind) if kind.is_dir() => pending.push(path),
                Ok(_) if path.is_file() => files.push(path),
                _ => {}
            }
        }
    }

    files.sort();
    files
}

/// List files under `root` as `/`-separated paths relative to `root`.
#[must_use]
pub fn relative_files(root: &Path) -> Vec<String>
{
    walk_files(root)
        .into_iter()
        .filter_map(|path| {
            let relative = path.strip_prefix(root).ok()?;
            let parts: Vec<_> = relative.iter().map(|part| part.to_string_lossy().into_owned()).collect();
            Some(parts.join("/"))
        })
        .collect()
}

/// Find the most recently modified file named `file_name` anywhere under `root`.
///
/// Files whose modification time cannot be read sort as the oldest.
#[must_use]
pub fn newest_file_named(root: &Path, file_name: &str) -> Option<PathBuf>
{
    walk_files(root)
        .into_iter()
        .filter(|path| path.file_name().is_some_and(|name| name == file_name))
        .max_by_key(|path| {
            fs::metadata(path)
                .and_then(|meta| meta.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH)
        })
}

#[cfg(test)]
mod tests
{
    use std::time::Duration;

    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_walk_files_missing_root_is_empty()
    {
        assert!(walk_files(Path::new("/definitely/not/here")).is_empty());
    }

    #[test]
    fn test_relative_files_uses_forward_slashes()
    {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("a/b")).unwrap();
        fs::write(dir.path().join("a/b/libfoo.so"), b"x").unwrap();
        fs::write(dir.path().join("top.dbg"), b"x").unwrap();

        assert_eq!(relative_files(dir.path()), vec!["a/b/libfoo.so".to_string(), "top.dbg".to_string()]);
    }

    #[test]
    fn test_newest_file_named_prefers_latest_mtime()
    {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("old")).unwrap();
        fs::create_dir_all(dir.path().join("new")).unwrap();
        let old = dir.path().join("old/plugin.so");
        let new = dir.path().join("new/plugin.so");
        fs::write(&old, b"old").unwrap();
        fs::write(&new, b"new").unwrap();

        let past = SystemTime::now() - Duration::from_secs(3600);
        fs::File::options().write(true).open(&old).unwrap().set_modified(past).unwrap();

        assert_eq!(newest_file_named(dir.path(), "plugin.so"), Some(new));
        assert_eq!(newest_file_named(dir.path(), "other.so"), None);
    }
}
