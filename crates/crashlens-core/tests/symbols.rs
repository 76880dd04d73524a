//! Tests for symbol cache skip decisions and the download tool

use std::path::PathBuf;
use std::time::Duration;

use crashlens_core::error::DriverError;
use crashlens_core::symbols::{get_missing_cached_files, should_skip_download, DiskSymbolCache, SymbolCache};
use tempfile::TempDir;

fn cache_with(files: &[&str]) -> TempDir
{
    let dir = TempDir::new().unwrap();
    for file in files {
        let path = dir.path().join(file);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"x").unwrap();
    }
    dir
}

fn owned(files: &[&str]) -> Vec<String>
{
    files.iter().map(|file| (*file).to_string()).collect()
}

#[test]
fn test_skip_only_when_list_is_complete()
{
    let cache = cache_with(&["libcoreclr.so", "sos/libsosplugin.so"]);

    assert_eq!(should_skip_download(&[], cache.path()), (false, Vec::new()));
    assert_eq!(
        should_skip_download(&owned(&["libcoreclr.so", "sos/libsosplugin.so"]), cache.path()),
        (true, Vec::new())
    );
    assert_eq!(
        should_skip_download(&owned(&["libcoreclr.so", "libclrjit.so"]), cache.path()),
        (false, owned(&["libclrjit.so"]))
    );
}

#[test]
fn test_missing_directory_means_everything_is_missing()
{
    let cache = cache_with(&[]);
    let absent = cache.path().join("core.9");
    let listed = owned(&["a.so", "b.so"]);

    assert_eq!(get_missing_cached_files(&listed, &absent), listed);
    assert_eq!(should_skip_download(&listed, &absent), (false, listed.clone()));
}

#[test]
fn test_list_cached_files_is_relative_and_sorted()
{
    let cache = cache_with(&["sos/libsosplugin.so", "libcoreclr.so", "libclrjit.so"]);
    let symbols = DiskSymbolCache::new(None, Vec::new(), Duration::from_secs(1));

    assert_eq!(
        symbols.list_cached_files(cache.path()),
        owned(&["libclrjit.so", "libcoreclr.so", "sos/libsosplugin.so"])
    );
}

#[tokio::test]
async fn test_download_without_tool_is_unavailable()
{
    let cache = cache_with(&[]);
    let symbols = DiskSymbolCache::new(None, Vec::new(), Duration::from_secs(1));

    let err = symbols
        .download(&PathBuf::from("/tmp/core"), &cache.path().join("core"))
        .await
        .unwrap_err();
    assert!(matches!(err, DriverError::ToolUnavailable("symbol download")));
}

#[cfg(unix)]
#[tokio::test]
async fn test_download_passes_output_dir_and_dump()
{
    let cache = cache_with(&[]);
    let script = cache.path().join("fetch.sh");
    // Arguments: --verbose -o <dir> <dump>
    std::fs::write(&script, "[ \"$1\" = --verbose ] || exit 9\ntouch \"$3/libcoreclr.so\"\necho \"$4\" > \"$3/source\"\n").unwrap();

    let symbols = DiskSymbolCache::new(
        Some(PathBuf::from("/bin/sh")),
        vec![script.display().to_string(), "--verbose".to_string()],
        Duration::from_secs(10),
    );
    let out = cache.path().join("core.1234");
    symbols.download(&PathBuf::from("/dumps/core.1234"), &out).await.unwrap();

    assert!(out.join("libcoreclr.so").is_file());
    assert_eq!(std::fs::read_to_string(out.join("source")).unwrap().trim(), "/dumps/core.1234");
    assert_eq!(symbols.list_cached_files(&out), owned(&["libcoreclr.so", "source"]));
}

#[cfg(unix)]
#[tokio::test]
async fn test_download_timeout_is_a_tool_failure()
{
    let cache = cache_with(&[]);
    let symbols = DiskSymbolCache::new(
        Some(PathBuf::from("/bin/sh")),
        vec!["-c".to_string(), "sleep 5".to_string()],
        Duration::from_millis(100),
    );

    let err = symbols
        .download(&PathBuf::from("/tmp/core"), &cache.path().join("core"))
        .await
        .unwrap_err();
    assert!(matches!(err, DriverError::ToolFailed { tool: "symbol download", ref reason } if reason.contains("timed out")));
}
