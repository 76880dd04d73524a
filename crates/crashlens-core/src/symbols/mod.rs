//! # Symbol Cache
//!
//! Per-dump directories of downloaded symbol files, and the decision whether
//! the slow download pass can be skipped on a later open.
//!
//! ## Layout
//!
//! ```text
//! <symbol_cache_root>/
//!   core.1234/                 one directory per dump (file stem)
//!     libcoreclr.so
//!     libcoreclr.so.dbg
//!     sos/libsosplugin.so
//! /dumps/core.1234.dmp
//! /dumps/core.1234.json        sidecar listing the files above
//! ```
//!
//! The sidecar (see [`metadata`]) remembers what was fetched. A download is
//! skipped only when that list is non-empty and every listed file is still
//! on disk.

pub mod elf;
pub mod metadata;

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use crashlens_utils::fs::relative_files;
use tracing::{debug, info};

use crate::backend::tool::run_tool;
use crate::config::DriverConfig;
use crate::error::{DriverError, DriverResult};

pub use elf::is_usable_elf;
pub use metadata::{load_metadata, metadata_path_for, save_metadata, try_save_runtime_version, try_save_symbol_files};

/// Entries of `files` (relative to `dir`) that are not on disk.
///
/// When `dir` itself does not exist every entry is missing.
#[must_use]
pub fn get_missing_cached_files(files: &[String], dir: &Path) -> Vec<String>
{
    if !dir.is_dir() {
        return files.to_vec();
    }
    files
        .iter()
        .filter(|file| !dir.join(file.as_str()).exists())
        .cloned()
        .collect()
}

/// Decide whether the download pass can be skipped.
///
/// Returns `(skip, missing)`. `skip` is true iff `cached` is non-empty and
/// nothing in it is missing from `dir`.
///
/// ```rust
/// use crashlens_core::symbols::should_skip_download;
///
/// let dir = tempfile::tempdir()?;
/// std::fs::write(dir.path().join("libcoreclr.so"), b"x")?;
///
/// assert_eq!(should_skip_download(&[], dir.path()), (false, vec![]));
/// assert_eq!(should_skip_download(&["libcoreclr.so".into()], dir.path()), (true, vec![]));
/// assert_eq!(
///     should_skip_download(&["libcoreclr.so".into(), "libclrjit.so".into()], dir.path()),
///     (false, vec!["libclrjit.so".to_string()])
/// );
/// # Ok::<(), std::io::Error>(())
/// ```
#[must_use]
pub fn should_skip_download(cached: &[String], dir: &Path) -> (bool, Vec<String>)
{
    if cached.is_empty() {
        return (false, Vec::new());
    }
    let missing = get_missing_cached_files(cached, dir);
    (missing.is_empty(), missing)
}

/// Symbol download seam
///
/// The driver asks this trait whether to download, to download, and what
/// ended up on disk. Tests substitute a fake that never spawns a tool.
#[async_trait]
pub trait SymbolCache: Send + Sync
{
    /// See [`should_skip_download`].
    fn should_skip_download(&self, cached: &[String], dir: &Path) -> (bool, Vec<String>)
    {
        should_skip_download(cached, dir)
    }

    /// Fetch symbols for `dump_path` into `output_dir`.
    ///
    /// ## Errors
    ///
    /// - `ToolUnavailable`: no downloader configured
    /// - `ToolFailed`: the downloader failed or timed out
    async fn download(&self, dump_path: &Path, output_dir: &Path) -> DriverResult<()>;

    /// Files under `dir`, relative and `/`-separated, as recorded in metadata.
    fn list_cached_files(&self, dir: &Path) -> Vec<String>
    {
        relative_files(dir)
    }
}

/// [`SymbolCache`] backed by an external download tool
///
/// The tool is invoked as `<tool> <args…> -o <output_dir> <dump>`.
#[derive(Debug, Clone)]
pub struct DiskSymbolCache
{
    tool: Option<PathBuf>,
    args: Vec<String>,
    timeout: Duration,
}

impl DiskSymbolCache
{
    #[must_use]
    pub fn new(tool: Option<PathBuf>, args: Vec<String>, timeout: Duration) -> Self
    {
        Self { tool, args, timeout }
    }

    #[must_use]
    pub fn from_config(config: &DriverConfig) -> Self
    {
        Self::new(
            config.symbol_download_tool.clone(),
            config.symbol_download_args.clone(),
            config.symbol_download_timeout,
        )
    }
}

#[async_trait]
impl SymbolCache for DiskSymbolCache
{
    async fn download(&self, dump_path: &Path, output_dir: &Path) -> DriverResult<()>
    {
        let tool = self.tool.as_deref().ok_or(DriverError::ToolUnavailable("symbol download"))?;
        tokio::fs::create_dir_all(output_dir).await?;

        let mut args: Vec<OsString> = self.args.iter().map(OsString::from).collect();
        args.push("-o".into());
        args.push(output_dir.as_os_str().to_os_string());
        args.push(dump_path.as_os_str().to_os_string());

        info!(dump = %dump_path.display(), dir = %output_dir.display(), "downloading symbols");
        let output = run_tool("symbol download", tool, &args, self.timeout).await?;
        debug!(stdout_len = output.stdout.len(), "symbol download finished");
        Ok(())
    }
}
