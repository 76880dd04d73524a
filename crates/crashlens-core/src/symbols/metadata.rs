//! # Dump Metadata Store
//!
//! JSON sidecar next to each dump (`core.1234.dmp` → `core.1234.json`).
//!
//! Loading never fails: a missing file and a malformed file both read as "no
//! record". Partial updates only touch an existing record; the record itself
//! is created once, at the end of a fully resolved open.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{DriverError, DriverResult};
use crate::types::DumpMetadata;

/// Sidecar path for a dump: its extension replaced by `.json`.
///
/// ```rust
/// use std::path::{Path, PathBuf};
///
/// use crashlens_core::symbols::metadata::metadata_path_for;
///
/// assert_eq!(metadata_path_for(Path::new("/dumps/core.42.dmp")), PathBuf::from("/dumps/core.42.json"));
/// assert_eq!(metadata_path_for(Path::new("/dumps/core")), PathBuf::from("/dumps/core.json"));
/// ```
#[must_use]
pub fn metadata_path_for(dump_path: &Path) -> PathBuf
{
    dump_path.with_extension("json")
}

/// Read the record for `dump_path`, if there is a readable one.
#[must_use]
pub fn load_metadata(dump_path: &Path) -> Option<DumpMetadata>
{
    let path = metadata_path_for(dump_path);
    if path == dump_path {
        return None;
    }

    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
        Err(err) => {
            warn!(path = %path.display(), %err, "dump metadata unreadable");
            return None;
        }
    };

    match serde_json::from_str(&text) {
        Ok(metadata) => Some(metadata),
        Err(err) => {
            warn!(path = %path.display(), %err, "dump metadata malformed; ignoring it");
            None
        }
    }
}

/// Write the record for `dump_path`, replacing any existing one.
///
/// The file is written to a temporary sibling first and renamed into place,
/// so a crash mid-write never leaves a truncated record behind.
///
/// ## Errors
///
/// - `InvalidArgument`: the dump itself has a `.json` extension, so the
///   sidecar would overwrite it
/// - `Json` / `Io`: encoding or writing failed
pub fn save_metadata(dump_path: &Path, metadata: &DumpMetadata) -> DriverResult<()>
{
    let path = metadata_path_for(dump_path);
    if path == dump_path {
        return Err(DriverError::InvalidArgument(format!(
            "metadata sidecar would overwrite the dump itself: {}",
            dump_path.display()
        )));
    }

    let json = serde_json::to_string_pretty(metadata)?;
    let staging = path.with_extension("json.tmp");
    fs::write(&staging, json)?;
    fs::rename(&staging, &path)?;

    debug!(path = %path.display(), dump_id = %metadata.dump_id, "dump metadata saved");
    Ok(())
}

/// Record the resolved runtime version on an existing record.
///
/// Returns `false`, creating nothing, when no record exists or it cannot be
/// written.
pub fn try_save_runtime_version(dump_path: &Path, version: &str) -> bool
{
    update_existing(dump_path, |metadata| metadata.runtime_version = Some(version.to_string()))
}

/// Record the fetched symbol-file list on an existing record.
///
/// Returns `false`, creating nothing, when no record exists or it cannot be
/// written.
pub fn try_save_symbol_files(dump_path: &Path, files: &[String]) -> bool
{
    update_existing(dump_path, |metadata| metadata.symbol_files = files.to_vec())
}

fn update_existing(dump_path: &Path, update: impl FnOnce(&mut DumpMetadata)) -> bool
{
    let Some(mut metadata) = load_metadata(dump_path) else {
        debug!(dump = %dump_path.display(), "no dump metadata to update");
        return false;
    };

    update(&mut metadata);
    match save_metadata(dump_path, &metadata) {
        Ok(()) => true,
        Err(err) => {
            warn!(dump = %dump_path.display(), %err, "failed to update dump metadata");
            false
        }
    }
}
