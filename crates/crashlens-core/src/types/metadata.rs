//! Persisted per-dump metadata record.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sidecar record stored next to a dump as `<dumpBaseName>.json`
///
/// The record outlives any single driver process: it is read at the start of
/// every open of the same dump and updated as resolution steps succeed.
///
/// ```json
/// {
///   "dumpId": "core.1234",
///   "userId": "analyst",
///   "fileName": "core.1234.dmp",
///   "size": 104857600,
///   "uploadedAt": "2026-10-19T08:30:00Z",
///   "runtimeVersion": "9.0.10",
///   "symbolFiles": ["libcoreclr.so.dbg", "sos/libsosplugin.so"]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DumpMetadata
{
    pub dump_id: String,
    pub user_id: String,
    pub file_name: String,
    pub size: u64,
    pub uploaded_at: DateTime<Utc>,
    /// Resolved managed-runtime version, when the dump is managed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_version: Option<String>,
    /// Symbol files already fetched, relative to the dump's symbol cache directory
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub symbol_files: Vec<String>,
}

impl DumpMetadata
{
    /// Build a fresh record for `dump_path`, sizing it from the filesystem.
    ///
    /// `dump_id` is the file stem of the dump, `uploaded_at` is now.
    ///
    /// ## Errors
    ///
    /// Returns an error if the dump file cannot be stat'ed.
    pub fn for_dump(dump_path: &Path, user_id: &str) -> std::io::Result<Self>
    {
        let size = std::fs::metadata(dump_path)?.len();
        let file_name = dump_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let dump_id = dump_path
            .file_stem()
            .map_or_else(|| file_name.clone(), |stem| stem.to_string_lossy().into_owned());

        Ok(Self {
            dump_id,
            user_id: user_id.to_string(),
            file_name,
            size,
            uploaded_at: Utc::now(),
            runtime_version: None,
            symbol_files: Vec::new(),
        })
    }
}
