//! # Crash Recovery
//!
//! One-shot recovery after the backend crashed, exited, or stopped
//! responding: throw the dead backend away, start a new one, and reopen the
//! dump that was open before, if any.
//!
//! The steps are expressed against [`CrashRecovery`] so the sequence can be
//! checked with a counting fake instead of a real debugger.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::{DriverError, DriverResult};

/// Dump and executable paths needed to reopen a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenDumpRecord
{
    pub dump_path: PathBuf,
    pub executable_path: Option<PathBuf>,
}

impl OpenDumpRecord
{
    #[must_use]
    pub fn new(dump_path: impl Into<PathBuf>, executable_path: Option<PathBuf>) -> Self
    {
        Self {
            dump_path: dump_path.into(),
            executable_path,
        }
    }
}

/// Steps recovery is made of
#[async_trait]
pub trait CrashRecovery: Send
{
    /// Dispose of the dead backend handle. Errors are ignored by the caller.
    fn discard_backend(&mut self) -> DriverResult<()>;

    /// Start a fresh backend.
    async fn initialize(&mut self) -> DriverResult<()>;

    /// Open a dump on the fresh backend, without any nested recovery.
    async fn open_dump(&mut self, dump_path: &Path, executable_path: Option<&Path>) -> DriverResult<()>;
}

/// Run the recovery sequence exactly once.
///
/// `previous` is the dump that was open when the failure was detected.
/// `initialize` is called exactly once, and `open_dump` exactly once when
/// `previous` is set, never otherwise.
///
/// ## Errors
///
/// - `SessionLost`: reinitializing or reopening failed; nothing is retried
pub async fn recover_from_crash<T>(target: &mut T, previous: Option<OpenDumpRecord>) -> DriverResult<()>
where
    T: CrashRecovery + ?Sized,
{
    warn!(reopen = ?previous.as_ref().map(|record| &record.dump_path), "recovering from backend failure");

    if let Err(err) = target.discard_backend() {
        debug!(%err, "ignoring error while discarding dead backend");
    }

    target
        .initialize()
        .await
        .map_err(|err| DriverError::SessionLost(format!("reinitialize after crash failed: {err}")))?;

    if let Some(record) = previous {
        target
            .open_dump(&record.dump_path, record.executable_path.as_deref())
            .await
            .map_err(|err| {
                DriverError::SessionLost(format!(
                    "reopening {} after crash failed: {err}",
                    record.dump_path.display()
                ))
            })?;
    }

    info!("backend recovered");
    Ok(())
}
