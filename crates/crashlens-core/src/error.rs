//! # Error Types
//!
//! General error handling for the dump driver.
//!
//! We use `thiserror` to automatically generate `Error` trait implementations
//! and nice error messages.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Main error type for driver operations
///
/// ## Error Categories
///
/// 1. **Usage errors**: `InvalidArgument` (never retried)
/// 2. **State errors**: `NotInitialized`, `NoDumpOpen`, `DumpNotFound`
/// 3. **Backend failures**: `BackendCrashed`, `BackendExited`, `Timeout`
///    (recoverable once, see [`DriverError::is_backend_failure`])
/// 4. **Session errors**: `SessionLost` (recovery did not help)
/// 5. **Backend rejections**: `CommandFailed`
/// 6. **Extension errors**: `ExtensionNotFound`, `ExtensionLoadFailed`,
///    `ExtensionCommandsUnavailable`
/// 7. **Tool errors**: `ToolUnavailable`, `ToolFailed`
/// 8. **I/O and encoding**: `Io`, `Json`
#[derive(Error, Debug)]
pub enum DriverError
{
    /// A caller passed an empty path, an empty command, or similar
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// An operation other than `initialize` ran before the backend was started
    ///
    /// ## Solution
    ///
    /// Call `initialize()` first. After a `SessionLost` error the driver is
    /// left uninitialized and must be initialized again explicitly.
    #[error("Debugger backend is not initialized")]
    NotInitialized,

    /// The operation needs an open dump
    #[error("No dump is open")]
    NoDumpOpen,

    /// The dump file passed to `open_dump` does not exist
    #[error("Dump file not found: {}", .0.display())]
    DumpNotFound(PathBuf),

    /// The backend reported an internal fault or the OS reported one for it
    ///
    /// `signature` is the fault text that matched in the raw output.
    #[error("Debugger backend crashed ({signature})")]
    BackendCrashed
    {
        /// Matched fault signature
        signature: String,
    },

    /// The backend process exited or closed its output unexpectedly
    #[error("Debugger backend exited unexpectedly")]
    BackendExited,

    /// No completion marker arrived within the command timeout
    #[error("Debugger backend did not respond within {0:?}")]
    Timeout(Duration),

    /// Recovery was attempted once and the session is still unusable
    #[error("Debugger session lost: {0}")]
    SessionLost(String),

    /// The backend rejected a command the driver issued on its own behalf
    #[error("Command '{command}' failed: {message}")]
    CommandFailed
    {
        /// Command as sent to the backend
        command: String,
        /// First error line reported by the backend
        message: String,
    },

    /// No runtime-inspection extension binary could be located
    #[error("Inspection extension not found: {0}")]
    ExtensionNotFound(String),

    /// The plugin-load command reported an error
    #[error("Failed to load inspection extension: {0}")]
    ExtensionLoadFailed(String),

    /// The extension loaded but its commands are not registered
    #[error("Inspection extension loaded but its commands are unavailable: {0}")]
    ExtensionCommandsUnavailable(String),

    /// An optional external tool is not configured
    #[error("{0} tool is not configured")]
    ToolUnavailable(&'static str),

    /// An external tool ran but did not succeed
    #[error("{tool} failed: {reason}")]
    ToolFailed
    {
        /// Tool role, e.g. "verify" or "symbol download"
        tool: &'static str,
        /// Exit status, timeout or spawn error description
        reason: String,
    },

    /// I/O error (spawning processes, reading files, pipes)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Metadata sidecar could not be encoded or decoded
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DriverError
{
    /// Whether this error means the backend process is gone or unresponsive.
    ///
    /// These are the failures that trigger the one-shot crash recovery; every
    /// other error is returned to the caller as-is.
    #[must_use]
    pub const fn is_backend_failure(&self) -> bool
    {
        matches!(self, Self::BackendCrashed { .. } | Self::BackendExited | Self::Timeout(_))
    }
}

/// Convenience type alias for `Result<T, DriverError>`
///
/// ```rust
/// use crashlens_core::error::DriverResult;
/// fn foo() -> DriverResult<()>
/// {
///     Ok(())
/// }
/// ```
pub type DriverResult<T> = std::result::Result<T, DriverError>;
