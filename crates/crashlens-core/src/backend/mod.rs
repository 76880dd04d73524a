//! # Debugger Backend
//!
//! The interactive debugger subprocess and the framing protocol spoken over
//! its standard streams.
//!
//! - [`CommandChannel`]: sentinel-framed request/response over a pair of
//!   pipes. Knows nothing about processes.
//! - [`SubprocessSupervisor`]: spawns the debugger, owns the channel, and
//!   kills the process when asked (or when dropped).
//!
//! ## Why a trait?
//!
//! The driver only ever talks to a [`ProcessSupervisor`]. Tests substitute a
//! scripted fake so the open/recovery flows can be exercised without a real
//! debugger installed.

pub mod channel;
pub mod supervisor;
pub(crate) mod tool;

use async_trait::async_trait;

pub use channel::CommandChannel;
pub use supervisor::SubprocessSupervisor;

use crate::error::DriverResult;

/// Owner of one interactive debugger subprocess
///
/// ## Lifecycle
///
/// 1. `start()`: spawn the process and complete the startup handshake
/// 2. `execute()`: any number of commands, strictly one at a time
/// 3. `shutdown()` (graceful) or `kill()` (immediate)
///
/// A supervisor may be started again after it was killed; this is how crash
/// recovery gets a fresh backend.
///
/// ## Concurrency
///
/// Methods take `&mut self`, so the borrow checker enforces the "one command
/// in flight" rule. The channel never queues or reorders commands.
#[async_trait]
pub trait ProcessSupervisor: Send
{
    /// Spawn the backend and wait until it answers a bare sentinel.
    ///
    /// Starting an already running supervisor is a no-op.
    ///
    /// ## Errors
    ///
    /// - `Io`: the executable could not be spawned
    /// - `BackendCrashed` / `BackendExited` / `Timeout`: the handshake failed
    async fn start(&mut self) -> DriverResult<()>;

    /// Run one command and return its cleaned output.
    ///
    /// ## Errors
    ///
    /// - `NotInitialized`: `start()` has not succeeded
    /// - `BackendCrashed`: a fault signature appeared in the raw output
    /// - `BackendExited`: the process closed its output
    /// - `Timeout`: no completion line within the command timeout
    async fn execute(&mut self, command: &str) -> DriverResult<String>;

    /// Whether the process is alive and its channel still open.
    fn is_running(&mut self) -> bool;

    /// Kill the process immediately and drop the channel. Never fails;
    /// errors from an already dead process are only logged.
    fn kill(&mut self);

    /// Ask the backend to quit and wait briefly for it, killing it if needed.
    ///
    /// ## Errors
    ///
    /// - `Io`: waiting on the process failed
    async fn shutdown(&mut self) -> DriverResult<()>;
}
