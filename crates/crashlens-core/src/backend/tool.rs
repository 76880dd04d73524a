//! One-shot external tool invocations (verify, symbol download).

use std::ffi::OsString;
use std::path::Path;
use std::process::{Output, Stdio};
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

use crate::error::{DriverError, DriverResult};

/// Run `program args…` to completion with a timeout.
///
/// The child is killed when the timeout elapses (`kill_on_drop`). A non-zero
/// exit status is an error carrying the first line of stderr.
pub(crate) async fn run_tool(role: &'static str, program: &Path, args: &[OsString], timeout: Duration) -> DriverResult<Output>
{
    debug!(tool = role, program = %program.display(), ?args, "running external tool");

    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|err| DriverError::ToolFailed {
            tool: role,
            reason: format!("failed to start {}: {err}", program.display()),
        })?;

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(result) => result.map_err(|err| DriverError::ToolFailed {
            tool: role,
            reason: err.to_string(),
        })?,
        Err(_) => {
            return Err(DriverError::ToolFailed {
                tool: role,
                reason: format!("timed out after {timeout:?}"),
            })
        }
    };

    if output.status.success() {
        return Ok(output);
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let detail = stderr.lines().map(str::trim).find(|line| !line.is_empty()).unwrap_or("no output");
    Err(DriverError::ToolFailed {
        tool: role,
        reason: format!("{}: {detail}", output.status),
    })
}
