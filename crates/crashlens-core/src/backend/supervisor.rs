//! Subprocess ownership for the interactive debugger backend.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use super::channel::CommandChannel;
use super::ProcessSupervisor;
use crate::config::{BackendProfile, DriverConfig};
use crate::error::{DriverError, DriverResult};

/// How long `shutdown` waits for the backend to honour the quit command.
const QUIT_GRACE: Duration = Duration::from_secs(5);

/// [`ProcessSupervisor`] that spawns a real debugger executable
///
/// The child is spawned with `kill_on_drop`, and [`Drop`] kills it as well,
/// so a supervisor going out of scope never leaks a debugger process.
#[derive(Debug)]
pub struct SubprocessSupervisor
{
    program: PathBuf,
    args: Vec<String>,
    profile: BackendProfile,
    timeout: Duration,
    child: Option<Child>,
    channel: Option<ChannelSlot>,
}

/// `CommandChannel` holds boxed trait objects and is not `Debug`.
struct ChannelSlot(CommandChannel);

impl std::fmt::Debug for ChannelSlot
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
    {
        f.debug_struct("CommandChannel")
            .field("sequence", &self.0.sequence())
            .field("closed", &self.0.is_closed())
            .finish()
    }
}

impl SubprocessSupervisor
{
    #[must_use]
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>, profile: BackendProfile, timeout: Duration) -> Self
    {
        Self {
            program: program.into(),
            args,
            profile,
            timeout,
            child: None,
            channel: None,
        }
    }

    /// Supervisor for the debugger named in a [`DriverConfig`].
    #[must_use]
    pub fn from_config(config: &DriverConfig) -> Self
    {
        Self::new(
            config.debugger_path.clone(),
            config.debugger_args.clone(),
            config.profile.clone(),
            config.command_timeout,
        )
    }

    #[must_use]
    pub fn program(&self) -> &Path
    {
        &self.program
    }

    /// OS process id of the running backend, if any.
    #[must_use]
    pub fn pid(&self) -> Option<u32>
    {
        self.child.as_ref().and_then(Child::id)
    }

    fn spawn(&self) -> DriverResult<(Child, CommandChannel)>
    {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .env("TERM", "dumb")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let (Some(stdin), Some(stdout), Some(stderr)) = (child.stdin.take(), child.stdout.take(), child.stderr.take())
        else {
            return Err(std::io::Error::other("backend standard streams were not captured").into());
        };

        let channel = CommandChannel::new(stdin, stdout, &self.profile, self.timeout).with_diagnostics(stderr);
        Ok((child, channel))
    }

    /// Log how the process ended when a command failed because of it.
    fn report_exit(&mut self)
    {
        if let Some(child) = self.child.as_mut() {
            match child.try_wait() {
                Ok(Some(status)) => warn!(%status, "debugger backend exited"),
                Ok(None) => debug!("debugger backend still running after failure"),
                Err(err) => debug!(%err, "could not query debugger backend status"),
            }
        }
    }
}

#[async_trait]
impl ProcessSupervisor for SubprocessSupervisor
{
    async fn start(&mut self) -> DriverResult<()>
    {
        if self.is_running() {
            return Ok(());
        }
        // Leftovers of a dead backend.
        self.kill();

        info!(program = %self.program.display(), args = ?self.args, "starting debugger backend");
        let (child, mut channel) = self.spawn()?;
        self.child = Some(child);

        match channel.execute("").await {
            Ok(banner) => {
                if !banner.is_empty() {
                    debug!(%banner, "debugger backend banner");
                }
                self.channel = Some(ChannelSlot(channel));
                info!(pid = ?self.pid(), "debugger backend ready");
                Ok(())
            }
            Err(err) => {
                warn!(%err, "debugger backend handshake failed");
                self.report_exit();
                self.kill();
                Err(err)
            }
        }
    }

    async fn execute(&mut self, command: &str) -> DriverResult<String>
    {
        let ChannelSlot(channel) = self.channel.as_mut().ok_or(DriverError::NotInitialized)?;
        let result = channel.execute(command).await;
        if let Err(err) = &result {
            if err.is_backend_failure() {
                self.report_exit();
            }
        }
        result
    }

    fn is_running(&mut self) -> bool
    {
        let channel_open = self.channel.as_ref().is_some_and(|slot| !slot.0.is_closed());
        let process_alive = self
            .child
            .as_mut()
            .is_some_and(|child| matches!(child.try_wait(), Ok(None)));
        channel_open && process_alive
    }

    fn kill(&mut self)
    {
        self.channel = None;
        if let Some(mut child) = self.child.take() {
            debug!(pid = ?child.id(), "killing debugger backend");
            if let Err(err) = child.start_kill() {
                debug!(%err, "debugger backend already gone");
            }
        }
    }

    async fn shutdown(&mut self) -> DriverResult<()>
    {
        let Some(mut child) = self.child.take() else {
            self.channel = None;
            return Ok(());
        };

        if let Some(ChannelSlot(mut channel)) = self.channel.take() {
            if let Err(err) = channel.send_line(&self.profile.quit_command).await {
                debug!(%err, "could not send quit command");
            }
        }

        match tokio::time::timeout(QUIT_GRACE, child.wait()).await {
            Ok(status) => {
                let status = status?;
                info!(%status, "debugger backend stopped");
            }
            Err(_) => {
                warn!("debugger backend ignored quit; killing it");
                child.kill().await?;
            }
        }
        Ok(())
    }
}

impl Drop for SubprocessSupervisor
{
    fn drop(&mut self)
    {
        self.kill();
    }
}
