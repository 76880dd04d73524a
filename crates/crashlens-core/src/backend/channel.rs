//! # Command Channel
//!
//! Request/response framing over the backend's text REPL.
//!
//! The backend has no end-of-response marker, so every command is followed
//! by a sentinel command (`__crashlens_end_<n>`) the backend does not know.
//! Its "is not a valid command" reply is the completion signal: by the time
//! the backend reads the sentinel, everything the real command printed has
//! been written.
//!
//! ```text
//! caller ──execute("bt")──▶ stdin:  bt\n__crashlens_end_7\n
//!                           stdout: (lldb) bt
//!                                   * frame #0 ...
//!                           stderr: error: '__crashlens_end_7' is not a valid command.
//! reader tasks ──lines──▶ mpsc ──▶ execute() ──clean_output──▶ "* frame #0 ..."
//! ```
//!
//! Lines from stdout and stderr are pumped by two reader tasks into one
//! bounded channel with a single consumer: the `execute` call in flight.
//! Raw lines are scanned for fault signatures before any cleaning happens,
//! except the echo of the command itself.
//!
//! The two pipes are not ordered relative to each other, and a backend's
//! piped stdout may be block-buffered. For a backend that echoes its input,
//! a command is therefore complete only once the stdout echo of its
//! sentinel has also arrived: everything the command printed to stdout
//! precedes that echo in the same pipe.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::config::BackendProfile;
use crate::error::{DriverError, DriverResult};
use crate::output::{clean_output, find_fault_signature, is_echo_of, is_sentinel_line, mentions_sentinel, sentinel_command};

const EVENT_CAPACITY: usize = 4096;

/// Extra wait after completion for diagnostics lines still in the pipe.
const SETTLE_WINDOW: Duration = Duration::from_millis(20);

/// Event pushed by a reader task
#[derive(Debug, Clone, PartialEq, Eq)]
enum ChannelEvent
{
    Line
    {
        text: String,
        /// Read from the primary output stream (stdout)
        primary: bool,
    },
    /// The primary output stream reached end of file
    Closed,
}

/// Sentinel-framed command channel over a backend's standard streams
///
/// ## Example
///
/// ```rust,no_run
/// # async fn demo(child: &mut tokio::process::Child) -> crashlens_core::error::DriverResult<()>
/// # {
/// use std::time::Duration;
///
/// use crashlens_core::backend::CommandChannel;
/// use crashlens_core::config::BackendProfile;
///
/// let stdin = child.stdin.take().expect("piped stdin");
/// let stdout = child.stdout.take().expect("piped stdout");
/// let mut channel = CommandChannel::new(stdin, stdout, &BackendProfile::lldb(), Duration::from_secs(30));
/// let backtrace = channel.execute("bt").await?;
/// # Ok(())
/// # }
/// ```
pub struct CommandChannel
{
    stdin: Box<dyn AsyncWrite + Send + Unpin>,
    events: mpsc::Receiver<ChannelEvent>,
    sender: mpsc::Sender<ChannelEvent>,
    readers: Vec<JoinHandle<()>>,
    prompt: String,
    unknown_command_marker: String,
    fault_signatures: Vec<String>,
    echoes_input: bool,
    timeout: Duration,
    sequence: u64,
    closed: bool,
}

impl CommandChannel
{
    /// Build a channel writing to `stdin` and reading `stdout`.
    ///
    /// End of file on `stdout` marks the channel closed. Must be called from
    /// within a tokio runtime (the reader task is spawned immediately).
    pub fn new<W, R>(stdin: W, stdout: R, profile: &BackendProfile, timeout: Duration) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
        R: AsyncRead + Send + Unpin + 'static,
    {
        let (sender, events) = mpsc::channel(EVENT_CAPACITY);
        let readers = vec![spawn_reader(stdout, sender.clone(), true)];

        Self {
            stdin: Box::new(stdin),
            events,
            sender,
            readers,
            prompt: profile.prompt.clone(),
            unknown_command_marker: profile.unknown_command_marker.clone(),
            fault_signatures: profile.fault_signatures.clone(),
            echoes_input: profile.echoes_input,
            timeout,
            sequence: 0,
            closed: false,
        }
    }

    /// Also read a diagnostics stream (stderr) into the same channel.
    ///
    /// Its end of file does not close the channel.
    #[must_use]
    pub fn with_diagnostics<R>(mut self, stderr: R) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        self.readers.push(spawn_reader(stderr, self.sender.clone(), false));
        self
    }

    /// Whether the primary output stream has been seen to close.
    #[must_use]
    pub const fn is_closed(&self) -> bool
    {
        self.closed
    }

    /// Number of sentinels sent so far.
    #[must_use]
    pub const fn sequence(&self) -> u64
    {
        self.sequence
    }

    /// Send `command`, wait for its sentinel, and return the cleaned output.
    ///
    /// An empty command sends only the sentinel; this is the startup
    /// handshake and returns whatever banner text preceded it.
    ///
    /// ## Errors
    ///
    /// - `BackendCrashed`: a fault signature appeared in a raw line
    /// - `BackendExited`: stdout closed or stdin could not be written
    /// - `Timeout`: the completion line did not arrive in time
    pub async fn execute(&mut self, command: &str) -> DriverResult<String>
    {
        if self.closed {
            return Err(DriverError::BackendExited);
        }

        self.discard_stale_lines()?;

        self.sequence += 1;
        let sentinel = sentinel_command(self.sequence);
        let command = command.trim();

        let mut payload = String::with_capacity(command.len() + sentinel.len() + 2);
        if !command.is_empty() {
            payload.push_str(command);
            payload.push('\n');
        }
        payload.push_str(&sentinel);
        payload.push('\n');

        debug!(command, sequence = self.sequence, "sending command");
        self.write(payload.as_bytes()).await?;

        let raw = self.collect_until(command, &sentinel).await?;
        Ok(clean_output(&raw, command, &self.prompt))
    }

    /// Write one line without framing (used for the quit command).
    ///
    /// ## Errors
    ///
    /// - `BackendExited`: stdin is closed
    pub async fn send_line(&mut self, line: &str) -> DriverResult<()>
    {
        let mut payload = line.trim().to_string();
        payload.push('\n');
        self.write(payload.as_bytes()).await
    }

    async fn write(&mut self, bytes: &[u8]) -> DriverResult<()>
    {
        let result = match self.stdin.write_all(bytes).await {
            Ok(()) => self.stdin.flush().await,
            Err(err) => Err(err),
        };
        result.map_err(|err| {
            debug!(%err, "backend stdin write failed");
            self.closed = true;
            DriverError::BackendExited
        })
    }

    /// Drop lines left over from an earlier command (e.g. after a timeout).
    fn discard_stale_lines(&mut self) -> DriverResult<()>
    {
        while let Ok(event) = self.events.try_recv() {
            match event {
                ChannelEvent::Line { text: line, .. } => {
                    if let Some(signature) = find_fault_signature(&line, &self.fault_signatures) {
                        return Err(DriverError::BackendCrashed {
                            signature: signature.to_string(),
                        });
                    }
                    debug!(%line, "discarding stale backend output");
                }
                ChannelEvent::Closed => {
                    self.closed = true;
                    return Err(DriverError::BackendExited);
                }
            }
        }
        Ok(())
    }

    async fn collect_until(&mut self, command: &str, sentinel: &str) -> DriverResult<String>
    {
        let deadline = Instant::now() + self.timeout;
        // Sentinel lines are kept apart and appended last, so output that
        // trails the completion line still lands before the cut.
        let mut body = String::new();
        let mut tail = String::new();
        let mut echo_pending = !command.is_empty();
        let mut replied = false;
        let mut echoed = !self.echoes_input;

        while !(replied && echoed) {
            let event = match tokio::time::timeout_at(deadline, self.events.recv()).await {
                Ok(Some(event)) => event,
                Ok(None) => ChannelEvent::Closed,
                Err(_) => {
                    warn!(sentinel, replied, echoed, timeout = ?self.timeout, "backend did not complete command in time");
                    return Err(DriverError::Timeout(self.timeout));
                }
            };

            match event {
                ChannelEvent::Line { text, primary } => {
                    self.scan(&text, command, &mut echo_pending)?;
                    if mentions_sentinel(&text, sentinel) {
                        replied |= text.contains(&self.unknown_command_marker);
                        echoed |= primary;
                    }
                    push_line(if is_sentinel_line(&text) { &mut tail } else { &mut body }, &text);
                }
                ChannelEvent::Closed => {
                    self.closed = true;
                    return Err(DriverError::BackendExited);
                }
            }
        }

        self.settle(command, &mut echo_pending, &mut body, &mut tail).await?;
        body.push_str(&tail);
        Ok(body)
    }

    async fn settle(&mut self, command: &str, echo_pending: &mut bool, body: &mut String, tail: &mut String) -> DriverResult<()>
    {
        loop {
            match tokio::time::timeout(SETTLE_WINDOW, self.events.recv()).await {
                Ok(Some(ChannelEvent::Line { text, .. })) => {
                    self.scan(&text, command, echo_pending)?;
                    push_line(if is_sentinel_line(&text) { &mut *tail } else { &mut *body }, &text);
                }
                Ok(Some(ChannelEvent::Closed) | None) => {
                    // The command itself completed; the next one reports the exit.
                    self.closed = true;
                    return Ok(());
                }
                Err(_) => return Ok(()),
            }
        }
    }

    /// Fault check for one raw line. The first echo of `command` is exempt:
    /// its text is the caller's, not the backend's.
    fn scan(&self, line: &str, command: &str, echo_pending: &mut bool) -> DriverResult<()>
    {
        if *echo_pending && is_echo_of(line, command, &self.prompt) {
            *echo_pending = false;
            return Ok(());
        }
        self.check_fault(line)
    }

    fn check_fault(&self, line: &str) -> DriverResult<()>
    {
        match find_fault_signature(line, &self.fault_signatures) {
            Some(signature) => {
                warn!(signature, line, "backend fault detected");
                Err(DriverError::BackendCrashed {
                    signature: signature.to_string(),
                })
            }
            None => Ok(()),
        }
    }
}

impl Drop for CommandChannel
{
    fn drop(&mut self)
    {
        for reader in &self.readers {
            reader.abort();
        }
    }
}

fn push_line(buffer: &mut String, line: &str)
{
    buffer.push_str(line);
    buffer.push('\n');
}

/// Pump `reader` line by line into `sender`.
///
/// Bytes are decoded lossily; a backend printing invalid UTF-8 must not look
/// like a closed stream.
fn spawn_reader<R>(reader: R, sender: mpsc::Sender<ChannelEvent>, primary: bool) -> JoinHandle<()>
where
    R: AsyncRead + Send + Unpin + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buffer = Vec::new();
        loop {
            buffer.clear();
            match reader.read_until(b'\n', &mut buffer).await {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buffer)
                        .trim_end_matches(|c: char| c == '\n' || c == '\r')
                        .to_string();
                    trace!(primary, %line, "backend output");
                    if sender.send(ChannelEvent::Line { text: line, primary }).await.is_err() {
                        return;
                    }
                }
                Err(err) => {
                    debug!(primary, %err, "backend stream read failed");
                    break;
                }
            }
        }
        if primary {
            let _ = sender.send(ChannelEvent::Closed).await;
        }
    })
}

#[cfg(test)]
mod tests
{
    use tokio::io::{duplex, AsyncBufReadExt, AsyncWriteExt, BufReader};

    use super::*;

    /// In-memory backend: answers every line it reads with `respond(line)`.
    fn scripted_backend<F>(respond: F) -> CommandChannel
    where
        F: Fn(&str) -> Vec<String> + Send + 'static,
    {
        let (client_in, server_in) = duplex(64 * 1024);
        let (mut server_out, client_out) = duplex(64 * 1024);

        tokio::spawn(async move {
            let mut lines = BufReader::new(server_in).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                for reply in respond(&line) {
                    if server_out.write_all(format!("{reply}\n").as_bytes()).await.is_err() {
                        return;
                    }
                }
            }
        });

        CommandChannel::new(client_in, client_out, &BackendProfile::lldb(), Duration::from_millis(500))
    }

    fn lldb_like(line: &str) -> Vec<String>
    {
        let mut replies = vec![format!("(lldb) {line}")];
        if line.starts_with("__crashlens_end_") {
            replies.push(format!("error: '{line}' is not a valid command."));
        } else if line == "bt" {
            replies.push("* frame #0: 0x0000000000401000 app`main".to_string());
            replies.push("  frame #1: 0x0000000000401100 app`_start".to_string());
        } else if line == "crash" {
            replies.push("LLDB has crashed! PLEASE submit a bug report".to_string());
        }
        replies
    }

    #[tokio::test]
    async fn test_execute_returns_output_between_echo_and_sentinel()
    {
        let mut channel = scripted_backend(lldb_like);
        let output = channel.execute("bt").await.unwrap();
        assert_eq!(
            output,
            "* frame #0: 0x0000000000401000 app`main\n  frame #1: 0x0000000000401100 app`_start"
        );
        assert!(!output.contains("__crashlens_end_"));
        assert!(!output.contains("(lldb)"));
    }

    #[tokio::test]
    async fn test_handshake_and_sequence()
    {
        let mut channel = scripted_backend(lldb_like);
        assert_eq!(channel.execute("").await.unwrap(), "");
        channel.execute("bt").await.unwrap();
        assert_eq!(channel.sequence(), 2);
    }

    #[tokio::test]
    async fn test_fault_signature_is_a_crash()
    {
        let mut channel = scripted_backend(lldb_like);
        let err = channel.execute("crash").await.unwrap_err();
        assert!(matches!(err, DriverError::BackendCrashed { .. }));
    }

    #[tokio::test]
    async fn test_fault_text_in_command_echo_is_not_a_crash()
    {
        let mut channel = scripted_backend(lldb_like);
        let output = channel.execute("expression -- \"Segmentation fault\"").await.unwrap();
        assert_eq!(output, "");
        assert!(!channel.is_closed());
    }

    #[tokio::test]
    async fn test_stdout_trailing_the_completion_reply_is_kept()
    {
        let (client_in, server_in) = duplex(64 * 1024);
        let (mut server_out, client_out) = duplex(64 * 1024);
        let (mut server_err, client_err) = duplex(64 * 1024);

        // Replies on stderr at once; stdout is flushed in one block later.
        tokio::spawn(async move {
            let mut lines = BufReader::new(server_in).lines();
            let mut buffered = String::new();
            while let Ok(Some(line)) = lines.next_line().await {
                buffered.push_str(&format!("(lldb) {line}\n"));
                if line == "slow" {
                    buffered.push_str("late output\n");
                }
                if line.starts_with("__crashlens_end_") {
                    let reply = format!("error: '{line}' is not a valid command.\n");
                    if server_err.write_all(reply.as_bytes()).await.is_err() {
                        return;
                    }
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    if server_out.write_all(buffered.as_bytes()).await.is_err() {
                        return;
                    }
                    buffered.clear();
                }
            }
        });

        let mut channel = CommandChannel::new(client_in, client_out, &BackendProfile::lldb(), Duration::from_secs(5))
            .with_diagnostics(client_err);
        assert_eq!(channel.execute("slow").await.unwrap(), "late output");
        assert_eq!(channel.execute("bt").await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_silent_backend_times_out()
    {
        let mut channel = scripted_backend(|_| Vec::new());
        let err = channel.execute("bt").await.unwrap_err();
        assert!(matches!(err, DriverError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_closed_output_is_exit()
    {
        let (client_in, _server_in) = duplex(1024);
        let (server_out, client_out) = duplex(1024);
        drop(server_out);

        let mut channel = CommandChannel::new(client_in, client_out, &BackendProfile::lldb(), Duration::from_secs(5));
        let err = channel.execute("bt").await.unwrap_err();
        assert!(matches!(err, DriverError::BackendExited));
        assert!(channel.is_closed());
    }
}
