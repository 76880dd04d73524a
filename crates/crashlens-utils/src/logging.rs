//! # Logging Utilities
//!
//! Subscriber setup for hosts that embed the crashlens driver.
//!
//! The driver only emits `tracing` events; it never installs a subscriber and
//! never reads the environment. Hosts call one of the `init_*` functions once
//! at startup:
//!
//! - [`init_logging`]: reads `RUST_LOG`, `CRASHLENS_LOG_FORMAT` and
//!   `CRASHLENS_LOG_FILE`
//! - [`init_logging_with_level`]: explicit level and format, console only
//! - [`init_logging_to_file`]: file only, for hosts that own stdout/stderr
//!
//! ```rust,no_run
//! use crashlens_utils::{init_logging_with_level, LogFormat, LogLevel};
//!
//! let _guard = init_logging_with_level(LogLevel::Debug, LogFormat::Pretty).expect("logging");
//! tracing::info!(dump = "/tmp/core.1234", "opening dump");
//! ```

use std::env;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::Level;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::{self};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Environment variable selecting the output format.
pub const LOG_FORMAT_ENV: &str = "CRASHLENS_LOG_FORMAT";
/// Environment variable naming an optional log file.
pub const LOG_FILE_ENV: &str = "CRASHLENS_LOG_FILE";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat
{
    /// Human-readable lines (default)
    Pretty,
    /// One JSON object per event
    Json,
}

impl FromStr for LogFormat
{
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" | "dev" => Ok(Self::Pretty),
            "json" | "prod" => Ok(Self::Json),
            other => Err(LoggingError::InvalidFormat(other.to_string())),
        }
    }
}

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel
{
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel
{
    /// Directive string understood by [`EnvFilter`].
    #[must_use]
    pub const fn as_directive(self) -> &'static str
    {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

impl From<LogLevel> for Level
{
    fn from(level: LogLevel) -> Self
    {
        match level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

impl FromStr for LogLevel
{
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" | "err" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" | "dbg" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            other => Err(LoggingError::InvalidLevel(other.to_string())),
        }
    }
}

/// Keeps the background file writer alive.
///
/// Dropping the guard flushes and stops the non-blocking file writer, so hosts
/// should hold it for the lifetime of the process.
#[must_use = "dropping the guard stops file logging"]
#[derive(Debug, Default)]
pub struct LoggingGuard
{
    _file: Option<WorkerGuard>,
}

/// Initialize logging from the environment.
///
/// - `RUST_LOG`: filter directives, default `info`
/// - `CRASHLENS_LOG_FORMAT`: `pretty` (default) or `json`
/// - `CRASHLENS_LOG_FILE`: when set, events are also appended to this file
///
/// ## Errors
///
/// Returns an error if a global subscriber is already installed, the format
/// variable is not recognised, or the log file cannot be opened.
pub fn init_logging() -> Result<LoggingGuard, LoggingError>
{
    let format = match env::var(LOG_FORMAT_ENV) {
        Ok(value) => value.parse()?,
        Err(_) => LogFormat::Pretty,
    };
    let log_file = env::var_os(LOG_FILE_ENV).map(PathBuf::from);

    let mut layers = vec![console_layer(format, env_filter(LogLevel::Info))];
    let mut guard = LoggingGuard::default();
    if let Some(path) = log_file {
        let (writer, worker) = file_writer(&path)?;
        layers.push(file_layer(format, writer, env_filter(LogLevel::Info)));
        guard._file = Some(worker);
    }

    install(layers)?;
    Ok(guard)
}

/// Initialize console logging with an explicit level and format.
///
/// `RUST_LOG` still wins when it is set, so module-specific filters such as
/// `crashlens_core::backend=trace` keep working.
///
/// ## Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_logging_with_level(level: LogLevel, format: LogFormat) -> Result<LoggingGuard, LoggingError>
{
    install(vec![console_layer(format, env_filter(level))])?;
    Ok(LoggingGuard::default())
}

/// Initialize file-only logging.
///
/// Used by hosts whose stdout/stderr carry protocol traffic. The parent
/// directory is created when missing.
///
/// ## Errors
///
/// Returns an error if the directory or file cannot be created, or a global
/// subscriber is already installed.
pub fn init_logging_to_file(path: &Path, level: LogLevel) -> Result<LoggingGuard, LoggingError>
{
    let (writer, worker) = file_writer(path)?;
    install(vec![file_layer(LogFormat::Pretty, writer, EnvFilter::new(level.as_directive()))])?;
    Ok(LoggingGuard { _file: Some(worker) })
}

fn env_filter(default_level: LogLevel) -> EnvFilter
{
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level.as_directive()))
}

fn console_layer(format: LogFormat, filter: EnvFilter) -> BoxedLayer
{
    match format {
        LogFormat::Pretty => fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_timer(ChronoUtc::rfc_3339())
            .with_ansi(true)
            .with_writer(io::stderr)
            .with_filter(filter)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_timer(ChronoUtc::rfc_3339())
            .with_current_span(true)
            .with_span_list(true)
            .with_writer(io::stderr)
            .with_filter(filter)
            .boxed(),
    }
}

fn file_layer(format: LogFormat, writer: NonBlocking, filter: EnvFilter) -> BoxedLayer
{
    match format {
        LogFormat::Pretty => fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_timer(ChronoUtc::rfc_3339())
            .with_ansi(false)
            .with_writer(writer)
            .with_filter(filter)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_timer(ChronoUtc::rfc_3339())
            .with_current_span(true)
            .with_writer(writer)
            .with_filter(filter)
            .boxed(),
    }
}

fn file_writer(path: &Path) -> Result<(NonBlocking, WorkerGuard), LoggingError>
{
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let file_name = path
        .file_name()
        .ok_or_else(|| LoggingError::InvalidPath(path.to_path_buf()))?;

    std::fs::create_dir_all(&directory)?;
    let appender = tracing_appender::rolling::never(&directory, file_name);
    Ok(tracing_appender::non_blocking(appender))
}

fn install(layers: Vec<BoxedLayer>) -> Result<(), LoggingError>
{
    Registry::default()
        .with(layers)
        .try_init()
        .map_err(|err| LoggingError::InitializationFailed(err.to_string()))
}

/// Logging initialization error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError
{
    /// Unrecognised log format
    #[error("Invalid log format: {0} (use 'pretty' or 'json')")]
    InvalidFormat(String),

    /// Unrecognised log level
    #[error("Invalid log level: {0} (use 'error', 'warn', 'info', 'debug' or 'trace')")]
    InvalidLevel(String),

    /// Log file path has no file name component
    #[error("Invalid log file path: {}", .0.display())]
    InvalidPath(PathBuf),

    /// A global subscriber was already installed
    #[error("Failed to initialize logging: {0}")]
    InitializationFailed(String),

    /// Log file or directory could not be created
    #[error("File logging error: {0}")]
    FileError(#[from] io::Error),
}
