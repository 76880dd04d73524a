//! # crashlens utilities
//!
//! Shared utilities for the crashlens workspace: logging setup built on
//! `tracing`, and small filesystem helpers used when indexing symbol caches.

pub mod fs;
pub mod logging;

// Re-export commonly used logging functions for convenience
pub use logging::{init_logging, init_logging_to_file, init_logging_with_level, LogFormat, LogLevel, LoggingError};
pub use tracing::{debug, error, info, trace, warn};
