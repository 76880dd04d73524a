//! # crashlens-core
//!
//! Drives an interactive native debugger (LLDB by default) over postmortem
//! crash dumps and turns its free-form REPL into a request/response API.
//!
//! This crate provides:
//! - Sentinel-framed command execution over the debugger's standard streams
//! - Crash, exit, and timeout detection with one-shot recovery
//! - Managed-runtime detection and local runtime matching
//! - Symbol cache skip-or-download decisions backed by a JSON sidecar
//! - Loading of a runtime-inspection extension, with a command probe
//! - Parsers for module listings, register dumps, and ELF headers
//!
//! ## Layout
//!
//! - [`driver::DumpDriver`]: the entry point for callers
//! - [`backend`]: subprocess supervision and the command channel
//! - [`runtime`], [`modules`], [`symbols`], [`extension`]: resolution steps
//!   run while opening a dump
//! - [`output`]: pure text transforms over backend output
//!
//! The driver never reads the process environment; everything comes from
//! [`config::DriverConfig`].

pub mod backend;
pub mod config;
pub mod driver;
pub mod error;
pub mod extension;
pub mod modules;
pub mod output;
pub mod prelude;
pub mod recovery;
pub mod runtime;
pub mod symbols;
pub mod types;

pub use backend::ProcessSupervisor;
pub use config::{BackendKind, BackendProfile, DriverConfig};
pub use driver::DumpDriver;
// Re-export commonly used types
pub use error::{DriverError, DriverResult};
pub use types::{Address, RegisterSet};
