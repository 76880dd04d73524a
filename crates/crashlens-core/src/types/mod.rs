//! # Types
//!
//! Plain data shared across the driver: module addresses, platform facts from
//! the verify invocation, normalized registers, and the persisted metadata
//! record.

pub mod address;
pub mod metadata;
pub mod platform;
pub mod registers;

// Re-export all public types
pub use address::Address;
pub use metadata::DumpMetadata;
pub use platform::{Architecture, VerifiedPlatformInfo};
pub use registers::{RegisterRole, RegisterSet};
