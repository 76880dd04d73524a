//! Common module for library exports

pub use crate::backend::{ProcessSupervisor, SubprocessSupervisor};
pub use crate::config::{BackendKind, BackendProfile, DriverConfig};
pub use crate::driver::{DriverState, DumpDriver};
pub use crate::error::{DriverError, DriverResult};
pub use crate::recovery::{CrashRecovery, OpenDumpRecord};
pub use crate::runtime::{LocalRuntimeResolver, RuntimeResolver};
pub use crate::symbols::{DiskSymbolCache, SymbolCache};
pub use crate::types::{Address, Architecture, DumpMetadata, RegisterSet, VerifiedPlatformInfo};
