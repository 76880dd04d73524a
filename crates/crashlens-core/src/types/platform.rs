//! Target platform facts derived from a dump's module list.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::Address;

/// CPU architecture of the process that produced the dump
///
/// Inferred from the dynamic loader path, never from the host. When the
/// loader is not recognised the architecture stays [`Architecture::Unknown`]
/// and analysis continues in a degraded mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Architecture
{
    /// 32-bit x86
    X86,
    /// 64-bit x86 (Intel/AMD)
    X64,
    /// 64-bit ARM
    Arm64,
    /// Loader not recognised
    #[default]
    Unknown,
}

impl Architecture
{
    /// Short tag used in logs and by collaborators (`x86`, `x64`, `arm64`, `unknown`).
    pub const fn as_str(self) -> &'static str
    {
        match self {
            Self::X86 => "x86",
            Self::X64 => "x64",
            Self::Arm64 => "arm64",
            Self::Unknown => "unknown",
        }
    }

    /// Size of a pointer in bytes, if known.
    pub const fn pointer_size(self) -> Option<usize>
    {
        match self {
            Self::X86 => Some(4),
            Self::X64 | Self::Arm64 => Some(8),
            Self::Unknown => None,
        }
    }
}

impl fmt::Display for Architecture
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.write_str(self.as_str())
    }
}

/// Platform facts produced once per dump open by the verify invocation
///
/// The driver stores this value after parsing and only hands out shared
/// references to it, so it does not change while the dump stays open.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VerifiedPlatformInfo
{
    /// Dump path as echoed by the verify tool, if it printed one
    pub dump_path: Option<String>,
    /// Architecture tag inferred from the dynamic loader
    pub architecture: Architecture,
    /// Set when the musl dynamic loader is present (Alpine-style targets)
    pub is_musl_libc: bool,
    /// Basename of the first module entry
    pub main_executable_name: Option<String>,
    /// Module paths in the order the verify tool printed them
    pub module_paths: Vec<String>,
    /// Module basename to base address; zero-address entries are omitted
    pub modules: BTreeMap<String, Address>,
}

impl VerifiedPlatformInfo
{
    /// Platform info for a dump whose verify invocation failed.
    #[must_use]
    pub fn unknown() -> Self
    {
        Self::default()
    }

    /// Newline-joined module paths, the input format of managed-runtime detection.
    #[must_use]
    pub fn module_list_text(&self) -> String
    {
        self.module_paths.join("\n")
    }
}
