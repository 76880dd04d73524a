//! # Runtime Resolver
//!
//! Decides whether a dump belongs to a managed runtime, which runtime version
//! produced it, and which locally installed runtime directory matches.
//!
//! Inputs are the text of a one-shot verify invocation and the layout of a
//! runtime installations root (one directory per version, e.g.
//! `/usr/share/dotnet/shared/Microsoft.NETCore.App/9.0.10`). Nothing here
//! fails hard on odd input: an unrecognised loader yields an unknown
//! architecture and an unparseable path yields no version.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::backend::tool::run_tool;
use crate::error::{DriverError, DriverResult};
use crate::modules::module_basename;
use crate::types::{Address, Architecture, VerifiedPlatformInfo};

/// Module-name fragments that only appear in managed-runtime processes:
/// runtime host, JIT, core library and bootstrap libraries.
pub const MANAGED_RUNTIME_INDICATORS: &[&str] = &[
    "libcoreclr.so",
    "libclrjit.so",
    "system.private.corelib.dll",
    "libhostfxr.so",
    "libhostpolicy.so",
    "libmscordaccore.so",
];

/// `<family>/<version>` path segment; the version must end the segment.
static VERSION_SEGMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[/\s])[^/\s]+/(\d+(?:\.\d+){1,3})(?:/|\s|$)").expect("version regex is valid")
});

/// `<hexAddress> <modulePath>` line of the verify invocation.
static VERIFY_MODULE_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:0[xX])?([0-9a-fA-F]+)\s+(\S.*?)\s*$").expect("verify regex is valid"));

/// Whether the module list (or an already-resolved version) marks the dump as managed.
///
/// ```rust
/// use crashlens_core::runtime::detect_managed_dump;
///
/// assert!(detect_managed_dump("/opt/app/LIBCORECLR.SO", None));
/// assert!(detect_managed_dump("/lib/libc.so.6", Some("8.0.1")));
/// assert!(!detect_managed_dump("/lib/libc.so.6\n/usr/bin/nginx", None));
/// ```
#[must_use]
pub fn detect_managed_dump(module_list_text: &str, runtime_version: Option<&str>) -> bool
{
    if runtime_version.is_some_and(|version| !version.is_empty()) {
        return true;
    }
    let lower = module_list_text.to_ascii_lowercase();
    MANAGED_RUNTIME_INDICATORS.iter().any(|indicator| lower.contains(indicator))
}

/// Whether `s` is 2–4 dot-separated non-negative integers.
///
/// ```rust
/// use crashlens_core::runtime::is_valid_version_string;
///
/// assert!(is_valid_version_string("9.0"));
/// assert!(is_valid_version_string("9.0.10.1"));
/// assert!(!is_valid_version_string("9"));
/// assert!(!is_valid_version_string("9.0.10.1.2"));
/// assert!(!is_valid_version_string("9.0.10-rc1"));
/// assert!(!is_valid_version_string("9..0"));
/// ```
#[must_use]
pub fn is_valid_version_string(s: &str) -> bool
{
    parse_version(s).is_some()
}

/// Numeric components of a valid version string.
#[must_use]
pub fn parse_version(s: &str) -> Option<Vec<u64>>
{
    let parts: Vec<&str> = s.split('.').collect();
    if !(2..=4).contains(&parts.len()) {
        return None;
    }
    parts
        .iter()
        .map(|part| {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                None
            } else {
                part.parse::<u64>().ok()
            }
        })
        .collect()
}

/// Pull a runtime version out of a path-bearing line.
///
/// Looks for the first `<family>/<version>` segment pair whose version is
/// 2–4 dot-separated integers with nothing else in the segment.
///
/// ```rust
/// use crashlens_core::runtime::extract_runtime_version;
///
/// assert_eq!(
///     extract_runtime_version("7f00 /usr/share/dotnet/shared/Microsoft.NETCore.App/8.0.11/libcoreclr.so"),
///     Some("8.0.11".to_string())
/// );
/// assert_eq!(extract_runtime_version("/opt/runtime/9.0.10-preview/libcoreclr.so"), None);
/// assert_eq!(extract_runtime_version("/lib/libc.so.6"), None);
/// ```
#[must_use]
pub fn extract_runtime_version(line: &str) -> Option<String>
{
    VERSION_SEGMENT
        .captures_iter(line)
        .map(|captures| captures[1].to_string())
        .find(|version| is_valid_version_string(version))
}

/// Locate the installed runtime directory for `version` under `root`.
///
/// An exact directory-name match wins. Otherwise the numerically newest
/// valid version directory is returned, since a missing exact match is
/// expected (dumps often come from other machines). Returns `None` only when
/// the root is missing or holds no version directories.
#[must_use]
pub fn find_runtime_in(root: &Path, version: Option<&str>) -> Option<PathBuf>
{
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(err) => {
            debug!(root = %root.display(), %err, "runtime installations root not readable");
            return None;
        }
    };

    let installed: Vec<(String, PathBuf)> = entries
        .flatten()
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| {
            let name = entry.file_name().to_str()?.to_string();
            Some((name, entry.path()))
        })
        .collect();

    if let Some(wanted) = version {
        if let Some((_, path)) = installed.iter().find(|(name, _)| name == wanted) {
            return Some(path.clone());
        }
        debug!(version = wanted, "no exact runtime match; falling back to newest installed");
    }

    installed
        .into_iter()
        .filter_map(|(name, path)| parse_version(&name).map(|parts| (parts, path)))
        .max_by(|(a, _), (b, _)| a.cmp(b))
        .map(|(_, path)| path)
}

/// Architecture and musl flag implied by a dynamic loader path.
///
/// Only paths whose basename starts with `ld-` are considered loaders.
#[must_use]
pub fn classify_loader(path: &str) -> Option<(Architecture, bool)>
{
    let name = module_basename(path).to_ascii_lowercase();
    if !name.starts_with("ld-") {
        return None;
    }

    if let Some(rest) = name.strip_prefix("ld-musl-") {
        let arch = if rest.starts_with("x86_64") {
            Architecture::X64
        } else if rest.starts_with("aarch64") {
            Architecture::Arm64
        } else if rest.starts_with("i386") || rest.starts_with("i686") || rest.starts_with("x86") {
            Architecture::X86
        } else {
            Architecture::Unknown
        };
        return Some((arch, true));
    }

    let lower = path.to_ascii_lowercase();
    let arch = if lower.contains("x86-64") || lower.contains("x86_64") {
        Architecture::X64
    } else if lower.contains("aarch64") || lower.contains("arm64") {
        Architecture::Arm64
    } else if name.starts_with("ld-linux.so") || lower.contains("i386") || lower.contains("i686") {
        Architecture::X86
    } else {
        return None;
    };
    Some((arch, false))
}

/// Parse the verify invocation's output.
///
/// The first line that is not a `<hexAddress> <modulePath>` pair is the dump
/// path; every pair is a module. The basename of the first module is the
/// main executable name. Zero-address modules are listed in `module_paths`
/// but not in `modules`.
///
/// ```rust
/// use crashlens_core::runtime::parse_verify_core_output;
/// use crashlens_core::types::Architecture;
///
/// let info = parse_verify_core_output(&[
///     "/tmp/core",
///     "1 /lib/ld-musl-x86_64.so.1",
///     "2 /opt/runtime/9.0.10/libcoreclr.so",
/// ]);
/// assert!(info.is_musl_libc);
/// assert_eq!(info.architecture, Architecture::X64);
/// assert_eq!(info.main_executable_name.as_deref(), Some("ld-musl-x86_64.so.1"));
/// ```
#[must_use]
pub fn parse_verify_core_output<S: AsRef<str>>(lines: &[S]) -> VerifiedPlatformInfo
{
    let mut info = VerifiedPlatformInfo::default();

    for raw in lines {
        let line = raw.as_ref().trim();
        if line.is_empty() {
            continue;
        }

        let Some(captures) = VERIFY_MODULE_LINE.captures(line) else {
            if info.dump_path.is_none() {
                info.dump_path = Some(line.to_string());
            }
            continue;
        };

        let path = captures[2].to_string();
        let name = module_basename(&path).to_string();
        let base = Address::parse_hex(&captures[1]).unwrap_or(Address::ZERO);

        if info.main_executable_name.is_none() && !name.is_empty() {
            info.main_executable_name = Some(name.clone());
        }
        if let Some((arch, musl)) = classify_loader(&path) {
            if info.architecture == Architecture::Unknown {
                info.architecture = arch;
            }
            info.is_musl_libc |= musl;
        }
        if !base.is_zero() && !name.is_empty() {
            info.modules.entry(name).or_insert(base);
        }
        info.module_paths.push(path);
    }

    info
}

/// Runtime resolution seam
///
/// The driver talks to this trait so tests can substitute a resolver that
/// never spawns the verify tool or touches a runtime installation.
#[async_trait]
pub trait RuntimeResolver: Send + Sync
{
    /// Run the one-shot verify invocation and return its output lines.
    async fn verify_dump(&self, dump_path: &Path) -> DriverResult<Vec<String>>;

    /// Installed runtime directory for `version`; never fails hard.
    fn find_matching_runtime_path(&self, version: Option<&str>) -> Option<PathBuf>;
}

/// Resolver backed by a local verify tool and runtime installations root
#[derive(Debug, Clone)]
pub struct LocalRuntimeResolver
{
    verify_tool: Option<PathBuf>,
    verify_args: Vec<String>,
    runtime_root: PathBuf,
    timeout: Duration,
}

impl LocalRuntimeResolver
{
    #[must_use]
    pub fn new(verify_tool: Option<PathBuf>, verify_args: Vec<String>, runtime_root: PathBuf, timeout: Duration) -> Self
    {
        Self {
            verify_tool,
            verify_args,
            runtime_root,
            timeout,
        }
    }

    /// Resolver configured from a [`DriverConfig`](crate::config::DriverConfig).
    #[must_use]
    pub fn from_config(config: &crate::config::DriverConfig) -> Self
    {
        Self::new(
            config.verify_tool.clone(),
            config.verify_args.clone(),
            config.runtime_root.clone(),
            config.verify_timeout,
        )
    }
}

#[async_trait]
impl RuntimeResolver for LocalRuntimeResolver
{
    async fn verify_dump(&self, dump_path: &Path) -> DriverResult<Vec<String>>
    {
        let tool = self.verify_tool.as_deref().ok_or(DriverError::ToolUnavailable("verify"))?;

        let mut args: Vec<OsString> = self.verify_args.iter().map(OsString::from).collect();
        args.push(dump_path.as_os_str().to_os_string());

        let output = run_tool("verify", tool, &args, self.timeout).await?;
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::to_string)
            .collect())
    }

    fn find_matching_runtime_path(&self, version: Option<&str>) -> Option<PathBuf>
    {
        find_runtime_in(&self.runtime_root, version)
    }
}
