//! # Configuration
//!
//! Everything the driver needs from its host is passed in a [`DriverConfig`]
//! at construction; nothing is read from the process environment.
//!
//! The subprocess contract itself (prompt text, completion marker, command
//! syntax) lives in a [`BackendProfile`], so the protocol code never
//! hard-codes a particular debugger.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::types::Address;

/// Family of debugger driven as the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind
{
    /// LLDB-compatible command syntax
    Lldb,
    /// Custom profile supplied by the host
    Generic,
}

impl fmt::Display for BackendKind
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            Self::Lldb => f.write_str("lldb"),
            Self::Generic => f.write_str("generic"),
        }
    }
}

/// Text conventions and command templates of the backend REPL
///
/// Templates use `{dump}`, `{exe}`, `{path}`, `{name}` and `{address}`
/// placeholders. Paths are substituted verbatim inside the quotes the
/// template provides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendProfile
{
    pub kind: BackendKind,
    /// Prompt marker printed before the backend accepts input, e.g. `(lldb)`
    pub prompt: String,
    /// Fragment of the error the backend prints for an unknown command.
    /// Seeing it next to the sentinel token marks a command as complete.
    pub unknown_command_marker: String,
    /// Prefix of error lines, e.g. `error:`
    pub error_marker: String,
    /// The backend echoes every input line to stdout after its prompt. When
    /// set, a command completes only once the stdout echo of its sentinel
    /// has arrived as well as the unknown-command reply.
    pub echoes_input: bool,
    /// Raw-output fragments that mean the backend (or its host OS) faulted
    pub fault_signatures: Vec<String>,
    /// Commands run once after every (re)start
    pub startup_commands: Vec<String>,
    pub open_core_template: String,
    pub open_core_with_executable_template: String,
    pub close_dump_command: String,
    pub plugin_load_template: String,
    /// File name of the runtime-inspection extension binary
    pub extension_file_name: String,
    /// Harmless extension command used to check its command table registered
    pub extension_probe_command: String,
    pub symbol_search_template: String,
    /// Points the extension at the managed runtime directory, when supported
    pub runtime_path_template: Option<String>,
    pub module_add_template: String,
    pub module_load_template: String,
    pub module_list_command: String,
    pub register_command: String,
    pub quit_command: String,
}

impl BackendProfile
{
    /// Profile for LLDB with the managed-runtime plugin.
    #[must_use]
    pub fn lldb() -> Self
    {
        Self {
            kind: BackendKind::Lldb,
            prompt: "(lldb)".to_string(),
            unknown_command_marker: "is not a valid command".to_string(),
            error_marker: "error:".to_string(),
            echoes_input: true,
            fault_signatures: vec![
                "LLDB has crashed".to_string(),
                "PLEASE submit a bug report".to_string(),
                "Stack dump:".to_string(),
                "Segmentation fault".to_string(),
                "Aborted (core dumped)".to_string(),
                "Illegal instruction".to_string(),
                "terminate called after throwing".to_string(),
            ],
            startup_commands: vec![
                "settings set auto-confirm true".to_string(),
                "settings set use-color false".to_string(),
                "settings set stop-disassembly-display never".to_string(),
            ],
            open_core_template: "target create --core \"{dump}\"".to_string(),
            open_core_with_executable_template: "target create \"{exe}\" --core \"{dump}\"".to_string(),
            close_dump_command: "target delete --all".to_string(),
            plugin_load_template: "plugin load \"{path}\"".to_string(),
            extension_file_name: "libsosplugin.so".to_string(),
            extension_probe_command: "soshelp".to_string(),
            symbol_search_template: "settings append target.debug-file-search-paths \"{path}\"".to_string(),
            runtime_path_template: Some("setclrpath \"{path}\"".to_string()),
            module_add_template: "target modules add \"{path}\"".to_string(),
            module_load_template: "target modules load --file \"{name}\" --slide {address}".to_string(),
            module_list_command: "image list".to_string(),
            register_command: "register read".to_string(),
            quit_command: "quit".to_string(),
        }
    }

    #[must_use]
    pub fn open_dump_command(&self, dump: &Path, executable: Option<&Path>) -> String
    {
        let dump = dump.display().to_string();
        match executable {
            Some(exe) => self
                .open_core_with_executable_template
                .replace("{exe}", &exe.display().to_string())
                .replace("{dump}", &dump),
            None => self.open_core_template.replace("{dump}", &dump),
        }
    }

    #[must_use]
    pub fn plugin_load_command(&self, path: &Path) -> String
    {
        fill_path(&self.plugin_load_template, path)
    }

    #[must_use]
    pub fn symbol_search_command(&self, path: &Path) -> String
    {
        fill_path(&self.symbol_search_template, path)
    }

    #[must_use]
    pub fn runtime_path_command(&self, path: &Path) -> Option<String>
    {
        self.runtime_path_template.as_deref().map(|template| fill_path(template, path))
    }

    #[must_use]
    pub fn module_add_command(&self, path: &Path) -> String
    {
        fill_path(&self.module_add_template, path)
    }

    #[must_use]
    pub fn module_load_command(&self, name: &str, base: Address) -> String
    {
        self.module_load_template
            .replace("{name}", name)
            .replace("{address}", &format!("{base:#x}"))
    }

    /// First line of `output` that carries the error marker, if any.
    #[must_use]
    pub fn find_error<'a>(&self, output: &'a str) -> Option<&'a str>
    {
        output
            .lines()
            .map(str::trim)
            .find(|line| line.contains(self.error_marker.as_str()))
    }
}

impl Default for BackendProfile
{
    fn default() -> Self
    {
        Self::lldb()
    }
}

fn fill_path(template: &str, path: &Path) -> String
{
    template.replace("{path}", &path.display().to_string())
}

/// Driver construction parameters
///
/// ## Example
///
/// ```rust
/// use std::time::Duration;
///
/// use crashlens_core::config::DriverConfig;
///
/// let config = DriverConfig::default()
///     .with_symbol_cache_root("/var/cache/crashlens")
///     .with_symbol_download_tool("/usr/local/bin/dotnet-symbol")
///     .with_command_timeout(Duration::from_secs(30));
/// assert_eq!(
///     config.symbol_cache_dir_for("/dumps/core.42.dmp".as_ref()),
///     std::path::PathBuf::from("/var/cache/crashlens/core.42")
/// );
/// ```
#[derive(Debug, Clone)]
pub struct DriverConfig
{
    /// Interactive debugger executable
    pub debugger_path: PathBuf,
    pub debugger_args: Vec<String>,
    pub profile: BackendProfile,
    /// Non-interactive tool that prints a dump's module list and exits
    pub verify_tool: Option<PathBuf>,
    /// Arguments placed before the dump path
    pub verify_args: Vec<String>,
    /// Non-interactive symbol downloader, invoked with `-o <dir> <dump>`
    pub symbol_download_tool: Option<PathBuf>,
    /// Arguments placed before `-o <dir> <dump>`
    pub symbol_download_args: Vec<String>,
    /// Explicit inspection extension binary; used when the file exists
    pub extension_path: Option<PathBuf>,
    /// Root of the per-dump symbol cache directories
    pub symbol_cache_root: PathBuf,
    /// Directory holding one sub-directory per installed runtime version
    pub runtime_root: PathBuf,
    /// Stamped into newly created metadata records
    pub user_id: String,
    /// Load the inspection extension automatically for managed dumps
    pub auto_load_extension: bool,
    pub command_timeout: Duration,
    pub verify_timeout: Duration,
    pub symbol_download_timeout: Duration,
}

impl Default for DriverConfig
{
    fn default() -> Self
    {
        Self {
            debugger_path: PathBuf::from("lldb"),
            debugger_args: vec!["--no-lldbinit".to_string(), "--no-use-colors".to_string()],
            profile: BackendProfile::lldb(),
            verify_tool: None,
            verify_args: Vec::new(),
            symbol_download_tool: None,
            symbol_download_args: vec!["--symbols".to_string(), "--modules".to_string()],
            extension_path: None,
            symbol_cache_root: std::env::temp_dir().join("crashlens-symbols"),
            runtime_root: PathBuf::from("/usr/share/dotnet/shared/Microsoft.NETCore.App"),
            user_id: "anonymous".to_string(),
            auto_load_extension: true,
            command_timeout: Duration::from_secs(120),
            verify_timeout: Duration::from_secs(60),
            symbol_download_timeout: Duration::from_secs(600),
        }
    }
}

impl DriverConfig
{
    /// Per-dump symbol cache directory: `<symbol_cache_root>/<dump file stem>`.
    #[must_use]
    pub fn symbol_cache_dir_for(&self, dump_path: &Path) -> PathBuf
    {
        let stem = dump_path
            .file_stem()
            .map_or_else(|| "dump".to_string(), |stem| stem.to_string_lossy().into_owned());
        self.symbol_cache_root.join(stem)
    }

    #[must_use]
    pub fn with_debugger(mut self, path: impl Into<PathBuf>, args: Vec<String>) -> Self
    {
        self.debugger_path = path.into();
        self.debugger_args = args;
        self
    }

    #[must_use]
    pub fn with_profile(mut self, profile: BackendProfile) -> Self
    {
        self.profile = profile;
        self
    }

    #[must_use]
    pub fn with_verify_tool(mut self, path: impl Into<PathBuf>) -> Self
    {
        self.verify_tool = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_symbol_download_tool(mut self, path: impl Into<PathBuf>) -> Self
    {
        self.symbol_download_tool = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_extension_path(mut self, path: impl Into<PathBuf>) -> Self
    {
        self.extension_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_symbol_cache_root(mut self, path: impl Into<PathBuf>) -> Self
    {
        self.symbol_cache_root = path.into();
        self
    }

    #[must_use]
    pub fn with_runtime_root(mut self, path: impl Into<PathBuf>) -> Self
    {
        self.runtime_root = path.into();
        self
    }

    #[must_use]
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self
    {
        self.user_id = user_id.into();
        self
    }

    #[must_use]
    pub fn with_auto_load_extension(mut self, enabled: bool) -> Self
    {
        self.auto_load_extension = enabled;
        self
    }

    #[must_use]
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self
    {
        self.command_timeout = timeout;
        self
    }
}
