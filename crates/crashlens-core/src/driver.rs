//! # Dump Driver
//!
//! The upward-facing API: start a backend, open a dump, run commands, and
//! survive the backend dying underneath.
//!
//! ## Opening a dump
//!
//! ```text
//! open_dump(dump, exe)
//!   ├─ load sidecar metadata            (symbols::metadata)
//!   ├─ verify invocation → platform     (RuntimeResolver, runtime::parse_verify_core_output)
//!   ├─ runtime version / managed check  (runtime)
//!   ├─ skip-or-download symbols         (SymbolCache)
//!   ├─ open core in the backend         (ProcessSupervisor)
//!   ├─ symbol search path + cached native modules
//!   ├─ create or update metadata
//!   └─ auto-load extension (managed dumps, non-fatal)
//! ```
//!
//! Everything before the backend command degrades instead of failing: no
//! verify tool means an unknown platform, no downloader means no new
//! symbols.
//!
//! ## Recovery
//!
//! A crash, exit, or timeout during [`DumpDriver::execute_command`] triggers
//! exactly one recovery (see [`crate::recovery`]) followed by one replay of
//! the failed command. If either fails the session is lost: the backend is
//! killed, the driver is left uninitialized, and `SessionLost` is returned.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::backend::{ProcessSupervisor, SubprocessSupervisor};
use crate::config::{BackendKind, DriverConfig};
use crate::error::{DriverError, DriverResult};
use crate::extension::ExtensionLoader;
use crate::modules::{build_cache_module_index, filter_native_modules, parse_loaded_module_listing};
use crate::output::{parse_registers, strip_legacy_prefix};
use crate::recovery::{recover_from_crash, CrashRecovery, OpenDumpRecord};
use crate::runtime::{
    detect_managed_dump,
    extract_runtime_version,
    parse_verify_core_output,
    LocalRuntimeResolver,
    RuntimeResolver,
};
use crate::symbols::{
    is_usable_elf,
    load_metadata,
    save_metadata,
    try_save_runtime_version,
    try_save_symbol_files,
    DiskSymbolCache,
    SymbolCache,
};
use crate::types::{Address, DumpMetadata, RegisterSet, VerifiedPlatformInfo};

/// Facts about the currently open dump
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenDumpState
{
    pub record: OpenDumpRecord,
    pub platform: VerifiedPlatformInfo,
    pub is_managed: bool,
    pub runtime_version: Option<String>,
    pub runtime_path: Option<PathBuf>,
    pub symbol_dir: PathBuf,
    pub extension_path: Option<PathBuf>,
}

/// Session state of one driver
///
/// A dump path exists exactly when a dump is open: both live in the same
/// `Option`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriverState
{
    initialized: bool,
    dump: Option<OpenDumpState>,
}

impl DriverState
{
    #[must_use]
    pub const fn is_initialized(&self) -> bool
    {
        self.initialized
    }

    #[must_use]
    pub const fn is_dump_open(&self) -> bool
    {
        self.dump.is_some()
    }

    #[must_use]
    pub const fn dump(&self) -> Option<&OpenDumpState>
    {
        self.dump.as_ref()
    }

    #[must_use]
    pub fn current_dump_path(&self) -> Option<&Path>
    {
        self.dump.as_ref().map(|dump| dump.record.dump_path.as_path())
    }

    #[must_use]
    pub fn current_executable_path(&self) -> Option<&Path>
    {
        self.dump.as_ref().and_then(|dump| dump.record.executable_path.as_deref())
    }

    #[must_use]
    pub fn is_extension_loaded(&self) -> bool
    {
        self.dump.as_ref().is_some_and(|dump| dump.extension_path.is_some())
    }

    #[must_use]
    pub fn is_managed_dump(&self) -> bool
    {
        self.dump.as_ref().is_some_and(|dump| dump.is_managed)
    }

    #[must_use]
    pub fn detected_runtime_version(&self) -> Option<&str>
    {
        self.dump.as_ref().and_then(|dump| dump.runtime_version.as_deref())
    }

    #[must_use]
    pub fn verified_platform(&self) -> Option<&VerifiedPlatformInfo>
    {
        self.dump.as_ref().map(|dump| &dump.platform)
    }
}

/// Debugger process driver for postmortem dump analysis
///
/// One driver owns one backend process and serves one dump at a time. Every
/// operation takes `&mut self`, so commands cannot overlap.
///
/// ## Example
///
/// ```rust,no_run
/// use crashlens_core::config::DriverConfig;
/// use crashlens_core::driver::DumpDriver;
///
/// # async fn demo() -> crashlens_core::error::DriverResult<()>
/// # {
/// let config = DriverConfig::default().with_verify_tool("/usr/local/bin/verify-core");
/// let mut driver = DumpDriver::new(config);
/// driver.initialize().await?;
/// driver.open_dump("/dumps/core.1234".as_ref(), None).await?;
/// let threads = driver.execute_command("thread list").await?;
/// println!("{threads}");
/// driver.dispose_async().await;
/// # Ok(())
/// # }
/// ```
pub struct DumpDriver
{
    config: DriverConfig,
    supervisor: Box<dyn ProcessSupervisor>,
    resolver: Box<dyn RuntimeResolver>,
    symbols: Box<dyn SymbolCache>,
    extension: ExtensionLoader,
    state: DriverState,
}

impl std::fmt::Debug for DumpDriver
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
    {
        f.debug_struct("DumpDriver")
            .field("backend", &self.config.profile.kind)
            .field("debugger", &self.config.debugger_path)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl DumpDriver
{
    /// Driver with the real subprocess, verify tool, and downloader from `config`.
    #[must_use]
    pub fn new(config: DriverConfig) -> Self
    {
        let supervisor = Box::new(SubprocessSupervisor::from_config(&config));
        let resolver = Box::new(LocalRuntimeResolver::from_config(&config));
        let symbols = Box::new(DiskSymbolCache::from_config(&config));
        Self::with_parts(config, supervisor, resolver, symbols)
    }

    /// Driver with substituted collaborators.
    #[must_use]
    pub fn with_parts(
        config: DriverConfig,
        supervisor: Box<dyn ProcessSupervisor>,
        resolver: Box<dyn RuntimeResolver>,
        symbols: Box<dyn SymbolCache>,
    ) -> Self
    {
        let extension = ExtensionLoader::new(config.profile.clone(), config.extension_path.clone());
        Self {
            config,
            supervisor,
            resolver,
            symbols,
            extension,
            state: DriverState::default(),
        }
    }

    #[must_use]
    pub const fn state(&self) -> &DriverState
    {
        &self.state
    }

    #[must_use]
    pub const fn config(&self) -> &DriverConfig
    {
        &self.config
    }

    #[must_use]
    pub const fn is_initialized(&self) -> bool
    {
        self.state.is_initialized()
    }

    #[must_use]
    pub const fn is_dump_open(&self) -> bool
    {
        self.state.is_dump_open()
    }

    #[must_use]
    pub fn current_dump_path(&self) -> Option<&Path>
    {
        self.state.current_dump_path()
    }

    #[must_use]
    pub fn current_executable_path(&self) -> Option<&Path>
    {
        self.state.current_executable_path()
    }

    #[must_use]
    pub const fn backend_kind(&self) -> BackendKind
    {
        self.config.profile.kind
    }

    #[must_use]
    pub fn is_extension_loaded(&self) -> bool
    {
        self.state.is_extension_loaded()
    }

    #[must_use]
    pub fn is_managed_dump(&self) -> bool
    {
        self.state.is_managed_dump()
    }

    #[must_use]
    pub fn detected_runtime_version(&self) -> Option<&str>
    {
        self.state.detected_runtime_version()
    }

    #[must_use]
    pub fn verified_platform(&self) -> Option<&VerifiedPlatformInfo>
    {
        self.state.verified_platform()
    }

    /// Start the backend and run the profile's startup commands.
    ///
    /// Calling it on an initialized driver with a live backend does nothing.
    ///
    /// ## Errors
    ///
    /// - `Io`: the debugger could not be spawned
    /// - backend failures during the handshake or startup commands
    pub async fn initialize(&mut self) -> DriverResult<()>
    {
        if self.state.initialized && self.supervisor.is_running() {
            return Ok(());
        }

        self.supervisor.start().await?;
        for command in &self.config.profile.startup_commands {
            let output = self.supervisor.execute(command).await?;
            if let Some(line) = self.config.profile.find_error(&output) {
                warn!(command = %command, error = line, "startup command rejected");
            }
        }

        self.state.initialized = true;
        info!(backend = %self.config.profile.kind, "driver initialized");
        Ok(())
    }

    /// Open `dump_path`, optionally with the executable that produced it.
    ///
    /// A dump that is already open is closed first. A backend failure while
    /// opening gets one recovery (fresh backend, no reopen) and one more
    /// attempt.
    ///
    /// ## Errors
    ///
    /// - `InvalidArgument`: empty dump or executable path
    /// - `NotInitialized`, `DumpNotFound`
    /// - `CommandFailed`: the backend rejected the dump
    /// - `SessionLost`: the backend failed again after recovery
    pub async fn open_dump(&mut self, dump_path: &Path, executable_path: Option<&Path>) -> DriverResult<()>
    {
        require_path(dump_path, "dump path")?;
        if let Some(exe) = executable_path {
            require_path(exe, "executable path")?;
        }
        self.require_initialized()?;
        if !dump_path.is_file() {
            return Err(DriverError::DumpNotFound(dump_path.to_path_buf()));
        }

        if self.state.is_dump_open() {
            self.close_dump().await?;
        }

        match self.open_dump_once(dump_path, executable_path).await {
            Err(err) if err.is_backend_failure() => {
                warn!(dump = %dump_path.display(), %err, "backend failed while opening dump");
                self.try_recover_from_crash().await?;
                if self.state.current_dump_path() == Some(dump_path) {
                    // The failure came after the dump was recorded, so recovery reopened it.
                    return Ok(());
                }
                self.open_dump_once(dump_path, executable_path)
                    .await
                    .map_err(|err| self.lose_session_on_backend_failure(err))
            }
            result => result,
        }
    }

    /// Close the open dump.
    ///
    /// Dump state is cleared even when the backend fails; a backend failure
    /// also leaves the driver uninitialized.
    ///
    /// ## Errors
    ///
    /// - `NotInitialized`, `NoDumpOpen`
    /// - backend failures from the close command
    pub async fn close_dump(&mut self) -> DriverResult<()>
    {
        self.require_initialized()?;
        let Some(dump) = self.state.dump.take() else {
            return Err(DriverError::NoDumpOpen);
        };

        match self.supervisor.execute(&self.config.profile.close_dump_command).await {
            Ok(output) => {
                if let Some(line) = self.config.profile.find_error(&output) {
                    warn!(error = line, "backend reported an error closing the dump");
                }
                info!(dump = %dump.record.dump_path.display(), "dump closed");
                Ok(())
            }
            Err(err) => {
                if err.is_backend_failure() {
                    self.supervisor.kill();
                    self.state.initialized = false;
                }
                Err(err)
            }
        }
    }

    /// Run a backend command against the open dump and return its output.
    ///
    /// A leading legacy `!` prefix is removed. On a crash, exit, or timeout
    /// the backend is recovered once and the command replayed once.
    ///
    /// ## Errors
    ///
    /// - `InvalidArgument`: empty command
    /// - `NotInitialized`, `NoDumpOpen`
    /// - `SessionLost`: recovery failed or the replay failed again
    pub async fn execute_command(&mut self, command: &str) -> DriverResult<String>
    {
        let command = strip_legacy_prefix(command).to_string();
        if command.is_empty() {
            return Err(DriverError::InvalidArgument("command is empty".to_string()));
        }
        self.require_dump_open()?;

        match self.supervisor.execute(&command).await {
            Err(err) if err.is_backend_failure() => {
                warn!(command = %command, %err, "backend failed while executing command");
                self.try_recover_from_crash().await?;
                debug!(command = %command, "replaying command after recovery");
                self.supervisor
                    .execute(&command)
                    .await
                    .map_err(|err| self.lose_session_on_backend_failure(err))
            }
            result => result,
        }
    }

    /// Load the runtime-inspection extension into the backend.
    ///
    /// After loading, the backend is pointed at the matching local runtime
    /// directory when one was resolved.
    ///
    /// ## Errors
    ///
    /// - `NotInitialized`, `NoDumpOpen`
    /// - `ExtensionNotFound`, `ExtensionLoadFailed`,
    ///   `ExtensionCommandsUnavailable`
    /// - `SessionLost`: the backend failed again after recovery
    pub async fn load_extension(&mut self) -> DriverResult<()>
    {
        self.require_dump_open()?;

        match self.load_extension_once().await {
            Err(err) if err.is_backend_failure() => {
                warn!(%err, "backend failed while loading extension");
                self.try_recover_from_crash().await?;
                if self.state.is_extension_loaded() {
                    // The reopen already auto-loaded it.
                    return Ok(());
                }
                self.load_extension_once()
                    .await
                    .map_err(|err| self.lose_session_on_backend_failure(err))
            }
            result => result,
        }
    }

    /// Add directories to the backend's debug-file search path.
    ///
    /// ## Errors
    ///
    /// - `InvalidArgument`: no paths, or an empty path
    /// - `NotInitialized`
    /// - `CommandFailed`: the backend rejected a path
    pub async fn configure_symbol_path(&mut self, paths: &[PathBuf]) -> DriverResult<()>
    {
        if paths.is_empty() {
            return Err(DriverError::InvalidArgument("no symbol paths given".to_string()));
        }
        for path in paths {
            require_path(path, "symbol path")?;
        }
        self.require_initialized()?;

        for path in paths {
            let command = self.config.profile.symbol_search_command(path);
            self.run_checked(&command).await?;
        }
        debug!(count = paths.len(), "symbol search paths configured");
        Ok(())
    }

    /// Read and normalize the current thread's registers.
    ///
    /// ## Errors
    ///
    /// Same as [`DumpDriver::execute_command`].
    pub async fn read_registers(&mut self) -> DriverResult<RegisterSet>
    {
        let command = self.config.profile.register_command.clone();
        let output = self.execute_command(&command).await?;
        Ok(parse_registers(&output))
    }

    /// Modules the backend has loaded, by basename. Never contains a zero base.
    ///
    /// ## Errors
    ///
    /// Same as [`DumpDriver::execute_command`].
    pub async fn loaded_modules(&mut self) -> DriverResult<BTreeMap<String, Address>>
    {
        let command = self.config.profile.module_list_command.clone();
        let output = self.execute_command(&command).await?;
        Ok(parse_loaded_module_listing(&output))
    }

    /// Replace a dead backend and reopen the dump that was open, once.
    ///
    /// ## Errors
    ///
    /// - `SessionLost`: recovery failed; the driver is left uninitialized
    pub async fn try_recover_from_crash(&mut self) -> DriverResult<()>
    {
        let previous = self.state.dump.as_ref().map(|dump| dump.record.clone());
        if let Err(err) = recover_from_crash(&mut *self, previous).await {
            error!(%err, "debugger session lost");
            self.discard();
            return Err(err);
        }
        Ok(())
    }

    /// Kill the backend and drop all session state immediately.
    pub fn dispose(&mut self)
    {
        self.discard();
        info!("driver disposed");
    }

    /// Close the dump and ask the backend to quit, then drop all session state.
    ///
    /// Errors along the way are logged; disposal always completes.
    pub async fn dispose_async(&mut self)
    {
        if self.state.initialized && self.state.is_dump_open() {
            if let Err(err) = self.close_dump().await {
                debug!(%err, "close during disposal failed");
            }
        }
        if let Err(err) = self.supervisor.shutdown().await {
            debug!(%err, "backend shutdown failed; killing it");
            self.supervisor.kill();
        }
        self.state = DriverState::default();
        info!("driver disposed");
    }

    fn discard(&mut self)
    {
        self.supervisor.kill();
        self.state = DriverState::default();
    }

    fn lose_session_on_backend_failure(&mut self, err: DriverError) -> DriverError
    {
        if !err.is_backend_failure() {
            return err;
        }
        error!(%err, "backend failed again after recovery; session lost");
        self.discard();
        DriverError::SessionLost(format!("backend failed again after recovery: {err}"))
    }

    fn require_initialized(&self) -> DriverResult<()>
    {
        if self.state.initialized {
            Ok(())
        } else {
            Err(DriverError::NotInitialized)
        }
    }

    fn require_dump_open(&self) -> DriverResult<()>
    {
        self.require_initialized()?;
        if self.state.is_dump_open() {
            Ok(())
        } else {
            Err(DriverError::NoDumpOpen)
        }
    }

    /// Run an internal command; an error line in its output is `CommandFailed`.
    async fn run_checked(&mut self, command: &str) -> DriverResult<String>
    {
        let output = self.supervisor.execute(command).await?;
        match self.config.profile.find_error(&output) {
            Some(line) => Err(DriverError::CommandFailed {
                command: command.to_string(),
                message: line.to_string(),
            }),
            None => Ok(output),
        }
    }

    async fn open_dump_once(&mut self, dump_path: &Path, executable_path: Option<&Path>) -> DriverResult<()>
    {
        info!(dump = %dump_path.display(), exe = ?executable_path, "opening dump");
        let metadata = load_metadata(dump_path);

        let platform = match self.resolver.verify_dump(dump_path).await {
            Ok(lines) => parse_verify_core_output(&lines),
            Err(err) => {
                warn!(dump = %dump_path.display(), %err, "verify invocation failed; platform unknown");
                VerifiedPlatformInfo::unknown()
            }
        };

        let runtime_version = metadata
            .as_ref()
            .and_then(|metadata| metadata.runtime_version.clone())
            .or_else(|| platform.module_paths.iter().find_map(|path| extract_runtime_version(path)));
        let is_managed = detect_managed_dump(&platform.module_list_text(), runtime_version.as_deref());
        let runtime_path = if is_managed {
            self.resolver.find_matching_runtime_path(runtime_version.as_deref())
        } else {
            None
        };
        debug!(
            architecture = %platform.architecture,
            musl = platform.is_musl_libc,
            managed = is_managed,
            version = ?runtime_version,
            runtime = ?runtime_path,
            "dump platform resolved"
        );

        let symbol_dir = self.config.symbol_cache_dir_for(dump_path);
        let symbol_files = fetch_symbols(self.symbols.as_ref(), dump_path, &symbol_dir, metadata.as_ref()).await;

        let open_command = self.config.profile.open_dump_command(dump_path, executable_path);
        self.run_checked(&open_command).await?;

        if symbol_dir.is_dir() {
            let command = self.config.profile.symbol_search_command(&symbol_dir);
            if let Err(err) = self.run_checked(&command).await {
                if err.is_backend_failure() {
                    return Err(err);
                }
                warn!(%err, "could not add symbol cache to search path");
            }
            self.register_cached_modules(&platform, &symbol_dir).await?;
        }

        self.state.dump = Some(OpenDumpState {
            record: OpenDumpRecord::new(dump_path, executable_path.map(Path::to_path_buf)),
            platform,
            is_managed,
            runtime_version: runtime_version.clone(),
            runtime_path,
            symbol_dir,
            extension_path: None,
        });

        persist_metadata(
            dump_path,
            metadata,
            &self.config.user_id,
            runtime_version.as_deref(),
            symbol_files,
        );

        if is_managed && self.config.auto_load_extension {
            if let Err(err) = self.load_extension_once().await {
                if err.is_backend_failure() {
                    return Err(err);
                }
                warn!(%err, "extension auto-load failed; continuing without it");
            }
        }

        info!(dump = %dump_path.display(), managed = is_managed, "dump open");
        Ok(())
    }

    /// Add native modules from the symbol cache that the backend did not load.
    async fn register_cached_modules(&mut self, platform: &VerifiedPlatformInfo, symbol_dir: &Path) -> DriverResult<()>
    {
        let wanted = filter_native_modules(&platform.modules);
        if wanted.is_empty() {
            return Ok(());
        }

        let listing = self.supervisor.execute(&self.config.profile.module_list_command).await?;
        let loaded = parse_loaded_module_listing(&listing);
        let index = build_cache_module_index(symbol_dir);

        let mut added = 0usize;
        for (name, base) in wanted {
            if loaded.contains_key(&name) {
                continue;
            }
            let Some(path) = index.get(&name) else {
                continue;
            };
            if !is_usable_elf(path) {
                debug!(module = %name, path = %path.display(), "cached module is not a usable ELF file");
                continue;
            }

            let add = self.config.profile.module_add_command(path);
            let load = self.config.profile.module_load_command(&name, base);
            match self.run_checked(&add).await {
                Ok(_) => {}
                Err(err) if err.is_backend_failure() => return Err(err),
                Err(err) => {
                    debug!(module = %name, %err, "backend refused cached module");
                    continue;
                }
            }
            match self.run_checked(&load).await {
                Ok(_) => added += 1,
                Err(err) if err.is_backend_failure() => return Err(err),
                Err(err) => debug!(module = %name, %err, "could not place cached module"),
            }
        }

        if added > 0 {
            info!(count = added, "registered native modules from symbol cache");
        }
        Ok(())
    }

    async fn load_extension_once(&mut self) -> DriverResult<()>
    {
        let path = self
            .extension
            .load(self.supervisor.as_mut(), &self.config.symbol_cache_root)
            .await?;

        let runtime_path = self.state.dump.as_ref().and_then(|dump| dump.runtime_path.clone());
        if let Some(dump) = self.state.dump.as_mut() {
            dump.extension_path = Some(path);
        }

        if let Some(command) = runtime_path.and_then(|dir| self.config.profile.runtime_path_command(&dir)) {
            if let Err(err) = self.run_checked(&command).await {
                if err.is_backend_failure() {
                    return Err(err);
                }
                warn!(%err, "could not point extension at the local runtime");
            }
        }
        Ok(())
    }
}

#[async_trait]
impl CrashRecovery for DumpDriver
{
    fn discard_backend(&mut self) -> DriverResult<()>
    {
        self.discard();
        Ok(())
    }

    async fn initialize(&mut self) -> DriverResult<()>
    {
        DumpDriver::initialize(self).await
    }

    async fn open_dump(&mut self, dump_path: &Path, executable_path: Option<&Path>) -> DriverResult<()>
    {
        if !dump_path.is_file() {
            return Err(DriverError::DumpNotFound(dump_path.to_path_buf()));
        }
        self.open_dump_once(dump_path, executable_path).await
    }
}

fn require_path(path: &Path, what: &str) -> DriverResult<()>
{
    if path.as_os_str().is_empty() {
        Err(DriverError::InvalidArgument(format!("{what} is empty")))
    } else {
        Ok(())
    }
}

/// Skip-or-download step. Returns the symbol-file list to record, if any.
async fn fetch_symbols(
    symbols: &dyn SymbolCache,
    dump_path: &Path,
    symbol_dir: &Path,
    metadata: Option<&DumpMetadata>,
) -> Option<Vec<String>>
{
    let cached = metadata.map(|metadata| metadata.symbol_files.as_slice()).unwrap_or_default();
    let (skip, missing) = symbols.should_skip_download(cached, symbol_dir);
    if skip {
        debug!(dir = %symbol_dir.display(), files = cached.len(), "symbol cache complete; skipping download");
        return None;
    }
    if !missing.is_empty() {
        info!(missing = missing.len(), "cached symbol files missing; downloading again");
    }

    match symbols.download(dump_path, symbol_dir).await {
        Ok(()) => Some(symbols.list_cached_files(symbol_dir)),
        Err(DriverError::ToolUnavailable(tool)) => {
            debug!(tool, "no symbol downloader configured");
            None
        }
        Err(err) => {
            warn!(%err, "symbol download failed; continuing with existing symbols");
            None
        }
    }
}

/// Create the sidecar record, or update the existing one.
fn persist_metadata(
    dump_path: &Path,
    existing: Option<DumpMetadata>,
    user_id: &str,
    runtime_version: Option<&str>,
    symbol_files: Option<Vec<String>>,
)
{
    if existing.is_some() {
        if let Some(version) = runtime_version {
            try_save_runtime_version(dump_path, version);
        }
        if let Some(files) = symbol_files {
            try_save_symbol_files(dump_path, &files);
        }
        return;
    }

    let mut metadata = match DumpMetadata::for_dump(dump_path, user_id) {
        Ok(metadata) => metadata,
        Err(err) => {
            warn!(dump = %dump_path.display(), %err, "cannot stat dump; metadata not created");
            return;
        }
    };
    metadata.runtime_version = runtime_version.map(str::to_string);
    metadata.symbol_files = symbol_files.unwrap_or_default();

    if let Err(err) = save_metadata(dump_path, &metadata) {
        warn!(dump = %dump_path.display(), %err, "failed to create dump metadata");
    }
}
