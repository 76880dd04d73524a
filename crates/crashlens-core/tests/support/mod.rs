//! Scripted fakes for the driver's seams.
//!
//! Each fake records what it was asked to do in shared state, so a test can
//! keep a handle after the fake has been boxed into a `DumpDriver`.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use crashlens_core::backend::ProcessSupervisor;
use crashlens_core::config::DriverConfig;
use crashlens_core::driver::DumpDriver;
use crashlens_core::error::{DriverError, DriverResult};
use crashlens_core::runtime::RuntimeResolver;
use crashlens_core::symbols::SymbolCache;
use tempfile::TempDir;

/// How a scripted command fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure
{
    Crash,
    Exit,
    Timeout,
}

impl Failure
{
    fn into_error(self) -> DriverError
    {
        match self {
            Self::Crash => DriverError::BackendCrashed {
                signature: "LLDB has crashed".to_string(),
            },
            Self::Exit => DriverError::BackendExited,
            Self::Timeout => DriverError::Timeout(Duration::from_secs(1)),
        }
    }
}

/// Shared script and call log of a [`FakeSupervisor`]
#[derive(Debug, Default)]
pub struct BackendScript
{
    /// `(command prefix, output)`; first matching prefix wins, default is empty output
    pub responses: Vec<(String, String)>,
    /// `(command prefix, failure)`; each entry fails one matching command
    pub failures: VecDeque<(String, Failure)>,
    /// Number of upcoming `start` calls that fail
    pub failing_starts: usize,
    pub executed: Vec<String>,
    pub starts: usize,
    pub kills: usize,
    pub shutdowns: usize,
}

impl BackendScript
{
    pub fn count(&self, prefix: &str) -> usize
    {
        self.executed.iter().filter(|command| command.starts_with(prefix)).count()
    }
}

#[derive(Debug, Clone, Default)]
pub struct BackendHandle(Arc<Mutex<BackendScript>>);

impl BackendHandle
{
    pub fn lock(&self) -> MutexGuard<'_, BackendScript>
    {
        self.0.lock().unwrap()
    }

    pub fn respond(&self, prefix: &str, output: &str)
    {
        self.lock().responses.push((prefix.to_string(), output.to_string()));
    }

    pub fn fail(&self, prefix: &str, failure: Failure)
    {
        self.lock().failures.push_back((prefix.to_string(), failure));
    }
}

/// In-memory [`ProcessSupervisor`] driven by a [`BackendScript`]
#[derive(Debug)]
pub struct FakeSupervisor
{
    script: BackendHandle,
    running: bool,
}

impl FakeSupervisor
{
    pub fn new() -> (Self, BackendHandle)
    {
        let handle = BackendHandle::default();
        (
            Self {
                script: handle.clone(),
                running: false,
            },
            handle,
        )
    }
}

#[async_trait]
impl ProcessSupervisor for FakeSupervisor
{
    async fn start(&mut self) -> DriverResult<()>
    {
        let mut script = self.script.lock();
        script.starts += 1;
        if script.failing_starts > 0 {
            script.failing_starts -= 1;
            return Err(DriverError::BackendExited);
        }
        self.running = true;
        Ok(())
    }

    async fn execute(&mut self, command: &str) -> DriverResult<String>
    {
        if !self.running {
            return Err(DriverError::NotInitialized);
        }
        let mut script = self.script.lock();
        script.executed.push(command.to_string());

        if let Some(index) = script.failures.iter().position(|(prefix, _)| command.starts_with(prefix.as_str())) {
            let (_, failure) = script.failures.remove(index).unwrap();
            self.running = false;
            return Err(failure.into_error());
        }

        Ok(script
            .responses
            .iter()
            .find(|(prefix, _)| command.starts_with(prefix.as_str()))
            .map(|(_, output)| output.clone())
            .unwrap_or_default())
    }

    fn is_running(&mut self) -> bool
    {
        self.running
    }

    fn kill(&mut self)
    {
        self.script.lock().kills += 1;
        self.running = false;
    }

    async fn shutdown(&mut self) -> DriverResult<()>
    {
        self.script.lock().shutdowns += 1;
        self.running = false;
        Ok(())
    }
}

/// [`RuntimeResolver`] returning canned verify output
#[derive(Debug, Clone, Default)]
pub struct FakeResolver
{
    /// `None` behaves like a missing verify tool
    pub verify_lines: Option<Vec<String>>,
    pub runtime_path: Option<PathBuf>,
    pub verify_calls: Arc<Mutex<usize>>,
}

#[async_trait]
impl RuntimeResolver for FakeResolver
{
    async fn verify_dump(&self, _dump_path: &Path) -> DriverResult<Vec<String>>
    {
        *self.verify_calls.lock().unwrap() += 1;
        self.verify_lines.clone().ok_or(DriverError::ToolUnavailable("verify"))
    }

    fn find_matching_runtime_path(&self, _version: Option<&str>) -> Option<PathBuf>
    {
        self.runtime_path.clone()
    }
}

/// [`SymbolCache`] that "downloads" by creating empty files
#[derive(Debug, Clone, Default)]
pub struct FakeSymbolCache
{
    pub files: Vec<String>,
    pub fail: bool,
    pub downloads: Arc<Mutex<Vec<PathBuf>>>,
}

#[async_trait]
impl SymbolCache for FakeSymbolCache
{
    async fn download(&self, _dump_path: &Path, output_dir: &Path) -> DriverResult<()>
    {
        self.downloads.lock().unwrap().push(output_dir.to_path_buf());
        if self.fail {
            return Err(DriverError::ToolFailed {
                tool: "symbol download",
                reason: "exit status: 1".to_string(),
            });
        }
        for file in &self.files {
            let path = output_dir.join(file);
            std::fs::create_dir_all(path.parent().unwrap())?;
            std::fs::write(path, b"symbols")?;
        }
        Ok(())
    }
}

/// Verify output of a managed x64 glibc dump using runtime 8.0.11.
pub fn managed_verify_lines(dump: &Path) -> Vec<String>
{
    vec![
        dump.display().to_string(),
        "400000 /usr/bin/app".to_string(),
        "7f0000000000 /lib64/ld-linux-x86-64.so.2".to_string(),
        "7f1000000000 /usr/share/dotnet/shared/Microsoft.NETCore.App/8.0.11/libcoreclr.so".to_string(),
        "7f2000000000 /usr/share/dotnet/shared/Microsoft.NETCore.App/8.0.11/System.Private.CoreLib.dll".to_string(),
    ]
}

/// Verify output of a native-only dump.
pub fn native_verify_lines(dump: &Path) -> Vec<String>
{
    vec![
        dump.display().to_string(),
        "400000 /usr/sbin/nginx".to_string(),
        "7f0000000000 /lib/ld-musl-aarch64.so.1".to_string(),
    ]
}

/// Scratch area with a dump file, a symbol cache root, and an extension binary.
pub struct Workspace
{
    pub dir: TempDir,
    pub dump: PathBuf,
    pub cache_root: PathBuf,
    pub extension: PathBuf,
}

impl Workspace
{
    pub fn new() -> Self
    {
        let dir = TempDir::new().unwrap();
        let dump = dir.path().join("core.1234.dmp");
        std::fs::write(&dump, vec![0u8; 4096]).unwrap();
        let cache_root = dir.path().join("symbols");
        let extension = dir.path().join("plugins").join("libsosplugin.so");
        std::fs::create_dir_all(extension.parent().unwrap()).unwrap();
        std::fs::write(&extension, b"plugin").unwrap();

        Self {
            dir,
            dump,
            cache_root,
            extension,
        }
    }

    pub fn config(&self) -> DriverConfig
    {
        DriverConfig::default()
            .with_symbol_cache_root(&self.cache_root)
            .with_extension_path(&self.extension)
            .with_user_id("analyst")
    }

    pub fn symbol_dir(&self) -> PathBuf
    {
        self.cache_root.join("core.1234")
    }
}

/// Everything a driver test needs to inspect after boxing the fakes.
pub struct Harness
{
    pub driver: DumpDriver,
    pub backend: BackendHandle,
    pub resolver: FakeResolver,
    pub symbols: FakeSymbolCache,
}

pub fn harness(config: DriverConfig, resolver: FakeResolver, symbols: FakeSymbolCache) -> Harness
{
    let (supervisor, backend) = FakeSupervisor::new();
    let driver = DumpDriver::with_parts(
        config,
        Box::new(supervisor),
        Box::new(resolver.clone()),
        Box::new(symbols.clone()),
    );
    Harness {
        driver,
        backend,
        resolver,
        symbols,
    }
}

/// A 64-byte little-endian ELF64 shared-object header with one program header.
pub fn elf_header() -> [u8; 64]
{
    let mut header = [0u8; 64];
    header[..4].copy_from_slice(b"\x7fELF");
    header[4] = 2;
    header[5] = 1;
    header[16] = 3;
    header[56] = 1;
    header
}
