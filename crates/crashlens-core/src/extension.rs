//! # Extension Loader
//!
//! Loads the runtime-inspection extension into the backend and checks that
//! its commands actually registered.
//!
//! Loading is a two-step check because the backend can accept a plugin
//! binary and still fail to register its command table (wrong runtime
//! version, missing dependencies). Those cases are reported as
//! [`DriverError::ExtensionCommandsUnavailable`], distinct from a failed load.

use std::path::{Path, PathBuf};

use crashlens_utils::fs::newest_file_named;
use tracing::{debug, info, warn};

use crate::backend::ProcessSupervisor;
use crate::config::BackendProfile;
use crate::error::{DriverError, DriverResult};

/// Locates and loads the inspection extension
#[derive(Debug, Clone)]
pub struct ExtensionLoader
{
    profile: BackendProfile,
    override_path: Option<PathBuf>,
}

impl ExtensionLoader
{
    #[must_use]
    pub fn new(profile: BackendProfile, override_path: Option<PathBuf>) -> Self
    {
        Self { profile, override_path }
    }

    /// Path of the extension binary to load.
    ///
    /// Priority:
    /// 1. the override path, when that file exists
    /// 2. the most recently modified file with the extension's file name
    ///    anywhere under `search_root`
    ///
    /// ## Errors
    ///
    /// - `ExtensionNotFound`: neither source produced a file
    pub fn resolve_path(&self, search_root: &Path) -> DriverResult<PathBuf>
    {
        if let Some(path) = &self.override_path {
            if path.is_file() {
                return Ok(path.clone());
            }
            warn!(path = %path.display(), "extension override does not exist; searching symbol cache");
        }

        newest_file_named(search_root, &self.profile.extension_file_name).ok_or_else(|| {
            DriverError::ExtensionNotFound(format!(
                "no {} under {}",
                self.profile.extension_file_name,
                search_root.display()
            ))
        })
    }

    /// Load the extension and probe one of its commands.
    ///
    /// Returns the path that was loaded.
    ///
    /// ## Errors
    ///
    /// - `ExtensionNotFound`: see [`ExtensionLoader::resolve_path`]
    /// - `ExtensionLoadFailed`: the load command printed an error line
    /// - `ExtensionCommandsUnavailable`: the probe command is unknown to the
    ///   backend after loading
    /// - backend failures from the supervisor, unchanged
    pub async fn load(&self, supervisor: &mut dyn ProcessSupervisor, search_root: &Path) -> DriverResult<PathBuf>
    {
        let path = self.resolve_path(search_root)?;
        let command = self.profile.plugin_load_command(&path);

        debug!(path = %path.display(), "loading inspection extension");
        let output = supervisor.execute(&command).await?;
        if let Some(line) = self.profile.find_error(&output) {
            return Err(DriverError::ExtensionLoadFailed(format!("{}: {line}", path.display())));
        }

        let probe = supervisor.execute(&self.profile.extension_probe_command).await?;
        if probe.contains(&self.profile.unknown_command_marker) {
            return Err(DriverError::ExtensionCommandsUnavailable(format!(
                "'{}' is not registered after loading {}",
                self.profile.extension_probe_command,
                path.display()
            )));
        }

        info!(path = %path.display(), "inspection extension loaded");
        Ok(path)
    }
}
