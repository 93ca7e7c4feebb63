// src/config.rs

//! Updater configuration
//!
//! All settings have defaults matching the console layout, so a missing
//! configuration file is not an error for the CLI. Paths that name files on
//! the removable medium (`updates_dir`, `log_file`) are storage paths;
//! `storage_root` is a host path, and relative `catalog` and `platform_state`
//! paths are taken from under it.

use crate::error::{Error, Result};
use crate::filesystem::{NameFilter, path};
use crate::hash::DEFAULT_BLOCK_SIZE;
use crate::resolver::ResolverOptions;
use crate::title::{LEGACY_FIRMWARE_FLOOR, TitleVersion};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdaterConfig {
    /// Mount point of the removable medium
    pub storage_root: PathBuf,

    /// Directory holding the update packages
    pub updates_dir: String,

    /// Package file extension
    pub package_extension: String,

    /// Status log, relative to the storage root
    pub log_file: String,

    /// Catalog of known-good firmware sets
    pub catalog: PathBuf,

    /// Simulated console state file
    pub platform_state: PathBuf,

    /// Delay before restarting after success
    pub reboot_delay_secs: u64,

    /// Read size for hash verification
    pub hash_block_size: usize,

    pub legacy_firmware_floor: TitleVersion,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            storage_root: PathBuf::from("."),
            updates_dir: "/updates".to_string(),
            package_extension: ".cia".to_string(),
            log_file: "/sysUpdater.log".to_string(),
            catalog: PathBuf::from("catalog.toml"),
            platform_state: PathBuf::from("console.json"),
            reboot_delay_secs: 10,
            hash_block_size: DEFAULT_BLOCK_SIZE,
            legacy_firmware_floor: LEGACY_FIRMWARE_FLOOR,
        }
    }
}

impl UpdaterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read config file {}: {}", path.display(), e))
        })?;
        let config: UpdaterConfig = toml::from_str(&content).map_err(|e| {
            Error::Config(format!("failed to parse config file {}: {}", path.display(), e))
        })?;

        config.validate()?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load `path` if given, defaults otherwise
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.updates_dir.starts_with('/') {
            return Err(Error::Config(format!(
                "updates_dir must be an absolute storage path, got '{}'",
                self.updates_dir
            )));
        }
        if !self.package_extension.starts_with('.') || self.package_extension.contains(';') {
            return Err(Error::Config(format!(
                "package_extension must look like '.cia', got '{}'",
                self.package_extension
            )));
        }
        if self.hash_block_size == 0 {
            return Err(Error::Config("hash_block_size must be non-zero".to_string()));
        }
        Ok(())
    }

    pub fn with_storage_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.storage_root = root.into();
        self
    }

    pub fn with_catalog(mut self, catalog: impl Into<PathBuf>) -> Self {
        self.catalog = catalog.into();
        self
    }

    /// Host path of the status log on the medium
    pub fn log_path(&self) -> Result<PathBuf> {
        path::resolve(&self.storage_root, &self.log_file)
    }

    /// Host path of the catalog; relative paths live on the medium
    pub fn catalog_path(&self) -> PathBuf {
        self.storage_root.join(&self.catalog)
    }

    /// Host path of the console state; relative paths live on the medium
    pub fn console_path(&self) -> PathBuf {
        self.storage_root.join(&self.platform_state)
    }

    pub fn reboot_delay(&self) -> Duration {
        Duration::from_secs(self.reboot_delay_secs)
    }

    pub fn resolver_options(&self) -> ResolverOptions {
        ResolverOptions {
            updates_dir: self.updates_dir.clone(),
            filter: NameFilter::extension(&self.package_extension),
            legacy_firmware_floor: self.legacy_firmware_floor,
        }
    }
}
