// src/platform/simulated.rs

//! Simulated console backed by a JSON state file
//!
//! Packages understood by the simulator start with a fixed header:
//!
//! | offset | size | field                     |
//! |--------|------|---------------------------|
//! | 0      | 4    | magic `TPKG`              |
//! | 4      | 8    | title id (little endian)  |
//! | 12     | 2    | version (little endian)   |
//!
//! followed by the payload. Like the real package manager, the simulator
//! refuses to install a version older than the one already installed; the
//! title must be deleted first.

use super::{AccessGrant, HostControl, InstalledTitle, PackageInfo, SystemInfo, TitleDirectory};
use crate::error::{Error, Result};
use crate::filesystem::ReadSeek;
use crate::progress::ProgressTracker;
use crate::title::{DeviceClass, Region, TitleId, TitleVersion};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const PACKAGE_MAGIC: [u8; 4] = *b"TPKG";

pub const PACKAGE_HEADER_LEN: usize = 14;

const INSTALL_BLOCK_SIZE: usize = 64 * 1024;

/// Build a package the simulator can inspect and install
pub fn package_bytes(title: TitleId, version: TitleVersion, payload: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(PACKAGE_HEADER_LEN + payload.len());
    bytes.extend_from_slice(&PACKAGE_MAGIC);
    bytes.extend_from_slice(&title.raw().to_le_bytes());
    bytes.extend_from_slice(&version.to_le_bytes());
    bytes.extend_from_slice(payload);
    bytes
}

fn read_header(package: &mut dyn ReadSeek) -> Result<PackageInfo> {
    package.seek(SeekFrom::Start(0))?;

    let mut header = [0u8; PACKAGE_HEADER_LEN];
    package
        .read_exact(&mut header)
        .map_err(|e| Error::Platform(format!("truncated package header: {}", e)))?;
    if header[..4] != PACKAGE_MAGIC {
        return Err(Error::Platform("not an installable package".to_string()));
    }

    let mut id = [0u8; 8];
    id.copy_from_slice(&header[4..12]);
    let mut version = [0u8; 2];
    version.copy_from_slice(&header[12..14]);

    Ok(PackageInfo {
        title_id: TitleId::new(u64::from_le_bytes(id)),
        version: TitleVersion::from_le_bytes(version),
    })
}

/// Outcome of the simulated privileged-access request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessMode {
    #[default]
    Direct,
    Escalated,
    Denied,
}

/// Persistent console state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleState {
    pub device: DeviceClass,
    pub region: Region,
    #[serde(default)]
    pub access: AccessMode,
    #[serde(default)]
    pub titles: BTreeMap<TitleId, TitleVersion>,
    /// Base firmware the console boots
    #[serde(default)]
    pub firmware: Option<TitleId>,
    #[serde(default)]
    pub restarts: u32,
}

impl ConsoleState {
    pub fn new(device: DeviceClass, region: Region) -> Self {
        Self {
            device,
            region,
            access: AccessMode::default(),
            titles: BTreeMap::new(),
            firmware: None,
            restarts: 0,
        }
    }

    pub fn with_title(mut self, title: TitleId, version: TitleVersion) -> Self {
        self.titles.insert(title, version);
        self
    }

    pub fn with_access(mut self, access: AccessMode) -> Self {
        self.access = access;
        self
    }
}

/// Platform call recorded by the simulator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Install {
        title: TitleId,
        version: TitleVersion,
    },
    Delete(TitleId),
    CommitFirmware(TitleId),
    Restart,
}

/// Platform call that should fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePoint {
    Install(TitleId),
    Delete(TitleId),
    CommitFirmware(TitleId),
}

/// [`TitleDirectory`], [`SystemInfo`] and [`HostControl`] over a state file
#[derive(Debug, Clone)]
pub struct SimulatedConsole {
    state: ConsoleState,
    state_path: Option<PathBuf>,
    operations: Vec<Operation>,
    failures: Vec<FailurePoint>,
}

impl SimulatedConsole {
    /// In-memory console; nothing is persisted
    pub fn new(state: ConsoleState) -> Self {
        Self {
            state,
            state_path: None,
            operations: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// Load a console from its state file; changes are written back to it
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Platform(format!(
                "failed to read console state {}: {}",
                path.display(),
                e
            ))
        })?;
        let state: ConsoleState = serde_json::from_str(&content).map_err(|e| {
            Error::Platform(format!(
                "failed to parse console state {}: {}",
                path.display(),
                e
            ))
        })?;
        debug!(
            "Loaded console state {} ({} titles)",
            path.display(),
            state.titles.len()
        );

        Ok(Self {
            state_path: Some(path.to_path_buf()),
            ..Self::new(state)
        })
    }

    /// Write `state` to `path` and open it
    pub fn create(path: &Path, state: ConsoleState) -> Result<Self> {
        let console = Self {
            state_path: Some(path.to_path_buf()),
            ..Self::new(state)
        };
        console.save()?;
        Ok(console)
    }

    pub fn state(&self) -> &ConsoleState {
        &self.state
    }

    /// Every mutating call made so far, in order
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn installed_version(&self, title: TitleId) -> Option<TitleVersion> {
        self.state.titles.get(&title).copied()
    }

    /// Make a future platform call fail
    pub fn fail_on(&mut self, point: FailurePoint) {
        self.failures.push(point);
    }

    fn check_failure(&self, point: FailurePoint) -> Result<()> {
        if self.failures.contains(&point) {
            return Err(Error::Platform(format!("injected failure at {:?}", point)));
        }
        Ok(())
    }

    fn record(&mut self, operation: Operation) -> Result<()> {
        self.operations.push(operation);
        self.save()
    }

    fn save(&self) -> Result<()> {
        let Some(path) = &self.state_path else {
            return Ok(());
        };
        let json = serde_json::to_string_pretty(&self.state)
            .map_err(|e| Error::Platform(format!("failed to serialize console state: {}", e)))?;
        std::fs::write(path, json).map_err(|e| {
            Error::Platform(format!(
                "failed to write console state {}: {}",
                path.display(),
                e
            ))
        })
    }
}

impl TitleDirectory for SimulatedConsole {
    fn installed_titles(&self) -> Result<Vec<InstalledTitle>> {
        Ok(self
            .state
            .titles
            .iter()
            .map(|(title_id, version)| InstalledTitle {
                title_id: *title_id,
                version: *version,
            })
            .collect())
    }

    fn inspect_package(&self, package: &mut dyn ReadSeek) -> Result<PackageInfo> {
        read_header(package)
    }

    fn install_package(
        &mut self,
        package: &mut dyn ReadSeek,
        size: u64,
        progress: &dyn ProgressTracker,
    ) -> Result<()> {
        let info = read_header(package)?;
        self.check_failure(FailurePoint::Install(info.title_id))?;

        if let Some(installed) = self.installed_version(info.title_id)
            && installed > info.version
        {
            return Err(Error::Platform(format!(
                "cannot install v{} of {} over v{}; delete the title first",
                info.version, info.title_id, installed
            )));
        }

        progress.set_length(size);
        progress.set_position(PACKAGE_HEADER_LEN as u64);
        let mut buffer = vec![0u8; INSTALL_BLOCK_SIZE];
        loop {
            let n = package.read(&mut buffer)?;
            if n == 0 {
                break;
            }
            progress.increment(n as u64);
        }

        debug!("Installed {} v{}", info.title_id, info.version);
        self.state.titles.insert(info.title_id, info.version);
        self.record(Operation::Install {
            title: info.title_id,
            version: info.version,
        })
    }

    fn delete_title(&mut self, title: TitleId) -> Result<()> {
        self.check_failure(FailurePoint::Delete(title))?;
        if self.state.titles.remove(&title).is_none() {
            return Err(Error::Platform(format!("title {} is not installed", title)));
        }
        debug!("Deleted {}", title);
        self.record(Operation::Delete(title))
    }

    fn commit_firmware(&mut self, title: TitleId) -> Result<()> {
        self.check_failure(FailurePoint::CommitFirmware(title))?;
        if !title.is_native_firmware() {
            return Err(Error::Platform(format!("{} is not a base firmware title", title)));
        }
        if !self.state.titles.contains_key(&title) {
            return Err(Error::Platform(format!("firmware {} is not installed", title)));
        }
        self.state.firmware = Some(title);
        self.record(Operation::CommitFirmware(title))
    }
}

impl SystemInfo for SimulatedConsole {
    fn device_class(&self) -> Result<DeviceClass> {
        Ok(self.state.device)
    }

    fn region(&self) -> Result<Region> {
        Ok(self.state.region)
    }
}

impl HostControl for SimulatedConsole {
    fn acquire_access(&mut self) -> Result<AccessGrant> {
        match self.state.access {
            AccessMode::Direct => Ok(AccessGrant::Direct),
            AccessMode::Escalated => Ok(AccessGrant::Escalated),
            AccessMode::Denied => Err(Error::AccessDenied(
                "package manager service refused the handle".to_string(),
            )),
        }
    }

    fn restart(&mut self) -> Result<()> {
        info!("Restarting simulated console");
        self.state.restarts += 1;
        self.record(Operation::Restart)
    }
}
