// src/platform/mod.rs

//! Interfaces to the console platform
//!
//! The resolver never talks to platform services directly. It goes through
//! three narrow traits:
//! - [`TitleDirectory`]: installed-title snapshot, package inspection,
//!   install/delete and the base-firmware commit
//! - [`SystemInfo`]: hardware device class and configured region
//! - [`HostControl`]: privileged access and restarting the host environment
//!
//! [`SimulatedConsole`] implements all three over a JSON state file so the
//! updater can run (and be tested) on a development machine.

mod simulated;

pub use simulated::{
    AccessMode, ConsoleState, FailurePoint, Operation, PACKAGE_HEADER_LEN, PACKAGE_MAGIC,
    SimulatedConsole, package_bytes,
};

use crate::error::Result;
use crate::filesystem::ReadSeek;
use crate::progress::ProgressTracker;
use crate::title::{DeviceClass, Region, TitleId, TitleVersion};
use serde::{Deserialize, Serialize};
use strum_macros::Display;

/// One entry of the installed-title snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledTitle {
    pub title_id: TitleId,
    pub version: TitleVersion,
}

/// Identity read from a package header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackageInfo {
    pub title_id: TitleId,
    pub version: TitleVersion,
}

/// Installed titles and the package-manager primitives
pub trait TitleDirectory {
    /// Snapshot of every installed title
    fn installed_titles(&self) -> Result<Vec<InstalledTitle>>;

    /// Read a package's identity without installing it
    fn inspect_package(&self, package: &mut dyn ReadSeek) -> Result<PackageInfo>;

    /// Install a package from its stream
    fn install_package(
        &mut self,
        package: &mut dyn ReadSeek,
        size: u64,
        progress: &dyn ProgressTracker,
    ) -> Result<()>;

    fn delete_title(&mut self, title: TitleId) -> Result<()>;

    /// Make an installed base firmware the one the device boots
    fn commit_firmware(&mut self, title: TitleId) -> Result<()>;
}

/// Device facts the validation pass checks against
pub trait SystemInfo {
    fn device_class(&self) -> Result<DeviceClass>;

    fn region(&self) -> Result<Region>;
}

/// How privileged package-manager access was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum AccessGrant {
    /// The service handle was granted as-is
    #[strum(serialize = "direct")]
    Direct,
    /// Access required a privilege escalation first
    #[strum(serialize = "escalated")]
    Escalated,
}

/// Host environment lifecycle
pub trait HostControl {
    /// Obtain privileged package-manager access; fails with `AccessDenied`
    fn acquire_access(&mut self) -> Result<AccessGrant>;

    /// Restart the host environment
    fn restart(&mut self) -> Result<()>;
}

/// Everything a session needs from the platform
pub trait Platform: TitleDirectory + SystemInfo + HostControl {}

impl<T: TitleDirectory + SystemInfo + HostControl> Platform for T {}
