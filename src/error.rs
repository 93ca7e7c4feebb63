// src/error.rs

//! Error types for the updater
//!
//! Every fatal condition of a resolution or execution pass surfaces as one
//! [`Error`] variant. Callers match on [`Error::kind`] rather than on message
//! text; the message and [`Error::remediation`] are what the operator sees.

use crate::filesystem::StorageOp;
use crate::hash::Digest;
use crate::title::{Region, TitleId, TitleVersion};
use std::io;
use strum_macros::{AsRefStr, Display};
use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Hardware/firmware combinations that are refused outright
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsafeReason {
    /// Newer-class firmware package offered to a legacy-class unit
    NewFirmwareOnLegacyDevice,
    /// Legacy firmware above the boot floor offered to a newer-class unit
    LegacyFirmwareAboveFloor {
        version: TitleVersion,
        floor: TitleVersion,
    },
}

impl std::fmt::Display for UnsafeReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NewFirmwareOnLegacyDevice => {
                write!(f, "installing the new-device firmware pack on a legacy device will always brick")
            }
            Self::LegacyFirmwareAboveFloor { version, floor } => write!(
                f,
                "installing legacy firmware v{} (above v{}) on a new device will always brick",
                version, floor
            ),
        }
    }
}

/// Diagnostic code for an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
pub enum ErrorKind {
    StorageAccessError,
    PackageReadError,
    UnsafeCombination,
    DangerousCombination,
    UnknownFirmware,
    RegionMismatch,
    TooManyTitles,
    TooFewTitles,
    HashMismatch,
    DeleteFailed,
    InstallFailed,
    FirmwareCommitFailed,
    AccessDenied,
    ConfigError,
    CatalogError,
    PlatformError,
    InvalidPath,
}

#[derive(Error, Debug)]
pub enum Error {
    /// Storage accessor operation failed
    #[error("Failed to {op} '{path}': {source}")]
    Storage {
        op: StorageOp,
        path: String,
        #[source]
        source: io::Error,
    },

    /// Candidate package header could not be read
    #[error("Failed to get package info for '{name}': {reason}")]
    PackageRead { name: String, reason: String },

    /// Refused hardware/firmware combination
    #[error("Unsafe combination: {0}")]
    UnsafeCombination(UnsafeReason),

    /// Dangerous combination the operator declined to proceed with
    #[error("Canceled: {0}")]
    DangerousCombination(String),

    #[error("Did not find known firmware files: {detail}")]
    UnknownFirmware { detail: String },

    #[error("Firmware files are not for this device region (home menu {home_menu}, device region {region})")]
    RegionMismatch { home_menu: TitleId, region: Region },

    #[error("Too many titles found in the update directory ({found} found, {expected} expected)")]
    TooManyTitles { found: usize, expected: usize },

    #[error("Too few titles found in the update directory ({found} found, {expected} expected)")]
    TooFewTitles { found: usize, expected: usize },

    /// Digest differs from the catalog, or the title is not in the selected set
    #[error("Hash mismatch for {title} ('{file}'): {}", describe_mismatch(.expected, .actual))]
    HashMismatch {
        title: TitleId,
        file: String,
        expected: Option<Digest>,
        actual: Digest,
    },

    #[error("Failed to delete title {title}: {reason}")]
    DeleteFailed { title: TitleId, reason: String },

    #[error("Failed to install title {title}: {reason}")]
    InstallFailed { title: TitleId, reason: String },

    #[error("Failed to install NATIVE_FIRM {title}: {reason}")]
    FirmwareCommitFailed { title: TitleId, reason: String },

    /// Privileged package-manager access unavailable
    #[error("Did not get package manager access: {0}")]
    AccessDenied(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Platform error: {0}")]
    Platform(String),

    #[error("Path traversal rejected: {0}")]
    PathTraversal(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

fn describe_mismatch(expected: &Option<Digest>, actual: &Digest) -> String {
    match expected {
        Some(expected) => format!(
            "file is corrupt or incorrect (expected {}, got {})",
            expected, actual
        ),
        None => format!("title is not part of the selected update set (got {})", actual),
    }
}

impl Error {
    /// Wrap an I/O error with the storage operation and path it came from
    pub fn storage(op: StorageOp, path: impl Into<String>, source: io::Error) -> Self {
        Self::Storage {
            op,
            path: path.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Storage { .. } | Self::Io(_) => ErrorKind::StorageAccessError,
            Self::PackageRead { .. } => ErrorKind::PackageReadError,
            Self::UnsafeCombination(_) => ErrorKind::UnsafeCombination,
            Self::DangerousCombination(_) => ErrorKind::DangerousCombination,
            Self::UnknownFirmware { .. } => ErrorKind::UnknownFirmware,
            Self::RegionMismatch { .. } => ErrorKind::RegionMismatch,
            Self::TooManyTitles { .. } => ErrorKind::TooManyTitles,
            Self::TooFewTitles { .. } => ErrorKind::TooFewTitles,
            Self::HashMismatch { .. } => ErrorKind::HashMismatch,
            Self::DeleteFailed { .. } => ErrorKind::DeleteFailed,
            Self::InstallFailed { .. } => ErrorKind::InstallFailed,
            Self::FirmwareCommitFailed { .. } => ErrorKind::FirmwareCommitFailed,
            Self::AccessDenied(_) => ErrorKind::AccessDenied,
            Self::Config(_) => ErrorKind::ConfigError,
            Self::Catalog(_) => ErrorKind::CatalogError,
            Self::Platform(_) => ErrorKind::PlatformError,
            Self::PathTraversal(_) | Self::InvalidPath(_) => ErrorKind::InvalidPath,
        }
    }

    /// Short hint printed under the diagnostic
    pub fn remediation(&self) -> Option<&'static str> {
        match self.kind() {
            ErrorKind::StorageAccessError => {
                Some("Did you store the update files in '/updates'?")
            }
            ErrorKind::AccessDenied => Some("Please reboot and try again."),
            ErrorKind::UnknownFirmware
            | ErrorKind::TooManyTitles
            | ErrorKind::TooFewTitles
            | ErrorKind::HashMismatch => Some(
                "Make sure '/updates' holds exactly one complete, unmodified firmware set.",
            ),
            ErrorKind::RegionMismatch => Some("Use the firmware set for this console's region."),
            ErrorKind::DeleteFailed | ErrorKind::InstallFailed | ErrorKind::FirmwareCommitFailed => {
                Some("Do not power off. Run the same mode again to finish the update set.")
            }
            _ => None,
        }
    }

    /// True once this error may have left titles partially written
    pub fn is_execution_failure(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::DeleteFailed | ErrorKind::InstallFailed | ErrorKind::FirmwareCommitFailed
        )
    }
}
