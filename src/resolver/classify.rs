// src/resolver/classify.rs

//! Candidate discovery and base-firmware classification
//!
//! Every package file in the update directory becomes a [`Candidate`]. The
//! base firmware candidate is then checked against the device class: some
//! combinations are refused outright, one needs the operator's explicit
//! confirmation. All checks run over every candidate before anything is
//! asked or written.

use crate::error::{Error, Result, UnsafeReason};
use crate::filesystem::{DirEntry, NameFilter, Storage, list_dir, path};
use crate::platform::TitleDirectory;
use crate::title::{DeviceClass, TitleId, TitleVersion};
use tracing::debug;

/// A package file found in the update directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// File name within the update directory
    pub name: String,
    /// Full storage path
    pub path: String,
    pub size: u64,
    pub title_id: TitleId,
    pub version: TitleVersion,
    /// Version of the base firmware package this candidate ships with,
    /// known once classification has run
    pub firmware_version: Option<TitleVersion>,
}

impl Candidate {
    pub fn is_native_firmware(&self) -> bool {
        self.title_id.is_native_firmware()
    }

    /// Device class this candidate targets, if it is a base firmware package
    pub fn device_class(&self) -> Option<DeviceClass> {
        DeviceClass::from_native_firmware(self.title_id)
    }
}

/// Package files in `dir`, in listing order (directories are not candidates)
pub fn enumerate(storage: &dyn Storage, dir: &str, filter: &NameFilter) -> Result<Vec<DirEntry>> {
    Ok(list_dir(storage, dir, filter)?
        .into_iter()
        .filter(|e| !e.is_dir)
        .collect())
}

/// Read the identity of every package file
pub fn inspect_candidates(
    storage: &dyn Storage,
    directory: &dyn TitleDirectory,
    dir: &str,
    entries: &[DirEntry],
) -> Result<Vec<Candidate>> {
    let mut candidates = Vec::with_capacity(entries.len());
    for entry in entries {
        let file = path::join(dir, &entry.name);
        let mut package = storage.open_read(&file)?;
        let info = directory
            .inspect_package(package.as_mut())
            .map_err(|e| Error::PackageRead {
                name: entry.name.clone(),
                reason: e.to_string(),
            })?;
        debug!("{}: {} v{}", entry.name, info.title_id, info.version);

        candidates.push(Candidate {
            name: entry.name.clone(),
            path: file,
            size: entry.size,
            title_id: info.title_id,
            version: info.version,
            firmware_version: None,
        });
    }
    Ok(candidates)
}

/// Outcome of checking one base firmware package against the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirmwareSafety {
    Safe,
    /// Boots only on a modified setup; needs operator confirmation
    Dangerous,
}

/// Check a base firmware package against the device class
pub fn check_firmware(
    candidate: &Candidate,
    device: DeviceClass,
    legacy_floor: TitleVersion,
) -> Result<FirmwareSafety> {
    match (candidate.device_class(), device) {
        (Some(DeviceClass::New), DeviceClass::Legacy) => Err(Error::UnsafeCombination(
            UnsafeReason::NewFirmwareOnLegacyDevice,
        )),
        (Some(DeviceClass::Legacy), DeviceClass::New) if candidate.version > legacy_floor => {
            Err(Error::UnsafeCombination(UnsafeReason::LegacyFirmwareAboveFloor {
                version: candidate.version,
                floor: legacy_floor,
            }))
        }
        (Some(DeviceClass::Legacy), DeviceClass::New) if candidate.version < legacy_floor => {
            Ok(FirmwareSafety::Dangerous)
        }
        _ => Ok(FirmwareSafety::Safe),
    }
}

/// The classified candidate pool
#[derive(Debug, Clone)]
pub struct Classification {
    pub candidates: Vec<Candidate>,
    /// Index of the base firmware candidate
    pub firmware: usize,
    pub safety: FirmwareSafety,
}

impl Classification {
    pub fn firmware(&self) -> &Candidate {
        &self.candidates[self.firmware]
    }

    /// Device class of the firmware package (selects the catalog subtree)
    pub fn firmware_device(&self) -> DeviceClass {
        self.firmware().device_class().unwrap_or(DeviceClass::Legacy)
    }
}

/// Find the base firmware candidate and run the device safety checks
///
/// Refused combinations are reported before the firmware count is checked,
/// so an unsafe package is always named as such.
pub fn classify(
    mut candidates: Vec<Candidate>,
    device: DeviceClass,
    legacy_floor: TitleVersion,
) -> Result<Classification> {
    let mut firmware = Vec::new();
    let mut safety = FirmwareSafety::Safe;

    for (index, candidate) in candidates.iter().enumerate() {
        if !candidate.is_native_firmware() {
            continue;
        }
        if check_firmware(candidate, device, legacy_floor)? == FirmwareSafety::Dangerous {
            safety = FirmwareSafety::Dangerous;
        }
        firmware.push(index);
    }

    let index = match firmware.as_slice() {
        [index] => *index,
        [] => {
            return Err(Error::UnknownFirmware {
                detail: "no base firmware package among the update files".to_string(),
            });
        }
        [first, second, ..] => {
            return Err(Error::UnknownFirmware {
                detail: format!(
                    "more than one base firmware package ('{}' and '{}')",
                    candidates[*first].name, candidates[*second].name
                ),
            });
        }
    };

    let firmware_version = candidates[index].version;
    for candidate in &mut candidates {
        candidate.firmware_version = Some(firmware_version);
    }

    Ok(Classification {
        candidates,
        firmware: index,
        safety,
    })
}
