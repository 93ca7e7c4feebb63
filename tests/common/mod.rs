// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use std::fs;
use std::io::{self, Read};
use std::sync::atomic::{AtomicUsize, Ordering};
use sysupdater::catalog::CatalogKey;
use sysupdater::hash::{Digest, DigestEngine, Sha256Engine, sha256};
use sysupdater::platform::{ConsoleState, SimulatedConsole, package_bytes};
use sysupdater::progress::{ProgressTracker, SilentProgress};
use sysupdater::title::{DeviceClass, LEGACY_NATIVE_FIRM, Region, TitleId, TitleVersion};
use sysupdater::{Catalog, HostStorage, MemoryLog, UpdateResolver};
use tempfile::TempDir;

pub const JPN_MENU: TitleId = TitleId::new(0x0004_0030_0000_8202);
pub const USA_MENU: TitleId = TitleId::new(0x0004_0030_0000_8F02);
pub const EUR_MENU: TitleId = TitleId::new(0x0004_0030_0000_9802);
pub const MODULE_A: TitleId = TitleId::new(0x0004_0130_0000_1702);
pub const MODULE_B: TitleId = TitleId::new(0x0004_0130_0000_1802);
pub const ARCHIVE: TitleId = TitleId::new(0x0004_001B_0001_0002);
pub const EXTRA: TitleId = TitleId::new(0x0004_0130_0000_2802);

/// The set used by most tests: legacy v11872 with the USA home menu
pub const LEGACY_USA_SET: &[(TitleId, TitleVersion)] = &[
    (LEGACY_NATIVE_FIRM, 11872),
    (USA_MENU, 20),
    (MODULE_A, 5),
    (MODULE_B, 3),
    (ARCHIVE, 2),
];

/// Digest engine that counts how many files it hashed
#[derive(Debug, Default)]
pub struct CountingEngine {
    inner: Sha256Engine,
    calls: AtomicUsize,
}

impl CountingEngine {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl DigestEngine for CountingEngine {
    fn digest(
        &self,
        reader: &mut dyn Read,
        len: u64,
        progress: &dyn ProgressTracker,
    ) -> io::Result<Digest> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.digest(reader, len, progress)
    }
}

pub fn package_name(title: TitleId) -> String {
    format!("{:016X}.cia", title.raw())
}

/// Package contents for a title; the payload differs per title and version
pub fn package(title: TitleId, version: TitleVersion) -> Vec<u8> {
    let payload = format!("payload of {} v{}", title, version).repeat(64);
    package_bytes(title, version, payload.as_bytes())
}

/// A scratch storage root with an update directory and a matching catalog.
///
/// Keep the fixture alive for as long as the storage is used.
pub struct Fixture {
    pub dir: TempDir,
    pub storage: HostStorage,
    pub catalog: Catalog,
    pub engine: CountingEngine,
    pub progress: SilentProgress,
    pub log: MemoryLog,
}

impl Fixture {
    /// Empty update directory, empty catalog
    pub fn empty() -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("updates")).unwrap();
        let storage = HostStorage::new(dir.path());
        Self {
            dir,
            storage,
            catalog: Catalog::new(),
            engine: CountingEngine::default(),
            progress: SilentProgress::new(),
            log: MemoryLog::new(),
        }
    }

    /// Write every package of a set and record it in the catalog
    pub fn with_set(
        firmware_version: TitleVersion,
        device: DeviceClass,
        home_menu: TitleId,
        titles: &[(TitleId, TitleVersion)],
    ) -> Self {
        let mut fixture = Self::empty();
        for (title, version) in titles {
            fixture.write_package(*title, *version);
        }
        fixture.add_catalog_set(firmware_version, device, home_menu, titles);
        fixture
    }

    pub fn standard() -> Self {
        Self::with_set(11872, DeviceClass::Legacy, USA_MENU, LEGACY_USA_SET)
    }

    /// Record a set in the catalog without writing its packages
    pub fn add_catalog_set(
        &mut self,
        firmware_version: TitleVersion,
        device: DeviceClass,
        home_menu: TitleId,
        titles: &[(TitleId, TitleVersion)],
    ) {
        for (title, version) in titles {
            let key = CatalogKey {
                firmware_version,
                device,
                home_menu,
                title: *title,
            };
            self.catalog
                .insert(key, sha256(&package(*title, *version)))
                .unwrap();
        }
    }

    pub fn write_package(&self, title: TitleId, version: TitleVersion) {
        let path = self.dir.path().join("updates").join(package_name(title));
        fs::write(path, package(title, version)).unwrap();
    }

    pub fn remove_package(&self, title: TitleId) {
        fs::remove_file(self.dir.path().join("updates").join(package_name(title))).unwrap();
    }

    /// Flip one payload byte of a package
    pub fn tamper(&self, title: TitleId) {
        let path = self.dir.path().join("updates").join(package_name(title));
        let mut bytes = fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        fs::write(path, bytes).unwrap();
    }

    pub fn resolver(&self) -> UpdateResolver<'_> {
        UpdateResolver::new(
            &self.storage,
            &self.catalog,
            &self.engine,
            &self.progress,
            &self.log,
        )
    }
}

/// In-memory console with the given titles installed
pub fn console(
    device: DeviceClass,
    region: Region,
    installed: &[(TitleId, TitleVersion)],
) -> SimulatedConsole {
    let state = installed
        .iter()
        .fold(ConsoleState::new(device, region), |state, (title, version)| {
            state.with_title(*title, *version)
        });
    SimulatedConsole::new(state)
}

pub fn legacy_usa(installed: &[(TitleId, TitleVersion)]) -> SimulatedConsole {
    console(DeviceClass::Legacy, Region::Usa, installed)
}
