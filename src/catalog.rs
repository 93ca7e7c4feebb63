// src/catalog.rs

//! Known-good firmware sets
//!
//! The catalog records, for every supported combination of firmware version,
//! device class and home menu title, the complete set of companion titles
//! and the digest each package file must have. It is stored as one flat map
//! keyed by the full (version, device, home menu, title) tuple, so selecting
//! a peer set is a single range scan and the "exactly one subtree" rule is
//! enforced in [`Catalog::select`].
//!
//! On disk the catalog is TOML:
//!
//! ```toml
//! [[set]]
//! firmware_version = 11872
//! device = "legacy"
//! home_menu = "0004003000008F02"
//!
//! [set.titles]
//! "0004013800000002" = "<sha256 hex>"
//! "0004003000008F02" = "<sha256 hex>"
//! ```

use crate::error::{Error, Result};
use crate::hash::Digest;
use crate::title::{DeviceClass, TitleId, TitleVersion};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;
use tracing::info;

/// Full lookup key of one expected digest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CatalogKey {
    pub firmware_version: TitleVersion,
    pub device: DeviceClass,
    pub home_menu: TitleId,
    pub title: TitleId,
}

/// Identifies one peer set (a key without the title)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SetKey {
    pub firmware_version: TitleVersion,
    pub device: DeviceClass,
    pub home_menu: TitleId,
}

impl SetKey {
    fn first(&self) -> CatalogKey {
        self.with_title(TitleId::new(u64::MIN))
    }

    fn last(&self) -> CatalogKey {
        self.with_title(TitleId::new(u64::MAX))
    }

    fn with_title(&self, title: TitleId) -> CatalogKey {
        CatalogKey {
            firmware_version: self.firmware_version,
            device: self.device,
            home_menu: self.home_menu,
            title,
        }
    }
}

impl From<CatalogKey> for SetKey {
    fn from(key: CatalogKey) -> Self {
        Self {
            firmware_version: key.firmware_version,
            device: key.device,
            home_menu: key.home_menu,
        }
    }
}

impl fmt::Display for SetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "v{} {} home menu {}",
            self.firmware_version, self.device, self.home_menu
        )
    }
}

/// The companion titles expected for one selected set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerSet {
    key: SetKey,
    digests: BTreeMap<TitleId, Digest>,
}

impl PeerSet {
    pub fn key(&self) -> SetKey {
        self.key
    }

    pub fn get(&self, title: TitleId) -> Option<&Digest> {
        self.digests.get(&title)
    }

    pub fn contains(&self, title: TitleId) -> bool {
        self.digests.contains_key(&title)
    }

    pub fn len(&self) -> usize {
        self.digests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.digests.is_empty()
    }

    pub fn titles(&self) -> impl Iterator<Item = TitleId> + '_ {
        self.digests.keys().copied()
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CatalogFile {
    #[serde(rename = "set", default)]
    sets: Vec<SetRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SetRecord {
    firmware_version: TitleVersion,
    device: DeviceClass,
    home_menu: TitleId,
    titles: BTreeMap<TitleId, Digest>,
}

/// Read-only catalog of known-good sets
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: BTreeMap<CatalogKey, Digest>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a catalog from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Catalog(format!("failed to read catalog {}: {}", path.display(), e))
        })?;
        let catalog = Self::from_toml_str(&content)?;
        info!(
            "Loaded catalog {} ({} sets, {} entries)",
            path.display(),
            catalog.sets().len(),
            catalog.len()
        );
        Ok(catalog)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: CatalogFile = toml::from_str(content)
            .map_err(|e| Error::Catalog(format!("failed to parse catalog: {}", e)))?;

        let mut catalog = Self::new();
        for set in file.sets {
            let key = SetKey {
                firmware_version: set.firmware_version,
                device: set.device,
                home_menu: set.home_menu,
            };
            if set.titles.is_empty() {
                return Err(Error::Catalog(format!("set {} lists no titles", key)));
            }
            for (title, digest) in set.titles {
                catalog.insert(key.with_title(title), digest)?;
            }
        }
        Ok(catalog)
    }

    /// Serialize back to the on-disk TOML layout
    pub fn to_toml_string(&self) -> Result<String> {
        let mut sets: Vec<SetRecord> = Vec::new();
        for (key, digest) in &self.entries {
            let set_key = SetKey::from(*key);
            match sets.last_mut() {
                Some(last)
                    if last.firmware_version == set_key.firmware_version
                        && last.device == set_key.device
                        && last.home_menu == set_key.home_menu =>
                {
                    last.titles.insert(key.title, *digest);
                }
                _ => sets.push(SetRecord {
                    firmware_version: set_key.firmware_version,
                    device: set_key.device,
                    home_menu: set_key.home_menu,
                    titles: BTreeMap::from([(key.title, *digest)]),
                }),
            }
        }
        toml::to_string(&CatalogFile { sets })
            .map_err(|e| Error::Catalog(format!("failed to serialize catalog: {}", e)))
    }

    /// Add one expected digest; re-adding the same key with another digest is
    /// an error
    pub fn insert(&mut self, key: CatalogKey, digest: Digest) -> Result<()> {
        match self.entries.insert(key, digest) {
            Some(previous) if previous != digest => Err(Error::Catalog(format!(
                "conflicting digests for {} in set {}",
                key.title,
                SetKey::from(key)
            ))),
            _ => Ok(()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &CatalogKey) -> Option<&Digest> {
        self.entries.get(key)
    }

    pub fn firmware_versions(&self) -> BTreeSet<TitleVersion> {
        self.entries.keys().map(|k| k.firmware_version).collect()
    }

    /// Every set in the catalog, in key order
    pub fn sets(&self) -> Vec<SetKey> {
        let mut sets: Vec<SetKey> = self.entries.keys().map(|k| SetKey::from(*k)).collect();
        sets.dedup();
        sets
    }

    /// Device classes with at least one set for `firmware_version`
    pub fn devices(&self, firmware_version: TitleVersion) -> BTreeSet<DeviceClass> {
        self.entries
            .keys()
            .filter(|k| k.firmware_version == firmware_version)
            .map(|k| k.device)
            .collect()
    }

    /// Home menu titles with a set under (`firmware_version`, `device`)
    pub fn home_menus(&self, firmware_version: TitleVersion, device: DeviceClass) -> BTreeSet<TitleId> {
        self.entries
            .keys()
            .filter(|k| k.firmware_version == firmware_version && k.device == device)
            .map(|k| k.home_menu)
            .collect()
    }

    pub fn peer_set(&self, key: SetKey) -> Option<PeerSet> {
        let digests: BTreeMap<TitleId, Digest> = self
            .entries
            .range(key.first()..=key.last())
            .map(|(k, d)| (k.title, *d))
            .collect();
        if digests.is_empty() {
            None
        } else {
            Some(PeerSet { key, digests })
        }
    }

    /// Select the one peer set the candidates belong to
    ///
    /// The firmware version selects a subtree, the device class a nested one,
    /// and the candidates' home menu title the peer set within that. Each
    /// level must resolve to exactly one subtree.
    pub fn select(
        &self,
        firmware_version: TitleVersion,
        device: DeviceClass,
        candidates: impl IntoIterator<Item = TitleId>,
    ) -> Result<PeerSet> {
        if !self.firmware_versions().contains(&firmware_version) {
            return Err(Error::UnknownFirmware {
                detail: format!("firmware version v{} is not in the catalog", firmware_version),
            });
        }
        if !self.devices(firmware_version).contains(&device) {
            return Err(Error::UnknownFirmware {
                detail: format!(
                    "firmware version v{} has no {} device set",
                    firmware_version, device
                ),
            });
        }

        let known = self.home_menus(firmware_version, device);
        let found: BTreeSet<TitleId> = candidates
            .into_iter()
            .filter(|id| known.contains(id))
            .collect();

        let mut found = found.into_iter();
        let home_menu = match (found.next(), found.next()) {
            (Some(home_menu), None) => home_menu,
            (None, _) => {
                return Err(Error::UnknownFirmware {
                    detail: format!(
                        "no home menu for firmware v{} ({}) among the update files",
                        firmware_version, device
                    ),
                });
            }
            (Some(first), Some(second)) => {
                return Err(Error::UnknownFirmware {
                    detail: format!(
                        "update files contain more than one home menu ({} and {})",
                        first, second
                    ),
                });
            }
        };

        let key = SetKey {
            firmware_version,
            device,
            home_menu,
        };
        self.peer_set(key).ok_or_else(|| Error::UnknownFirmware {
            detail: format!("no peer set for {}", key),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::hash::sha256;
    use crate::title::LEGACY_NATIVE_FIRM;

    const USA_MENU: TitleId = TitleId::new(0x0004_0030_0000_8F02);
    const EUR_MENU: TitleId = TitleId::new(0x0004_0030_0000_9802);
    const MODULE: TitleId = TitleId::new(0x0004_0130_0000_1702);

    fn sample() -> Catalog {
        let toml = format!(
            r#"
[[set]]
firmware_version = 11872
device = "legacy"
home_menu = "0004003000008F02"

[set.titles]
"0004013800000002" = "{firm}"
"0004003000008F02" = "{usa}"
"0004013000001702" = "{module}"

[[set]]
firmware_version = 11872
device = "legacy"
home_menu = "0004003000009802"

[set.titles]
"0004013800000002" = "{firm}"
"0004003000009802" = "{eur}"
"#,
            firm = sha256(b"firm"),
            usa = sha256(b"usa"),
            eur = sha256(b"eur"),
            module = sha256(b"module"),
        );
        Catalog::from_toml_str(&toml).unwrap()
    }

    #[test]
    fn test_parse_flattens_sets() {
        let catalog = sample();
        assert_eq!(catalog.len(), 5);
        assert_eq!(catalog.sets().len(), 2);
        assert_eq!(catalog.firmware_versions(), BTreeSet::from([11872]));
        assert_eq!(
            catalog.home_menus(11872, DeviceClass::Legacy),
            BTreeSet::from([USA_MENU, EUR_MENU])
        );
        assert!(catalog.home_menus(11872, DeviceClass::New).is_empty());
    }

    #[test]
    fn test_peer_set_is_isolated() {
        let catalog = sample();
        let set = catalog
            .peer_set(SetKey {
                firmware_version: 11872,
                device: DeviceClass::Legacy,
                home_menu: EUR_MENU,
            })
            .unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.contains(LEGACY_NATIVE_FIRM));
        assert!(!set.contains(MODULE));
        assert_eq!(set.get(EUR_MENU), Some(&sha256(b"eur")));
    }

    #[test]
    fn test_select_by_home_menu() {
        let catalog = sample();
        let set = catalog
            .select(
                11872,
                DeviceClass::Legacy,
                [LEGACY_NATIVE_FIRM, USA_MENU, MODULE],
            )
            .unwrap();
        assert_eq!(set.key().home_menu, USA_MENU);
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_select_unknown_version_and_device() {
        let catalog = sample();
        let err = catalog
            .select(9999, DeviceClass::Legacy, [USA_MENU])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownFirmware);

        let err = catalog
            .select(11872, DeviceClass::New, [USA_MENU])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownFirmware);
    }

    #[test]
    fn test_select_requires_exactly_one_home_menu() {
        let catalog = sample();
        let none = catalog
            .select(11872, DeviceClass::Legacy, [LEGACY_NATIVE_FIRM])
            .unwrap_err();
        assert!(none.to_string().contains("no home menu"), "{}", none);

        let two = catalog
            .select(11872, DeviceClass::Legacy, [USA_MENU, EUR_MENU])
            .unwrap_err();
        assert!(two.to_string().contains("more than one"), "{}", two);
    }

    #[test]
    fn test_conflicting_digest_rejected() {
        let mut catalog = sample();
        let key = CatalogKey {
            firmware_version: 11872,
            device: DeviceClass::Legacy,
            home_menu: USA_MENU,
            title: MODULE,
        };
        assert!(catalog.insert(key, sha256(b"module")).is_ok());
        let err = catalog.insert(key, sha256(b"other")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CatalogError);
    }

    #[test]
    fn test_toml_round_trip_preserves_sets() {
        let catalog = sample();
        let text = catalog.to_toml_string().unwrap();
        let back = Catalog::from_toml_str(&text).unwrap();
        assert_eq!(back.sets(), catalog.sets());
        assert_eq!(back.len(), catalog.len());
    }

    #[test]
    fn test_malformed_catalog() {
        assert!(Catalog::from_toml_str("[[set]]\nfirmware_version = \"x\"").is_err());
        let bad_digest = r#"
[[set]]
firmware_version = 1
device = "new"
home_menu = "0004003000008F02"
[set.titles]
"0004013820000002" = "not-hex"
"#;
        assert!(Catalog::from_toml_str(bad_digest).is_err());
        assert!(Catalog::from_toml_str("").unwrap().is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.toml");
        std::fs::write(&path, sample().to_toml_string().unwrap()).unwrap();

        let catalog = Catalog::load(&path).unwrap();
        assert_eq!(catalog.sets(), sample().sets());

        let err = Catalog::load(&dir.path().join("missing.toml")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CatalogError);
    }
}
