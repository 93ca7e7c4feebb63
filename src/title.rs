// src/title.rs

//! Title identifiers and the facts derived from them
//!
//! A title is addressed by a 64-bit identifier. The high 32 bits encode the
//! title type, the low byte tags special variants (the safe-mode builds use
//! `0x03`). Everything the resolver needs to know about a title that is not
//! stored in the catalog is derived here: its install priority, whether it is
//! the base firmware, which device class that firmware targets, and which
//! console regions a home menu title belongs to.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

/// Title version as reported by the package header and the title directory
pub type TitleVersion = u16;

/// Low-byte tag marking safe-mode variants
pub const SAFE_MODE_TAG: u8 = 0x03;

/// Base firmware title for the legacy device class
pub const LEGACY_NATIVE_FIRM: TitleId = TitleId(0x0004_0138_0000_0002);

/// Base firmware title for the newer device class
pub const NEW_NATIVE_FIRM: TitleId = TitleId(0x0004_0138_2000_0002);

/// Highest-version legacy firmware image that boots on the newer device class
/// without slot swapping.
pub const LEGACY_FIRMWARE_FLOOR: TitleVersion = 11872;

/// 64-bit title identifier
///
/// Serialized as a 16-digit hex string so it can be used as a TOML or JSON
/// map key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TitleId(u64);

impl TitleId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(&self) -> u64 {
        self.0
    }

    /// Title type code (high 32 bits)
    #[inline]
    pub const fn type_code(&self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Variant tag (low byte)
    #[inline]
    pub const fn variant(&self) -> u8 {
        (self.0 & 0xFF) as u8
    }

    pub fn title_type(&self) -> Option<TitleType> {
        TitleType::from_code(self.type_code())
    }

    pub const fn is_safe_mode(&self) -> bool {
        self.variant() == SAFE_MODE_TAG
    }

    /// True for either device class's base firmware
    pub const fn is_native_firmware(&self) -> bool {
        self.0 == LEGACY_NATIVE_FIRM.0 || self.0 == NEW_NATIVE_FIRM.0
    }

    /// Index into the priority table; unknown types rank after every entry
    pub fn priority(&self) -> usize {
        self.title_type()
            .map(TitleType::priority)
            .unwrap_or(TitleType::PRIORITY_ORDER.len())
    }
}

impl fmt::Display for TitleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016X}", self.0)
    }
}

impl FromStr for TitleId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let digits = s
            .trim()
            .trim_start_matches("0x")
            .trim_start_matches("0X");
        if digits.is_empty() || digits.len() > 16 {
            return Err(Error::Catalog(format!("invalid title id '{}'", s)));
        }
        u64::from_str_radix(digits, 16)
            .map(TitleId)
            .map_err(|e| Error::Catalog(format!("invalid title id '{}': {}", s, e)))
    }
}

impl TryFrom<String> for TitleId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<TitleId> for String {
    fn from(id: TitleId) -> Self {
        format!("{:016X}", id.0)
    }
}

impl From<u64> for TitleId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

/// Title types that have a fixed place in the install order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr)]
pub enum TitleType {
    #[strum(serialize = "system-firmware")]
    SystemFirmware,
    #[strum(serialize = "system-module")]
    SystemModule,
    #[strum(serialize = "applet")]
    Applet,
    #[strum(serialize = "system-application")]
    SystemApplication,
    #[strum(serialize = "system-data-archive")]
    SystemDataArchive,
    #[strum(serialize = "shared-data-archive")]
    SharedDataArchive,
    #[strum(serialize = "system-data-archive-ext")]
    SystemDataArchiveExt,
}

impl TitleType {
    /// Ordered from highest to lowest install priority
    pub const PRIORITY_ORDER: [TitleType; 7] = [
        Self::SystemFirmware,
        Self::SystemModule,
        Self::Applet,
        Self::SystemApplication,
        Self::SystemDataArchive,
        Self::SharedDataArchive,
        Self::SystemDataArchiveExt,
    ];

    pub const fn code(&self) -> u32 {
        match self {
            Self::SystemFirmware => 0x0004_0138,
            Self::SystemModule => 0x0004_0130,
            Self::Applet => 0x0004_0030,
            Self::SystemApplication => 0x0004_0010,
            Self::SystemDataArchive => 0x0004_001B,
            Self::SharedDataArchive => 0x0004_009B,
            Self::SystemDataArchiveExt => 0x0004_00DB,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        Self::PRIORITY_ORDER.into_iter().find(|t| t.code() == code)
    }

    pub fn priority(self) -> usize {
        // PRIORITY_ORDER lists every variant exactly once
        Self::PRIORITY_ORDER
            .iter()
            .position(|t| *t == self)
            .unwrap_or(Self::PRIORITY_ORDER.len())
    }
}

/// Hardware revision tier
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    AsRefStr,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    #[strum(serialize = "legacy")]
    Legacy,
    #[strum(serialize = "new")]
    New,
}

impl DeviceClass {
    /// Base firmware title built for this device class
    pub const fn native_firmware(&self) -> TitleId {
        match self {
            Self::Legacy => LEGACY_NATIVE_FIRM,
            Self::New => NEW_NATIVE_FIRM,
        }
    }

    pub fn from_native_firmware(id: TitleId) -> Option<Self> {
        if id == LEGACY_NATIVE_FIRM {
            Some(Self::Legacy)
        } else if id == NEW_NATIVE_FIRM {
            Some(Self::New)
        } else {
            None
        }
    }
}

/// Console region as stored in the device's secure configuration
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    AsRefStr,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(ascii_case_insensitive, serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Region {
    Jpn,
    Usa,
    Eur,
    Aus,
    Chn,
    Kor,
    Twn,
}

/// Home menu titles and the device regions each one may be installed on
const HOME_MENUS: &[(TitleId, &[Region])] = &[
    (TitleId(0x0004_0030_0000_8202), &[Region::Jpn]),
    (TitleId(0x0004_0030_0000_8F02), &[Region::Usa]),
    (TitleId(0x0004_0030_0000_9802), &[Region::Eur, Region::Aus]),
    (TitleId(0x0004_0030_0000_A102), &[Region::Chn]),
    (TitleId(0x0004_0030_0000_A902), &[Region::Kor]),
    (TitleId(0x0004_0030_0000_B102), &[Region::Twn]),
];

/// Regions a home menu title is built for, if the title is a known home menu
pub fn home_menu_regions(id: TitleId) -> Option<&'static [Region]> {
    HOME_MENUS
        .iter()
        .find(|(home, _)| *home == id)
        .map(|(_, regions)| *regions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_id_parts() {
        let id = TitleId::new(0x0004_0130_0000_1003);
        assert_eq!(id.type_code(), 0x0004_0130);
        assert_eq!(id.variant(), 0x03);
        assert!(id.is_safe_mode());
        assert_eq!(id.title_type(), Some(TitleType::SystemModule));
    }

    #[test]
    fn test_title_id_parse_and_display() {
        let id: TitleId = "0x0004013800000002".parse().unwrap();
        assert_eq!(id, LEGACY_NATIVE_FIRM);
        assert_eq!(id.to_string(), "0x0004013800000002");

        let bare: TitleId = "0004013820000002".parse().unwrap();
        assert_eq!(bare, NEW_NATIVE_FIRM);

        assert!("".parse::<TitleId>().is_err());
        assert!("0x12345678901234567".parse::<TitleId>().is_err());
        assert!("zz".parse::<TitleId>().is_err());
    }

    #[test]
    fn test_title_id_serde_as_hex_string() {
        let json = serde_json::to_string(&NEW_NATIVE_FIRM).unwrap();
        assert_eq!(json, "\"0004013820000002\"");
        let back: TitleId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, NEW_NATIVE_FIRM);
    }

    #[test]
    fn test_priority_table() {
        assert_eq!(LEGACY_NATIVE_FIRM.priority(), 0);
        assert_eq!(TitleId::new(0x0004_0130_0000_2C02).priority(), 1);
        assert_eq!(TitleId::new(0x0004_0030_0000_8F02).priority(), 2);
        assert_eq!(TitleId::new(0x0004_0010_0002_0002).priority(), 3);
        assert_eq!(TitleId::new(0x0004_001B_0001_0002).priority(), 4);
        assert_eq!(TitleId::new(0x0004_009B_0001_0002).priority(), 5);
        assert_eq!(TitleId::new(0x0004_00DB_0001_0002).priority(), 6);
        // Unknown types rank after every entry
        assert_eq!(TitleId::new(0x0004_0000_0000_0002).priority(), 7);
    }

    #[test]
    fn test_device_class_firmware_mapping() {
        assert_eq!(
            DeviceClass::from_native_firmware(LEGACY_NATIVE_FIRM),
            Some(DeviceClass::Legacy)
        );
        assert_eq!(
            DeviceClass::from_native_firmware(NEW_NATIVE_FIRM),
            Some(DeviceClass::New)
        );
        assert_eq!(
            DeviceClass::from_native_firmware(TitleId::new(0x0004_0138_0000_0003)),
            None
        );
        assert!(LEGACY_NATIVE_FIRM.is_native_firmware());
        assert!(!TitleId::new(0x0004_0138_0000_0003).is_native_firmware());
    }

    #[test]
    fn test_region_parse() {
        assert_eq!("eur".parse::<Region>().unwrap(), Region::Eur);
        assert_eq!("AUS".parse::<Region>().unwrap(), Region::Aus);
        assert_eq!(Region::Usa.to_string(), "USA");
    }

    #[test]
    fn test_every_region_has_a_home_menu() {
        use strum::IntoEnumIterator;
        for region in Region::iter() {
            assert!(
                HOME_MENUS.iter().any(|(_, regions)| regions.contains(&region)),
                "no home menu for {}",
                region
            );
        }
    }

    #[test]
    fn test_eur_home_menu_accepts_aus() {
        let regions = home_menu_regions(TitleId::new(0x0004_0030_0000_9802)).unwrap();
        assert!(regions.contains(&Region::Eur));
        assert!(regions.contains(&Region::Aus));
        assert!(!regions.contains(&Region::Usa));
    }
}
