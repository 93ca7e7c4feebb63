// src/resolver/plan.rs

//! Install plan construction
//!
//! A verified candidate pool is compared against the installed-title
//! snapshot. The mode decides which version differences are actionable, and
//! the result is ordered so that foundational titles are written first on
//! the way up and last on the way down.

use super::classify::Candidate;
use crate::platform::InstalledTitle;
use crate::title::{TitleId, TitleVersion};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use strum_macros::{AsRefStr, Display, EnumString};

/// Resolution mode
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, EnumString, Serialize, Deserialize,
)]
#[strum(ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum UpdateMode {
    /// Only move titles forward
    #[strum(to_string = "upgrade", serialize = "update")]
    Upgrade,
    /// Replace every title whose version differs
    #[strum(serialize = "downgrade")]
    Downgrade,
}

/// Candidate version relative to the installed title
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionDelta {
    /// Title is not installed; always eligible
    NotInstalled,
    /// Candidate version minus installed version
    Delta(i32),
}

impl VersionDelta {
    /// Whether a candidate with this delta belongs in the plan
    pub fn is_actionable(self, mode: UpdateMode) -> bool {
        match (self, mode) {
            (Self::NotInstalled, _) => true,
            (Self::Delta(d), UpdateMode::Upgrade) => d > 0,
            (Self::Delta(d), UpdateMode::Downgrade) => d != 0,
        }
    }

    /// The installed title has to go before this candidate can be installed
    pub fn requires_prior_delete(self, mode: UpdateMode) -> bool {
        mode == UpdateMode::Downgrade && matches!(self, Self::Delta(d) if d < 0)
    }
}

impl fmt::Display for VersionDelta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotInstalled => write!(f, "new"),
            Self::Delta(d) => write!(f, "{:+}", d),
        }
    }
}

/// Compare a candidate version against the installed snapshot
pub fn version_delta(
    installed: &[InstalledTitle],
    title: TitleId,
    version: TitleVersion,
) -> VersionDelta {
    installed
        .iter()
        .find(|t| t.title_id == title)
        .map(|t| VersionDelta::Delta(i32::from(version) - i32::from(t.version)))
        .unwrap_or(VersionDelta::NotInstalled)
}

/// One scheduled install
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanEntry {
    pub candidate: Candidate,
    pub delta: VersionDelta,
    pub requires_prior_delete: bool,
}

impl PlanEntry {
    pub fn title_id(&self) -> TitleId {
        self.candidate.title_id
    }
}

/// Ordered install plan; executed strictly in this order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallPlan {
    mode: UpdateMode,
    entries: Vec<PlanEntry>,
}

impl InstallPlan {
    pub fn mode(&self) -> UpdateMode {
        self.mode
    }

    pub fn entries(&self) -> &[PlanEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn titles(&self) -> Vec<TitleId> {
        self.entries.iter().map(PlanEntry::title_id).collect()
    }

    /// Total bytes the plan will install
    pub fn total_size(&self) -> u64 {
        self.entries.iter().map(|e| e.candidate.size).sum()
    }
}

/// Install order of two titles under `mode`
///
/// Safe-mode variants always come first. Otherwise upgrades follow the type
/// priority table from the top and downgrades from the bottom.
pub fn install_order(a: TitleId, b: TitleId, mode: UpdateMode) -> Ordering {
    let safe = b.is_safe_mode().cmp(&a.is_safe_mode());
    let priority = match mode {
        UpdateMode::Upgrade => a.priority().cmp(&b.priority()),
        UpdateMode::Downgrade => b.priority().cmp(&a.priority()),
    };
    safe.then(priority)
}

/// Filter and order the candidates into a plan
///
/// Titles that tie on the ordering key keep their enumeration order.
pub fn build_plan(
    candidates: &[Candidate],
    installed: &[InstalledTitle],
    mode: UpdateMode,
) -> InstallPlan {
    let mut entries: Vec<PlanEntry> = candidates
        .iter()
        .filter_map(|candidate| {
            let delta = version_delta(installed, candidate.title_id, candidate.version);
            delta.is_actionable(mode).then(|| PlanEntry {
                candidate: candidate.clone(),
                delta,
                requires_prior_delete: delta.requires_prior_delete(mode),
            })
        })
        .collect();

    entries.sort_by(|a, b| install_order(a.title_id(), b.title_id(), mode));
    InstallPlan { mode, entries }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::title::{LEGACY_NATIVE_FIRM, SAFE_MODE_TAG};

    const MODULE_A: TitleId = TitleId::new(0x0004_0130_0000_1702);
    const MODULE_B: TitleId = TitleId::new(0x0004_0130_0000_1802);
    const APPLET: TitleId = TitleId::new(0x0004_0030_0000_8F02);
    const ARCHIVE: TitleId = TitleId::new(0x0004_001B_0001_0002);
    const SAFE_FIRM: TitleId = TitleId::new(0x0004_0138_0000_0003);

    fn candidate(title: TitleId, version: TitleVersion) -> Candidate {
        Candidate {
            name: format!("{:016X}.cia", title.raw()),
            path: format!("/updates/{:016X}.cia", title.raw()),
            size: 10,
            title_id: title,
            version,
            firmware_version: Some(11872),
        }
    }

    fn installed(title: TitleId, version: TitleVersion) -> InstalledTitle {
        InstalledTitle {
            title_id: title,
            version,
        }
    }

    #[test]
    fn test_version_delta() {
        let snapshot = [installed(MODULE_A, 4)];
        assert_eq!(version_delta(&snapshot, MODULE_A, 5), VersionDelta::Delta(1));
        assert_eq!(version_delta(&snapshot, MODULE_A, 1), VersionDelta::Delta(-3));
        assert_eq!(version_delta(&snapshot, MODULE_B, 0), VersionDelta::NotInstalled);
        assert_eq!(
            version_delta(&[installed(MODULE_A, u16::MAX)], MODULE_A, 0),
            VersionDelta::Delta(-65535)
        );
    }

    #[test]
    fn test_mode_rules() {
        use UpdateMode::*;
        assert!(VersionDelta::NotInstalled.is_actionable(Upgrade));
        assert!(VersionDelta::NotInstalled.is_actionable(Downgrade));
        assert!(VersionDelta::Delta(1).is_actionable(Upgrade));
        assert!(!VersionDelta::Delta(0).is_actionable(Upgrade));
        assert!(!VersionDelta::Delta(-1).is_actionable(Upgrade));
        assert!(VersionDelta::Delta(-1).is_actionable(Downgrade));
        assert!(!VersionDelta::Delta(0).is_actionable(Downgrade));

        assert!(VersionDelta::Delta(-1).requires_prior_delete(Downgrade));
        assert!(!VersionDelta::Delta(1).requires_prior_delete(Downgrade));
        assert!(!VersionDelta::Delta(-1).requires_prior_delete(Upgrade));
        assert!(!VersionDelta::NotInstalled.requires_prior_delete(Downgrade));
    }

    #[test]
    fn test_upgrade_plan_filters_and_orders() {
        let candidates = [
            candidate(MODULE_B, 3),
            candidate(MODULE_A, 5),
            candidate(LEGACY_NATIVE_FIRM, 11872),
        ];
        let snapshot = [installed(MODULE_A, 4), installed(MODULE_B, 3)];
        let plan = build_plan(&candidates, &snapshot, UpdateMode::Upgrade);

        assert_eq!(plan.titles(), vec![LEGACY_NATIVE_FIRM, MODULE_A]);
        assert!(plan.entries().iter().all(|e| !e.requires_prior_delete));
        assert_eq!(plan.total_size(), 20);
    }

    #[test]
    fn test_downgrade_plan_deletes_older() {
        let candidates = [
            candidate(LEGACY_NATIVE_FIRM, 10000),
            candidate(MODULE_A, 2),
            candidate(MODULE_B, 6),
            candidate(APPLET, 1),
        ];
        let snapshot = [
            installed(LEGACY_NATIVE_FIRM, 11872),
            installed(MODULE_A, 4),
            installed(MODULE_B, 3),
            installed(APPLET, 1),
        ];
        let plan = build_plan(&candidates, &snapshot, UpdateMode::Downgrade);

        // Reverse priority: modules before firmware, applet skipped (equal)
        assert_eq!(plan.titles(), vec![MODULE_A, MODULE_B, LEGACY_NATIVE_FIRM]);
        let deletes: Vec<bool> = plan.entries().iter().map(|e| e.requires_prior_delete).collect();
        assert_eq!(deletes, vec![true, false, true]);
    }

    #[test]
    fn test_safe_mode_first_in_both_modes() {
        assert_eq!(SAFE_FIRM.variant(), SAFE_MODE_TAG);
        let safe_archive = TitleId::new(0x0004_001B_0001_0003);
        let candidates = [
            candidate(ARCHIVE, 1),
            candidate(LEGACY_NATIVE_FIRM, 1),
            candidate(safe_archive, 1),
            candidate(SAFE_FIRM, 1),
        ];

        let up = build_plan(&candidates, &[], UpdateMode::Upgrade);
        assert_eq!(
            up.titles(),
            vec![SAFE_FIRM, safe_archive, LEGACY_NATIVE_FIRM, ARCHIVE]
        );

        let down = build_plan(&candidates, &[], UpdateMode::Downgrade);
        assert_eq!(
            down.titles(),
            vec![safe_archive, SAFE_FIRM, ARCHIVE, LEGACY_NATIVE_FIRM]
        );
    }

    #[test]
    fn test_unknown_type_ranks_last() {
        let unknown = TitleId::new(0x0004_0000_0000_1002);
        let candidates = [candidate(unknown, 1), candidate(ARCHIVE, 1)];
        let up = build_plan(&candidates, &[], UpdateMode::Upgrade);
        assert_eq!(up.titles(), vec![ARCHIVE, unknown]);
        let down = build_plan(&candidates, &[], UpdateMode::Downgrade);
        assert_eq!(down.titles(), vec![unknown, ARCHIVE]);
    }

    #[test]
    fn test_ties_keep_enumeration_order() {
        let candidates = [candidate(MODULE_B, 1), candidate(MODULE_A, 1)];
        let plan = build_plan(&candidates, &[], UpdateMode::Upgrade);
        assert_eq!(plan.titles(), vec![MODULE_B, MODULE_A]);
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!("upgrade".parse::<UpdateMode>().unwrap(), UpdateMode::Upgrade);
        assert_eq!("Update".parse::<UpdateMode>().unwrap(), UpdateMode::Upgrade);
        assert_eq!("downgrade".parse::<UpdateMode>().unwrap(), UpdateMode::Downgrade);
        assert_eq!(UpdateMode::Upgrade.to_string(), "upgrade");
        assert_eq!(VersionDelta::Delta(1).to_string(), "+1");
        assert_eq!(VersionDelta::Delta(-2).to_string(), "-2");
    }
}
