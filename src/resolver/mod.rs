// src/resolver/mod.rs

//! Update-set resolution and sequencing
//!
//! The resolver turns the package files in the update directory into an
//! ordered install plan and runs it. One pass goes through these phases, and
//! any error ends the pass:
//!
//! 1. enumerate and inspect the candidates ([`classify`])
//! 2. check the base firmware against the device class, asking the operator
//!    to confirm the one combination that is dangerous but recoverable
//! 3. select the catalog peer set, then check region and completeness
//!    ([`validate`])
//! 4. hash every candidate against the catalog
//! 5. compare versions with the installed snapshot and order the plan
//!    ([`plan`])
//! 6. delete, install and commit, entry by entry ([`execute`])
//!
//! Phases 1-5 write nothing. The installed-title snapshot is read once, at
//! the start of the pass.

pub mod classify;
pub mod execute;
pub mod plan;
pub mod validate;

pub use classify::{Candidate, Classification, FirmwareSafety};
pub use execute::ExecutionReport;
pub use plan::{InstallPlan, PlanEntry, UpdateMode, VersionDelta, build_plan, version_delta};

use crate::catalog::Catalog;
use crate::error::{Error, Result};
use crate::filesystem::{NameFilter, Storage};
use crate::hash::DigestEngine;
use crate::logging::StatusSink;
use crate::platform::{SystemInfo, TitleDirectory};
use crate::progress::ProgressTracker;
use crate::prompt::Operator;
use crate::title::{LEGACY_FIRMWARE_FLOOR, TitleVersion};
use tracing::{debug, info};

/// Question asked before installing legacy firmware below the floor on a
/// newer-class device
pub const DANGEROUS_FIRMWARE_QUESTION: &str = "Installing legacy firmware on a new device will brick \
     unless the NCSD and crypto slot are swapped!\n\
     !! DO NOT CONTINUE UNLESS YOU ARE ON A9LH OR REDNAND !!";

/// Where candidates come from and the firmware floor to enforce
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverOptions {
    pub updates_dir: String,
    pub filter: NameFilter,
    pub legacy_firmware_floor: TitleVersion,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            updates_dir: "/updates".to_string(),
            filter: NameFilter::parse(".cia;"),
            legacy_firmware_floor: LEGACY_FIRMWARE_FLOOR,
        }
    }
}

/// The update resolver
///
/// Borrows its collaborators for the duration of one session. The catalog
/// is read-only; the title directory is only written during [`execute`].
///
/// [`execute`]: UpdateResolver::execute
pub struct UpdateResolver<'a> {
    storage: &'a dyn Storage,
    catalog: &'a Catalog,
    engine: &'a dyn DigestEngine,
    progress: &'a dyn ProgressTracker,
    status: &'a dyn StatusSink,
    options: ResolverOptions,
}

impl<'a> UpdateResolver<'a> {
    pub fn new(
        storage: &'a dyn Storage,
        catalog: &'a Catalog,
        engine: &'a dyn DigestEngine,
        progress: &'a dyn ProgressTracker,
        status: &'a dyn StatusSink,
    ) -> Self {
        Self {
            storage,
            catalog,
            engine,
            progress,
            status,
            options: ResolverOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ResolverOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &ResolverOptions {
        &self.options
    }

    /// Validate the update directory and build the install plan
    ///
    /// Nothing is written. The only interaction is the confirmation prompt
    /// for dangerous firmware; declining it fails with
    /// [`Error::DangerousCombination`].
    pub fn resolve(
        &self,
        directory: &dyn TitleDirectory,
        system: &dyn SystemInfo,
        operator: &mut dyn Operator,
        mode: UpdateMode,
    ) -> Result<InstallPlan> {
        let dir = self.options.updates_dir.as_str();
        let installed = directory.installed_titles()?;
        let device = system.device_class()?;
        debug!(
            "Resolving {} for {} device ({} titles installed)",
            mode,
            device,
            installed.len()
        );

        self.status.line("Getting firmware files information...");
        let entries = classify::enumerate(self.storage, dir, &self.options.filter)?;
        let candidates = classify::inspect_candidates(self.storage, directory, dir, &entries)?;
        let classification =
            classify::classify(candidates, device, self.options.legacy_firmware_floor)?;

        if classification.safety == FirmwareSafety::Dangerous {
            self.confirm_dangerous(operator, classification.firmware().version)?;
        }

        self.status.line("Verifying firmware files...");
        let peers = validate::select_peer_set(self.catalog, &classification)?;
        info!("Selected catalog set {}", peers.key());

        self.status.line("Getting region map...");
        validate::check_region(&peers, system.region()?)?;

        self.status.line("Getting hash map...");
        validate::check_completeness(&classification.candidates, &peers)?;

        self.status.line("Checking hashes...");
        validate::verify_hashes(
            self.storage,
            self.engine,
            &classification.candidates,
            &peers,
            self.progress,
            self.status,
        )?;
        self.status.line("Verified firmware files successfully!");

        let plan = build_plan(&classification.candidates, &installed, mode);
        info!("{} plan has {} of {} titles", mode, plan.len(), peers.len());
        Ok(plan)
    }

    /// Ask before installing legacy firmware on a new device; warning and
    /// answer both go to the status sink
    fn confirm_dangerous(&self, operator: &mut dyn Operator, version: TitleVersion) -> Result<()> {
        for line in DANGEROUS_FIRMWARE_QUESTION.lines() {
            self.status.error(line);
        }
        if operator.confirm(DANGEROUS_FIRMWARE_QUESTION)? {
            self.status
                .line(&format!("Continuing with legacy firmware v{} on a new device", version));
            Ok(())
        } else {
            self.status
                .line(&format!("Canceled legacy firmware v{} on a new device", version));
            Err(Error::DangerousCombination(format!(
                "operator declined to install legacy firmware v{} on a new device",
                version
            )))
        }
    }

    /// Run a resolved plan
    pub fn execute(
        &self,
        plan: &InstallPlan,
        directory: &mut dyn TitleDirectory,
    ) -> Result<ExecutionReport> {
        self.status.line("Installing firmware files...");
        execute::execute_plan(plan, self.storage, directory, self.progress, self.status)
    }

    /// Resolve and execute in one pass
    pub fn run<P>(
        &self,
        platform: &mut P,
        operator: &mut dyn Operator,
        mode: UpdateMode,
    ) -> Result<ExecutionReport>
    where
        P: TitleDirectory + SystemInfo,
    {
        let plan = self.resolve(&*platform, &*platform, operator, mode)?;
        self.execute(&plan, platform)
    }
}
