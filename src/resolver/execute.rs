// src/resolver/execute.rs

//! Plan execution
//!
//! Entries run once, in plan order, on the calling thread. A failure stops
//! the plan where it is; steps already taken stay in place.

use super::plan::InstallPlan;
use crate::error::{Error, Result};
use crate::filesystem::Storage;
use crate::logging::StatusSink;
use crate::platform::TitleDirectory;
use crate::progress::ProgressTracker;
use crate::title::TitleId;
use tracing::{debug, info};

/// What a plan run changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionReport {
    pub deleted: Vec<TitleId>,
    pub installed: Vec<TitleId>,
    /// Base firmware committed during the run
    pub committed: Option<TitleId>,
}

impl ExecutionReport {
    pub fn is_empty(&self) -> bool {
        self.deleted.is_empty() && self.installed.is_empty() && self.committed.is_none()
    }
}

/// Run every plan entry in order
pub fn execute_plan(
    plan: &InstallPlan,
    storage: &dyn Storage,
    directory: &mut dyn TitleDirectory,
    progress: &dyn ProgressTracker,
    status: &dyn StatusSink,
) -> Result<ExecutionReport> {
    let mut report = ExecutionReport::default();
    info!("Executing {} plan with {} entries", plan.mode(), plan.len());

    for entry in plan.entries() {
        let title = entry.title_id();
        let native_firm = title.is_native_firmware();
        if native_firm {
            status.line(&format!("NATIVE_FIRM ({})", title));
        } else {
            status.line(&title.to_string());
        }

        if entry.requires_prior_delete {
            debug!("Deleting installed {} before downgrade", title);
            directory
                .delete_title(title)
                .map_err(|e| Error::DeleteFailed {
                    title,
                    reason: e.to_string(),
                })?;
            report.deleted.push(title);
        }

        let size = storage.size(&entry.candidate.path)?;
        let mut package = storage.open_read(&entry.candidate.path)?;
        progress.set_position(0);
        progress.set_message(&entry.candidate.name);
        directory
            .install_package(package.as_mut(), size, progress)
            .map_err(|e| Error::InstallFailed {
                title,
                reason: e.to_string(),
            })?;
        report.installed.push(title);

        if native_firm {
            directory
                .commit_firmware(title)
                .map_err(|e| Error::FirmwareCommitFailed {
                    title,
                    reason: e.to_string(),
                })?;
            report.committed = Some(title);
        }

        status.line(&format!("{}  Installed", title));
    }

    progress.finish_with_message("installed");
    Ok(report)
}
