// src/resolver/validate.rs

//! Catalog consistency and content verification
//!
//! After classification the candidate pool must match exactly one known-good
//! peer set: right region, every expected title present once, nothing extra,
//! and every file bit-for-bit identical to the catalog digest. Nothing is
//! installed unless all of this holds for the whole pool.

use super::classify::{Candidate, Classification};
use crate::catalog::{Catalog, PeerSet};
use crate::error::{Error, Result};
use crate::filesystem::{Storage, StorageOp};
use crate::hash::DigestEngine;
use crate::logging::StatusSink;
use crate::progress::ProgressTracker;
use crate::title::{Region, home_menu_regions};
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Select the peer set for a classified pool
pub fn select_peer_set(catalog: &Catalog, classification: &Classification) -> Result<PeerSet> {
    let firmware = classification.firmware();
    catalog.select(
        firmware.version,
        classification.firmware_device(),
        classification.candidates.iter().map(|c| c.title_id),
    )
}

/// The selected home menu must be built for the device's region
pub fn check_region(peers: &PeerSet, region: Region) -> Result<()> {
    let home_menu = peers.key().home_menu;
    match home_menu_regions(home_menu) {
        Some(regions) if regions.contains(&region) => Ok(()),
        Some(_) => Err(Error::RegionMismatch { home_menu, region }),
        None => {
            warn!(
                "Home menu {} has no known region; skipping region check",
                home_menu
            );
            Ok(())
        }
    }
}

/// The pool must hold each title of the peer set exactly once
pub fn check_completeness(candidates: &[Candidate], peers: &PeerSet) -> Result<()> {
    let found = candidates.len();
    let expected = peers.len();
    if found > expected {
        return Err(Error::TooManyTitles { found, expected });
    }
    if found < expected {
        return Err(Error::TooFewTitles { found, expected });
    }

    let distinct: BTreeSet<_> = candidates.iter().map(|c| c.title_id).collect();
    if distinct.len() != found {
        debug!("Update directory holds duplicate title ids");
        return Err(Error::TooManyTitles { found, expected });
    }
    Ok(())
}

/// Hash every candidate and compare it with the peer set
///
/// Each verified title is reported as `<id>  Verified`. The first mismatch
/// aborts the pass.
pub fn verify_hashes(
    storage: &dyn Storage,
    engine: &dyn DigestEngine,
    candidates: &[Candidate],
    peers: &PeerSet,
    progress: &dyn ProgressTracker,
    status: &dyn StatusSink,
) -> Result<()> {
    for candidate in candidates {
        let size = storage.size(&candidate.path)?;
        let mut package = storage.open_read(&candidate.path)?;

        progress.set_position(0);
        progress.set_message(&candidate.name);
        let actual = engine
            .digest(&mut package, size, progress)
            .map_err(|e| Error::storage(StorageOp::Read, candidate.path.as_str(), e))?;

        let expected = peers.get(candidate.title_id).copied();
        if expected != Some(actual) {
            progress.finish_with_error("hash mismatch");
            return Err(Error::HashMismatch {
                title: candidate.title_id,
                file: candidate.name.clone(),
                expected,
                actual,
            });
        }
        status.line(&format!("{}  Verified", candidate.title_id));
    }
    progress.finish_with_message("verified");
    Ok(())
}
