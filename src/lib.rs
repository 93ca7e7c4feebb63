// src/lib.rs

//! sysUpdater
//!
//! Offline system-title installer for a handheld console. Takes a complete
//! firmware set from removable storage, checks it against a catalog of
//! known-good sets, and installs it in dependency order.
//!
//! # Architecture
//!
//! - Verify before write: classification, catalog selection, region,
//!   completeness and hash checks all pass before the first title is touched
//! - Ordered install: base firmware and system modules first when moving up,
//!   last when moving down
//! - Platform traits: storage, the title directory and host control sit
//!   behind traits, with a simulated console for the CLI and tests
//! - Status lines go to the terminal and to an append-only log on the medium

pub mod catalog;
pub mod config;
mod error;
pub mod filesystem;
pub mod hash;
pub mod logging;
pub mod platform;
pub mod progress;
pub mod prompt;
pub mod resolver;
pub mod session;
pub mod title;

pub use catalog::{Catalog, CatalogKey, PeerSet, SetKey};
pub use config::UpdaterConfig;
pub use error::{Error, ErrorKind, Result, UnsafeReason};
pub use filesystem::{HostStorage, NameFilter, Storage};
pub use hash::{Digest, DigestEngine, Sha256Engine};
pub use logging::{MemoryLog, StatusLog, StatusSink};
pub use platform::{
    AccessGrant, HostControl, InstalledTitle, PackageInfo, Platform, SimulatedConsole,
    SystemInfo, TitleDirectory,
};
pub use progress::{CallbackProgress, LogProgress, ProgressEvent, ProgressTracker, SilentProgress};
pub use prompt::{Command, Operator, ScriptedOperator, TerminalOperator};
pub use resolver::{
    ExecutionReport, InstallPlan, PlanEntry, ResolverOptions, UpdateMode, UpdateResolver,
};
pub use session::{Session, SessionOutcome};
pub use title::{DeviceClass, Region, TitleId, TitleType, TitleVersion};
