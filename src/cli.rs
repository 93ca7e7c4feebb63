// src/cli.rs
//! CLI definitions for sysupdater
//!
//! Without a subcommand the interactive menu runs, exactly as on the
//! console. The other subcommands run one mode directly or inspect the
//! update set without touching the title directory.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use sysupdater::UpdateMode;

#[derive(Parser)]
#[command(name = "sysupdater")]
#[command(author = "sysUpdater Contributors")]
#[command(version)]
#[command(about = "Offline system-title installer with catalog verification", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Args, Clone, Debug, Default)]
pub struct GlobalArgs {
    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Storage root holding the update directory
    #[arg(short, long, global = true)]
    pub root: Option<PathBuf>,

    /// Catalog of known-good firmware sets
    #[arg(long, global = true)]
    pub catalog: Option<PathBuf>,

    /// Simulated console state file
    #[arg(long, global = true)]
    pub console: Option<PathBuf>,

    /// Seconds to wait before restarting after success
    #[arg(long, global = true)]
    pub reboot_delay: Option<u64>,

    /// Log progress through tracing instead of drawing bars
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Interactive menu: (a) update, (y) downgrade, (x) self-test, (b) exit
    Menu,

    /// Install every newer title from the update directory
    Update,

    /// Replace every title whose version differs from the update directory
    Downgrade,

    /// Verify the update directory and print the install plan
    Plan {
        /// Resolution mode
        #[arg(short, long, default_value = "upgrade")]
        mode: UpdateMode,
    },

    /// Check privileged package-manager access, then restart
    SelfTest,

    /// List the firmware sets in the catalog
    Catalog,
}
