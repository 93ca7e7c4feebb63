// src/commands/mod.rs
//! Command handlers for the sysupdater CLI

pub mod progress;

use crate::cli::GlobalArgs;
use anyhow::{Context, Result};
use progress::CliProgress;
use std::time::Duration;
use sysupdater::prompt::{Command, TerminalOperator};
use sysupdater::title::home_menu_regions;
use sysupdater::{
    Catalog, HostStorage, InstallPlan, LogProgress, ProgressTracker, Sha256Engine,
    SimulatedConsole, StatusLog, UpdateMode, UpdateResolver, UpdaterConfig,
};
use sysupdater::session::{Session, SessionOutcome};
use tracing::debug;

/// Configuration file plus command-line overrides
pub fn load_config(global: &GlobalArgs) -> Result<UpdaterConfig> {
    let mut config = UpdaterConfig::load_or_default(global.config.as_deref())?;
    if let Some(root) = &global.root {
        config.storage_root = root.clone();
    }
    if let Some(catalog) = &global.catalog {
        config.catalog = catalog.clone();
    }
    if let Some(console) = &global.console {
        config.platform_state = console.clone();
    }
    if let Some(delay) = global.reboot_delay {
        config.reboot_delay_secs = delay;
    }
    debug!("Effective configuration: {:?}", config);
    Ok(config)
}

/// Everything a resolver borrows, owned for the duration of one command
struct Workspace {
    config: UpdaterConfig,
    storage: HostStorage,
    catalog: Catalog,
    engine: Sha256Engine,
    progress: Box<dyn ProgressTracker>,
    status: StatusLog,
}

impl Workspace {
    /// `with_log` mirrors status lines to the log file on the medium
    fn open(global: &GlobalArgs, with_log: bool) -> Result<Self> {
        let config = load_config(global)?;
        let catalog_path = config.catalog_path();
        let catalog = Catalog::load(&catalog_path)
            .with_context(|| format!("Failed to load catalog {}", catalog_path.display()))?;

        let status = if with_log {
            StatusLog::open(&config.log_path()?)
        } else {
            StatusLog::console_only()
        };
        // --quiet trades the bars for periodic tracing lines
        let progress: Box<dyn ProgressTracker> = if global.quiet {
            Box::new(LogProgress::new("progress", 0))
        } else {
            Box::new(CliProgress::new())
        };

        Ok(Self {
            storage: HostStorage::new(&config.storage_root),
            engine: Sha256Engine::with_block_size(config.hash_block_size),
            catalog,
            progress,
            status,
            config,
        })
    }

    fn resolver(&self) -> UpdateResolver<'_> {
        UpdateResolver::new(
            &self.storage,
            &self.catalog,
            &self.engine,
            self.progress.as_ref(),
            &self.status,
        )
        .with_options(self.config.resolver_options())
    }

    fn console(&self) -> Result<SimulatedConsole> {
        let path = self.config.console_path();
        SimulatedConsole::load(&path)
            .with_context(|| format!("Failed to open console state {}", path.display()))
    }

    fn reboot_delay(&self) -> Duration {
        self.config.reboot_delay()
    }
}

fn finish(outcome: SessionOutcome) -> Result<()> {
    match outcome {
        SessionOutcome::Failed(kind) => Err(anyhow::anyhow!("Session failed: {}", kind)),
        SessionOutcome::Exited | SessionOutcome::Restarted(_) => Ok(()),
    }
}

/// Interactive menu session
pub fn cmd_menu(global: &GlobalArgs) -> Result<()> {
    let workspace = Workspace::open(global, true)?;
    let mut console = workspace.console()?;
    let resolver = workspace.resolver();
    let mut operator = TerminalOperator::stdin();

    let outcome = Session::new(&mut console, &resolver, &workspace.status)
        .with_reboot_delay(workspace.reboot_delay())
        .run(&mut operator)?;
    finish(outcome)
}

/// Run one mode directly, as if its menu key had been pressed
pub fn cmd_update(global: &GlobalArgs, mode: UpdateMode) -> Result<()> {
    let workspace = Workspace::open(global, true)?;
    let mut console = workspace.console()?;
    let resolver = workspace.resolver();
    let mut operator = TerminalOperator::stdin();

    let mut session = Session::new(&mut console, &resolver, &workspace.status)
        .with_reboot_delay(workspace.reboot_delay());
    match session.update(&mut operator, mode) {
        Ok(report) => {
            println!(
                "{} complete: {} installed, {} deleted",
                mode,
                report.installed.len(),
                report.deleted.len()
            );
            Ok(())
        }
        Err(err) => {
            session.report_error(&err);
            Err(err.into())
        }
    }
}

/// Self-test: privileged-access check only
pub fn cmd_self_test(global: &GlobalArgs) -> Result<()> {
    let workspace = Workspace::open(global, true)?;
    let mut console = workspace.console()?;
    let resolver = workspace.resolver();

    let outcome = Session::new(&mut console, &resolver, &workspace.status)
        .with_reboot_delay(workspace.reboot_delay())
        .dispatch(Command::SelfTest, &mut TerminalOperator::stdin())?;
    finish(outcome)
}

/// Verify the update directory and print the plan without installing
pub fn cmd_plan(global: &GlobalArgs, mode: UpdateMode) -> Result<()> {
    let workspace = Workspace::open(global, false)?;
    let console = workspace.console()?;
    let resolver = workspace.resolver();
    let mut operator = TerminalOperator::stdin();

    let plan = resolver.resolve(&console, &console, &mut operator, mode)?;
    print_plan(&plan);
    Ok(())
}

fn print_plan(plan: &InstallPlan) {
    if plan.is_empty() {
        println!("Nothing to {}: every title is already at the target version", plan.mode());
        return;
    }

    println!("{} plan ({} titles, {} bytes):", plan.mode(), plan.len(), plan.total_size());
    for (index, entry) in plan.entries().iter().enumerate() {
        let delete = if entry.requires_prior_delete {
            "  [delete first]"
        } else {
            ""
        };
        println!(
            "  {:>2}. {}  v{:<5} ({:>6})  {}{}",
            index + 1,
            entry.title_id(),
            entry.candidate.version,
            entry.delta.to_string(),
            entry.candidate.name,
            delete
        );
    }
}

/// List the firmware sets in the catalog
pub fn cmd_catalog(global: &GlobalArgs) -> Result<()> {
    let config = load_config(global)?;
    let path = config.catalog_path();
    let catalog = Catalog::load(&path)
        .with_context(|| format!("Failed to load catalog {}", path.display()))?;

    if catalog.is_empty() {
        println!("Catalog {} is empty", path.display());
        return Ok(());
    }

    println!("Catalog {}:", path.display());
    for key in catalog.sets() {
        let regions = home_menu_regions(key.home_menu)
            .map(|regions| {
                regions
                    .iter()
                    .map(|r| r.to_string())
                    .collect::<Vec<_>>()
                    .join("/")
            })
            .unwrap_or_else(|| "unknown region".to_string());
        let titles = catalog.peer_set(key).map(|set| set.len()).unwrap_or(0);
        println!("  {}  [{}]  {} titles", key, regions, titles);
    }
    Ok(())
}
