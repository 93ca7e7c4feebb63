// src/main.rs

use anyhow::Result;
use clap::Parser;
use sysupdater::UpdateMode;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let global = &cli.global;

    match cli.command {
        None | Some(Commands::Menu) => commands::cmd_menu(global),
        Some(Commands::Update) => commands::cmd_update(global, UpdateMode::Upgrade),
        Some(Commands::Downgrade) => commands::cmd_update(global, UpdateMode::Downgrade),
        Some(Commands::Plan { mode }) => commands::cmd_plan(global, mode),
        Some(Commands::SelfTest) => commands::cmd_self_test(global),
        Some(Commands::Catalog) => commands::cmd_catalog(global),
    }
}
