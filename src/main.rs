//! padbridge CLI
//!
//! Lists bindable controllers, runs the pad dispatcher from a config file and
//! drives rumble tests.

use anyhow::Result;
use clap::Parser;
use tracing::info;

use padbridge::PadbridgeConfig;

// CLI definitions
mod cli;
use cli::{Cli, Commands};

// Command handlers
mod commands;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config_path = cli.config.unwrap_or_else(PadbridgeConfig::default_path);

    match cli.command {
        Commands::List { json } => commands::list::list(json),
        Commands::Run { interval } => {
            info!("Loading config from {:?}", config_path);
            let config = PadbridgeConfig::load(&config_path)?;
            commands::run::run(config, interval)
        }
        Commands::Rumble {
            slot,
            large,
            small,
            duration,
        } => {
            let config = PadbridgeConfig::load(&config_path)?;
            commands::rumble::rumble(config, slot, large, small, duration)
        }
        Commands::Config { save } => commands::config::show(&config_path, save),
    }
}
