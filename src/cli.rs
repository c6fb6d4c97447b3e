// CLI definitions using clap

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "padbridge")]
#[command(author, version, about = "Game-controller input bridge")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Config file path (default: ~/.config/padbridge/pads.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List devices every backend can bind
    #[command(visible_aliases = ["ls", "l"])]
    List {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Poll configured pads until Ctrl+C
    Run {
        /// Interval between pad snapshots in milliseconds
        #[arg(long, default_value = "1000")]
        interval: u64,
    },

    /// Short rumble test on one pad slot
    Rumble {
        /// Pad slot (0-6)
        slot: usize,

        /// Large motor speed (0-255)
        large: u8,

        /// Small motor on/off
        #[arg(action = clap::ArgAction::Set)]
        small: bool,

        /// Rumble duration in milliseconds
        #[arg(long, default_value = "1000")]
        duration: u64,
    },

    /// Print the effective configuration as TOML
    #[command(visible_alias = "cfg")]
    Config {
        /// Write the effective configuration back to the config file
        #[arg(long)]
        save: bool,
    },
}
