//! Linewatch CLI
//!
//! Commands:
//! - `linewatch run` - Poll the feed on a fixed interval until stopped
//! - `linewatch once` - Run a single cycle
//! - `linewatch prune` - Drop notified identifiers for past games
//! - `linewatch check-config` - Load and validate configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// NBA sportsbook line movement monitor
#[derive(Parser, Debug)]
#[command(name = "linewatch")]
#[command(author, version, about = "Reverse line movement and sharp money alerts for NBA markets")]
pub struct Cli {
    /// Directory holding default.toml and environment overrides
    #[arg(long, global = true, env = "LINEWATCH_CONFIG_DIR", default_value = "config")]
    pub config_dir: PathBuf,

    /// Log alerts instead of sending them
    #[arg(long, global = true)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Poll the feed on a fixed interval until Ctrl+C / SIGTERM
    Run,

    /// Run a single monitoring cycle and exit
    Once,

    /// Drop notified identifiers whose game already started
    Prune,

    /// Load configuration and report every problem found
    CheckConfig,
}
