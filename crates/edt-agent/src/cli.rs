//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Editor activity telemetry agent.
///
/// Consumes editor signals on stdin and aggregates them into activity events
/// and heartbeats delivered to the downstream telemetry CLI.
#[derive(Debug, Parser)]
#[command(name = "edt", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Track editor signals from stdin until EOF or interrupt.
    Run,

    /// Trigger one sync of the downstream telemetry store.
    Sync,
}
