//! Editor telemetry agent library.
//!
//! This crate provides the CLI interface for the telemetry agent.

mod cli;
pub mod commands;
mod config;
pub mod sink;
pub mod sync;

pub use cli::{Cli, Commands};
pub use config::Config;
