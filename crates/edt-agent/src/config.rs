//! Configuration loading and management.

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

use edt_core::TrackerConfig;

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the downstream telemetry CLI binary.
    pub cli_path: PathBuf,
    /// Host application identifier stamped on every record.
    pub app_name: String,
    /// Collector tag stamped on every event record.
    pub source: String,
    /// Workspace roots that documents resolve against.
    pub workspace_roots: Vec<PathBuf>,
    /// How long without activity before open sessions are flushed.
    pub idle_timeout_ms: u64,
    /// Minimum spacing between effective activity marks.
    pub min_activity_interval_ms: u64,
    /// Quiescence window for coalescing close requests.
    pub flush_debounce_ms: u64,
    /// Cadence of the heartbeat emitter.
    pub heartbeat_period_ms: u64,
    /// Quiescence window for notebook edit signals.
    pub notebook_edit_debounce_ms: u64,
    /// Cadence of the downstream sync trigger.
    pub sync_interval_ms: u64,
    /// Retry budget for a failed sync before giving up until the next tick.
    pub sync_max_retries: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cli_path: PathBuf::from("edt-cli"),
            app_name: "editor".to_string(),
            source: "edt-agent".to_string(),
            workspace_roots: Vec::new(),
            idle_timeout_ms: 60_000,
            min_activity_interval_ms: 2_000,
            flush_debounce_ms: 150,
            heartbeat_period_ms: 2_000,
            notebook_edit_debounce_ms: 3_000,
            sync_interval_ms: 60_000,
            sync_max_retries: 4,
        }
    }
}

impl Config {
    /// Loads configuration from default locations.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from(None)
    }

    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (EDT_*)
        figment = figment.merge(Env::prefixed("EDT_"));

        figment.extract()
    }

    /// The tracker construction parameters carried by this config.
    #[must_use]
    pub fn tracker_config(&self) -> TrackerConfig {
        TrackerConfig {
            app_name: self.app_name.clone(),
            source: self.source.clone(),
            idle_timeout: Duration::from_millis(self.idle_timeout_ms),
            min_activity_interval: Duration::from_millis(self.min_activity_interval_ms),
            flush_debounce: Duration::from_millis(self.flush_debounce_ms),
            heartbeat_period: Duration::from_millis(self.heartbeat_period_ms),
            notebook_edit_debounce: Duration::from_millis(self.notebook_edit_debounce_ms),
        }
    }

    /// Cadence of the downstream sync trigger.
    #[must_use]
    pub const fn sync_interval(&self) -> Duration {
        Duration::from_millis(self.sync_interval_ms)
    }
}

/// Returns the platform-specific config directory for edt.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("edt"))
}
