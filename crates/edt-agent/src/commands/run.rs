//! The `run` command: feeds editor signals from stdin into the tracker.
//!
//! The host editor extension pipes one JSON signal per line. On EOF or
//! interrupt the timers are canceled, every open session is drained, and a
//! final sync is triggered before exit.

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};

use edt_core::{Router, Signal, SystemClock, Tracker, WorkspaceResolver};

use crate::Config;
use crate::sink::CliSink;
use crate::sync::SyncScheduler;

pub async fn run(config: &Config) -> Result<()> {
    let sink = CliSink::new(config.cli_path.clone());
    let tracker = Tracker::new(config.tracker_config(), sink.clone(), SystemClock);
    tracker.start().await;
    let router = Router::new(
        tracker.clone(),
        WorkspaceResolver::new(config.workspace_roots.clone()),
    );

    let syncer = SyncScheduler::new(sink.clone(), config.sync_interval(), config.sync_max_retries)
        .spawn();

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read signal from stdin")? else {
                    tracing::debug!("signal stream closed");
                    break;
                };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str::<Signal>(line) {
                    Ok(signal) => router.handle(signal).await,
                    Err(error) => {
                        tracing::warn!(error = %error, "skipping malformed signal line");
                    }
                }
            }
            _ = &mut ctrl_c => {
                tracing::debug!("interrupt received");
                break;
            }
        }
    }

    // New work must stop scheduling before the drain.
    syncer.abort();
    tracker.shutdown().await;

    match sink.sync().await {
        Ok(()) => tracing::info!("final sync completed"),
        Err(error) => tracing::error!(error = %error, "final sync failed"),
    }

    Ok(())
}
