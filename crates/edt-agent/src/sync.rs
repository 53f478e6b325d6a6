//! Periodic trigger for the downstream CLI's telemetry sync.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::sink::CliSink;

/// Exponential backoff for failed sync attempts.
#[must_use]
pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(2u64.saturating_pow(attempt))
}

/// Invokes the downstream `sync` subcommand on a fixed cadence.
///
/// A failed attempt retries with exponential backoff up to the retry budget,
/// then gives up until the next tick. Storage and transport of the synced
/// data are entirely the downstream CLI's concern.
pub struct SyncScheduler {
    sink: CliSink,
    period: Duration,
    max_retries: u32,
}

impl SyncScheduler {
    #[must_use]
    pub const fn new(sink: CliSink, period: Duration, max_retries: u32) -> Self {
        Self {
            sink,
            period,
            max_retries,
        }
    }

    /// Spawns the recurring sync loop.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticks = time::interval(self.period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick fires immediately; syncing belongs one period in.
            ticks.tick().await;
            loop {
                ticks.tick().await;
                self.sync_with_retries().await;
            }
        })
    }

    async fn sync_with_retries(&self) {
        for attempt in 0..=self.max_retries {
            match self.sink.sync().await {
                Ok(()) => {
                    if attempt > 0 {
                        tracing::debug!(attempt, "sync recovered after retry");
                    }
                    return;
                }
                Err(error) if attempt == self.max_retries => {
                    tracing::error!(error = %error, "sync failed; max retries reached");
                }
                Err(error) => {
                    let delay = backoff_delay(attempt + 1);
                    tracing::warn!(
                        error = %error,
                        retry_in_secs = delay.as_secs(),
                        "sync failed; retrying"
                    );
                    time::sleep(delay).await;
                }
            }
        }
    }
}
