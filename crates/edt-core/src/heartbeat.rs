//! Heartbeat emission: liveness samples independent of session boundaries.

use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};

use crate::clock::Clock;
use crate::entity::EntityType;
use crate::record::HeartbeatRecord;
use crate::sink::Sink;
use crate::tracker::{Tracker, time_delta};

impl<S: Sink, C: Clock> Tracker<S, C> {
    /// Runs the fixed-cadence heartbeat loop.
    ///
    /// A tick emits one sample for the active document iff the last effective
    /// activity mark is within one heartbeat period; an idle user produces
    /// nothing.
    pub(crate) fn spawn_heartbeat_task(&self) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            let period = this.shared.config.heartbeat_period;
            let recency = time_delta(period);
            let mut ticks = interval(period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticks.tick().await;
                let recent = {
                    let state = this.shared.state.lock().await;
                    state.last_active.is_some_and(|last| {
                        this.shared.clock.now().signed_duration_since(last) <= recency
                    })
                };
                if recent {
                    this.emit_heartbeat(false).await;
                }
            }
        })
    }

    /// Builds and delivers one heartbeat for the active document.
    ///
    /// No-op when no document is active. Failures are logged and dropped;
    /// heartbeats have no lifecycle to retry.
    pub(crate) async fn emit_heartbeat(&self, is_write: bool) {
        let record = {
            let state = self.shared.state.lock().await;
            let Some(doc) = &state.active_document else {
                return;
            };
            HeartbeatRecord {
                project: doc.project.clone(),
                timestamp: self.shared.clock.now().timestamp(),
                entity: doc.entity.clone(),
                entity_type: EntityType::File,
                app: self.shared.config.app_name.clone(),
                line_count: doc.line_count,
                cursor_offset: doc.cursor_offset,
                is_write,
            }
        };

        if let Err(error) = self.shared.sink.deliver_heartbeat(record).await {
            tracing::warn!(error = %error, "heartbeat delivery failed");
        }
    }
}
