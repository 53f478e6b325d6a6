//! Flush coordination: debounced, single-flight closing of sessions.

use tokio::time::sleep;

use crate::clock::Clock;
use crate::entity::{EntityType, normalize_entity};
use crate::record::EventRecord;
use crate::sink::Sink;
use crate::tracker::Tracker;

impl<S: Sink, C: Clock> Tracker<S, C> {
    /// Finalizes the entity's open session, if any.
    ///
    /// Non-forced closes are scheduled after the debounce window; a newer
    /// close request for the same entity within the window supersedes the
    /// pending one, so rapid toggling coalesces into one delivery. Forced
    /// closes execute immediately and deliver even a zero-length span.
    ///
    /// While a delivery for the entity is outstanding, any further close is
    /// a no-op until it completes (single-flight).
    pub async fn close_entity(&self, entity: &str, force: bool) {
        let entity = normalize_entity(entity);

        if force {
            self.shared.state.lock().await.pending_flush.remove(&entity);
            self.perform_flush(&entity, true).await;
            return;
        }

        let generation = {
            let mut state = self.shared.state.lock().await;
            if !state.sessions.contains_key(&entity) {
                return;
            }
            let generation = state.next_generation;
            state.next_generation += 1;
            state.pending_flush.insert(entity.clone(), generation);
            generation
        };

        let this = self.clone();
        let delay = self.shared.config.flush_debounce;
        tokio::spawn(async move {
            sleep(delay).await;
            let still_pending = {
                let mut state = this.shared.state.lock().await;
                if state.pending_flush.get(&entity) == Some(&generation) {
                    state.pending_flush.remove(&entity);
                    true
                } else {
                    // Superseded by a newer close request or a forced flush.
                    false
                }
            };
            if still_pending {
                this.perform_flush(&entity, false).await;
            }
        });
    }

    /// Closes every open session. The idle sweep and shutdown drain use
    /// `force = true` to bypass debouncing.
    pub async fn flush_all(&self, force: bool) {
        let entities: Vec<String> = {
            let state = self.shared.state.lock().await;
            state.sessions.keys().cloned().collect()
        };
        for entity in entities {
            self.close_entity(&entity, force).await;
        }
    }

    /// Removes the session, computes its final duration, and hands it to the
    /// sink. At-most-once: the session is gone from the store whether or not
    /// delivery succeeds.
    pub(crate) async fn perform_flush(&self, entity: &str, force: bool) {
        let record = {
            let mut state = self.shared.state.lock().await;
            if state.in_flight.contains(entity) {
                tracing::debug!(entity = %entity, "flush already in flight");
                return;
            }
            let Some(session) = state.sessions.remove(entity) else {
                return;
            };

            let end = self.shared.clock.now();
            let duration = end.signed_duration_since(session.start).num_seconds();
            if !force && duration <= 0 {
                tracing::debug!(entity = %entity, "discarding degenerate session");
                return;
            }

            state.in_flight.insert(entity.to_string());
            EventRecord {
                start: session.start.timestamp(),
                end: end.timestamp(),
                category: session.category,
                app: self.shared.config.app_name.clone(),
                entity: entity.to_string(),
                entity_type: EntityType::File,
                duration_secs: u64::try_from(duration.max(0)).unwrap_or(0),
                source: self.shared.config.source.clone(),
                project: session.project,
            }
        };

        let category = record.category;
        let duration = record.duration_secs;
        match self.shared.sink.deliver_event(record).await {
            Ok(()) => {
                tracing::info!(
                    entity = %entity,
                    category = %category,
                    duration_secs = duration,
                    "flushed event"
                );
            }
            Err(error) => {
                tracing::warn!(entity = %entity, error = %error, "event delivery failed; record dropped");
            }
        }

        self.shared.state.lock().await.in_flight.remove(entity);
    }
}
