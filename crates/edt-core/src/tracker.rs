//! Session lifecycle store and activity marking.
//!
//! One [`Tracker`] instance owns all mutable aggregation state: the
//! entity-keyed session map, the flush bookkeeping, and the idle/heartbeat
//! gating timestamps. Handles are cheap to clone and share one store.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::category::Category;
use crate::clock::{Clock, SystemClock};
use crate::entity::normalize_entity;
use crate::signal::DocumentRef;
use crate::sink::Sink;

/// Timing and identity parameters, supplied at construction.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Host application identifier stamped on every record.
    pub app_name: String,
    /// Collector tag stamped on every event record.
    pub source: String,
    /// How long without an activity mark before all open sessions are flushed.
    pub idle_timeout: Duration,
    /// Minimum spacing between effective activity marks.
    pub min_activity_interval: Duration,
    /// Quiescence window for coalescing non-forced close requests.
    pub flush_debounce: Duration,
    /// Cadence of the heartbeat emitter.
    pub heartbeat_period: Duration,
    /// Quiescence window for notebook edit signals.
    pub notebook_edit_debounce: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            app_name: "editor".to_string(),
            source: "edt-agent".to_string(),
            idle_timeout: Duration::from_secs(60),
            min_activity_interval: Duration::from_secs(2),
            flush_debounce: Duration::from_millis(150),
            heartbeat_period: Duration::from_secs(2),
            notebook_edit_debounce: Duration::from_secs(3),
        }
    }
}

/// One open, uncommitted span of activity on one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedSession {
    /// When the span began. Immutable for the session's lifetime.
    pub start: DateTime<Utc>,
    /// Category assigned at open time.
    pub category: Category,
    /// Workspace root owning the entity.
    pub project: PathBuf,
}

/// Snapshot of the document the heartbeat emitter samples.
#[derive(Debug, Clone)]
pub(crate) struct ActiveDocument {
    pub(crate) entity: String,
    pub(crate) project: PathBuf,
    pub(crate) line_count: u32,
    pub(crate) cursor_offset: u32,
}

#[derive(Default)]
pub(crate) struct TrackerState {
    /// At most one open session per entity key.
    pub(crate) sessions: HashMap<String, TrackedSession>,
    /// The entity the user is currently working in.
    pub(crate) current_entity: Option<String>,
    pub(crate) active_document: Option<ActiveDocument>,
    /// Last effective activity mark; gates heartbeats and the mark rate limit.
    pub(crate) last_active: Option<DateTime<Utc>>,
    /// When the idle sweep fires unless a mark moves it.
    pub(crate) idle_deadline: Option<Instant>,
    /// Generation of the pending debounced close per entity.
    pub(crate) pending_flush: HashMap<String, u64>,
    /// Entities with a delivery outstanding.
    pub(crate) in_flight: HashSet<String>,
    pub(crate) next_generation: u64,
}

#[derive(Default)]
struct BackgroundTasks {
    idle: Option<JoinHandle<()>>,
    heartbeat: Option<JoinHandle<()>>,
}

pub(crate) struct Shared<S, C> {
    pub(crate) config: TrackerConfig,
    pub(crate) sink: S,
    pub(crate) clock: C,
    pub(crate) state: Mutex<TrackerState>,
    pub(crate) idle_notify: Notify,
    tasks: Mutex<BackgroundTasks>,
}

/// The aggregation core.
///
/// Converts `record_activity` calls into open sessions, closes them through
/// the flush coordinator, and runs the idle and heartbeat timers. Constructed
/// explicitly and passed through the call chain; there is no global instance.
pub struct Tracker<S, C = SystemClock> {
    pub(crate) shared: Arc<Shared<S, C>>,
}

impl<S, C> Clone for Tracker<S, C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S: Sink, C: Clock> Tracker<S, C> {
    /// Creates a tracker. Background timers start with [`Tracker::start`].
    pub fn new(config: TrackerConfig, sink: S, clock: C) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                sink,
                clock,
                state: Mutex::new(TrackerState::default()),
                idle_notify: Notify::new(),
                tasks: Mutex::new(BackgroundTasks::default()),
            }),
        }
    }

    /// The configuration this tracker was built with.
    pub fn config(&self) -> &TrackerConfig {
        &self.shared.config
    }

    /// Starts the idle detector and heartbeat emitter. Idempotent.
    pub async fn start(&self) {
        let mut tasks = self.shared.tasks.lock().await;
        if tasks.idle.is_some() {
            return;
        }
        tasks.idle = Some(self.spawn_idle_task());
        tasks.heartbeat = Some(self.spawn_heartbeat_task());
    }

    /// Starts or continues a tracked session for a document.
    ///
    /// - No open session for the entity: one opens with `start` = now.
    /// - Open session with the same category: the session continues; the call
    ///   still marks activity and refreshes the project in place.
    /// - Different category, or the current entity is switching: the
    ///   superseded session(s) are force-flushed first, then a fresh session
    ///   opens.
    ///
    /// A document with no resolvable project is skipped with a diagnostic;
    /// no session opens and no error propagates.
    pub async fn record_activity(
        &self,
        category: Category,
        document: &DocumentRef,
        project: Option<PathBuf>,
        is_write: bool,
    ) {
        let entity = normalize_entity(&document.path);
        let Some(project) = project else {
            tracing::warn!(entity = %entity, "skipping activity: no resolvable project");
            return;
        };

        let effective = self.mark_activity().await;

        let superseded: Vec<String> = {
            let state = self.shared.state.lock().await;
            let switching = state
                .current_entity
                .as_deref()
                .is_some_and(|current| current != entity);
            let category_changed = state
                .sessions
                .get(&entity)
                .is_some_and(|session| session.category != category);

            if switching || category_changed {
                state
                    .sessions
                    .keys()
                    .filter(|key| **key != entity || category_changed)
                    .cloned()
                    .collect()
            } else {
                Vec::new()
            }
        };
        for key in &superseded {
            self.close_entity(key, true).await;
        }

        {
            let mut state = self.shared.state.lock().await;
            let now = self.shared.clock.now();
            match state.sessions.entry(entity.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(TrackedSession {
                        start: now,
                        category,
                        project: project.clone(),
                    });
                }
                Entry::Occupied(mut slot) => {
                    let session = slot.get_mut();
                    if session.category == category {
                        if session.project != project {
                            session.project = project.clone();
                        }
                    } else {
                        // The old span could not be flushed because its
                        // delivery is still outstanding; the remainder is
                        // superseded in place.
                        tracing::debug!(entity = %entity, "replacing unflushed session");
                        *session = TrackedSession {
                            start: now,
                            category,
                            project: project.clone(),
                        };
                    }
                }
            }
            state.current_entity = Some(entity.clone());
            state.active_document = Some(ActiveDocument {
                entity,
                project,
                line_count: document.line_count,
                cursor_offset: document.cursor_offset,
            });
        }

        if effective || is_write {
            self.emit_heartbeat(is_write).await;
        }
    }

    /// Records the current moment as the user's last active one and pushes
    /// the idle deadline out.
    ///
    /// Marks inside the minimum interval of the previous effective mark do
    /// not refresh "last active" (so heartbeats stay rate-limited) but still
    /// reset the idle countdown. Returns whether the mark was effective.
    pub async fn mark_activity(&self) -> bool {
        let now = self.shared.clock.now();
        let min_interval = time_delta(self.shared.config.min_activity_interval);
        let mut state = self.shared.state.lock().await;
        let effective = state
            .last_active
            .is_none_or(|last| now.signed_duration_since(last) >= min_interval);
        if effective {
            state.last_active = Some(now);
        }
        state.idle_deadline = Some(Instant::now() + self.shared.config.idle_timeout);
        drop(state);
        self.shared.idle_notify.notify_one();
        effective
    }

    /// Forgets the current-entity pointer (focus left the editor).
    pub async fn clear_current_entity(&self) {
        self.shared.state.lock().await.current_entity = None;
    }

    /// Forgets the current-entity pointer and heartbeat snapshot if they
    /// refer to `entity` (the document was closed).
    pub async fn release_entity(&self, entity: &str) {
        let entity = normalize_entity(entity);
        let mut state = self.shared.state.lock().await;
        if state.current_entity.as_deref() == Some(entity.as_str()) {
            state.current_entity = None;
        }
        if state
            .active_document
            .as_ref()
            .is_some_and(|doc| doc.entity == entity)
        {
            state.active_document = None;
        }
    }

    /// Returns the open session for an entity, if any.
    pub async fn open_session(&self, entity: &str) -> Option<TrackedSession> {
        let entity = normalize_entity(entity);
        self.shared.state.lock().await.sessions.get(&entity).cloned()
    }

    /// Number of currently open sessions.
    pub async fn open_session_count(&self) -> usize {
        self.shared.state.lock().await.sessions.len()
    }

    /// Cancels the timers, invalidates pending debounced closes, and
    /// force-flushes every open session.
    ///
    /// Returns only after every delivery has completed, so callers can gate
    /// process exit on it.
    pub async fn shutdown(&self) {
        {
            let mut tasks = self.shared.tasks.lock().await;
            if let Some(handle) = tasks.idle.take() {
                handle.abort();
            }
            if let Some(handle) = tasks.heartbeat.take() {
                handle.abort();
            }
        }
        {
            let mut state = self.shared.state.lock().await;
            state.pending_flush.clear();
            state.idle_deadline = None;
        }
        self.flush_all(true).await;

        // Deliveries started by debounced flushes run to completion.
        loop {
            if self.shared.state.lock().await.in_flight.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

/// Converts a config interval into a chrono delta for timestamp math.
pub(crate) fn time_delta(duration: Duration) -> TimeDelta {
    TimeDelta::from_std(duration).unwrap_or(TimeDelta::MAX)
}
