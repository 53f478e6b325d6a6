//! End-to-end aggregation behavior: session lifecycle, debouncing,
//! single-flight delivery, idle detection, and heartbeat cadence, all driven
//! with a manual clock and paused tokio time.

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use edt_core::signal::Signal;
use edt_core::{
    Category, Clock, DocumentRef, EventRecord, HeartbeatRecord, ManualClock, Router, Sink, Tracker,
    TrackerConfig, WorkspaceResolver,
};

const PROJECT: &str = "/home/user/project";

#[derive(Debug)]
struct DeliveryRefused;

impl fmt::Display for DeliveryRefused {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("delivery refused")
    }
}

impl std::error::Error for DeliveryRefused {}

/// Sink that records everything it is handed, with optional latency and
/// injectable event failures.
#[derive(Clone, Default)]
struct RecordingSink {
    events: Arc<Mutex<Vec<EventRecord>>>,
    heartbeats: Arc<Mutex<Vec<HeartbeatRecord>>>,
    event_delay: Duration,
    fail_events: Arc<AtomicBool>,
}

impl RecordingSink {
    fn with_event_delay(delay: Duration) -> Self {
        Self {
            event_delay: delay,
            ..Self::default()
        }
    }

    fn events(&self) -> Vec<EventRecord> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn heartbeats(&self) -> Vec<HeartbeatRecord> {
        self.heartbeats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Sink for RecordingSink {
    type Error = DeliveryRefused;

    async fn deliver_event(&self, record: EventRecord) -> Result<(), DeliveryRefused> {
        if !self.event_delay.is_zero() {
            tokio::time::sleep(self.event_delay).await;
        }
        if self.fail_events.load(Ordering::Relaxed) {
            return Err(DeliveryRefused);
        }
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
        Ok(())
    }

    async fn deliver_heartbeat(&self, record: HeartbeatRecord) -> Result<(), DeliveryRefused> {
        self.heartbeats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
        Ok(())
    }
}

fn manual_clock() -> ManualClock {
    let start = DateTime::parse_from_rfc3339("2026-01-01T09:00:00Z")
        .unwrap()
        .with_timezone(&Utc);
    ManualClock::new(start)
}

fn doc(path: &str) -> DocumentRef {
    DocumentRef {
        path: path.to_string(),
        content_type: "rust".to_string(),
        line_count: 100,
        cursor_offset: 12,
    }
}

fn project() -> Option<PathBuf> {
    Some(PathBuf::from(PROJECT))
}

fn tracker(sink: &RecordingSink, clock: &ManualClock) -> Tracker<RecordingSink, ManualClock> {
    Tracker::new(TrackerConfig::default(), sink.clone(), clock.clone())
}

/// Lets spawned tasks and freshly woken timers run to completion.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

#[tokio::test(start_paused = true)]
async fn same_category_signals_deliver_one_span() {
    let sink = RecordingSink::default();
    let clock = manual_clock();
    let tracker = tracker(&sink, &clock);
    let file = doc("/home/user/project/src/main.rs");
    let t0 = clock.now();

    tracker
        .record_activity(Category::Coding, &file, project(), false)
        .await;
    for _ in 0..2 {
        clock.advance(TimeDelta::seconds(5));
        tracker
            .record_activity(Category::Coding, &file, project(), false)
            .await;
    }

    tracker.close_entity(&file.path, false).await;
    tokio::time::sleep(Duration::from_millis(300)).await;

    let events = sink.events();
    assert_eq!(events.len(), 1, "one contiguous span, delivered exactly once");
    assert_eq!(events[0].start, t0.timestamp());
    assert_eq!(events[0].end, (t0 + TimeDelta::seconds(10)).timestamp());
    assert_eq!(events[0].duration_secs, 10);
    assert_eq!(events[0].category, Category::Coding);
    assert_eq!(events[0].project, PathBuf::from(PROJECT));
    assert_eq!(tracker.open_session_count().await, 0);
}

#[tokio::test(start_paused = true)]
async fn category_switch_closes_cleanly() {
    let sink = RecordingSink::default();
    let clock = manual_clock();
    let tracker = tracker(&sink, &clock);
    let file = doc("/home/user/project/src/main.rs");
    let t0 = clock.now();

    tracker
        .record_activity(Category::Coding, &file, project(), false)
        .await;
    clock.advance(TimeDelta::seconds(30));
    tracker
        .record_activity(Category::Debugging, &file, project(), false)
        .await;

    let events = sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].category, Category::Coding);
    assert_eq!(events[0].duration_secs, 30);

    let session = tracker.open_session(&file.path).await.expect("new session");
    assert_eq!(session.category, Category::Debugging);
    assert_eq!(session.start, t0 + TimeDelta::seconds(30));
}

#[tokio::test(start_paused = true)]
async fn idle_timeout_flushes_open_sessions() {
    let sink = RecordingSink::default();
    let clock = manual_clock();
    let tracker = tracker(&sink, &clock);
    tracker.start().await;
    let file = doc("/home/user/project/src/main.rs");

    tracker
        .record_activity(Category::Coding, &file, project(), false)
        .await;

    clock.advance(TimeDelta::seconds(61));
    tokio::time::advance(Duration::from_secs(61)).await;
    settle().await;

    let events = sink.events();
    assert_eq!(events.len(), 1, "idle sweep delivers exactly one event");
    assert_eq!(events[0].duration_secs, 61);
    assert_eq!(tracker.open_session_count().await, 0);

    tracker.shutdown().await;
    assert_eq!(sink.events().len(), 1, "nothing left for the drain");
}

#[tokio::test(start_paused = true)]
async fn unattributed_entity_is_never_delivered() {
    let sink = RecordingSink::default();
    let clock = manual_clock();
    let tracker = tracker(&sink, &clock);
    let router = Router::new(tracker.clone(), WorkspaceResolver::default());

    for _ in 0..5 {
        router
            .handle(Signal::DocumentChanged {
                document: doc("/outside/any/workspace.rs"),
            })
            .await;
        clock.advance(TimeDelta::seconds(3));
    }
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(tracker.open_session_count().await, 0);
    assert!(sink.events().is_empty());
    assert!(sink.heartbeats().is_empty());
}

#[tokio::test(start_paused = true)]
async fn overlapping_closes_are_single_flight() {
    let sink = RecordingSink::with_event_delay(Duration::from_secs(5));
    let clock = manual_clock();
    let tracker = tracker(&sink, &clock);
    let file = doc("/home/user/project/src/main.rs");

    tracker
        .record_activity(Category::Coding, &file, project(), false)
        .await;
    clock.advance(TimeDelta::seconds(10));

    let second = tracker.clone();
    let path = file.path.clone();
    tokio::join!(tracker.close_entity(&file.path, true), async move {
        // Arrives while the first delivery is suspended in the sink.
        tokio::time::sleep(Duration::from_millis(1)).await;
        second.close_entity(&path, true).await;
    });

    assert_eq!(sink.events().len(), 1, "second close is suppressed");
}

#[tokio::test(start_paused = true)]
async fn rapid_closes_coalesce_into_one_delivery() {
    let sink = RecordingSink::default();
    let clock = manual_clock();
    let tracker = tracker(&sink, &clock);
    let file = doc("/home/user/project/src/main.rs");

    tracker
        .record_activity(Category::Coding, &file, project(), false)
        .await;
    clock.advance(TimeDelta::seconds(5));

    for _ in 0..3 {
        tracker.close_entity(&file.path, false).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    tokio::time::sleep(Duration::from_millis(500)).await;

    let events = sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].duration_secs, 5);
}

#[tokio::test(start_paused = true)]
async fn degenerate_session_is_discarded_not_delivered() {
    let sink = RecordingSink::default();
    let clock = manual_clock();
    let tracker = tracker(&sink, &clock);
    let file = doc("/home/user/project/src/main.rs");

    tracker
        .record_activity(Category::Coding, &file, project(), false)
        .await;
    tracker.close_entity(&file.path, false).await;
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert!(sink.events().is_empty());
    assert_eq!(tracker.open_session_count().await, 0, "discard removes the session");
}

#[tokio::test(start_paused = true)]
async fn shutdown_drains_every_open_session() {
    let sink = RecordingSink::default();
    let clock = manual_clock();
    let tracker = tracker(&sink, &clock);
    tracker.start().await;
    let first = doc("/home/user/project/src/a.rs");
    let second = doc("/home/user/project/src/b.rs");

    tracker
        .record_activity(Category::Coding, &first, project(), false)
        .await;
    clock.advance(TimeDelta::seconds(10));
    tracker
        .record_activity(Category::Coding, &second, project(), false)
        .await;
    clock.advance(TimeDelta::seconds(10));

    // Leave a debounce window in progress, then shut down before it elapses.
    tracker.close_entity(&second.path, false).await;
    tracker.shutdown().await;

    let events = sink.events();
    assert_eq!(events.len(), 2, "one delivery per entity");
    let mut entities: Vec<&str> = events.iter().map(|e| e.entity.as_str()).collect();
    entities.sort_unstable();
    assert_eq!(entities, vec!["/home/user/project/src/a.rs", "/home/user/project/src/b.rs"]);
    assert_eq!(tracker.open_session_count().await, 0);

    // The stale debounce waker must not produce a third delivery.
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(sink.events().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn delivery_failure_still_removes_session() {
    let sink = RecordingSink::default();
    let clock = manual_clock();
    let tracker = tracker(&sink, &clock);
    let file = doc("/home/user/project/src/main.rs");

    tracker
        .record_activity(Category::Coding, &file, project(), false)
        .await;
    clock.advance(TimeDelta::seconds(10));

    sink.fail_events.store(true, Ordering::Relaxed);
    tracker.close_entity(&file.path, true).await;

    assert!(sink.events().is_empty());
    assert_eq!(tracker.open_session_count().await, 0, "at-most-once per session");

    // Nothing is retried once the session is gone.
    sink.fail_events.store(false, Ordering::Relaxed);
    tracker.close_entity(&file.path, true).await;
    assert!(sink.events().is_empty());
}

#[tokio::test(start_paused = true)]
async fn activity_emits_rate_limited_heartbeats() {
    let sink = RecordingSink::default();
    let clock = manual_clock();
    let tracker = tracker(&sink, &clock);
    let file = doc("/home/user/project/src/main.rs");

    tracker
        .record_activity(Category::Coding, &file, project(), false)
        .await;
    assert_eq!(sink.heartbeats().len(), 1);
    assert!(!sink.heartbeats()[0].is_write);

    // Within the minimum activity interval: mark is ineffective, no sample.
    clock.advance(TimeDelta::milliseconds(500));
    tracker
        .record_activity(Category::Coding, &file, project(), false)
        .await;
    assert_eq!(sink.heartbeats().len(), 1);

    // A save always samples, rate limit or not.
    clock.advance(TimeDelta::milliseconds(100));
    tracker
        .record_activity(Category::Coding, &file, project(), true)
        .await;
    let heartbeats = sink.heartbeats();
    assert_eq!(heartbeats.len(), 2);
    assert!(heartbeats[1].is_write);
    assert_eq!(heartbeats[1].line_count, 100);
    assert_eq!(heartbeats[1].cursor_offset, 12);
}

#[tokio::test(start_paused = true)]
async fn heartbeat_cadence_stops_when_idle() {
    let sink = RecordingSink::default();
    let clock = manual_clock();
    let tracker = tracker(&sink, &clock);
    tracker.start().await;
    let file = doc("/home/user/project/src/main.rs");

    tracker
        .record_activity(Category::Coding, &file, project(), false)
        .await;
    settle().await;
    let while_active = sink.heartbeats().len();

    // Still within one heartbeat period of the last mark: ticks keep sampling.
    clock.advance(TimeDelta::seconds(2));
    tokio::time::advance(Duration::from_secs(2)).await;
    settle().await;
    assert!(
        sink.heartbeats().len() > while_active,
        "recent activity keeps the cadence alive"
    );

    // Far beyond the recency window: ticks emit nothing.
    clock.advance(TimeDelta::seconds(30));
    tokio::time::advance(Duration::from_secs(2)).await;
    settle().await;
    let when_idle = sink.heartbeats().len();
    tokio::time::advance(Duration::from_secs(6)).await;
    settle().await;
    assert_eq!(sink.heartbeats().len(), when_idle, "idle ticks are silent");
}

#[tokio::test(start_paused = true)]
async fn focus_switch_partitions_time_between_entities() {
    let sink = RecordingSink::default();
    let clock = manual_clock();
    let tracker = tracker(&sink, &clock);
    let resolver = WorkspaceResolver::new(vec![PathBuf::from(PROJECT)]);
    let router = Router::new(tracker.clone(), resolver);
    let first = doc("/home/user/project/src/a.rs");
    let second = doc("/home/user/project/src/b.rs");

    router
        .handle(Signal::DocumentChanged { document: first.clone() })
        .await;
    clock.advance(TimeDelta::seconds(5));
    router
        .handle(Signal::EditorFocusChanged {
            document: Some(second.clone()),
        })
        .await;
    tokio::time::sleep(Duration::from_millis(300)).await;

    let events = sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].entity, first.path);
    assert_eq!(events[0].duration_secs, 5);
    assert!(tracker.open_session(&second.path).await.is_some());
    assert!(tracker.open_session(&first.path).await.is_none());
}

#[tokio::test(start_paused = true)]
async fn closing_a_document_force_flushes_it() {
    let sink = RecordingSink::default();
    let clock = manual_clock();
    let tracker = tracker(&sink, &clock);
    let resolver = WorkspaceResolver::new(vec![PathBuf::from(PROJECT)]);
    let router = Router::new(tracker.clone(), resolver);
    let file = doc("/home/user/project/src/main.rs");

    router
        .handle(Signal::DocumentChanged { document: file.clone() })
        .await;
    clock.advance(TimeDelta::seconds(7));
    router
        .handle(Signal::DocumentClosed { document: file.clone() })
        .await;

    let events = sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].duration_secs, 7);
    assert_eq!(tracker.open_session_count().await, 0);
}

#[tokio::test(start_paused = true)]
async fn task_signals_classify_by_name() {
    let sink = RecordingSink::default();
    let clock = manual_clock();
    let tracker = tracker(&sink, &clock);
    let resolver = WorkspaceResolver::new(vec![PathBuf::from(PROJECT)]);
    let router = Router::new(tracker.clone(), resolver);
    let file = doc("/home/user/project/src/main.rs");

    router
        .handle(Signal::TaskStarted {
            task_name: "deploy to staging".to_string(),
            document: Some(file.clone()),
        })
        .await;
    assert_eq!(tracker.open_session_count().await, 0, "unmatched task names are ignored");

    router
        .handle(Signal::TaskStarted {
            task_name: "cargo build --release".to_string(),
            document: Some(file.clone()),
        })
        .await;
    let session = tracker.open_session(&file.path).await.expect("build task session");
    assert_eq!(session.category, Category::Compiling);
}

#[tokio::test(start_paused = true)]
async fn notebook_edits_coalesce_before_recording() {
    let sink = RecordingSink::default();
    let clock = manual_clock();
    let tracker = tracker(&sink, &clock);
    let resolver = WorkspaceResolver::new(vec![PathBuf::from(PROJECT)]);
    let router = Router::new(tracker.clone(), resolver);
    let notebook = DocumentRef {
        path: "/home/user/project/analysis.ipynb".to_string(),
        content_type: "jupyter".to_string(),
        line_count: 40,
        cursor_offset: 0,
    };

    for _ in 0..3 {
        router
            .handle(Signal::NotebookChanged {
                document: notebook.clone(),
                cell_executed: false,
            })
            .await;
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
    assert_eq!(
        tracker.open_session_count().await,
        0,
        "edits inside the window stay pending"
    );

    tokio::time::sleep(Duration::from_secs(4)).await;
    let session = tracker.open_session(&notebook.path).await.expect("debounced record");
    assert_eq!(session.category, Category::Coding);

    // A cell execution records immediately as compilation work.
    router
        .handle(Signal::NotebookChanged {
            document: notebook.clone(),
            cell_executed: true,
        })
        .await;
    let session = tracker.open_session(&notebook.path).await.expect("execution session");
    assert_eq!(session.category, Category::Compiling);
}
