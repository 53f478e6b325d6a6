//! Finished telemetry records handed to the delivery adapter.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::category::Category;
use crate::entity::EntityType;

/// A closed activity span: one entity, one category, one contiguous stretch
/// of time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Span start, unix seconds.
    pub start: i64,
    /// Span end, unix seconds.
    pub end: i64,
    /// Activity category assigned at session open.
    pub category: Category,
    /// Host application identifier (e.g. the editor's name).
    pub app: String,
    /// Canonical entity key.
    pub entity: String,
    /// Kind of tracked resource.
    pub entity_type: EntityType,
    /// Span length in whole seconds, never negative.
    pub duration_secs: u64,
    /// Collector tag identifying where the record came from.
    pub source: String,
    /// Workspace root the entity belongs to.
    pub project: PathBuf,
}

/// A point-in-time liveness sample for the active document.
///
/// Heartbeats have no lifecycle: they are produced and delivered immediately,
/// independent of session boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatRecord {
    /// Workspace root the entity belongs to.
    pub project: PathBuf,
    /// Sample time, unix seconds.
    pub timestamp: i64,
    /// Canonical entity key.
    pub entity: String,
    /// Kind of tracked resource.
    pub entity_type: EntityType,
    /// Host application identifier.
    pub app: String,
    /// Document size in lines at sample time.
    pub line_count: u32,
    /// Cursor offset at sample time.
    pub cursor_offset: u32,
    /// Whether the sample was triggered by a save rather than an edit.
    pub is_write: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_record_roundtrip() {
        let record = EventRecord {
            start: 1_700_000_000,
            end: 1_700_000_090,
            category: Category::Coding,
            app: "editor".to_string(),
            entity: "/home/user/project/src/main.rs".to_string(),
            entity_type: EntityType::File,
            duration_secs: 90,
            source: "edt-agent".to_string(),
            project: PathBuf::from("/home/user/project"),
        };

        let json = serde_json::to_string(&record).unwrap();
        let parsed: EventRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn heartbeat_record_roundtrip() {
        let record = HeartbeatRecord {
            project: PathBuf::from("/home/user/project"),
            timestamp: 1_700_000_000,
            entity: "/home/user/project/src/main.rs".to_string(),
            entity_type: EntityType::File,
            app: "editor".to_string(),
            line_count: 120,
            cursor_offset: 17,
            is_write: true,
        };

        let json = serde_json::to_string(&record).unwrap();
        let parsed: HeartbeatRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, record);
    }
}
