//! The delivery boundary between the aggregation core and the downstream
//! persistence layer.

use std::future::Future;

use crate::record::{EventRecord, HeartbeatRecord};

/// Accepts finished telemetry records for transport/persistence.
///
/// The core treats every call as fire-and-forget with respect to its own
/// state: a session is already removed from the store when its record is
/// handed over, and a failed delivery is logged and dropped rather than
/// retried. Retry and backoff, if any, belong to the sink implementation.
pub trait Sink: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Delivers a closed activity span.
    fn deliver_event(
        &self,
        record: EventRecord,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Delivers a liveness sample.
    fn deliver_heartbeat(
        &self,
        record: HeartbeatRecord,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;
}
