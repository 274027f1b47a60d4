//! Wire-shaped progress events (spec §4.5, §6.3).
//!
//! The enum itself is the in-process pub-sub payload; [`ProgressEvent::to_frame`]
//! renders the exact WebSocket JSON frame shape from spec §6.3. Keeping the
//! two concerns in one type (rather than a separate wire DTO per event)
//! matches the teacher's event-emitter style, where the broadcast payload
//! and the serialized form are the same struct.

use catalogsync_core::domain::{ProductId, SyncErrorKind, SyncRunId, SyncStage, SyncStatus};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

/// One fan-out event published by a [`crate::ProgressBus`].
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    StatusChange {
        sync_id: SyncRunId,
        old_status: SyncStatus,
        new_status: SyncStatus,
        message: String,
        timestamp: DateTime<Utc>,
    },
    Progress {
        sync_id: SyncRunId,
        stage: SyncStage,
        current: u64,
        total: Option<u64>,
        current_operation: Option<String>,
        estimated_time_remaining_secs: Option<u64>,
    },
    Error {
        sync_id: SyncRunId,
        error_type: SyncErrorKind,
        message: String,
        product_id: Option<ProductId>,
        recoverable: bool,
        timestamp: DateTime<Utc>,
    },
    Completion {
        sync_id: SyncRunId,
        status: SyncStatus,
        duration_secs: u64,
        created: u64,
        updated: u64,
        skipped: u64,
        errors: u64,
        summary: String,
    },
    /// Synthesized locally by a [`crate::ProgressSubscription`] when the
    /// broadcast channel drops entries the subscriber fell behind on
    /// (spec §4.5: "a single `Lagged(n)` event is inserted in their place").
    Lagged { sync_id: String, dropped: u64 },
}

impl ProgressEvent {
    /// The `syncId` this event is addressed to, or `"*"` for the
    /// synthetic lag marker when it isn't scoped to one subscription.
    #[must_use]
    pub fn sync_id(&self) -> &str {
        match self {
            ProgressEvent::StatusChange { sync_id, .. }
            | ProgressEvent::Progress { sync_id, .. }
            | ProgressEvent::Error { sync_id, .. }
            | ProgressEvent::Completion { sync_id, .. } => sync_id.as_str(),
            ProgressEvent::Lagged { sync_id, .. } => sync_id.as_str(),
        }
    }

    /// Renders the exact WebSocket frame shape from spec §6.3.
    #[must_use]
    pub fn to_frame(&self) -> Value {
        match self {
            ProgressEvent::StatusChange { sync_id, old_status, new_status, message, timestamp } => json!({
                "type": "status_change",
                "syncId": sync_id.as_str(),
                "data": {
                    "oldStatus": old_status,
                    "newStatus": new_status,
                    "message": message,
                    "timestamp": timestamp.to_rfc3339(),
                }
            }),
            ProgressEvent::Progress { sync_id, stage, current, total, current_operation, estimated_time_remaining_secs } => {
                let percentage = total
                    .filter(|t| *t > 0)
                    .map(|t| (*current as f64 / t as f64 * 100.0 * 100.0).round() / 100.0);
                json!({
                    "type": "progress",
                    "syncId": sync_id.as_str(),
                    "data": {
                        "stage": stage,
                        "progress": {
                            "current": current,
                            "total": total,
                            "percentage": percentage,
                        },
                        "currentOperation": current_operation,
                        "estimatedTimeRemaining": estimated_time_remaining_secs,
                    }
                })
            }
            ProgressEvent::Error { sync_id, error_type, message, product_id, recoverable, timestamp } => json!({
                "type": "error",
                "syncId": sync_id.as_str(),
                "data": {
                    "errorType": error_type,
                    "message": message,
                    "productId": product_id.as_ref().map(ProductId::as_str),
                    "recoverable": recoverable,
                    "timestamp": timestamp.to_rfc3339(),
                }
            }),
            ProgressEvent::Completion { sync_id, status, duration_secs, created, updated, skipped, errors, summary } => json!({
                "type": "completion",
                "syncId": sync_id.as_str(),
                "data": {
                    "status": status,
                    "duration": duration_secs,
                    "stats": {
                        "created": created,
                        "updated": updated,
                        "skipped": skipped,
                        "errors": errors,
                    },
                    "summary": summary,
                }
            }),
            ProgressEvent::Lagged { sync_id, dropped } => json!({
                "type": "lagged",
                "syncId": sync_id,
                "data": { "dropped": dropped }
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_change_frame_shape() {
        let event = ProgressEvent::StatusChange {
            sync_id: SyncRunId::generate(1_700_000_000_000),
            old_status: SyncStatus::Pending,
            new_status: SyncStatus::Running,
            message: "started".to_string(),
            timestamp: Utc::now(),
        };
        let frame = event.to_frame();
        assert_eq!(frame["type"], "status_change");
        assert_eq!(frame["data"]["oldStatus"], "pending");
        assert_eq!(frame["data"]["newStatus"], "running");
    }

    #[test]
    fn progress_frame_computes_percentage() {
        let event = ProgressEvent::Progress {
            sync_id: SyncRunId::generate(1),
            stage: SyncStage::Processing,
            current: 25,
            total: Some(100),
            current_operation: None,
            estimated_time_remaining_secs: Some(30),
        };
        let frame = event.to_frame();
        assert_eq!(frame["data"]["progress"]["percentage"], 25.0);
    }

    #[test]
    fn lagged_frame_carries_drop_count() {
        let event = ProgressEvent::Lagged { sync_id: "*".to_string(), dropped: 7 };
        let frame = event.to_frame();
        assert_eq!(frame["type"], "lagged");
        assert_eq!(frame["data"]["dropped"], 7);
    }
}
