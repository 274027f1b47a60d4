//! [`ProgressBus`] — the broadcast-backed pub-sub fan-out (spec §4.5).
//!
//! `tokio::sync::broadcast` already provides everything §4.5 asks for: a
//! bounded shared ring buffer, non-blocking sends regardless of
//! subscriber count, and a `Lagged(n)` error a slow subscriber gets
//! instead of stalling the publisher. This wraps it so call sites see
//! `publish`/`subscribe` rather than the raw channel API, matching the
//! other `other_examples` event-bus pattern adapted to this workspace's
//! module style.

use tokio::sync::broadcast;

use crate::event::ProgressEvent;

/// Default ring buffer size. Generous enough that a subscriber would
/// need to fall roughly this many events behind before lagging — one
/// full sync's worth of per-record events on a mid-size batch.
pub const DEFAULT_CAPACITY: usize = 4096;

/// Either every sync (`"*"` in the WebSocket path per spec §6.3) or one
/// specific `syncId`.
#[derive(Debug, Clone)]
enum Filter {
    All,
    One(String),
}

impl Filter {
    fn matches(&self, sync_id: &str) -> bool {
        match self {
            Filter::All => true,
            Filter::One(id) => id == sync_id || sync_id == "*",
        }
    }
}

/// In-process pub-sub bus fanning out [`ProgressEvent`]s to zero or more
/// subscribers without ever blocking the publisher (spec §4.5).
pub struct ProgressBus {
    tx: broadcast::Sender<ProgressEvent>,
}

impl ProgressBus {
    /// Builds a bus with the default ring buffer capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publishes an event. Non-blocking: if there are no subscribers this
    /// is a no-op: a `SendError` just means nobody is listening, which is
    /// not a failure condition for the publisher (spec §4.5).
    pub fn publish(&self, event: ProgressEvent) {
        let _ = self.tx.send(event);
    }

    /// Subscribes to every event on the bus regardless of `syncId`.
    #[must_use]
    pub fn subscribe_all(&self) -> ProgressSubscription {
        ProgressSubscription { rx: self.tx.subscribe(), filter: Filter::All }
    }

    /// Subscribes to events addressed to one `syncId` (the WebSocket
    /// handler's `?syncId=<id>` case, spec §4.7).
    #[must_use]
    pub fn subscribe_one(&self, sync_id: impl Into<String>) -> ProgressSubscription {
        ProgressSubscription { rx: self.tx.subscribe(), filter: Filter::One(sync_id.into()) }
    }

    /// Current receiver count, useful for health/metrics reporting.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ProgressBus {
    fn default() -> Self {
        Self::new()
    }
}

/// A subscriber's ordered view of the bus, filtered by `syncId`.
///
/// Per-subscriber ordering is preserved (spec §4.5 "Ordering"); events
/// the subscriber's filter rejects are skipped transparently, and a lag
/// surfaces as a single synthetic [`ProgressEvent::Lagged`] rather than
/// an error the caller has to branch on.
pub struct ProgressSubscription {
    rx: broadcast::Receiver<ProgressEvent>,
    filter: Filter,
}

impl ProgressSubscription {
    /// Awaits the next event addressed to this subscription. Returns
    /// `None` only once the bus itself has been dropped.
    pub async fn recv(&mut self) -> Option<ProgressEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => {
                    if self.filter.matches(event.sync_id()) {
                        return Some(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    let sync_id = match &self.filter {
                        Filter::All => "*".to_string(),
                        Filter::One(id) => id.clone(),
                    };
                    return Some(ProgressEvent::Lagged { sync_id, dropped: n });
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalogsync_core::domain::{SyncRunId, SyncStage};

    fn progress(sync_id: &str, current: u64) -> ProgressEvent {
        ProgressEvent::Progress {
            sync_id: SyncRunId::new(sync_id).unwrap(),
            stage: SyncStage::Processing,
            current,
            total: Some(10),
            current_operation: None,
            estimated_time_remaining_secs: None,
        }
    }

    #[tokio::test]
    async fn publish_before_subscribe_is_not_delivered() {
        let bus = ProgressBus::new();
        bus.publish(progress("s1", 1));
        let mut sub = bus.subscribe_all();
        bus.publish(progress("s1", 2));
        let event = sub.recv().await.unwrap();
        assert!(matches!(event, ProgressEvent::Progress { current: 2, .. }));
    }

    #[tokio::test]
    async fn filters_by_sync_id() {
        let bus = ProgressBus::new();
        let mut sub = bus.subscribe_one("s1");
        bus.publish(progress("s2", 1));
        bus.publish(progress("s1", 2));
        let event = sub.recv().await.unwrap();
        assert_eq!(event.sync_id(), "s1");
    }

    #[tokio::test]
    async fn publish_never_blocks_with_no_subscribers() {
        let bus = ProgressBus::new();
        for i in 0..10_000u64 {
            bus.publish(progress("s1", i));
        }
    }

    #[tokio::test]
    async fn lagging_subscriber_gets_a_single_lagged_marker() {
        let bus = ProgressBus::with_capacity(4);
        let mut sub = bus.subscribe_all();
        for i in 0..20u64 {
            bus.publish(progress("s1", i));
        }
        let event = sub.recv().await.unwrap();
        assert!(matches!(event, ProgressEvent::Lagged { .. }));
    }

    #[tokio::test]
    async fn disconnected_subscriber_does_not_stall_publisher() {
        let bus = ProgressBus::new();
        {
            let _sub = bus.subscribe_all();
        }
        bus.publish(progress("s1", 1));
    }
}
