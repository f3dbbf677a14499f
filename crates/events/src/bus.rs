//! Per-instance event bus backed by `tokio::sync::broadcast` channels.
//!
//! Unlike a single process-wide channel, each instance gets its own
//! broadcast sender so subscribers only ever see events for the
//! instance they asked for. Publishing to an instance nobody watches is
//! a silent no-op.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use zapgate_core::types::DbId;

/// Per-channel buffer capacity. Slow receivers observe
/// `RecvError::Lagged` when they fall more than this far behind.
const CHANNEL_CAPACITY: usize = 256;

/// One event on an instance's channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceEvent {
    pub instance_id: DbId,
    /// Event name, one of the constants in [`crate::names`].
    pub event: String,
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

/// Publishing capability handed to the sync engine and webhook router.
///
/// Implemented by [`EventBus`] in production and by recording stubs in
/// tests. Publishing must never block or fail the caller; a missing or
/// full transport degrades to a no-op.
pub trait Broadcaster: Send + Sync {
    fn publish(&self, instance_id: DbId, event: &str, payload: serde_json::Value);
}

/// In-process fan-out hub, one broadcast channel per instance.
///
/// Designed to be shared via `Arc<EventBus>`.
pub struct EventBus {
    channels: RwLock<HashMap<DbId, broadcast::Sender<InstanceEvent>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
        }
    }

    /// Subscribe to one instance's events.
    pub fn subscribe(&self, instance_id: DbId) -> broadcast::Receiver<InstanceEvent> {
        let mut channels = self.channels.write().expect("event bus lock poisoned");
        channels
            .entry(instance_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Drop an instance's channel (instance deleted). Outstanding
    /// receivers observe `RecvError::Closed`.
    pub fn remove(&self, instance_id: DbId) {
        self.channels
            .write()
            .expect("event bus lock poisoned")
            .remove(&instance_id);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Broadcaster for EventBus {
    fn publish(&self, instance_id: DbId, event: &str, payload: serde_json::Value) {
        let channels = self.channels.read().expect("event bus lock poisoned");
        if let Some(sender) = channels.get(&instance_id) {
            // SendError only means there are zero receivers right now.
            let _ = sender.send(InstanceEvent {
                instance_id,
                event: event.to_string(),
                payload,
                timestamp: Utc::now(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::names;

    #[tokio::test]
    async fn subscriber_receives_only_its_instance() {
        let bus = EventBus::new();
        let mut rx1 = bus.subscribe(1);
        let mut rx2 = bus.subscribe(2);

        bus.publish(1, names::NEW_MESSAGE, serde_json::json!({"n": 1}));
        bus.publish(2, names::NEW_MESSAGE, serde_json::json!({"n": 2}));

        let e1 = rx1.recv().await.expect("instance 1 event");
        assert_eq!(e1.instance_id, 1);
        assert_eq!(e1.payload["n"], 1);

        let e2 = rx2.recv().await.expect("instance 2 event");
        assert_eq!(e2.instance_id, 2);
        assert_eq!(e2.payload["n"], 2);

        // Nothing else queued on either channel.
        assert!(rx1.try_recv().is_err());
        assert!(rx2.try_recv().is_err());
    }

    #[test]
    fn publish_without_subscribers_is_a_noop() {
        let bus = EventBus::new();
        bus.publish(99, names::CONNECTION_UPDATE, serde_json::json!({}));
    }

    #[tokio::test]
    async fn multiple_subscribers_share_a_channel() {
        let bus = EventBus::new();
        let mut rx_a = bus.subscribe(5);
        let mut rx_b = bus.subscribe(5);

        bus.publish(5, names::CHATS_UPDATE, serde_json::json!({"count": 3}));

        assert_eq!(rx_a.recv().await.expect("a").event, names::CHATS_UPDATE);
        assert_eq!(rx_b.recv().await.expect("b").event, names::CHATS_UPDATE);
    }

    #[tokio::test]
    async fn remove_closes_the_channel() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe(7);
        bus.remove(7);
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Closed)
        ));
    }
}
