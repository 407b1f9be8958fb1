//! Event types for the Caelum event system
//!
//! Provides the shared `ShardEvent` definitions and the `EventBus` used to
//! fan them out to in-process listeners (webhook notifier, future SSE feed).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Caelum event types
///
/// Events are broadcast via `EventBus`. Emission is always best effort: a
/// missing or lagging listener never fails the operation that emitted it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ShardEvent {
    /// A whisper was turned into a stored reflection
    ReflectionCreated {
        id: String,
        user: String,
        emotion: String,
        reflection: String,
        confidence: f64,
        shard_intent: f64,
        timestamp: DateTime<Utc>,
    },

    /// A record was added to or removed from the mint queue
    QueueToggled {
        id: String,
        queued: bool,
        timestamp: DateTime<Utc>,
    },

    /// A mint cycle relayed successfully and the record was finalized
    ShardMinted {
        id: String,
        tx_hash: String,
        content_id: String,
        timestamp: DateTime<Utc>,
    },

    /// A mint cycle failed; the record was left untouched
    MintFailed {
        id: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },
}

impl ShardEvent {
    /// Short event name for logs
    pub fn event_type(&self) -> &'static str {
        match self {
            ShardEvent::ReflectionCreated { .. } => "ReflectionCreated",
            ShardEvent::QueueToggled { .. } => "QueueToggled",
            ShardEvent::ShardMinted { .. } => "ShardMinted",
            ShardEvent::MintFailed { .. } => "MintFailed",
        }
    }
}

/// Central event distribution bus
///
/// Thin wrapper over a tokio broadcast channel. Cloning the bus clones the
/// sender, so every clone publishes to the same subscribers.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ShardEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Examples
    ///
    /// ```
    /// use caelum_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(100);
    /// assert_eq!(event_bus.capacity(), 100);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<ShardEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: ShardEvent,
    ) -> Result<usize, broadcast::error::SendError<ShardEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: ShardEvent) {
        let event_type = event.event_type();
        if self.tx.send(event).is_err() {
            tracing::trace!(event_type, "No subscribers for event");
        }
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minted(id: &str) -> ShardEvent {
        ShardEvent::ShardMinted {
            id: id.to_string(),
            tx_hash: "0xdeadbeef".to_string(),
            content_id: id.to_string(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_emit_without_subscribers_fails() {
        let bus = EventBus::new(10);
        assert!(bus.emit(minted("a")).is_err());
        // lossy variant must not panic either
        bus.emit_lossy(minted("a"));
    }

    #[tokio::test]
    async fn test_subscriber_receives_events() {
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        bus.emit(minted("abc")).unwrap();

        match rx.recv().await.unwrap() {
            ShardEvent::ShardMinted { id, tx_hash, .. } => {
                assert_eq!(id, "abc");
                assert_eq!(tx_hash, "0xdeadbeef");
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_clones_share_subscribers() {
        let bus = EventBus::new(10);
        let clone = bus.clone();
        let mut rx = bus.subscribe();

        clone.emit_lossy(ShardEvent::QueueToggled {
            id: "x".to_string(),
            queued: true,
            timestamp: Utc::now(),
        });

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type(), "QueueToggled");
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let json = serde_json::to_value(minted("abc")).unwrap();
        assert_eq!(json["type"], "ShardMinted");
        assert_eq!(json["tx_hash"], "0xdeadbeef");
    }
}
