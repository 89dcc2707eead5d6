use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

/// Topics published by the engine. Delivery is at-least-once and ordering
/// is not guaranteed across topics; consumers must be idempotent against
/// duplicate (alert_id, topic, timestamp) tuples.
pub mod topics {
    pub const ALERT_CREATED: &str = "alert-created";
    pub const ALERT_UPDATED: &str = "alert-updated";
    pub const ALERT_ACKNOWLEDGED: &str = "alert-acknowledged";
    pub const ALERT_RESOLVED: &str = "alert-resolved";
    pub const ALERT_ESCALATED: &str = "alert-escalated";
    pub const ALERT_AUTO_RESOLVED: &str = "alert-auto-resolved";
    pub const ALERT_SUPPRESSED: &str = "alert-suppressed";
    pub const CORRELATION_RESULT: &str = "correlation-result";
}

/// A published bus event.
#[derive(Debug, Clone, Serialize)]
pub struct BusEvent {
    pub topic: &'static str,
    pub payload: serde_json::Value,
    pub published_at: DateTime<Utc>,
}

/// Downstream event publication seam.
pub trait EventBus: Send + Sync {
    fn publish(&self, topic: &'static str, payload: serde_json::Value);
}

/// In-process event bus over a tokio broadcast channel. Events published
/// while no subscriber is attached are dropped, which is fine for an
/// at-least-once contract whose durable side lives in the store.
pub struct BroadcastBus {
    tx: broadcast::Sender<BusEvent>,
}

impl BroadcastBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EventBus for BroadcastBus {
    fn publish(&self, topic: &'static str, payload: serde_json::Value) {
        let event = BusEvent {
            topic,
            payload,
            published_at: Utc::now(),
        };
        // Err means no active subscribers; nothing to do.
        let _ = self.tx.send(event);
    }
}
