//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is shared via `Arc<EventBus>` between the orchestrator, the
//! queue service and the revert monitor.

use autopilot_core::types::{DbId, SiteId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

pub const EVENT_RUN_COMPLETED: &str = "optimization.run_completed";
pub const EVENT_RUN_FAILED: &str = "optimization.run_failed";
pub const EVENT_CHANGE_APPLIED: &str = "autopilot.change_applied";
pub const EVENT_CHANGE_REVERTED: &str = "autopilot.change_reverted";
pub const EVENT_APPROVAL_NEEDED: &str = "autopilot.approval_needed";
pub const EVENT_ALERT_RAISED: &str = "alert.raised";

// ---------------------------------------------------------------------------
// AutopilotEvent
// ---------------------------------------------------------------------------

/// Something that happened to a site's optimization state.
///
/// Constructed via [`AutopilotEvent::new`] and enriched with
/// [`with_source`](AutopilotEvent::with_source) and
/// [`with_payload`](AutopilotEvent::with_payload).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutopilotEvent {
    /// Dot-separated event name, e.g. `"autopilot.change_applied"`.
    pub event_type: String,

    pub site_id: SiteId,

    /// Source entity kind (`"run"`, `"queue_item"`, `"alert"`).
    pub source_entity_type: Option<String>,

    pub source_entity_id: Option<DbId>,

    /// Event-specific data.
    pub payload: serde_json::Value,

    pub timestamp: DateTime<Utc>,
}

impl AutopilotEvent {
    pub fn new(event_type: impl Into<String>, site_id: SiteId) -> Self {
        Self {
            event_type: event_type.into(),
            site_id,
            source_entity_type: None,
            source_entity_id: None,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    pub fn with_source(mut self, entity_type: impl Into<String>, entity_id: DbId) -> Self {
        self.source_entity_type = Some(entity_type.into());
        self.source_entity_id = Some(entity_id);
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// ```rust
/// use autopilot_events::bus::{AutopilotEvent, EventBus, EVENT_RUN_COMPLETED};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(AutopilotEvent::new(EVENT_RUN_COMPLETED, uuid::Uuid::nil()));
/// ```
pub struct EventBus {
    sender: broadcast::Sender<AutopilotEvent>,
}

impl EventBus {
    /// Slow receivers observe `RecvError::Lagged` once `capacity` is exceeded.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish to all current subscribers. Dropped if there are none.
    pub fn publish(&self, event: AutopilotEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AutopilotEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn publish_and_receive() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        let site = Uuid::new_v4();

        bus.publish(
            AutopilotEvent::new(EVENT_CHANGE_APPLIED, site)
                .with_source("queue_item", 42)
                .with_payload(serde_json::json!({"field": "title"})),
        );

        let received = rx.recv().await.expect("should receive the event");
        assert_eq!(received.event_type, EVENT_CHANGE_APPLIED);
        assert_eq!(received.site_id, site);
        assert_eq!(received.source_entity_type.as_deref(), Some("queue_item"));
        assert_eq!(received.source_entity_id, Some(42));
        assert_eq!(received.payload["field"], "title");
    }

    #[tokio::test]
    async fn every_subscriber_sees_the_event() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(AutopilotEvent::new(EVENT_ALERT_RAISED, Uuid::nil()));

        assert_eq!(rx1.recv().await.unwrap().event_type, EVENT_ALERT_RAISED);
        assert_eq!(rx2.recv().await.unwrap().event_type, EVENT_ALERT_RAISED);
    }

    #[test]
    fn publish_without_subscribers_is_a_no_op() {
        let bus = EventBus::default();
        bus.publish(AutopilotEvent::new(EVENT_RUN_FAILED, Uuid::nil()));
    }
}
