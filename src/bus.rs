use serde_json::Value;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Default buffer per subscriber. Events published while a subscriber is
/// busy (e.g. waiting on its first snapshot) queue here in arrival order.
const DEFAULT_CAPACITY: usize = 256;

pub const ACTION_CREATE: &str = "create";
pub const ACTION_UPDATE: &str = "update";
pub const ACTION_DELETE: &str = "delete";

/// Channel string for a whole collection, e.g. `collections.appointments.documents`.
pub fn collection_channel(collection: &str) -> String {
    format!("collections.{collection}.documents")
}

/// A raw change notification as the document feed delivers it: a set of
/// topic strings plus the full post-change document.
#[derive(Debug, Clone)]
pub struct RawEvent {
    pub topics: Vec<String>,
    pub payload: Value,
}

impl RawEvent {
    /// Topic set for one document lifecycle event: the specific document
    /// topic, the wildcard form and the bare collection channel.
    pub fn document(collection: &str, id: Uuid, action: &str, payload: Value) -> Self {
        Self {
            topics: vec![
                format!("collections.{collection}.documents.{id}.{action}"),
                format!("collections.{collection}.documents.*.{action}"),
                collection_channel(collection),
            ],
            payload,
        }
    }
}

/// In-process fan-out of document change events. Cloning shares the
/// underlying channel; every subscriber sees every published event.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<RawEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RawEvent> {
        self.tx.subscribe()
    }

    /// Publish an event. A bus with no subscribers simply drops it.
    pub fn publish(&self, event: RawEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn document_topics_cover_specific_wildcard_and_channel() {
        let id = Uuid::new_v4();
        let event = RawEvent::document("appointments", id, ACTION_CREATE, json!({}));

        assert!(
            event
                .topics
                .contains(&format!("collections.appointments.documents.{id}.create"))
        );
        assert!(
            event
                .topics
                .contains(&"collections.appointments.documents.*.create".to_string())
        );
        assert!(
            event
                .topics
                .contains(&"collections.appointments.documents".to_string())
        );
    }

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.publish(RawEvent::document(
            "doctors",
            Uuid::new_v4(),
            ACTION_UPDATE,
            json!({"name": "A"}),
        ));

        let event = rx.recv().await.expect("event");
        assert_eq!(event.payload["name"], "A");
    }

    #[tokio::test]
    async fn events_queue_in_arrival_order() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        for n in 0..3 {
            bus.publish(RawEvent::document(
                "patients",
                Uuid::new_v4(),
                ACTION_CREATE,
                json!({ "n": n }),
            ));
        }

        for n in 0..3 {
            let event = rx.recv().await.expect("event");
            assert_eq!(event.payload["n"], n);
        }
    }
}
