use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::bus::RawEvent;

/// What the forwarding task hands to the handler.
#[derive(Debug)]
pub enum Delivery {
    Event(RawEvent),
    /// The subscriber fell behind the bus buffer and `skipped` events are
    /// gone. The consumer decides how to recover (typically a resync).
    Lagged(u64),
}

/// A live feed subscription scoped to one view.
///
/// The handler runs on a dedicated task and only while the delivery gate
/// is open. `cancel` closes the gate before tearing the task down, and
/// waits out any delivery already in flight, so once `cancel` returns the
/// handler will never run again. Each view owns exactly one subscription
/// per collection; dropping the handle without cancelling leaves the
/// forwarding task running until the bus closes.
pub struct Subscription {
    gate: Arc<Mutex<bool>>,
    task: JoinHandle<()>,
}

impl Subscription {
    /// Subscribe `handler` to every event on `rx` whose topics fall under
    /// `channel`.
    pub fn spawn<F>(
        mut rx: broadcast::Receiver<RawEvent>,
        channel: impl Into<String>,
        mut handler: F,
    ) -> Self
    where
        F: FnMut(Delivery) + Send + 'static,
    {
        let channel = channel.into();
        let gate: Arc<Mutex<bool>> = Arc::new(Mutex::new(false));

        let task = tokio::spawn({
            let gate = Arc::clone(&gate);
            async move {
                loop {
                    let delivery = match rx.recv().await {
                        Ok(event) => {
                            if !event.topics.iter().any(|t| t.starts_with(&channel)) {
                                continue;
                            }
                            Delivery::Event(event)
                        }
                        Err(RecvError::Lagged(skipped)) => Delivery::Lagged(skipped),
                        Err(RecvError::Closed) => break,
                    };

                    let cancelled = gate.lock().unwrap_or_else(PoisonError::into_inner);
                    if *cancelled {
                        break;
                    }
                    handler(delivery);
                }
            }
        });

        Self { gate, task }
    }

    /// Stop the feed. Blocks out any racing delivery: after this returns
    /// the handler is guaranteed not to be invoked again.
    pub fn cancel(&self) {
        *self.gate.lock().unwrap_or_else(PoisonError::into_inner) = true;
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{ACTION_CREATE, EventBus, RawEvent, collection_channel};
    use serde_json::json;
    use std::time::Duration;
    use uuid::Uuid;

    type Spy = Arc<Mutex<Vec<String>>>;

    fn spying_handler(spy: Spy) -> impl FnMut(Delivery) + Send + 'static {
        move |delivery| {
            let note = match delivery {
                Delivery::Event(event) => event.payload["tag"]
                    .as_str()
                    .unwrap_or_default()
                    .to_string(),
                Delivery::Lagged(skipped) => format!("lagged:{skipped}"),
            };
            spy.lock().unwrap().push(note);
        }
    }

    fn tagged(collection: &str, tag: &str) -> RawEvent {
        RawEvent::document(collection, Uuid::new_v4(), ACTION_CREATE, json!({ "tag": tag }))
    }

    async fn wait_for_len(spy: &Spy, len: usize) {
        for _ in 0..100 {
            if spy.lock().unwrap().len() >= len {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("spy never reached {len} deliveries: {:?}", spy.lock().unwrap());
    }

    #[tokio::test]
    async fn delivers_events_on_the_channel() {
        let bus = EventBus::new();
        let spy: Spy = Arc::default();
        let sub = Subscription::spawn(
            bus.subscribe(),
            collection_channel("appointments"),
            spying_handler(Arc::clone(&spy)),
        );

        bus.publish(tagged("appointments", "one"));
        bus.publish(tagged("appointments", "two"));

        wait_for_len(&spy, 2).await;
        assert_eq!(*spy.lock().unwrap(), vec!["one", "two"]);
        sub.cancel();
    }

    #[tokio::test]
    async fn other_channels_are_filtered_out() {
        let bus = EventBus::new();
        let spy: Spy = Arc::default();
        let sub = Subscription::spawn(
            bus.subscribe(),
            collection_channel("doctors"),
            spying_handler(Arc::clone(&spy)),
        );

        bus.publish(tagged("appointments", "skip"));
        bus.publish(tagged("doctors", "keep"));

        wait_for_len(&spy, 1).await;
        assert_eq!(*spy.lock().unwrap(), vec!["keep"]);
        sub.cancel();
    }

    #[tokio::test]
    async fn no_delivery_after_cancel() {
        let bus = EventBus::new();
        let spy: Spy = Arc::default();
        let sub = Subscription::spawn(
            bus.subscribe(),
            collection_channel("appointments"),
            spying_handler(Arc::clone(&spy)),
        );

        bus.publish(tagged("appointments", "before"));
        wait_for_len(&spy, 1).await;

        sub.cancel();
        bus.publish(tagged("appointments", "after"));
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(*spy.lock().unwrap(), vec!["before"]);
    }

    #[tokio::test]
    async fn lag_is_reported_to_the_handler() {
        let bus = EventBus::with_capacity(1);
        let rx = bus.subscribe();

        // overflow the one-slot buffer before the task can drain it
        bus.publish(tagged("appointments", "one"));
        bus.publish(tagged("appointments", "two"));
        bus.publish(tagged("appointments", "three"));

        let spy: Spy = Arc::default();
        let sub = Subscription::spawn(
            rx,
            collection_channel("appointments"),
            spying_handler(Arc::clone(&spy)),
        );

        wait_for_len(&spy, 2).await;
        let seen = spy.lock().unwrap().clone();
        assert_eq!(seen[0], "lagged:2");
        assert_eq!(seen[1], "three");
        sub.cancel();
    }
}
