//! Out-of-band event delivery.
//!
//! Tools emit events while a command is being dispatched; the device loop
//! drains them afterwards and writes them to the link. The bus is a
//! `tokio::sync::broadcast` channel, so more than one consumer can watch
//! the same stream (a logger next to the link writer, for instance).

use clawlink_core::Event;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::warn;

pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Cloneable sender side. Cheap to hand to every tool handler.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Queue an event. Returns how many subscribers will see it.
    pub fn emit(&self, event: Event) -> usize {
        match self.sender.send(event) {
            Ok(receivers) => receivers,
            Err(broadcast::error::SendError(event)) => {
                warn!(event = %event.name, "no event subscribers, event dropped");
                0
            }
        }
    }

    pub fn subscribe(&self) -> EventSubscriber {
        EventSubscriber {
            receiver: self.sender.subscribe(),
        }
    }
}

/// Receiver side; sees every event emitted after it subscribed.
#[derive(Debug)]
pub struct EventSubscriber {
    receiver: broadcast::Receiver<Event>,
}

impl EventSubscriber {
    /// Next queued event without blocking.
    pub fn try_next(&mut self) -> Option<Event> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "event subscriber lagged, oldest events lost");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }

    pub fn drain(&mut self) -> Vec<Event> {
        std::iter::from_fn(|| self.try_next()).collect()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn subscriber_sees_events_in_order() {
        let bus = EventBus::default();
        let mut subscriber = bus.subscribe();

        assert_eq!(bus.emit(Event::new("a", json!(1))), 1);
        bus.emit(Event::new("b", json!(2)));

        let names: Vec<String> = subscriber.drain().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert!(subscriber.try_next().is_none());
    }

    #[test]
    fn emit_without_subscribers_is_dropped() {
        let bus = EventBus::default();
        assert_eq!(bus.emit(Event::new("lost", json!(null))), 0);
    }

    #[test]
    fn lagging_subscriber_keeps_newest_events() {
        let bus = EventBus::new(2);
        let mut subscriber = bus.subscribe();
        for n in 0..5 {
            bus.emit(Event::new("tick", json!(n)));
        }

        let data: Vec<_> = subscriber.drain().into_iter().map(|e| e.data).collect();
        assert_eq!(data, vec![json!(3), json!(4)]);
    }

    #[test]
    fn cloned_bus_feeds_same_subscribers() {
        let bus = EventBus::default();
        let emitter = bus.clone();
        let mut subscriber = bus.subscribe();

        emitter.emit(Event::new("reset", json!({"board": "sim"})));
        assert_eq!(subscriber.try_next().map(|e| e.name), Some("reset".to_owned()));
    }
}
