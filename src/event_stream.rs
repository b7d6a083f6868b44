//! Typed broadcast bus
//!
//! Fans runtime events out to subscribers. Each subscriber owns an
//! unbounded queue, so a slow consumer never stalls the broadcaster;
//! subscribers that dropped their receiver are pruned on the next send.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::trace;

use crate::event::Event;

/// Token identifying one subscription; pass to `unsubscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionToken(u64);

/// One subscriber's end of the bus.
pub struct EventSubscription {
    pub token: SubscriptionToken,
    pub events: mpsc::UnboundedReceiver<Event>,
}

/// Broadcast bus for runtime events.
pub struct EventStream {
    subscribers: DashMap<u64, mpsc::UnboundedSender<Event>>,
    next_token: AtomicU64,
}

impl EventStream {
    pub fn new() -> Self {
        Self {
            subscribers: DashMap::new(),
            next_token: AtomicU64::new(1),
        }
    }

    /// Register a subscriber and hand back its token and event queue.
    pub fn subscribe(&self) -> EventSubscription {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.insert(token, tx);
        EventSubscription {
            token: SubscriptionToken(token),
            events: rx,
        }
    }

    /// Remove a subscriber. Unknown tokens are ignored.
    pub fn unsubscribe(&self, token: SubscriptionToken) {
        self.subscribers.remove(&token.0);
    }

    /// Fan an event out to every live subscriber.
    pub fn broadcast(&self, event: Event) {
        trace!(kind = event.kind(), "broadcasting event");
        let mut dead = Vec::new();
        for entry in self.subscribers.iter() {
            if entry.value().send(event.clone()).is_err() {
                dead.push(*entry.key());
            }
        }
        for token in dead {
            self.subscribers.remove(&token);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl Default for EventStream {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pid::Pid;
    use std::time::SystemTime;

    fn started(id: &str) -> Event {
        Event::ActorStarted {
            pid: Pid::new("local", id),
            timestamp: SystemTime::now(),
        }
    }

    #[tokio::test]
    async fn test_broadcast_reaches_all_subscribers() {
        let stream = EventStream::new();
        let mut a = stream.subscribe();
        let mut b = stream.subscribe();

        stream.broadcast(started("player/1"));

        for sub in [&mut a, &mut b] {
            let event = sub.events.recv().await.unwrap();
            assert_eq!(event.kind(), "actor_started");
        }
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_delivery() {
        let stream = EventStream::new();
        let mut sub = stream.subscribe();
        stream.unsubscribe(sub.token);

        stream.broadcast(started("player/1"));
        assert!(sub.events.try_recv().is_err());
        assert_eq!(stream.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_dropped_subscriber_is_pruned() {
        let stream = EventStream::new();
        let sub = stream.subscribe();
        drop(sub.events);

        stream.broadcast(started("player/1"));
        assert_eq!(stream.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_events_arrive_in_broadcast_order() {
        let stream = EventStream::new();
        let mut sub = stream.subscribe();

        stream.broadcast(started("player/1"));
        stream.broadcast(started("player/2"));

        let first = sub.events.recv().await.unwrap();
        let second = sub.events.recv().await.unwrap();
        assert_eq!(first.pid().unwrap().id(), "player/1");
        assert_eq!(second.pid().unwrap().id(), "player/2");
    }
}
