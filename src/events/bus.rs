//! Typed publish/subscribe registry
//!
//! Subscribers are plain keys (`S`) rather than callbacks: publishing returns
//! the keys interested in an event, in registration order, and the owner of the
//! bus dispatches to them. That keeps every component mutably borrowable by its
//! owner while still giving a single, explicit place where listeners are added
//! and removed.

use serde::{Deserialize, Serialize};

use super::{EventTopic, GameEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubscriptionId(pub u64);

#[derive(Debug, Clone)]
struct Subscription<S> {
    id: SubscriptionId,
    topic: EventTopic,
    subscriber: S,
}

#[derive(Debug, Clone)]
pub struct EventBus<S> {
    subscriptions: Vec<Subscription<S>>,
    next_id: u64,
}

impl<S> Default for EventBus<S> {
    fn default() -> Self {
        Self {
            subscriptions: Vec::new(),
            next_id: 1,
        }
    }
}

impl<S: Copy + PartialEq> EventBus<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, topic: EventTopic, subscriber: S) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscriptions.push(Subscription {
            id,
            topic,
            subscriber,
        });
        id
    }

    /// Returns false if the subscription was already gone
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|s| s.id != id);
        self.subscriptions.len() != before
    }

    /// Drop every subscription whose key matches; returns how many were removed
    pub fn unsubscribe_where(&mut self, mut matches: impl FnMut(&S) -> bool) -> usize {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|s| !matches(&s.subscriber));
        before - self.subscriptions.len()
    }

    /// Subscribers of the event's topic, in registration order
    pub fn subscribers(&self, event: &GameEvent) -> Vec<S> {
        let topic = event.topic();
        self.subscriptions
            .iter()
            .filter(|s| s.topic == topic)
            .map(|s| s.subscriber)
            .collect()
    }

    pub fn is_subscribed(&self, topic: EventTopic, subscriber: S) -> bool {
        self.subscriptions
            .iter()
            .any(|s| s.topic == topic && s.subscriber == subscriber)
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::FactionId;

    fn eliminated() -> GameEvent {
        GameEvent::FactionEliminated {
            faction: FactionId(1),
        }
    }

    #[test]
    fn test_delivery_follows_registration_order() {
        let mut bus = EventBus::new();
        bus.subscribe(EventTopic::FactionEliminated, 'b');
        bus.subscribe(EventTopic::UnitDead, 'x');
        bus.subscribe(EventTopic::FactionEliminated, 'a');

        assert_eq!(bus.subscribers(&eliminated()), vec!['b', 'a']);
    }

    #[test]
    fn test_unsubscribe_removes_listener() {
        let mut bus = EventBus::new();
        let id = bus.subscribe(EventTopic::FactionEliminated, 1u8);
        bus.subscribe(EventTopic::FactionEliminated, 2u8);

        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id), "second unsubscribe is a no-op");
        assert_eq!(bus.subscribers(&eliminated()), vec![2]);
    }

    #[test]
    fn test_unsubscribe_where_clears_all_topics_of_a_key() {
        let mut bus = EventBus::new();
        bus.subscribe(EventTopic::FactionEliminated, 7u8);
        bus.subscribe(EventTopic::UnitDead, 7u8);
        bus.subscribe(EventTopic::UnitDead, 8u8);

        assert_eq!(bus.unsubscribe_where(|s| *s == 7), 2);
        assert_eq!(bus.len(), 1);
        assert!(!bus.is_subscribed(EventTopic::UnitDead, 7));
    }
}
