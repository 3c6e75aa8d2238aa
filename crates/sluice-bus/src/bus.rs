//! The bus proper: subscription registry, staging buffer, inboxes.

use std::collections::VecDeque;
use std::fmt;

use indexmap::IndexMap;
use sluice_core::{AgentId, ComponentId, Payload, StepId};

use crate::message::Message;
use crate::topic::Topic;

/// Identifies an inbox on the bus.
///
/// Agents subscribe under their agent id; the engine also maintains one
/// inbox per physical component for its control-input bindings, keyed
/// under a `component/` prefix so the two namespaces cannot collide.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(pub String);

impl SubscriberId {
    /// The inbox key for an agent.
    pub fn agent(id: &AgentId) -> Self {
        Self(format!("agent/{id}"))
    }

    /// The inbox key for a physical component's control bindings.
    pub fn component(id: &ComponentId) -> Self {
        Self(format!("component/{id}"))
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Topic-keyed publish/subscribe transport with step-buffered delivery.
///
/// One bus is constructed per scheduler and passed to every component at
/// assembly — never ambient global state — so multiple simulations can
/// run concurrently in one process.
///
/// # Delivery contract
///
/// - `publish` stages; nothing is visible until the next [`flush`].
/// - [`flush`] moves staged messages into the inboxes of the topic's
///   current subscribers, preserving publish order per topic.
/// - The scheduler drains one inbox at a time with [`take_inbox`];
///   handler invocations are therefore strictly sequential per
///   subscriber.
/// - Publishing to a topic with no subscribers discards the message
///   silently at flush time.
///
/// [`flush`]: MessageBus::flush
/// [`take_inbox`]: MessageBus::take_inbox
#[derive(Debug, Default)]
pub struct MessageBus {
    /// topic -> subscribers in registration order.
    subscriptions: IndexMap<Topic, Vec<SubscriberId>>,
    /// subscriber -> queued messages awaiting delivery.
    inboxes: IndexMap<SubscriberId, VecDeque<Message>>,
    /// Messages published since the last flush, in publish order.
    staged: Vec<Message>,
}

impl MessageBus {
    /// An empty bus with no subscriptions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `subscriber` for `topic`.
    ///
    /// Duplicate registrations are ignored; a subscriber receives each
    /// message on a topic at most once.
    pub fn subscribe(&mut self, topic: Topic, subscriber: SubscriberId) {
        self.inboxes.entry(subscriber.clone()).or_default();
        let subs = self.subscriptions.entry(topic).or_default();
        if !subs.contains(&subscriber) {
            subs.push(subscriber);
        }
    }

    /// Remove `subscriber`'s registration for `topic`, if any.
    pub fn unsubscribe(&mut self, topic: &Topic, subscriber: &SubscriberId) {
        if let Some(subs) = self.subscriptions.get_mut(topic) {
            subs.retain(|s| s != subscriber);
        }
    }

    /// Remove every registration held by `subscriber`.
    ///
    /// Messages already queued in the subscriber's inbox are left in
    /// place; the caller decides whether to drain or discard them. Used
    /// by agent shutdown, where queued messages must still be drained
    /// (to a no-op) rather than silently dropped.
    pub fn unsubscribe_all(&mut self, subscriber: &SubscriberId) {
        for subs in self.subscriptions.values_mut() {
            subs.retain(|s| s != subscriber);
        }
    }

    /// Stage a message for delivery at the next flush.
    pub fn publish(&mut self, topic: Topic, payload: Payload, step: StepId) {
        self.staged.push(Message::new(topic, payload, step));
    }

    /// Move staged messages into subscriber inboxes.
    ///
    /// Subscribers are resolved at flush time against the current
    /// registry. Returns the number of inbox deliveries performed
    /// (one message to three subscribers counts three).
    pub fn flush(&mut self) -> usize {
        let mut delivered = 0;
        for message in self.staged.drain(..) {
            let Some(subs) = self.subscriptions.get(message.topic()) else {
                continue;
            };
            for subscriber in subs {
                // Inbox exists: subscribe() creates it eagerly.
                if let Some(inbox) = self.inboxes.get_mut(subscriber) {
                    inbox.push_back(message.clone());
                    delivered += 1;
                }
            }
        }
        delivered
    }

    /// Drain all queued messages for `subscriber`, in delivery order.
    pub fn take_inbox(&mut self, subscriber: &SubscriberId) -> Vec<Message> {
        match self.inboxes.get_mut(subscriber) {
            Some(inbox) => inbox.drain(..).collect(),
            None => Vec::new(),
        }
    }

    /// True if any message is staged or queued in an inbox.
    ///
    /// The scheduler loops dispatch rounds until this returns false.
    pub fn has_pending(&self) -> bool {
        !self.staged.is_empty() || self.inboxes.values().any(|q| !q.is_empty())
    }

    /// A subscriber with a non-empty inbox, if any. Used for error
    /// attribution when the dispatch round budget is exhausted.
    pub fn first_backlogged(&self) -> Option<&SubscriberId> {
        self.inboxes
            .iter()
            .find(|(_, q)| !q.is_empty())
            .map(|(s, _)| s)
    }

    /// Current subscribers of `topic`, in registration order.
    pub fn subscribers(&self, topic: &Topic) -> &[SubscriberId] {
        self.subscriptions
            .get(topic)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}
