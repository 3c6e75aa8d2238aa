//! The immutable message envelope.

use serde::{Deserialize, Serialize};
use sluice_core::{Payload, StepId};

use crate::topic::Topic;

/// An immutable payload plus the topic and step it was published on.
///
/// Messages are opaque to the bus; only agents interpret payload shape.
/// Subscribers receive shared references, so a message can fan out to
/// many inboxes by cloning without any subscriber mutating another's view.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    topic: Topic,
    payload: Payload,
    published: StepId,
}

impl Message {
    /// Build a message. Called by the bus on publish; agents never
    /// construct messages directly.
    pub(crate) fn new(topic: Topic, payload: Payload, published: StepId) -> Self {
        Self {
            topic,
            payload,
            published,
        }
    }

    /// The topic this message was published on.
    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    /// The payload fields.
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// The step during which the message was published.
    pub fn published(&self) -> StepId {
        self.published
    }

    /// Shorthand for a numeric payload field.
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.payload.get(key).and_then(|v| v.as_f64())
    }

    /// Shorthand for a boolean payload field.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.payload.get(key).and_then(|v| v.as_bool())
    }

    /// Shorthand for a text payload field.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(|v| v.as_str())
    }
}
