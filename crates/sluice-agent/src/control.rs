//! The local control agent.

use sluice_bus::{Message, Topic};
use sluice_core::{payload, AgentError, AgentId};

use crate::agent::{Agent, AgentContext};
use crate::law::ControlLaw;

/// Wraps a [`ControlLaw`] and handles its bus plumbing.
///
/// Subscribes to one observation topic, extracts the configured process
/// variable, runs the law, and publishes the command on the controlled
/// component's action topic under the configured key. An optional
/// command topic lets a supervisory or dispatch agent replace the
/// setpoint mid-run (`setpoint` payload field).
///
/// Idempotent under duplicate observation delivery: the law recomputes
/// the same output and nothing else changes.
pub struct ControlAgent {
    id: AgentId,
    law: Box<dyn ControlLaw>,
    observation_topic: Topic,
    observation_key: String,
    action_topic: Topic,
    action_key: String,
    command_topic: Option<Topic>,
}

impl ControlAgent {
    /// Wire a law to its observation and action topics.
    pub fn new(
        id: AgentId,
        law: Box<dyn ControlLaw>,
        observation_topic: Topic,
        observation_key: impl Into<String>,
        action_topic: Topic,
        action_key: impl Into<String>,
    ) -> Self {
        Self {
            id,
            law,
            observation_topic,
            observation_key: observation_key.into(),
            action_topic,
            action_key: action_key.into(),
            command_topic: None,
        }
    }

    /// Also accept setpoint commands on `topic`.
    pub fn with_command_topic(mut self, topic: Topic) -> Self {
        self.command_topic = Some(topic);
        self
    }

    /// The law's current setpoint, for inspection.
    pub fn setpoint(&self) -> f64 {
        self.law.setpoint()
    }
}

impl Agent for ControlAgent {
    fn id(&self) -> &AgentId {
        &self.id
    }

    fn subscriptions(&self) -> Vec<Topic> {
        let mut topics = vec![self.observation_topic.clone()];
        if let Some(t) = &self.command_topic {
            topics.push(t.clone());
        }
        topics
    }

    fn on_message(
        &mut self,
        ctx: &mut AgentContext<'_>,
        message: &Message,
    ) -> Result<(), AgentError> {
        if Some(message.topic()) == self.command_topic.as_ref() {
            if let Some(setpoint) = message.get_f64("setpoint") {
                self.law.set_setpoint(setpoint);
            }
            return Ok(());
        }

        let pv = message
            .get_f64(&self.observation_key)
            .ok_or_else(|| AgentError::MissingField {
                key: self.observation_key.clone(),
            })?;

        if let Some(command) = self.law.output(pv, ctx.clock().dt()) {
            let topic = self.action_topic.clone();
            ctx.publish(topic, payload! { self.action_key.as_str() => command });
        }
        Ok(())
    }
}
