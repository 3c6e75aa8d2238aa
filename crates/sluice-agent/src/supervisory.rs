//! The central supervisory agent.

use sluice_bus::{Message, Topic};
use sluice_core::{payload, AgentError, AgentId};
use tracing::warn;

use crate::agent::{Agent, AgentContext};

/// Watches two state topics and corrects divergence.
///
/// Subscribes to the state topics of two components expected to track
/// each other, and re-evaluates the divergence predicate every step
/// (level-triggered, per the fault-adaptation contract): while
/// `|level_a − level_b| > threshold`, it publishes the corrective
/// setpoint to the configured command topic. Republishing while the
/// condition holds is deliberate — receivers treat setpoint commands
/// idempotently, and a correction that arrives late is still applied.
///
/// Never touches physical state; its only output is setpoint commands
/// addressed to control agents.
pub struct SupervisoryAgent {
    id: AgentId,
    state_topic_a: Topic,
    state_topic_b: Topic,
    command_topic: Topic,
    observation_key: String,
    threshold: f64,
    corrective_setpoint: f64,
    level_a: Option<f64>,
    level_b: Option<f64>,
}

impl SupervisoryAgent {
    /// Watch `state_topic_a`/`state_topic_b`; on divergence beyond
    /// `threshold`, command `corrective_setpoint` on `command_topic`.
    pub fn new(
        id: AgentId,
        state_topic_a: Topic,
        state_topic_b: Topic,
        command_topic: Topic,
        threshold: f64,
        corrective_setpoint: f64,
    ) -> Self {
        Self {
            id,
            state_topic_a,
            state_topic_b,
            command_topic,
            observation_key: "water_level".to_owned(),
            threshold,
            corrective_setpoint,
            level_a: None,
            level_b: None,
        }
    }

    /// Observe a key other than `water_level`.
    pub fn with_observation_key(mut self, key: impl Into<String>) -> Self {
        self.observation_key = key.into();
        self
    }
}

impl Agent for SupervisoryAgent {
    fn id(&self) -> &AgentId {
        &self.id
    }

    fn subscriptions(&self) -> Vec<Topic> {
        vec![self.state_topic_a.clone(), self.state_topic_b.clone()]
    }

    fn on_message(
        &mut self,
        _ctx: &mut AgentContext<'_>,
        message: &Message,
    ) -> Result<(), AgentError> {
        let value = message.get_f64(&self.observation_key);
        if message.topic() == &self.state_topic_a {
            self.level_a = value.or(self.level_a);
        } else if message.topic() == &self.state_topic_b {
            self.level_b = value.or(self.level_b);
        }
        Ok(())
    }

    fn on_step(&mut self, ctx: &mut AgentContext<'_>) -> Result<(), AgentError> {
        let (Some(a), Some(b)) = (self.level_a, self.level_b) else {
            return Ok(());
        };
        let deviation = (a - b).abs();
        if deviation > self.threshold {
            warn!(
                agent = %self.id,
                deviation,
                threshold = self.threshold,
                "divergence detected, issuing corrective setpoint"
            );
            let topic = self.command_topic.clone();
            ctx.publish(topic, payload! { "setpoint" => self.corrective_setpoint });
        }
        Ok(())
    }
}
