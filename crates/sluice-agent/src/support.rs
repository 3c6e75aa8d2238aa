//! Data-injection and scripted disturbance agents.

use sluice_bus::Topic;
use sluice_core::{payload, AgentError, AgentId, Payload};
use tracing::info;

use crate::agent::{Agent, AgentContext};

/// Publishes a constant exogenous inflow every step.
///
/// The payload shape (`inflow_rate`) matches what the engine's inflow
/// bindings and storage models consume.
pub struct ConstantInflowAgent {
    id: AgentId,
    topic: Topic,
    rate: f64,
}

impl ConstantInflowAgent {
    /// Publish `rate` m³/s on `topic` each step.
    pub fn new(id: AgentId, topic: Topic, rate: f64) -> Self {
        Self { id, topic, rate }
    }
}

impl Agent for ConstantInflowAgent {
    fn id(&self) -> &AgentId {
        &self.id
    }

    fn on_step(&mut self, ctx: &mut AgentContext<'_>) -> Result<(), AgentError> {
        let topic = self.topic.clone();
        ctx.publish(topic, payload! { "inflow_rate" => self.rate });
        Ok(())
    }
}

/// Publishes a fixed payload once, at the first step at or after a
/// configured simulated time.
///
/// Covers scripted dispatch scenarios ("central command issues a new
/// setpoint at t = 200 s") without a bespoke agent kind per scenario.
pub struct TimedCommandAgent {
    id: AgentId,
    topic: Topic,
    payload: Payload,
    at_time: f64,
    sent: bool,
}

impl TimedCommandAgent {
    /// Publish `payload` on `topic` at the first step where
    /// `time >= at_time`.
    pub fn new(id: AgentId, topic: Topic, payload: Payload, at_time: f64) -> Self {
        Self {
            id,
            topic,
            payload,
            at_time,
            sent: false,
        }
    }
}

impl Agent for TimedCommandAgent {
    fn id(&self) -> &AgentId {
        &self.id
    }

    fn on_step(&mut self, ctx: &mut AgentContext<'_>) -> Result<(), AgentError> {
        if !self.sent && ctx.clock().time() >= self.at_time {
            info!(agent = %self.id, time = ctx.clock().time(), "issuing scheduled command");
            let topic = self.topic.clone();
            ctx.publish(topic, self.payload.clone());
            self.sent = true;
        }
        Ok(())
    }
}

/// Shuts another agent down at a configured simulated time.
///
/// Publishes `shutdown = true` on the target's command topic; the
/// engine intercepts it and deactivates the target.
pub struct FailureInjectionAgent {
    id: AgentId,
    target: AgentId,
    at_time: f64,
    injected: bool,
}

impl FailureInjectionAgent {
    /// Shut `target` down at the first step where `time >= at_time`.
    pub fn new(id: AgentId, target: AgentId, at_time: f64) -> Self {
        Self {
            id,
            target,
            at_time,
            injected: false,
        }
    }
}

impl Agent for FailureInjectionAgent {
    fn id(&self) -> &AgentId {
        &self.id
    }

    fn on_step(&mut self, ctx: &mut AgentContext<'_>) -> Result<(), AgentError> {
        if !self.injected && ctx.clock().time() >= self.at_time {
            info!(agent = %self.id, target = %self.target, "injecting agent failure");
            let topic = Topic::command(&self.target);
            ctx.publish(topic, payload! { "shutdown" => true });
            self.injected = true;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use sluice_bus::{MessageBus, SubscriberId};
    use sluice_core::SimClock;

    #[test]
    fn timed_command_fires_once_at_or_after_deadline() {
        let mut bus = MessageBus::new();
        bus.subscribe(Topic::from("command/ctrl"), SubscriberId("sink".into()));
        let snapshots = IndexMap::new();
        let mut agent = TimedCommandAgent::new(
            AgentId::new("dispatch"),
            Topic::from("command/ctrl"),
            payload! { "setpoint" => 48.0 },
            200.0,
        );

        let mut clock = SimClock::new(60.0);
        let mut fired_at = None;
        for _ in 0..6 {
            let mut ctx = AgentContext::new(clock, &mut bus, &snapshots);
            agent.on_step(&mut ctx).unwrap();
            bus.flush();
            if !bus.take_inbox(&SubscriberId("sink".into())).is_empty() && fired_at.is_none() {
                fired_at = Some(clock.time());
            }
            clock.advance();
        }
        // dt = 60: first step at or after 200 s is t = 240 s.
        assert_eq!(fired_at, Some(240.0));
    }

    #[test]
    fn failure_injection_targets_the_command_topic() {
        let mut bus = MessageBus::new();
        bus.subscribe(
            Topic::from("command/ctrl_b"),
            SubscriberId("sink".into()),
        );
        let snapshots = IndexMap::new();
        let mut agent =
            FailureInjectionAgent::new(AgentId::new("chaos"), AgentId::new("ctrl_b"), 0.0);
        let mut ctx = AgentContext::new(SimClock::new(1.0), &mut bus, &snapshots);
        agent.on_step(&mut ctx).unwrap();
        bus.flush();
        let inbox = bus.take_inbox(&SubscriberId("sink".into()));
        assert_eq!(inbox[0].get_bool("shutdown"), Some(true));
    }
}
