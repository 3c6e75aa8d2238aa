//! The [`Agent`] trait and its activation context.

use indexmap::IndexMap;
use sluice_bus::{Message, MessageBus, Topic};
use sluice_core::{AgentError, AgentId, ComponentId, Payload, SimClock, StateMap};

/// Everything an agent may touch during one activation.
///
/// The context is built by the scheduler per activation and carries a
/// read-only clock, the publish capability, and read-only state
/// snapshots taken at the start of the step. Agents never hold
/// references to physical models or to each other; this context is the
/// entire surface.
pub struct AgentContext<'a> {
    clock: SimClock,
    bus: &'a mut MessageBus,
    snapshots: &'a IndexMap<ComponentId, StateMap>,
}

impl<'a> AgentContext<'a> {
    /// Build a context. Scheduler-only.
    pub fn new(
        clock: SimClock,
        bus: &'a mut MessageBus,
        snapshots: &'a IndexMap<ComponentId, StateMap>,
    ) -> Self {
        Self {
            clock,
            bus,
            snapshots,
        }
    }

    /// The simulation clock, read-only.
    pub fn clock(&self) -> SimClock {
        self.clock
    }

    /// Publish a payload. Delivery is step-buffered: subscribers see it
    /// no earlier than the next dispatch round.
    pub fn publish(&mut self, topic: impl Into<Topic>, payload: Payload) {
        self.bus.publish(topic.into(), payload, self.clock.step());
    }

    /// State snapshot of a component, taken at the start of this step.
    ///
    /// Snapshots are copies; mutating the returned map is impossible and
    /// the live model state is never aliased.
    pub fn state_of(&self, id: &ComponentId) -> Option<&StateMap> {
        self.snapshots.get(id)
    }
}

/// An independently scheduled unit of decision logic.
///
/// # Contract
///
/// - [`on_step`](Agent::on_step) runs once per step for every active
///   agent, in registration order, before message dispatch.
/// - [`on_message`](Agent::on_message) runs once per delivered message,
///   strictly sequentially per agent.
/// - Both may publish through the context; neither may block.
/// - A returned [`AgentError`] is recovered by the dispatcher: logged,
///   the agent's output for the step absent, the step proceeds.
///
/// Shutdown is handled by the engine: a `shutdown = true` payload on
/// `command/<agent_id>` deactivates the agent without the agent
/// implementing anything.
pub trait Agent: Send {
    /// The agent's unique id.
    fn id(&self) -> &AgentId;

    /// Topics this agent wants delivered to [`on_message`](Agent::on_message).
    ///
    /// Read once at assembly. The engine adds `command/<agent_id>` on
    /// top of these.
    fn subscriptions(&self) -> Vec<Topic> {
        Vec::new()
    }

    /// Periodic hook, called once per step while the agent is active.
    fn on_step(&mut self, _ctx: &mut AgentContext<'_>) -> Result<(), AgentError> {
        Ok(())
    }

    /// Event-driven hook, called once per delivered message.
    fn on_message(
        &mut self,
        _ctx: &mut AgentContext<'_>,
        _message: &Message,
    ) -> Result<(), AgentError> {
        Ok(())
    }
}

impl core::fmt::Debug for dyn Agent {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Agent").field("id", self.id()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_bus::SubscriberId;
    use sluice_core::payload;

    struct Echo {
        id: AgentId,
    }

    impl Agent for Echo {
        fn id(&self) -> &AgentId {
            &self.id
        }

        fn on_step(&mut self, ctx: &mut AgentContext<'_>) -> Result<(), AgentError> {
            ctx.publish("echo", payload! { "t" => ctx.clock().time() });
            Ok(())
        }
    }

    #[test]
    fn context_publish_is_step_buffered() {
        let mut bus = MessageBus::new();
        bus.subscribe(Topic::from("echo"), SubscriberId("sink".into()));
        let snapshots = IndexMap::new();
        let clock = SimClock::new(2.0);

        let mut agent = Echo {
            id: AgentId::new("echo_1"),
        };
        let mut ctx = AgentContext::new(clock, &mut bus, &snapshots);
        agent.on_step(&mut ctx).unwrap();

        assert!(bus.take_inbox(&SubscriberId("sink".into())).is_empty());
        bus.flush();
        let inbox = bus.take_inbox(&SubscriberId("sink".into()));
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].get_f64("t"), Some(0.0));
    }
}
