//! The digital twin (perception) agent.

use indexmap::IndexMap;
use sluice_core::{AgentError, AgentId, ComponentId, Value};
use sluice_bus::Topic;

use crate::agent::{Agent, AgentContext};

/// Mirrors one physical component's state onto the bus.
///
/// Each step it takes the component's snapshot from the context,
/// optionally applies exponential-moving-average smoothing to
/// configured numeric keys, and republishes the result on its state
/// topic. Stateless beyond the id/topic binding and the EMA memory.
pub struct DigitalTwinAgent {
    id: AgentId,
    component: ComponentId,
    state_topic: Topic,
    /// key -> alpha. Empty map disables smoothing.
    smoothing: IndexMap<String, f64>,
    smoothed: IndexMap<String, f64>,
}

impl DigitalTwinAgent {
    /// Twin `component`, publishing snapshots on `state_topic`.
    pub fn new(id: AgentId, component: ComponentId, state_topic: Topic) -> Self {
        Self {
            id,
            component,
            state_topic,
            smoothing: IndexMap::new(),
            smoothed: IndexMap::new(),
        }
    }

    /// Enable EMA smoothing for `key` with factor `alpha` in `(0, 1]`.
    pub fn with_smoothing(mut self, key: impl Into<String>, alpha: f64) -> Self {
        self.smoothing.insert(key.into(), alpha);
        self
    }
}

impl Agent for DigitalTwinAgent {
    fn id(&self) -> &AgentId {
        &self.id
    }

    fn on_step(&mut self, ctx: &mut AgentContext<'_>) -> Result<(), AgentError> {
        let snapshot = ctx
            .state_of(&self.component)
            .ok_or_else(|| AgentError::Failed {
                reason: format!("no snapshot for component '{}'", self.component),
            })?;

        let mut published = snapshot.clone();
        for (key, alpha) in &self.smoothing {
            let Some(raw) = published.get(key).and_then(|v| v.as_f64()) else {
                continue;
            };
            let last = self.smoothed.get(key).copied().unwrap_or(raw);
            let next = alpha * raw + (1.0 - alpha) * last;
            self.smoothed.insert(key.clone(), next);
            published.insert(key.clone(), Value::Float(next));
        }

        let topic = self.state_topic.clone();
        ctx.publish(topic, published);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_bus::{MessageBus, SubscriberId};
    use sluice_core::{payload, SimClock};

    #[test]
    fn republishes_snapshot_each_step() {
        let mut bus = MessageBus::new();
        bus.subscribe(Topic::from("state/res_1"), SubscriberId("sink".into()));
        let mut snapshots = IndexMap::new();
        snapshots.insert(
            ComponentId::new("res_1"),
            payload! { "water_level" => 51.3 },
        );

        let mut twin = DigitalTwinAgent::new(
            AgentId::new("twin_1"),
            ComponentId::new("res_1"),
            Topic::from("state/res_1"),
        );
        let mut ctx = AgentContext::new(SimClock::new(1.0), &mut bus, &snapshots);
        twin.on_step(&mut ctx).unwrap();

        bus.flush();
        let inbox = bus.take_inbox(&SubscriberId("sink".into()));
        assert_eq!(inbox[0].get_f64("water_level"), Some(51.3));
    }

    #[test]
    fn smoothing_converges_toward_raw_value() {
        let mut bus = MessageBus::new();
        bus.subscribe(Topic::from("state/res_1"), SubscriberId("sink".into()));
        let mut snapshots = IndexMap::new();
        snapshots.insert(ComponentId::new("res_1"), payload! { "water_level" => 10.0 });

        let mut twin = DigitalTwinAgent::new(
            AgentId::new("twin_1"),
            ComponentId::new("res_1"),
            Topic::from("state/res_1"),
        )
        .with_smoothing("water_level", 0.5);

        // First observation seeds the EMA with the raw value.
        let mut ctx = AgentContext::new(SimClock::new(1.0), &mut bus, &snapshots);
        twin.on_step(&mut ctx).unwrap();
        bus.flush();
        let first = bus.take_inbox(&SubscriberId("sink".into()))[0]
            .get_f64("water_level")
            .unwrap();
        assert_eq!(first, 10.0);

        // A jump is attenuated.
        snapshots.insert(ComponentId::new("res_1"), payload! { "water_level" => 20.0 });
        let mut ctx = AgentContext::new(SimClock::new(1.0), &mut bus, &snapshots);
        twin.on_step(&mut ctx).unwrap();
        bus.flush();
        let second = bus.take_inbox(&SubscriberId("sink".into()))[0]
            .get_f64("water_level")
            .unwrap();
        assert_eq!(second, 15.0);
    }

    #[test]
    fn missing_component_is_an_agent_error() {
        let mut bus = MessageBus::new();
        let snapshots = IndexMap::new();
        let mut twin = DigitalTwinAgent::new(
            AgentId::new("twin_1"),
            ComponentId::new("ghost"),
            Topic::from("state/ghost"),
        );
        let mut ctx = AgentContext::new(SimClock::new(1.0), &mut bus, &snapshots);
        assert!(twin.on_step(&mut ctx).is_err());
    }
}
