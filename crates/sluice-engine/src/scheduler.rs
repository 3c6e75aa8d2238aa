//! The time-stepped scheduler.
//!
//! One [`Scheduler`] owns everything a run needs: the bus, the models,
//! the topology, the agents, the clock, and the recorder. Each step
//! executes four phases in a fixed order:
//!
//! 1. **Ingress drain** — external commands submitted since the last
//!    step are applied (publishes staged, stop flag set).
//! 2. **Agent phase** — `on_step` for every active agent in
//!    registration order, then message dispatch rounds until the bus is
//!    quiescent: flush staged messages to inboxes, deliver each inbox
//!    sequentially, repeat. A message published in round *r* is
//!    delivered in round *r + 1*; the round budget bounds ping-pong.
//! 3. **Physical propagation** — models step once each in topological
//!    order, upstream before downstream, under zero-order-hold control
//!    inputs. Inflow is the sum of upstream outflows computed this step
//!    plus exogenous inflow delivered over the bus; demand is the sum
//!    of downstream previous-step outflows, keeping propagation
//!    strictly causal.
//! 4. **Recording** — post-transition state of every component is
//!    appended to the run record.
//!
//! The same scenario always produces the same record: iteration orders
//! are insertion orders, ties in the topology are broken by declaration
//! order, and dispatch is strictly sequential.

use crossbeam_channel::Receiver;
use indexmap::IndexMap;
use sluice_agent::{Agent, AgentContext};
use sluice_bus::{MessageBus, SubscriberId, Topic};
use sluice_core::{
    AgentId, ComponentId, Payload, SimClock, StateMap, StepError, StepId,
};
use sluice_model::StepInput;
use sluice_topology::Topology;
use tracing::{debug, info, warn};

use crate::config::{ConfigError, ScenarioSpec};
use crate::ingress::{ingress_channel, ExternalCommand, IngressHandle};
use crate::recorder::{RunRecord, StepRecord};
use crate::registry::{AgentRegistry, ModelRegistry};

struct ComponentEntry {
    model: Box<dyn sluice_model::PhysicalModel>,
    subscriber: SubscriberId,
    inflow_topic: Topic,
    /// Zero-order hold: last value received per control field.
    controls: Payload,
    /// Bus-delivered inflow accumulated this step, reset after use.
    exogenous_inflow: f64,
    /// Outflow committed at the end of the previous step.
    last_outflow: f64,
}

struct AgentEntry {
    agent: Box<dyn Agent>,
    subscriber: SubscriberId,
    command_topic: Topic,
    active: bool,
}

/// Assembled, runnable simulation.
pub struct Scheduler {
    clock: SimClock,
    total_steps: u64,
    max_dispatch_rounds: u32,
    bus: MessageBus,
    topology: Topology,
    components: IndexMap<ComponentId, ComponentEntry>,
    agents: IndexMap<AgentId, AgentEntry>,
    /// Start-of-step state snapshots handed to agents read-only.
    snapshots: IndexMap<ComponentId, StateMap>,
    record: RunRecord,
    ingress: IngressHandle,
    ingress_rx: Receiver<ExternalCommand>,
    stop_requested: bool,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("total_steps", &self.total_steps)
            .field("components", &self.components.keys().collect::<Vec<_>>())
            .field("agents", &self.agents.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    /// Assemble a scenario against explicit registries.
    ///
    /// Fails fast on every structural defect: bad timing, unknown
    /// kinds, duplicate ids, dangling edges, cycles, rejected
    /// parameters. Nothing is partially constructed on error.
    pub fn new(
        spec: &ScenarioSpec,
        models: &ModelRegistry,
        agents: &AgentRegistry,
    ) -> Result<Self, ConfigError> {
        let sim = &spec.simulation;
        let timing_ok = sim.dt.is_finite()
            && sim.dt > 0.0
            && sim.duration.is_finite()
            && sim.duration >= sim.dt;
        if !timing_ok {
            return Err(ConfigError::InvalidTiming {
                duration: sim.duration,
                dt: sim.dt,
            });
        }
        // Truncating division: a partial trailing step is not executed.
        let total_steps = (sim.duration / sim.dt) as u64;

        let edges: Vec<(ComponentId, ComponentId)> = spec
            .edges
            .iter()
            .map(|e| (e.upstream.clone(), e.downstream.clone()))
            .collect();
        let topology = Topology::build(spec.components.iter().map(|c| c.id.clone()), &edges)?;

        let mut bus = MessageBus::new();
        let mut components = IndexMap::new();
        for cspec in &spec.components {
            let model = models.build(cspec)?;
            let subscriber = SubscriberId::component(&cspec.id);
            let inflow_topic = Topic::inflow(&cspec.id);
            bus.subscribe(Topic::action(&cspec.id), subscriber.clone());
            bus.subscribe(inflow_topic.clone(), subscriber.clone());
            components.insert(
                cspec.id.clone(),
                ComponentEntry {
                    model,
                    subscriber,
                    inflow_topic,
                    controls: Payload::new(),
                    exogenous_inflow: 0.0,
                    last_outflow: 0.0,
                },
            );
        }

        let (ingress, ingress_rx) = ingress_channel();
        let mut scheduler = Self {
            clock: SimClock::new(sim.dt),
            total_steps,
            max_dispatch_rounds: sim.max_dispatch_rounds,
            bus,
            topology,
            components,
            agents: IndexMap::new(),
            snapshots: IndexMap::new(),
            record: RunRecord::new(sim.dt),
            ingress,
            ingress_rx,
            stop_requested: false,
        };
        for aspec in &spec.agents {
            let agent = agents.build(aspec)?;
            scheduler.add_agent(agent)?;
        }
        Ok(scheduler)
    }

    /// Assemble a scenario against the built-in registries.
    pub fn assemble(spec: &ScenarioSpec) -> Result<Self, ConfigError> {
        Self::new(spec, &ModelRegistry::default(), &AgentRegistry::default())
    }

    /// Register an agent built in code rather than from the scenario
    /// document (task managers, workers, test probes).
    ///
    /// Subscriptions are read once, here; the engine adds the agent's
    /// `command/<id>` topic on top of them.
    pub fn add_agent(&mut self, agent: Box<dyn Agent>) -> Result<(), ConfigError> {
        let id = agent.id().clone();
        if self.agents.contains_key(&id) {
            return Err(ConfigError::DuplicateAgent { id });
        }
        let subscriber = SubscriberId::agent(&id);
        for topic in agent.subscriptions() {
            self.bus.subscribe(topic, subscriber.clone());
        }
        let command_topic = Topic::command(&id);
        self.bus.subscribe(command_topic.clone(), subscriber.clone());
        self.agents.insert(
            id,
            AgentEntry {
                agent,
                subscriber,
                command_topic,
                active: true,
            },
        );
        Ok(())
    }

    /// A cloneable handle for submitting external commands.
    pub fn handle(&self) -> IngressHandle {
        self.ingress.clone()
    }

    /// The clock, read-only.
    pub fn clock(&self) -> SimClock {
        self.clock
    }

    /// Steps the run will execute in total.
    pub fn total_steps(&self) -> u64 {
        self.total_steps
    }

    /// Live state snapshot of one component.
    pub fn component_state(&self, id: &ComponentId) -> Option<StateMap> {
        self.components.get(id).map(|e| e.model.state())
    }

    /// Whether an agent is still active (not shut down).
    pub fn agent_active(&self, id: &AgentId) -> bool {
        self.agents.get(id).is_some_and(|e| e.active)
    }

    /// The record accumulated so far.
    pub fn record(&self) -> &RunRecord {
        &self.record
    }

    /// Execute steps until the duration is exhausted or a stop command
    /// arrives, returning the completed record.
    pub fn run(mut self) -> Result<RunRecord, StepError> {
        info!(
            steps = self.total_steps,
            dt = self.clock.dt(),
            components = self.components.len(),
            agents = self.agents.len(),
            "starting run"
        );
        while self.clock.step().0 < self.total_steps && !self.stop_requested {
            self.step()?;
        }
        info!(completed = self.record.len(), "run finished");
        Ok(self.record)
    }

    /// Execute exactly one step.
    pub fn step(&mut self) -> Result<(), StepError> {
        let step = self.clock.step();
        self.drain_ingress(step);
        self.take_snapshots();
        self.agent_phase();
        self.dispatch_rounds(step)?;
        self.propagate(step)?;
        self.record_step();
        self.clock.advance();
        Ok(())
    }

    // ── Step phases ────────────────────────────────────────────────

    fn drain_ingress(&mut self, step: StepId) {
        for command in self.ingress_rx.try_iter() {
            match command {
                ExternalCommand::Publish { topic, payload } => {
                    self.bus.publish(topic, payload, step);
                }
                ExternalCommand::Stop => {
                    info!(step = %step, "stop requested; finishing current step");
                    self.stop_requested = true;
                }
            }
        }
    }

    fn take_snapshots(&mut self) {
        for (id, entry) in &self.components {
            self.snapshots.insert(id.clone(), entry.model.state());
        }
    }

    fn agent_phase(&mut self) {
        let clock = self.clock;
        for i in 0..self.agents.len() {
            let Some((id, entry)) = self.agents.get_index_mut(i) else {
                continue;
            };
            if !entry.active {
                continue;
            }
            let mut ctx = AgentContext::new(clock, &mut self.bus, &self.snapshots);
            if let Err(e) = entry.agent.on_step(&mut ctx) {
                warn!(
                    agent = %id,
                    step = %clock.step(),
                    error = %e,
                    "on_step failed; output absent this step"
                );
            }
        }
    }

    /// Flush-and-deliver until the bus is quiescent or the budget runs
    /// out. Each round makes the previous round's publishes visible.
    fn dispatch_rounds(&mut self, step: StepId) -> Result<(), StepError> {
        let mut round: u32 = 0;
        while self.bus.has_pending() {
            if round >= self.max_dispatch_rounds {
                // Move any staged stragglers into inboxes so the error
                // names the subscriber that would have received them.
                self.bus.flush();
                return Err(StepError::DispatchBudgetExhausted {
                    step,
                    rounds: self.max_dispatch_rounds,
                    agent: self.backlogged_agent(),
                });
            }
            self.bus.flush();
            self.deliver_to_agents();
            self.deliver_to_components();
            round += 1;
        }
        Ok(())
    }

    fn deliver_to_agents(&mut self) {
        let clock = self.clock;
        for i in 0..self.agents.len() {
            let Some((_, entry)) = self.agents.get_index_mut(i) else {
                continue;
            };
            let subscriber = entry.subscriber.clone();
            for message in self.bus.take_inbox(&subscriber) {
                let is_shutdown = message.topic() == &entry.command_topic
                    && message.get_bool("shutdown") == Some(true);
                if is_shutdown {
                    if entry.active {
                        info!(agent = %entry.agent.id(), "shutdown command; deactivating");
                        entry.active = false;
                        self.bus.unsubscribe_all(&subscriber);
                    }
                    continue;
                }
                if !entry.active {
                    // Drained to a no-op: queued messages of a shut-down
                    // agent are consumed, never handled.
                    continue;
                }
                let mut ctx = AgentContext::new(clock, &mut self.bus, &self.snapshots);
                if let Err(e) = entry.agent.on_message(&mut ctx, &message) {
                    warn!(
                        agent = %entry.agent.id(),
                        topic = %message.topic(),
                        step = %clock.step(),
                        error = %e,
                        "on_message failed; message dropped"
                    );
                }
            }
        }
    }

    /// Route control and inflow messages into component input holds.
    fn deliver_to_components(&mut self) {
        for i in 0..self.components.len() {
            let Some((id, entry)) = self.components.get_index_mut(i) else {
                continue;
            };
            let subscriber = entry.subscriber.clone();
            for message in self.bus.take_inbox(&subscriber) {
                if message.topic() == &entry.inflow_topic {
                    match message.get_f64("inflow_rate") {
                        Some(rate) => entry.exogenous_inflow += rate,
                        None => {
                            debug!(component = %id, "inflow message without 'inflow_rate'; ignored");
                        }
                    }
                } else {
                    // Control input: last write per field wins, held
                    // until overwritten.
                    for (key, value) in message.payload() {
                        entry.controls.insert(key.clone(), value.clone());
                    }
                }
            }
        }
    }

    fn backlogged_agent(&self) -> AgentId {
        match self.bus.first_backlogged() {
            Some(sub) => self
                .agents
                .iter()
                .find(|(_, e)| &e.subscriber == sub)
                .map(|(id, _)| id.clone())
                .unwrap_or_else(|| AgentId::new(sub.0.clone())),
            None => AgentId::new("unknown"),
        }
    }

    fn propagate(&mut self, step: StepId) -> Result<(), StepError> {
        let dt = self.clock.dt();
        let order: Vec<ComponentId> = self.topology.order().to_vec();
        let mut outflows: IndexMap<ComponentId, f64> = IndexMap::with_capacity(order.len());

        for id in &order {
            let mut inflow = self.components[id].exogenous_inflow;
            for up in self.topology.upstream(id) {
                inflow += outflows.get(up).copied().unwrap_or(0.0);
            }
            let mut demand = 0.0;
            for down in self.topology.downstream(id) {
                demand += self.components[down].last_outflow;
            }
            // Upstream models already stepped this walk; downstream
            // heads are previous-step values.
            let upstream_head = self
                .topology
                .upstream(id)
                .iter()
                .find_map(|u| self.components[u].model.head());
            let downstream_head = self
                .topology
                .downstream(id)
                .iter()
                .find_map(|d| self.components[d].model.head());

            let Some(entry) = self.components.get_mut(id) else {
                continue;
            };
            let input = StepInput {
                inflow,
                demand,
                upstream_head,
                downstream_head,
                controls: &entry.controls,
            };
            let output =
                entry
                    .model
                    .step(dt, &input)
                    .map_err(|reason| StepError::ModelFailed {
                        component: id.clone(),
                        step,
                        reason,
                    })?;
            outflows.insert(id.clone(), output.outflow);
        }

        // Commit after the whole walk so demand reads stay previous-step.
        for (id, outflow) in &outflows {
            if let Some(entry) = self.components.get_mut(id) {
                entry.last_outflow = *outflow;
                entry.exogenous_inflow = 0.0;
            }
        }
        Ok(())
    }

    fn record_step(&mut self) {
        let mut states = IndexMap::with_capacity(self.components.len());
        for (id, entry) in &self.components {
            states.insert(id.clone(), entry.model.state());
        }
        self.record.push(StepRecord {
            step: self.clock.step(),
            time: self.clock.time(),
            states,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_core::{payload, AgentError};

    fn reservoir_scenario(duration: f64, dt: f64) -> ScenarioSpec {
        serde_json::from_value(serde_json::json!({
            "simulation": { "duration": duration, "dt": dt },
            "components": [
                { "id": "res_1", "kind": "reservoir",
                  "initial_state": { "water_level": 50.0 },
                  "parameters": { "surface_area": 1.0e6 } }
            ],
            "edges": [],
            "agents": [
                { "id": "inflow_1", "kind": "constant_inflow",
                  "config": { "target_id": "res_1", "rate": 100.0 } }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn run_executes_floor_of_duration_over_dt_steps() {
        let spec = reservoir_scenario(10.5, 1.0);
        let record = Scheduler::assemble(&spec).unwrap().run().unwrap();
        assert_eq!(record.len(), 10);
    }

    #[test]
    fn constant_inflow_raises_the_level_by_mass_balance() {
        let spec = reservoir_scenario(3.0, 1.0);
        let record = Scheduler::assemble(&spec).unwrap().run().unwrap();
        let levels = record.series(&ComponentId::new("res_1"), "water_level");
        // 100 m³/s into 1e6 m² raises 1e-4 m per second. The inflow
        // message is published in step 0's agent phase and applied in
        // step 0's propagation, so every recorded level already moved.
        assert!((levels[0] - 50.0001).abs() < 1e-9);
        assert!((levels[2] - 50.0003).abs() < 1e-9);
    }

    #[test]
    fn stop_command_finishes_the_step_in_progress() {
        let spec = reservoir_scenario(100.0, 1.0);
        let scheduler = Scheduler::assemble(&spec).unwrap();
        let handle = scheduler.handle();
        assert!(handle.stop());
        let record = scheduler.run().unwrap();
        assert_eq!(record.len(), 1);
    }

    #[test]
    fn external_shutdown_deactivates_an_agent() {
        let spec = reservoir_scenario(10.0, 1.0);
        let mut scheduler = Scheduler::assemble(&spec).unwrap();
        let handle = scheduler.handle();
        handle.publish(
            Topic::command(&AgentId::new("inflow_1")),
            payload! { "shutdown" => true },
        );
        scheduler.step().unwrap();
        assert!(!scheduler.agent_active(&AgentId::new("inflow_1")));

        // No inflow published after deactivation.
        let before = scheduler
            .component_state(&ComponentId::new("res_1"))
            .unwrap()["water_level"]
            .as_f64()
            .unwrap();
        scheduler.step().unwrap();
        let after = scheduler
            .component_state(&ComponentId::new("res_1"))
            .unwrap()["water_level"]
            .as_f64()
            .unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn cyclic_edges_fail_assembly() {
        let spec: ScenarioSpec = serde_json::from_value(serde_json::json!({
            "simulation": { "duration": 10.0, "dt": 1.0 },
            "components": [
                { "id": "a", "kind": "reservoir",
                  "initial_state": { "water_level": 1.0 },
                  "parameters": { "surface_area": 1.0 } },
                { "id": "b", "kind": "reservoir",
                  "initial_state": { "water_level": 1.0 },
                  "parameters": { "surface_area": 1.0 } }
            ],
            "edges": [
                { "upstream": "a", "downstream": "b" },
                { "upstream": "b", "downstream": "a" }
            ]
        }))
        .unwrap();
        assert!(matches!(
            Scheduler::assemble(&spec).unwrap_err(),
            ConfigError::Topology(_)
        ));
    }

    #[test]
    fn non_positive_dt_fails_assembly() {
        let mut spec = reservoir_scenario(10.0, 1.0);
        spec.simulation.dt = 0.0;
        assert!(matches!(
            Scheduler::assemble(&spec).unwrap_err(),
            ConfigError::InvalidTiming { .. }
        ));
    }

    #[test]
    fn duplicate_agent_ids_fail_assembly() {
        let mut spec = reservoir_scenario(10.0, 1.0);
        spec.agents.push(spec.agents[0].clone());
        assert!(matches!(
            Scheduler::assemble(&spec).unwrap_err(),
            ConfigError::DuplicateAgent { .. }
        ));
    }

    /// An agent that republishes every message it receives to the same
    /// topic, so dispatch can never quiesce.
    struct Echoer {
        id: AgentId,
    }

    impl Agent for Echoer {
        fn id(&self) -> &AgentId {
            &self.id
        }

        fn subscriptions(&self) -> Vec<Topic> {
            vec![Topic::from("loop")]
        }

        fn on_step(&mut self, ctx: &mut AgentContext<'_>) -> Result<(), AgentError> {
            if ctx.clock().step() == StepId(0) {
                ctx.publish("loop", payload! { "n" => 0_i64 });
            }
            Ok(())
        }

        fn on_message(
            &mut self,
            ctx: &mut AgentContext<'_>,
            _message: &sluice_bus::Message,
        ) -> Result<(), AgentError> {
            ctx.publish("loop", payload! { "n" => 1_i64 });
            Ok(())
        }
    }

    #[test]
    fn ping_pong_exhausts_the_dispatch_budget() {
        let mut spec = reservoir_scenario(10.0, 1.0);
        spec.agents.clear();
        spec.simulation.max_dispatch_rounds = 8;
        let mut scheduler = Scheduler::assemble(&spec).unwrap();
        scheduler
            .add_agent(Box::new(Echoer {
                id: AgentId::new("echo"),
            }))
            .unwrap();
        let err = scheduler.run().unwrap_err();
        match err {
            StepError::DispatchBudgetExhausted { rounds, agent, .. } => {
                assert_eq!(rounds, 8);
                assert_eq!(agent.as_str(), "echo");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn runs_are_reproducible() {
        let spec = reservoir_scenario(20.0, 1.0);
        let a = Scheduler::assemble(&spec).unwrap().run().unwrap();
        let b = Scheduler::assemble(&spec).unwrap().run().unwrap();
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    proptest::proptest! {
        #![proptest_config(proptest::prelude::ProptestConfig::with_cases(16))]

        /// Reproducibility holds for arbitrary inflow rates and step
        /// sizes, not just the hand-picked ones above.
        #[test]
        fn reproducibility_over_arbitrary_rates(
            rate in 0.0f64..500.0,
            dt in 0.5f64..60.0,
        ) {
            let mut spec = reservoir_scenario(20.0 * dt, dt);
            spec.agents[0]
                .config
                .insert("rate".to_owned(), sluice_core::Value::Float(rate));
            let a = Scheduler::assemble(&spec).unwrap().run().unwrap();
            let b = Scheduler::assemble(&spec).unwrap().run().unwrap();
            proptest::prop_assert_eq!(
                serde_json::to_string(&a).unwrap(),
                serde_json::to_string(&b).unwrap()
            );
        }
    }
}
