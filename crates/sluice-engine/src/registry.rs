//! Kind registries mapping scenario strings to constructors.
//!
//! Both registries ship with the built-in kinds pre-registered and
//! accept additional kinds from embedding code, so a scenario document
//! can name custom models and agents without the engine knowing them.

use indexmap::IndexMap;
use sluice_agent::{
    Agent, BangBang, ConstantInflowAgent, ControlAgent, ControlLaw, DigitalTwinAgent,
    FailureInjectionAgent, Pid, SupervisoryAgent, TimedCommandAgent,
};
use sluice_bus::Topic;
use sluice_core::{payload, AgentId, ComponentId, ModelError};
use sluice_model::{Canal, Gate, PhysicalModel, Reservoir};

use crate::config::{AgentSpec, ComponentSpec, ConfigError};

/// Builds one model from its component spec.
pub type ModelCtor =
    Box<dyn Fn(&ComponentSpec) -> Result<Box<dyn PhysicalModel>, ModelError> + Send + Sync>;

/// Builds one agent from its agent spec.
pub type AgentCtor = Box<dyn Fn(&AgentSpec) -> Result<Box<dyn Agent>, ConfigError> + Send + Sync>;

// ── ModelRegistry ──────────────────────────────────────────────────

/// Resolves component `kind` strings to model constructors.
pub struct ModelRegistry {
    ctors: IndexMap<String, ModelCtor>,
}

impl ModelRegistry {
    /// A registry with no kinds. Use [`Default`] for the built-ins.
    pub fn empty() -> Self {
        Self {
            ctors: IndexMap::new(),
        }
    }

    /// Register a kind, replacing any previous constructor for it.
    pub fn register(&mut self, kind: impl Into<String>, ctor: ModelCtor) {
        self.ctors.insert(kind.into(), ctor);
    }

    /// The registered kinds, in registration order.
    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.ctors.keys().map(String::as_str)
    }

    /// Build the model for `spec`.
    pub fn build(&self, spec: &ComponentSpec) -> Result<Box<dyn PhysicalModel>, ConfigError> {
        let ctor = self
            .ctors
            .get(&spec.kind)
            .ok_or_else(|| ConfigError::UnknownModelKind {
                id: spec.id.clone(),
                kind: spec.kind.clone(),
            })?;
        ctor(spec).map_err(|reason| ConfigError::BadModel {
            id: spec.id.clone(),
            reason,
        })
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        let mut reg = Self::empty();
        reg.register(
            Reservoir::KIND,
            Box::new(|spec: &ComponentSpec| {
                Ok(Box::new(Reservoir::from_spec(
                    &spec.initial_state,
                    &spec.parameters,
                )?) as Box<dyn PhysicalModel>)
            }),
        );
        reg.register(
            Gate::KIND,
            Box::new(|spec: &ComponentSpec| {
                Ok(Box::new(Gate::from_spec(&spec.initial_state, &spec.parameters)?)
                    as Box<dyn PhysicalModel>)
            }),
        );
        reg.register(
            Canal::KIND,
            Box::new(|spec: &ComponentSpec| {
                Ok(
                    Box::new(Canal::from_spec(&spec.initial_state, &spec.parameters)?)
                        as Box<dyn PhysicalModel>,
                )
            }),
        );
        reg
    }
}

// ── AgentRegistry ──────────────────────────────────────────────────

/// Resolves agent `kind` strings to agent constructors.
///
/// Built-in kinds and their config fields:
///
/// | kind | required | optional |
/// |------|----------|----------|
/// | `digital_twin` | `component_id` | `smoothing_key`, `smoothing_alpha` |
/// | `control` | `law`, `setpoint`, `observed_id`, `controlled_id` | `observation_key`, `action_key`, law gains |
/// | `supervisory` | `observed_id_a`, `observed_id_b`, `target_agent`, `threshold`, `corrective_setpoint` | `observation_key` |
/// | `constant_inflow` | `target_id`, `rate` | |
/// | `timed_setpoint` | `target_agent`, `setpoint`, `at_time` | |
/// | `failure_injection` | `target_agent`, `at_time` | |
///
/// Task manager and worker agents carry non-flat state (task batches,
/// closures) and are added programmatically via
/// [`Scheduler::add_agent`](crate::Scheduler::add_agent) instead.
pub struct AgentRegistry {
    ctors: IndexMap<String, AgentCtor>,
}

impl AgentRegistry {
    /// A registry with no kinds. Use [`Default`] for the built-ins.
    pub fn empty() -> Self {
        Self {
            ctors: IndexMap::new(),
        }
    }

    /// Register a kind, replacing any previous constructor for it.
    pub fn register(&mut self, kind: impl Into<String>, ctor: AgentCtor) {
        self.ctors.insert(kind.into(), ctor);
    }

    /// The registered kinds, in registration order.
    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.ctors.keys().map(String::as_str)
    }

    /// Build the agent for `spec`.
    pub fn build(&self, spec: &AgentSpec) -> Result<Box<dyn Agent>, ConfigError> {
        let ctor = self
            .ctors
            .get(&spec.kind)
            .ok_or_else(|| ConfigError::UnknownAgentKind {
                id: spec.id.clone(),
                kind: spec.kind.clone(),
            })?;
        ctor(spec)
    }
}

impl Default for AgentRegistry {
    fn default() -> Self {
        let mut reg = Self::empty();
        reg.register("digital_twin", Box::new(build_digital_twin));
        reg.register("control", Box::new(build_control));
        reg.register("supervisory", Box::new(build_supervisory));
        reg.register("constant_inflow", Box::new(build_constant_inflow));
        reg.register("timed_setpoint", Box::new(build_timed_setpoint));
        reg.register("failure_injection", Box::new(build_failure_injection));
        reg
    }
}

// ── Config field accessors ─────────────────────────────────────────

fn cfg_f64(spec: &AgentSpec, key: &str) -> Result<f64, ConfigError> {
    spec.config
        .get(key)
        .and_then(|v| v.as_f64())
        .filter(|v| v.is_finite())
        .ok_or_else(|| ConfigError::agent(&spec.id, format!("missing or non-numeric '{key}'")))
}

fn cfg_f64_or(spec: &AgentSpec, key: &str, default: f64) -> Result<f64, ConfigError> {
    match spec.config.get(key) {
        None => Ok(default),
        Some(v) => v
            .as_f64()
            .filter(|v| v.is_finite())
            .ok_or_else(|| ConfigError::agent(&spec.id, format!("non-numeric '{key}'"))),
    }
}

fn cfg_str<'a>(spec: &'a AgentSpec, key: &str) -> Result<&'a str, ConfigError> {
    spec.config
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| ConfigError::agent(&spec.id, format!("missing or non-text '{key}'")))
}

fn cfg_str_or<'a>(spec: &'a AgentSpec, key: &str, default: &'a str) -> Result<&'a str, ConfigError> {
    match spec.config.get(key) {
        None => Ok(default),
        Some(v) => v
            .as_str()
            .ok_or_else(|| ConfigError::agent(&spec.id, format!("non-text '{key}'"))),
    }
}

// ── Built-in agent constructors ────────────────────────────────────

fn build_digital_twin(spec: &AgentSpec) -> Result<Box<dyn Agent>, ConfigError> {
    let component = ComponentId::new(cfg_str(spec, "component_id")?);
    let state_topic = Topic::state(&component);
    let mut agent = DigitalTwinAgent::new(spec.id.clone(), component, state_topic);
    if let Some(key) = spec.config.get("smoothing_key") {
        let key = key
            .as_str()
            .ok_or_else(|| ConfigError::agent(&spec.id, "non-text 'smoothing_key'"))?;
        let alpha = cfg_f64(spec, "smoothing_alpha")?;
        if !(0.0..=1.0).contains(&alpha) {
            return Err(ConfigError::agent(
                &spec.id,
                "'smoothing_alpha' must be in [0, 1]",
            ));
        }
        agent = agent.with_smoothing(key, alpha);
    }
    Ok(Box::new(agent))
}

fn build_law(spec: &AgentSpec) -> Result<Box<dyn ControlLaw>, ConfigError> {
    let setpoint = cfg_f64(spec, "setpoint")?;
    match cfg_str(spec, "law")? {
        "bang_bang" => {
            let mut law = BangBang::new(setpoint);
            let deadband = cfg_f64_or(spec, "deadband", 0.0)?;
            if deadband != 0.0 {
                law = law.with_deadband(deadband);
            }
            if spec.config.contains_key("open_value") || spec.config.contains_key("close_value") {
                law = law.with_commands(
                    cfg_f64(spec, "open_value")?,
                    cfg_f64(spec, "close_value")?,
                );
            }
            Ok(Box::new(law))
        }
        "pid" => Ok(Box::new(Pid::new(
            cfg_f64(spec, "kp")?,
            cfg_f64(spec, "ki")?,
            cfg_f64(spec, "kd")?,
            setpoint,
            cfg_f64(spec, "min_output")?,
            cfg_f64(spec, "max_output")?,
        ))),
        other => Err(ConfigError::agent(
            &spec.id,
            format!("unknown control law '{other}'"),
        )),
    }
}

fn build_control(spec: &AgentSpec) -> Result<Box<dyn Agent>, ConfigError> {
    let law = build_law(spec)?;
    let observed = ComponentId::new(cfg_str(spec, "observed_id")?);
    let controlled = ComponentId::new(cfg_str(spec, "controlled_id")?);
    let observation_key = cfg_str_or(spec, "observation_key", "water_level")?.to_owned();
    let action_key = cfg_str_or(spec, "action_key", "opening")?.to_owned();
    let agent = ControlAgent::new(
        spec.id.clone(),
        law,
        Topic::state(&observed),
        observation_key,
        Topic::action(&controlled),
        action_key,
    )
    .with_command_topic(Topic::command(&spec.id));
    Ok(Box::new(agent))
}

fn build_supervisory(spec: &AgentSpec) -> Result<Box<dyn Agent>, ConfigError> {
    let a = ComponentId::new(cfg_str(spec, "observed_id_a")?);
    let b = ComponentId::new(cfg_str(spec, "observed_id_b")?);
    let target = AgentId::new(cfg_str(spec, "target_agent")?);
    let mut agent = SupervisoryAgent::new(
        spec.id.clone(),
        Topic::state(&a),
        Topic::state(&b),
        Topic::command(&target),
        cfg_f64(spec, "threshold")?,
        cfg_f64(spec, "corrective_setpoint")?,
    );
    if let Some(key) = spec.config.get("observation_key") {
        let key = key
            .as_str()
            .ok_or_else(|| ConfigError::agent(&spec.id, "non-text 'observation_key'"))?;
        agent = agent.with_observation_key(key);
    }
    Ok(Box::new(agent))
}

fn build_constant_inflow(spec: &AgentSpec) -> Result<Box<dyn Agent>, ConfigError> {
    let target = ComponentId::new(cfg_str(spec, "target_id")?);
    Ok(Box::new(ConstantInflowAgent::new(
        spec.id.clone(),
        Topic::inflow(&target),
        cfg_f64(spec, "rate")?,
    )))
}

fn build_timed_setpoint(spec: &AgentSpec) -> Result<Box<dyn Agent>, ConfigError> {
    let target = AgentId::new(cfg_str(spec, "target_agent")?);
    Ok(Box::new(TimedCommandAgent::new(
        spec.id.clone(),
        Topic::command(&target),
        payload! { "setpoint" => cfg_f64(spec, "setpoint")? },
        cfg_f64(spec, "at_time")?,
    )))
}

fn build_failure_injection(spec: &AgentSpec) -> Result<Box<dyn Agent>, ConfigError> {
    let target = AgentId::new(cfg_str(spec, "target_agent")?);
    Ok(Box::new(FailureInjectionAgent::new(
        spec.id.clone(),
        target,
        cfg_f64(spec, "at_time")?,
    )))
}
