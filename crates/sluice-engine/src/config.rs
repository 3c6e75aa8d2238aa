//! Scenario documents, validation, and configuration errors.
//!
//! A [`ScenarioSpec`] is the declarative input for one simulation:
//! timing, components, edges, agents. It deserializes from JSON (or any
//! serde format) and is validated structurally when the
//! [`Scheduler`](crate::Scheduler) assembles it — every error a scenario
//! author can make surfaces before step zero, never mid-run.

use std::error::Error;
use std::fmt;

use serde::{Deserialize, Serialize};
use sluice_core::{AgentId, ComponentId, ModelError, Payload, StateMap};
use sluice_topology::TopologyError;

// ── Scenario documents ─────────────────────────────────────────────

/// Timing and dispatch limits for one run.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SimulationSpec {
    /// Total simulated duration in seconds.
    pub duration: f64,
    /// Fixed step size in seconds. The run executes
    /// `floor(duration / dt)` steps.
    pub dt: f64,
    /// Upper bound on message dispatch rounds per step. Exhausting it
    /// aborts the run; the default is generous enough for multi-round
    /// protocols like task distribution.
    #[serde(default = "default_max_dispatch_rounds")]
    pub max_dispatch_rounds: u32,
}

fn default_max_dispatch_rounds() -> u32 {
    64
}

/// One physical component: a registered model kind plus its
/// scenario-supplied initial state and parameters.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ComponentSpec {
    /// Unique component id.
    pub id: ComponentId,
    /// Model kind, resolved against the [`ModelRegistry`](crate::ModelRegistry).
    pub kind: String,
    /// Initial state fields; each kind documents which it reads.
    #[serde(default)]
    pub initial_state: StateMap,
    /// Physical parameters; each kind documents which it requires.
    #[serde(default)]
    pub parameters: Payload,
}

/// A directed flow connection, upstream to downstream.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct EdgeSpec {
    /// The component whose outflow feeds the edge.
    pub upstream: ComponentId,
    /// The component receiving that outflow as inflow.
    pub downstream: ComponentId,
}

/// One agent: a registered kind plus its flat configuration payload.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct AgentSpec {
    /// Unique agent id. Doubles as the bus subscriber key and the
    /// suffix of the agent's `command/<id>` topic.
    pub id: AgentId,
    /// Agent kind, resolved against the [`AgentRegistry`](crate::AgentRegistry).
    pub kind: String,
    /// Kind-specific configuration fields.
    #[serde(default)]
    pub config: Payload,
}

/// A complete scenario document.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ScenarioSpec {
    /// Timing and limits.
    pub simulation: SimulationSpec,
    /// Physical components.
    #[serde(default)]
    pub components: Vec<ComponentSpec>,
    /// Flow connections between components.
    #[serde(default)]
    pub edges: Vec<EdgeSpec>,
    /// Agents observing and controlling the components.
    #[serde(default)]
    pub agents: Vec<AgentSpec>,
}

// ── ConfigError ────────────────────────────────────────────────────

/// A structural defect in a scenario, caught at assembly.
#[derive(Clone, Debug, PartialEq)]
pub enum ConfigError {
    /// `duration` or `dt` is non-positive or non-finite, or no full
    /// step fits in the duration.
    InvalidTiming {
        /// The declared duration in seconds.
        duration: f64,
        /// The declared step size in seconds.
        dt: f64,
    },
    /// A component names a kind the model registry does not know.
    UnknownModelKind {
        /// The offending component.
        id: ComponentId,
        /// The unresolved kind string.
        kind: String,
    },
    /// An agent names a kind the agent registry does not know.
    UnknownAgentKind {
        /// The offending agent.
        id: AgentId,
        /// The unresolved kind string.
        kind: String,
    },
    /// Two agents share an id.
    DuplicateAgent {
        /// The repeated id.
        id: AgentId,
    },
    /// A model constructor rejected its initial state or parameters.
    BadModel {
        /// The offending component.
        id: ComponentId,
        /// The constructor's error.
        reason: ModelError,
    },
    /// An agent constructor rejected its configuration payload.
    BadAgentConfig {
        /// The offending agent.
        id: AgentId,
        /// What was missing or malformed.
        reason: String,
    },
    /// The edges do not form a DAG over the declared components.
    Topology(TopologyError),
}

impl ConfigError {
    /// Convenience constructor for [`ConfigError::BadAgentConfig`].
    pub fn agent(id: &AgentId, reason: impl Into<String>) -> Self {
        Self::BadAgentConfig {
            id: id.clone(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidTiming { duration, dt } => {
                write!(f, "invalid timing: duration={duration}, dt={dt}")
            }
            Self::UnknownModelKind { id, kind } => {
                write!(f, "component '{id}' names unknown model kind '{kind}'")
            }
            Self::UnknownAgentKind { id, kind } => {
                write!(f, "agent '{id}' names unknown agent kind '{kind}'")
            }
            Self::DuplicateAgent { id } => write!(f, "duplicate agent id '{id}'"),
            Self::BadModel { id, reason } => {
                write!(f, "component '{id}' rejected its spec: {reason}")
            }
            Self::BadAgentConfig { id, reason } => {
                write!(f, "agent '{id}' rejected its config: {reason}")
            }
            Self::Topology(e) => write!(f, "topology error: {e}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::BadModel { reason, .. } => Some(reason),
            Self::Topology(e) => Some(e),
            _ => None,
        }
    }
}

impl From<TopologyError> for ConfigError {
    fn from(e: TopologyError) -> Self {
        Self::Topology(e)
    }
}
