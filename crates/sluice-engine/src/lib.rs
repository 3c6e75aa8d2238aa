//! Scenario assembly and the time-stepped scheduler.
//!
//! The engine turns a declarative [`ScenarioSpec`] into a running
//! simulation: it builds physical models through the [`ModelRegistry`],
//! instantiates agents through the [`AgentRegistry`], validates the flow
//! topology, and then drives the fixed-step loop — ingress drain, agent
//! phase, message dispatch to quiescence, topological flow propagation,
//! state recording.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

mod config;
mod ingress;
mod recorder;
mod registry;
mod scheduler;

pub use config::{
    AgentSpec, ComponentSpec, ConfigError, EdgeSpec, ScenarioSpec, SimulationSpec,
};
pub use ingress::{ExternalCommand, IngressHandle};
pub use recorder::{RunRecord, StepRecord};
pub use registry::{AgentCtor, AgentRegistry, ModelCtor, ModelRegistry};
pub use scheduler::Scheduler;
