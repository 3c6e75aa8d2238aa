//! Sluice: a multi-agent simulation platform for distributed control of
//! water infrastructure.
//!
//! This is the top-level facade crate that re-exports the public API
//! from all Sluice sub-crates. For most users, adding `sluice` as a
//! single dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use sluice::prelude::*;
//!
//! // One reservoir fed by a constant exogenous inflow.
//! let spec = ScenarioSpec {
//!     simulation: SimulationSpec {
//!         duration: 60.0,
//!         dt: 1.0,
//!         max_dispatch_rounds: 64,
//!     },
//!     components: vec![ComponentSpec {
//!         id: ComponentId::new("res_1"),
//!         kind: "reservoir".into(),
//!         initial_state: payload! { "water_level" => 50.0 },
//!         parameters: payload! { "surface_area" => 1.0e6 },
//!     }],
//!     edges: vec![],
//!     agents: vec![AgentSpec {
//!         id: AgentId::new("inflow_1"),
//!         kind: "constant_inflow".into(),
//!         config: payload! { "target_id" => "res_1", "rate" => 100.0 },
//!     }],
//! };
//!
//! let record = Scheduler::assemble(&spec).unwrap().run().unwrap();
//! assert_eq!(record.len(), 60);
//! let levels = record.series(&ComponentId::new("res_1"), "water_level");
//! assert!(levels.last().unwrap() > &50.0);
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in
//! the prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `sluice-core` | IDs, payload values, clock, shared errors |
//! | [`bus`] | `sluice-bus` | Topics, messages, the step-buffered bus |
//! | [`topology`] | `sluice-topology` | Flow network DAG and propagation order |
//! | [`model`] | `sluice-model` | Physical model trait and reference models |
//! | [`agent`] | `sluice-agent` | Agent contract, control laws, role agents |
//! | [`tasks`] | `sluice-tasks` | Pull-based task distribution |
//! | [`engine`] | `sluice-engine` | Scenario assembly and the scheduler |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// IDs, payload values, the clock, and shared errors (`sluice-core`).
pub use sluice_core as types;

/// Topics, messages, and the step-buffered bus (`sluice-bus`).
pub use sluice_bus as bus;

/// The flow network DAG and its propagation order (`sluice-topology`).
pub use sluice_topology as topology;

/// The [`model::PhysicalModel`] trait and the reference reservoir,
/// gate, and canal models (`sluice-model`).
pub use sluice_model as model;

/// The [`agent::Agent`] contract, control laws, and the built-in role
/// agents (`sluice-agent`).
pub use sluice_agent as agent;

/// Pull-based task distribution over the bus (`sluice-tasks`).
pub use sluice_tasks as tasks;

/// Scenario documents, registries, and the scheduler (`sluice-engine`).
pub use sluice_engine as engine;

/// Common imports for typical Sluice usage.
///
/// ```rust
/// use sluice::prelude::*;
/// ```
pub mod prelude {
    // Core ids, values, clock, and errors
    pub use sluice_core::{
        payload, AgentError, AgentId, ComponentId, ModelError, Payload, SimClock, StateMap,
        StepError, StepId, Value,
    };

    // Bus
    pub use sluice_bus::{Message, MessageBus, SubscriberId, Topic};

    // Topology
    pub use sluice_topology::{Topology, TopologyError};

    // Models
    pub use sluice_model::{Canal, Gate, PhysicalModel, Reservoir, StepInput, StepOutput};

    // Agents and laws
    pub use sluice_agent::{
        Agent, AgentContext, BangBang, ControlAgent, ControlLaw, DigitalTwinAgent, Pid,
        SupervisoryAgent,
    };

    // Task distribution
    pub use sluice_tasks::{Task, TaskHandler, TaskManagerAgent, TaskState, WorkerAgent};

    // Engine
    pub use sluice_engine::{
        AgentRegistry, AgentSpec, ComponentSpec, ConfigError, EdgeSpec, IngressHandle,
        ModelRegistry, RunRecord, ScenarioSpec, Scheduler, SimulationSpec, StepRecord,
    };
}
