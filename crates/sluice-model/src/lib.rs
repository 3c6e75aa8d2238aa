//! Physical model trait and the reference water-system models.
//!
//! A physical model is a node in the topology graph: it owns a state
//! map and advances it one step at a time given inbound flows and
//! control inputs. The trait contract is deliberately narrow so new
//! kinds (pumps, valves, hydropower stations) can be registered without
//! touching the engine.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

mod canal;
mod gate;
mod model;
mod reservoir;

pub use canal::Canal;
pub use gate::Gate;
pub use model::{param_f64, param_f64_or, PhysicalModel, StepInput, StepOutput};
pub use reservoir::Reservoir;
