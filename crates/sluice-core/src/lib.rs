//! Core types and traits for the Sluice simulation framework.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the identifiers, payload value types, the simulation clock, and the
//! shared error enums used throughout the Sluice workspace.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

mod clock;
mod error;
mod id;
mod value;

pub use clock::SimClock;
pub use error::{AgentError, ModelError, StepError};
pub use id::{AgentId, ComponentId, StepId};
pub use value::{Payload, StateMap, Value};
