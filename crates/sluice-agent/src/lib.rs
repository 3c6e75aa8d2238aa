//! The agent contract and the built-in role agents.
//!
//! All agents share one narrow contract ([`Agent`]): an optional
//! periodic hook and an event-driven message handler, both of which may
//! publish. Roles — perception, control, supervisory, task/support —
//! are configuration plus strategy objects layered on that contract,
//! not a class hierarchy, so new roles never touch the bus or the
//! scheduler.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

mod agent;
mod control;
mod law;
mod perception;
mod support;
mod supervisory;

pub use agent::{Agent, AgentContext};
pub use control::ControlAgent;
pub use law::{BangBang, ControlLaw, Pid};
pub use perception::DigitalTwinAgent;
pub use supervisory::SupervisoryAgent;
pub use support::{ConstantInflowAgent, FailureInjectionAgent, TimedCommandAgent};
