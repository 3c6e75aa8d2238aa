//! Pull-based task distribution over the message bus.
//!
//! A manager/worker pattern independent of the physical simulation:
//! workers announce readiness on a shared request topic whenever idle;
//! the manager pops its FIFO pending queue per announcement and
//! publishes the task on that worker's private topic; the worker runs
//! its handler and publishes the result, keyed by task id, on the
//! shared results topic.
//!
//! At-most-once assignment needs no lock: the bus delivers to the
//! manager's handler strictly sequentially, so two readiness messages
//! can never pop the same task.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

mod manager;
mod task;
mod worker;

pub use manager::TaskManagerAgent;
pub use task::{Task, TaskState};
pub use worker::{TaskHandler, WorkerAgent};
