//! Task records and their lifecycle.

use sluice_core::{AgentId, Payload, StepId};

/// An opaque unit of work.
#[derive(Clone, Debug, PartialEq)]
pub struct Task {
    /// Unique within one manager's run; results are matched by this id.
    pub id: String,
    /// Opaque payload handed to the worker's handler.
    pub payload: Payload,
}

impl Task {
    /// Build a task.
    pub fn new(id: impl Into<String>, payload: Payload) -> Self {
        Self {
            id: id.into(),
            payload,
        }
    }
}

/// Lifecycle of one task inside the manager.
///
/// `Pending → Assigned → Completed`, one direction only — except the
/// optional timeout re-queue, which moves a stale `Assigned` back to
/// `Pending` and ignores the stale assignment's eventual result.
#[derive(Clone, Debug, PartialEq)]
pub enum TaskState {
    /// Waiting in the FIFO queue.
    Pending,
    /// Handed to exactly one worker.
    Assigned {
        /// The worker holding the task.
        worker: AgentId,
        /// The step at which the assignment was published.
        since: StepId,
    },
    /// A matching result was received.
    Completed,
}
