//! Shared error enums, organized by subsystem.
//!
//! Configuration errors live in the engine crate next to the scenario
//! structs they validate; the enums here are the ones that cross crate
//! boundaries: model faults, agent faults, and fatal step failures.

use std::error::Error;
use std::fmt;

use crate::id::{AgentId, ComponentId, StepId};

/// Errors from a physical model's state transition.
///
/// Each model kind documents its policy per variant: recoverable
/// conditions are clamped and logged by the model itself and never
/// surface here; what does surface is fatal and aborts the run.
#[derive(Clone, Debug, PartialEq)]
pub enum ModelError {
    /// An input carried NaN or infinity; no physical meaning.
    NonFiniteInput {
        /// The offending input field.
        field: String,
    },
    /// The transition produced a state outside the model's domain and
    /// the model's documented policy is to abort rather than clamp.
    InvalidTransition {
        /// Description of the violated constraint.
        reason: String,
    },
    /// A required parameter is missing or malformed.
    BadParameter {
        /// The parameter name.
        name: String,
    },
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonFiniteInput { field } => write!(f, "non-finite input in field '{field}'"),
            Self::InvalidTransition { reason } => write!(f, "invalid state transition: {reason}"),
            Self::BadParameter { name } => write!(f, "bad or missing parameter '{name}'"),
        }
    }
}

impl Error for ModelError {}

/// A recoverable fault raised inside an agent handler.
///
/// Caught by the dispatcher, logged, and dropped: the offending agent's
/// output for the step is simply absent. Never aborts the step.
#[derive(Clone, Debug, PartialEq)]
pub enum AgentError {
    /// An expected payload field was missing or of the wrong shape.
    MissingField {
        /// The expected key.
        key: String,
    },
    /// The agent's own logic failed.
    Failed {
        /// Human-readable description.
        reason: String,
    },
}

impl AgentError {
    /// Convenience constructor for [`AgentError::Failed`].
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for AgentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingField { key } => write!(f, "missing payload field '{key}'"),
            Self::Failed { reason } => write!(f, "{reason}"),
        }
    }
}

impl Error for AgentError {}

/// Fatal errors that abort a run mid-step.
///
/// Every variant names the offending component or agent and the step at
/// which the failure occurred, so a run abort is attributable.
#[derive(Clone, Debug, PartialEq)]
pub enum StepError {
    /// A physical model failed its transition with abort policy.
    ModelFailed {
        /// The failing component.
        component: ComponentId,
        /// The step being executed.
        step: StepId,
        /// The underlying model error.
        reason: ModelError,
    },
    /// Message dispatch did not reach quiescence within the configured
    /// round budget; agents are ping-ponging messages within one step.
    DispatchBudgetExhausted {
        /// The step being executed.
        step: StepId,
        /// The configured round budget that was exceeded.
        rounds: u32,
        /// An agent with messages still queued when the budget ran out.
        agent: AgentId,
    },
}

impl fmt::Display for StepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ModelFailed {
                component,
                step,
                reason,
            } => {
                write!(f, "component '{component}' failed at step {step}: {reason}")
            }
            Self::DispatchBudgetExhausted {
                step,
                rounds,
                agent,
            } => write!(
                f,
                "dispatch did not quiesce within {rounds} rounds at step {step} \
                 (agent '{agent}' still has queued messages)"
            ),
        }
    }
}

impl Error for StepError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::ModelFailed { reason, .. } => Some(reason),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_error_names_component_and_step() {
        let err = StepError::ModelFailed {
            component: ComponentId::new("gate_1"),
            step: StepId(7),
            reason: ModelError::NonFiniteInput {
                field: "inflow".into(),
            },
        };
        let text = err.to_string();
        assert!(text.contains("gate_1"));
        assert!(text.contains("step 7"));
        assert!(err.source().is_some());
    }
}
