//! The [`PhysicalModel`] trait and its step input/output types.

use sluice_core::{ModelError, Payload, StateMap};

/// Inputs supplied by the scheduler for one step of one model.
///
/// All values derive from prior-committed state or earlier models in the
/// same step's topological walk, so a model's transition is a pure
/// function of its own state, its parameters, and this struct.
#[derive(Clone, Debug)]
pub struct StepInput<'a> {
    /// Summed outflow of upstream components stepped earlier this step,
    /// plus any exogenous inflow delivered over the bus (rainfall,
    /// scripted disturbances).
    pub inflow: f64,
    /// Summed previous-step outflow of downstream components. Storage
    /// models (reservoirs) release this much; flow-through models ignore
    /// it. One step of lag keeps propagation strictly causal.
    pub demand: f64,
    /// Water-surface elevation of the nearest upstream component that
    /// exposes one, already stepped this step.
    pub upstream_head: Option<f64>,
    /// Water-surface elevation of the nearest downstream component that
    /// exposes one, not yet stepped (previous-step value).
    pub downstream_head: Option<f64>,
    /// Zero-order-hold control inputs: the last value received on the
    /// component's control topic per field, persisting until overwritten.
    pub controls: &'a Payload,
}

impl<'a> StepInput<'a> {
    /// An input with no flows, no heads, and the given control map.
    pub fn quiescent(controls: &'a Payload) -> Self {
        Self {
            inflow: 0.0,
            demand: 0.0,
            upstream_head: None,
            downstream_head: None,
            controls,
        }
    }
}

/// Result of one model step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepOutput {
    /// Outflow for this step, fed to downstream components as inflow.
    pub outflow: f64,
}

/// A node in the physical topology.
///
/// # Contract
///
/// - `step()` MUST be deterministic: identical state, parameters, and
///   inputs produce identical outputs. Required for reproducible replay.
/// - State is mutated only by the model's own `step()`; agents influence
///   it solely through control-input fields carried in
///   [`StepInput::controls`].
/// - `state()` returns a copy, never an alias, so a perception agent
///   publishing a snapshot cannot mutate live simulation state.
/// - Out-of-domain transitions follow the kind's documented policy:
///   clamp-and-log, or return a [`ModelError`] which aborts the run.
///
/// # Object safety
///
/// Object-safe; the engine stores models as `Box<dyn PhysicalModel>`.
pub trait PhysicalModel: Send {
    /// The registered kind string, for error reporting.
    fn kind(&self) -> &str;

    /// Snapshot copy of the current state.
    fn state(&self) -> StateMap;

    /// Water-surface elevation visible to adjacent components, if this
    /// kind has one. Gates and other flow-through structures return
    /// `None`; storage and channel kinds return their level.
    fn head(&self) -> Option<f64> {
        None
    }

    /// Advance one step of `dt` seconds.
    fn step(&mut self, dt: f64, input: &StepInput<'_>) -> Result<StepOutput, ModelError>;
}

impl core::fmt::Debug for dyn PhysicalModel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PhysicalModel")
            .field("kind", &self.kind())
            .finish()
    }
}

/// Fetch a required numeric parameter.
pub fn param_f64(params: &Payload, name: &str) -> Result<f64, ModelError> {
    params
        .get(name)
        .and_then(|v| v.as_f64())
        .filter(|v| v.is_finite())
        .ok_or_else(|| ModelError::BadParameter {
            name: name.to_owned(),
        })
}

/// Fetch an optional numeric parameter with a default.
pub fn param_f64_or(params: &Payload, name: &str, default: f64) -> Result<f64, ModelError> {
    match params.get(name) {
        None => Ok(default),
        Some(v) => v
            .as_f64()
            .filter(|v| v.is_finite())
            .ok_or_else(|| ModelError::BadParameter {
                name: name.to_owned(),
            }),
    }
}

/// Reject non-finite flow inputs before they poison state.
pub(crate) fn require_finite(value: f64, field: &str) -> Result<f64, ModelError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ModelError::NonFiniteInput {
            field: field.to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_core::payload;

    #[test]
    fn param_lookup_distinguishes_missing_and_malformed() {
        let params = payload! { "surface_area" => 1.5e6, "label" => "x" };
        assert_eq!(param_f64(&params, "surface_area").unwrap(), 1.5e6);
        assert!(param_f64(&params, "absent").is_err());
        assert!(param_f64(&params, "label").is_err());
        assert_eq!(param_f64_or(&params, "absent", 0.6).unwrap(), 0.6);
    }
}
