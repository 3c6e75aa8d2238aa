//! Controllable gate using the orifice equation.

use sluice_core::{payload, ModelError, Payload, StateMap};

use crate::model::{param_f64_or, require_finite, PhysicalModel, StepInput, StepOutput};

const G: f64 = 9.81;

/// A controllable sluice gate.
///
/// State: `opening` (m), `outflow` (m³/s).
/// Parameters: `discharge_coefficient` (default 0.6), `width` (m,
/// default 10), `max_opening` (m, default 1.0), `max_rate_of_change`
/// (m/s, default 0.05).
///
/// The commanded opening arrives on the control map under `opening` and
/// persists across steps (zero-order hold). The physical opening slews
/// toward the command at the configured rate limit. Outflow follows the
/// orifice equation `Q = C·A·√(2gΔh)` from the head difference across
/// the gate; non-positive head gives zero flow.
///
/// Error policy: the opening is clamped into `[0, max_opening]` —
/// never an error. NaN inputs abort.
#[derive(Debug)]
pub struct Gate {
    discharge_coefficient: f64,
    width: f64,
    max_opening: f64,
    max_rate_of_change: f64,
    opening: f64,
    outflow: f64,
}

impl Gate {
    /// Registered kind string.
    pub const KIND: &'static str = "gate";

    /// Build from a scenario component record.
    pub fn from_spec(initial_state: &StateMap, parameters: &Payload) -> Result<Self, ModelError> {
        let discharge_coefficient = param_f64_or(parameters, "discharge_coefficient", 0.6)?;
        let width = param_f64_or(parameters, "width", 10.0)?;
        let max_opening = param_f64_or(parameters, "max_opening", 1.0)?;
        let max_rate_of_change = param_f64_or(parameters, "max_rate_of_change", 0.05)?;
        let opening = initial_state
            .get("opening")
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0)
            .clamp(0.0, max_opening);
        Ok(Self {
            discharge_coefficient,
            width,
            max_opening,
            max_rate_of_change,
            opening,
            outflow: 0.0,
        })
    }

    /// Current physical opening in meters.
    pub fn opening(&self) -> f64 {
        self.opening
    }

    fn orifice_flow(&self, head: f64) -> f64 {
        if head <= 0.0 {
            return 0.0;
        }
        let area = self.opening * self.width;
        self.discharge_coefficient * area * (2.0 * G * head).sqrt()
    }
}

impl PhysicalModel for Gate {
    fn kind(&self) -> &str {
        Self::KIND
    }

    fn state(&self) -> StateMap {
        payload! {
            "opening" => self.opening,
            "outflow" => self.outflow,
        }
    }

    fn step(&mut self, dt: f64, input: &StepInput<'_>) -> Result<StepOutput, ModelError> {
        let target = match input.controls.get("opening").and_then(|v| v.as_f64()) {
            Some(v) => require_finite(v, "opening")?,
            None => self.opening,
        };

        // Slew toward the command, then clamp into the physical range.
        let max_delta = self.max_rate_of_change * dt;
        let slewed = if target > self.opening {
            (self.opening + max_delta).min(target)
        } else {
            (self.opening - max_delta).max(target)
        };
        self.opening = slewed.clamp(0.0, self.max_opening);

        let upstream = require_finite(input.upstream_head.unwrap_or(0.0), "upstream_head")?;
        let downstream = require_finite(input.downstream_head.unwrap_or(0.0), "downstream_head")?;
        self.outflow = self.orifice_flow(upstream - downstream);
        Ok(StepOutput {
            outflow: self.outflow,
        })
    }
}
