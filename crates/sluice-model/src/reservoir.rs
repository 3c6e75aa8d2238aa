//! Storage reservoir with a linear stage/storage relationship.

use sluice_core::{payload, ModelError, Payload, StateMap};
use tracing::warn;

use crate::model::{param_f64, require_finite, PhysicalModel, StepInput, StepOutput};

/// A reservoir whose state is the balance of inflows and outflows.
///
/// State: `volume` (m³), `water_level` (m), `outflow` (m³/s). The
/// initial state may give either `volume` or `water_level`; `volume`
/// wins when both are present.
/// Parameters: `surface_area` (m²), fixed.
///
/// Outflow is driven by downstream demand ([`StepInput::demand`]); the
/// reservoir releases what the structures below it passed in the prior
/// step.
///
/// Error policy: a transition that would drive volume negative is
/// clamped to empty and the realized outflow reduced to what was
/// actually available; the clamp is logged at `warn`. NaN inputs abort.
#[derive(Debug)]
pub struct Reservoir {
    surface_area: f64,
    volume: f64,
    water_level: f64,
    outflow: f64,
}

impl Reservoir {
    /// Registered kind string.
    pub const KIND: &'static str = "reservoir";

    /// Build from a scenario component record.
    pub fn from_spec(initial_state: &StateMap, parameters: &Payload) -> Result<Self, ModelError> {
        let surface_area = param_f64(parameters, "surface_area")?;
        if surface_area <= 0.0 {
            return Err(ModelError::BadParameter {
                name: "surface_area".to_owned(),
            });
        }
        // Scenarios may give either the volume or the level; the level
        // is converted through the stage/storage relationship.
        let volume = match initial_state.get("volume").and_then(|v| v.as_f64()) {
            Some(v) => v,
            None => {
                initial_state
                    .get("water_level")
                    .and_then(|v| v.as_f64())
                    .unwrap_or(0.0)
                    * surface_area
            }
        };
        Ok(Self {
            surface_area,
            volume,
            water_level: volume / surface_area,
            outflow: 0.0,
        })
    }

    /// Current water level in meters.
    pub fn water_level(&self) -> f64 {
        self.water_level
    }
}

impl PhysicalModel for Reservoir {
    fn kind(&self) -> &str {
        Self::KIND
    }

    fn state(&self) -> StateMap {
        payload! {
            "volume" => self.volume,
            "water_level" => self.water_level,
            "outflow" => self.outflow,
        }
    }

    fn head(&self) -> Option<f64> {
        Some(self.water_level)
    }

    fn step(&mut self, dt: f64, input: &StepInput<'_>) -> Result<StepOutput, ModelError> {
        let inflow = require_finite(input.inflow, "inflow")?;
        let demand = require_finite(input.demand, "demand")?;

        let requested = self.volume + (inflow - demand) * dt;
        let new_volume = if requested < 0.0 {
            warn!(
                kind = Self::KIND,
                requested, "reservoir drained below empty, clamping volume to zero"
            );
            0.0
        } else {
            requested
        };

        // Realized outflow accounts for the clamp: never release more
        // water than the balance held.
        let outflow = (self.volume + inflow * dt - new_volume) / dt;

        self.volume = new_volume;
        self.water_level = new_volume / self.surface_area;
        self.outflow = outflow;
        Ok(StepOutput { outflow })
    }
}
