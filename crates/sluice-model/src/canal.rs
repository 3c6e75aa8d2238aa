//! Trapezoidal canal reach using Manning's equation.

use sluice_core::{payload, ModelError, Payload, StateMap};
use tracing::warn;

use crate::model::{param_f64, param_f64_or, require_finite, PhysicalModel, StepInput, StepOutput};

/// A canal segment with a trapezoidal cross-section.
///
/// State: `volume` (m³), `water_level` (m), `outflow` (m³/s).
/// Parameters: `bottom_width` (m), `length` (m), `slope`, `manning_n`,
/// `side_slope_z` (z in z:1, default 0 = rectangular).
///
/// The water level is recovered from stored volume by inverting the
/// trapezoid area; outflow then follows Manning's equation
/// `Q = (1/n)·A·R^(2/3)·√S` from the level's hydraulic geometry.
///
/// Error policy: volume is clamped at zero with a `warn`; NaN inputs
/// abort.
#[derive(Debug)]
pub struct Canal {
    bottom_width: f64,
    length: f64,
    slope: f64,
    side_slope_z: f64,
    manning_n: f64,
    volume: f64,
    water_level: f64,
    outflow: f64,
}

impl Canal {
    /// Registered kind string.
    pub const KIND: &'static str = "canal";

    /// Build from a scenario component record.
    pub fn from_spec(initial_state: &StateMap, parameters: &Payload) -> Result<Self, ModelError> {
        let bottom_width = param_f64(parameters, "bottom_width")?;
        let length = param_f64(parameters, "length")?;
        let slope = param_f64(parameters, "slope")?;
        let manning_n = param_f64(parameters, "manning_n")?;
        let side_slope_z = param_f64_or(parameters, "side_slope_z", 0.0)?;
        if bottom_width <= 0.0 || length <= 0.0 || manning_n <= 0.0 || slope < 0.0 {
            return Err(ModelError::BadParameter {
                name: "canal geometry".to_owned(),
            });
        }
        let volume = initial_state
            .get("volume")
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0);
        let mut canal = Self {
            bottom_width,
            length,
            slope,
            side_slope_z,
            manning_n,
            volume,
            water_level: 0.0,
            outflow: 0.0,
        };
        canal.water_level = canal.level_from_volume(volume);
        Ok(canal)
    }

    /// Invert `V = L·(b·y + z·y²)` for the level `y`.
    fn level_from_volume(&self, volume: f64) -> f64 {
        let per_length = volume / self.length;
        if self.side_slope_z == 0.0 {
            return per_length / self.bottom_width;
        }
        let a = self.side_slope_z;
        let b = self.bottom_width;
        let discriminant = b * b + 4.0 * a * per_length;
        if discriminant < 0.0 {
            return 0.0;
        }
        (-b + discriminant.sqrt()) / (2.0 * a)
    }

    fn manning_flow(&self, level: f64) -> f64 {
        if level <= 0.0 {
            return 0.0;
        }
        let area = (self.bottom_width + self.side_slope_z * level) * level;
        let wetted = self.bottom_width
            + 2.0 * level * (1.0 + self.side_slope_z * self.side_slope_z).sqrt();
        let hydraulic_radius = area / wetted;
        (1.0 / self.manning_n) * area * hydraulic_radius.powf(2.0 / 3.0) * self.slope.sqrt()
    }
}

impl PhysicalModel for Canal {
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

        let level = self.level_from_volume(self.volume);
        let outflow = self.manning_flow(level);

        let requested = self.volume + (inflow - outflow) * dt;
        let new_volume = if requested < 0.0 {
            warn!(
                kind = Self::KIND,
                requested, "canal drained below empty, clamping volume to zero"
            );
            0.0
        } else {
            requested
        };

        self.volume = new_volume;
        self.water_level = self.level_from_volume(new_volume);
        self.outflow = outflow;
        Ok(StepOutput { outflow })
    }
}
