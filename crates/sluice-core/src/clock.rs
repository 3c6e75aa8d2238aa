//! The simulation clock.

use serde::{Deserialize, Serialize};

use crate::id::StepId;

/// Monotonic step counter plus the fixed step duration `dt`.
///
/// Owned exclusively by the scheduler; every other component sees the
/// clock read-only through a copy handed out per activation. Simulated
/// time is derived, never stored: `time() = step * dt`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimClock {
    step: StepId,
    dt: f64,
}

impl SimClock {
    /// A clock at step zero with the given step duration in seconds.
    pub fn new(dt: f64) -> Self {
        Self {
            step: StepId(0),
            dt,
        }
    }

    /// The current step.
    pub fn step(&self) -> StepId {
        self.step
    }

    /// The fixed step duration in seconds.
    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// Simulated time at the start of the current step, in seconds.
    pub fn time(&self) -> f64 {
        self.step.0 as f64 * self.dt
    }

    /// Advance one step. Scheduler-only.
    pub fn advance(&mut self) {
        self.step = self.step.next();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_is_step_times_dt() {
        let mut clock = SimClock::new(0.5);
        assert_eq!(clock.time(), 0.0);
        for _ in 0..4 {
            clock.advance();
        }
        assert_eq!(clock.step(), StepId(4));
        assert_eq!(clock.time(), 2.0);
    }
}
