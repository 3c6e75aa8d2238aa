//! Pluggable control laws.
//!
//! A control law turns a process variable into a command value. The
//! [`ControlAgent`](crate::ControlAgent) owns one boxed law and handles
//! all bus plumbing, so swapping bang-bang for PID (or anything a caller
//! registers) changes no agent code.

/// A control algorithm driven by observations.
///
/// Laws must be deterministic and idempotent under duplicate delivery
/// of the same observation: recomputing with the same input yields the
/// same output and no other side effect.
pub trait ControlLaw: Send {
    /// The current setpoint.
    fn setpoint(&self) -> f64;

    /// Replace the setpoint. Called when a supervisory command arrives.
    fn set_setpoint(&mut self, setpoint: f64);

    /// Compute the command for one observation. `None` means "nothing
    /// to publish" (e.g. a bang-bang law whose output is unchanged).
    fn output(&mut self, process_variable: f64, dt: f64) -> Option<f64>;
}

/// Threshold switch: command `open_value` once the process variable
/// exceeds the setpoint, `close_value` once it falls back below.
///
/// Publishes only on transitions, so duplicate observations are
/// naturally idempotent. `deadband` widens the switching band
/// symmetrically (open above `setpoint + deadband`, close below
/// `setpoint - deadband`); the default band of zero reproduces plain
/// bang-bang, which can chatter at the exact threshold.
#[derive(Debug)]
pub struct BangBang {
    setpoint: f64,
    deadband: f64,
    open_value: f64,
    close_value: f64,
    is_open: bool,
}

impl BangBang {
    /// A bang-bang law with no deadband, commanding 1.0 / 0.0.
    pub fn new(setpoint: f64) -> Self {
        Self {
            setpoint,
            deadband: 0.0,
            open_value: 1.0,
            close_value: 0.0,
            is_open: false,
        }
    }

    /// Set the symmetric deadband half-width.
    pub fn with_deadband(mut self, deadband: f64) -> Self {
        self.deadband = deadband;
        self
    }

    /// Override the commanded open/close values.
    pub fn with_commands(mut self, open_value: f64, close_value: f64) -> Self {
        self.open_value = open_value;
        self.close_value = close_value;
        self
    }
}

impl ControlLaw for BangBang {
    fn setpoint(&self) -> f64 {
        self.setpoint
    }

    fn set_setpoint(&mut self, setpoint: f64) {
        self.setpoint = setpoint;
    }

    fn output(&mut self, process_variable: f64, _dt: f64) -> Option<f64> {
        if !self.is_open && process_variable > self.setpoint + self.deadband {
            self.is_open = true;
            return Some(self.open_value);
        }
        if self.is_open && process_variable <= self.setpoint - self.deadband {
            self.is_open = false;
            return Some(self.close_value);
        }
        None
    }
}

/// PID with output clamping and integral anti-windup.
///
/// The integral term accumulates only while the output is inside the
/// clamp range; once saturated, further accumulation in the saturating
/// direction is discarded so the controller recovers promptly when the
/// error reverses.
#[derive(Debug)]
pub struct Pid {
    kp: f64,
    ki: f64,
    kd: f64,
    setpoint: f64,
    min_output: f64,
    max_output: f64,
    integral: f64,
    previous_error: f64,
}

impl Pid {
    /// Build a PID law with the given gains, setpoint, and output range.
    pub fn new(
        kp: f64,
        ki: f64,
        kd: f64,
        setpoint: f64,
        min_output: f64,
        max_output: f64,
    ) -> Self {
        Self {
            kp,
            ki,
            kd,
            setpoint,
            min_output,
            max_output,
            integral: 0.0,
            previous_error: 0.0,
        }
    }
}

impl ControlLaw for Pid {
    fn setpoint(&self) -> f64 {
        self.setpoint
    }

    fn set_setpoint(&mut self, setpoint: f64) {
        self.setpoint = setpoint;
    }

    fn output(&mut self, process_variable: f64, dt: f64) -> Option<f64> {
        if dt <= 0.0 {
            return None;
        }
        let error = self.setpoint - process_variable;
        let candidate_integral = self.integral + error * dt;
        let derivative = (error - self.previous_error) / dt;

        let unclamped =
            self.kp * error + self.ki * candidate_integral + self.kd * derivative;
        let clamped = unclamped.clamp(self.min_output, self.max_output);

        // Anti-windup: keep the integral only when it did not push the
        // output past a limit.
        if (clamped - unclamped).abs() < f64::EPSILON {
            self.integral = candidate_integral;
        }
        self.previous_error = error;
        Some(clamped)
    }
}
