//! PID controller for boiler temperature.
//!
//! Derivative-on-measurement: the D term follows the negated rate of change
//! of the measured value, so a setpoint jump does not kick the output. The
//! integral is clamped to the output bounds (anti-windup).

use crate::time::Instant;

/// PID controller
#[derive(Debug, Clone)]
pub struct PidController {
    kp: f32,
    ki: f32,
    kd: f32,
    target: f32,
    accumulator: f32,
    last_value: f32,
    last_update: Instant,
    output_min: f32,
    output_max: f32,
}

impl PidController {
    pub fn new(kp: f32, ki: f32, kd: f32, output_min: f32, output_max: f32) -> Self {
        Self {
            kp,
            ki,
            kd,
            target: 0.0,
            accumulator: 0.0,
            last_value: 0.0,
            last_update: Instant::ZERO,
            output_min,
            output_max,
        }
    }

    /// Replace the gains. History is kept.
    pub fn set_gains(&mut self, kp: f32, ki: f32, kd: f32) {
        self.kp = kp;
        self.ki = ki;
        self.kd = kd;
    }

    /// Update setpoint. Safe at any time; history is kept.
    pub fn set_target(&mut self, target: f32) {
        self.target = target;
    }

    pub fn target(&self) -> f32 {
        self.target
    }

    /// Integral term, exposed for diagnostics and tests.
    pub fn accumulator(&self) -> f32 {
        self.accumulator
    }

    /// Compute the output for `measurement` taken at `now`.
    ///
    /// The time step runs from the previous update (or the last reset). A
    /// zero step contributes neither derivative nor integral.
    pub fn update(&mut self, measurement: f32, now: Instant) -> f32 {
        let dt = now.saturating_duration_since(self.last_update).as_secs_f32();
        self.last_update = now;

        let error = self.target - measurement;

        let rate = if dt > 0.0 {
            -(measurement - self.last_value) / dt
        } else {
            0.0
        };
        self.last_value = measurement;

        if dt > 0.0 {
            self.accumulator =
                (self.accumulator + self.ki * error * dt).clamp(self.output_min, self.output_max);
        }

        (self.kp * error + self.kd * rate + self.accumulator).clamp(self.output_min, self.output_max)
    }

    /// Forget history, seeding from the current measurement.
    pub fn reset(&mut self, measurement: f32, now: Instant) {
        self.last_value = measurement;
        self.last_update = now;
        self.accumulator = 0.0;
    }
}
