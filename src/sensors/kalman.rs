//! Scalar Kalman filter.
//!
//! One-dimensional filter for a value that is expected to move slowly
//! relative to its measurement noise. The estimate error grows with the
//! size of each correction, so the filter tracks real steps faster than a
//! fixed-gain low-pass would.

/// Scalar Kalman filter
#[derive(Debug, Clone, Copy)]
pub struct KalmanFilter {
    measurement_error: f32,
    initial_estimate_error: f32,
    estimate_error: f32,
    process_noise: f32,
    estimate: f32,
}

impl KalmanFilter {
    pub const fn new(measurement_error: f32, estimate_error: f32, process_noise: f32) -> Self {
        Self {
            measurement_error,
            initial_estimate_error: estimate_error,
            estimate_error,
            process_noise,
            estimate: 0.0,
        }
    }

    /// Fold in a measurement and return the new estimate.
    pub fn update(&mut self, measurement: f32) -> f32 {
        let gain = self.estimate_error / (self.estimate_error + self.measurement_error);
        let current = self.estimate + gain * (measurement - self.estimate);
        self.estimate_error =
            (1.0 - gain) * self.estimate_error + (self.estimate - current).abs() * self.process_noise;
        self.estimate = current;
        current
    }

    /// Re-seed from a fresh measurement.
    pub fn reset(&mut self, measurement: f32) {
        self.estimate = measurement;
        self.estimate_error = self.initial_estimate_error;
    }

    pub fn estimate(&self) -> f32 {
        self.estimate
    }
}
