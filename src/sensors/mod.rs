//! Sensor acquisition and filtering.
//!
//! [`SensorPipeline`] is called once per control-loop iteration and keeps
//! each signal on its own cadence:
//!
//! | Signal      | Cadence        | Processing                          |
//! |-------------|----------------|-------------------------------------|
//! | pressure    | 10 ms          | Kalman filter                       |
//! | temperature | 250 ms         | Kalman filter                       |
//! | weight      | every call     | NaN without a scale                 |
//! | flow        | 250 ms window  | pump strokes × flow-per-stroke model |
//!
//! Implausible raw readings are fatal and surface as [`SensorError`].

pub mod kalman;
pub mod pressure;
pub mod scale;
pub mod thermocouple;

use core::time::Duration;

use crate::app::ports::{ActuatorPort, ScalePort, SensorPort};
use crate::control::pump;
use crate::error::SensorError;
use crate::time::Instant;
use kalman::KalmanFilter;

pub const PRESSURE_INTERVAL: Duration = Duration::from_millis(10);
pub const TEMPERATURE_INTERVAL: Duration = Duration::from_millis(250);
pub const FLOW_WINDOW: Duration = Duration::from_millis(250);

/// Plausible boiler temperature range (°C).
pub const MIN_PLAUSIBLE_TEMP_C: f32 = -20.0;
pub const MAX_PLAUSIBLE_TEMP_C: f32 = thermocouple::MAX_PLAUSIBLE_C;

/// A point-in-time snapshot of the filtered sensors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sensors {
    /// Group pressure (bar).
    pub pressure: f32,
    /// Boiler temperature (°C).
    pub temperature: f32,
    /// Scale weight (g), NaN when unavailable.
    pub weight: f32,
    /// Pump flow (ml/s).
    pub flow: f32,
}

impl Sensors {
    pub const EMPTY: Self = Self {
        pressure: 0.0,
        temperature: 0.0,
        weight: f32::NAN,
        flow: 0.0,
    };
}

impl Default for Sensors {
    fn default() -> Self {
        Self::EMPTY
    }
}

fn check_temperature(celsius: f32) -> Result<f32, SensorError> {
    if celsius.is_nan() || !(MIN_PLAUSIBLE_TEMP_C..=MAX_PLAUSIBLE_TEMP_C).contains(&celsius) {
        return Err(SensorError::TemperatureOutOfRange);
    }
    Ok(celsius)
}

fn check_pressure(bar: f32) -> Result<f32, SensorError> {
    if bar.is_nan() || !(pressure::MIN_PLAUSIBLE_BAR..=pressure::MAX_PLAUSIBLE_BAR).contains(&bar) {
        return Err(SensorError::PressureOutOfRange);
    }
    Ok(bar)
}

/// Rate-limited acquisition with one filter per analog signal.
pub struct SensorPipeline {
    sensors: Sensors,
    pressure_filter: KalmanFilter,
    temperature_filter: KalmanFilter,
    next_pressure: Instant,
    next_temperature: Instant,
    flow_window_start: Instant,
}

impl Default for SensorPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorPipeline {
    pub const fn new() -> Self {
        Self {
            sensors: Sensors::EMPTY,
            pressure_filter: KalmanFilter::new(0.6, 0.6, 0.3),
            temperature_filter: KalmanFilter::new(0.5, 0.5, 0.1),
            next_pressure: Instant::ZERO,
            next_temperature: Instant::ZERO,
            flow_window_start: Instant::ZERO,
        }
    }

    pub fn sensors(&self) -> Sensors {
        self.sensors
    }

    /// Refresh whatever is due at `now`.
    pub fn update<H>(&mut self, hw: &mut H, now: Instant, pump_zero: f32) -> Result<(), SensorError>
    where
        H: SensorPort + ScalePort + ActuatorPort + ?Sized,
    {
        if now.reached(self.next_pressure) {
            let raw = check_pressure(hw.read_pressure()?)?;
            self.sensors.pressure = self.pressure_filter.update(raw);
            self.next_pressure = now + PRESSURE_INTERVAL;
        }

        if now.reached(self.next_temperature) {
            let raw = check_temperature(hw.read_temp()?)?;
            self.sensors.temperature = self.temperature_filter.update(raw);
            self.next_temperature = now + TEMPERATURE_INTERVAL;
        }

        self.sensors.weight = if hw.is_scale_connected() {
            hw.read_weight()
        } else {
            f32::NAN
        };

        let window = now.saturating_duration_since(self.flow_window_start);
        if window >= FLOW_WINDOW {
            let strokes = hw.take_pump_strokes();
            self.sensors.flow = pump::flow_from_strokes(
                strokes,
                window.as_secs_f32(),
                self.sensors.pressure,
                pump_zero,
            );
            self.flow_window_start = now;
        }

        Ok(())
    }

    /// Re-seed both filters from fresh raw readings.
    ///
    /// Returns the raw temperature so the caller can seed the heater PID
    /// from the same sample.
    pub fn reset<H>(&mut self, hw: &mut H, now: Instant) -> Result<f32, SensorError>
    where
        H: SensorPort + ?Sized,
    {
        let pressure = check_pressure(hw.read_pressure()?)?;
        let temperature = check_temperature(hw.read_temp()?)?;

        self.pressure_filter.reset(pressure);
        self.temperature_filter.reset(temperature);
        self.sensors.pressure = pressure;
        self.sensors.temperature = temperature;
        self.next_pressure = now + PRESSURE_INTERVAL;
        self.next_temperature = now + TEMPERATURE_INTERVAL;

        Ok(temperature)
    }
}
