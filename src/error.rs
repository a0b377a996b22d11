//! Fault taxonomy for the control core.
//!
//! Everything in here is fatal: a sensor that reports garbage or a heater
//! that fails to heat ends in [`Fault`], which the control loop latches
//! before forcing every actuator off. Non-fatal conditions (scale unplugged,
//! switch bounce) never reach this module. All variants are `Copy` so they
//! pass through the FSM hooks and the safety supervisor without allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// Thermocouple frame read back as all zeros (open probe or dead bus).
    ThermocoupleOpen,
    /// Temperature reading outside the physically plausible range.
    TemperatureOutOfRange,
    /// Pressure reading outside the transducer's plausible range.
    PressureOutOfRange,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ThermocoupleOpen => write!(f, "thermocouple open"),
            Self::TemperatureOutOfRange => write!(f, "temperature out of range"),
            Self::PressureOutOfRange => write!(f, "pressure out of range"),
        }
    }
}

// ---------------------------------------------------------------------------
// Fatal faults
// ---------------------------------------------------------------------------

/// An unrecoverable condition. Once raised the machine halts until reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Sensor(SensorError),
    /// Heater driven hard without the expected temperature rise.
    ThermalRunaway,
}

impl Fault {
    /// Numeric fault code shown on the power light.
    ///
    /// Codes 0, 1 and 5 belong to the services core (network, storage),
    /// 3 is a task-capacity overflow, which this crate rejects at compile
    /// time, and 4 a full message queue, which is logged and not fatal here.
    pub const fn code(self) -> u8 {
        match self {
            Self::Sensor(_) => 2,
            Self::ThermalRunaway => 6,
        }
    }

    /// Number of blinks per signalling round.
    pub const fn blink_count(self) -> u8 {
        self.code() + 1
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sensor(e) => write!(f, "sensor fault: {e}"),
            Self::ThermalRunaway => write!(f, "thermal runaway"),
        }
    }
}

impl From<SensorError> for Fault {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

/// Convenience alias used across the control core.
pub type Result<T> = core::result::Result<T, Fault>;
