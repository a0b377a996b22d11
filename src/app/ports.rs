//! Port traits: the hexagonal boundary between the control core and the
//! machine.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ Controller (domain)
//! ```
//!
//! Driven adapters (thermocouple, pressure ADC, load cells, switches,
//! dimmers, watchdog, message transport, settings storage) implement these
//! traits. The [`Controller`](super::service::Controller) consumes them via
//! generics, so the control core never touches hardware directly and runs
//! unchanged against [`SimMachine`](crate::adapters::sim::SimMachine).

use crate::config::Settings;
use crate::error::SensorError;

use super::events::OutboundMessage;

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Raw, calibrated sensor reads. Implementations report implausible frames
/// as errors instead of clamping them.
pub trait SensorPort {
    /// Boiler temperature (°C).
    fn read_temp(&mut self) -> Result<f32, SensorError>;

    /// Group pressure (bar).
    fn read_pressure(&mut self) -> Result<f32, SensorError>;
}

// ───────────────────────────────────────────────────────────────
// Scale port
// ───────────────────────────────────────────────────────────────

/// Load-cell surface. A missing scale is a normal condition, not an error.
pub trait ScalePort {
    /// Latest weight in grams, NaN when no sample is available.
    fn read_weight(&mut self) -> f32;

    /// Begin an averaged, multi-sample tare.
    fn scale_start_tare(&mut self);

    /// Zero against the current sample right away.
    fn scale_tare_immediately(&mut self);

    fn is_scale_connected(&self) -> bool;

    fn is_scale_taring(&self) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Switch port
// ───────────────────────────────────────────────────────────────

/// Front-panel switches. Each has an indicator light of the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Switch {
    Power,
    Brew,
    Steam,
}

impl Switch {
    pub const ALL: [Switch; 3] = [Switch::Power, Switch::Brew, Switch::Steam];
}

/// Debounced switch levels.
pub trait SwitchPort {
    fn get_switch(&mut self, switch: Switch) -> bool;

    /// True exactly once per press of the power switch.
    fn is_power_just_pressed(&mut self) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Actuator port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Write-side port for heater, pump, solenoid and indicator lights.
pub trait ActuatorPort {
    /// Heater power, 0.0–1.0.
    fn set_heater(&mut self, power: f32);

    /// Pump power, 0.0–1.0.
    fn set_pump(&mut self, power: f32);

    /// Three-way solenoid: `true` routes water to the group head.
    fn set_solenoid(&mut self, open: bool);

    fn set_light(&mut self, light: Switch, on: bool);

    /// Last heater power requested, 0.0–1.0.
    fn heater_power(&self) -> f32;

    /// Last pump power requested, 0.0–1.0.
    fn pump_power(&self) -> f32;

    /// Pump strokes fired since the last call (read-and-reset).
    fn take_pump_strokes(&mut self) -> u32;

    /// Kill every output.
    fn all_off(&mut self) {
        self.set_heater(0.0);
        self.set_pump(0.0);
        self.set_solenoid(false);
        for light in Switch::ALL {
            self.set_light(light, false);
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Watchdog port
// ───────────────────────────────────────────────────────────────

/// Hardware watchdog. Only ever fed under the liveness protocol in
/// [`safety::watchdog`](crate::safety::watchdog).
pub trait WatchdogPort {
    fn feed(&mut self);

    /// Debug builds may run with the watchdog disarmed.
    fn is_enabled(&self) -> bool {
        true
    }
}

/// Everything the control core drives, as one bound.
pub trait Hardware: SensorPort + ScalePort + SwitchPort + ActuatorPort + WatchdogPort {}

impl<T> Hardware for T where T: SensorPort + ScalePort + SwitchPort + ActuatorPort + WatchdogPort {}

// ───────────────────────────────────────────────────────────────
// Message sink (driven adapter: domain → services core)
// ───────────────────────────────────────────────────────────────

/// Outbound notifications. Serialization and transport are the sink's
/// business.
pub trait MessageSink {
    /// Queue a message. Returns `false` if it was dropped.
    fn enqueue(&mut self, msg: OutboundMessage) -> bool;

    /// Messages queued but not yet sent.
    fn pending(&self) -> usize;
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent settings)
// ───────────────────────────────────────────────────────────────

/// Loads and persists [`Settings`].
///
/// Implementations must not persist anything that fails
/// [`Settings::validate`].
pub trait ConfigPort {
    /// Stored settings, or [`ConfigError::NotFound`] on first boot.
    fn load(&self) -> Result<Settings, ConfigError>;

    fn save(&mut self, settings: &Settings) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations and settings validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// No settings found in storage (first boot).
    NotFound,
    /// Stored settings failed integrity / deserialization check.
    Corrupted,
    /// A field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "settings not found"),
            Self::Corrupted => write!(f, "settings corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}
