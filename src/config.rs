//! Machine settings.
//!
//! [`Settings`] is the tunable part of the machine: temperatures, pressures,
//! timing and PID gains. The control core only ever sees a copy; the
//! services core replaces the live value through [`SettingsStore`] in one
//! piece, so a reader never observes a half-applied update.

use core::cell::Cell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;

/// Hottest target the boiler may be asked to hold (°C).
pub const MAX_TARGET_TEMP_C: f32 = 165.0;
/// Highest pressure target accepted (bar).
pub const MAX_TARGET_PRESSURE_BAR: f32 = 12.0;
/// Longest preinfusion accepted (s).
pub const MAX_PREINFUSION_S: f32 = 60.0;

/// Tunable machine parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    // --- Temperatures ---
    /// Boiler target while idle or brewing (°C).
    pub brew_temp: f32,
    /// Boiler target while steaming (°C).
    pub steam_temp: f32,

    // --- Pressure profile ---
    /// Target pump pressure after preinfusion (bar).
    pub brew_pressure: f32,
    /// Target pump pressure during preinfusion (bar).
    pub preinfusion_pressure: f32,
    /// Preinfusion duration (seconds).
    pub preinfusion_time: f32,
    /// Stop the shot at this weight (g). Non-positive disables.
    pub brew_weight: f32,

    // --- Heater PID ---
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,

    // --- Pump calibration ---
    /// Offset added to the flow-per-stroke model (ml).
    pub pump_zero: f32,
}

impl Settings {
    pub const DEFAULT: Self = Self {
        brew_temp: 95.0,
        steam_temp: 150.0,
        brew_pressure: 9.0,
        preinfusion_pressure: 2.0,
        preinfusion_time: 0.0,
        brew_weight: -1.0,
        kp: 0.087,
        ki: 0.003_83,
        kd: 0.494_16,
        pump_zero: 0.0,
    };

    /// Range-check every field. Values are rejected, never clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            self.brew_temp,
            self.steam_temp,
            self.brew_pressure,
            self.preinfusion_pressure,
            self.preinfusion_time,
            self.brew_weight,
            self.kp,
            self.ki,
            self.kd,
            self.pump_zero,
        ];
        if fields.iter().any(|v| !v.is_finite()) {
            return Err(ConfigError::ValidationFailed("non-finite value"));
        }
        if !(0.0..=MAX_TARGET_TEMP_C).contains(&self.brew_temp) {
            return Err(ConfigError::ValidationFailed("brew_temp out of range"));
        }
        if !(0.0..=MAX_TARGET_TEMP_C).contains(&self.steam_temp) {
            return Err(ConfigError::ValidationFailed("steam_temp out of range"));
        }
        if !(0.0..=MAX_TARGET_PRESSURE_BAR).contains(&self.brew_pressure) {
            return Err(ConfigError::ValidationFailed("brew_pressure out of range"));
        }
        if !(0.0..=MAX_TARGET_PRESSURE_BAR).contains(&self.preinfusion_pressure) {
            return Err(ConfigError::ValidationFailed(
                "preinfusion_pressure out of range",
            ));
        }
        if !(0.0..=MAX_PREINFUSION_S).contains(&self.preinfusion_time) {
            return Err(ConfigError::ValidationFailed("preinfusion_time out of range"));
        }
        if self.kp < 0.0 || self.ki < 0.0 || self.kd < 0.0 {
            return Err(ConfigError::ValidationFailed("negative PID gain"));
        }
        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::DEFAULT
    }
}

// ---------------------------------------------------------------------------
// Shared snapshot
// ---------------------------------------------------------------------------

/// Live settings shared between the cores.
///
/// `get` hands out a copy; `update` swaps the whole value under the lock.
pub struct SettingsStore {
    inner: Mutex<CriticalSectionRawMutex, Cell<Settings>>,
}

impl SettingsStore {
    pub const fn new(initial: Settings) -> Self {
        Self {
            inner: Mutex::new(Cell::new(initial)),
        }
    }

    pub fn get(&self) -> Settings {
        self.inner.lock(Cell::get)
    }

    /// Validate and replace the snapshot. The old value survives a rejection.
    pub fn update(&self, new: Settings) -> Result<(), ConfigError> {
        new.validate()?;
        self.inner.lock(|cell| cell.set(new));
        Ok(())
    }
}

impl Default for SettingsStore {
    fn default() -> Self {
        Self::new(Settings::DEFAULT)
    }
}
