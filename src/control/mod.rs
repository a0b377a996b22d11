//! Closed-loop outputs: heater PID, pump model and the Brew light.
//!
//! [`Control`] holds the targets that the state behaviors set (boiler
//! temperature, pump pressure) and turns them into
//! actuator commands once per control-loop iteration:
//!
//! - heater: PID on the filtered temperature, at most every 250 ms, only
//!   while the boiler is enabled
//! - pump: [`pump::pump_power`] on the filtered pressure, uncapped in flow,
//!   only while the pump is enabled
//! - Brew light: status blink if one is active, otherwise "temperature
//!   ready" (within 1 °C of target) while the boiler is enabled

pub mod pid;
pub mod pump;

use core::time::Duration;

use crate::app::ports::{ActuatorPort, Switch};
use crate::config::Settings;
use crate::drivers::blink::StatusBlink;
use crate::sensors::Sensors;
use crate::time::Instant;
use pid::PidController;

/// Minimum spacing of heater PID updates.
pub const HEATER_UPDATE_INTERVAL: Duration = Duration::from_millis(250);

/// Temperature band around the target shown as "ready" (°C).
const READY_BAND_C: f32 = 1.0;

/// Targets and controllers for the closed-loop outputs.
pub struct Control {
    heater_pid: PidController,
    boiler_enabled: bool,
    next_heater_update: Instant,
    pump_enabled: bool,
    target_pressure: f32,
    blink: StatusBlink,
}

impl Control {
    pub fn new(settings: &Settings) -> Self {
        Self {
            heater_pid: PidController::new(settings.kp, settings.ki, settings.kd, 0.0, 1.0),
            boiler_enabled: false,
            next_heater_update: Instant::ZERO,
            pump_enabled: false,
            target_pressure: 0.0,
            blink: StatusBlink::new(),
        }
    }

    // ── Boiler ────────────────────────────────────────────────

    /// Enabling seeds the PID from `temperature`; disabling cuts the heater.
    pub fn set_boiler_enabled(
        &mut self,
        enabled: bool,
        temperature: f32,
        now: Instant,
        hw: &mut (impl ActuatorPort + ?Sized),
    ) {
        self.boiler_enabled = enabled;
        if enabled {
            self.heater_pid.reset(temperature, now);
            self.next_heater_update = now;
        } else {
            hw.set_heater(0.0);
        }
    }

    pub fn boiler_enabled(&self) -> bool {
        self.boiler_enabled
    }

    pub fn set_target_temperature(&mut self, celsius: f32) {
        self.heater_pid.set_target(celsius);
    }

    pub fn target_temperature(&self) -> f32 {
        self.heater_pid.target()
    }

    pub fn set_pid_params(&mut self, kp: f32, ki: f32, kd: f32) {
        self.heater_pid.set_gains(kp, ki, kd);
    }

    /// Seed the heater PID from a fresh reading.
    pub fn reset_pid(&mut self, temperature: f32, now: Instant) {
        self.heater_pid.reset(temperature, now);
    }

    pub fn heater_pid(&self) -> &PidController {
        &self.heater_pid
    }

    // ── Pump ──────────────────────────────────────────────────

    /// Disabling stops the pump immediately.
    pub fn set_pump_enabled(&mut self, enabled: bool, hw: &mut (impl ActuatorPort + ?Sized)) {
        self.pump_enabled = enabled;
        if !enabled {
            hw.set_pump(0.0);
        }
    }

    pub fn pump_enabled(&self) -> bool {
        self.pump_enabled
    }

    pub fn set_target_pressure(&mut self, bar: f32) {
        self.target_pressure = bar;
    }

    pub fn target_pressure(&self) -> f32 {
        self.target_pressure
    }

    // ── Light ─────────────────────────────────────────────────

    /// Blink the Brew light with `half_period`; zero stops blinking.
    pub fn set_light_blink(&mut self, half_period: Duration, now: Instant) {
        self.blink.set_period(half_period, now);
    }

    pub fn is_blinking(&self) -> bool {
        self.blink.is_active()
    }

    // ── Per-iteration update ──────────────────────────────────

    /// Drive heater, pump and Brew light from the latest sensors.
    pub fn update(
        &mut self,
        now: Instant,
        sensors: &Sensors,
        settings: &Settings,
        hw: &mut (impl ActuatorPort + ?Sized),
    ) {
        if self.boiler_enabled && now.reached(self.next_heater_update) {
            self.next_heater_update = now + HEATER_UPDATE_INTERVAL;
            let power = self.heater_pid.update(sensors.temperature, now);
            hw.set_heater(power);
        }

        if self.pump_enabled {
            let power = pump::pump_power(
                sensors.pressure,
                self.target_pressure,
                None,
                settings.pump_zero,
            );
            hw.set_pump(power);
        }

        if let Some(level) = self.blink.level(now) {
            hw.set_light(Switch::Brew, level);
        } else if self.boiler_enabled {
            let ready = (self.heater_pid.target() - sensors.temperature).abs() < READY_BAND_C;
            hw.set_light(Switch::Brew, ready);
        }
    }
}
