//! Simulated espresso machine.
//!
//! Implements every hardware port against a small physical model so the
//! whole control core runs on the host with simulated time. The model is
//! stepped in 1 ms increments by [`SimMachine::advance`]:
//!
//! - mains zero crossings every 10 ms drive the real [`PhaseControl`]
//!   dimmers (heater every half cycle, pump every full cycle)
//! - boiler: heats while the heater fires, loses heat towards ambient,
//!   and mixes in a little inlet water with every pump stroke
//! - group pressure: each pump stroke adds a fixed step; it bleeds off
//!   slowly through the puck with the solenoid open and quickly through
//!   the vent with it closed
//! - cup: fills in proportion to group pressure while the solenoid is open
//! - switches go through the real debouncer, the scale through the real
//!   load-cell logic at 10 samples/s
//!
//! Sensor reads encode the modelled value into the raw converter format
//! and decode it again, so injected raw faults take the production path.

use core::convert::Infallible;
use core::time::Duration;

use embedded_hal::digital::{ErrorType, OutputPin};

use crate::app::ports::{ActuatorPort, ScalePort, SensorPort, Switch, SwitchPort, WatchdogPort};
use crate::drivers::dimmer::{DEFAULT_MAX_VALUE, PhaseControl};
use crate::drivers::switches::SwitchBank;
use crate::error::SensorError;
use crate::sensors::scale::DualLoadCell;
use crate::sensors::{pressure, thermocouple};
use crate::time::Instant;

const STEP: Duration = Duration::from_millis(1);
/// 50 Hz mains, two crossings per cycle.
const CROSSING_PERIOD: Duration = Duration::from_millis(10);
const SCALE_PERIOD: Duration = Duration::from_millis(100);

const AMBIENT_C: f32 = 22.0;
/// Heating rate with the heater firing continuously (°C/s).
const HEAT_RATE: f32 = 1.5;
/// Loss towards ambient (1/s).
const LOSS_RATE: f32 = 0.002;
/// Fraction of the boiler replaced by inlet water per pump stroke.
const STROKE_MIXING: f32 = 0.000_2;

const BAR_PER_STROKE: f32 = 0.24;
/// Pressure bleed rates (1/s).
const BLEED_OPEN: f32 = 1.0;
const BLEED_CLOSED: f32 = 20.0;
/// Extra bleed with the steam valve open (1/s).
const BLEED_STEAM: f32 = 3.0;
/// Beverage flow into the cup per bar of group pressure (g/s).
const CUP_GRAMS_PER_BAR_S: f32 = 1.0;

const SCALE_ZERO: [i32; 2] = [84_000, -61_000];

/// Virtual output behind a dimmer; the model reads the dimmer state.
#[derive(Debug, Default)]
pub struct SimPin;

impl ErrorType for SimPin {
    type Error = Infallible;
}

impl OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        Ok(())
    }
    fn set_high(&mut self) -> Result<(), Infallible> {
        Ok(())
    }
}

/// The whole machine: boiler, pump, group, panel, scale and watchdog.
pub struct SimMachine {
    now: Instant,
    next_crossing: Instant,

    // Plant
    temperature: f32,
    pressure: f32,
    heater_connected: bool,
    steam_valve_open: bool,

    // Outputs
    heater: PhaseControl<SimPin>,
    pump: PhaseControl<SimPin>,
    solenoid: bool,
    lights: [bool; 3],

    // Inputs
    pressed: [bool; 3],
    switches: SwitchBank,

    // Scale
    scale: DualLoadCell,
    cup_grams: f32,
    next_scale_sample: Instant,

    // Fault injection
    thermocouple_open: bool,
    pressure_counts: Option<u16>,
    pressure_hold: Option<f32>,

    // Watchdog
    watchdog_enabled: bool,
    feeds: u32,
}

impl Default for SimMachine {
    fn default() -> Self {
        Self::new()
    }
}

fn switch_index(switch: Switch) -> usize {
    match switch {
        Switch::Power => 0,
        Switch::Brew => 1,
        Switch::Steam => 2,
    }
}

impl SimMachine {
    /// A cold machine at ambient temperature, no scale, all switches off.
    pub fn new() -> Self {
        Self {
            now: Instant::ZERO,
            next_crossing: Instant::ZERO,
            temperature: AMBIENT_C,
            pressure: 0.0,
            heater_connected: true,
            steam_valve_open: false,
            heater: PhaseControl::new(SimPin, DEFAULT_MAX_VALUE, 1),
            pump: PhaseControl::new(SimPin, DEFAULT_MAX_VALUE, 2),
            solenoid: false,
            lights: [false; 3],
            pressed: [false; 3],
            switches: SwitchBank::new(),
            scale: DualLoadCell::new(),
            cup_grams: 0.0,
            next_scale_sample: Instant::ZERO,
            thermocouple_open: false,
            pressure_counts: None,
            pressure_hold: None,
            watchdog_enabled: true,
            feeds: 0,
        }
    }

    pub fn now(&self) -> Instant {
        self.now
    }

    /// Run the model forward by `dt`, in whole milliseconds.
    pub fn advance(&mut self, dt: Duration) {
        for _ in 0..dt.as_millis() {
            self.step();
        }
    }

    fn step(&mut self) {
        self.now += STEP;
        let dt = STEP.as_secs_f32();

        while self.now.reached(self.next_crossing) {
            self.zero_crossing();
            self.next_crossing += CROSSING_PERIOD;
        }

        if self.heater_connected && self.heater.is_firing() {
            self.temperature += HEAT_RATE * dt;
        }
        self.temperature -= LOSS_RATE * (self.temperature - AMBIENT_C) * dt;

        let mut bleed = if self.solenoid { BLEED_OPEN } else { BLEED_CLOSED };
        if self.steam_valve_open {
            bleed += BLEED_STEAM;
        }
        self.pressure -= bleed * self.pressure * dt;

        if self.solenoid && self.pressure > 0.0 {
            self.cup_grams += CUP_GRAMS_PER_BAR_S * self.pressure * dt;
        }

        for switch in Switch::ALL {
            let pin_high = !self.pressed[switch_index(switch)];
            self.switches.sample_pin(switch, pin_high, self.now);
        }

        if self.scale.is_connected() && self.now.reached(self.next_scale_sample) {
            let (left, right) = DualLoadCell::counts_for(self.cup_grams, SCALE_ZERO);
            self.scale.push_sample(left, right);
            self.next_scale_sample = self.now + SCALE_PERIOD;
        }
    }

    fn zero_crossing(&mut self) {
        self.heater.on_zero_crossing(self.now);
        let before = self.pump.strokes().peek();
        self.pump.on_zero_crossing(self.now);
        if self.pump.strokes().peek() != before {
            self.pressure += BAR_PER_STROKE;
            self.temperature -= STROKE_MIXING * (self.temperature - AMBIENT_C);
        }
    }

    // ── Panel ─────────────────────────────────────────────────

    /// Set the physical switch position; the debounced level follows.
    pub fn set_switch(&mut self, switch: Switch, on: bool) {
        self.pressed[switch_index(switch)] = on;
    }

    pub fn press(&mut self, switch: Switch) {
        self.set_switch(switch, true);
    }

    pub fn release(&mut self, switch: Switch) {
        self.set_switch(switch, false);
    }

    /// Physical position, before debouncing.
    pub fn switch_position(&self, switch: Switch) -> bool {
        self.pressed[switch_index(switch)]
    }

    pub fn light(&self, light: Switch) -> bool {
        self.lights[switch_index(light)]
    }

    // ── Plant ─────────────────────────────────────────────────

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    pub fn set_temperature(&mut self, celsius: f32) {
        self.temperature = celsius;
    }

    pub fn pressure(&self) -> f32 {
        self.pressure
    }

    pub fn set_pressure(&mut self, bar: f32) {
        self.pressure = bar;
    }

    /// Make the transducer report a fixed value regardless of the model.
    pub fn hold_pressure(&mut self, bar: Option<f32>) {
        self.pressure_hold = bar;
    }

    /// A disconnected element never heats.
    pub fn set_heater_connected(&mut self, connected: bool) {
        self.heater_connected = connected;
    }

    pub fn set_steam_valve_open(&mut self, open: bool) {
        self.steam_valve_open = open;
    }

    pub fn solenoid_open(&self) -> bool {
        self.solenoid
    }

    pub fn heater_value(&self) -> u32 {
        self.heater.value()
    }

    pub fn pump_value(&self) -> u32 {
        self.pump.value()
    }

    // ── Scale ─────────────────────────────────────────────────

    /// Plug the scale in; it tares itself over its first samples.
    pub fn attach_scale(&mut self) {
        self.scale = DualLoadCell::new();
        self.scale.set_connected(true);
        self.next_scale_sample = self.now;
    }

    pub fn detach_scale(&mut self) {
        self.scale.set_connected(false);
    }

    /// Load on the scale (g).
    pub fn cup_grams(&self) -> f32 {
        self.cup_grams
    }

    pub fn set_cup_grams(&mut self, grams: f32) {
        self.cup_grams = grams;
    }

    // ── Faults ────────────────────────────────────────────────

    pub fn inject_thermocouple_open(&mut self, open: bool) {
        self.thermocouple_open = open;
    }

    /// Raw ADC counts the transducer reports instead of the model value.
    pub fn inject_pressure_counts(&mut self, counts: Option<u16>) {
        self.pressure_counts = counts;
    }

    // ── Watchdog ──────────────────────────────────────────────

    pub fn set_watchdog_enabled(&mut self, enabled: bool) {
        self.watchdog_enabled = enabled;
    }

    pub fn feeds(&self) -> u32 {
        self.feeds
    }
}

impl SensorPort for SimMachine {
    fn read_temp(&mut self) -> Result<f32, SensorError> {
        let frame = if self.thermocouple_open {
            0
        } else {
            thermocouple::encode_frame(self.temperature)
        };
        thermocouple::decode_frame(frame)
    }

    fn read_pressure(&mut self) -> Result<f32, SensorError> {
        let counts = self.pressure_counts.unwrap_or_else(|| {
            pressure::bar_to_counts(self.pressure_hold.unwrap_or(self.pressure))
        });
        pressure::counts_to_bar(counts)
    }
}

impl ScalePort for SimMachine {
    fn read_weight(&mut self) -> f32 {
        self.scale.weight()
    }

    fn scale_start_tare(&mut self) {
        self.scale.start_tare();
    }

    fn scale_tare_immediately(&mut self) {
        self.scale.tare_immediately();
    }

    fn is_scale_connected(&self) -> bool {
        self.scale.is_connected()
    }

    fn is_scale_taring(&self) -> bool {
        self.scale.is_taring()
    }
}

impl SwitchPort for SimMachine {
    fn get_switch(&mut self, switch: Switch) -> bool {
        self.switches.get(switch)
    }

    fn is_power_just_pressed(&mut self) -> bool {
        self.switches.power_just_pressed()
    }
}

impl ActuatorPort for SimMachine {
    fn set_heater(&mut self, power: f32) {
        self.heater.set_power(power);
    }

    fn set_pump(&mut self, power: f32) {
        self.pump.set_power(power);
    }

    fn set_solenoid(&mut self, open: bool) {
        self.solenoid = open;
    }

    fn set_light(&mut self, light: Switch, on: bool) {
        self.lights[switch_index(light)] = on;
    }

    fn heater_power(&self) -> f32 {
        self.heater.power()
    }

    fn pump_power(&self) -> f32 {
        self.pump.power()
    }

    fn take_pump_strokes(&mut self) -> u32 {
        self.pump.take_strokes()
    }
}

impl WatchdogPort for SimMachine {
    fn feed(&mut self) {
        self.feeds += 1;
    }

    fn is_enabled(&self) -> bool {
        self.watchdog_enabled
    }
}
