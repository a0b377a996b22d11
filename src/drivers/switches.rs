//! Debounced front-panel switches.
//!
//! ## Hardware
//!
//! Three latching rocker switches (power, brew, steam), active low with
//! pull-ups. Each pin is sampled from the main loop; a new level is only
//! accepted after it has been stable for [`DEBOUNCE`].
//!
//! "Power just pressed" is a rising-edge detector over the debounced power
//! level and reports each press exactly once.

use core::time::Duration;

use crate::app::ports::Switch;
use crate::time::Instant;

/// Level must hold this long before it is accepted.
pub const DEBOUNCE: Duration = Duration::from_millis(20);

/// Debounce state for one input.
#[derive(Debug, Clone, Copy)]
pub struct Debouncer {
    stable: bool,
    candidate: bool,
    changed_at: Instant,
}

impl Debouncer {
    pub const fn new(initial: bool) -> Self {
        Self {
            stable: initial,
            candidate: initial,
            changed_at: Instant::ZERO,
        }
    }

    /// Feed a raw sample and return the debounced level.
    pub fn sample(&mut self, raw: bool, now: Instant) -> bool {
        if raw != self.candidate {
            self.candidate = raw;
            self.changed_at = now;
        }
        if self.candidate != self.stable && now.saturating_duration_since(self.changed_at) >= DEBOUNCE {
            self.stable = self.candidate;
        }
        self.stable
    }

    pub fn level(&self) -> bool {
        self.stable
    }
}

/// The three panel switches plus the power edge detector.
#[derive(Debug, Clone, Copy)]
pub struct SwitchBank {
    switches: [Debouncer; 3],
    power_was_on: bool,
}

impl Default for SwitchBank {
    fn default() -> Self {
        Self::new()
    }
}

fn index(switch: Switch) -> usize {
    match switch {
        Switch::Power => 0,
        Switch::Brew => 1,
        Switch::Steam => 2,
    }
}

impl SwitchBank {
    pub const fn new() -> Self {
        Self {
            switches: [Debouncer::new(false); 3],
            power_was_on: false,
        }
    }

    /// Feed the raw pin level (`true` = high = released).
    pub fn sample_pin(&mut self, switch: Switch, pin_high: bool, now: Instant) -> bool {
        self.switches[index(switch)].sample(!pin_high, now)
    }

    /// Debounced level (`true` = pressed / on).
    pub fn get(&self, switch: Switch) -> bool {
        self.switches[index(switch)].level()
    }

    /// True once per off → on transition of the debounced power switch.
    pub fn power_just_pressed(&mut self) -> bool {
        let on = self.get(Switch::Power);
        let edge = on && !self.power_was_on;
        self.power_was_on = on;
        edge
    }
}
