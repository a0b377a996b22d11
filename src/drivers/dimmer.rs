//! Mains-synchronous phase-control driver (heater SSR, pump triac).
//!
//! ## Firing
//!
//! Every accepted zero crossing makes one firing decision by delta-sigma
//! accumulation:
//!
//! ```text
//! acc += value
//! if acc >= max_value { acc -= max_value; fire }   else { release }
//! ```
//!
//! so `value / max_value` of all decisions fire, spread as evenly as the
//! resolution allows. A divider of `n` makes a decision only on every
//! `n`-th crossing; the output holds its level in between.
//!
//! ## Interrupt contract
//!
//! [`PhaseControl::on_zero_crossing`] runs in interrupt context and never
//! blocks. Crossings closer than 6 ms to the previous accepted one are
//! noise on the detector and are ignored. The stroke counter is an
//! `AtomicU32` so the control loop can read-and-reset it with a single
//! word swap while the interrupt keeps counting.

use core::sync::atomic::{AtomicU32, Ordering};
use core::time::Duration;

use embedded_hal::digital::OutputPin;
use log::warn;

use crate::time::Instant;

/// Default duty resolution (steps).
pub const DEFAULT_MAX_VALUE: u32 = 100;

/// Crossings closer than this to the last accepted one are glitches.
pub const GLITCH_WINDOW: Duration = Duration::from_millis(6);

/// Fires counted by the interrupt, drained by the control loop.
#[derive(Debug, Default)]
pub struct StrokeCounter(AtomicU32);

impl StrokeCounter {
    pub const fn new() -> Self {
        Self(AtomicU32::new(0))
    }

    fn record(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    /// Count since the last call.
    pub fn take(&self) -> u32 {
        self.0.swap(0, Ordering::AcqRel)
    }

    pub fn peek(&self) -> u32 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Delta-sigma phase-control output.
pub struct PhaseControl<P: OutputPin> {
    pin: P,
    max_value: u32,
    value: u32,
    accumulator: u32,
    divider: u8,
    divider_counter: u8,
    last_crossing: Option<Instant>,
    firing: bool,
    strokes: StrokeCounter,
    pin_errors: u32,
}

impl<P: OutputPin> PhaseControl<P> {
    /// `divider` of 0 is treated as 1.
    pub fn new(pin: P, max_value: u32, divider: u8) -> Self {
        Self {
            pin,
            max_value: max_value.max(1),
            value: 0,
            accumulator: 0,
            divider: divider.max(1),
            divider_counter: 0,
            last_crossing: None,
            firing: false,
            strokes: StrokeCounter::new(),
            pin_errors: 0,
        }
    }

    pub fn max_value(&self) -> u32 {
        self.max_value
    }

    pub fn value(&self) -> u32 {
        self.value
    }

    /// Requested power as a fraction of full.
    pub fn power(&self) -> f32 {
        self.value as f32 / self.max_value as f32
    }

    pub fn is_firing(&self) -> bool {
        self.firing
    }

    /// Request a duty in steps, clamped to `max_value`.
    ///
    /// Zero releases the output right away instead of waiting for the next
    /// crossing.
    pub fn set_value(&mut self, value: u32) {
        self.value = value.min(self.max_value);
        if self.value == 0 {
            self.release();
        }
    }

    /// Request a fraction of full power. Out-of-range and NaN requests
    /// are clamped to [0, 1].
    pub fn set_power(&mut self, power: f32) {
        let power = if power.is_nan() { 0.0 } else { power.clamp(0.0, 1.0) };
        self.set_value((power * self.max_value as f32).round() as u32);
    }

    /// Zero-crossing interrupt handler. Returns whether the output fires
    /// for the coming cycle.
    pub fn on_zero_crossing(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_crossing {
            if now.saturating_duration_since(last) < GLITCH_WINDOW {
                return self.firing;
            }
        }
        self.last_crossing = Some(now);

        self.divider_counter += 1;
        if self.divider_counter < self.divider {
            return self.firing;
        }
        self.divider_counter = 0;

        self.accumulator += self.value;
        if self.accumulator >= self.max_value {
            self.accumulator -= self.max_value;
            self.firing = true;
            if let Err(e) = self.pin.set_high() {
                self.pin_error("set_high", &e);
            }
            self.strokes.record();
        } else {
            self.release();
        }
        self.firing
    }

    /// Fires since the last call (read-and-reset).
    pub fn take_strokes(&self) -> u32 {
        self.strokes.take()
    }

    pub fn strokes(&self) -> &StrokeCounter {
        &self.strokes
    }

    /// Pin writes that failed since construction.
    pub fn pin_errors(&self) -> u32 {
        self.pin_errors
    }

    fn release(&mut self) {
        self.firing = false;
        if let Err(e) = self.pin.set_low() {
            self.pin_error("set_low", &e);
        }
    }

    fn pin_error(&mut self, op: &str, e: &P::Error) {
        self.pin_errors = self.pin_errors.saturating_add(1);
        warn!("dimmer: {} failed: {:?}", op, e);
    }
}
