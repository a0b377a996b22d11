//! Light patterns for the single-colour panel lights.
//!
//! Two patterns exist:
//!
//! | Pattern      | Light | Shape                                            |
//! |--------------|-------|--------------------------------------------------|
//! | Status blink | Brew  | square wave with a configurable half-period      |
//! | Fault code   | Power | `code + 1` blinks of 500 ms on / 500 ms off, 2 s pause |
//!
//! Both are pure functions of time so the control loop can poll them each
//! iteration without blocking. [`signal_forever`] plays the fault code with
//! a blocking delay for platforms that park the core after a fault.

use core::time::Duration;

use embedded_hal::delay::DelayNs;

use crate::error::Fault;
use crate::time::Instant;

const FAULT_BLINK_MS: u64 = 500;
const FAULT_PAUSE_MS: u64 = 2_000;

// ───────────────────────────────────────────────────────────────
// Status blink
// ───────────────────────────────────────────────────────────────

/// Square-wave blinker. A zero period disables it.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusBlink {
    half_period: Option<Duration>,
    since: Instant,
}

impl StatusBlink {
    pub const fn new() -> Self {
        Self {
            half_period: None,
            since: Instant::ZERO,
        }
    }

    /// Start blinking with the given half-period, or stop on zero.
    pub fn set_period(&mut self, half_period: Duration, now: Instant) {
        self.half_period = (!half_period.is_zero()).then_some(half_period);
        self.since = now;
    }

    pub fn is_active(&self) -> bool {
        self.half_period.is_some()
    }

    /// Light level at `now`, `None` while disabled. Starts lit.
    pub fn level(&self, now: Instant) -> Option<bool> {
        let half = self.half_period?.as_micros() as u64;
        let elapsed = now.saturating_duration_since(self.since).as_micros() as u64;
        Some((elapsed / half) % 2 == 0)
    }
}

// ───────────────────────────────────────────────────────────────
// Fault code
// ───────────────────────────────────────────────────────────────

/// Repeating blink code for a latched fault.
#[derive(Debug, Clone, Copy)]
pub struct FaultSignal {
    fault: Fault,
    since: Instant,
}

impl FaultSignal {
    pub fn new(fault: Fault, now: Instant) -> Self {
        Self { fault, since: now }
    }

    pub fn fault(&self) -> Fault {
        self.fault
    }

    fn round_ms(&self) -> u64 {
        u64::from(self.fault.blink_count()) * 2 * FAULT_BLINK_MS + FAULT_PAUSE_MS
    }

    /// Power-light level at `now`.
    pub fn level(&self, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.since).as_millis() as u64;
        let phase = elapsed % self.round_ms();
        let blinking = u64::from(self.fault.blink_count()) * 2 * FAULT_BLINK_MS;
        phase < blinking && (phase / FAULT_BLINK_MS) % 2 == 0
    }
}

/// Play the fault code on `light` forever. Never returns.
pub fn signal_forever<D: DelayNs>(fault: Fault, delay: &mut D, mut light: impl FnMut(bool)) -> ! {
    loop {
        for _ in 0..fault.blink_count() {
            light(true);
            delay.delay_ms(FAULT_BLINK_MS as u32);
            light(false);
            delay.delay_ms(FAULT_BLINK_MS as u32);
        }
        delay.delay_ms(FAULT_PAUSE_MS as u32);
    }
}
