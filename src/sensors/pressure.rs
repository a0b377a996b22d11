//! Ratiometric pressure transducer on a 12-bit ADC.
//!
//! 0.5–4.5 V over 0–12 bar, divided down to the ADC range:
//! `bar = (counts - 409.6) / 273.07`.

use crate::error::SensorError;

const ZERO_COUNTS: f32 = 409.6;
const COUNTS_PER_BAR: f32 = 273.07;

/// Plausible range (bar). A disconnected transducer reads well below.
pub const MIN_PLAUSIBLE_BAR: f32 = -1.0;
pub const MAX_PLAUSIBLE_BAR: f32 = 20.0;

/// Convert raw ADC counts to bar.
pub fn counts_to_bar(counts: u16) -> Result<f32, SensorError> {
    let bar = (f32::from(counts) - ZERO_COUNTS) / COUNTS_PER_BAR;
    if !(MIN_PLAUSIBLE_BAR..=MAX_PLAUSIBLE_BAR).contains(&bar) {
        return Err(SensorError::PressureOutOfRange);
    }
    Ok(bar)
}

/// ADC counts a transducer would produce at `bar`.
pub fn bar_to_counts(bar: f32) -> u16 {
    (bar * COUNTS_PER_BAR + ZERO_COUNTS).round().clamp(0.0, 4095.0) as u16
}
