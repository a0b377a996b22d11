//! Dual load-cell drip-tray scale.
//!
//! Two 24-bit bridge amplifiers, one per cell, each with its own
//! calibration multiplier (counts per gram; the right cell is mounted
//! inverted). The weight is the sum of both cells after subtracting their
//! tare offsets.
//!
//! Taring comes in two flavours:
//!
//! - averaged: the next [`TARE_SAMPLES`] samples are summed and their mean
//!   becomes the offset; runs automatically on start-up
//! - immediate: the current sample becomes the offset right away

use log::debug;

/// Samples averaged by a regular tare.
pub const TARE_SAMPLES: u8 = 5;

const COUNTS_PER_GRAM_LEFT: f32 = 2189.0;
const COUNTS_PER_GRAM_RIGHT: f32 = -2273.0;

/// Tare and weight bookkeeping for the two cells.
#[derive(Debug, Clone)]
pub struct DualLoadCell {
    connected: bool,
    raw: [i32; 2],
    offsets: [f32; 2],
    tare_sum: [i64; 2],
    /// Samples collected by a running averaged tare.
    tare_step: Option<u8>,
    last_weight: f32,
}

impl Default for DualLoadCell {
    fn default() -> Self {
        Self::new()
    }
}

impl DualLoadCell {
    pub fn new() -> Self {
        Self {
            connected: false,
            raw: [0; 2],
            offsets: [0.0; 2],
            tare_sum: [0; 2],
            tare_step: Some(0),
            last_weight: f32::NAN,
        }
    }

    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn is_taring(&self) -> bool {
        self.connected && self.tare_step.is_some()
    }

    /// Feed one conversion from each cell and return the new weight (g).
    pub fn push_sample(&mut self, left: i32, right: i32) -> f32 {
        self.raw = [left, right];

        if let Some(step) = self.tare_step {
            self.tare_sum[0] += i64::from(left);
            self.tare_sum[1] += i64::from(right);
            let step = step + 1;
            if step >= TARE_SAMPLES {
                let n = f32::from(TARE_SAMPLES);
                self.offsets = [self.tare_sum[0] as f32 / n, self.tare_sum[1] as f32 / n];
                self.tare_step = None;
                debug!("scale: tare done, offsets {:?}", self.offsets);
            } else {
                self.tare_step = Some(step);
            }
        }

        let left_g = (left as f32 - self.offsets[0]) / COUNTS_PER_GRAM_LEFT;
        let right_g = (right as f32 - self.offsets[1]) / COUNTS_PER_GRAM_RIGHT;
        self.last_weight = left_g + right_g;
        self.last_weight
    }

    /// Latest weight, NaN before the first sample.
    pub fn weight(&self) -> f32 {
        self.last_weight
    }

    /// Begin an averaged tare. Ignored while disconnected.
    pub fn start_tare(&mut self) {
        if !self.connected {
            return;
        }
        self.tare_step = Some(0);
        self.tare_sum = [0; 2];
    }

    /// Zero against the latest sample. Ignored while disconnected.
    pub fn tare_immediately(&mut self) {
        if !self.connected {
            return;
        }
        self.offsets = [self.raw[0] as f32, self.raw[1] as f32];
    }

    /// Raw counts a load of `grams` split evenly over both cells would give,
    /// on top of the given zero-load counts.
    pub fn counts_for(grams: f32, zero: [i32; 2]) -> (i32, i32) {
        let half = grams / 2.0;
        (
            zero[0] + (half * COUNTS_PER_GRAM_LEFT).round() as i32,
            zero[1] + (half * COUNTS_PER_GRAM_RIGHT).round() as i32,
        )
    }
}
