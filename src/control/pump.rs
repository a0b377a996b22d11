//! Pump power model.
//!
//! The vibratory pump moves a pressure-dependent volume per stroke and can
//! fire at most once per mains cycle. Two independent estimates are taken
//! and the smaller one wins, so neither the pressure target nor the flow
//! target is exceeded:
//!
//! - pressure: `((target - measured) / FULL_POWER_ERROR_BAR) ^ STEEPNESS`,
//!   zero once the target is reached
//! - flow: strokes/s needed for the target flow, divided by the mains rate

/// Mains frequency the pump strokes are locked to (Hz).
pub const MAINS_FREQUENCY_HZ: f32 = 50.0;

/// Pressure error at which the pressure estimate reaches full power (bar).
const FULL_POWER_ERROR_BAR: f32 = 3.0;

/// Exponent of the pressure ramp. Below 1 the pump backs off late.
const STEEPNESS: f32 = 0.4;

/// Volume per stroke (ml) as a quintic in pressure (bar), highest degree
/// first. Fitted against the pump datasheet, converted at 50 Hz.
const FLOW_PER_STROKE_COEFFS: [f32; 6] = [
    -4.682_241_2e-7,
    2.215_812_3e-5,
    -4.314_156_5e-4,
    4.065_919_2e-3,
    -2.940_510_8e-2,
    0.217_111_78,
];

/// Volume per stroke (ml) at `pressure`, shifted by the calibration offset.
pub fn flow_per_stroke(pressure: f32, pump_zero: f32) -> f32 {
    let datasheet = FLOW_PER_STROKE_COEFFS[1..]
        .iter()
        .fold(FLOW_PER_STROKE_COEFFS[0], |acc, c| acc * pressure + c);
    datasheet + pump_zero
}

/// Flow (ml/s) given `strokes` fired over `window_secs` at `pressure`.
pub fn flow_from_strokes(strokes: u32, window_secs: f32, pressure: f32, pump_zero: f32) -> f32 {
    if window_secs <= 0.0 {
        return 0.0;
    }
    flow_per_stroke(pressure, pump_zero) * strokes as f32 / window_secs
}

/// Pressure-driven estimate.
pub fn power_for_pressure(target_pressure: f32, pressure: f32) -> f32 {
    let error = target_pressure - pressure;
    if error <= 0.0 {
        return 0.0;
    }
    (error / FULL_POWER_ERROR_BAR).powf(STEEPNESS)
}

/// Flow-driven estimate. Zero for a non-positive target.
pub fn power_for_flow(target_flow: f32, pressure: f32, pump_zero: f32) -> f32 {
    if target_flow <= 0.0 {
        return 0.0;
    }
    let per_stroke = flow_per_stroke(pressure, pump_zero);
    if per_stroke <= 0.0 {
        // The model says the pump cannot move water here; let pressure decide.
        return 1.0;
    }
    target_flow / per_stroke / MAINS_FREQUENCY_HZ
}

/// Desired pump power in [0, 1].
///
/// `target_flow` of `None` leaves the flow unconstrained.
pub fn pump_power(
    pressure: f32,
    target_pressure: f32,
    target_flow: Option<f32>,
    pump_zero: f32,
) -> f32 {
    let by_pressure = power_for_pressure(target_pressure, pressure);
    let by_flow = target_flow.map_or(1.0, |flow| power_for_flow(flow, pressure, pump_zero));
    by_pressure.min(by_flow).clamp(0.0, 1.0)
}
