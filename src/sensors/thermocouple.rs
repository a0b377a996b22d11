//! K-type thermocouple converter (MAX6675 style, 12-bit, 0.25 °C/LSB).
//!
//! ## Frame layout
//!
//! | Bits  | Meaning                         |
//! |-------|---------------------------------|
//! | 15    | dummy sign bit, always 0        |
//! | 14..3 | temperature, 0.25 °C per count  |
//! | 2     | thermocouple input open         |
//! | 1..0  | device id / state               |

use crate::error::SensorError;

const OPEN_INPUT_BIT: u16 = 1 << 2;
const DEG_PER_COUNT: f32 = 0.25;

/// Hottest reading still considered plausible (°C).
pub const MAX_PLAUSIBLE_C: f32 = 300.0;

/// Decode one 16-bit frame into °C.
///
/// An all-zero reading is treated as a dead probe rather than 0 °C: the
/// boiler never sits at freezing.
pub fn decode_frame(frame: u16) -> Result<f32, SensorError> {
    if frame & OPEN_INPUT_BIT != 0 {
        return Err(SensorError::ThermocoupleOpen);
    }
    let counts = frame >> 3;
    if counts == 0 {
        return Err(SensorError::ThermocoupleOpen);
    }
    let celsius = f32::from(counts) * DEG_PER_COUNT;
    if celsius > MAX_PLAUSIBLE_C {
        return Err(SensorError::TemperatureOutOfRange);
    }
    Ok(celsius)
}

/// Build the frame a converter would report for `celsius`.
pub fn encode_frame(celsius: f32) -> u16 {
    let counts = (celsius.max(0.0) / DEG_PER_COUNT).round() as u16 & 0x0FFF;
    counts << 3
}
