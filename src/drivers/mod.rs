//! Actuator and panel drivers.

pub mod blink;
pub mod dimmer;
pub mod switches;
