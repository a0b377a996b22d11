//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter        | Implements             | Connects to                |
//! |----------------|------------------------|----------------------------|
//! | `channel_sink` | MessageSink            | Cross-core message queue   |
//! | `log_sink`     | MessageSink            | Serial log output          |
//! | `sim`          | SensorPort, ScalePort, | Simulated machine model    |
//! |                | SwitchPort,            |                            |
//! |                | ActuatorPort,          |                            |
//! |                | WatchdogPort           |                            |
//!
//! `sim` is host-only: it builds under `cfg(test)` and with the `sim`
//! feature, which platform builds leave off.

pub mod channel_sink;
pub mod log_sink;
#[cfg(any(test, feature = "sim"))]
pub mod sim;
