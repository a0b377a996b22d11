//! Gaggico control-core library.
//!
//! Everything in here is pure control logic running against the port
//! traits in [`app::ports`]. The platform binary owns the real peripherals
//! and the services core; tests drive the same code against the simulated
//! machine in [`adapters::sim`] with simulated time.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod control;
pub mod drivers;
pub mod error;
pub mod fsm;
pub mod safety;
pub mod sensors;
pub mod time;

pub use error::{Fault, Result, SensorError};
pub use time::Instant;
