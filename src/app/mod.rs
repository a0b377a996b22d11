//! Application core: pure domain logic, zero I/O.
//!
//! This module contains the business rules of the espresso controller:
//! the control-core orchestrator, the services-core loop and the shared
//! state between them. All interaction with hardware happens through
//! **port traits** defined in [`ports`], keeping this layer fully testable
//! without real peripherals.

pub mod commands;
pub mod events;
pub mod link;
pub mod ports;
pub mod service;
pub mod services;
