//! Inbound commands.
//!
//! These arrive on the services core (already decoded by the transport)
//! and are interpreted by [`ServicesLoop`](super::services::ServicesLoop).
//! None of them touch the control core directly: state changes go through
//! the one-slot mailbox in [`CoreLink`](super::link::CoreLink).

use crate::config::Settings;

/// Maintenance program requested by the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaintenanceRequest {
    /// Abort the running program and return to Standby.
    Stop,
    Backflush,
    Descale,
}

/// Commands that the services layer can send into the core.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// Switch the machine on (Standby) or off.
    SetPower(bool),

    /// Start or stop a maintenance program.
    Maintenance(MaintenanceRequest),

    /// Validate, apply and persist new settings.
    UpdateSettings(Settings),

    /// Re-send the current state, settings and maintenance progress.
    GetStatus,
}
