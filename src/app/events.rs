//! Outbound notifications.
//!
//! The control core and the services loop emit these through the
//! [`MessageSink`](super::ports::MessageSink) port. What happens to them
//! next (wire encoding, TCP framing, retries) is the transport's concern.

use crate::config::Settings;

/// Notifications leaving the control core.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutboundMessage {
    /// The state machine entered a new state.
    StateChange {
        /// State id, or -1 when no state is active.
        new_state: i8,
        /// When the new state was entered (ms since boot).
        state_change_ms: u64,
        /// When the machine was last switched on (ms since boot).
        machine_start_ms: u64,
    },

    /// Periodic sensor telemetry.
    SensorStatus {
        temperature: f32,
        pressure: f32,
        /// NaN when no scale is attached.
        weight: f32,
        flow: f32,
    },

    /// Backflush/descale progress.
    MaintenanceStatus { stage: u8, cycle: u8 },

    /// Current settings, sent in answer to a status request.
    Settings(Settings),
}
