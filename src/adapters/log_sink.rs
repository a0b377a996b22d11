//! Log-based message sink adapter.
//!
//! Implements [`MessageSink`] by writing every outbound message to the
//! logger (UART / USB-CDC in production). Useful on a bench without the
//! network transport attached.

use log::info;

use crate::app::events::OutboundMessage;
use crate::app::ports::MessageSink;

/// Adapter that logs every [`OutboundMessage`] to the serial console.
#[derive(Debug, Default)]
pub struct LogSink {
    sent: u32,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages logged so far.
    pub fn sent(&self) -> u32 {
        self.sent
    }
}

impl MessageSink for LogSink {
    fn enqueue(&mut self, msg: OutboundMessage) -> bool {
        match msg {
            OutboundMessage::StateChange {
                new_state,
                state_change_ms,
                machine_start_ms,
            } => {
                info!(
                    "STATE | id={} | since={}ms | on_since={}ms",
                    new_state, state_change_ms, machine_start_ms
                );
            }
            OutboundMessage::SensorStatus {
                temperature,
                pressure,
                weight,
                flow,
            } => {
                info!(
                    "SENSORS | T={:.1}\u{00b0}C | P={:.2}bar | W={:.1}g | F={:.2}ml/s",
                    temperature, pressure, weight, flow
                );
            }
            OutboundMessage::MaintenanceStatus { stage, cycle } => {
                info!("MAINT | stage={} cycle={}", stage, cycle);
            }
            OutboundMessage::Settings(s) => {
                info!(
                    "SETTINGS | brew={:.1}\u{00b0}C steam={:.1}\u{00b0}C | {:.1}/{:.1}bar | pi={:.1}s | w={:.1}g",
                    s.brew_temp,
                    s.steam_temp,
                    s.preinfusion_pressure,
                    s.brew_pressure,
                    s.preinfusion_time,
                    s.brew_weight
                );
            }
        }
        self.sent += 1;
        true
    }

    fn pending(&self) -> usize {
        0
    }
}
