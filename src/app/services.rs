//! Services-core loop.
//!
//! Runs beside the network stack on the second core. Each tick it reports
//! liveness for the watchdog and, at a fixed cadence, publishes sensor
//! telemetry from the control core's last status snapshot. Inbound
//! commands are interpreted here and turned into scheduled state changes
//! or settings updates; the control core is never touched directly.

use core::time::Duration;

use log::{debug, info, warn};

use crate::fsm::StateId;
use crate::safety::watchdog::Core;
use crate::time::Instant;

use super::commands::{Command, MaintenanceRequest};
use super::events::OutboundMessage;
use super::link::CoreLink;
use super::ports::{ConfigError, ConfigPort, MessageSink};

pub const BREW_TELEMETRY_INTERVAL: Duration = Duration::from_millis(100);
pub const TELEMETRY_INTERVAL: Duration = Duration::from_millis(250);
/// Telemetry is skipped while this many messages are already queued.
pub const MAX_PENDING_FOR_TELEMETRY: usize = 5;

/// The services side of the [`CoreLink`].
pub struct ServicesLoop<'l> {
    link: &'l CoreLink,
    next_telemetry: Instant,
}

impl<'l> ServicesLoop<'l> {
    pub fn new(link: &'l CoreLink) -> Self {
        Self {
            link,
            next_telemetry: Instant::ZERO,
        }
    }

    /// One pass of the services loop.
    pub fn tick(&mut self, now: Instant, sink: &mut impl MessageSink) {
        self.link.liveness.report(Core::Services);

        let status = self.link.status();
        if status.state_id == StateId::Off as i8 || status.state_id == StateId::NONE {
            return;
        }
        if !now.reached(self.next_telemetry) || sink.pending() >= MAX_PENDING_FOR_TELEMETRY {
            return;
        }

        let sensors = status.sensors;
        let sent = sink.enqueue(OutboundMessage::SensorStatus {
            temperature: sensors.temperature,
            pressure: sensors.pressure,
            weight: sensors.weight,
            flow: sensors.flow,
        });
        if !sent {
            debug!("telemetry dropped");
        }

        let interval = if status.state_id == StateId::Brew as i8 {
            BREW_TELEMETRY_INTERVAL
        } else {
            TELEMETRY_INTERVAL
        };
        self.next_telemetry = now + interval;
    }

    /// Interpret one inbound command.
    ///
    /// Only a settings update can fail; a rejected update leaves the live
    /// settings untouched and nothing is persisted.
    pub fn handle_command(
        &mut self,
        cmd: Command,
        sink: &mut impl MessageSink,
        config: &mut impl ConfigPort,
    ) -> Result<(), ConfigError> {
        let state = StateId::from_id(i32::from(self.link.get_state_id()));

        match cmd {
            Command::SetPower(on) => match (on, state) {
                (true, Some(StateId::Off)) => self.schedule(StateId::Standby),
                (false, Some(s)) if s != StateId::Off => self.schedule(StateId::Off),
                _ => debug!("power {} ignored in state {:?}", on, state),
            },

            Command::Maintenance(req) => match (req, state) {
                (MaintenanceRequest::Backflush, Some(StateId::Standby)) => {
                    self.schedule(StateId::Backflush)
                }
                (MaintenanceRequest::Descale, Some(StateId::Standby)) => {
                    self.schedule(StateId::Descale)
                }
                (MaintenanceRequest::Stop, Some(StateId::Backflush | StateId::Descale)) => {
                    self.schedule(StateId::Standby)
                }
                _ => warn!("maintenance {:?} not allowed in state {:?}", req, state),
            },

            Command::UpdateSettings(settings) => {
                self.link.settings.update(settings)?;
                config.save(&settings)?;
                info!("settings updated and saved");
            }

            Command::GetStatus => {
                let status = self.link.status();
                sink.enqueue(OutboundMessage::StateChange {
                    new_state: status.state_id,
                    state_change_ms: status.state_change_ms,
                    machine_start_ms: status.machine_start_ms,
                });
                sink.enqueue(OutboundMessage::Settings(self.link.settings.get()));
                if let Some(progress) = status.maintenance {
                    sink.enqueue(OutboundMessage::MaintenanceStatus {
                        stage: progress.stage,
                        cycle: progress.cycle,
                    });
                }
            }
        }
        Ok(())
    }

    fn schedule(&self, state: StateId) {
        info!("scheduling state {:?}", state);
        self.link.schedule_state_change_by_id(state as i32);
    }
}
