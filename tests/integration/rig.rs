//! Test rig: controller + services loop against the simulated machine.
//!
//! Time only moves through [`Rig::run`], which advances the machine model
//! and then runs one control iteration and one services tick at the new
//! instant, the way the two cores interleave on the real board.

use std::time::Duration;

use gaggico::Fault;
use gaggico::adapters::sim::SimMachine;
use gaggico::app::commands::Command;
use gaggico::app::events::OutboundMessage;
use gaggico::app::link::CoreLink;
use gaggico::app::ports::{ConfigError, ConfigPort, MessageSink, Switch};
use gaggico::app::service::Controller;
use gaggico::app::services::ServicesLoop;
use gaggico::config::Settings;
use gaggico::fsm::StateId;

// ── Recording sink ────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub msgs: Vec<OutboundMessage>,
}

impl MessageSink for RecordingSink {
    fn enqueue(&mut self, msg: OutboundMessage) -> bool {
        self.msgs.push(msg);
        true
    }

    fn pending(&self) -> usize {
        0
    }
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn state_changes(&self) -> Vec<i8> {
        self.msgs
            .iter()
            .filter_map(|m| match m {
                OutboundMessage::StateChange { new_state, .. } => Some(*new_state),
                _ => None,
            })
            .collect()
    }

    pub fn maintenance(&self) -> Vec<(u8, u8)> {
        self.msgs
            .iter()
            .filter_map(|m| match m {
                OutboundMessage::MaintenanceStatus { stage, cycle } => Some((*stage, *cycle)),
                _ => None,
            })
            .collect()
    }

    pub fn telemetry_count(&self) -> usize {
        self.msgs
            .iter()
            .filter(|m| matches!(m, OutboundMessage::SensorStatus { .. }))
            .count()
    }
}

// ── In-memory settings storage ────────────────────────────────

#[derive(Default)]
pub struct MemStore {
    pub saved: Option<Settings>,
}

impl ConfigPort for MemStore {
    fn load(&self) -> Result<Settings, ConfigError> {
        self.saved.ok_or(ConfigError::NotFound)
    }

    fn save(&mut self, settings: &Settings) -> Result<(), ConfigError> {
        self.saved = Some(*settings);
        Ok(())
    }
}

// ── Rig ───────────────────────────────────────────────────────

pub struct Rig {
    pub link: &'static CoreLink,
    pub ctl: Controller<'static, SimMachine>,
    pub services: ServicesLoop<'static>,
    pub sink: RecordingSink,
    pub store: MemStore,
    /// Simulated time per control iteration.
    pub period: Duration,
    /// When false the services core is stalled.
    pub services_running: bool,
}

#[allow(dead_code)]
impl Rig {
    pub fn new() -> Self {
        Self::with_settings(Settings::default())
    }

    /// Boiler at `celsius`, machine in Off.
    pub fn warm(celsius: f32) -> Self {
        let mut rig = Self::new();
        rig.hw().set_temperature(celsius);
        rig
    }

    pub fn with_settings(settings: Settings) -> Self {
        let link: &'static CoreLink = Box::leak(Box::new(CoreLink::new(settings)));
        let mut ctl = Controller::new(SimMachine::new(), link);
        let mut sink = RecordingSink::default();
        let now = ctl.hw().now();
        ctl.start(now, &mut sink).expect("start");
        Self {
            link,
            ctl,
            services: ServicesLoop::new(link),
            sink,
            store: MemStore::default(),
            period: Duration::from_millis(1),
            services_running: true,
        }
    }

    pub fn hw(&mut self) -> &mut SimMachine {
        self.ctl.hw_mut()
    }

    pub fn state(&self) -> Option<StateId> {
        self.ctl.state()
    }

    /// One control iteration (and services tick) after `self.period`.
    pub fn iterate(&mut self) -> Result<(), Fault> {
        self.ctl.hw_mut().advance(self.period);
        let now = self.ctl.hw().now();
        let result = self.ctl.iterate(now, &mut self.sink);
        if self.services_running {
            self.services.tick(now, &mut self.sink);
        }
        result
    }

    pub fn run(&mut self, duration: Duration) -> Result<(), Fault> {
        let steps = duration.as_millis() / self.period.as_millis();
        for _ in 0..steps {
            self.iterate()?;
        }
        Ok(())
    }

    /// Iterate until `done` holds; false if `limit` ran out first.
    pub fn run_until(&mut self, limit: Duration, mut done: impl FnMut(&mut Rig) -> bool) -> bool {
        let steps = limit.as_millis() / self.period.as_millis();
        for _ in 0..steps {
            if done(self) {
                return true;
            }
            if self.iterate().is_err() {
                return false;
            }
        }
        done(self)
    }

    pub fn command(&mut self, cmd: Command) -> Result<(), ConfigError> {
        self.services.handle_command(cmd, &mut self.sink, &mut self.store)
    }

    /// Flip the power switch on and wait for Standby.
    pub fn power_on(&mut self) {
        self.hw().press(Switch::Power);
        assert!(
            self.run_until(Duration::from_millis(200), |r| r.state() == Some(StateId::Standby)),
            "machine did not reach Standby"
        );
    }

    /// Set a switch and wait for the debounced level to follow.
    pub fn set_switch(&mut self, switch: Switch, on: bool) {
        self.hw().set_switch(switch, on);
        self.run(Duration::from_millis(30)).expect("switch");
    }
}
