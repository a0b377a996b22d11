//! Shared mutable context threaded through every FSM handler.
//!
//! `FsmContext` is the single struct that state hooks, transition checks
//! and tasks read from and write to: the hardware, the current time, the
//! settings snapshot for this iteration, machine timestamps, the sensor
//! pipeline, the closed-loop controls and a small outbox for notifications.
//! Think of it as the "blackboard" in a blackboard architecture. It is owned
//! by the [`Controller`](crate::app::service::Controller) and never
//! captured implicitly.

use heapless::Deque;
use log::{info, warn};

use crate::app::events::OutboundMessage;
use crate::app::ports::Hardware;
use crate::config::Settings;
use crate::control::Control;
use crate::error::Result;
use crate::sensors::{SensorPipeline, Sensors};
use crate::time::Instant;

use super::StateId;

/// Notifications buffered within one iteration.
pub const OUTBOX_CAPACITY: usize = 8;

/// Boiler below this at power-on counts as a cold start (°C).
pub const COLD_START_BELOW_C: f32 = 70.0;

// ---------------------------------------------------------------------------
// Machine timestamps
// ---------------------------------------------------------------------------

/// Session bookkeeping, written only on state entry/exit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MachineState {
    /// When the machine last left Off.
    pub machine_start_time: Instant,
    /// When the current state was entered.
    pub state_change_time: Instant,
    /// When the current (or last) shot started.
    pub brew_start_time: Instant,
    /// Boiler was cold when the machine was switched on.
    pub cold_start: bool,
}

impl MachineState {
    pub const fn new() -> Self {
        Self {
            machine_start_time: Instant::ZERO,
            state_change_time: Instant::ZERO,
            brew_start_time: Instant::ZERO,
            cold_start: false,
        }
    }
}

impl Default for MachineState {
    fn default() -> Self {
        Self::new()
    }
}

/// Backflush/descale position, published after every step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaintenanceProgress {
    pub stage: u8,
    pub cycle: u8,
}

// ---------------------------------------------------------------------------
// FsmContext
// ---------------------------------------------------------------------------

/// The shared context passed to every state handler function.
pub struct FsmContext<H: Hardware> {
    /// Machine I/O.
    pub hw: H,
    /// Time of the current control-loop iteration.
    pub now: Instant,
    /// Settings snapshot, refreshed between iterations.
    pub settings: Settings,
    pub machine: MachineState,
    pub pipeline: SensorPipeline,
    pub control: Control,
    /// Set while a maintenance program runs.
    pub maintenance: Option<MaintenanceProgress>,
    outbox: Deque<OutboundMessage, OUTBOX_CAPACITY>,
}

impl<H: Hardware> FsmContext<H> {
    pub fn new(hw: H, settings: Settings) -> Self {
        Self {
            hw,
            now: Instant::ZERO,
            control: Control::new(&settings),
            settings,
            machine: MachineState::new(),
            pipeline: SensorPipeline::new(),
            maintenance: None,
            outbox: Deque::new(),
        }
    }

    /// Latest filtered sensors.
    pub fn sensors(&self) -> Sensors {
        self.pipeline.sensors()
    }

    /// Refresh the sensor pipeline for this iteration.
    pub fn update_sensors(&mut self) -> Result<()> {
        self.pipeline
            .update(&mut self.hw, self.now, self.settings.pump_zero)?;
        Ok(())
    }

    /// Re-seed the filters and the heater PID from fresh readings.
    ///
    /// Returns the fresh raw temperature.
    pub fn reset(&mut self) -> Result<f32> {
        let temperature = self.pipeline.reset(&mut self.hw, self.now)?;
        self.control.reset_pid(temperature, self.now);
        Ok(temperature)
    }

    /// Run the closed-loop outputs for this iteration.
    pub fn update_control(&mut self) {
        let sensors = self.pipeline.sensors();
        self.control
            .update(self.now, &sensors, &self.settings, &mut self.hw);
    }

    /// Enable or disable the boiler PID, seeded from the filtered reading.
    pub fn set_boiler_enabled(&mut self, enabled: bool) {
        let temperature = self.pipeline.sensors().temperature;
        self.control
            .set_boiler_enabled(enabled, temperature, self.now, &mut self.hw);
    }

    pub fn set_pump_enabled(&mut self, enabled: bool) {
        self.control.set_pump_enabled(enabled, &mut self.hw);
    }

    /// Blink the Brew light; a zero period stops it.
    pub fn set_light_blink(&mut self, half_period: core::time::Duration) {
        self.control.set_light_blink(half_period, self.now);
    }

    // ── Notifications ─────────────────────────────────────────

    /// Queue a message for the sink. The oldest message is dropped when the
    /// outbox is full.
    pub fn publish(&mut self, msg: OutboundMessage) {
        if self.outbox.is_full() {
            warn!("outbox full, dropping {:?}", self.outbox.front());
            self.outbox.pop_front();
        }
        let _ = self.outbox.push_back(msg);
    }

    /// Record and publish maintenance progress.
    pub fn publish_maintenance(&mut self, stage: u8, cycle: u8) {
        info!("maintenance: stage {} cycle {}", stage, cycle);
        self.maintenance = Some(MaintenanceProgress { stage, cycle });
        self.publish(OutboundMessage::MaintenanceStatus { stage, cycle });
    }

    /// Hand buffered messages to the caller, oldest first.
    pub fn drain_outbox(&mut self) -> impl Iterator<Item = OutboundMessage> + '_ {
        core::iter::from_fn(move || self.outbox.pop_front())
    }

    /// The state-change message for the current machine state.
    pub fn state_change_message(&self, state: Option<StateId>) -> OutboundMessage {
        OutboundMessage::StateChange {
            new_state: StateId::raw(state),
            state_change_ms: self.machine.state_change_time.as_millis(),
            machine_start_ms: self.machine.machine_start_time.as_millis(),
        }
    }

    /// Hook run by the engine after every completed state change.
    pub fn on_state_change(&mut self, old: Option<StateId>, new: StateId) {
        self.machine.state_change_time = self.now;
        if new == StateId::Brew {
            // Flow accounting restarts with the shot.
            self.hw.take_pump_strokes();
        }
        let msg = self.state_change_message(Some(new));
        self.publish(msg);
        info!("state change: {} -> {}", StateId::raw(old), new as i8);
    }
}
