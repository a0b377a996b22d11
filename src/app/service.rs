//! Control-core orchestration.
//!
//! [`Controller`] owns the FSM, the shared context and the safety checks.
//! The platform calls [`Controller::iterate`] in a tight loop on the
//! control core; tests call it against the simulated machine.
//!
//! ```text
//!  SensorPort ──▶ ┌────────────────────────┐ ──▶ MessageSink
//!                 │       Controller       │
//! ActuatorPort ◀──│  FSM · Safety · PID    │ ◀──▶ CoreLink
//!                 └────────────────────────┘
//! ```
//!
//! One iteration, in order:
//!
//! 1. refresh the settings snapshot, run the watchdog liveness round
//! 2. thermal-runaway check
//! 3. a scheduled state change, if any, consumes the iteration
//! 4. the current state's transition check may consume the iteration
//! 5. a power press switches the machine off
//! 6. sensors, then the state task, then the closed-loop outputs
//!
//! Any fatal fault drives every output off and latches; from then on each
//! iteration only keeps the outputs safe and blinks the fault code.

use core::time::Duration;

use embedded_hal::delay::DelayNs;
use log::{error, warn};

use crate::error::{Fault, Result};
use crate::fsm::context::FsmContext;
use crate::fsm::{Fsm, StateId};
use crate::drivers::blink::{self, FaultSignal};
use crate::safety::{self, ThermalRunawayCheck, watchdog};
use crate::sensors::Sensors;
use crate::time::Instant;

use super::link::{CoreLink, StatusSnapshot};
use super::ports::{Hardware, MessageSink, Switch};

/// An iteration slower than this is logged.
pub const LATENCY_BUDGET: Duration = Duration::from_millis(10);

/// The control core.
pub struct Controller<'l, H: Hardware> {
    fsm: Fsm<H>,
    ctx: FsmContext<H>,
    link: &'l CoreLink,
    thermal: ThermalRunawayCheck,
    halted: Option<FaultSignal>,
    last_iteration: Option<Instant>,
}

impl<'l, H: Hardware> Controller<'l, H> {
    /// Does **not** enter any state; call [`start`](Self::start) next.
    pub fn new(hw: H, link: &'l CoreLink) -> Self {
        Self {
            fsm: Fsm::new(),
            ctx: FsmContext::new(hw, link.settings.get()),
            link,
            thermal: ThermalRunawayCheck::new(),
            halted: None,
            last_iteration: None,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Enter Off.
    pub fn start(&mut self, now: Instant, sink: &mut impl MessageSink) -> Result<()> {
        self.ctx.now = now;
        self.ctx.settings = self.link.settings.get();
        let result = self.fsm.change_state(StateId::Off, &mut self.ctx);
        self.finish(result, sink)
    }

    /// Run one control-loop iteration at `now`.
    ///
    /// Returns the latched fault once the controller has halted.
    pub fn iterate(&mut self, now: Instant, sink: &mut impl MessageSink) -> Result<()> {
        if let Some(signal) = self.halted {
            safety::emergency_stop(&mut self.ctx.hw);
            self.ctx.hw.set_light(Switch::Power, signal.level(now));
            return Err(signal.fault());
        }

        if let Some(last) = self.last_iteration {
            let elapsed = now.saturating_duration_since(last);
            if elapsed > LATENCY_BUDGET {
                warn!("control loop latency {} ms over budget", elapsed.as_millis());
            }
        }
        self.last_iteration = Some(now);
        self.ctx.now = now;
        self.ctx.settings = self.link.settings.get();

        let result = self.step();
        self.finish(result, sink)
    }

    fn step(&mut self) -> Result<()> {
        watchdog::service(&self.link.liveness, &mut self.ctx.hw);

        let temperature = self.ctx.sensors().temperature;
        let heater = self.ctx.hw.heater_power();
        let pump = self.ctx.hw.pump_power();
        self.thermal.check(self.ctx.now, temperature, heater, pump)?;

        if let Some(id) = self.link.take_scheduled_state() {
            return self.fsm.change_state_by_id(id, &mut self.ctx);
        }

        if self.fsm.check_transitions(&mut self.ctx)? {
            return Ok(());
        }

        if self.ctx.hw.is_power_just_pressed() {
            return self.fsm.change_state(StateId::Off, &mut self.ctx);
        }

        self.ctx.update_sensors()?;
        self.fsm.service_task(&mut self.ctx)?;
        self.ctx.update_control();
        Ok(())
    }

    /// Latch a fault if there is one, flush the outbox and publish status.
    fn finish(&mut self, result: Result<()>, sink: &mut impl MessageSink) -> Result<()> {
        if let Err(fault) = result {
            self.halt(fault);
        }
        for msg in self.ctx.drain_outbox() {
            if !sink.enqueue(msg) {
                warn!("message sink full, dropped {:?}", msg);
            }
        }
        self.link.publish_status(self.status());
        result
    }

    /// Hand the core over to the blocking fault signal once a fault is
    /// latched. Outputs stay off and the Power light repeats the blink code
    /// until the hardware is reset.
    ///
    /// Without a latched fault the controller is handed back untouched.
    pub fn park<D: DelayNs>(mut self, delay: &mut D) -> Self {
        let Some(fault) = self.fault() else {
            return self;
        };
        safety::emergency_stop(&mut self.ctx.hw);
        let hw = &mut self.ctx.hw;
        blink::signal_forever(fault, delay, |on| hw.set_light(Switch::Power, on))
    }

    fn halt(&mut self, fault: Fault) {
        if self.halted.is_some() {
            return;
        }
        error!("FATAL: {} (blink code {})", fault, fault.blink_count());
        safety::emergency_stop(&mut self.ctx.hw);
        self.fsm.abandon_task();
        self.halted = Some(FaultSignal::new(fault, self.ctx.now));
    }

    // ── Collaborator surface ──────────────────────────────────

    /// Re-seed filters and the heater PID from fresh readings.
    pub fn reset(&mut self) -> Result<()> {
        let result = self.ctx.reset().map(|_| ());
        if let Err(fault) = result {
            self.halt(fault);
        }
        result
    }

    /// Refresh sensors outside the normal iteration.
    pub fn update_sensors(&mut self) -> Result<()> {
        let result = self.ctx.update_sensors();
        if let Err(fault) = result {
            self.halt(fault);
        }
        result
    }

    pub fn sensors(&self) -> Sensors {
        self.ctx.sensors()
    }

    /// Wire id of the active state, -1 before [`start`](Self::start).
    pub fn state_id(&self) -> i8 {
        self.fsm.current_id()
    }

    pub fn state(&self) -> Option<StateId> {
        self.fsm.current_state()
    }

    pub fn fault(&self) -> Option<Fault> {
        self.halted.as_ref().map(FaultSignal::fault)
    }

    pub fn is_halted(&self) -> bool {
        self.halted.is_some()
    }

    pub fn status(&self) -> StatusSnapshot {
        StatusSnapshot {
            state_id: self.fsm.current_id(),
            sensors: self.ctx.sensors(),
            machine_start_ms: self.ctx.machine.machine_start_time.as_millis(),
            state_change_ms: self.ctx.machine.state_change_time.as_millis(),
            maintenance: self.ctx.maintenance,
            fault: self.fault(),
        }
    }

    pub fn fsm(&self) -> &Fsm<H> {
        &self.fsm
    }

    pub fn context(&self) -> &FsmContext<H> {
        &self.ctx
    }

    pub fn hw(&self) -> &H {
        &self.ctx.hw
    }

    pub fn hw_mut(&mut self) -> &mut H {
        &mut self.ctx.hw
    }
}
