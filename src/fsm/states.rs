//! Concrete state handlers, tasks and the table builder.
//!
//! Each state is a row of plain `fn` pointers plus an optional task. The
//! table holds no closures and needs no heap.
//!
//! ```text
//!   OFF ──[power pressed]──▶ STANDBY ──[brew on]──▶ BREW
//!    ▲                        │  ▲  ▲                 │
//!    │                        │  │  └──[brew off]─────┘
//!    │               [steam on] [steam off]
//!    │                        ▼  │
//!    │                        STEAM
//!    │
//!    └──[power pressed, any state]
//!
//!  STANDBY ◀──[program done / stop]── BACKFLUSH, DESCALE
//! ```
//!
//! Backflush and Descale live in [`super::maintenance`].

use core::time::Duration;

use log::{debug, info};

use super::context::{COLD_START_BELOW_C, FsmContext};
use super::maintenance;
use super::task::{Condition, Step, Task};
use super::{StateDescriptor, StateId, Transition};
use crate::app::ports::{Hardware, Switch};
use crate::error::Result;
use crate::time::Instant;

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the static state table.  Called once at startup.
pub fn build_state_table<H: Hardware>() -> [StateDescriptor<H>; StateId::COUNT] {
    [
        // Index 0: Off
        StateDescriptor {
            id: StateId::Off,
            name: "Off",
            on_enter: Some(off_enter::<H>),
            on_exit: Some(off_exit::<H>),
            check: Some(off_check::<H>),
            task: None,
        },
        // Index 1: Standby
        StateDescriptor {
            id: StateId::Standby,
            name: "Standby",
            on_enter: Some(standby_enter::<H>),
            on_exit: Some(standby_exit::<H>),
            check: Some(standby_check::<H>),
            task: Some(prefill_task),
        },
        // Index 2: Brew
        StateDescriptor {
            id: StateId::Brew,
            name: "Brew",
            on_enter: Some(brew_enter::<H>),
            on_exit: Some(brew_exit::<H>),
            check: Some(brew_check::<H>),
            task: Some(brew_task),
        },
        // Index 3: Steam
        StateDescriptor {
            id: StateId::Steam,
            name: "Steam",
            on_enter: Some(steam_enter::<H>),
            on_exit: Some(steam_exit::<H>),
            check: Some(steam_check::<H>),
            task: Some(steam_task),
        },
        // Index 4: Backflush
        StateDescriptor {
            id: StateId::Backflush,
            name: "Backflush",
            on_enter: Some(maintenance::backflush_enter::<H>),
            on_exit: Some(maintenance::backflush_exit::<H>),
            check: None,
            task: Some(maintenance::backflush_task),
        },
        // Index 5: Descale
        StateDescriptor {
            id: StateId::Descale,
            name: "Descale",
            on_enter: Some(maintenance::descale_enter::<H>),
            on_exit: Some(maintenance::descale_exit::<H>),
            check: None,
            task: Some(maintenance::descale_task),
        },
    ]
}

fn prefill_task() -> Task {
    Task::Prefill(PrefillTask::new())
}

fn brew_task() -> Task {
    Task::Brew(BrewTask::new())
}

fn steam_task() -> Task {
    Task::Steam(SteamTask::new())
}

// ═══════════════════════════════════════════════════════════════════════════
//  OFF state
// ═══════════════════════════════════════════════════════════════════════════

fn off_enter<H: Hardware>(ctx: &mut FsmContext<H>) -> Result<()> {
    ctx.set_pump_enabled(false);
    ctx.set_boiler_enabled(false);
    ctx.hw.set_solenoid(false);
    for light in Switch::ALL {
        ctx.hw.set_light(light, false);
    }
    Ok(())
}

fn off_exit<H: Hardware>(ctx: &mut FsmContext<H>) -> Result<()> {
    ctx.machine.machine_start_time = ctx.now;
    let temperature = ctx.reset()?;
    ctx.machine.cold_start = temperature < COLD_START_BELOW_C;
    ctx.hw.set_light(Switch::Power, true);
    info!(
        "OFF: power on at {:.1} °C ({} start)",
        temperature,
        if ctx.machine.cold_start { "cold" } else { "warm" }
    );
    Ok(())
}

fn off_check<H: Hardware>(ctx: &mut FsmContext<H>) -> Result<Transition> {
    if ctx.hw.is_power_just_pressed() {
        return Ok(Transition::Goto(StateId::Standby));
    }
    Ok(Transition::Handled)
}

// ═══════════════════════════════════════════════════════════════════════════
//  STANDBY state
// ═══════════════════════════════════════════════════════════════════════════

/// Pre-fill only runs this soon after entering Standby.
const PREFILL_START_WINDOW: Duration = Duration::from_millis(100);
const PREFILL_PUMP_POWER: f32 = 0.5;
const PREFILL_SETTLE: Duration = Duration::from_millis(200);
const PREFILL_POLL: Duration = Duration::from_millis(10);
const PREFILL_DONE_BAR: f32 = 1.20;
const PREFILL_TIMEOUT: Duration = Duration::from_secs(12);

fn standby_enter<H: Hardware>(ctx: &mut FsmContext<H>) -> Result<()> {
    let s = ctx.settings;
    ctx.control.set_pid_params(s.kp, s.ki, s.kd);
    ctx.set_boiler_enabled(true);
    ctx.control.set_target_temperature(s.brew_temp);
    Ok(())
}

fn standby_exit<H: Hardware>(ctx: &mut FsmContext<H>) -> Result<()> {
    ctx.hw.set_pump(0.0);
    ctx.hw.set_solenoid(false);
    ctx.set_light_blink(Duration::ZERO);
    Ok(())
}

fn standby_check<H: Hardware>(ctx: &mut FsmContext<H>) -> Result<Transition> {
    if ctx.hw.get_switch(Switch::Steam) {
        return Ok(Transition::Goto(StateId::Steam));
    }
    if ctx.hw.get_switch(Switch::Brew) {
        return Ok(Transition::Goto(StateId::Brew));
    }
    Ok(Transition::Stay)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PrefillStep {
    Start,
    Filling,
}

/// Fills the boiler after a cold start until the group sees pressure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrefillTask {
    step: PrefillStep,
    started: Instant,
}

impl PrefillTask {
    pub const fn new() -> Self {
        Self {
            step: PrefillStep::Start,
            started: Instant::ZERO,
        }
    }

    pub(super) fn resume<H: Hardware>(&mut self, ctx: &mut FsmContext<H>) -> Result<Step> {
        match self.step {
            PrefillStep::Start => {
                let since_entry = ctx.now.saturating_duration_since(ctx.machine.state_change_time);
                if !ctx.machine.cold_start || since_entry >= PREFILL_START_WINDOW {
                    return Ok(Step::Done);
                }
                info!("STANDBY: cold start, pre-filling");
                ctx.hw.set_pump(PREFILL_PUMP_POWER);
                ctx.hw.set_solenoid(true);
                self.started = ctx.now;
                self.step = PrefillStep::Filling;
                Ok(Step::until(ctx.now + PREFILL_SETTLE))
            }
            PrefillStep::Filling => {
                let pressure = ctx.sensors().pressure;
                let elapsed = ctx.now.saturating_duration_since(self.started);
                if pressure > PREFILL_DONE_BAR || elapsed >= PREFILL_TIMEOUT {
                    ctx.hw.set_pump(0.0);
                    ctx.hw.set_solenoid(false);
                    info!(
                        "STANDBY: pre-fill done after {} ms at {:.2} bar",
                        elapsed.as_millis(),
                        pressure
                    );
                    return Ok(Step::Done);
                }
                Ok(Step::until(ctx.now + PREFILL_POLL))
            }
        }
    }
}

impl Default for PrefillTask {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  BREW state
// ═══════════════════════════════════════════════════════════════════════════

/// Latest point before the end of preinfusion at which the tare starts.
const TARE_LEAD: Duration = Duration::from_millis(1_000);
/// Readings this close to zero are treated as drift and re-tared (g).
const DRIFT_TARE_BELOW_G: f32 = 0.5;
const SHOT_DONE_BLINK: Duration = Duration::from_millis(500);

fn brew_enter<H: Hardware>(ctx: &mut FsmContext<H>) -> Result<()> {
    ctx.machine.brew_start_time = ctx.now;
    ctx.hw.set_solenoid(true);
    ctx.set_pump_enabled(true);
    Ok(())
}

fn brew_exit<H: Hardware>(ctx: &mut FsmContext<H>) -> Result<()> {
    ctx.set_pump_enabled(false);
    ctx.hw.set_solenoid(false);
    ctx.set_light_blink(Duration::ZERO);
    Ok(())
}

fn brew_check<H: Hardware>(ctx: &mut FsmContext<H>) -> Result<Transition> {
    if !ctx.hw.get_switch(Switch::Brew) {
        return Ok(Transition::Goto(StateId::Standby));
    }
    // Judge the latest sample: the tare zeroes against it, not the one the
    // sensor snapshot was taken from.
    if ctx.hw.is_scale_connected()
        && !ctx.hw.is_scale_taring()
        && ctx.hw.read_weight().abs() < DRIFT_TARE_BELOW_G
    {
        ctx.hw.scale_tare_immediately();
    }
    Ok(Transition::Stay)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BrewStep {
    Start,
    Tare,
    Preinfusion,
    AwaitWeight,
}

/// Pressure profile and stop-on-weight for one shot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BrewTask {
    step: BrewStep,
    preinfusion_end: Instant,
}

impl BrewTask {
    pub const fn new() -> Self {
        Self {
            step: BrewStep::Start,
            preinfusion_end: Instant::ZERO,
        }
    }

    pub(super) fn resume<H: Hardware>(&mut self, ctx: &mut FsmContext<H>) -> Result<Step> {
        let s = ctx.settings;
        match self.step {
            BrewStep::Start => {
                ctx.control.set_target_pressure(s.preinfusion_pressure);
                let preinfusion = Duration::from_secs_f32(s.preinfusion_time.max(0.0));
                let start = ctx.machine.brew_start_time;
                self.preinfusion_end = start + preinfusion;

                if ctx.hw.is_scale_connected() {
                    let tare_at = (self.preinfusion_end - preinfusion.min(TARE_LEAD)).max(start);
                    self.step = BrewStep::Tare;
                    return Ok(Step::until(tare_at));
                }
                self.step = BrewStep::Preinfusion;
                Ok(Step::until(self.preinfusion_end))
            }
            BrewStep::Tare => {
                debug!("BREW: taring scale");
                ctx.hw.scale_start_tare();
                self.step = BrewStep::Preinfusion;
                Ok(Step::until(self.preinfusion_end))
            }
            BrewStep::Preinfusion => {
                ctx.control.set_target_pressure(s.brew_pressure);
                if ctx.hw.is_scale_connected() && s.brew_weight > 0.0 {
                    self.step = BrewStep::AwaitWeight;
                    return Ok(Step::when(Condition::WeightAtLeast(s.brew_weight)));
                }
                Ok(Step::Done)
            }
            BrewStep::AwaitWeight => {
                info!("BREW: target weight {:.1} g reached", s.brew_weight);
                ctx.hw.set_solenoid(false);
                ctx.set_pump_enabled(false);
                ctx.set_light_blink(SHOT_DONE_BLINK);
                Ok(Step::Done)
            }
        }
    }
}

impl Default for BrewTask {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  STEAM state
// ═══════════════════════════════════════════════════════════════════════════

/// Pressure drop below the running peak that means the wand was opened (bar).
const VALVE_OPEN_DROP_BAR: f32 = 0.3;
/// Pressure rise above the running trough that means it was closed (bar).
const VALVE_CLOSED_RISE_BAR: f32 = 0.1;
/// Pump trickle that keeps the boiler topped up while steam is drawn.
const STEAM_REFILL_PUMP_POWER: f32 = 0.1;

fn steam_enter<H: Hardware>(ctx: &mut FsmContext<H>) -> Result<()> {
    ctx.control.set_target_temperature(ctx.settings.steam_temp);
    ctx.set_pump_enabled(false);
    ctx.set_boiler_enabled(false);
    Ok(())
}

fn steam_exit<H: Hardware>(ctx: &mut FsmContext<H>) -> Result<()> {
    ctx.hw.set_pump(0.0);
    ctx.hw.set_heater(0.0);
    ctx.hw.set_light(Switch::Steam, false);
    ctx.set_light_blink(Duration::ZERO);
    Ok(())
}

fn steam_check<H: Hardware>(ctx: &mut FsmContext<H>) -> Result<Transition> {
    if !ctx.hw.get_switch(Switch::Steam) {
        return Ok(Transition::Goto(StateId::Standby));
    }
    Ok(Transition::Stay)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SteamStep {
    Heating,
    Regulating,
}

/// Heats to steam temperature, then holds it while watching for the
/// steam valve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SteamTask {
    step: SteamStep,
    valve_open: bool,
    peak: f32,
    trough: f32,
}

impl SteamTask {
    pub const fn new() -> Self {
        Self {
            step: SteamStep::Heating,
            valve_open: false,
            peak: 0.0,
            trough: 0.0,
        }
    }

    pub fn valve_open(&self) -> bool {
        self.valve_open
    }

    pub(super) fn resume<H: Hardware>(&mut self, ctx: &mut FsmContext<H>) -> Result<Step> {
        let sensors = ctx.sensors();
        let target = ctx.settings.steam_temp;
        match self.step {
            SteamStep::Heating => {
                if sensors.temperature < target {
                    ctx.hw.set_heater(1.0);
                    return Ok(Step::next_cycle());
                }
                info!("STEAM: at temperature ({:.1} °C)", sensors.temperature);
                self.step = SteamStep::Regulating;
                self.peak = sensors.pressure;
                self.trough = sensors.pressure;
                Ok(Step::next_cycle())
            }
            SteamStep::Regulating => {
                ctx.hw
                    .set_heater(if sensors.temperature < target { 1.0 } else { 0.0 });
                self.track_valve(ctx, sensors.pressure);
                Ok(Step::next_cycle())
            }
        }
    }

    fn track_valve<H: Hardware>(&mut self, ctx: &mut FsmContext<H>, pressure: f32) {
        if self.valve_open {
            self.trough = self.trough.min(pressure);
            if pressure > self.trough + VALVE_CLOSED_RISE_BAR {
                debug!("STEAM: valve closed");
                self.valve_open = false;
                self.peak = pressure;
                ctx.hw.set_pump(0.0);
                ctx.hw.set_light(Switch::Steam, false);
            }
        } else {
            self.peak = self.peak.max(pressure);
            if pressure < self.peak - VALVE_OPEN_DROP_BAR {
                debug!("STEAM: valve opened");
                self.valve_open = true;
                self.trough = pressure;
                ctx.hw.set_pump(STEAM_REFILL_PUMP_POWER);
                ctx.hw.set_light(Switch::Steam, true);
            }
        }
    }
}

impl Default for SteamTask {
    fn default() -> Self {
        Self::new()
    }
}
