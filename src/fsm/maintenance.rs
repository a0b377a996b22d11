//! Maintenance programs: backflush and descale.
//!
//! Both are scripted sequences with no transition check of their own; they
//! end by returning to Standby, or earlier through a scheduled state change
//! or the power switch. Progress (stage, cycle) is published after every
//! step. Stages count from 0, cycles from 1. Entering a program records
//! the starting position; its first step announces it.
//!
//! ```text
//! BACKFLUSH  stage 0: 5 × [pressurize → release]
//!            wait for brew switch toggle
//!            stage 1: 5 × [pressurize → release]           → STANDBY
//!
//! DESCALE    stage 0: 7 × [pump 10 s (unless bypass) → soak]
//!            stage 1: 8 × [wait for refill toggle → rinse 20 s] → STANDBY
//! ```

use core::time::Duration;

use log::info;

use super::context::{FsmContext, MaintenanceProgress};
use super::task::{Condition, Step, Task};
use super::StateId;
use crate::app::ports::{Hardware, Switch};
use crate::error::Result;
use crate::time::Instant;

pub(super) fn backflush_task() -> Task {
    Task::Backflush(BackflushTask::new())
}

pub(super) fn descale_task() -> Task {
    Task::Descale(DescaleTask::new())
}

const FIRST_STEP: MaintenanceProgress = MaintenanceProgress { stage: 0, cycle: 1 };

/// Condition satisfied once the operator flips `switch` from its current
/// position.
fn toggle_of<H: Hardware>(ctx: &mut FsmContext<H>, switch: Switch) -> Condition {
    let level = ctx.hw.get_switch(switch);
    Condition::SwitchIs(switch, !level)
}

// ═══════════════════════════════════════════════════════════════════════════
//  BACKFLUSH
// ═══════════════════════════════════════════════════════════════════════════

pub const BACKFLUSH_STAGES: u8 = 2;
pub const BACKFLUSH_CYCLES: u8 = 5;
/// Pressure is sampled this often while pressurizing.
const RISE_CHECK_INTERVAL: Duration = Duration::from_millis(500);
/// Less rise than this per check means the group is at pressure (bar).
const MIN_RISE_BAR: f32 = 0.05;
const MAX_PRESSURIZE: Duration = Duration::from_secs(10);
const RELEASE: Duration = Duration::from_secs(5);

pub(super) fn backflush_enter<H: Hardware>(ctx: &mut FsmContext<H>) -> Result<()> {
    ctx.maintenance = Some(FIRST_STEP);
    Ok(())
}

pub(super) fn backflush_exit<H: Hardware>(ctx: &mut FsmContext<H>) -> Result<()> {
    ctx.set_pump_enabled(false);
    ctx.hw.set_solenoid(false);
    ctx.set_light_blink(Duration::ZERO);
    ctx.maintenance = None;
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BackflushStep {
    Begin,
    Pressurize,
    Release,
    AwaitToggle,
}

/// Pressurize/release cycles against a blind basket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackflushTask {
    step: BackflushStep,
    stage: u8,
    cycle: u8,
    started: Instant,
    last_pressure: f32,
}

impl BackflushTask {
    pub const fn new() -> Self {
        Self {
            step: BackflushStep::Begin,
            stage: 0,
            cycle: 1,
            started: Instant::ZERO,
            last_pressure: 0.0,
        }
    }

    pub(super) fn resume<H: Hardware>(&mut self, ctx: &mut FsmContext<H>) -> Result<Step> {
        loop {
            match self.step {
                BackflushStep::Begin => {
                    ctx.publish_maintenance(self.stage, self.cycle);
                    ctx.hw.set_pump(1.0);
                    ctx.hw.set_solenoid(true);
                    self.started = ctx.now;
                    self.last_pressure = ctx.sensors().pressure;
                    self.step = BackflushStep::Pressurize;
                    return Ok(Step::until(ctx.now + RISE_CHECK_INTERVAL));
                }
                BackflushStep::Pressurize => {
                    let pressure = ctx.sensors().pressure;
                    let stalled = pressure - self.last_pressure < MIN_RISE_BAR;
                    let timed_out = ctx.now.saturating_duration_since(self.started) >= MAX_PRESSURIZE;
                    if !stalled && !timed_out {
                        self.last_pressure = pressure;
                        return Ok(Step::until(ctx.now + RISE_CHECK_INTERVAL));
                    }
                    ctx.hw.set_pump(0.0);
                    ctx.hw.set_solenoid(false);
                    ctx.publish_maintenance(self.stage, self.cycle);
                    self.step = BackflushStep::Release;
                    return Ok(Step::until(ctx.now + RELEASE));
                }
                BackflushStep::Release => {
                    if self.cycle < BACKFLUSH_CYCLES {
                        self.cycle += 1;
                        self.step = BackflushStep::Begin;
                        continue;
                    }
                    if self.stage + 1 < BACKFLUSH_STAGES {
                        self.stage += 1;
                        self.cycle = 1;
                        ctx.publish_maintenance(self.stage, self.cycle);
                        info!("BACKFLUSH: stage done, waiting for brew switch");
                        self.step = BackflushStep::AwaitToggle;
                        return Ok(Step::when(toggle_of(ctx, Switch::Brew)));
                    }
                    info!("BACKFLUSH: complete");
                    return Ok(Step::Goto(StateId::Standby));
                }
                BackflushStep::AwaitToggle => {
                    self.step = BackflushStep::Begin;
                }
            }
        }
    }
}

impl Default for BackflushTask {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  DESCALE
// ═══════════════════════════════════════════════════════════════════════════

pub const DESCALE_CLEAN_CYCLES: u8 = 7;
pub const DESCALE_RINSE_CYCLES: u8 = 8;
const CLEAN_PUMP: Duration = Duration::from_secs(10);
const FIRST_SOAK: Duration = Duration::from_secs(300);
const SOAK: Duration = Duration::from_secs(60);
const RINSE_PUMP: Duration = Duration::from_secs(20);
const DESCALE_BLINK: Duration = Duration::from_millis(1_000);

pub(super) fn descale_enter<H: Hardware>(ctx: &mut FsmContext<H>) -> Result<()> {
    ctx.set_boiler_enabled(false);
    ctx.set_light_blink(DESCALE_BLINK);
    ctx.hw.set_solenoid(false);
    ctx.maintenance = Some(FIRST_STEP);
    Ok(())
}

pub(super) fn descale_exit<H: Hardware>(ctx: &mut FsmContext<H>) -> Result<()> {
    ctx.hw.set_pump(0.0);
    ctx.set_light_blink(Duration::ZERO);
    ctx.hw.set_solenoid(false);
    ctx.maintenance = None;
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DescaleStep {
    Begin,
    Pumping,
    Soaking,
    AwaitRefill,
    Rinsing,
}

/// Descaling solution cycles followed by fresh-water rinses.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DescaleTask {
    step: DescaleStep,
    stage: u8,
    cycle: u8,
}

impl DescaleTask {
    pub const fn new() -> Self {
        Self {
            step: DescaleStep::Begin,
            stage: 0,
            cycle: 1,
        }
    }

    fn soak(&self) -> Duration {
        if self.cycle == 1 { FIRST_SOAK } else { SOAK }
    }

    pub(super) fn resume<H: Hardware>(&mut self, ctx: &mut FsmContext<H>) -> Result<Step> {
        loop {
            match self.step {
                DescaleStep::Begin => {
                    ctx.publish_maintenance(self.stage, self.cycle);
                    if ctx.hw.get_switch(Switch::Steam) {
                        info!("DESCALE: bypass held, skipping pump for cycle {}", self.cycle);
                        self.step = DescaleStep::Soaking;
                        return Ok(Step::until(ctx.now + self.soak()));
                    }
                    ctx.hw.set_pump(1.0);
                    ctx.hw.set_solenoid(true);
                    self.step = DescaleStep::Pumping;
                    return Ok(Step::until(ctx.now + CLEAN_PUMP));
                }
                DescaleStep::Pumping => {
                    ctx.hw.set_pump(0.0);
                    ctx.hw.set_solenoid(false);
                    ctx.publish_maintenance(self.stage, self.cycle);
                    self.step = DescaleStep::Soaking;
                    return Ok(Step::until(ctx.now + self.soak()));
                }
                DescaleStep::Soaking => {
                    if self.cycle < DESCALE_CLEAN_CYCLES {
                        self.cycle += 1;
                        self.step = DescaleStep::Begin;
                        continue;
                    }
                    self.stage = 1;
                    self.cycle = 1;
                    ctx.publish_maintenance(self.stage, self.cycle);
                    info!("DESCALE: cleaning done, refill tank and toggle brew switch");
                    self.step = DescaleStep::AwaitRefill;
                    return Ok(Step::when(toggle_of(ctx, Switch::Brew)));
                }
                DescaleStep::AwaitRefill => {
                    ctx.hw.set_pump(1.0);
                    ctx.hw.set_solenoid(self.cycle % 2 == 1);
                    ctx.publish_maintenance(self.stage, self.cycle);
                    self.step = DescaleStep::Rinsing;
                    return Ok(Step::until(ctx.now + RINSE_PUMP));
                }
                DescaleStep::Rinsing => {
                    ctx.hw.set_pump(0.0);
                    ctx.hw.set_solenoid(false);
                    if self.cycle < DESCALE_RINSE_CYCLES {
                        self.cycle += 1;
                        ctx.publish_maintenance(self.stage, self.cycle);
                        self.step = DescaleStep::AwaitRefill;
                        return Ok(Step::when(toggle_of(ctx, Switch::Brew)));
                    }
                    info!("DESCALE: complete");
                    return Ok(Step::Goto(StateId::Standby));
                }
            }
        }
    }
}

impl Default for DescaleTask {
    fn default() -> Self {
        Self::new()
    }
}
