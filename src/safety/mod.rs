//! Safety supervisor.
//!
//! Two independent guards:
//!
//! - [`ThermalRunawayCheck`] runs every control-loop iteration. While the
//!   heater is driven hard with the pump idle, the boiler must gain
//!   [`REQUIRED_RISE_C`] within [`RISE_WINDOW`]; otherwise the temperature
//!   reading or the heater cannot be trusted and the machine halts.
//! - [`watchdog`] only feeds the hardware watchdog once both cores have
//!   reported activity, so a stall on either core ends in a hardware reset.
//!
//! A tripped check does not recover. The caller latches the [`Fault`],
//! calls [`emergency_stop`] and signals the fault code until power-cycled.

pub mod watchdog;

use core::time::Duration;

use log::{debug, error};

use crate::app::ports::ActuatorPort;
use crate::error::Fault;
use crate::time::Instant;

/// Heater power above which the check arms (fraction of full).
pub const ARM_HEATER_POWER: f32 = 0.9;
/// Pump power at or below which the pump counts as idle.
pub const IDLE_PUMP_POWER: f32 = 0.01;
/// Minimum rise expected within one window (°C).
pub const REQUIRED_RISE_C: f32 = 1.0;
pub const RISE_WINDOW: Duration = Duration::from_secs(10);

/// Heating-without-rise detector.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThermalRunawayCheck {
    deadline: Option<Instant>,
    goal: f32,
    tripped: bool,
}

impl ThermalRunawayCheck {
    pub const fn new() -> Self {
        Self {
            deadline: None,
            goal: 0.0,
            tripped: false,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn has_tripped(&self) -> bool {
        self.tripped
    }

    /// Evaluate one iteration.
    ///
    /// Returns the fault once, at the first iteration past the deadline
    /// with the goal unmet. Later calls report nothing further.
    pub fn check(
        &mut self,
        now: Instant,
        temperature: f32,
        heater_power: f32,
        pump_power: f32,
    ) -> Result<(), Fault> {
        if self.tripped {
            return Ok(());
        }

        let armed = heater_power > ARM_HEATER_POWER && pump_power <= IDLE_PUMP_POWER;
        if !armed {
            self.deadline = None;
            self.goal = 0.0;
            return Ok(());
        }

        let due = self.deadline.is_none_or(|deadline| now.reached(deadline));
        if due || temperature >= self.goal {
            if self.deadline.is_some() && temperature < self.goal {
                error!(
                    "thermal runaway: {:.2} °C short of goal {:.2} °C",
                    temperature, self.goal
                );
                self.tripped = true;
                self.deadline = None;
                return Err(Fault::ThermalRunaway);
            }
            self.goal = temperature + REQUIRED_RISE_C;
            self.deadline = Some(now + RISE_WINDOW);
            debug!("thermal check: expect {:.2} °C by {} ms", self.goal, (now + RISE_WINDOW).as_millis());
        }
        Ok(())
    }
}

/// Drive every actuator to its safe state.
pub fn emergency_stop(hw: &mut (impl ActuatorPort + ?Sized)) {
    hw.all_off();
}
