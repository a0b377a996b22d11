//! Fault halt, thermal runaway and watchdog liveness.

use std::time::Duration;

use gaggico::app::ports::{ActuatorPort, Switch};
use gaggico::fsm::StateId;
use gaggico::{Fault, SensorError};

use crate::rig::Rig;

fn run_until_fault(rig: &mut Rig, limit: Duration) -> Option<Fault> {
    for _ in 0..limit.as_millis() / rig.period.as_millis() {
        if let Err(fault) = rig.iterate() {
            return Some(fault);
        }
    }
    None
}

#[test]
fn dead_heater_trips_thermal_runaway() {
    let mut rig = Rig::warm(60.0);
    rig.hw().set_heater_connected(false);
    rig.power_on();
    assert_eq!(rig.hw().heater_power(), 0.0);

    let start = rig.ctl.hw().now();
    let fault = run_until_fault(&mut rig, Duration::from_secs(30));
    assert_eq!(fault, Some(Fault::ThermalRunaway));
    let after = rig.ctl.hw().now().saturating_duration_since(start);
    assert!(after >= Duration::from_secs(10), "tripped after {} ms", after.as_millis());
    assert!(after < Duration::from_secs(12), "tripped after {} ms", after.as_millis());

    assert!(rig.ctl.is_halted());
    assert_eq!(rig.hw().heater_power(), 0.0);
    assert_eq!(rig.hw().pump_power(), 0.0);
    assert!(!rig.hw().solenoid_open());
    assert_eq!(rig.link.status().fault, Some(Fault::ThermalRunaway));
}

#[test]
fn halted_controller_blinks_the_fault_code() {
    let mut rig = Rig::warm(60.0);
    rig.hw().set_heater_connected(false);
    rig.power_on();
    let fault = run_until_fault(&mut rig, Duration::from_secs(30)).expect("fault");

    // 7 blinks of 500 ms on / 500 ms off, then a 2 s pause.
    let mut edges = 0;
    let mut lit = false;
    for _ in 0..8_990 {
        assert_eq!(rig.iterate(), Err(fault));
        let now_lit = rig.hw().light(Switch::Power);
        if now_lit && !lit {
            edges += 1;
        }
        lit = now_lit;
        assert_eq!(rig.hw().heater_power(), 0.0);
    }
    assert_eq!(edges, usize::from(fault.blink_count()));

    // Switches do nothing any more.
    rig.set_switch(Switch::Brew, true);
    assert_eq!(rig.state(), Some(StateId::Standby));
    assert!(!rig.hw().solenoid_open());
}

#[test]
fn heating_with_the_pump_running_never_trips() {
    let mut rig = Rig::warm(94.0);
    rig.hw().set_heater_connected(false);
    rig.power_on();
    rig.set_switch(Switch::Brew, true);
    assert_eq!(run_until_fault(&mut rig, Duration::from_secs(30)), None);
    assert_eq!(rig.state(), Some(StateId::Brew));
}

#[test]
fn implausible_pressure_halts() {
    let mut rig = Rig::warm(94.0);
    rig.power_on();
    rig.hw().inject_pressure_counts(Some(0));
    let fault = run_until_fault(&mut rig, Duration::from_millis(50));
    assert_eq!(fault, Some(Fault::Sensor(SensorError::PressureOutOfRange)));
    assert_eq!(rig.link.status().fault, fault);
}

#[test]
fn open_thermocouple_at_power_on_halts() {
    let mut rig = Rig::new();
    rig.hw().inject_thermocouple_open(true);
    rig.hw().press(Switch::Power);
    let fault = run_until_fault(&mut rig, Duration::from_millis(100));
    assert_eq!(fault, Some(Fault::Sensor(SensorError::ThermocoupleOpen)));
    assert!(rig.ctl.is_halted());
    assert_eq!(rig.hw().heater_power(), 0.0);
}

#[test]
fn watchdog_is_fed_only_while_both_cores_run() {
    let mut rig = Rig::warm(94.0);
    rig.power_on();
    let fed = rig.hw().feeds();
    rig.run(Duration::from_millis(100)).unwrap();
    assert!(rig.hw().feeds() - fed >= 99);

    rig.services_running = false;
    rig.run(Duration::from_millis(5)).unwrap();
    let stalled = rig.hw().feeds();
    rig.run(Duration::from_millis(500)).unwrap();
    assert_eq!(rig.hw().feeds(), stalled);

    rig.services_running = true;
    rig.run(Duration::from_millis(10)).unwrap();
    assert!(rig.hw().feeds() > stalled);
}

#[test]
fn disabled_watchdog_is_always_fed() {
    let mut rig = Rig::warm(94.0);
    rig.hw().set_watchdog_enabled(false);
    rig.services_running = false;
    rig.run(Duration::from_millis(50)).unwrap();
    assert_eq!(rig.hw().feeds(), 50);
}
