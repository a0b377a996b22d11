//! Backflush and descale programs, driven through the services commands.

use std::time::Duration;

use gaggico::app::commands::{Command, MaintenanceRequest};
use gaggico::app::ports::{ActuatorPort, Switch};
use gaggico::fsm::StateId;
use gaggico::fsm::context::MaintenanceProgress;
use gaggico::fsm::maintenance::{BACKFLUSH_CYCLES, DESCALE_CLEAN_CYCLES, DESCALE_RINSE_CYCLES};

use crate::rig::Rig;

fn progress(rig: &Rig) -> Option<MaintenanceProgress> {
    rig.ctl.context().maintenance
}

fn at(stage: u8, cycle: u8) -> Option<MaintenanceProgress> {
    Some(MaintenanceProgress { stage, cycle })
}

fn toggle_brew(rig: &mut Rig) {
    let on = rig.hw().switch_position(Switch::Brew);
    rig.set_switch(Switch::Brew, !on);
}

#[test]
fn backflush_runs_two_stages_and_returns_to_standby() {
    let mut rig = Rig::warm(94.0);
    rig.power_on();
    rig.command(Command::Maintenance(MaintenanceRequest::Backflush)).unwrap();
    rig.iterate().unwrap();
    assert_eq!(rig.state(), Some(StateId::Backflush));
    assert_eq!(progress(&rig), at(0, 1));

    // Stage 0, then the pause for the operator.
    assert!(rig.run_until(Duration::from_secs(120), |r| progress(r) == at(1, 1)));
    rig.run(Duration::from_secs(5)).unwrap();
    assert_eq!(rig.state(), Some(StateId::Backflush));
    assert_eq!(rig.hw().pump_value(), 0);
    assert!(!rig.hw().solenoid_open());

    toggle_brew(&mut rig);
    assert_eq!(rig.hw().pump_value(), 100);
    toggle_brew(&mut rig);

    assert!(rig.run_until(Duration::from_secs(120), |r| r.state() == Some(StateId::Standby)));
    assert_eq!(progress(&rig), None);
    assert_eq!(rig.hw().pump_value(), 0);

    let cycles: Vec<_> = rig.sink.maintenance();
    for stage in 0..2 {
        for cycle in 1..=BACKFLUSH_CYCLES {
            assert!(cycles.contains(&(stage, cycle)), "missing {stage}/{cycle}");
        }
    }
    assert!(!cycles.contains(&(2, 1)));
}

#[test]
fn programs_announce_their_first_step_once() {
    for request in [MaintenanceRequest::Backflush, MaintenanceRequest::Descale] {
        let mut rig = Rig::warm(94.0);
        rig.power_on();
        rig.command(Command::Maintenance(request)).unwrap();
        rig.iterate().unwrap();
        assert_eq!(progress(&rig), at(0, 1));
        assert!(rig.sink.maintenance().is_empty());

        rig.run(Duration::from_millis(100)).unwrap();
        assert_eq!(rig.sink.maintenance(), vec![(0, 1)], "{request:?}");
    }
}

#[test]
fn backflush_pressurize_ends_when_pressure_plateaus() {
    let mut rig = Rig::warm(94.0);
    rig.power_on();
    rig.command(Command::Maintenance(MaintenanceRequest::Backflush)).unwrap();
    rig.iterate().unwrap();
    rig.iterate().unwrap();
    assert_eq!(rig.hw().pump_value(), 100);

    assert!(rig.run_until(Duration::from_secs(11), |r| r.hw().pump_value() == 0));
    assert!(rig.hw().pressure() > 10.0);
    assert!(!rig.hw().solenoid_open());

    // Release, then the next cycle starts.
    rig.run(Duration::from_secs(4)).unwrap();
    assert_eq!(rig.hw().pump_value(), 0);
    assert!(rig.run_until(Duration::from_secs(2), |r| r.hw().pump_value() == 100));
    assert_eq!(progress(&rig), at(0, 2));
}

#[test]
fn descale_cleans_soaks_and_rinses() {
    let mut rig = Rig::warm(94.0);
    rig.period = Duration::from_millis(5);
    rig.power_on();
    rig.command(Command::Maintenance(MaintenanceRequest::Descale)).unwrap();
    rig.iterate().unwrap();
    assert_eq!(rig.state(), Some(StateId::Descale));
    assert!(!rig.ctl.context().control.boiler_enabled());

    // First cleaning pulse, then the long soak.
    rig.run(Duration::from_secs(5)).unwrap();
    assert_eq!(rig.hw().pump_value(), 100);
    assert!(rig.hw().solenoid_open());
    rig.run(Duration::from_secs(10)).unwrap();
    assert_eq!(rig.hw().pump_value(), 0);
    assert_eq!(progress(&rig), at(0, 1));
    rig.run(Duration::from_secs(280)).unwrap();
    assert_eq!(progress(&rig), at(0, 1));

    assert!(rig.run_until(Duration::from_secs(600), |r| progress(r) == at(1, 1)));
    assert_eq!(rig.hw().heater_power(), 0.0);
    for cycle in 1..=DESCALE_CLEAN_CYCLES {
        assert!(rig.sink.maintenance().contains(&(0, cycle)));
    }

    for cycle in 1..=DESCALE_RINSE_CYCLES {
        rig.run(Duration::from_secs(1)).unwrap();
        assert_eq!(rig.hw().pump_value(), 0, "rinse {cycle} started without refill");
        toggle_brew(&mut rig);
        assert_eq!(rig.hw().pump_value(), 100);
        assert_eq!(rig.hw().solenoid_open(), cycle % 2 == 1);
        assert_eq!(progress(&rig), at(1, cycle));
        rig.run(Duration::from_secs(21)).unwrap();
    }

    assert!(rig.run_until(Duration::from_secs(1), |r| r.state() == Some(StateId::Standby)));
    assert_eq!(progress(&rig), None);
    assert!(rig.ctl.context().control.boiler_enabled());
}

#[test]
fn descale_bypass_skips_the_pump() {
    let mut rig = Rig::warm(94.0);
    rig.period = Duration::from_millis(5);
    rig.power_on();
    rig.command(Command::Maintenance(MaintenanceRequest::Descale)).unwrap();
    rig.iterate().unwrap();
    rig.run(Duration::from_secs(15)).unwrap();
    assert_eq!(rig.hw().pump_value(), 0);

    // Operator holds the bypass through the next cycle.
    rig.set_switch(Switch::Steam, true);
    assert_eq!(rig.state(), Some(StateId::Descale));
    assert!(rig.run_until(Duration::from_secs(400), |r| progress(r) == at(0, 2)));
    rig.run(Duration::from_secs(3)).unwrap();
    assert_eq!(rig.hw().pump_value(), 0);
    assert!(!rig.hw().solenoid_open());

    rig.set_switch(Switch::Steam, false);
    rig.command(Command::Maintenance(MaintenanceRequest::Stop)).unwrap();
    rig.iterate().unwrap();
    assert_eq!(rig.state(), Some(StateId::Standby));
    assert_eq!(progress(&rig), None);
    assert!(!rig.ctl.context().control.is_blinking());
}

#[test]
fn maintenance_is_refused_outside_standby() {
    let mut rig = Rig::warm(94.0);
    rig.power_on();
    rig.set_switch(Switch::Brew, true);
    assert_eq!(rig.state(), Some(StateId::Brew));
    rig.command(Command::Maintenance(MaintenanceRequest::Backflush)).unwrap();
    rig.run(Duration::from_millis(10)).unwrap();
    assert_eq!(rig.state(), Some(StateId::Brew));
}
