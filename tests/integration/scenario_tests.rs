//! End-to-end control scenarios: power-on, pre-fill, brew profile,
//! steam, scheduled transitions.

use std::time::Duration;

use gaggico::app::ports::{ActuatorPort, ScalePort, Switch};
use gaggico::config::Settings;
use gaggico::fsm::StateId;

use crate::rig::Rig;

#[test]
fn cold_start_runs_prefill_until_pressure() {
    let mut rig = Rig::warm(25.0);
    rig.power_on();
    assert!(rig.ctl.context().machine.cold_start);
    assert!(rig.hw().light(Switch::Power));

    rig.run(Duration::from_millis(5)).unwrap();
    assert!(rig.hw().solenoid_open());
    assert_eq!(rig.hw().pump_value(), 50);

    let done = rig.run_until(Duration::from_secs(2), |r| !r.hw().solenoid_open());
    assert!(done, "pre-fill did not finish early");
    assert_eq!(rig.hw().pump_value(), 0);
    assert!(rig.ctl.sensors().pressure > 1.20);
    assert!(rig.ctl.hw().now().as_millis() < 12_000);

    // Task is gone and stays gone.
    rig.run(Duration::from_millis(50)).unwrap();
    assert!(!rig.ctl.fsm().task().is_alive());
    assert_eq!(rig.hw().pump_value(), 0);
}

#[test]
fn prefill_waits_for_pressure_above_threshold() {
    let mut rig = Rig::warm(25.0);
    rig.hw().hold_pressure(Some(1.15));
    rig.power_on();
    rig.run(Duration::from_secs(3)).unwrap();
    assert!(rig.hw().solenoid_open());
    assert_eq!(rig.hw().pump_value(), 50);
    let p = rig.ctl.sensors().pressure;
    assert!(p > 1.1 && p < 1.20, "settled at {p}");

    rig.hw().hold_pressure(Some(1.25));
    assert!(rig.run_until(Duration::from_secs(1), |r| !r.hw().solenoid_open()));
    assert!(rig.ctl.sensors().pressure > 1.20);
    assert_eq!(rig.hw().pump_value(), 0);
}

#[test]
fn prefill_gives_up_after_twelve_seconds() {
    let mut rig = Rig::warm(25.0);
    rig.hw().hold_pressure(Some(1.15));
    rig.power_on();
    let start = rig.ctl.hw().now();

    rig.run(Duration::from_millis(11_800)).unwrap();
    assert!(rig.hw().solenoid_open(), "pre-fill stopped early");
    assert_eq!(rig.hw().pump_value(), 50);

    assert!(rig.run_until(Duration::from_millis(500), |r| !r.hw().solenoid_open()));
    let elapsed = rig.ctl.hw().now().saturating_duration_since(start);
    assert!(elapsed >= Duration::from_secs(12), "stopped after {elapsed:?}");
    assert!(elapsed < Duration::from_millis(12_100), "stopped after {elapsed:?}");
    assert_eq!(rig.hw().pump_value(), 0);
    assert_eq!(rig.state(), Some(StateId::Standby));
}

#[test]
fn warm_start_skips_prefill() {
    let mut rig = Rig::warm(85.0);
    rig.power_on();
    assert!(!rig.ctl.context().machine.cold_start);
    rig.run(Duration::from_millis(500)).unwrap();
    assert_eq!(rig.hw().pump_value(), 0);
    assert!(!rig.hw().solenoid_open());
}

#[test]
fn standby_heats_towards_brew_temperature() {
    let mut rig = Rig::warm(60.0);
    rig.power_on();
    rig.run(Duration::from_secs(20)).unwrap();
    assert!(rig.hw().temperature() > 80.0);
    assert!(!rig.hw().light(Switch::Brew));

    assert!(rig.run_until(Duration::from_secs(60), |r| r.hw().light(Switch::Brew)));
    let t = rig.ctl.sensors().temperature;
    assert!((t - 95.0).abs() < 1.0, "ready at {t}");
}

#[test]
fn brew_follows_preinfusion_then_brew_pressure() {
    let settings = Settings {
        preinfusion_time: 3.0,
        preinfusion_pressure: 2.0,
        brew_pressure: 9.0,
        ..Settings::default()
    };
    let mut rig = Rig::with_settings(settings);
    rig.hw().set_temperature(94.0);
    rig.power_on();

    rig.hw().press(Switch::Brew);
    assert!(rig.run_until(Duration::from_millis(100), |r| r.state() == Some(StateId::Brew)));
    let start = rig.ctl.context().machine.brew_start_time;
    assert!(rig.hw().solenoid_open());

    for _ in 0..8_000 {
        rig.iterate().unwrap();
        let now = rig.ctl.hw().now();
        let elapsed = now.saturating_duration_since(start);
        let target = rig.ctl.context().control.target_pressure();
        if elapsed < Duration::from_secs(3) {
            assert_eq!(target, 2.0, "at {} ms", elapsed.as_millis());
        } else {
            assert_eq!(target, 9.0, "at {} ms", elapsed.as_millis());
        }
    }
    assert!(rig.ctl.sensors().pressure > 5.0);
    assert!(rig.ctl.sensors().flow > 0.0);

    // No scale: the shot never ends on its own.
    rig.run(Duration::from_secs(20)).unwrap();
    assert_eq!(rig.state(), Some(StateId::Brew));
    assert!(rig.hw().solenoid_open());
    assert!(rig.ctl.sensors().weight.is_nan());

    rig.hw().release(Switch::Brew);
    assert!(rig.run_until(Duration::from_millis(100), |r| r.state() == Some(StateId::Standby)));
    assert!(!rig.hw().solenoid_open());
    assert_eq!(rig.hw().pump_value(), 0);
}

#[test]
fn brew_stops_on_target_weight() {
    let settings = Settings {
        preinfusion_time: 2.0,
        brew_weight: 30.0,
        ..Settings::default()
    };
    let mut rig = Rig::with_settings(settings);
    rig.hw().set_temperature(94.0);
    rig.hw().attach_scale();
    rig.power_on();
    rig.run(Duration::from_secs(1)).unwrap();

    rig.hw().press(Switch::Brew);
    let stopped = rig.run_until(Duration::from_secs(60), |r| {
        r.state() == Some(StateId::Brew) && !r.hw().solenoid_open() && r.ctl.fsm().task().is_finished()
    });
    assert!(stopped, "shot did not stop on weight");
    assert!(rig.ctl.sensors().weight >= 30.0);
    assert!(rig.hw().cup_grams() >= 29.0);
    assert_eq!(rig.hw().pump_value(), 0);
    assert!(rig.ctl.context().control.is_blinking());

    // Nothing more reaches the cup.
    let cup = rig.hw().cup_grams();
    rig.run(Duration::from_secs(2)).unwrap();
    assert!(rig.hw().cup_grams() - cup < 0.5);
    assert_eq!(rig.state(), Some(StateId::Brew));
}

/// Pin the cup load for `duration`, overriding the model's fill.
fn hold_cup(rig: &mut Rig, grams: f32, duration: Duration) {
    rig.run_until(duration, |r| {
        r.hw().set_cup_grams(grams);
        false
    });
}

#[test]
fn brew_retares_small_drift() {
    let mut rig = Rig::new();
    rig.hw().set_temperature(94.0);
    rig.hw().attach_scale();
    rig.power_on();
    rig.run(Duration::from_secs(1)).unwrap();

    rig.hw().press(Switch::Brew);
    rig.run(Duration::from_secs(2)).unwrap();
    assert_eq!(rig.state(), Some(StateId::Brew));

    let cup = rig.hw().cup_grams();
    hold_cup(&mut rig, cup, Duration::from_millis(300));
    rig.hw().scale_start_tare();
    hold_cup(&mut rig, cup, Duration::from_secs(1));
    assert!(!rig.hw().is_scale_taring());
    let w = rig.ctl.sensors().weight;
    assert!(w.abs() < 0.02, "after tare {w}");

    // A bump worth a fraction of a gram is zeroed out.
    hold_cup(&mut rig, cup + 0.3, Duration::from_millis(500));
    let w = rig.ctl.sensors().weight;
    assert!(w.abs() < 0.02, "drift left at {w}");

    // Real load is kept, relative to the new zero.
    hold_cup(&mut rig, cup + 5.0, Duration::from_millis(500));
    let w = rig.ctl.sensors().weight;
    assert!((w - 4.7).abs() < 0.05, "load read as {w}");
}

#[test]
fn steam_heats_and_tracks_the_valve() {
    let mut rig = Rig::warm(94.0);
    rig.power_on();
    rig.hw().hold_pressure(Some(1.5));
    rig.set_switch(Switch::Steam, true);
    assert_eq!(rig.state(), Some(StateId::Steam));
    assert_eq!(rig.ctl.context().control.target_temperature(), 150.0);

    assert!(rig.run_until(Duration::from_secs(60), |r| r.ctl.sensors().temperature >= 150.0));
    rig.run(Duration::from_millis(500)).unwrap();
    assert!(!rig.hw().light(Switch::Steam));

    // Opening the wand drops the boiler pressure.
    rig.hw().hold_pressure(Some(0.8));
    rig.run(Duration::from_millis(300)).unwrap();
    assert!(rig.hw().light(Switch::Steam));
    assert_eq!(rig.hw().pump_value(), 10);

    rig.hw().hold_pressure(Some(1.2));
    rig.run(Duration::from_millis(300)).unwrap();
    assert!(!rig.hw().light(Switch::Steam));
    assert_eq!(rig.hw().pump_value(), 0);

    rig.set_switch(Switch::Steam, false);
    assert_eq!(rig.state(), Some(StateId::Standby));
    assert_eq!(rig.ctl.context().control.target_temperature(), 95.0);
}

#[test]
fn scheduled_change_lands_on_next_iteration_and_exits_once() {
    let mut rig = Rig::warm(94.0);
    rig.power_on();
    rig.link.schedule_state_change_by_id(StateId::Backflush as i32);
    rig.iterate().unwrap();
    assert_eq!(rig.state(), Some(StateId::Backflush));

    // Mid-pressurize.
    rig.run(Duration::from_secs(2)).unwrap();
    assert_eq!(rig.hw().pump_value(), 100);
    assert!(rig.hw().solenoid_open());
    let before = rig.sink.state_changes().len();

    rig.link.schedule_state_change_by_id(StateId::Standby as i32);
    assert_eq!(rig.state(), Some(StateId::Backflush));
    rig.iterate().unwrap();
    assert_eq!(rig.state(), Some(StateId::Standby));
    assert_eq!(rig.hw().pump_value(), 0);
    assert!(!rig.hw().solenoid_open());
    assert_eq!(rig.ctl.context().maintenance, None);
    assert_eq!(rig.sink.state_changes()[before..], [StateId::Standby as i8]);

    // The abandoned sequence never resumes.
    rig.run(Duration::from_secs(10)).unwrap();
    assert_eq!(rig.hw().pump_value(), 0);
    assert_eq!(rig.state(), Some(StateId::Standby));
}

#[test]
fn requesting_the_current_state_changes_nothing() {
    let mut rig = Rig::warm(94.0);
    rig.power_on();
    rig.run(Duration::from_secs(1)).unwrap();
    let changes = rig.sink.state_changes().len();
    let entered = rig.ctl.context().machine.state_change_time;

    rig.link.schedule_state_change_by_id(StateId::Standby as i32);
    rig.iterate().unwrap();
    assert_eq!(rig.sink.state_changes().len(), changes);
    assert_eq!(rig.ctl.context().machine.state_change_time, entered);
}

#[test]
fn unknown_state_id_is_ignored() {
    let mut rig = Rig::warm(94.0);
    rig.power_on();
    rig.link.schedule_state_change_by_id(6);
    rig.iterate().unwrap();
    assert_eq!(rig.state(), Some(StateId::Standby));
}

#[test]
fn power_press_switches_off_from_any_state() {
    let mut rig = Rig::warm(94.0);
    rig.power_on();
    rig.set_switch(Switch::Brew, true);
    assert_eq!(rig.state(), Some(StateId::Brew));

    rig.set_switch(Switch::Power, false);
    rig.set_switch(Switch::Power, true);
    assert_eq!(rig.state(), Some(StateId::Off));
    assert_eq!(rig.hw().heater_power(), 0.0);
    assert_eq!(rig.hw().pump_power(), 0.0);
    assert!(!rig.hw().solenoid_open());
    for light in Switch::ALL {
        assert!(!rig.hw().light(light));
    }
}
