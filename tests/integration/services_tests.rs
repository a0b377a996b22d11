//! Services-core behaviour against a running controller.

use std::time::Duration;

use gaggico::app::commands::Command;
use gaggico::app::events::OutboundMessage;
use gaggico::app::ports::{ConfigError, Switch};
use gaggico::config::Settings;
use gaggico::fsm::StateId;

use crate::rig::Rig;

#[test]
fn telemetry_is_silent_while_off() {
    let mut rig = Rig::new();
    rig.run(Duration::from_secs(2)).unwrap();
    assert_eq!(rig.sink.telemetry_count(), 0);
}

#[test]
fn telemetry_is_faster_while_brewing() {
    let mut rig = Rig::warm(94.0);
    rig.power_on();
    rig.sink.msgs.clear();
    rig.run(Duration::from_secs(2)).unwrap();
    let standby = rig.sink.telemetry_count();
    assert!((7..=9).contains(&standby), "{standby} in standby");

    rig.set_switch(Switch::Brew, true);
    rig.sink.msgs.clear();
    rig.run(Duration::from_secs(2)).unwrap();
    let brew = rig.sink.telemetry_count();
    assert!((17..=21).contains(&brew), "{brew} while brewing");
}

#[test]
fn telemetry_reports_nan_weight_without_scale() {
    let mut rig = Rig::warm(94.0);
    rig.power_on();
    rig.run(Duration::from_millis(500)).unwrap();
    let weight = rig.sink.msgs.iter().rev().find_map(|m| match m {
        OutboundMessage::SensorStatus { weight, temperature, .. } => {
            assert!(*temperature > 90.0);
            Some(*weight)
        }
        _ => None,
    });
    assert!(weight.expect("telemetry").is_nan());
}

#[test]
fn power_commands_switch_the_machine() {
    let mut rig = Rig::warm(94.0);
    rig.command(Command::SetPower(true)).unwrap();
    rig.iterate().unwrap();
    assert_eq!(rig.state(), Some(StateId::Standby));
    assert!(rig.ctl.context().control.boiler_enabled());

    rig.command(Command::SetPower(false)).unwrap();
    rig.iterate().unwrap();
    assert_eq!(rig.state(), Some(StateId::Off));
    assert!(!rig.ctl.context().control.boiler_enabled());
}

#[test]
fn new_settings_apply_on_next_standby_entry() {
    let mut rig = Rig::warm(94.0);
    rig.power_on();
    let update = Settings {
        brew_temp: 92.0,
        ..Settings::default()
    };
    rig.command(Command::UpdateSettings(update)).unwrap();
    assert_eq!(rig.store.saved, Some(update));
    rig.run(Duration::from_millis(10)).unwrap();
    assert_eq!(rig.ctl.context().settings.brew_temp, 92.0);
    assert_eq!(rig.ctl.context().control.target_temperature(), 95.0);

    rig.set_switch(Switch::Brew, true);
    rig.set_switch(Switch::Brew, false);
    assert_eq!(rig.state(), Some(StateId::Standby));
    assert_eq!(rig.ctl.context().control.target_temperature(), 92.0);
}

#[test]
fn rejected_settings_leave_everything_unchanged() {
    let mut rig = Rig::warm(94.0);
    rig.power_on();
    let bad = Settings {
        brew_pressure: f32::NAN,
        ..Settings::default()
    };
    let err = rig.command(Command::UpdateSettings(bad)).unwrap_err();
    assert!(matches!(err, ConfigError::ValidationFailed(_)));
    assert_eq!(rig.store.saved, None);
    rig.run(Duration::from_millis(10)).unwrap();
    assert_eq!(rig.ctl.context().settings, Settings::default());
}

#[test]
fn status_request_reports_state_and_progress() {
    let mut rig = Rig::warm(94.0);
    rig.power_on();
    rig.link.schedule_state_change_by_id(StateId::Backflush as i32);
    rig.run(Duration::from_millis(10)).unwrap();
    rig.sink.msgs.clear();

    rig.command(Command::GetStatus).unwrap();
    let status = rig.ctl.status();
    assert_eq!(
        rig.sink.msgs[0],
        OutboundMessage::StateChange {
            new_state: StateId::Backflush as i8,
            state_change_ms: status.state_change_ms,
            machine_start_ms: status.machine_start_ms,
        }
    );
    assert_eq!(rig.sink.msgs[1], OutboundMessage::Settings(Settings::default()));
    assert_eq!(
        rig.sink.msgs[2],
        OutboundMessage::MaintenanceStatus { stage: 0, cycle: 1 }
    );
}
