use salus_it500::{
    DeviceMode, DeviceSnapshot, HvacAction, MAX_SETPOINT_C, MIN_SETPOINT_C, Temperature,
    extract_token,
};

#[test]
fn from_celsius() {
    let t = Temperature::from_celsius(21.5);
    assert_eq!(t.celsius(), 21.5);
    assert_eq!(t.to_string(), "21.5\u{00b0}C");
}

#[test]
fn salus_setpoint_has_one_decimal() {
    assert_eq!(Temperature::from_celsius(21.0).to_salus_setpoint(), "21.0");
    assert_eq!(Temperature::from_celsius(21.24).to_salus_setpoint(), "21.2");
    assert_eq!(Temperature::from_celsius(19.96).to_salus_setpoint(), "20.0");
}

#[test]
fn setpoint_range_is_inclusive() {
    assert!(Temperature::from_celsius(MIN_SETPOINT_C).is_valid_setpoint());
    assert!(Temperature::from_celsius(MAX_SETPOINT_C).is_valid_setpoint());
    assert!(!Temperature::from_celsius(4.9).is_valid_setpoint());
    assert!(!Temperature::from_celsius(35.0).is_valid_setpoint());
    assert!(!Temperature::from_celsius(f64::NAN).is_valid_setpoint());
}

#[test]
fn mode_flag_is_inverted() {
    assert_eq!(DeviceMode::from_salus_flag("1"), DeviceMode::Off);
    assert_eq!(DeviceMode::from_salus_flag("0"), DeviceMode::On);
    assert_eq!(DeviceMode::from_salus_flag("garbage"), DeviceMode::On);
    assert_eq!(DeviceMode::Off.as_salus_flag(), "1");
    assert_eq!(DeviceMode::On.as_salus_flag(), "0");
}

#[test]
fn hvac_action_prefers_reported_output() {
    let snap = DeviceSnapshot {
        current_temperature: Some(Temperature::from_celsius(18.0)),
        target_temperature: Some(Temperature::from_celsius(21.0)),
        is_heating: Some(false),
        available: true,
        ..Default::default()
    };
    assert_eq!(snap.hvac_action(), Some(HvacAction::Idle));

    let inferred = DeviceSnapshot {
        is_heating: None,
        ..snap.clone()
    };
    assert_eq!(inferred.hvac_action(), Some(HvacAction::Heating));

    let off = DeviceSnapshot {
        mode: DeviceMode::Off,
        is_heating: Some(true),
        ..snap.clone()
    };
    assert_eq!(off.hvac_action(), Some(HvacAction::Off));

    let gone = DeviceSnapshot {
        available: false,
        ..snap
    };
    assert_eq!(gone.hvac_action(), None);
}

#[test]
fn token_from_inline_script() {
    let html = "<script>var token = 'abc-987';</script>";
    assert_eq!(extract_token(html).as_deref(), Some("abc-987"));
}

#[test]
fn setpoint_resolution_matches_wire_format() {
    for c in [21.25, 21.24, 19.96, 5.0, 34.5] {
        let snapped = Temperature::from_celsius(c).to_setpoint_resolution();
        assert_eq!(
            snapped.to_salus_setpoint().parse::<f64>().unwrap(),
            snapped.celsius(),
            "{c} snapped to {snapped}"
        );
    }
    assert_eq!(
        Temperature::from_celsius(21.25).to_setpoint_resolution(),
        Temperature::from_celsius(21.3)
    );
}
