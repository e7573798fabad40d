use wx_influx_forwarder::units::{
    Unit, UnitError, UnitGroup, UnitSystem, convert, observation_group,
};

fn assert_close(actual: f64, expected: f64, tolerance: f64) {
    assert!(
        (actual - expected).abs() <= tolerance,
        "expected {expected}, got {actual}"
    );
}

#[test]
fn test_conversions_within_groups() {
    assert_close(convert(29.92, Unit::InHg, Unit::Mbar).unwrap(), 1013.2, 0.1);
    assert_close(convert(1013.25, Unit::HPa, Unit::KPa).unwrap(), 101.325, 1e-9);
    assert_close(convert(10.0, Unit::Knot, Unit::MeterPerSecond).unwrap(), 5.1444, 1e-4);
    assert_close(convert(36.0, Unit::KmPerHour, Unit::MeterPerSecond).unwrap(), 10.0, 1e-9);
    assert_close(convert(1.0, Unit::Inch, Unit::Mm).unwrap(), 25.4, 1e-9);
    assert_close(convert(2.0, Unit::CmPerHour, Unit::InchPerHour).unwrap(), 0.7874, 1e-4);
    assert_close(convert(1000.0, Unit::Foot, Unit::Meter).unwrap(), 304.8, 1e-9);
    assert_close(convert(90.0, Unit::Second, Unit::Minute).unwrap(), 1.5, 1e-9);
    assert_close(convert(-40.0, Unit::DegreeC, Unit::DegreeF).unwrap(), -40.0, 1e-9);
}

#[test]
fn test_identity_is_exact() {
    for unit in Unit::ALL {
        assert_eq!(convert(12.345, unit, unit).unwrap(), 12.345);
    }
}

#[test]
fn test_cross_group_conversion_fails() {
    let err = convert(1.0, Unit::DegreeF, Unit::Mbar).unwrap_err();
    assert_eq!(
        err,
        UnitError::IncompatibleUnits {
            from: Unit::DegreeF,
            from_group: UnitGroup::Temperature,
            to: Unit::Mbar,
            to_group: UnitGroup::Pressure,
        }
    );
    assert!(convert(1.0, Unit::Inch, Unit::InchPerHour).is_err());
}

#[test]
fn test_unit_names() {
    assert_eq!("degree_F".parse::<Unit>().unwrap(), Unit::DegreeF);
    assert_eq!("meter_per_second".parse::<Unit>().unwrap(), Unit::MeterPerSecond);
    assert!(matches!("parsec".parse::<Unit>(), Err(UnitError::UnknownUnit(_))));
}

#[test]
fn test_unit_systems() {
    assert_eq!(UnitSystem::from_code(1).unwrap(), UnitSystem::Us);
    assert_eq!(UnitSystem::from_code(17).unwrap().code(), 17);
    assert_eq!(UnitSystem::from_code(2), Err(UnitError::UnknownSystem(2)));

    assert_eq!(UnitSystem::Us.unit_for("outTemp"), Some(Unit::DegreeF));
    assert_eq!(UnitSystem::Metric.unit_for("windSpeed"), Some(Unit::KmPerHour));
    assert_eq!(UnitSystem::MetricWx.unit_for("windSpeed"), Some(Unit::MeterPerSecond));
    assert_eq!(UnitSystem::Metric.unit_for("rain"), Some(Unit::Cm));
    assert_eq!(UnitSystem::Us.unit_for("mystery"), None);
}

#[test]
fn test_observation_groups() {
    assert_eq!(observation_group("barometer"), Some(UnitGroup::Pressure));
    assert_eq!(observation_group("windGustDir"), Some(UnitGroup::Direction));
    assert_eq!(observation_group("rainRate"), Some(UnitGroup::RainRate));
    assert_eq!(observation_group("leafWet1"), Some(UnitGroup::Count));
    assert_eq!(observation_group("stationName"), None);
}
