use std::collections::BTreeMap;
use wx_influx_forwarder::domain::{Binding, FieldValue, Record, TagSet, Timestamp};
use wx_influx_forwarder::transform::{
    MOST_DENY_LIST, ObsToUpload, ObservationMapper, ObservationSpec, RecordTransformer,
};
use wx_influx_forwarder::units::{Unit, UnitSystem};

fn transformer(
    obs_to_upload: ObsToUpload,
    append_units_label: bool,
    inputs: &[(&str, ObservationSpec)],
    unit_system: Option<UnitSystem>,
    augment: bool,
) -> RecordTransformer {
    let inputs: BTreeMap<String, ObservationSpec> = inputs
        .iter()
        .map(|(name, spec)| (name.to_string(), spec.clone()))
        .collect();
    let mapper = ObservationMapper::new(obs_to_upload, append_units_label, &inputs).unwrap();
    RecordTransformer::new(mapper, "weewx", TagSet::new(), unit_system, augment)
}

fn number(point: &wx_influx_forwarder::FormattedPoint, name: &str) -> Option<f64> {
    match point.field(name)? {
        FieldValue::Number(n) => n.trim().parse().ok(),
        FieldValue::Text(_) => None,
    }
}

fn us_record() -> Record {
    Record::new(Timestamp::from_secs(1_700_000_000), UnitSystem::Us)
        .with("outTemp", 72.5)
        .with("outHumidity", 45.0)
        .with("barometer", 30.01)
        .with("windSpeed", None)
        .with("rxCheckPercent", 98.0)
        .with("leafWet1", 3.0)
}

#[test]
fn test_field_count_matches_included_observations() {
    let record = us_record();
    let present = record.iter().filter(|(_, v)| v.is_some()).count();

    let all = transformer(ObsToUpload::All, false, &[], None, false);
    assert_eq!(all.transform(&record, Binding::Archive).field_count(), present);

    let most = transformer(ObsToUpload::Most, false, &[], None, false);
    let excluded = record
        .iter()
        .filter(|(name, v)| v.is_some() && MOST_DENY_LIST.contains(name))
        .count();
    assert_eq!(
        most.transform(&record, Binding::Archive).field_count(),
        present - excluded
    );

    let none = transformer(ObsToUpload::None, false, &[], None, false);
    assert!(none.transform(&record, Binding::Archive).is_empty());
}

#[test]
fn test_fields_follow_record_order() {
    let point = transformer(ObsToUpload::All, false, &[], None, false)
        .transform(&us_record(), Binding::Archive);
    let names: Vec<&str> = point.fields().iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(
        names,
        ["outTemp", "outHumidity", "barometer", "rxCheckPercent", "leafWet1"]
    );
}

#[test]
fn test_override_converts_and_formats() {
    let t = transformer(
        ObsToUpload::All,
        true,
        &[(
            "outTemp",
            ObservationSpec {
                units: Some(Unit::DegreeC),
                name: None,
                format: Some("%.2f".to_string()),
            },
        )],
        None,
        false,
    );
    let record = Record::new(Timestamp::from_secs(0), UnitSystem::Us).with("outTemp", 212.0);
    let point = t.transform(&record, Binding::Loop);

    assert_eq!(
        point.field("outTemp_C"),
        Some(&FieldValue::Number("100.00".to_string()))
    );
}

#[test]
fn test_unit_system_override_coerces_everything() {
    let t = transformer(ObsToUpload::All, true, &[], Some(UnitSystem::Metric), false);
    let record = Record::new(Timestamp::from_secs(0), UnitSystem::Us)
        .with("outTemp", 32.0)
        .with("windSpeed", 10.0)
        .with("outHumidity", 50.0);
    let point = t.transform(&record, Binding::Archive);

    assert!((number(&point, "outTemp_C").unwrap() - 0.0).abs() < 1e-9);
    assert!((number(&point, "windSpeed_kph").unwrap() - 16.09344).abs() < 1e-6);
    assert_eq!(number(&point, "outHumidity"), Some(50.0));
}

#[test]
fn test_metric_record_keeps_native_units() {
    let t = transformer(ObsToUpload::All, true, &[], None, false);
    let record = Record::new(Timestamp::from_secs(0), UnitSystem::MetricWx)
        .with("outTemp", 21.5)
        .with("rain", 1.2);
    let point = t.transform(&record, Binding::Archive);

    assert_eq!(number(&point, "outTemp_C"), Some(21.5));
    assert_eq!(number(&point, "rain_mm"), Some(1.2));
}

#[test]
fn test_bad_field_does_not_drop_point() {
    let t = transformer(
        ObsToUpload::All,
        false,
        // Unknown observation, so its native unit cannot be determined.
        &[(
            "soilTempX",
            ObservationSpec {
                units: Some(Unit::DegreeC),
                ..Default::default()
            },
        )],
        None,
        false,
    );
    let record = Record::new(Timestamp::from_secs(0), UnitSystem::Us)
        .with("soilTempX", 60.0)
        .with("outTemp", f64::NAN)
        .with("inTemp", 70.0);
    let point = t.transform(&record, Binding::Archive);

    assert_eq!(point.field_count(), 1);
    assert_eq!(number(&point, "inTemp"), Some(70.0));
}

#[test]
fn test_augment_fills_missing_derived_values() {
    let record = Record::new(Timestamp::from_secs(0), UnitSystem::Us)
        .with("outTemp", 40.0)
        .with("outHumidity", 80.0)
        .with("windSpeed", 15.0)
        .with("heatindex", 1.0);

    let plain = transformer(ObsToUpload::All, false, &[], None, false)
        .transform(&record, Binding::Archive);
    assert!(plain.field("dewpoint").is_none());

    let augmented = transformer(ObsToUpload::All, false, &[], None, true)
        .transform(&record, Binding::Archive);
    let dewpoint = number(&augmented, "dewpoint").unwrap();
    assert!((dewpoint - 34.3).abs() < 0.5, "dewpoint was {dewpoint}");
    let windchill = number(&augmented, "windchill").unwrap();
    assert!((windchill - 31.8).abs() < 0.5, "windchill was {windchill}");
    // Station values are never replaced.
    assert_eq!(number(&augmented, "heatindex"), Some(1.0));
}

#[test]
fn test_json_record_round_trips_into_point() {
    let json = r#"{"dateTime": 1700000000.5, "usUnits": 17, "outTemp": 21.5, "UV": null}"#;
    let record: Record = serde_json::from_str(json).unwrap();
    let point = transformer(ObsToUpload::All, true, &[], None, false)
        .transform(&record, Binding::Loop);

    assert_eq!(point.timestamp_ns, 1_700_000_000_500_000_000);
    assert_eq!(point.field_count(), 1);
    assert_eq!(number(&point, "outTemp_C"), Some(21.5));
}

#[test]
fn test_rename_collision_keeps_first_field() {
    let rename = ObservationSpec {
        name: Some("outTemp".to_string()),
        ..Default::default()
    };
    let transformer = transformer(ObsToUpload::All, false, &[("inTemp", rename)], None, false);
    let record = Record::new(Timestamp::from_secs(1_700_000_000), UnitSystem::Us)
        .with("outTemp", 1.0)
        .with("inTemp", 2.0)
        .with("outHumidity", 45.0);

    let point = transformer.transform(&record, Binding::Archive);

    assert_eq!(number(&point, "outTemp"), Some(1.0));
    assert_eq!(number(&point, "outHumidity"), Some(45.0));
    assert_eq!(point.field_count(), 2);
}
