//! Derived observations added before transforming when `augment_record` is on.
//!
//! Only fills observations that are missing or null; station-provided values
//! always win. Results are expressed in the record's own unit system.

use crate::domain::Record;
use crate::units::{Unit, UnitGroup, convert};
use tracing::debug;

/// Returns a copy of `record` with `dewpoint`, `windchill` and `heatindex`
/// derived where the inputs are available.
pub fn augment_record(record: &Record) -> Record {
    let system = record.unit_system();
    let temp_unit = system.standard_unit(UnitGroup::Temperature);
    let speed_unit = system.standard_unit(UnitGroup::Speed);

    let temp_f = record
        .get("outTemp")
        .and_then(|t| convert(t, temp_unit, Unit::DegreeF).ok());
    let humidity = record.get("outHumidity").filter(|rh| *rh > 0.0 && *rh <= 100.0);
    let wind_mph = record
        .get("windSpeed")
        .and_then(|v| convert(v, speed_unit, Unit::MilePerHour).ok());

    let mut augmented = record.clone();
    let mut fill = |name: &str, value_f: Option<f64>| {
        if record.get(name).is_some() {
            return;
        }
        if let Some(value) = value_f.and_then(|f| convert(f, Unit::DegreeF, temp_unit).ok()) {
            debug!(observation = name, value, "derived observation");
            augmented.insert(name, value);
        }
    };

    fill(
        "dewpoint",
        temp_f.zip(humidity).map(|(t, rh)| dewpoint_f(t, rh)),
    );
    fill(
        "windchill",
        temp_f.zip(wind_mph).map(|(t, v)| windchill_f(t, v)),
    );
    fill(
        "heatindex",
        temp_f.zip(humidity).map(|(t, rh)| heatindex_f(t, rh)),
    );

    augmented
}

/// Magnus approximation.
pub fn dewpoint_f(temp_f: f64, humidity: f64) -> f64 {
    const A: f64 = 17.27;
    const B: f64 = 237.7;
    let temp_c = (temp_f - 32.0) * 5.0 / 9.0;
    let gamma = A * temp_c / (B + temp_c) + (humidity / 100.0).ln();
    let dewpoint_c = B * gamma / (A - gamma);
    dewpoint_c * 9.0 / 5.0 + 32.0
}

/// NWS wind chill; defined only at or below 50F with wind of at least 3 mph.
pub fn windchill_f(temp_f: f64, wind_mph: f64) -> f64 {
    if temp_f > 50.0 || wind_mph < 3.0 {
        return temp_f;
    }
    let v = wind_mph.powf(0.16);
    35.74 + 0.6215 * temp_f - 35.75 * v + 0.4275 * temp_f * v
}

/// Rothfusz regression; below 80F the air temperature is returned.
pub fn heatindex_f(temp_f: f64, humidity: f64) -> f64 {
    if temp_f < 80.0 {
        return temp_f;
    }
    let (t, rh) = (temp_f, humidity);
    -42.379 + 2.049_015_23 * t + 10.143_331_27 * rh
        - 0.224_755_41 * t * rh
        - 6.837_83e-3 * t * t
        - 5.481_717e-2 * rh * rh
        + 1.228_74e-3 * t * t * rh
        + 8.5282e-4 * t * rh * rh
        - 1.99e-6 * t * t * rh * rh
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Timestamp;
    use crate::units::UnitSystem;

    #[test]
    fn test_dewpoint_at_saturation_equals_temperature() {
        assert!((dewpoint_f(68.0, 100.0) - 68.0).abs() < 1e-9);
        assert!(dewpoint_f(68.0, 50.0) < 68.0);
    }

    #[test]
    fn test_windchill_only_when_cold_and_windy() {
        assert_eq!(windchill_f(60.0, 20.0), 60.0);
        assert_eq!(windchill_f(30.0, 1.0), 30.0);
        assert!(windchill_f(30.0, 20.0) < 30.0);
    }

    #[test]
    fn test_existing_values_are_kept() {
        let record = Record::new(Timestamp::from_secs(0), UnitSystem::Us)
            .with("outTemp", 40.0)
            .with("outHumidity", 80.0)
            .with("windSpeed", 10.0)
            .with("dewpoint", 1.0);
        let augmented = augment_record(&record);

        assert_eq!(augmented.get("dewpoint"), Some(1.0));
        assert!(augmented.get("windchill").unwrap() < 40.0);
        assert_eq!(augmented.get("heatindex"), Some(40.0));
    }

    #[test]
    fn test_metric_record_stays_metric() {
        let record = Record::new(Timestamp::from_secs(0), UnitSystem::Metric)
            .with("outTemp", 20.0)
            .with("outHumidity", 100.0);
        let augmented = augment_record(&record);
        assert!((augmented.get("dewpoint").unwrap() - 20.0).abs() < 1e-6);
    }
}
