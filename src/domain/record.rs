use crate::units::UnitSystem;
use clap::ValueEnum;
use serde::de::{self, IgnoredAny, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Which collection cadence a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Binding {
    Loop,
    Archive,
}

impl Binding {
    pub fn as_str(self) -> &'static str {
        match self {
            Binding::Loop => "loop",
            Binding::Archive => "archive",
        }
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Epoch timestamp with nanosecond resolution.
///
/// Integer and fractional epoch seconds are kept apart so that scaling to
/// nanoseconds does not go through a lossy `f64` multiply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    secs: i64,
    nanos: u32,
}

impl Timestamp {
    pub fn from_secs(secs: i64) -> Self {
        Self { secs, nanos: 0 }
    }

    /// Returns `None` for NaN or infinite input.
    pub fn from_secs_f64(secs: f64) -> Option<Self> {
        if !secs.is_finite() {
            return None;
        }
        let whole = secs.floor();
        let mut nanos = ((secs - whole) * 1e9).round() as u32;
        let mut whole = whole as i64;
        if nanos >= 1_000_000_000 {
            whole += 1;
            nanos -= 1_000_000_000;
        }
        Some(Self { secs: whole, nanos })
    }

    pub fn secs(&self) -> i64 {
        self.secs
    }

    pub fn as_nanos(&self) -> i64 {
        self.secs
            .saturating_mul(1_000_000_000)
            .saturating_add(self.nanos as i64)
    }
}

/// One observation cycle: a timestamp, the unit system the values are
/// expressed in, and the observations in the order they were produced.
///
/// A `None` value means the station reported the observation as absent.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    timestamp: Timestamp,
    unit_system: UnitSystem,
    observations: Vec<(String, Option<f64>)>,
}

impl Record {
    pub fn new(timestamp: Timestamp, unit_system: UnitSystem) -> Self {
        Self {
            timestamp,
            unit_system,
            observations: Vec::new(),
        }
    }

    /// Builder-style insert, used heavily by tests and the CLI driver.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Option<f64>>) -> Self {
        self.insert(name, value);
        self
    }

    /// Sets an observation. Replacing keeps the original position.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Option<f64>>) {
        let name = name.into();
        let value = value.into();
        match self.observations.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = value,
            None => self.observations.push((name, value)),
        }
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn unit_system(&self) -> UnitSystem {
        self.unit_system
    }

    /// Value of a present, non-null observation.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.observations
            .iter()
            .find(|(existing, _)| existing == name)
            .and_then(|(_, value)| *value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.observations.iter().any(|(existing, _)| existing == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<f64>)> {
        self.observations
            .iter()
            .map(|(name, value)| (name.as_str(), *value))
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawValue {
    Int(i64),
    Float(f64),
    Text(String),
    Other(IgnoredAny),
}

impl RawValue {
    fn as_f64(&self) -> Option<f64> {
        match self {
            RawValue::Int(v) => Some(*v as f64),
            RawValue::Float(v) => Some(*v),
            RawValue::Text(text) => text.trim().parse().ok(),
            RawValue::Other(_) => None,
        }
    }
}

struct RecordVisitor;

impl<'de> Visitor<'de> for RecordVisitor {
    type Value = Record;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an object with dateTime, optional usUnits and observation values")
    }

    fn visit_map<A>(self, mut map: A) -> Result<Record, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut timestamp = None;
        let mut unit_system = UnitSystem::Us;
        let mut observations: Vec<(String, Option<f64>)> = Vec::new();

        while let Some(key) = map.next_key::<String>()? {
            match key.as_str() {
                "dateTime" => {
                    let raw: RawValue = map.next_value()?;
                    timestamp = Some(match raw {
                        RawValue::Int(secs) => Timestamp::from_secs(secs),
                        other => other
                            .as_f64()
                            .and_then(Timestamp::from_secs_f64)
                            .ok_or_else(|| de::Error::custom("dateTime must be a finite number"))?,
                    });
                }
                "usUnits" => {
                    let code: i64 = map.next_value()?;
                    unit_system = UnitSystem::from_code(code).map_err(de::Error::custom)?;
                }
                _ => {
                    let raw: Option<RawValue> = map.next_value()?;
                    let value = raw.as_ref().and_then(RawValue::as_f64);
                    match observations.iter_mut().find(|(name, _)| *name == key) {
                        Some(slot) => slot.1 = value,
                        None => observations.push((key, value)),
                    }
                }
            }
        }

        let timestamp = timestamp.ok_or_else(|| de::Error::missing_field("dateTime"))?;
        Ok(Record {
            timestamp,
            unit_system,
            observations,
        })
    }
}

impl<'de> Deserialize<'de> for Record {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(RecordVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fractional_timestamp_scaling() {
        let ts = Timestamp::from_secs_f64(1_700_000_000.25).unwrap();
        assert_eq!(ts.as_nanos(), 1_700_000_000_250_000_000);
        assert_eq!(Timestamp::from_secs(12).as_nanos(), 12_000_000_000);
        assert!(Timestamp::from_secs_f64(f64::NAN).is_none());
    }

    #[test]
    fn test_json_keeps_insertion_order() {
        let json = r#"{"dateTime": 1700000000, "usUnits": 16, "outTemp": 21.5,
                       "barometer": null, "windSpeed": "3.5", "status": true, "inTemp": 20}"#;
        let record: Record = serde_json::from_str(json).unwrap();

        let names: Vec<_> = record.iter().map(|(name, _)| name).collect();
        assert_eq!(names, ["outTemp", "barometer", "windSpeed", "status", "inTemp"]);
        assert_eq!(record.unit_system(), UnitSystem::Metric);
        assert_eq!(record.get("windSpeed"), Some(3.5));
        assert_eq!(record.get("barometer"), None);
        assert!(record.contains("barometer"));
        assert_eq!(record.get("status"), None);
    }

    #[test]
    fn test_missing_datetime_is_rejected() {
        let result: Result<Record, _> = serde_json::from_str(r#"{"outTemp": 1.0}"#);
        assert!(result.is_err());
    }
}
