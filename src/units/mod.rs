//! Unit conversion for weather observations.
//!
//! Units are a closed set grouped by physical quantity. Conversion goes
//! through a base unit per group, so any two units of the same group convert
//! and units of different groups never do.

pub mod system;

pub use system::{UnitSystem, observation_group};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum UnitError {
    #[error("Unknown unit: {0}")]
    UnknownUnit(String),
    #[error("Cannot convert {from} ({from_group:?}) to {to} ({to_group:?})")]
    IncompatibleUnits {
        from: Unit,
        from_group: UnitGroup,
        to: Unit,
        to_group: UnitGroup,
    },
    #[error("Unknown unit system code: {0}")]
    UnknownSystem(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitGroup {
    Temperature,
    Pressure,
    Speed,
    Speed2,
    Rain,
    RainRate,
    Altitude,
    Distance,
    Percent,
    Direction,
    Radiation,
    Uv,
    Volt,
    Time,
    Interval,
    Moisture,
    Count,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Unit {
    DegreeF,
    DegreeC,
    DegreeK,
    InHg,
    Mbar,
    HPa,
    KPa,
    MmHg,
    MilePerHour,
    KmPerHour,
    MeterPerSecond,
    Knot,
    MilePerHour2,
    KmPerHour2,
    MeterPerSecond2,
    Knot2,
    Inch,
    Cm,
    Mm,
    InchPerHour,
    CmPerHour,
    MmPerHour,
    Foot,
    Meter,
    Mile,
    Km,
    Percent,
    DegreeCompass,
    WattPerMeterSquared,
    UvIndex,
    Volt,
    UnixEpoch,
    Second,
    Minute,
    Hour,
    Centibar,
    Count,
}

/// `value_in_base = value * scale + offset`
#[derive(Debug, Clone, Copy)]
struct Linear {
    scale: f64,
    offset: f64,
}

const fn lin(scale: f64) -> Linear {
    Linear { scale, offset: 0.0 }
}

impl Unit {
    pub const ALL: [Unit; 37] = [
        Unit::DegreeF,
        Unit::DegreeC,
        Unit::DegreeK,
        Unit::InHg,
        Unit::Mbar,
        Unit::HPa,
        Unit::KPa,
        Unit::MmHg,
        Unit::MilePerHour,
        Unit::KmPerHour,
        Unit::MeterPerSecond,
        Unit::Knot,
        Unit::MilePerHour2,
        Unit::KmPerHour2,
        Unit::MeterPerSecond2,
        Unit::Knot2,
        Unit::Inch,
        Unit::Cm,
        Unit::Mm,
        Unit::InchPerHour,
        Unit::CmPerHour,
        Unit::MmPerHour,
        Unit::Foot,
        Unit::Meter,
        Unit::Mile,
        Unit::Km,
        Unit::Percent,
        Unit::DegreeCompass,
        Unit::WattPerMeterSquared,
        Unit::UvIndex,
        Unit::Volt,
        Unit::UnixEpoch,
        Unit::Second,
        Unit::Minute,
        Unit::Hour,
        Unit::Centibar,
        Unit::Count,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Unit::DegreeF => "degree_F",
            Unit::DegreeC => "degree_C",
            Unit::DegreeK => "degree_K",
            Unit::InHg => "inHg",
            Unit::Mbar => "mbar",
            Unit::HPa => "hPa",
            Unit::KPa => "kPa",
            Unit::MmHg => "mmHg",
            Unit::MilePerHour => "mile_per_hour",
            Unit::KmPerHour => "km_per_hour",
            Unit::MeterPerSecond => "meter_per_second",
            Unit::Knot => "knot",
            Unit::MilePerHour2 => "mile_per_hour2",
            Unit::KmPerHour2 => "km_per_hour2",
            Unit::MeterPerSecond2 => "meter_per_second2",
            Unit::Knot2 => "knot2",
            Unit::Inch => "inch",
            Unit::Cm => "cm",
            Unit::Mm => "mm",
            Unit::InchPerHour => "inch_per_hour",
            Unit::CmPerHour => "cm_per_hour",
            Unit::MmPerHour => "mm_per_hour",
            Unit::Foot => "foot",
            Unit::Meter => "meter",
            Unit::Mile => "mile",
            Unit::Km => "km",
            Unit::Percent => "percent",
            Unit::DegreeCompass => "degree_compass",
            Unit::WattPerMeterSquared => "watt_per_meter_squared",
            Unit::UvIndex => "uv_index",
            Unit::Volt => "volt",
            Unit::UnixEpoch => "unix_epoch",
            Unit::Second => "second",
            Unit::Minute => "minute",
            Unit::Hour => "hour",
            Unit::Centibar => "centibar",
            Unit::Count => "count",
        }
    }

    pub fn group(self) -> UnitGroup {
        match self {
            Unit::DegreeF | Unit::DegreeC | Unit::DegreeK => UnitGroup::Temperature,
            Unit::InHg | Unit::Mbar | Unit::HPa | Unit::KPa | Unit::MmHg => UnitGroup::Pressure,
            Unit::MilePerHour | Unit::KmPerHour | Unit::MeterPerSecond | Unit::Knot => {
                UnitGroup::Speed
            }
            Unit::MilePerHour2 | Unit::KmPerHour2 | Unit::MeterPerSecond2 | Unit::Knot2 => {
                UnitGroup::Speed2
            }
            Unit::Inch | Unit::Cm | Unit::Mm => UnitGroup::Rain,
            Unit::InchPerHour | Unit::CmPerHour | Unit::MmPerHour => UnitGroup::RainRate,
            Unit::Foot | Unit::Meter => UnitGroup::Altitude,
            Unit::Mile | Unit::Km => UnitGroup::Distance,
            Unit::Percent => UnitGroup::Percent,
            Unit::DegreeCompass => UnitGroup::Direction,
            Unit::WattPerMeterSquared => UnitGroup::Radiation,
            Unit::UvIndex => UnitGroup::Uv,
            Unit::Volt => UnitGroup::Volt,
            Unit::UnixEpoch => UnitGroup::Time,
            Unit::Second | Unit::Minute | Unit::Hour => UnitGroup::Interval,
            Unit::Centibar => UnitGroup::Moisture,
            Unit::Count => UnitGroup::Count,
        }
    }

    /// Short label appended to field names when `append_units_label` is on.
    ///
    /// Dimensionless units (compass degrees, UV index, percent, epoch time)
    /// have no label.
    pub fn label(self) -> Option<&'static str> {
        match self {
            Unit::DegreeF => Some("F"),
            Unit::DegreeC => Some("C"),
            Unit::Inch => Some("in"),
            Unit::MilePerHour | Unit::MilePerHour2 => Some("mph"),
            Unit::KmPerHour | Unit::KmPerHour2 => Some("kph"),
            Unit::MeterPerSecond | Unit::MeterPerSecond2 => Some("mps"),
            Unit::WattPerMeterSquared => Some("Wpm2"),
            Unit::DegreeCompass | Unit::UvIndex | Unit::Percent | Unit::UnixEpoch => None,
            other => Some(other.name()),
        }
    }

    // Base units: degree_C, mbar, m/s, mm, mm/h, meter, km, minute.
    fn to_base(self) -> Linear {
        match self {
            Unit::DegreeF => Linear {
                scale: 5.0 / 9.0,
                offset: -32.0 * 5.0 / 9.0,
            },
            Unit::DegreeK => Linear {
                scale: 1.0,
                offset: -273.15,
            },
            Unit::InHg => lin(33.863_886_666_667),
            Unit::KPa => lin(10.0),
            Unit::MmHg => lin(1.333_223_874_15),
            Unit::MilePerHour | Unit::MilePerHour2 => lin(0.447_04),
            Unit::KmPerHour | Unit::KmPerHour2 => lin(1.0 / 3.6),
            Unit::Knot | Unit::Knot2 => lin(1852.0 / 3600.0),
            Unit::Inch | Unit::InchPerHour => lin(25.4),
            Unit::Cm | Unit::CmPerHour => lin(10.0),
            Unit::Foot => lin(0.3048),
            Unit::Mile => lin(1.609_344),
            Unit::Second => lin(1.0 / 60.0),
            Unit::Hour => lin(60.0),
            _ => lin(1.0),
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Unit {
    type Err = UnitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Unit::ALL
            .iter()
            .copied()
            .find(|unit| unit.name() == trimmed)
            .ok_or_else(|| UnitError::UnknownUnit(trimmed.to_string()))
    }
}

impl TryFrom<String> for Unit {
    type Error = UnitError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Unit> for String {
    fn from(unit: Unit) -> Self {
        unit.name().to_string()
    }
}

/// Converts `value` from `from` to `to`.
///
/// Identity when the units are equal. Units of different groups are rejected;
/// callers validate override units at startup so this only fails for
/// observations whose group is not known ahead of time.
pub fn convert(value: f64, from: Unit, to: Unit) -> Result<f64, UnitError> {
    if from == to {
        return Ok(value);
    }
    ensure_compatible(from, to)?;

    let source = from.to_base();
    let target = to.to_base();
    let base = value * source.scale + source.offset;
    Ok((base - target.offset) / target.scale)
}

pub fn ensure_compatible(from: Unit, to: Unit) -> Result<(), UnitError> {
    let (from_group, to_group) = (from.group(), to.group());
    if from_group != to_group {
        return Err(UnitError::IncompatibleUnits {
            from,
            from_group,
            to,
            to_group,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_every_unit_name_parses_back() {
        for unit in Unit::ALL {
            assert_eq!(unit.name().parse::<Unit>().unwrap(), unit);
        }
    }

    #[test]
    fn test_temperature_offsets() {
        assert!(close(convert(32.0, Unit::DegreeF, Unit::DegreeC).unwrap(), 0.0));
        assert!(close(convert(100.0, Unit::DegreeC, Unit::DegreeF).unwrap(), 212.0));
        assert!(close(convert(0.0, Unit::DegreeC, Unit::DegreeK).unwrap(), 273.15));
    }

    #[test]
    fn test_label_reductions() {
        assert_eq!(Unit::DegreeF.label(), Some("F"));
        assert_eq!(Unit::MeterPerSecond2.label(), Some("mps"));
        assert_eq!(Unit::Percent.label(), None);
        assert_eq!(Unit::InHg.label(), Some("inHg"));
    }
}
