use super::{Unit, UnitError, UnitGroup};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Unit system a record is expressed in, mirroring the station's `usUnits`
/// codes (US = 1, METRIC = 16, METRICWX = 17).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
pub enum UnitSystem {
    #[serde(rename = "US", alias = "us")]
    #[value(name = "US", alias = "us")]
    Us,
    #[serde(rename = "METRIC", alias = "metric")]
    #[value(name = "METRIC", alias = "metric")]
    Metric,
    #[serde(rename = "METRICWX", alias = "metricwx")]
    #[value(name = "METRICWX", alias = "metricwx")]
    MetricWx,
}

impl UnitSystem {
    pub fn from_code(code: i64) -> Result<Self, UnitError> {
        match code {
            1 => Ok(UnitSystem::Us),
            16 => Ok(UnitSystem::Metric),
            17 => Ok(UnitSystem::MetricWx),
            other => Err(UnitError::UnknownSystem(other)),
        }
    }

    pub fn code(self) -> i64 {
        match self {
            UnitSystem::Us => 1,
            UnitSystem::Metric => 16,
            UnitSystem::MetricWx => 17,
        }
    }

    /// The unit this system uses for every observation of `group`.
    pub fn standard_unit(self, group: UnitGroup) -> Unit {
        use UnitSystem::{Metric, MetricWx, Us};
        match (group, self) {
            (UnitGroup::Temperature, Us) => Unit::DegreeF,
            (UnitGroup::Temperature, Metric | MetricWx) => Unit::DegreeC,
            (UnitGroup::Pressure, Us) => Unit::InHg,
            (UnitGroup::Pressure, Metric | MetricWx) => Unit::Mbar,
            (UnitGroup::Speed, Us) => Unit::MilePerHour,
            (UnitGroup::Speed, Metric) => Unit::KmPerHour,
            (UnitGroup::Speed, MetricWx) => Unit::MeterPerSecond,
            (UnitGroup::Speed2, Us) => Unit::MilePerHour2,
            (UnitGroup::Speed2, Metric) => Unit::KmPerHour2,
            (UnitGroup::Speed2, MetricWx) => Unit::MeterPerSecond2,
            (UnitGroup::Rain, Us) => Unit::Inch,
            (UnitGroup::Rain, Metric) => Unit::Cm,
            (UnitGroup::Rain, MetricWx) => Unit::Mm,
            (UnitGroup::RainRate, Us) => Unit::InchPerHour,
            (UnitGroup::RainRate, Metric) => Unit::CmPerHour,
            (UnitGroup::RainRate, MetricWx) => Unit::MmPerHour,
            (UnitGroup::Altitude, Us) => Unit::Foot,
            (UnitGroup::Altitude, Metric | MetricWx) => Unit::Meter,
            (UnitGroup::Distance, Us) => Unit::Mile,
            (UnitGroup::Distance, Metric | MetricWx) => Unit::Km,
            (UnitGroup::Percent, _) => Unit::Percent,
            (UnitGroup::Direction, _) => Unit::DegreeCompass,
            (UnitGroup::Radiation, _) => Unit::WattPerMeterSquared,
            (UnitGroup::Uv, _) => Unit::UvIndex,
            (UnitGroup::Volt, _) => Unit::Volt,
            (UnitGroup::Time, _) => Unit::UnixEpoch,
            (UnitGroup::Interval, _) => Unit::Minute,
            (UnitGroup::Moisture, _) => Unit::Centibar,
            (UnitGroup::Count, _) => Unit::Count,
        }
    }

    /// Native unit of the named observation in this system, if the
    /// observation belongs to a known group.
    pub fn unit_for(self, observation: &str) -> Option<Unit> {
        observation_group(observation).map(|group| self.standard_unit(group))
    }
}

/// Unit group of a station observation name.
pub fn observation_group(name: &str) -> Option<UnitGroup> {
    let group = match name {
        "outTemp" | "inTemp" | "dewpoint" | "inDewpoint" | "heatindex" | "windchill"
        | "appTemp" | "humidex" => UnitGroup::Temperature,
        "barometer" | "pressure" | "altimeter" => UnitGroup::Pressure,
        "windSpeed" | "windGust" | "windSpeed10" => UnitGroup::Speed,
        "rms" | "vecavg" => UnitGroup::Speed2,
        "windDir" | "windGustDir" | "vecdir" => UnitGroup::Direction,
        "rain" | "ET" | "hail" | "snow" | "dayRain" | "stormRain" => UnitGroup::Rain,
        "rainRate" | "hailRate" | "snowRate" => UnitGroup::RainRate,
        "outHumidity" | "inHumidity" | "extraHumid1" | "extraHumid2" | "extraHumid3"
        | "rxCheckPercent" | "cloudcover" => UnitGroup::Percent,
        "radiation" | "maxSolarRad" => UnitGroup::Radiation,
        "UV" => UnitGroup::Uv,
        "consBatteryVoltage" | "heatingVoltage" | "supplyVoltage" | "referenceVoltage" => {
            UnitGroup::Volt
        }
        "dateTime" | "sunrise" | "sunset" => UnitGroup::Time,
        "interval" => UnitGroup::Interval,
        "altitude" | "cloudbase" => UnitGroup::Altitude,
        "windrun" => UnitGroup::Distance,
        "lightning_strike_count" => UnitGroup::Count,
        _ => return prefixed_group(name),
    };
    Some(group)
}

// Numbered sensor families: extraTemp1, soilTemp4, leafWet2, soilMoist3 ...
fn prefixed_group(name: &str) -> Option<UnitGroup> {
    const FAMILIES: [(&str, UnitGroup); 5] = [
        ("extraTemp", UnitGroup::Temperature),
        ("soilTemp", UnitGroup::Temperature),
        ("leafTemp", UnitGroup::Temperature),
        ("soilMoist", UnitGroup::Moisture),
        ("leafWet", UnitGroup::Count),
    ];

    FAMILIES.iter().find_map(|(prefix, group)| {
        let suffix = name.strip_prefix(prefix)?;
        (!suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit())).then_some(*group)
    })
}
