//! Per-observation include/rename/convert/format decisions.

use super::format::{FormatError, FormatSpec};
use crate::protocol::has_line_break;
use crate::units::{Unit, UnitError, UnitSystem, observation_group};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Observations skipped by [`InclusionPolicy::Most`] unless listed in the
/// inputs table. Housekeeping and hardware-status fields that change rarely
/// and are rarely charted.
pub const MOST_DENY_LIST: &[&str] = &[
    "interval",
    "rxCheckPercent",
    "txBatteryStatus",
    "windBatteryStatus",
    "rainBatteryStatus",
    "outTempBatteryStatus",
    "inTempBatteryStatus",
    "consBatteryVoltage",
    "heatingVoltage",
    "supplyVoltage",
    "referenceVoltage",
    "signal1",
    "signal2",
];

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MapperError {
    #[error("Observation '{name}': {source}")]
    Units {
        name: String,
        #[source]
        source: UnitError,
    },
    #[error("Observation '{name}': {source}")]
    Format {
        name: String,
        #[source]
        source: FormatError,
    },
    #[error("Observation '{name}': field name {target:?} contains a line break")]
    InvalidName { name: String, target: String },
    #[error("Observations '{first}' and '{second}' both upload as '{target}'")]
    NameCollision {
        target: String,
        first: String,
        second: String,
    },
}

/// `obs_to_upload` as configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObsToUpload {
    #[default]
    All,
    Most,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InclusionPolicy {
    All,
    Most,
    None,
    /// Only observations named in the inputs table.
    ExplicitList,
}

impl InclusionPolicy {
    /// `none` with a non-empty inputs table means "upload exactly the inputs".
    pub fn from_config(obs_to_upload: ObsToUpload, has_inputs: bool) -> Self {
        match (obs_to_upload, has_inputs) {
            (ObsToUpload::All, _) => InclusionPolicy::All,
            (ObsToUpload::Most, _) => InclusionPolicy::Most,
            (ObsToUpload::None, true) => InclusionPolicy::ExplicitList,
            (ObsToUpload::None, false) => InclusionPolicy::None,
        }
    }
}

/// One `[inputs.<name>]` entry of the configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ObservationSpec {
    #[serde(default)]
    pub units: Option<Unit>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
}

#[derive(Debug, Clone)]
struct CompiledSpec {
    unit: Option<Unit>,
    name: Option<String>,
    format: Option<FormatSpec>,
}

/// What to do with one observation.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedObservation {
    pub target_name: String,
    /// `None` leaves the value in the record's native unit.
    pub target_unit: Option<Unit>,
    pub format: FormatSpec,
}

#[derive(Debug, Clone)]
pub struct ObservationMapper {
    policy: InclusionPolicy,
    append_units_label: bool,
    overrides: BTreeMap<String, CompiledSpec>,
}

impl ObservationMapper {
    /// Compiles the inputs table, rejecting unparseable formats and override
    /// units whose group does not match the observation's known group.
    pub fn new(
        obs_to_upload: ObsToUpload,
        append_units_label: bool,
        inputs: &BTreeMap<String, ObservationSpec>,
    ) -> Result<Self, MapperError> {
        let mut overrides = BTreeMap::new();
        for (name, spec) in inputs {
            if let (Some(unit), Some(group)) = (spec.units, observation_group(name)) {
                // Any system works here; only the group is compared.
                let native = UnitSystem::Us.standard_unit(group);
                crate::units::ensure_compatible(native, unit).map_err(|source| {
                    MapperError::Units {
                        name: name.clone(),
                        source,
                    }
                })?;
            }
            let format = spec
                .format
                .as_deref()
                .map(FormatSpec::parse)
                .transpose()
                .map_err(|source| MapperError::Format {
                    name: name.clone(),
                    source,
                })?;
            overrides.insert(
                name.clone(),
                CompiledSpec {
                    unit: spec.units,
                    name: spec.name.clone(),
                    format,
                },
            );
        }

        let mapper = Self {
            policy: InclusionPolicy::from_config(obs_to_upload, !inputs.is_empty()),
            append_units_label,
            overrides,
        };
        mapper.check_target_names()?;
        Ok(mapper)
    }

    /// Two listed observations must never resolve to the same field name.
    /// Names without an explicit override are checked under every unit
    /// system, since the appended label depends on the record's system.
    fn check_target_names(&self) -> Result<(), MapperError> {
        let mut claimed: BTreeMap<String, &str> = BTreeMap::new();
        for (name, spec) in &self.overrides {
            let Some(target) = &spec.name else {
                continue;
            };
            if has_line_break(target) {
                return Err(MapperError::InvalidName {
                    name: name.clone(),
                    target: target.clone(),
                });
            }
            if let Some(first) = claimed.insert(target.clone(), name) {
                return Err(MapperError::NameCollision {
                    target: target.clone(),
                    first: first.to_string(),
                    second: name.clone(),
                });
            }
        }

        for (name, spec) in self.overrides.iter().filter(|(_, spec)| spec.name.is_none()) {
            for system in [UnitSystem::Us, UnitSystem::Metric, UnitSystem::MetricWx] {
                let target = self.default_name(name, spec.unit.or(system.unit_for(name)));
                if let Some(first) = claimed.get(&target) {
                    return Err(MapperError::NameCollision {
                        target,
                        first: first.to_string(),
                        second: name.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn policy(&self) -> InclusionPolicy {
        self.policy
    }

    pub fn is_listed(&self, name: &str) -> bool {
        self.overrides.contains_key(name)
    }

    /// Decides whether `name` is uploaded and how.
    ///
    /// `native_unit` is the unit the value is currently expressed in, if the
    /// observation's group is known.
    pub fn resolve(&self, name: &str, native_unit: Option<Unit>) -> Option<ResolvedObservation> {
        let listed = self.overrides.get(name);
        let included = match self.policy {
            InclusionPolicy::All => true,
            InclusionPolicy::Most => listed.is_some() || !MOST_DENY_LIST.contains(&name),
            InclusionPolicy::None | InclusionPolicy::ExplicitList => listed.is_some(),
        };
        if !included {
            return None;
        }

        let target_unit = listed.and_then(|spec| spec.unit);
        let target_name = match listed.and_then(|spec| spec.name.clone()) {
            Some(explicit) => explicit,
            None => self.default_name(name, target_unit.or(native_unit)),
        };
        let format = listed
            .and_then(|spec| spec.format.clone())
            .unwrap_or_default();

        Some(ResolvedObservation {
            target_name,
            target_unit,
            format,
        })
    }

    fn default_name(&self, name: &str, unit: Option<Unit>) -> String {
        match unit.and_then(Unit::label) {
            Some(label) if self.append_units_label => format!("{name}_{label}"),
            _ => name.to_string(),
        }
    }
}
