use super::augment::augment_record;
use super::format::FormatError;
use super::mapper::{ObservationMapper, ResolvedObservation};
use crate::domain::{Binding, FieldError, FieldValue, FormattedPoint, Record, TagSet};
use crate::units::{Unit, UnitError, UnitSystem, convert};
use thiserror::Error;
use tracing::{debug, warn};

/// Tag key carrying the record's binding.
pub const BINDING_TAG: &str = "binding";

/// Failure to produce one field. Never aborts the rest of the record.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    #[error("Observation '{name}': cannot convert to {target}: native unit unknown")]
    UnknownNativeUnit { name: String, target: Unit },
    #[error("Observation '{name}': {source}")]
    Conversion {
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
    #[error("Observation {name:?}: {source}")]
    Field {
        name: String,
        #[source]
        source: FieldError,
    },
}

#[derive(Debug, Clone)]
pub struct RecordTransformer {
    mapper: ObservationMapper,
    measurement: String,
    tags: TagSet,
    unit_system: Option<UnitSystem>,
    augment: bool,
}

impl RecordTransformer {
    pub fn new(
        mapper: ObservationMapper,
        measurement: impl Into<String>,
        tags: TagSet,
        unit_system: Option<UnitSystem>,
        augment: bool,
    ) -> Self {
        Self {
            mapper,
            measurement: measurement.into(),
            tags,
            unit_system,
            augment,
        }
    }

    pub fn mapper(&self) -> &ObservationMapper {
        &self.mapper
    }

    /// Maps every present observation of `record` into a field, in record
    /// order. The point may come back empty; callers skip empty points.
    pub fn transform(&self, record: &Record, binding: Binding) -> FormattedPoint {
        let augmented;
        let record = if self.augment {
            augmented = augment_record(record);
            &augmented
        } else {
            record
        };

        let mut tags = self.tags.clone();
        tags.insert_default(BINDING_TAG, binding.as_str());
        let mut point =
            FormattedPoint::new(&self.measurement, tags, record.timestamp().as_nanos());

        for (name, value) in record.iter() {
            let Some(value) = value else {
                continue;
            };
            let source_system = record.unit_system();
            let Some((native_value, native_unit)) = self.coerce(name, value, source_system) else {
                continue;
            };
            let Some(resolved) = self.mapper.resolve(name, native_unit) else {
                debug!(observation = name, "excluded by inclusion policy");
                continue;
            };

            let pushed = render(name, native_value, native_unit, &resolved).and_then(|formatted| {
                point
                    .push_field(resolved.target_name, FieldValue::Number(formatted))
                    .map_err(|source| TransformError::Field {
                        name: name.to_string(),
                        source,
                    })
            });
            if let Err(e) = pushed {
                warn!(binding = %binding, "Skipping field: {}", e);
            }
        }

        point
    }

    /// Moves a value from the record's unit system into the configured
    /// override system, if any. Observations with no known group pass
    /// through with an unknown unit.
    fn coerce(&self, name: &str, value: f64, source: UnitSystem) -> Option<(f64, Option<Unit>)> {
        let from = source.unit_for(name);
        let Some(target_system) = self.unit_system else {
            return Some((value, from));
        };
        let to = target_system.unit_for(name);
        match (from, to) {
            (Some(from), Some(to)) => match convert(value, from, to) {
                Ok(converted) => Some((converted, Some(to))),
                Err(e) => {
                    warn!("Skipping field '{}' during unit system coercion: {}", name, e);
                    None
                }
            },
            _ => Some((value, from)),
        }
    }
}

fn render(
    name: &str,
    value: f64,
    native_unit: Option<Unit>,
    resolved: &ResolvedObservation,
) -> Result<String, TransformError> {
    let value = match (resolved.target_unit, native_unit) {
        (None, _) => value,
        (Some(target), Some(native)) => {
            convert(value, native, target).map_err(|source| TransformError::Conversion {
                name: name.to_string(),
                source,
            })?
        }
        (Some(target), None) => {
            return Err(TransformError::UnknownNativeUnit {
                name: name.to_string(),
                target,
            });
        }
    };

    resolved
        .format
        .apply(value)
        .map_err(|source| TransformError::Format {
            name: name.to_string(),
            source,
        })
}
