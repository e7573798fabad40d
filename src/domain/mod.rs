//! Domain layer for wx-influx-forwarder.
//!
//! Contains the canonical types shared across all modules:
//! - `Record`: one observation cycle handed in by the station
//! - `Binding`: loop or archive cadence
//! - `FormattedPoint` / `TagSet` / `FieldValue`: transformed output ready for
//!   line protocol serialization

pub mod point;
pub mod record;

pub use point::{FieldError, FieldValue, FormattedPoint, TagParseError, TagSet};
pub use record::{Binding, Record, Timestamp};
