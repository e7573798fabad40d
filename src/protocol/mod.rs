//! Line protocol serialization of [`FormattedPoint`]s.

pub mod escape;
pub mod parse;

pub use escape::{escape_key, escape_measurement, has_line_break, quote_string_field};
pub use parse::{ParseError, ParsedLine, ParsedValue, parse_line};

use crate::domain::{FieldValue, FormattedPoint, TagSet};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Layout of the lines written for one point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LineFormat {
    /// `measurement,tags f1=v1,f2=v2 ts`
    #[default]
    SingleLine,
    /// `field,tags value=v ts`, one line per field
    MultiLine,
    /// `measurement.field,tags value=v ts`, one line per field
    MultiLineDotted,
}

impl LineFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineFormat::SingleLine => "single-line",
            LineFormat::MultiLine => "multi-line",
            LineFormat::MultiLineDotted => "multi-line-dotted",
        }
    }
}

impl fmt::Display for LineFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const VALUE_FIELD: &str = "value";

#[derive(Debug, Clone, Copy, Default)]
pub struct LineProtocolFormatter {
    format: LineFormat,
}

impl LineProtocolFormatter {
    pub fn new(format: LineFormat) -> Self {
        Self { format }
    }

    pub fn line_format(&self) -> LineFormat {
        self.format
    }

    /// Serializes one point; `None` when it has no fields.
    pub fn format(&self, point: &FormattedPoint) -> Option<String> {
        if point.is_empty() {
            return None;
        }

        let tags = tag_suffix(&point.tags);
        let ts = point.timestamp_ns;

        let body = match self.format {
            LineFormat::SingleLine => {
                let fields = point
                    .fields()
                    .iter()
                    .map(|(name, value)| format!("{}={}", escape_key(name), field_value(value)))
                    .collect::<Vec<_>>()
                    .join(",");
                format!("{}{} {} {}", escape_measurement(&point.measurement), tags, fields, ts)
            }
            LineFormat::MultiLine | LineFormat::MultiLineDotted => point
                .fields()
                .iter()
                .map(|(name, value)| {
                    let series = match self.format {
                        LineFormat::MultiLineDotted => format!("{}.{}", point.measurement, name),
                        _ => name.clone(),
                    };
                    format!(
                        "{}{} {}={} {}",
                        escape_measurement(&series),
                        tags,
                        VALUE_FIELD,
                        field_value(value),
                        ts
                    )
                })
                .collect::<Vec<_>>()
                .join("\n"),
        };

        Some(body)
    }

    /// Newline-joins every non-empty point. `None` when nothing is left.
    pub fn format_batch<'a>(
        &self,
        points: impl IntoIterator<Item = &'a FormattedPoint>,
    ) -> Option<String> {
        let lines: Vec<String> = points.into_iter().filter_map(|p| self.format(p)).collect();
        if lines.is_empty() {
            None
        } else {
            Some(lines.join("\n"))
        }
    }
}

// Tag sets iterate sorted by key. Empty values are not representable and are
// left out.
fn tag_suffix(tags: &TagSet) -> String {
    let mut out = String::new();
    for (key, value) in tags.iter().filter(|(_, v)| !v.is_empty()) {
        out.push(',');
        out.push_str(&escape_key(key));
        out.push('=');
        out.push_str(&escape_key(value));
    }
    out
}

fn field_value(value: &FieldValue) -> String {
    match value {
        // Width padding from the format spec must not leak into the line.
        FieldValue::Number(n) => n.trim().to_string(),
        FieldValue::Text(s) => quote_string_field(s),
    }
}
