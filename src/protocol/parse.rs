//! Reader for the lines this crate writes. Used to check that formatting is
//! lossless; it accepts the subset of line protocol the formatter produces
//! plus integer and boolean field values.

use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Empty line")]
    Empty,
    #[error("Line has no field set: {0}")]
    MissingFields(String),
    #[error("Invalid tag: {0}")]
    InvalidTag(String),
    #[error("Invalid field: {0}")]
    InvalidField(String),
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),
    #[error("Unterminated string field value")]
    UnterminatedString,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParsedValue {
    Float(f64),
    Integer(i64),
    Boolean(bool),
    Text(String),
}

impl ParsedValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParsedValue::Float(v) => Some(*v),
            ParsedValue::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedLine {
    pub measurement: String,
    pub tags: BTreeMap<String, String>,
    pub fields: Vec<(String, ParsedValue)>,
    pub timestamp: Option<i64>,
}

impl ParsedLine {
    pub fn field(&self, name: &str) -> Option<&ParsedValue> {
        self.fields.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }
}

pub fn parse_line(line: &str) -> Result<ParsedLine, ParseError> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return Err(ParseError::Empty);
    }

    let sections = split_unescaped(line, b' ', true)?;
    let (series, fields, timestamp) = match sections.as_slice() {
        [series, fields] => (*series, *fields, None),
        [series, fields, ts] => (*series, *fields, Some(*ts)),
        [_] => return Err(ParseError::MissingFields(line.to_string())),
        _ => return Err(ParseError::InvalidTimestamp(line.to_string())),
    };

    let mut series_parts = split_unescaped(series, b',', false)?.into_iter();
    let measurement = unescape(series_parts.next().unwrap_or_default());
    let mut tags = BTreeMap::new();
    for raw in series_parts {
        let (key, value) = split_pair(raw).ok_or_else(|| ParseError::InvalidTag(raw.to_string()))?;
        tags.insert(unescape(key), unescape(value));
    }

    let mut parsed_fields = Vec::new();
    for raw in split_unescaped(fields, b',', true)? {
        let (key, value) =
            split_pair(raw).ok_or_else(|| ParseError::InvalidField(raw.to_string()))?;
        parsed_fields.push((unescape(key), parse_value(value)?));
    }
    if parsed_fields.is_empty() {
        return Err(ParseError::MissingFields(line.to_string()));
    }

    let timestamp = timestamp
        .map(|ts| {
            ts.parse::<i64>()
                .map_err(|_| ParseError::InvalidTimestamp(ts.to_string()))
        })
        .transpose()?;

    Ok(ParsedLine {
        measurement,
        tags,
        fields: parsed_fields,
        timestamp,
    })
}

fn parse_value(raw: &str) -> Result<ParsedValue, ParseError> {
    if let Some(inner) = raw.strip_prefix('"') {
        let inner = inner
            .strip_suffix('"')
            .ok_or(ParseError::UnterminatedString)?;
        return Ok(ParsedValue::Text(unescape(inner)));
    }
    match raw {
        "t" | "T" | "true" | "True" | "TRUE" => return Ok(ParsedValue::Boolean(true)),
        "f" | "F" | "false" | "False" | "FALSE" => return Ok(ParsedValue::Boolean(false)),
        _ => {}
    }
    if let Some(int) = raw.strip_suffix('i') {
        return int
            .parse()
            .map(ParsedValue::Integer)
            .map_err(|_| ParseError::InvalidField(raw.to_string()));
    }
    raw.parse()
        .map(ParsedValue::Float)
        .map_err(|_| ParseError::InvalidField(raw.to_string()))
}

/// Splits on `sep` where it is not backslash-escaped and, when
/// `respect_quotes` is set, not inside a double-quoted string.
fn split_unescaped(s: &str, sep: u8, respect_quotes: bool) -> Result<Vec<&str>, ParseError> {
    let bytes = s.as_bytes();
    let mut parts = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => {
                i += 2;
                continue;
            }
            b'"' if respect_quotes => in_quotes = !in_quotes,
            b if b == sep && !in_quotes => {
                parts.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    if in_quotes {
        return Err(ParseError::UnterminatedString);
    }
    parts.push(&s[start.min(s.len())..]);
    Ok(parts)
}

fn split_pair(raw: &str) -> Option<(&str, &str)> {
    let bytes = raw.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'=' => return Some((&raw[..i], &raw[i + 1..])).filter(|(k, _)| !k.is_empty()),
            _ => i += 1,
        }
    }
    None
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(&next) = chars.peek() {
                if matches!(next, ',' | '=' | ' ' | '"' | '\\') {
                    out.push(next);
                    chars.next();
                    continue;
                }
            }
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_escaped_series() {
        let line = r#"wx\ data,site\=id=north\,1 temp=72.5,note="a \"b\", c" 1700000000000000000"#;
        let parsed = parse_line(line).unwrap();
        assert_eq!(parsed.measurement, "wx data");
        assert_eq!(parsed.tags.get("site=id").map(String::as_str), Some("north,1"));
        assert_eq!(parsed.field("temp"), Some(&ParsedValue::Float(72.5)));
        assert_eq!(
            parsed.field("note"),
            Some(&ParsedValue::Text("a \"b\", c".to_string()))
        );
        assert_eq!(parsed.timestamp, Some(1_700_000_000_000_000_000));
    }

    #[test]
    fn test_parse_integer_and_boolean() {
        let parsed = parse_line("m count=3i,ok=t").unwrap();
        assert_eq!(parsed.field("count"), Some(&ParsedValue::Integer(3)));
        assert_eq!(parsed.field("ok"), Some(&ParsedValue::Boolean(true)));
        assert_eq!(parsed.timestamp, None);
    }

    #[test]
    fn test_rejects_malformed() {
        assert_eq!(parse_line("   "), Err(ParseError::Empty));
        assert!(matches!(parse_line("m"), Err(ParseError::MissingFields(_))));
        assert!(matches!(parse_line("m,novalue x=1"), Err(ParseError::InvalidTag(_))));
        assert!(matches!(parse_line("m x=1 notanumber"), Err(ParseError::InvalidTimestamp(_))));
        assert_eq!(parse_line(r#"m x="open"#), Err(ParseError::UnterminatedString));
    }
}
