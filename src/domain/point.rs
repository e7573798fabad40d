use crate::protocol::has_line_break;
use std::collections::BTreeMap;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TagParseError {
    #[error("Tag '{0}' is not of the form key=value")]
    MissingSeparator(String),
    #[error("Tag '{0}' has an empty key")]
    EmptyKey(String),
    #[error("Tag {0:?} contains a line break")]
    LineBreak(String),
}

/// Why a field could not be added to a point.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    #[error("Field '{0}' is already set on this point")]
    Duplicate(String),
    #[error("Field name {0:?} contains a line break")]
    LineBreak(String),
}

/// Tags attached to every point. Backed by a `BTreeMap`, so iteration is
/// always lexicographic by key regardless of insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagSet(BTreeMap<String, String>);

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Inserts only when the key is not already present.
    pub fn insert_default(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.entry(key.into()).or_insert_with(|| value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<BTreeMap<String, String>> for TagSet {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for TagSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Parses the `station=A,field=C` form used on the command line.
impl FromStr for TagSet {
    type Err = TagParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut tags = TagSet::new();
        for pair in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| TagParseError::MissingSeparator(pair.to_string()))?;
            let key = key.trim();
            if key.is_empty() {
                return Err(TagParseError::EmptyKey(pair.to_string()));
            }
            if has_line_break(pair) {
                return Err(TagParseError::LineBreak(pair.to_string()));
            }
            tags.insert(key, value.trim());
        }
        Ok(tags)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Already formatted number, written unquoted.
    Number(String),
    /// Free text, written double-quoted.
    Text(String),
}

impl FieldValue {
    pub fn as_str(&self) -> &str {
        match self {
            FieldValue::Number(s) | FieldValue::Text(s) => s,
        }
    }
}

/// A transformed record, ready for serialization.
#[derive(Debug, Clone, PartialEq)]
pub struct FormattedPoint {
    pub measurement: String,
    pub tags: TagSet,
    fields: Vec<(String, FieldValue)>,
    pub timestamp_ns: i64,
}

impl FormattedPoint {
    pub fn new(measurement: impl Into<String>, tags: TagSet, timestamp_ns: i64) -> Self {
        Self {
            measurement: measurement.into(),
            tags,
            fields: Vec::new(),
            timestamp_ns,
        }
    }

    /// Appends a field. The first value written under a name is kept; a
    /// second one is refused rather than silently replacing it.
    pub fn push_field(
        &mut self,
        name: impl Into<String>,
        value: FieldValue,
    ) -> Result<(), FieldError> {
        let name = name.into();
        if has_line_break(&name) {
            return Err(FieldError::LineBreak(name));
        }
        if self.field(&name).is_some() {
            return Err(FieldError::Duplicate(name));
        }
        self.fields.push((name, value));
        Ok(())
    }

    pub fn fields(&self) -> &[(String, FieldValue)] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value)
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_string_parsing() {
        let tags: TagSet = "station=A, field=C".parse().unwrap();
        assert_eq!(tags.get("station"), Some("A"));
        assert_eq!(tags.get("field"), Some("C"));
        assert!("station".parse::<TagSet>().is_err());
        assert!("=A".parse::<TagSet>().is_err());
        assert_eq!(
            "station=A\nB".parse::<TagSet>(),
            Err(TagParseError::LineBreak("station=A\nB".to_string()))
        );
    }

    #[test]
    fn test_duplicate_field_keeps_first_value() {
        let mut point = FormattedPoint::new("m", TagSet::new(), 0);
        point.push_field("a", FieldValue::Number("1".into())).unwrap();
        point.push_field("b", FieldValue::Number("2".into())).unwrap();
        let err = point.push_field("a", FieldValue::Number("3".into())).unwrap_err();

        assert_eq!(err, FieldError::Duplicate("a".to_string()));
        assert_eq!(point.field_count(), 2);
        assert_eq!(point.fields()[0].1, FieldValue::Number("1".into()));
    }

    #[test]
    fn test_field_name_with_line_break_refused() {
        let mut point = FormattedPoint::new("m", TagSet::new(), 0);
        let err = point.push_field("out\nTemp", FieldValue::Number("1".into())).unwrap_err();
        assert!(matches!(err, FieldError::LineBreak(_)));
        assert!(point.is_empty());
    }
}
