use std::fmt::{Debug, Display, Formatter};
use std::ops::Deref;

use crate::error::ValidationError;

#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn size(&self) -> usize {
        self.key.len() + self.value.len()
    }
}

impl Debug for Tag {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

/// Tags keeps the caller's insertion order; the row key builder sorts by resolved id.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Tags(Vec<Tag>);

impl Tags {
    pub fn new(tags: Vec<Tag>) -> Self {
        Self(tags)
    }

    pub fn size(&self) -> usize {
        self.0.iter().map(|x| x.size()).sum()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|t| t.key == key)
            .map(|t| t.value.as_str())
    }

    pub fn push(&mut self, tag: Tag) {
        self.0.push(tag);
    }

    /// series_string renders `metric{k=v,...}` with tags sorted by key, usable as a map key
    /// that is stable regardless of insertion order.
    pub fn series_string(&self, metric: &str) -> String {
        let mut sorted: Vec<&Tag> = self.0.iter().collect();
        sorted.sort_by(|a, b| a.key.cmp(&b.key));

        let mut s = String::with_capacity(metric.len() + 2 + self.size() + 2 * sorted.len());
        s.push_str(metric);
        s.push('{');
        for (i, tag) in sorted.iter().enumerate() {
            if i > 0 {
                s.push(',');
            }
            s.push_str(&tag.key);
            s.push('=');
            s.push_str(&tag.value);
        }
        s.push('}');
        s
    }
}

impl Deref for Tags {
    type Target = [Tag];

    fn deref(&self) -> &Self::Target {
        self.0.as_slice()
    }
}

impl Debug for Tags {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.0.iter()).finish()
    }
}

impl<K, V> FromIterator<(K, V)> for Tags
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| Tag::new(k, v)).collect())
    }
}

/// DataValue is the value of a single sample: a signed integer or a single-precision float.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DataValue {
    Integer(i64),
    Float(f32),
}

impl DataValue {
    pub fn is_integer(&self) -> bool {
        matches!(self, DataValue::Integer(_))
    }
}

impl Display for DataValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DataValue::Integer(v) => write!(f, "{}", v),
            DataValue::Float(v) => write!(f, "{}", v),
        }
    }
}

impl From<i64> for DataValue {
    fn from(v: i64) -> Self {
        DataValue::Integer(v)
    }
}

impl From<f32> for DataValue {
    fn from(v: f32) -> Self {
        DataValue::Float(v)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataPoint {
    pub metric: String,
    pub timestamp: i64,
    pub value: DataValue,
    pub tags: Tags,
}

/// looks_like_integer returns false when the textual value carries a decimal point or exponent.
pub fn looks_like_integer(value: &str) -> bool {
    !value.contains(&['.', 'e', 'E'][..])
}

/// parse_value parses the textual value of an import line.
pub fn parse_value(value: &str) -> Result<DataValue, ValidationError> {
    if looks_like_integer(value) {
        value
            .parse::<i64>()
            .map(DataValue::Integer)
            .map_err(|e| ValidationError::MalformedLine(format!("value \"{}\": {}", value, e)))
    } else {
        value
            .parse::<f32>()
            .map(DataValue::Float)
            .map_err(|e| ValidationError::MalformedLine(format!("value \"{}\": {}", value, e)))
    }
}

/// parse_import_line parses `metric timestamp value tagk=tagv ...`.
///
/// Blank lines and lines starting with `#` yield `Ok(None)`.
pub fn parse_import_line(line: &str) -> Result<Option<DataPoint>, ValidationError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let mut words = line.split_whitespace();
    let (metric, timestamp, value) = match (words.next(), words.next(), words.next()) {
        (Some(m), Some(t), Some(v)) => (m, t, v),
        _ => {
            return Err(ValidationError::MalformedLine(format!(
                "expected at least 3 fields: {}",
                line
            )))
        }
    };

    let timestamp = timestamp.parse::<i64>().map_err(|e| {
        ValidationError::MalformedLine(format!("timestamp \"{}\": {}", timestamp, e))
    })?;
    let value = parse_value(value)?;

    let mut tags = Tags::default();
    for word in words {
        match word.split_once('=') {
            Some((k, v)) if !k.is_empty() && !v.is_empty() => tags.push(Tag::new(k, v)),
            _ => return Err(ValidationError::MalformedTag(word.to_string())),
        }
    }

    Ok(Some(DataPoint {
        metric: metric.to_string(),
        timestamp,
        value,
        tags,
    }))
}
