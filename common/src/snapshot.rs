//! The measurement snapshot published once per sampling cycle.

use serde::ser::{Serialize, SerializeMap, Serializer};

/// Name of the field every snapshot carries.
pub const TIMESTAMP_FIELD: &str = "timestamp";

/// A single sensor value. Serialized as a bare JSON number or string.
#[derive(serde::Serialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum FieldValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<u16> for FieldValue {
    fn from(value: u16) -> Self {
        Self::Integer(value.into())
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// One complete, immutable set of sensor fields plus the time it was taken.
///
/// Fields keep the order in which they were inserted. There is no way to
/// mutate a snapshot once built, so a shared `Arc<Snapshot>` is always
/// internally consistent.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Snapshot {
    fields: Vec<(String, FieldValue)>,
    timestamp: i64,
}

impl Snapshot {
    /// Looks up a field by name. `timestamp` is not a field, use [`Snapshot::timestamp`].
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find_map(|(key, value)| (key == name).then_some(value))
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Unix timestamp in seconds.
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Number of sensor fields, not counting the timestamp.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True when no sensor contributed to this snapshot.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Serializes the snapshot as one JSON object terminated by a newline.
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

impl Serialize for Snapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len() + 1))?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        map.serialize_entry(TIMESTAMP_FIELD, &self.timestamp)?;
        map.end()
    }
}

/// The working snapshot of a sampling cycle.
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    fields: Vec<(String, FieldValue)>,
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field, replacing the value of an existing field with the same name.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> &mut Self {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(key, _)| *key == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name, value)),
        }
        self
    }

    /// Stamps the working snapshot and freezes it.
    pub fn finish(mut self, timestamp: i64) -> Snapshot {
        self.fields.retain(|(key, _)| key != TIMESTAMP_FIELD);
        Snapshot {
            fields: self.fields,
            timestamp,
        }
    }
}
