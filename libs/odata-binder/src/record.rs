//! Output records produced by projection.

use indexmap::IndexMap;
use indexmap::map::Iter;
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::value::Value;

#[derive(Clone, Debug, PartialEq)]
pub enum RecordValue {
    Scalar(Value),
    Record(ODataRecord),
}

impl RecordValue {
    #[must_use]
    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            RecordValue::Scalar(v) => Some(v),
            RecordValue::Record(_) => None,
        }
    }

    #[must_use]
    pub fn as_record(&self) -> Option<&ODataRecord> {
        match self {
            RecordValue::Record(r) => Some(r),
            RecordValue::Scalar(_) => None,
        }
    }
}

impl From<Value> for RecordValue {
    fn from(v: Value) -> Self {
        RecordValue::Scalar(v)
    }
}

impl From<ODataRecord> for RecordValue {
    fn from(r: ODataRecord) -> Self {
        RecordValue::Record(r)
    }
}

impl Serialize for RecordValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            RecordValue::Scalar(v) => v.serialize(serializer),
            RecordValue::Record(r) => r.serialize(serializer),
        }
    }
}

/// Ordered key → value map. Keys keep insertion order; equality ignores it.
#[derive(Clone, Debug, Default, PartialEq)]
#[must_use]
pub struct ODataRecord {
    fields: IndexMap<String, RecordValue>,
}

impl ODataRecord {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.fields.keys().map(String::as_str)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&RecordValue> {
        self.fields.get(key)
    }

    /// Scalar under `key`, `None` if absent or nested.
    #[must_use]
    pub fn scalar(&self, key: &str) -> Option<&Value> {
        self.get(key).and_then(RecordValue::as_scalar)
    }

    /// Nested record under `key`, `None` if absent or scalar.
    #[must_use]
    pub fn record(&self, key: &str) -> Option<&ODataRecord> {
        self.get(key).and_then(RecordValue::as_record)
    }

    /// Insert or replace; a replaced key keeps its position.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<RecordValue>,
    ) -> Option<RecordValue> {
        self.fields.insert(key.into(), value.into())
    }

    pub fn iter(&self) -> Iter<'_, String, RecordValue> {
        self.fields.iter()
    }

    /// # Errors
    /// Returns the serializer error for values JSON cannot represent.
    pub fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

impl<'a> IntoIterator for &'a ODataRecord {
    type Item = (&'a String, &'a RecordValue);
    type IntoIter = Iter<'a, String, RecordValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

impl Serialize for ODataRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (k, v) in &self.fields {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}
