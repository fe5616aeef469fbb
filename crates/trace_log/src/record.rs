//! The per-call log record and its structured fields.

use std::{
    borrow::Cow,
    collections::{BTreeMap, btree_map},
    fmt,
    panic::Location,
};

use serde_json::Value;
use time::UtcDateTime;

use crate::Severity;

/// Structured key-value data attached to a record.
///
/// Keys are unique: inserting an existing key overwrites its value. Iteration is sorted by key,
/// which keeps encoded output deterministic.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize)]
#[serde(transparent)]
pub struct Fields {
    values: BTreeMap<String, Value>,
}

impl Fields {
    /// Creates an empty set of fields.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a field, overwriting any previous value stored under `key`.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// Builder-style [`Fields::insert`].
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Inserts any serializable value.
    ///
    /// # Errors
    ///
    /// Returns the [`serde_json::Error`] if `value` cannot be represented as JSON (e.g. a map
    /// with non-string keys). The fields are left untouched in that case.
    pub fn try_insert<T>(&mut self, key: impl Into<String>, value: &T) -> Result<(), serde_json::Error>
    where
        T: serde::Serialize + ?Sized,
    {
        let value = serde_json::to_value(value)?;
        self.values.insert(key.into(), value);
        Ok(())
    }

    /// Moves every field of `other` into `self`; values from `other` win on conflicts.
    pub fn extend(&mut self, other: Self) {
        self.values.extend(other.values);
    }

    /// Returns the value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Whether a value is stored under `key`.
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether there are no fields.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates over the fields in key order.
    pub fn iter(&self) -> btree_map::Iter<'_, String, Value> {
        self.values.iter()
    }
}

impl<'a> IntoIterator for &'a Fields {
    type Item = (&'a String, &'a Value);
    type IntoIter = btree_map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}

impl<K, V> FromIterator<(K, V)> for Fields
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }
}

impl<K, V, const N: usize> From<[(K, V); N]> for Fields
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from(entries: [(K, V); N]) -> Self {
        entries.into_iter().collect()
    }
}

impl From<()> for Fields {
    fn from((): ()) -> Self {
        Self::default()
    }
}

/// Source location of a logging call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Caller {
    /// Source file path.
    pub file: &'static str,

    /// Line number within [`Caller::file`].
    pub line: u32,
}

impl From<&'static Location<'static>> for Caller {
    fn from(location: &'static Location<'static>) -> Self {
        Self {
            file: location.file(),
            line: location.line(),
        }
    }
}

impl fmt::Display for Caller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// A single log record, built per call and handed to an [`Encoder`](crate::Encoder).
#[derive(Clone, Debug)]
pub struct Record<'a> {
    /// When the logging call was made.
    pub timestamp: UtcDateTime,

    /// Severity of the record.
    pub severity: Severity,

    /// The rendered message.
    pub message: Cow<'a, str>,

    /// Structured fields, including trace fields when the call was correlated.
    pub fields: Fields,

    /// Location of the logging call, present only when caller capture is enabled.
    pub caller: Option<Caller>,

    /// Captured stack trace, present only when the record qualified for one.
    pub stacktrace: Option<String>,
}

impl<'a> Record<'a> {
    /// Creates a record stamped with the current time.
    pub fn new(severity: Severity, message: impl Into<Cow<'a, str>>, fields: Fields) -> Self {
        Self {
            timestamp: UtcDateTime::now(),
            severity,
            message: message.into(),
            fields,
            caller: None,
            stacktrace: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn later_insertions_overwrite() {
        let mut fields = Fields::from([("k", json!(1))]);
        fields.insert("k", 2);
        assert_eq!(fields.len(), 1);
        assert_eq!(fields.get("k"), Some(&json!(2)));
    }

    #[test]
    fn iteration_is_sorted_by_key() {
        let fields = Fields::new().with("b", 2).with("a", 1).with("c", 3);
        let keys: Vec<&str> = fields.iter().map(|(key, _)| key.as_str()).collect();
        assert_eq!(keys, ["a", "b", "c"]);
    }

    #[test]
    fn try_insert_rejects_non_string_map_keys() {
        let mut fields = Fields::new();
        let map = BTreeMap::from([((1, 2), "value")]);
        assert!(fields.try_insert("map", &map).is_err());
        assert!(fields.is_empty());

        fields.try_insert("list", &[1, 2, 3]).unwrap();
        assert_eq!(fields.get("list"), Some(&json!([1, 2, 3])));
    }
}
