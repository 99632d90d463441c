//! Per-request operator settings.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sieve_query::{FilterValue, QueryError, QueryResult};

/// Values a user submitted through an operator's form, keyed by field
/// identifier (`value`, `values`, `text`, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Settings(IndexMap<String, FilterValue>);

impl Settings {
    /// Create empty settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse settings from a JSON object.
    pub fn from_json(value: serde_json::Value) -> QueryResult<Self> {
        serde_json::from_value(value).map_err(|e| QueryError::deserialization(e.to_string()).with_source(e))
    }

    /// Set a value (builder style).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Set a value, replacing any previous one.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<FilterValue>) {
        self.0.insert(key.into(), value.into());
    }

    /// Get a raw value.
    pub fn get(&self, key: &str) -> Option<&FilterValue> {
        self.0.get(key)
    }

    /// Check whether a key was submitted.
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Read `key` as a list.
    ///
    /// A scalar becomes a one-element list, nested lists are flattened, and
    /// a missing key or null yields an empty list.
    pub fn values_for(&self, key: &str) -> Vec<FilterValue> {
        let mut out = Vec::new();
        if let Some(value) = self.0.get(key) {
            flatten_into(value, &mut out);
        }
        out
    }

    /// Number of submitted keys.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check whether nothing was submitted.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over submitted values in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FilterValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

fn flatten_into(value: &FilterValue, out: &mut Vec<FilterValue>) {
    match value {
        FilterValue::Null => {}
        FilterValue::List(items) => items.iter().for_each(|item| flatten_into(item, out)),
        other => out.push(other.clone()),
    }
}

impl<K: Into<String>, V: Into<FilterValue>> FromIterator<(K, V)> for Settings {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_values_for_wraps_scalar() {
        let settings = Settings::new().with("value", 3);
        assert_eq!(settings.values_for("value"), vec![FilterValue::Int(3)]);
    }

    #[test]
    fn test_values_for_flattens_list() {
        let settings = Settings::from_json(json!({ "values": [3, [5, null]] })).unwrap();
        assert_eq!(settings.values_for("values"), vec![FilterValue::Int(3), FilterValue::Int(5)]);
    }

    #[test]
    fn test_values_for_missing_or_null() {
        let settings = Settings::from_json(json!({ "value": null })).unwrap();
        assert!(settings.values_for("value").is_empty());
        assert!(settings.values_for("values").is_empty());
    }

    #[test]
    fn test_from_json_rejects_non_object() {
        assert!(Settings::from_json(json!([1, 2])).is_err());
    }

    #[test]
    fn test_collect_preserves_order() {
        let settings: Settings = [("b", 1), ("a", 2)].into_iter().collect();
        let keys: Vec<_> = settings.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["b", "a"]);
    }
}
