//! Flat REDCap records

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::source::SourceError;

/// One exported record: field name -> value, in export order.
///
/// REDCap's flat JSON export encodes every value as a string, but nothing
/// here relies on that; numbers and booleans are carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    /// Get a raw field value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Get a field value rendered as text.
    ///
    /// Strings are returned as-is, other scalars via their JSON rendering.
    /// Null, arrays and objects yield `None`.
    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.0.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// Insert a field, returning the previous value if any.
    ///
    /// Re-inserting an existing key keeps its original position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    /// Remove a field, preserving the order of the remaining fields
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let removed = self.0.get(key).cloned();
        if removed.is_some() {
            self.0.retain(|k, _| k != key);
        }
        removed
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Field names in export order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// The record identifier (REDCap's first field, e.g. `project_name`)
    pub fn record_id(&self, id_field: &str) -> Option<String> {
        self.get_str(id_field).filter(|id| !id.is_empty())
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for Record {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl TryFrom<Value> for Record {
    type Error = SourceError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(SourceError::Decode(format!(
                "expected a JSON object for a record, got {}",
                other
            ))),
        }
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Record {
        Record::try_from(json!({
            "project_name": "P1",
            "general_complete": "2",
            "site": "VU",
            "align_args": 1
        }))
        .unwrap()
    }

    #[test]
    fn test_remove_preserves_order() {
        let mut record = sample();
        assert_eq!(record.remove("general_complete"), Some(json!("2")));

        let keys: Vec<&str> = record.keys().collect();
        assert_eq!(keys, vec!["project_name", "site", "align_args"]);
    }

    #[test]
    fn test_remove_missing_key() {
        let mut record = sample();
        assert_eq!(record.remove("nope"), None);
        assert_eq!(record.len(), 4);
    }

    #[test]
    fn test_get_str_renders_scalars() {
        let record = sample();
        assert_eq!(record.get_str("site"), Some("VU".to_string()));
        assert_eq!(record.get_str("align_args"), Some("1".to_string()));
        assert_eq!(record.get_str("missing"), None);
    }

    #[test]
    fn test_record_id_ignores_empty() {
        let record = Record::try_from(json!({"project_name": ""})).unwrap();
        assert_eq!(record.record_id("project_name"), None);
        assert_eq!(sample().record_id("project_name"), Some("P1".to_string()));
    }

    #[test]
    fn test_non_object_rejected() {
        let err = Record::try_from(json!(["a", "b"])).unwrap_err();
        assert!(matches!(err, SourceError::Decode(_)));
    }

    #[test]
    fn test_deserialize_export_payload() {
        let payload = r#"[{"project_name":"P1","general_complete":"2"},{"project_name":"P2"}]"#;
        let records: Vec<Record> = serde_json::from_str(payload).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].record_id("project_name"), Some("P2".to_string()));
    }
}
