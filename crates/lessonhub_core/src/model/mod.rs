//! Domain records decoded from store snapshots.
//!
//! # Responsibility
//! - Give typed shapes to the JSON documents living under store paths.
//! - Decode leniently: a missing or mistyped field becomes its default.
//!
//! # Invariants
//! - Decoding never fails; structural validation is not this layer's job.
//! - Writes use the exact camelCase field names already present in the store.

use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};

pub mod feedback;
pub mod lesson;
pub mod notification;
pub mod session;
pub mod settings;
pub mod student;

/// Current wall clock in epoch milliseconds.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or_default()
}

/// String field, with numbers rendered as text and anything else as `""`.
pub(crate) fn text(record: &Value, key: &str) -> String {
    match record.get(key) {
        Some(Value::String(value)) => value.clone(),
        Some(Value::Number(value)) => value.to_string(),
        Some(Value::Bool(value)) => value.to_string(),
        _ => String::new(),
    }
}

/// Non-blank string field.
pub(crate) fn opt_text(record: &Value, key: &str) -> Option<String> {
    let value = text(record, key);
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Numeric value, accepting numbers and numeric strings.
pub(crate) fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(raw) => raw.trim().parse::<f64>().ok(),
        _ => None,
    }
}

pub(crate) fn number(record: &Value, key: &str) -> Option<f64> {
    record.get(key).and_then(as_number)
}

pub(crate) fn millis(record: &Value, key: &str) -> i64 {
    number(record, key).map_or(0, |value| value as i64)
}

pub(crate) fn flag(record: &Value, key: &str) -> bool {
    matches!(record.get(key), Some(Value::Bool(true)))
}

/// Keyed children of a collection snapshot.
///
/// Objects yield their entries; arrays yield index keys for non-null items.
pub fn children(snapshot: Option<&Value>) -> Vec<(String, &Value)> {
    match snapshot {
        Some(Value::Object(map)) => map.iter().map(|(key, value)| (key.clone(), value)).collect(),
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .filter(|(_, value)| !value.is_null())
            .map(|(index, value)| (index.to_string(), value))
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::{as_number, children, flag, opt_text, text};
    use serde_json::json;

    #[test]
    fn lenient_accessors_default_missing_or_mistyped_fields() {
        let record = json!({"name": "Ana", "age": 7, "read": "yes", "blank": "  "});
        assert_eq!(text(&record, "name"), "Ana");
        assert_eq!(text(&record, "age"), "7");
        assert_eq!(text(&record, "missing"), "");
        assert_eq!(opt_text(&record, "blank"), None);
        assert!(!flag(&record, "read"));
        assert_eq!(as_number(&json!(" 12.5 ")), Some(12.5));
        assert_eq!(as_number(&json!("abc")), None);
    }

    #[test]
    fn children_accepts_objects_and_sparse_arrays() {
        let object = json!({"a": 1, "b": 2});
        assert_eq!(children(Some(&object)).len(), 2);
        let array = json!([null, {"x": 1}]);
        let items = children(Some(&array));
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].0, "1");
        assert!(children(None).is_empty());
    }
}
