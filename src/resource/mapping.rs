//! Flatten/expand helpers
//!
//! Flatten converts a wire JSON value into its state representation; expand
//! is the inverse for request bodies. Absent wire fields flatten to `Null`
//! (which `ResourceState::set` turns into an absent attribute) with no
//! default substitution. On the way out, empty values are omitted so the
//! request body never clears server-side fields the caller did not touch.
//!
//! Only `Null`, `""`, `[]`, and `{}` count as empty: `0` and `false` are
//! real values and are always sent. Wire int64s arrive as decimal strings
//! and are coerced on flatten.

use serde_json::{Map, Value};

/// Whether a wire value is "empty" for the purpose of request omission
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

/// Insert `value` into `obj` unless it is empty
pub fn set_omit_empty(obj: &mut Map<String, Value>, key: &str, value: Value) {
    if !is_empty_value(&value) {
        obj.insert(key.to_string(), value);
    }
}

/// Coerce a wire value to i64; int64 fields are serialized as strings in
/// GCP JSON, int32 fields as numbers
pub fn coerce_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

pub fn flatten_string(value: Option<&Value>) -> Value {
    match value {
        Some(Value::String(s)) => Value::String(s.clone()),
        _ => Value::Null,
    }
}

pub fn flatten_i64(value: Option<&Value>) -> Value {
    value.and_then(coerce_i64).map(Value::from).unwrap_or(Value::Null)
}

pub fn flatten_bool(value: Option<&Value>) -> Value {
    match value {
        Some(Value::Bool(b)) => Value::Bool(*b),
        _ => Value::Null,
    }
}

/// Flatten a string-keyed map field (labels, annotations, database flags)
pub fn flatten_map(value: Option<&Value>) -> Value {
    match value {
        Some(Value::Object(o)) => Value::Object(o.clone()),
        _ => Value::Null,
    }
}

/// Walk a dot-notation path into a JSON value
pub fn get_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for part in path.split('.') {
        current = current.get(part)?;
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_zero_and_false_are_not_empty() {
        assert!(!is_empty_value(&json!(0)));
        assert!(!is_empty_value(&json!(false)));
        assert!(is_empty_value(&json!("")));
        assert!(is_empty_value(&json!([])));
        assert!(is_empty_value(&json!({})));
        assert!(is_empty_value(&Value::Null));
    }

    #[test]
    fn test_set_omit_empty() {
        let mut obj = Map::new();
        set_omit_empty(&mut obj, "displayName", json!(""));
        set_omit_empty(&mut obj, "hours", json!(0));
        set_omit_empty(&mut obj, "labels", json!({}));
        assert!(!obj.contains_key("displayName"));
        assert!(!obj.contains_key("labels"));
        assert_eq!(obj["hours"], 0);
    }

    #[test]
    fn test_coerce_i64_accepts_wire_strings() {
        assert_eq!(coerce_i64(&json!("86400")), Some(86400));
        assert_eq!(coerce_i64(&json!(42)), Some(42));
        assert_eq!(coerce_i64(&json!("not-a-number")), None);
    }

    #[test]
    fn test_flatten_absent_is_null() {
        assert_eq!(flatten_string(None), Value::Null);
        assert_eq!(flatten_i64(None), Value::Null);
        assert_eq!(flatten_bool(None), Value::Null);
    }

    #[test]
    fn test_get_path() {
        let value = json!({"weeklySchedule": {"startTimes": [{"hours": 0}]}});
        let schedule = get_path(&value, "weeklySchedule.startTimes").unwrap();
        assert_eq!(schedule[0]["hours"], 0);
        assert!(get_path(&value, "weeklySchedule.missing").is_none());
    }
}
