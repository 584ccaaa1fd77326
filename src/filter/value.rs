//! Scalar views of JSON values
//!
//! Filter comparison and template substitution both need a value as text.

use serde_json::Value as JsonValue;

/// Render a JSON value as plain text.
///
/// Strings are returned without quotes, numbers and booleans in their JSON
/// spelling, `null` as the empty string. An array renders as its first
/// element; objects are serialized as compact JSON so a captured document
/// can be spliced into a request body.
pub fn value_to_string(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        JsonValue::Number(n) => n.to_string(),
        JsonValue::Bool(b) => b.to_string(),
        JsonValue::Null => String::new(),
        JsonValue::Array(items) => items.first().map(value_to_string).unwrap_or_default(),
        JsonValue::Object(_) => value.to_string(),
    }
}

/// A value counts as blank when it is `null`, whitespace-only text, or an
/// empty array.
pub fn is_blank(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => true,
        JsonValue::String(s) => s.trim().is_empty(),
        JsonValue::Array(items) => items.iter().all(is_blank),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalars() {
        assert_eq!(value_to_string(&json!("abc")), "abc");
        assert_eq!(value_to_string(&json!(42)), "42");
        assert_eq!(value_to_string(&json!(1.5)), "1.5");
        assert_eq!(value_to_string(&json!(true)), "true");
        assert_eq!(value_to_string(&json!(null)), "");
    }

    #[test]
    fn test_array_uses_first_element() {
        assert_eq!(value_to_string(&json!(["x", "y"])), "x");
        assert_eq!(value_to_string(&json!([])), "");
    }

    #[test]
    fn test_object_is_compact_json() {
        assert_eq!(value_to_string(&json!({"a": 1, "b": "c"})), r#"{"a":1,"b":"c"}"#);
    }

    #[test]
    fn test_is_blank() {
        assert!(is_blank(&json!(null)));
        assert!(is_blank(&json!("   ")));
        assert!(is_blank(&json!([])));
        assert!(is_blank(&json!(["", null])));
        assert!(!is_blank(&json!("x")));
        assert!(!is_blank(&json!(0)));
        assert!(!is_blank(&json!(false)));
        assert!(!is_blank(&json!({})));
    }
}
