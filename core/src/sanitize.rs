//! Field-level coercion for untrusted payloads. Model output is parsed into a
//! weakly-typed tree first; these helpers pull individual fields out of that
//! tree, coercing wrong types to defaults and bounding lengths before
//! anything reaches the datastore.

use serde_json::Value;

/// Truncate to at most `max` characters, never splitting a code point.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Extract a string field from a JSON object, truncated to `max` characters.
/// Missing or non-string values coerce to the empty string.
pub fn string_field(obj: &Value, key: &str, max: usize) -> String {
    obj.get(key)
        .and_then(Value::as_str)
        .map(|s| truncate_chars(s, max).to_string())
        .unwrap_or_default()
}

/// Like [`string_field`], but missing, non-string or empty values fall back
/// to `default`.
pub fn string_field_or(obj: &Value, key: &str, max: usize, default: &str) -> String {
    let value = string_field(obj, key, max);
    if value.is_empty() { default.to_string() } else { value }
}

/// Extract a boolean field; anything but a literal `true` is `false`.
pub fn bool_field(obj: &Value, key: &str) -> bool {
    obj.get(key).and_then(Value::as_bool).unwrap_or(false)
}

/// Extract an integer field, falling back to `default` on missing or
/// non-integer values.
pub fn i64_field(obj: &Value, key: &str, default: i64) -> i64 {
    obj.get(key).and_then(Value::as_i64).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::{bool_field, i64_field, string_field, string_field_or, truncate_chars};
    use serde_json::json;

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("célula", 2), "cé");
        assert_eq!(truncate_chars("ab", 5), "ab");
        assert_eq!(truncate_chars("", 3), "");
    }

    #[test]
    fn string_field_coerces_wrong_types_to_empty() {
        let obj = json!({"answer": 42, "question": "What is ATP?"});
        assert_eq!(string_field(&obj, "answer", 100), "");
        assert_eq!(string_field(&obj, "missing", 100), "");
        assert_eq!(string_field(&obj, "question", 100), "What is ATP?");
    }

    #[test]
    fn string_field_truncates_long_values() {
        let obj = json!({"insight": "a".repeat(600)});
        assert_eq!(string_field(&obj, "insight", 500).len(), 500);
    }

    #[test]
    fn string_field_or_falls_back_on_empty() {
        let obj = json!({"topic": ""});
        assert_eq!(string_field_or(&obj, "topic", 200, "General"), "General");
        assert_eq!(string_field_or(&obj, "missing", 200, "General"), "General");
        let obj = json!({"topic": "Cell Structure"});
        assert_eq!(string_field_or(&obj, "topic", 200, "General"), "Cell Structure");
    }

    #[test]
    fn bool_field_only_accepts_literal_true() {
        assert!(bool_field(&json!({"is_correct": true}), "is_correct"));
        assert!(!bool_field(&json!({"is_correct": "true"}), "is_correct"));
        assert!(!bool_field(&json!({"is_correct": 1}), "is_correct"));
        assert!(!bool_field(&json!({}), "is_correct"));
    }

    #[test]
    fn i64_field_defaults_on_non_integers() {
        assert_eq!(i64_field(&json!({"start_hour": 9}), "start_hour", 14), 9);
        assert_eq!(i64_field(&json!({"start_hour": "9"}), "start_hour", 14), 14);
        assert_eq!(i64_field(&json!({}), "start_hour", 14), 14);
    }
}
