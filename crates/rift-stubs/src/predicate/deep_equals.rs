//! Structural JSON comparison for declared request bodies.
//!
//! The comparison is non-extensible: objects must carry exactly the declared
//! key set at every level, and arrays must have the declared length. Array
//! elements may appear in any order. Declared string values that look like
//! regular expressions are matched against the observed scalar instead of
//! being compared for equality.

use super::pairing::perfect_pairing;
use super::string_matcher::{compile_cached, looks_like_regex};
use serde_json::Value;

/// Compare an observed JSON document against a declared one.
pub fn json_non_extensible_equals(expected: &Value, actual: &Value) -> bool {
    match (expected, actual) {
        (Value::Object(expected), Value::Object(actual)) => {
            expected.len() == actual.len()
                && expected.iter().all(|(key, expected_val)| {
                    actual
                        .get(key)
                        .is_some_and(|actual_val| json_non_extensible_equals(expected_val, actual_val))
                })
        }
        (Value::Array(expected), Value::Array(actual)) => arrays_match(expected, actual),
        (Value::String(pattern), actual) => string_matches(pattern, actual),
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => a == b,
        },
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Null, Value::Null) => true,
        _ => false,
    }
}

fn string_matches(expected: &str, actual: &Value) -> bool {
    let actual = match actual {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return false,
    };

    if expected == actual {
        return true;
    }
    if !looks_like_regex(expected) {
        return false;
    }
    compile_cached(&format!(r"\A(?:{expected})\z"))
        .map(|regex| regex.is_match(&actual))
        .unwrap_or(false)
}

/// Unordered, same-length array comparison. Each declared element must pair
/// with a distinct observed element.
fn arrays_match(expected: &[Value], actual: &[Value]) -> bool {
    perfect_pairing(expected, actual, json_non_extensible_equals)
}

/// Escape the JSON structural characters that are also regex syntax, so a
/// declared document can be searched for as text.
pub fn escape_json_for_regex(declared: &str) -> String {
    let mut escaped = String::with_capacity(declared.len() + 8);
    for c in declared.chars() {
        if matches!(c, '{' | '}' | '[' | ']') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_exact_match() {
        assert!(json_non_extensible_equals(&json!({"a": 1}), &json!({"a": 1})));
    }

    #[test]
    fn test_json_extra_key_rejected() {
        assert!(!json_non_extensible_equals(
            &json!({"a": 1}),
            &json!({"a": 1, "b": 2})
        ));
    }

    #[test]
    fn test_json_missing_key_rejected() {
        assert!(!json_non_extensible_equals(
            &json!({"a": 1, "b": 2}),
            &json!({"a": 1})
        ));
    }

    #[test]
    fn test_json_nested_extra_key_rejected() {
        let expected = json!({"outer": {"inner": true}});
        let actual = json!({"outer": {"inner": true, "extra": null}});
        assert!(!json_non_extensible_equals(&expected, &actual));
    }

    #[test]
    fn test_json_arrays_unordered() {
        assert!(json_non_extensible_equals(
            &json!({"ids": [1, 2, 3]}),
            &json!({"ids": [3, 1, 2]})
        ));
        assert!(!json_non_extensible_equals(
            &json!({"ids": [1, 2]}),
            &json!({"ids": [1, 2, 3]})
        ));
        assert!(!json_non_extensible_equals(
            &json!([1, 1, 2]),
            &json!([1, 2, 2])
        ));
    }

    #[test]
    fn test_json_large_unordered_array() {
        let declared: Vec<Value> = (0..300).map(|i| json!({"id": i, "tag": "t"})).collect();
        let mut observed = declared.clone();
        observed.reverse();
        let expected = Value::Array(declared);
        assert!(json_non_extensible_equals(&expected, &Value::Array(observed.clone())));

        observed[0] = json!({"id": 1000, "tag": "t"});
        assert!(!json_non_extensible_equals(&expected, &Value::Array(observed)));
    }

    #[test]
    fn test_json_regex_values() {
        let expected = json!({"id": "^[0-9]+$", "name": "\\w+"});
        assert!(json_non_extensible_equals(
            &expected,
            &json!({"id": "123", "name": "bob"})
        ));
        assert!(json_non_extensible_equals(
            &expected,
            &json!({"id": 123, "name": "bob"})
        ));
        assert!(!json_non_extensible_equals(
            &expected,
            &json!({"id": "12a", "name": "bob"})
        ));
    }

    #[test]
    fn test_json_plain_string_is_not_regex() {
        assert!(!json_non_extensible_equals(
            &json!({"v": "a.b"}),
            &json!({"v": "axb"})
        ));
    }

    #[test]
    fn test_json_numbers_compare_by_value() {
        assert!(json_non_extensible_equals(&json!(1.0), &json!(1)));
        assert!(!json_non_extensible_equals(&json!(1), &json!(2)));
    }

    #[test]
    fn test_escape_json_for_regex() {
        assert_eq!(escape_json_for_regex(r#"{"a":[1]}"#), r#"\{"a":\[1\]\}"#);
    }
}
