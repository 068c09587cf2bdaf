use serde_json::Value;

/// Recursively drop every `null`-valued object field.
///
/// Array elements are walked but never removed, so `[null]` stays `[null]`.
pub fn strip_nulls(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k, strip_nulls(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(strip_nulls).collect()),
        other => other,
    }
}

/// A stored value that should be treated as a miss.
pub fn is_empty_hit(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_strip_nulls_recursively() {
        let value = json!({"a": 1, "b": null, "c": [{"d": null, "e": 2}]});
        assert_eq!(strip_nulls(value), json!({"a": 1, "c": [{"e": 2}]}));
    }

    #[test]
    fn test_strip_keeps_scalars_and_array_nulls() {
        assert_eq!(strip_nulls(json!(3)), json!(3));
        assert_eq!(strip_nulls(json!([null, {"x": null}])), json!([null, {}]));
    }

    #[test]
    fn test_empty_hits() {
        assert!(is_empty_hit(&json!(null)));
        assert!(is_empty_hit(&json!("")));
        assert!(is_empty_hit(&json!([])));
        assert!(is_empty_hit(&json!({})));
        assert!(!is_empty_hit(&json!(0)));
        assert!(!is_empty_hit(&json!(false)));
        assert!(!is_empty_hit(&json!([1])));
    }
}
