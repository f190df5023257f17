//! Lenient scalar extraction from loosely typed JSON cells.

use serde_json::Value;

/// Identifier-like cell as a string. Integers keep their integer form.
pub fn as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(match n.as_i64() {
            Some(i) => i.to_string(),
            None => n.to_string(),
        }),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Numeric cell, accepting numeric strings. Non-finite values are rejected.
pub fn as_f64(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Flag cell. Anything unrecognised is `false`.
pub fn as_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_as_string() {
        assert_eq!(as_string(&json!("v-1")), Some("v-1".into()));
        assert_eq!(as_string(&json!(42)), Some("42".into()));
        assert_eq!(as_string(&json!("  ")), None);
        assert_eq!(as_string(&json!(null)), None);
    }

    #[test]
    fn test_as_f64() {
        assert_eq!(as_f64(&json!(1.5)), Some(1.5));
        assert_eq!(as_f64(&json!(" 12 ")), Some(12.0));
        assert_eq!(as_f64(&json!("n/a")), None);
        assert_eq!(as_f64(&json!([1])), None);
    }

    #[test]
    fn test_as_bool() {
        assert!(as_bool(&json!(true)));
        assert!(as_bool(&json!("True")));
        assert!(as_bool(&json!(1)));
        assert!(!as_bool(&json!(0)));
        assert!(!as_bool(&json!(null)));
    }
}
