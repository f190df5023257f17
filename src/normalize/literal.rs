//! Nested structures that arrive either as JSON objects or as string-encoded
//! literals (`"{'max': 2.5, 'min': None}"`).

use serde_json::{Map, Value};

use super::value::as_f64;

/// Returns the object behind `value`, decoding string literals if needed.
/// Anything that does not decode to an object is `None`.
pub fn as_object(value: &Value) -> Option<Map<String, Value>> {
    match value {
        Value::Object(map) => Some(map.clone()),
        Value::String(s) => decode(s),
        _ => None,
    }
}

fn decode(s: &str) -> Option<Map<String, Value>> {
    let parsed = serde_json::from_str::<Value>(s)
        .ok()
        .or_else(|| serde_json::from_str::<Value>(&python_to_json(s)).ok())?;
    match parsed {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

/// Rewrites a Python dict literal into JSON: single-quoted strings become
/// double-quoted and bare `None`/`True`/`False` become JSON keywords.
fn python_to_json(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    let mut quote: Option<char> = None;

    while let Some(c) = chars.next() {
        match quote {
            Some(q) => match c {
                '\\' => match chars.next() {
                    Some('\'') => out.push('\''),
                    Some(next) => {
                        out.push('\\');
                        out.push(next);
                    }
                    None => out.push('\\'),
                },
                c if c == q => {
                    out.push('"');
                    quote = None;
                }
                '"' => out.push_str("\\\""),
                c => out.push(c),
            },
            None => match c {
                '\'' | '"' => {
                    out.push('"');
                    quote = Some(c);
                }
                c if c.is_ascii_alphabetic() => {
                    let mut word = String::from(c);
                    while let Some(&n) = chars.peek() {
                        if n.is_ascii_alphanumeric() || n == '_' {
                            word.push(n);
                            chars.next();
                        } else {
                            break;
                        }
                    }
                    out.push_str(match word.as_str() {
                        "None" => "null",
                        "True" => "true",
                        "False" => "false",
                        other => other,
                    });
                }
                c => out.push(c),
            },
        }
    }
    out
}

/// The `max` entry of a probable-variation structure.
pub fn variation_max(value: &Value) -> Option<f64> {
    as_object(value)?.get("max").and_then(as_f64)
}

/// Display label for a data-loss `loss_meta` structure, e.g.
/// `{"type": "gps_loss"}` becomes `"Gps loss"`.
pub fn loss_type_label(value: &Value) -> String {
    as_object(value)
        .and_then(|meta| match meta.get("type") {
            Some(Value::String(t)) if !t.is_empty() => Some(capitalize(&t.replace('_', " "))),
            _ => None,
        })
        .unwrap_or_else(|| "Unknown".to_string())
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}
