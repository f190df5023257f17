use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;

use crate::record::naive_from_ms;

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Resolves a time cell into `(time, time_ms)`.
///
/// Numbers (and all-digit strings) are epoch milliseconds. Other strings are
/// parsed as RFC 3339 (converted to UTC) or as a naive UTC timestamp or date.
/// `time` is always derived back from `time_ms`, so the two agree to the
/// millisecond.
pub fn resolve(value: &Value) -> Option<(NaiveDateTime, i64)> {
    let time_ms = match value {
        Value::Number(n) => match n.as_i64() {
            Some(ms) => ms,
            None => {
                let f = n.as_f64()?;
                if !f.is_finite() {
                    return None;
                }
                f.trunc() as i64
            }
        },
        Value::String(s) => parse_str_ms(s.trim())?,
        _ => return None,
    };
    Some((naive_from_ms(time_ms)?, time_ms))
}

fn parse_str_ms(s: &str) -> Option<i64> {
    if s.is_empty() {
        return None;
    }
    if s.bytes().all(|b| b.is_ascii_digit()) {
        return s.parse().ok();
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc().timestamp_millis());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().timestamp_millis())
}
