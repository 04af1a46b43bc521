//! Loosely typed value helpers shared by every resolver.
//!
//! Templates, option rows and persisted documents all arrive as untyped JSON,
//! so comparisons go through a small set of coercions defined here.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;

/// Option objects (`{value, label}`) compare and persist by their `value`.
pub fn unwrap_value(value: &Value) -> &Value {
    match value {
        Value::Object(map) => map.get("value").unwrap_or(value),
        _ => value,
    }
}

/// Non-null, a non-empty trimmed string, or a non-empty array.
pub fn has_value(value: &Value) -> bool {
    match unwrap_value(value) {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::Bool(_) | Value::Number(_) => true,
    }
}

/// Holds something worth clearing: a value that is present and not `false`.
pub fn is_truthy(value: &Value) -> bool {
    has_value(value) && !matches!(unwrap_value(value), Value::Bool(false))
}

/// The empty value of the same shape.
pub fn empty_like(value: &Value) -> Value {
    match value {
        Value::Array(_) => Value::Array(Vec::new()),
        _ => Value::Null,
    }
}

/// Scalar as trimmed text. Integral floats print without a fraction so that
/// `3`, `3.0` and `"3"` coerce to the same string.
pub fn scalar_text(value: &Value) -> Option<String> {
    match unwrap_value(value) {
        Value::Null => None,
        Value::String(s) => Some(s.trim().to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
            _ => n.to_string(),
        }),
        Value::Array(_) | Value::Object(_) => None,
    }
}

/// Equality after string coercion. Used wherever a stored value is matched
/// against option values.
pub fn loosely_equal(left: &Value, right: &Value) -> bool {
    match (scalar_text(left), scalar_text(right)) {
        (Some(l), Some(r)) => l == r,
        (None, None) => unwrap_value(left) == unwrap_value(right),
        _ => false,
    }
}

// =============================================================================
// CONDITION COMPARISON
// =============================================================================

/// `equals` semantics for visibility conditions.
///
/// Numeric strings compare numerically when both sides look numeric, ISO-like
/// dates compare at date granularity when either side is a plain date and at
/// date-time granularity otherwise, everything else compares as lower-cased
/// text.
pub fn condition_equals(actual: &Value, expected: &Value) -> bool {
    let actual = scalar_text(actual).unwrap_or_default();
    let expected = scalar_text(expected).unwrap_or_default();

    if let (Ok(a), Ok(b)) = (actual.parse::<f64>(), expected.parse::<f64>()) {
        if !actual.is_empty() && !expected.is_empty() {
            return (a - b).abs() < 1e-9;
        }
    }

    if looks_like_date(&actual) && looks_like_date(&expected) {
        if is_plain_date(&actual) || is_plain_date(&expected) {
            if let (Some(a), Some(b)) = (parse_date(&actual), parse_date(&expected)) {
                return a == b;
            }
        } else if let (Some(a), Some(b)) = (parse_date_time(&actual), parse_date_time(&expected)) {
            return a == b;
        }
    }

    actual.to_lowercase() == expected.to_lowercase()
}

fn looks_like_date(text: &str) -> bool {
    let bytes = text.as_bytes();
    bytes.len() >= 10
        && bytes[..4].iter().all(u8::is_ascii_digit)
        && bytes[4] == b'-'
        && bytes[5..7].iter().all(u8::is_ascii_digit)
        && bytes[7] == b'-'
        && bytes[8..10].iter().all(u8::is_ascii_digit)
}

fn is_plain_date(text: &str) -> bool {
    text.len() == 10 && looks_like_date(text)
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    text.get(..10)
        .and_then(|head| NaiveDate::parse_from_str(head, "%Y-%m-%d").ok())
        .or_else(|| parse_date_time(text).map(|dt| dt.date()))
}

fn parse_date_time(text: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_utc());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            is_plain_date(text)
                .then(|| NaiveDate::parse_from_str(text, "%Y-%m-%d").ok())
                .flatten()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

// =============================================================================
// PATHS & DISPLAY
// =============================================================================

/// Follow a dot path (`address.lines.0`) into a JSON value. Numeric segments
/// index arrays. An empty path returns the value itself.
pub fn extract_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in path.split('.').filter(|s| !s.is_empty()) {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Human-readable text for any value.
pub fn display_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(display_text)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        other => scalar_text(other).unwrap_or_else(|| other.to_string()),
    }
}
