//! Numeric coercion for heterogeneous raw fields.
//!
//! A raw value counts as data only if it converts to a finite `f64`.
//! Everything else (null, blank text, `NaN`, `inf`, booleans, objects) is
//! treated as absent. A literal `0` is valid data.

use serde_json::Value;

/// Coerce a JSON value (number, numeric string, or anything else) into a finite number.
pub fn parse_finite_number(raw: &Value) -> Option<f64> {
    match raw {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => parse_finite_str(s),
        _ => None,
    }
}

/// Coerce a text field into a finite number. Blank text is absent, not zero.
pub fn parse_finite_str(raw: &str) -> Option<f64> {
    let cleaned = raw.trim();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Convert a finite number into a whole `i32`, rejecting fractions and out-of-range values.
pub(crate) fn to_whole_i32(value: f64) -> Option<i32> {
    if value.fract() != 0.0 || value < i32::MIN as f64 || value > i32::MAX as f64 {
        return None;
    }
    Some(value as i32)
}
