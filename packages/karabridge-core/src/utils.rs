//! General utilities shared across the bridge.

use serde_json::Value;

// ─────────────────────────────────────────────────────────────────────────────
// Numeric Coercion
// ─────────────────────────────────────────────────────────────────────────────

/// Coerces an untrusted JSON value to an integer.
///
/// Accepts integral JSON numbers, floats with no fractional part, and strings
/// holding either of those (surrounding whitespace and a leading `+` are
/// allowed). Everything else, including `null`, booleans, empty strings and
/// non-finite or fractional numbers, yields `None`.
#[must_use]
pub fn coerce_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(integral_f64)),
        Value::String(s) => {
            let trimmed = s.trim();
            let unsigned = trimmed.strip_prefix('+').unwrap_or(trimmed);
            if unsigned.is_empty() {
                return None;
            }
            unsigned
                .parse::<i64>()
                .ok()
                .or_else(|| unsigned.parse::<f64>().ok().and_then(integral_f64))
        }
        _ => None,
    }
}

fn integral_f64(f: f64) -> Option<i64> {
    if f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}
