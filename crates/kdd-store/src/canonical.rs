//! Canonical JSON serialization.
//!
//! Sorted object keys, UTF-8, LF line endings, and vectors rounded to at
//! most 8 fractional digits, so identical inputs serialize to identical
//! bytes on every machine.

use crate::error::Result;
use serde::Serialize;

const FLOAT_SCALE: f64 = 1e8;

/// Pretty canonical JSON document, LF-terminated.
///
/// Going through [`serde_json::Value`] sorts every object's keys (the
/// default `Map` is ordered).
pub fn to_canonical_json<T: Serialize>(value: &T) -> Result<String> {
    let value = serde_json::to_value(value)?;
    let mut out = serde_json::to_string_pretty(&value)?;
    out.push('\n');
    Ok(out)
}

/// Compact canonical JSON on a single LF-terminated line, for `.jsonl`
/// files.
pub fn to_canonical_line<T: Serialize>(value: &T) -> Result<String> {
    let value = serde_json::to_value(value)?;
    let mut out = serde_json::to_string(&value)?;
    out.push('\n');
    Ok(out)
}

/// Round every component to 8 fractional digits so serialized vectors
/// round-trip identically.
pub fn round_vector(vector: &mut [f32]) {
    for v in vector.iter_mut() {
        *v = ((f64::from(*v) * FLOAT_SCALE).round() / FLOAT_SCALE) as f32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn floats_are_canonical(value: &Value) -> bool {
        match value {
            Value::Number(n) => n.as_f64().is_none_or(|f| {
                let rounded = (f * FLOAT_SCALE).round() / FLOAT_SCALE;
                (f - rounded).abs() < f64::EPSILON
            }),
            Value::Array(items) => items.iter().all(floats_are_canonical),
            Value::Object(map) => map.values().all(floats_are_canonical),
            _ => true,
        }
    }

    #[test]
    fn object_keys_are_sorted() {
        #[derive(Serialize)]
        struct Unordered {
            zebra: u32,
            alpha: u32,
        }
        let out = to_canonical_json(&Unordered { zebra: 1, alpha: 2 }).unwrap();
        let alpha_pos = out.find("alpha").unwrap();
        let zebra_pos = out.find("zebra").unwrap();
        assert!(alpha_pos < zebra_pos);
        assert!(out.ends_with('\n'));
    }

    #[test]
    fn line_is_single_lf_terminated() {
        let out = to_canonical_line(&json!({"b": 1, "a": 2})).unwrap();
        assert_eq!(out, "{\"a\":2,\"b\":1}\n");
    }

    #[test]
    fn vectors_round_to_eight_digits() {
        let mut v = vec![0.123_456_789_f32, 1.0, -0.000_000_004_2];
        round_vector(&mut v);
        let value = serde_json::to_value(&v).unwrap();
        assert!(floats_are_canonical(&value));
        assert_eq!(v[1], 1.0);
    }

    #[test]
    fn identical_inputs_identical_bytes() {
        let a = to_canonical_json(&json!({"x": [1.5, 2.25], "k": "v"})).unwrap();
        let b = to_canonical_json(&json!({"x": [1.5, 2.25], "k": "v"})).unwrap();
        assert_eq!(a, b);
    }
}
