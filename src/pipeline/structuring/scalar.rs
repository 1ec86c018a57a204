//! Lenient scalar decoding for model-declared numbers.
//!
//! Models send numbers as JSON numbers, as strings ("0.85", " 12 "), or as
//! null. Every decoder here is total: anything it cannot read becomes `None`
//! instead of an error, so a badly typed confidence never aborts a pipeline.
//! Strings are parsed with Rust's `str::parse`, which is locale-independent.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Decode a finite floating point number.
pub fn try_parse_double(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

/// Decode an integer. JSON floats are truncated toward zero; strings must
/// hold a plain integer.
pub fn try_parse_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Some(i);
            }
            let f = n.as_f64()?;
            if f.is_finite() && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
                Some(f.trunc() as i64)
            } else {
                None
            }
        }
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Decode a confidence: a finite number inside `[0.0, 1.0]`.
pub fn try_parse_confidence(value: &Value) -> Option<f64> {
    try_parse_double(value).filter(|v| (0.0..=1.0).contains(v))
}

/// serde adapter: confidence field that falls back to 0.0 when unreadable.
pub fn deserialize_lenient_confidence<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(try_parse_confidence(&value).unwrap_or(0.0))
}

/// serde adapter: optional integer field that never fails.
pub fn deserialize_lenient_int<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(try_parse_int(&value))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn numbers_decode_directly() {
        assert_eq!(try_parse_double(&json!(0.42)), Some(0.42));
        assert_eq!(try_parse_int(&json!(17)), Some(17));
        assert_eq!(try_parse_confidence(&json!(1)), Some(1.0));
    }

    #[test]
    fn numeric_strings_are_parsed() {
        assert_eq!(try_parse_double(&json!(" 3.25 ")), Some(3.25));
        assert_eq!(try_parse_int(&json!("42")), Some(42));
        assert_eq!(try_parse_confidence(&json!("0.9")), Some(0.9));
    }

    #[test]
    fn floats_truncate_toward_zero_for_ints() {
        assert_eq!(try_parse_int(&json!(3.9)), Some(3));
        assert_eq!(try_parse_int(&json!(-3.9)), Some(-3));
    }

    #[test]
    fn non_numeric_tokens_yield_none() {
        assert_eq!(try_parse_double(&json!(null)), None);
        assert_eq!(try_parse_double(&json!(true)), None);
        assert_eq!(try_parse_double(&json!([1])), None);
        assert_eq!(try_parse_double(&json!({"v": 1})), None);
        assert_eq!(try_parse_int(&json!("3.5")), None);
        assert_eq!(try_parse_double(&json!("high")), None);
    }

    #[test]
    fn non_finite_strings_are_rejected() {
        assert_eq!(try_parse_double(&json!("NaN")), None);
        assert_eq!(try_parse_double(&json!("inf")), None);
    }

    #[test]
    fn comma_decimal_is_not_accepted() {
        assert_eq!(try_parse_double(&json!("0,85")), None);
    }

    #[test]
    fn confidence_outside_unit_interval_is_none() {
        assert_eq!(try_parse_confidence(&json!(1.01)), None);
        assert_eq!(try_parse_confidence(&json!(-0.1)), None);
        assert_eq!(try_parse_confidence(&json!("85")), None);
    }

    #[test]
    fn lenient_adapters_inside_structs() {
        #[derive(Deserialize)]
        struct Probe {
            #[serde(default, deserialize_with = "deserialize_lenient_confidence")]
            confidence: f64,
            #[serde(default, deserialize_with = "deserialize_lenient_int")]
            count: Option<i64>,
        }

        let p: Probe = serde_json::from_value(json!({"confidence": "0.7", "count": "x"})).unwrap();
        assert!((p.confidence - 0.7).abs() < f64::EPSILON);
        assert_eq!(p.count, None);

        let p: Probe = serde_json::from_value(json!({})).unwrap();
        assert_eq!(p.confidence, 0.0);
        assert_eq!(p.count, None);
    }
}
