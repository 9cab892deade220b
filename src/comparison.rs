use std::cmp::Ordering;
use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::value::Value;

/// Order two values for bound, const and enum checks.
///
/// Numbers compare across int/float/decimal; text, bytes, temporal values and
/// uuids compare within their own kind. Anything else is incomparable.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Enum(m), other) | (other, Value::Enum(m)) => {
            let ord = compare_values(&m.value, other)?;
            Some(if matches!(a, Value::Enum(_)) { ord } else { ord.reverse() })
        }
        (Value::Int(x), Value::Int(y)) => Some(x.cmp(y)),
        (Value::Decimal(x), Value::Decimal(y)) => Some(x.cmp(y)),
        (Value::Decimal(d), other) => Some(d.cmp(&to_decimal(other)?)),
        (other, Value::Decimal(d)) => Some(to_decimal(other)?.cmp(d)),
        (Value::Int(_) | Value::Float(_) | Value::Bool(_), Value::Int(_) | Value::Float(_) | Value::Bool(_)) => {
            to_f64(a)?.partial_cmp(&to_f64(b)?)
        }
        (Value::Str(x), Value::Str(y)) => Some(x.cmp(y)),
        (Value::Bytes(x), Value::Bytes(y)) => Some(x.cmp(y)),
        (Value::Date(x), Value::Date(y)) => Some(x.cmp(y)),
        (Value::Time(x), Value::Time(y)) => Some(x.cmp(y)),
        (Value::DateTime(x), Value::DateTime(y)) => Some(x.cmp(y)),
        (Value::DateTimeTz(x), Value::DateTimeTz(y)) => Some(x.cmp(y)),
        (Value::Duration(x), Value::Duration(y)) => Some(x.cmp(y)),
        (Value::Uuid(x), Value::Uuid(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Equality used by `const` and `enum`: numerically equal numbers match
/// across kinds, everything else needs structural equality.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    match (a.kind().is_numeric(), b.kind().is_numeric()) {
        (true, true) => compare_values(a, b) == Some(Ordering::Equal),
        _ => false,
    }
}

pub(crate) fn to_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Int(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Decimal(d) => d.to_f64(),
        _ => None,
    }
}

pub(crate) fn to_decimal(v: &Value) -> Option<Decimal> {
    match v {
        Value::Decimal(d) => Some(*d),
        Value::Int(i) => Some(Decimal::from(*i)),
        Value::Bool(b) => Some(Decimal::from(*b as i64)),
        // shortest round-trip text keeps 0.1 as 0.1 instead of its binary expansion
        Value::Float(f) if f.is_finite() => Decimal::from_str(&f.to_string()).ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn numbers_compare_across_kinds() {
        assert_eq!(compare_values(&Value::Int(2), &Value::Float(2.5)), Some(Ordering::Less));
        assert_eq!(
            compare_values(&Value::Decimal(Decimal::new(25, 1)), &Value::Float(2.5)),
            Some(Ordering::Equal)
        );
        assert_eq!(compare_values(&Value::Int(3), &Value::Decimal(Decimal::new(29, 1))), Some(Ordering::Greater));
        assert!(values_equal(&Value::Int(1), &Value::Float(1.0)));
    }

    #[test]
    fn mixed_kinds_are_incomparable() {
        assert_eq!(compare_values(&Value::from("1"), &Value::Int(1)), None);
        assert_eq!(compare_values(&Value::Float(f64::NAN), &Value::Float(1.0)), None);
        let d = NaiveDate::from_ymd_opt(2024, 1, 1).map(Value::Date).unwrap_or(Value::Null);
        assert_eq!(compare_values(&d, &Value::from("2024-01-01")), None);
        assert!(!values_equal(&Value::from("1"), &Value::Int(1)));
    }
}
