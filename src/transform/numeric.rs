use std::str::FromStr;

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

use super::temporal::{duration_seconds, epoch_seconds};
use super::Transformer;
use crate::errors::TransformError;
use crate::types::Type;
use crate::value::Value;

const TRUE_WORDS: [&str; 6] = ["true", "yes", "y", "on", "t", "1"];
const FALSE_WORDS: [&str; 6] = ["false", "no", "n", "off", "f", "0"];

pub(super) fn text_of(value: &Value) -> Option<&str> {
    match value {
        Value::Str(s) => Some(s.trim()),
        Value::Bytes(b) => std::str::from_utf8(b).ok().map(str::trim),
        _ => None,
    }
}

/// Strict numeric text: integers, decimals and exponents, `_` separators allowed.
pub(super) fn parse_number_text(text: &str) -> Option<Value> {
    let cleaned = text.replace('_', "");
    if cleaned.is_empty() {
        return None;
    }
    if let Ok(i) = cleaned.parse::<i64>() {
        return Some(Value::Int(i));
    }
    Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .ok()
        .map(Value::Decimal)
}

pub(super) fn to_null(_: &Transformer<'_>, value: Value, target: &Type) -> Result<Value, TransformError> {
    match text_of(&value) {
        Some(s) if s.is_empty() || s.eq_ignore_ascii_case("null") || s.eq_ignore_ascii_case("none") => Ok(Value::Null),
        _ => Err(TransformError::mismatch(&value, target.name(), "not a null value")),
    }
}

pub(super) fn to_bool(t: &Transformer<'_>, value: Value, target: &Type) -> Result<Value, TransformError> {
    if let Some(s) = text_of(&value) {
        let lower = s.to_ascii_lowercase();
        if TRUE_WORDS.contains(&lower.as_str()) {
            return Ok(Value::Bool(true));
        }
        if FALSE_WORDS.contains(&lower.as_str()) {
            return Ok(Value::Bool(false));
        }
        return Err(TransformError::mismatch(&value, target.name(), "not a boolean word"));
    }
    if value.kind().is_numeric() {
        match crate::comparison::to_f64(&value) {
            Some(f) if f == 0.0 => return Ok(Value::Bool(false)),
            Some(f) if f == 1.0 => return Ok(Value::Bool(true)),
            _ => {}
        }
    }
    // truthiness of anything else is a lossy reading
    t.allow_loss(&value, target)?;
    Ok(Value::Bool(value.truthy()))
}

pub(super) fn to_int(t: &Transformer<'_>, value: Value, target: &Type) -> Result<Value, TransformError> {
    let exact = |d: Decimal, value: &Value| -> Result<Value, TransformError> {
        if !d.fract().is_zero() {
            t.allow_loss(value, target)?;
        }
        d.trunc()
            .to_i64()
            .map(Value::Int)
            .ok_or_else(|| TransformError::mismatch(value, target.name(), "out of range"))
    };
    match &value {
        Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
        Value::Float(f) => {
            if !f.is_finite() {
                return Err(TransformError::mismatch(&value, target.name(), "not a finite number"));
            }
            if f.fract() != 0.0 {
                t.allow_loss(&value, target)?;
            }
            let truncated = f.trunc();
            if truncated < i64::MIN as f64 || truncated >= i64::MAX as f64 {
                return Err(TransformError::mismatch(&value, target.name(), "out of range"));
            }
            Ok(Value::Int(truncated as i64))
        }
        Value::Decimal(d) => exact(*d, &value),
        Value::Str(_) | Value::Bytes(_) => match text_of(&value).and_then(parse_number_text) {
            Some(Value::Int(i)) => Ok(Value::Int(i)),
            Some(Value::Decimal(d)) => exact(d, &value),
            _ => Err(TransformError::mismatch(&value, target.name(), "not an integer")),
        },
        Value::Duration(_) | Value::Date(_) | Value::DateTime(_) | Value::DateTimeTz(_) => {
            let seconds = duration_seconds(&value)
                .or_else(|| epoch_seconds(&value))
                .ok_or_else(|| TransformError::mismatch(&value, target.name(), "out of range"))?;
            exact(seconds, &value)
        }
        _ => t.collapse(value, target),
    }
}

pub(super) fn to_float(t: &Transformer<'_>, value: Value, target: &Type) -> Result<Value, TransformError> {
    let from_decimal = |d: Decimal, value: &Value| {
        d.to_f64()
            .map(Value::Float)
            .ok_or_else(|| TransformError::mismatch(value, target.name(), "out of range"))
    };
    match &value {
        Value::Bool(b) => Ok(Value::Float(if *b { 1.0 } else { 0.0 })),
        Value::Int(i) => Ok(Value::Float(*i as f64)),
        Value::Decimal(d) => from_decimal(*d, &value),
        Value::Str(_) | Value::Bytes(_) => {
            let text = text_of(&value).map(|s| s.replace('_', "")).unwrap_or_default();
            match text.parse::<f64>() {
                Ok(f) if !text.is_empty() => Ok(Value::Float(f)),
                _ => Err(TransformError::mismatch(&value, target.name(), "not a number")),
            }
        }
        Value::Duration(_) | Value::Date(_) | Value::DateTime(_) | Value::DateTimeTz(_) => {
            match duration_seconds(&value).or_else(|| epoch_seconds(&value)) {
                Some(d) => from_decimal(d, &value),
                None => Err(TransformError::mismatch(&value, target.name(), "out of range")),
            }
        }
        _ => t.collapse(value, target),
    }
}

pub(super) fn to_decimal(t: &Transformer<'_>, value: Value, target: &Type) -> Result<Value, TransformError> {
    match &value {
        Value::Bool(b) => Ok(Value::Decimal(Decimal::from(i64::from(*b)))),
        Value::Int(i) => Ok(Value::Decimal(Decimal::from(*i))),
        Value::Float(f) => crate::comparison::to_decimal(&value)
            .or_else(|| Decimal::from_f64(*f))
            .map(Value::Decimal)
            .ok_or_else(|| TransformError::mismatch(&value, target.name(), "not a finite number")),
        Value::Str(_) | Value::Bytes(_) => match text_of(&value).and_then(parse_number_text) {
            Some(Value::Int(i)) => Ok(Value::Decimal(Decimal::from(i))),
            Some(Value::Decimal(d)) => Ok(Value::Decimal(d)),
            _ => Err(TransformError::mismatch(&value, target.name(), "not a decimal")),
        },
        Value::Duration(_) | Value::Date(_) | Value::DateTime(_) | Value::DateTimeTz(_) => duration_seconds(&value)
            .or_else(|| epoch_seconds(&value))
            .map(Value::Decimal)
            .ok_or_else(|| TransformError::mismatch(&value, target.name(), "out of range")),
        _ => t.collapse(value, target),
    }
}
