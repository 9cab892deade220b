use rust_decimal::prelude::ToPrimitive;
use uuid::Uuid;

use super::numeric::text_of;
use super::Transformer;
use crate::errors::TransformError;
use crate::types::Type;
use crate::value::Value;

fn float_text(f: f64) -> String {
    match serde_json::Number::from_f64(f) {
        Some(n) => n.to_string(),
        None => f.to_string(),
    }
}

fn json_text(value: &Value) -> String {
    value.to_json().to_string()
}

pub(super) fn to_str(t: &Transformer<'_>, value: Value, target: &Type) -> Result<Value, TransformError> {
    let text = match &value {
        Value::Bytes(b) => match std::str::from_utf8(b) {
            Ok(s) => s.to_string(),
            Err(_) => {
                t.allow_loss(&value, target)?;
                String::from_utf8_lossy(b).into_owned()
            }
        },
        Value::Null => return Err(TransformError::mismatch(&value, target.name(), "null has no text form")),
        Value::Float(f) => float_text(*f),
        Value::Duration(d) => d.to_string(),
        Value::List(v) | Value::Tuple(v) if v.len() == 1 && !t.forbids_data_loss() => return t.collapse(value, target),
        Value::Set(s) if s.len() == 1 && !t.forbids_data_loss() => return t.collapse(value, target),
        Value::List(_) | Value::Tuple(_) | Value::Set(_) | Value::Map(_) => json_text(&value),
        other => match other.to_json() {
            serde_json::Value::String(s) => s,
            json => json.to_string(),
        },
    };
    Ok(Value::Str(text))
}

pub(super) fn to_bytes(t: &Transformer<'_>, value: Value, target: &Type) -> Result<Value, TransformError> {
    match to_str(t, value, &Type::Str) {
        Ok(Value::Str(s)) => Ok(Value::Bytes(s.into_bytes())),
        Ok(other) => Err(TransformError::mismatch(&other, target.name(), "no byte form")),
        Err(TransformError::Mismatch { value, reason, .. }) => Err(TransformError::Mismatch { value, target: target.name(), reason }),
        Err(err) => Err(err),
    }
}

pub(super) fn to_uuid(t: &Transformer<'_>, value: Value, target: &Type) -> Result<Value, TransformError> {
    let invalid = |value: &Value| TransformError::mismatch(value, target.name(), "not a uuid");
    match &value {
        Value::Bytes(b) if b.len() == 16 => Uuid::from_slice(b).map(Value::Uuid).map_err(|_| invalid(&value)),
        Value::Str(_) | Value::Bytes(_) => text_of(&value)
            .and_then(|s| Uuid::parse_str(s).ok())
            .map(Value::Uuid)
            .ok_or_else(|| invalid(&value)),
        Value::Int(i) => u128::try_from(*i).map(|n| Value::Uuid(Uuid::from_u128(n))).map_err(|_| invalid(&value)),
        Value::Decimal(d) if d.fract().is_zero() => d
            .to_u128()
            .map(|n| Value::Uuid(Uuid::from_u128(n)))
            .ok_or_else(|| invalid(&value)),
        _ => t.collapse(value, target),
    }
}

/// Member lookup: by stored value, then by member name, then by the stored
/// value after coercion to the members' kind.
pub(super) fn to_enum(t: &Transformer<'_>, value: Value, target: &Type) -> Result<Value, TransformError> {
    let Type::Enum(enum_type) = target else {
        return Err(TransformError::Unsupported { target: target.name() });
    };
    let candidate = match value {
        Value::Enum(member) => *member.value,
        other => other,
    };
    if let Some(member) = enum_type.lookup(&candidate) {
        return Ok(Value::Enum(member));
    }
    if let Some(member) = candidate.as_str().and_then(|name| enum_type.member(name.trim())) {
        return Ok(Value::Enum(member));
    }
    if let Some(value_type) = enum_type.value_type() {
        if let Ok(coerced) = t.apply(candidate.clone(), &value_type) {
            if let Some(member) = enum_type.lookup(&coerced) {
                return Ok(Value::Enum(member));
            }
        }
    }
    Err(TransformError::mismatch(&candidate, target.name(), "not a member"))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::options::Options;
    use crate::transform::Registry;
    use crate::types::EnumType;
    use pretty_assertions::assert_eq;

    fn lax() -> Transformer<'static> {
        Transformer::new(Registry::builtin(), &Options::default())
    }

    #[test]
    fn text_forms_of_scalars_and_containers() {
        assert_eq!(lax().apply(Value::Float(1.0), &Type::Str).unwrap(), Value::from("1.0"));
        assert_eq!(lax().apply(Value::Bool(true), &Type::Str).unwrap(), Value::from("true"));
        assert_eq!(lax().apply(Value::List(vec![Value::Int(7)]), &Type::Str).unwrap(), Value::from("7"));
        assert_eq!(
            lax().no_data_loss(true).apply(Value::List(vec![Value::Int(7)]), &Type::Str).unwrap(),
            Value::from("[7]")
        );
        assert_eq!(lax().apply(Value::from("é"), &Type::Bytes).unwrap(), Value::Bytes("é".as_bytes().to_vec()));
    }

    #[test]
    fn invalid_utf8_is_lossy() {
        let raw = Value::Bytes(vec![0x66, 0xff]);
        assert_eq!(lax().apply(raw.clone(), &Type::Str).unwrap(), Value::from("f\u{fffd}"));
        assert!(matches!(lax().no_data_loss(true).apply(raw, &Type::Str), Err(TransformError::DataLoss { .. })));
    }

    #[test]
    fn uuids_from_text_bytes_and_integers() {
        let id = Uuid::from_u128(42);
        assert_eq!(lax().apply(Value::from(id.to_string()), &Type::Uuid).unwrap(), Value::Uuid(id));
        assert_eq!(lax().apply(Value::Bytes(id.as_bytes().to_vec()), &Type::Uuid).unwrap(), Value::Uuid(id));
        assert_eq!(lax().apply(Value::Int(42), &Type::Uuid).unwrap(), Value::Uuid(id));
        assert!(lax().apply(Value::from("not-a-uuid"), &Type::Uuid).is_err());
    }

    #[test]
    fn enum_members_by_value_name_or_coerced_value() {
        let level = Type::Enum(Arc::new(EnumType::new("Level", [("Low", 1), ("High", 2)])));
        let Value::Enum(m) = lax().apply(Value::Int(2), &level).unwrap() else { panic!("expected member") };
        assert_eq!(&*m.name, "High");
        let Value::Enum(m) = lax().apply(Value::from("Low"), &level).unwrap() else { panic!("expected member") };
        assert_eq!(&*m.name, "Low");
        let Value::Enum(m) = lax().apply(Value::from("2"), &level).unwrap() else { panic!("expected member") };
        assert_eq!(&*m.name, "High");
        assert!(lax().apply(Value::Int(3), &level).is_err());
    }
}
