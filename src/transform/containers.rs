use url::form_urlencoded;

use super::numeric::text_of;
use super::Transformer;
use crate::errors::TransformError;
use crate::literal::parse_literal;
use crate::types::Type;
use crate::value::{Kind, Map, Set, Value};

/// Structured text: JSON first, then bracket literal syntax.
fn parse_structured(text: &str) -> Option<Value> {
    serde_json::from_str::<serde_json::Value>(text)
        .ok()
        .map(Value::from)
        .or_else(|| parse_literal(text).ok())
}

fn sequence_items(value: Value, target: &Type) -> Result<Vec<Value>, TransformError> {
    match value {
        Value::List(v) | Value::Tuple(v) => Ok(v),
        Value::Set(s) => Ok(s.into_iter().collect()),
        Value::Null | Value::Map(_) => Err(TransformError::mismatch(&value, target.name(), "not a sequence")),
        Value::Str(_) | Value::Bytes(_) => {
            let Some(text) = text_of(&value) else {
                return Err(TransformError::mismatch(&value, target.name(), "invalid utf-8"));
            };
            if text.is_empty() {
                return Ok(Vec::new());
            }
            if text.starts_with(['[', '(', '{']) {
                return match parse_structured(text) {
                    Some(parsed @ (Value::List(_) | Value::Tuple(_) | Value::Set(_))) => sequence_items(parsed, target),
                    _ => Err(TransformError::mismatch(&value, target.name(), "malformed sequence text")),
                };
            }
            let separator = [',', ';'].into_iter().find(|sep| text.contains(*sep));
            Ok(match separator {
                Some(sep) => text.split(sep).map(|part| Value::from(part.trim())).collect(),
                None => vec![Value::from(text)],
            })
        }
        scalar => Ok(vec![scalar]),
    }
}

pub(super) fn to_sequence(t: &Transformer<'_>, value: Value, target: &Type) -> Result<Value, TransformError> {
    let original = t.forbids_data_loss().then(|| value.clone());
    let items = sequence_items(value, target)?;
    match target.kind() {
        Some(Kind::List) => Ok(Value::List(items)),
        Some(Kind::Tuple) => Ok(Value::Tuple(items)),
        Some(Kind::Set) => {
            let count = items.len();
            let set: Set = items.into_iter().collect();
            if set.len() < count {
                if let Some(original) = &original {
                    return Err(TransformError::data_loss(original, target.name()));
                }
            }
            Ok(Value::Set(set))
        }
        _ => Err(TransformError::Unsupported { target: target.name() }),
    }
}

fn insert_repeated(map: &mut Map, key: &str, value: &str) {
    let key = Value::from(key);
    let value = Value::from(value);
    match map.get_mut(&key) {
        Some(Value::List(existing)) => existing.push(value),
        Some(existing) => {
            let first = std::mem::replace(existing, Value::Null);
            *existing = Value::List(vec![first, value]);
        }
        None => {
            map.insert(key, value);
        }
    }
}

fn parse_query(text: &str) -> Map {
    let mut map = Map::new();
    for (key, value) in form_urlencoded::parse(text.as_bytes()) {
        insert_repeated(&mut map, &key, &value);
    }
    map
}

fn parse_cookie(text: &str) -> Map {
    let mut map = Map::new();
    for pair in text.split(';').map(str::trim).filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        insert_repeated(&mut map, key.trim(), value.trim());
    }
    map
}

pub(super) fn to_map(_: &Transformer<'_>, value: Value, target: &Type) -> Result<Value, TransformError> {
    match &value {
        Value::Str(_) | Value::Bytes(_) => {
            let text = text_of(&value).unwrap_or_default();
            if text.is_empty() {
                return Ok(Value::Map(Map::new()));
            }
            if text.starts_with('{') {
                return match parse_structured(text) {
                    Some(Value::Map(m)) => Ok(Value::Map(m)),
                    _ => Err(TransformError::mismatch(&value, target.name(), "malformed mapping text")),
                };
            }
            if !text.contains('=') {
                return Err(TransformError::mismatch(&value, target.name(), "not a mapping"));
            }
            if text.contains(';') && !text.contains('&') {
                Ok(Value::Map(parse_cookie(text)))
            } else {
                Ok(Value::Map(parse_query(text)))
            }
        }
        Value::List(items) | Value::Tuple(items) => pairs(items.iter(), &value, target),
        Value::Set(items) => pairs(items.iter(), &value, target),
        _ => Err(TransformError::mismatch(&value, target.name(), "not a mapping")),
    }
}

fn pairs<'v>(items: impl Iterator<Item = &'v Value>, value: &Value, target: &Type) -> Result<Value, TransformError> {
    items
        .map(|item| match item {
            Value::List(kv) | Value::Tuple(kv) if kv.len() == 2 => Ok((kv[0].clone(), kv[1].clone())),
            _ => Err(TransformError::mismatch(value, target.name(), "items are not key-value pairs")),
        })
        .collect::<Result<Map, _>>()
        .map(Value::Map)
}
