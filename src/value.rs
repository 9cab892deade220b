use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use indexmap::{IndexMap, IndexSet};
use itertools::Itertools;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

/// Ordered mapping; keys keep insertion order.
pub type Map = IndexMap<Value, Value>;
/// Ordered set; members keep insertion order.
pub type Set = IndexSet<Value>;

/// Loosely-typed input and strictly-typed output share one representation.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Decimal(Decimal),
    Str(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    /// Naive datetime, no offset attached.
    DateTime(NaiveDateTime),
    /// Datetime carrying an explicit UTC offset.
    DateTimeTz(DateTime<FixedOffset>),
    Duration(TimeDelta),
    Uuid(Uuid),
    List(Vec<Value>),
    Tuple(Vec<Value>),
    Set(Set),
    Map(Map),
    Enum(EnumMember),
}

/// A resolved member of an enumeration type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnumMember {
    pub enum_name: Arc<str>,
    pub name: Arc<str>,
    pub value: Box<Value>,
}

/// Runtime kind of a value; also the key the transformer registry dispatches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Kind {
    Null,
    Bool,
    Int,
    Float,
    Decimal,
    Str,
    Bytes,
    Date,
    Time,
    DateTime,
    Duration,
    Uuid,
    List,
    Tuple,
    Set,
    Map,
    Enum,
}

impl Kind {
    pub fn name(self) -> &'static str {
        match self {
            Kind::Null => "null",
            Kind::Bool => "bool",
            Kind::Int => "int",
            Kind::Float => "float",
            Kind::Decimal => "decimal",
            Kind::Str => "str",
            Kind::Bytes => "bytes",
            Kind::Date => "date",
            Kind::Time => "time",
            Kind::DateTime => "datetime",
            Kind::Duration => "duration",
            Kind::Uuid => "uuid",
            Kind::List => "list",
            Kind::Tuple => "tuple",
            Kind::Set => "set",
            Kind::Map => "map",
            Kind::Enum => "enum",
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, Kind::Int | Kind::Float | Kind::Decimal)
    }

    pub fn is_text(self) -> bool {
        matches!(self, Kind::Str | Kind::Bytes)
    }

    pub fn is_temporal(self) -> bool {
        matches!(self, Kind::Date | Kind::Time | Kind::DateTime | Kind::Duration)
    }

    pub fn is_sequence(self) -> bool {
        matches!(self, Kind::List | Kind::Tuple | Kind::Set)
    }

    /// Kinds whose values have a length.
    pub fn is_sized(self) -> bool {
        self.is_text() || self.is_sequence() || self == Kind::Map
    }

    /// Kinds with a total order usable by bound constraints.
    pub fn is_ordered(self) -> bool {
        self.is_numeric() || self.is_text() || self.is_temporal() || self == Kind::Uuid
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Value {
    pub fn kind(&self) -> Kind {
        match self {
            Value::Null => Kind::Null,
            Value::Bool(_) => Kind::Bool,
            Value::Int(_) => Kind::Int,
            Value::Float(_) => Kind::Float,
            Value::Decimal(_) => Kind::Decimal,
            Value::Str(_) => Kind::Str,
            Value::Bytes(_) => Kind::Bytes,
            Value::Date(_) => Kind::Date,
            Value::Time(_) => Kind::Time,
            Value::DateTime(_) | Value::DateTimeTz(_) => Kind::DateTime,
            Value::Duration(_) => Kind::Duration,
            Value::Uuid(_) => Kind::Uuid,
            Value::List(_) => Kind::List,
            Value::Tuple(_) => Kind::Tuple,
            Value::Set(_) => Kind::Set,
            Value::Map(_) => Kind::Map,
            Value::Enum(_) => Kind::Enum,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Number of characters, bytes, items or entries; `None` for unsized kinds.
    pub fn len(&self) -> Option<usize> {
        match self {
            Value::Str(s) => Some(s.chars().count()),
            Value::Bytes(b) => Some(b.len()),
            Value::List(v) | Value::Tuple(v) => Some(v.len()),
            Value::Set(s) => Some(s.len()),
            Value::Map(m) => Some(m.len()),
            _ => None,
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Decimal(d) => !d.is_zero(),
            Value::Str(s) => !s.is_empty(),
            Value::Bytes(b) => !b.is_empty(),
            Value::Duration(d) => *d != TimeDelta::zero(),
            Value::List(v) | Value::Tuple(v) => !v.is_empty(),
            Value::Set(s) => !s.is_empty(),
            Value::Map(m) => !m.is_empty(),
            Value::Enum(m) => m.value.truthy(),
            Value::Date(_) | Value::Time(_) | Value::DateTime(_) | Value::DateTimeTz(_) | Value::Uuid(_) => true,
        }
    }

    /// Render as a mapping key: strings stay bare, everything else uses `Display`.
    pub fn key_string(&self) -> String {
        match self {
            Value::Str(s) => s.clone(),
            Value::Enum(m) => m.value.key_string(),
            other => other.to_string(),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as J;
        match self {
            Value::Null => J::Null,
            Value::Bool(b) => J::Bool(*b),
            Value::Int(i) => J::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f).map(J::Number).unwrap_or(J::Null),
            Value::Decimal(d) => J::String(d.to_string()),
            Value::Str(s) => J::String(s.clone()),
            Value::Bytes(b) => J::String(String::from_utf8_lossy(b).into_owned()),
            Value::Date(d) => J::String(d.format("%Y-%m-%d").to_string()),
            Value::Time(t) => J::String(t.format("%H:%M:%S%.f").to_string()),
            Value::DateTime(dt) => J::String(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
            Value::DateTimeTz(dt) => J::String(dt.to_rfc3339()),
            Value::Duration(d) => {
                let secs = d.num_microseconds().map(|us| us as f64 / 1e6).unwrap_or(d.num_seconds() as f64);
                serde_json::Number::from_f64(secs).map(J::Number).unwrap_or(J::Null)
            }
            Value::Uuid(u) => J::String(u.to_string()),
            Value::List(v) | Value::Tuple(v) => J::Array(v.iter().map(Value::to_json).collect()),
            Value::Set(s) => J::Array(s.iter().map(Value::to_json).collect()),
            Value::Map(m) => J::Object(m.iter().map(|(k, v)| (k.key_string(), v.to_json())).collect()),
            Value::Enum(m) => m.value.to_json(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::Decimal(a), Value::Decimal(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::Time(a), Value::Time(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::DateTimeTz(a), Value::DateTimeTz(b)) => a == b,
            (Value::Duration(a), Value::Duration(b)) => a == b,
            (Value::Uuid(a), Value::Uuid(b)) => a == b,
            (Value::List(a), Value::List(b)) | (Value::Tuple(a), Value::Tuple(b)) => a == b,
            (Value::Set(a), Value::Set(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Enum(a), Value::Enum(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::Int(i) => i.hash(state),
            Value::Float(f) => {
                // equal floats must hash equally: fold -0.0 and every NaN
                let bits = if *f == 0.0 {
                    0
                } else if f.is_nan() {
                    f64::NAN.to_bits()
                } else {
                    f.to_bits()
                };
                bits.hash(state)
            }
            Value::Decimal(d) => d.hash(state),
            Value::Str(s) => s.hash(state),
            Value::Bytes(b) => b.hash(state),
            Value::Date(d) => d.hash(state),
            Value::Time(t) => t.hash(state),
            Value::DateTime(dt) => dt.hash(state),
            Value::DateTimeTz(dt) => dt.hash(state),
            Value::Duration(d) => d.hash(state),
            Value::Uuid(u) => u.hash(state),
            Value::List(v) | Value::Tuple(v) => v.hash(state),
            // set and map equality ignores order, so only the size is hashed
            Value::Set(s) => s.len().hash(state),
            Value::Map(m) => m.len().hash(state),
            Value::Enum(m) => m.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Decimal(d) => write!(f, "{d}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Bytes(b) => write!(f, "b{:?}", String::from_utf8_lossy(b)),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::Time(t) => write!(f, "{}", t.format("%H:%M:%S%.f")),
            Value::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S%.f")),
            Value::DateTimeTz(dt) => f.write_str(&dt.to_rfc3339()),
            Value::Duration(d) => write!(f, "{d}"),
            Value::Uuid(u) => write!(f, "{u}"),
            Value::List(v) => write!(f, "[{}]", v.iter().join(", ")),
            Value::Tuple(v) => write!(f, "({})", v.iter().join(", ")),
            Value::Set(s) => write!(f, "{{{}}}", s.iter().join(", ")),
            Value::Map(m) => write!(f, "{{{}}}", m.iter().map(|(k, v)| format!("{k}: {v}")).join(", ")),
            Value::Enum(m) => write!(f, "{}.{}", m.enum_name, m.name),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Value::from)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        use serde_json::Value as J;
        match v {
            J::Null => Value::Null,
            J::Bool(b) => Value::Bool(b),
            J::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Value::Decimal(Decimal::from(u))
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            J::String(s) => Value::Str(s),
            J::Array(a) => Value::List(a.into_iter().map(Value::from).collect()),
            J::Object(o) => Value::Map(o.into_iter().map(|(k, v)| (Value::Str(k), Value::from(v))).collect()),
        }
    }
}

macro_rules! impl_from {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::$variant(v.into())
            }
        })*
    };
}

impl_from! {
    bool => Bool,
    i64 => Int,
    i32 => Int,
    u32 => Int,
    f64 => Float,
    Decimal => Decimal,
    String => Str,
    &str => Str,
    Vec<u8> => Bytes,
    NaiveDate => Date,
    NaiveTime => Time,
    NaiveDateTime => DateTime,
    DateTime<FixedOffset> => DateTimeTz,
    TimeDelta => Duration,
    Uuid => Uuid,
    Vec<Value> => List,
    Map => Map,
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        i64::try_from(v).map(Value::Int).unwrap_or_else(|_| Value::Decimal(Decimal::from(v)))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}
