//! Value transformers keyed on the target kind.
//!
//! A [`Registry`] is an ordered table of `(name, detector, converter,
//! priority)` entries; the first entry whose detector accepts the target kind
//! wins. [`Transformer`] applies a registry under the strictness flags of the
//! current [`Options`].

mod containers;
mod numeric;
mod temporal;
mod text;

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;
use tracing::trace;

use crate::errors::TransformError;
use crate::options::Options;
use crate::types::Type;
use crate::value::{Kind, Value};

/// Converts `value` to `target`; only called when the value does not already
/// have the target kind.
pub type Converter = fn(&Transformer<'_>, Value, &Type) -> Result<Value, TransformError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Numeric,
    Text,
    Temporal,
    Sequence,
    Mapping,
}

impl Category {
    pub fn contains(self, kind: Kind) -> bool {
        match self {
            Category::Numeric => kind.is_numeric(),
            Category::Text => kind.is_text(),
            Category::Temporal => kind.is_temporal(),
            Category::Sequence => kind.is_sequence(),
            Category::Mapping => kind == Kind::Map,
        }
    }
}

/// Decides whether a registry entry handles a target kind.
#[derive(Clone, Copy)]
pub enum Detector {
    Exact(Kind),
    Category(Category),
    Capability(fn(Kind) -> bool),
}

impl Detector {
    pub fn matches(&self, kind: Kind) -> bool {
        match self {
            Detector::Exact(k) => *k == kind,
            Detector::Category(c) => c.contains(kind),
            Detector::Capability(f) => f(kind),
        }
    }
}

impl fmt::Debug for Detector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Detector::Exact(k) => write!(f, "Exact({k})"),
            Detector::Category(c) => write!(f, "Category({c:?})"),
            Detector::Capability(_) => f.write_str("Capability(..)"),
        }
    }
}

#[derive(Clone)]
struct Entry {
    name: String,
    detector: Detector,
    converter: Converter,
    priority: i32,
}

type Cache = Arc<RwLock<HashMap<Kind, Option<Converter>>>>;

/// Ordered transformer table.
///
/// Entries are kept sorted by descending priority; equal priorities keep
/// registration order. Resolutions are cached per target kind. A base
/// registry may be chained and is consulted when no local entry matches.
#[derive(Clone, Default)]
pub struct Registry {
    entries: Arc<Vec<Entry>>,
    base: Option<Arc<Registry>>,
    cache: Cache,
}

static BUILTIN: Lazy<Registry> = Lazy::new(Registry::with_builtins);

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The default conversion table.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("null", Detector::Exact(Kind::Null), numeric::to_null, 0);
        registry.register("bool", Detector::Exact(Kind::Bool), numeric::to_bool, 0);
        registry.register("int", Detector::Exact(Kind::Int), numeric::to_int, 0);
        registry.register("float", Detector::Exact(Kind::Float), numeric::to_float, 0);
        registry.register("decimal", Detector::Exact(Kind::Decimal), numeric::to_decimal, 0);
        registry.register("str", Detector::Exact(Kind::Str), text::to_str, 0);
        registry.register("bytes", Detector::Exact(Kind::Bytes), text::to_bytes, 0);
        registry.register("uuid", Detector::Exact(Kind::Uuid), text::to_uuid, 0);
        registry.register("enum", Detector::Exact(Kind::Enum), text::to_enum, 0);
        registry.register("date", Detector::Exact(Kind::Date), temporal::to_date, 0);
        registry.register("time", Detector::Exact(Kind::Time), temporal::to_time, 0);
        registry.register("datetime", Detector::Exact(Kind::DateTime), temporal::to_datetime, 0);
        registry.register("duration", Detector::Exact(Kind::Duration), temporal::to_duration, 0);
        registry.register("sequence", Detector::Category(Category::Sequence), containers::to_sequence, -10);
        registry.register("mapping", Detector::Category(Category::Mapping), containers::to_map, -10);
        registry
    }

    /// Shared instance of [`Registry::with_builtins`].
    pub fn builtin() -> &'static Registry {
        &BUILTIN
    }

    /// Add an entry; a higher priority takes precedence over existing entries.
    pub fn register(&mut self, name: impl Into<String>, detector: Detector, converter: Converter, priority: i32) {
        let entries = Arc::make_mut(&mut self.entries);
        entries.push(Entry { name: name.into(), detector, converter, priority });
        entries.sort_by(|a, b| b.priority.cmp(&a.priority));
        // clones made before this call keep their own cache
        self.cache = Cache::default();
    }

    /// Chain `base` as the fallback for kinds no local entry handles.
    pub fn with_base(mut self, base: Registry) -> Self {
        self.base = Some(Arc::new(base));
        self.cache = Cache::default();
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    pub fn resolve(&self, kind: Kind) -> Option<Converter> {
        if let Some(hit) = self.cache.read().ok().and_then(|cache| cache.get(&kind).copied()) {
            return hit;
        }
        let found = match self.entries.iter().find(|e| e.detector.matches(kind)) {
            Some(entry) => {
                trace!(target_kind = %kind, transformer = %entry.name, "resolved transformer");
                Some(entry.converter)
            }
            None => self.base.as_ref().and_then(|base| base.resolve(kind)),
        };
        if let Ok(mut cache) = self.cache.write() {
            cache.insert(kind, found);
        }
        found
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("entries", &self.entries.iter().map(|e| (&e.name, e.detector, e.priority)).collect::<Vec<_>>())
            .field("base", &self.base.is_some())
            .finish()
    }
}

/// A registry applied under `no_explicit_cast` / `no_data_loss`.
#[derive(Debug, Clone, Copy)]
pub struct Transformer<'a> {
    registry: &'a Registry,
    no_explicit_cast: bool,
    no_data_loss: bool,
}

impl<'a> Transformer<'a> {
    pub fn new(registry: &'a Registry, options: &Options) -> Self {
        Self { registry, no_explicit_cast: options.no_explicit_cast(), no_data_loss: options.no_data_loss() }
    }

    pub fn no_explicit_cast(mut self, flag: bool) -> Self {
        self.no_explicit_cast = flag;
        self
    }

    pub fn no_data_loss(mut self, flag: bool) -> Self {
        self.no_data_loss = flag;
        self
    }

    pub fn forbids_data_loss(&self) -> bool {
        self.no_data_loss
    }

    /// Fails with [`TransformError::DataLoss`] when data loss is forbidden.
    pub(crate) fn allow_loss(&self, value: &Value, target: &Type) -> Result<(), TransformError> {
        if self.no_data_loss {
            Err(TransformError::data_loss(value, target.name()))
        } else {
            Ok(())
        }
    }

    pub fn apply(&self, value: Value, target: &Type) -> Result<Value, TransformError> {
        if target.is_exact(&value) {
            return Ok(value);
        }
        if self.no_explicit_cast && !target.is_subtype(&value) {
            return Err(TransformError::ExplicitCast { from: value.kind().name(), target: target.name() });
        }
        let value = match (value, target) {
            (Value::Enum(member), t) if !matches!(t, Type::Enum(_)) => {
                let inner = *member.value;
                if target.is_exact(&inner) {
                    return Ok(inner);
                }
                inner
            }
            (v, _) => v,
        };
        let Some(kind) = target.kind() else {
            return Ok(value);
        };
        let converter = self.registry.resolve(kind).ok_or_else(|| TransformError::Unsupported { target: target.name() })?;
        converter(self, value, target)
    }

    /// Collapse a one-element container to its element, for scalar targets.
    pub(crate) fn collapse(&self, value: Value, target: &Type) -> Result<Value, TransformError> {
        let mut items: Vec<Value> = match &value {
            Value::List(v) | Value::Tuple(v) if v.len() == 1 => v.clone(),
            Value::Set(s) if s.len() == 1 => s.iter().cloned().collect(),
            _ => return Err(TransformError::mismatch(&value, target.name(), "unsupported input")),
        };
        self.allow_loss(&value, target)?;
        match items.pop() {
            Some(item) => self.apply(item, target),
            None => Err(TransformError::mismatch(&value, target.name(), "empty container")),
        }
    }
}
