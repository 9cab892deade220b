use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::comparison::values_equal;
use crate::errors::DeclarationError;
use crate::parser::Parser;
use crate::value::{EnumMember, Kind, Value};

/// Origin type of a [`Rule`](crate::rule::Rule).
///
/// Containers are unparametrized here; their item, position, key and value
/// rules live in the owning rule's arguments.
#[derive(Clone)]
pub enum Type {
    Any,
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
    Enum(Arc<EnumType>),
    /// A nested entity parsed by its own field resolver.
    Object(Arc<Parser>),
    /// A forward-declared entity, filled in by [`RefRegistry::resolve`].
    Ref(ForwardRef),
}

impl Type {
    /// Registry dispatch key; `None` for [`Type::Any`].
    pub fn kind(&self) -> Option<Kind> {
        Some(match self {
            Type::Any => return None,
            Type::Null => Kind::Null,
            Type::Bool => Kind::Bool,
            Type::Int => Kind::Int,
            Type::Float => Kind::Float,
            Type::Decimal => Kind::Decimal,
            Type::Str => Kind::Str,
            Type::Bytes => Kind::Bytes,
            Type::Date => Kind::Date,
            Type::Time => Kind::Time,
            Type::DateTime => Kind::DateTime,
            Type::Duration => Kind::Duration,
            Type::Uuid => Kind::Uuid,
            Type::List => Kind::List,
            Type::Tuple => Kind::Tuple,
            Type::Set => Kind::Set,
            Type::Map | Type::Object(_) | Type::Ref(_) => Kind::Map,
            Type::Enum(_) => Kind::Enum,
        })
    }

    pub fn name(&self) -> String {
        match self {
            Type::Any => "any".to_string(),
            Type::Enum(e) => e.name.clone(),
            Type::Object(p) => p.name().to_string(),
            Type::Ref(r) => r.name.to_string(),
            other => other.kind().map(Kind::name).unwrap_or("any").to_string(),
        }
    }

    /// True when `value` already has this exact type and needs no conversion.
    pub fn is_exact(&self, value: &Value) -> bool {
        match (self, value) {
            (Type::Any, _) => true,
            (Type::Enum(e), Value::Enum(m)) => *m.enum_name == *e.name,
            (Type::Enum(_), _) => false,
            (ty, v) => ty.kind() == Some(v.kind()),
        }
    }

    /// Conversions still allowed when explicit casts are forbidden.
    pub fn is_subtype(&self, value: &Value) -> bool {
        let Some(target) = self.kind() else {
            return true;
        };
        match (value.kind(), target) {
            (from, to) if from == to => true,
            (Kind::Bool, Kind::Int | Kind::Float | Kind::Decimal) => true,
            (Kind::Int, Kind::Float | Kind::Decimal) => true,
            (Kind::DateTime, Kind::Date) => true,
            (Kind::Enum, to) => match value {
                Value::Enum(m) => m.value.kind() == to,
                _ => false,
            },
            _ => false,
        }
    }
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Type::Enum(a), Type::Enum(b)) => a == b,
            (Type::Object(a), Type::Object(b)) => Arc::ptr_eq(a, b),
            (Type::Ref(a), Type::Ref(b)) => a.name == b.name,
            (a, b) => std::mem::discriminant(a) == std::mem::discriminant(b),
        }
    }
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Object(p) => write!(f, "Object({})", p.name()),
            Type::Ref(r) => write!(f, "Ref({})", r.name),
            other => f.write_str(&other.name()),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl FromStr for Type {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "any" => Type::Any,
            "null" | "none" => Type::Null,
            "bool" | "boolean" => Type::Bool,
            "int" | "integer" => Type::Int,
            "float" | "number" => Type::Float,
            "decimal" => Type::Decimal,
            "str" | "string" => Type::Str,
            "bytes" => Type::Bytes,
            "date" => Type::Date,
            "time" => Type::Time,
            "datetime" => Type::DateTime,
            "duration" | "timedelta" => Type::Duration,
            "uuid" => Type::Uuid,
            "list" | "array" => Type::List,
            "tuple" => Type::Tuple,
            "set" => Type::Set,
            "map" | "dict" | "object" => Type::Map,
            other => return Err(format!("unknown type {other:?}")),
        })
    }
}

/// A closed set of named members, each storing a value.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumType {
    pub name: String,
    members: Vec<(String, Value)>,
}

impl EnumType {
    pub fn new(name: impl Into<String>, members: impl IntoIterator<Item = (impl Into<String>, impl Into<Value>)>) -> Self {
        Self {
            name: name.into(),
            members: members.into_iter().map(|(n, v)| (n.into(), v.into())).collect(),
        }
    }

    pub fn members(&self) -> &[(String, Value)] {
        &self.members
    }

    pub fn member(&self, name: &str) -> Option<EnumMember> {
        let (n, v) = self.members.iter().find(|(n, _)| n == name)?;
        Some(self.make_member(n, v))
    }

    /// Member whose stored value equals `value`.
    pub fn lookup(&self, value: &Value) -> Option<EnumMember> {
        let (n, v) = self.members.iter().find(|(_, v)| values_equal(v, value))?;
        Some(self.make_member(n, v))
    }

    /// Type of the stored values, taken from the first member.
    pub fn value_type(&self) -> Option<Type> {
        let (_, v) = self.members.first()?;
        Some(match v.kind() {
            Kind::Bool => Type::Bool,
            Kind::Int => Type::Int,
            Kind::Float => Type::Float,
            Kind::Decimal => Type::Decimal,
            Kind::Bytes => Type::Bytes,
            _ => Type::Str,
        })
    }

    fn make_member(&self, name: &str, value: &Value) -> EnumMember {
        EnumMember { enum_name: Arc::from(self.name.as_str()), name: Arc::from(name), value: Box::new(value.clone()) }
    }
}

/// Placeholder for an entity that is declared after (or inside) its users.
///
/// The slot holds a strong `Arc<Parser>`. A parser that references itself
/// through its own placeholder therefore forms a cycle and is never freed;
/// self-referential declarations live as long as the process.
#[derive(Clone)]
pub struct ForwardRef {
    name: Arc<str>,
    slot: Arc<OnceCell<Arc<Parser>>>,
}

impl ForwardRef {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The resolved parser, once [`RefRegistry::resolve`] has run.
    pub fn get(&self) -> Option<&Arc<Parser>> {
        self.slot.get()
    }
}

/// Pending-reference registry for self-referential and forward-declared types.
///
/// Declarations take a placeholder token per referenced name, the parsers are
/// registered as they become available, and a single [`resolve`] pass fills
/// every outstanding token.
///
/// [`resolve`]: RefRegistry::resolve
#[derive(Default)]
pub struct RefRegistry {
    pending: HashMap<String, ForwardRef>,
    parsers: HashMap<String, Arc<Parser>>,
}

impl RefRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn placeholder(&mut self, name: &str) -> Type {
        let token = self
            .pending
            .entry(name.to_string())
            .or_insert_with(|| ForwardRef { name: Arc::from(name), slot: Arc::new(OnceCell::new()) });
        Type::Ref(token.clone())
    }

    pub fn register(&mut self, parser: Arc<Parser>) {
        self.parsers.insert(parser.name().to_string(), parser);
    }

    pub fn resolve(&mut self) -> Result<(), DeclarationError> {
        for (name, token) in &self.pending {
            let parser = self
                .parsers
                .get(name)
                .ok_or_else(|| DeclarationError::UnresolvedReference(name.clone()))?;
            // a token filled by an earlier pass keeps its parser
            let _ = token.slot.set(Arc::clone(parser));
        }
        self.pending.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn exact_and_subtype_checks() {
        assert!(Type::Int.is_exact(&Value::Int(1)));
        assert!(!Type::Int.is_exact(&Value::Bool(true)));
        assert!(Type::Int.is_subtype(&Value::Bool(true)));
        assert!(!Type::Int.is_subtype(&Value::from("1")));
        assert!(Type::Any.is_exact(&Value::from("x")));
    }

    #[test]
    fn enum_lookup_by_value() {
        let color = EnumType::new("Color", [("Red", "r"), ("Green", "g")]);
        let member = color.lookup(&Value::from("g")).unwrap();
        assert_eq!(&*member.name, "Green");
        assert_eq!(color.value_type(), Some(Type::Str));
        assert!(color.lookup(&Value::from("b")).is_none());
    }

    #[test]
    fn resolved_placeholder_keeps_its_parser_alive() {
        use crate::field::Field;
        use crate::rule::Rule;

        let mut refs = RefRegistry::new();
        let node = refs.placeholder("Node");
        let parser = Arc::new(
            Parser::builder("Node")
                .field(Field::new("next", Rule::of(node.clone())).required(false))
                .build()
                .unwrap(),
        );
        refs.register(Arc::clone(&parser));
        refs.resolve().unwrap();
        drop(refs);

        let Type::Ref(token) = node else { panic!("expected a reference") };
        assert!(Arc::ptr_eq(token.get().unwrap(), &parser));
        // the local handle plus the slot shared by every clone of the token
        assert_eq!(Arc::strong_count(&parser), 2);
    }

    #[test]
    fn type_names_parse() {
        assert_eq!("Integer".parse::<Type>(), Ok(Type::Int));
        assert!("widget".parse::<Type>().is_err());
    }
}
