//! Coerce loosely-typed input into strictly-typed, constraint-checked values,
//! and resolve key-value input against a declared set of fields.
//!
//! ```
//! use rule_coerce::{Rule, Type, Value};
//!
//! let rule = Rule::builder(Type::Int).ge(0).le(10).build().unwrap();
//! assert_eq!(rule.apply("5").unwrap(), Value::Int(5));
//! assert!(rule.apply("-1").is_err());
//! ```

pub mod errors;
pub mod value;
mod comparison;
pub mod literal;
pub mod types;
pub mod constraints;
pub mod rule;
pub mod logic;
pub mod transform;
pub mod options;
pub mod context;
pub mod field;
pub mod parser;

pub use constraints::{Constraint, ConstraintName, ConstraintValue};
pub use context::{Context, Route, RouteItem, Warning};
pub use errors::{DeclarationError, Error, ParseError, Result, TransformError};
pub use field::{DefaultValue, Discriminator, Field, Gate, Requirement};
pub use logic::{Logic, LogicOp};
pub use options::{Addition, AliasGenerator, OnError, Options};
pub use parser::{Parsed, Parser, ParserBuilder};
pub use rule::{Outcome, Rule, RuleBuilder};
pub use transform::{Registry, Transformer};
pub use types::{EnumType, RefRegistry, Type};
pub use value::{Kind, Value};

/// Parse `value` against `rule` with default options.
pub fn coerce(value: impl Into<Value>, rule: &Rule) -> std::result::Result<Value, ParseError> {
    rule.apply(value)
}
