use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use itertools::Itertools;
use regex::Regex;
use tracing::debug;

use crate::comparison::compare_values;
use crate::constraints::{Constraint, ConstraintName, ConstraintValue};
use crate::context::{Context, RouteItem};
use crate::errors::{DeclarationError, ParseError, TransformError};
use crate::logic::{Logic, LogicOp};
use crate::options::{OnError, Options};
use crate::transform::{Registry, Transformer};
use crate::types::Type;
use crate::value::{Map, Value};

/// Value hook run before or after validation.
pub type Hook = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// A type-spec: origin type, argument rules, ordered constraints and an
/// optional logical combinator.
///
/// Rules are immutable once built and may be shared freely between fields
/// and threads.
#[derive(Clone, Default)]
pub struct Rule {
    origin: Option<Type>,
    args: Vec<Rule>,
    constraints: Vec<Constraint>,
    logic: Option<Logic>,
    pre_validate: Option<Hook>,
    post_validate: Option<Hook>,
    on_error: Option<OnError>,
}

impl Rule {
    /// Unconstrained rule for `origin`.
    pub fn of(origin: Type) -> Self {
        Self { origin: Some(origin), ..Self::default() }
    }

    /// Accepts every value unchanged.
    pub fn any() -> Self {
        Self::default()
    }

    pub fn builder(origin: Type) -> RuleBuilder {
        RuleBuilder::new(origin)
    }

    pub fn list_of(item: Rule) -> Self {
        Self { origin: Some(Type::List), args: vec![item], ..Self::default() }
    }

    pub fn set_of(item: Rule) -> Self {
        Self { origin: Some(Type::Set), args: vec![item], ..Self::default() }
    }

    pub fn tuple_of(positions: impl IntoIterator<Item = Rule>) -> Self {
        Self { origin: Some(Type::Tuple), args: positions.into_iter().collect(), ..Self::default() }
    }

    pub fn map_of(key: Rule, value: Rule) -> Self {
        Self { origin: Some(Type::Map), args: vec![key, value], ..Self::default() }
    }

    pub fn any_of(branches: impl IntoIterator<Item = Rule>) -> Result<Self, DeclarationError> {
        Self::combine(LogicOp::AnyOf, branches)
    }

    pub fn one_of(branches: impl IntoIterator<Item = Rule>) -> Result<Self, DeclarationError> {
        Self::combine(LogicOp::OneOf, branches)
    }

    pub fn all_of(branches: impl IntoIterator<Item = Rule>) -> Result<Self, DeclarationError> {
        Self::combine(LogicOp::AllOf, branches)
    }

    pub fn not(branches: impl IntoIterator<Item = Rule>) -> Result<Self, DeclarationError> {
        Self::combine(LogicOp::Not, branches)
    }

    fn combine(op: LogicOp, branches: impl IntoIterator<Item = Rule>) -> Result<Self, DeclarationError> {
        Ok(Self { logic: Some(Logic::new(op, branches)?), ..Self::default() })
    }

    pub fn origin(&self) -> Option<&Type> {
        self.origin.as_ref()
    }

    pub fn args(&self) -> &[Rule] {
        &self.args
    }

    /// Ordered constraints, in evaluation order.
    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn constraint(&self, name: ConstraintName) -> Option<&Constraint> {
        self.constraints.iter().find(|c| c.name() == name)
    }

    pub fn logic(&self) -> Option<&Logic> {
        self.logic.as_ref()
    }

    pub fn on_error(&self) -> Option<OnError> {
        self.on_error
    }

    /// Parse `value` in a fresh root context built from default options.
    pub fn apply(&self, value: impl Into<Value>) -> Result<Value, ParseError> {
        self.apply_with(value, &Options::default())
    }

    pub fn apply_with(&self, value: impl Into<Value>, options: &Options) -> Result<Value, ParseError> {
        let mut ctx = options.make_context();
        match self.parse(value.into(), &mut ctx) {
            Ok(value) => {
                ctx.finish()?;
                Ok(value)
            }
            Err(err) if ctx.has_errors() => Err(ctx.raise_error(Some(err))),
            Err(err) => Err(err),
        }
    }

    pub fn parse(&self, value: Value, ctx: &mut Context) -> Result<Value, ParseError> {
        let mut value = match &self.pre_validate {
            Some(hook) => hook(value),
            None => value,
        };

        if let Some(origin) = &self.origin {
            value = self.transform(value, origin, ctx)?;
            if let Some(nested) = self.nested_parser(origin, &value, ctx)? {
                let mut child = ctx.speculate_with(nested.options());
                let result = nested.parse_data(value, &mut child);
                ctx.absorb(child)?;
                value = Value::Map(result?.into_iter().map(|(k, v)| (Value::Str(k), v)).collect());
            }
        }

        if !self.args.is_empty() {
            value = self.parse_args(value, ctx)?;
        }

        if let Some(logic) = &self.logic {
            value = logic.parse(value, ctx)?;
        }

        if !self.constraints.is_empty() && !ctx.options().ignore_constraints() {
            for constraint in &self.constraints {
                match constraint.validate(&value, &self.constraints, ctx) {
                    Ok(Some(replaced)) => value = replaced,
                    Ok(None) => {}
                    Err(err) => ctx.collect(err)?,
                }
            }
        }

        Ok(match &self.post_validate {
            Some(hook) => hook(value),
            None => value,
        })
    }

    /// Origin conversion; failures are raised even in collect mode.
    fn transform(&self, value: Value, origin: &Type, ctx: &Context) -> Result<Value, ParseError> {
        let options = ctx.options();
        let raw = value.clone();
        Transformer::new(options.registry(), options)
            .apply(value, origin)
            .map_err(|source| ParseError::Coercion { route: ctx.route().clone(), value: raw, target: origin.name(), source })
    }

    fn nested_parser(
        &self,
        origin: &Type,
        value: &Value,
        ctx: &Context,
    ) -> Result<Option<Arc<crate::parser::Parser>>, ParseError> {
        match origin {
            Type::Object(parser) => Ok(Some(Arc::clone(parser))),
            Type::Ref(token) => match token.get() {
                Some(parser) => Ok(Some(Arc::clone(parser))),
                None => Err(ParseError::Coercion {
                    route: ctx.route().clone(),
                    value: value.clone(),
                    target: origin.name(),
                    source: TransformError::Unsupported { target: format!("unresolved reference {}", token.name()) },
                }),
            },
            _ => Ok(None),
        }
    }

    fn parse_args(&self, value: Value, ctx: &mut Context) -> Result<Value, ParseError> {
        match value {
            Value::List(items) => Ok(Value::List(self.parse_items(items, ctx)?)),
            Value::Set(items) => Ok(Value::Set(self.parse_items(items.into_iter().collect(), ctx)?.into_iter().collect())),
            Value::Tuple(items) => Ok(Value::Tuple(self.parse_positions(items, ctx)?)),
            Value::Map(entries) if self.args.len() == 2 => Ok(Value::Map(self.parse_entries(entries, ctx)?)),
            other => Ok(other),
        }
    }

    fn parse_items(&self, items: Vec<Value>, ctx: &mut Context) -> Result<Vec<Value>, ParseError> {
        let item_rule = &self.args[0];
        let policy = self.on_error.unwrap_or_else(|| ctx.options().invalid_items());
        let mut out = Vec::with_capacity(items.len());
        for (index, item) in items.into_iter().enumerate() {
            out.extend(parse_element(item_rule, item, ctx, index.into(), policy)?);
        }
        Ok(out)
    }

    fn parse_positions(&self, mut items: Vec<Value>, ctx: &mut Context) -> Result<Vec<Value>, ParseError> {
        let arity = self.args.len();
        if items.len() < arity {
            let value = Value::Tuple(items);
            return Err(ParseError::Coercion {
                route: ctx.route().clone(),
                source: TransformError::mismatch(&value, "tuple", format!("expected {arity} items")),
                value,
                target: "tuple".to_string(),
            });
        }
        if items.len() > arity {
            if ctx.options().no_data_loss() {
                let value = Value::Tuple(items);
                return Err(ParseError::Coercion {
                    route: ctx.route().clone(),
                    source: TransformError::data_loss(&value, "tuple"),
                    value,
                    target: "tuple".to_string(),
                });
            }
            ctx.warn(format!("dropped {} items beyond tuple arity {arity}", items.len() - arity));
            items.truncate(arity);
        }
        let policy = self.on_error.unwrap_or_else(|| ctx.options().invalid_items());
        let mut out = Vec::with_capacity(arity);
        for (index, (item, rule)) in items.into_iter().zip(&self.args).enumerate() {
            out.extend(parse_element(rule, item, ctx, index.into(), policy)?);
        }
        Ok(out)
    }

    fn parse_entries(&self, entries: Map, ctx: &mut Context) -> Result<Map, ParseError> {
        let (key_rule, value_rule) = (&self.args[0], &self.args[1]);
        let key_policy = self.on_error.unwrap_or_else(|| ctx.options().invalid_keys());
        let value_policy = self.on_error.unwrap_or_else(|| ctx.options().invalid_values());
        let mut out = Map::with_capacity(entries.len());
        for (key, value) in entries {
            let item = RouteItem::Key(key.key_string());
            let Some(key) = parse_element(key_rule, key, ctx, item.clone(), key_policy)? else {
                continue;
            };
            if let Some(value) = parse_element(value_rule, value, ctx, item, value_policy)? {
                out.insert(key, value);
            }
        }
        Ok(out)
    }
}

/// Result of parsing a value under an error policy.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Parsed(Value),
    /// The value failed and was kept as given.
    Preserved(Value),
    /// The value failed and was dropped.
    Excluded,
    /// The value failed and its errors went to the context.
    Collected,
}

impl Outcome {
    /// The value to keep, if any.
    pub fn into_value(self) -> Option<Value> {
        match self {
            Outcome::Parsed(v) | Outcome::Preserved(v) => Some(v),
            Outcome::Excluded | Outcome::Collected => None,
        }
    }
}

/// Parse `value` in a child context entered at `item` and apply `policy` on failure.
pub(crate) fn parse_guarded(
    rule: &Rule,
    value: Value,
    ctx: &mut Context,
    item: RouteItem,
    policy: OnError,
) -> Result<Outcome, ParseError> {
    let mut child = ctx.enter(item)?;
    let raw = (policy == OnError::Preserve).then(|| value.clone());
    let result = rule.parse(value, &mut child);
    match result {
        Ok(parsed) if !child.has_errors() => {
            ctx.absorb(child)?;
            Ok(Outcome::Parsed(parsed))
        }
        failed => {
            let errors = child.take_failure(failed.err());
            ctx.absorb_warnings(&mut child);
            match (policy, raw) {
                (OnError::Exclude, _) => {
                    child.warn(format!("excluded invalid value: {}", errors.iter().join("; ")));
                    ctx.absorb_warnings(&mut child);
                    Ok(Outcome::Excluded)
                }
                (OnError::Preserve, Some(raw)) => {
                    child.warn(format!("preserved invalid value: {}", errors.iter().join("; ")));
                    ctx.absorb_warnings(&mut child);
                    Ok(Outcome::Preserved(raw))
                }
                _ => {
                    for error in errors {
                        ctx.collect(error)?;
                    }
                    Ok(Outcome::Collected)
                }
            }
        }
    }
}

fn parse_element(
    rule: &Rule,
    value: Value,
    ctx: &mut Context,
    item: RouteItem,
    policy: OnError,
) -> Result<Option<Value>, ParseError> {
    parse_guarded(rule, value, ctx, item, policy).map(Outcome::into_value)
}

impl PartialEq for Rule {
    fn eq(&self, other: &Self) -> bool {
        let same_hook = |a: &Option<Hook>, b: &Option<Hook>| match (a, b) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        };
        self.origin == other.origin
            && self.args == other.args
            && self.constraints == other.constraints
            && self.logic == other.logic
            && self.on_error == other.on_error
            && same_hook(&self.pre_validate, &other.pre_validate)
            && same_hook(&self.post_validate, &other.post_validate)
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.origin, &self.logic) {
            (None, Some(logic)) => write!(f, "{logic:?}")?,
            (origin, logic) => {
                f.write_str(&origin.as_ref().map(Type::name).unwrap_or_else(|| "any".to_string()))?;
                if let Some(logic) = logic {
                    write!(f, " & {logic:?}")?;
                }
            }
        }
        if !self.args.is_empty() {
            write!(f, "[{}]", self.args.iter().map(|a| format!("{a:?}")).join(", "))?;
        }
        if !self.constraints.is_empty() {
            write!(f, "({})", self.constraints.iter().map(|c| format!("{c:?}")).join(", "))?;
        }
        Ok(())
    }
}

enum Pending {
    Value(Value),
    Pattern(String),
    Rule(Rule),
}

/// Collects constraint declarations and checks them as a whole in
/// [`build`](RuleBuilder::build).
pub struct RuleBuilder {
    origin: Type,
    args: Vec<Rule>,
    entries: Vec<(ConstraintName, Pending, bool)>,
    pre_validate: Option<Hook>,
    post_validate: Option<Hook>,
    on_error: Option<OnError>,
}

impl RuleBuilder {
    pub fn new(origin: Type) -> Self {
        Self { origin, args: Vec::new(), entries: Vec::new(), pre_validate: None, post_validate: None, on_error: None }
    }

    fn push(mut self, name: ConstraintName, value: Pending, lax: bool) -> Self {
        self.entries.push((name, value, lax));
        self
    }

    /// Declare any value-valued constraint by name.
    pub fn constraint(self, name: ConstraintName, value: impl Into<Value>) -> Self {
        self.push(name, Pending::Value(value.into()), false)
    }

    /// Declare the lax form of a constraint.
    pub fn lax(self, name: ConstraintName, value: impl Into<Value>) -> Self {
        self.push(name, Pending::Value(value.into()), true)
    }

    pub fn gt(self, value: impl Into<Value>) -> Self {
        self.constraint(ConstraintName::Gt, value)
    }

    pub fn ge(self, value: impl Into<Value>) -> Self {
        self.constraint(ConstraintName::Ge, value)
    }

    pub fn lt(self, value: impl Into<Value>) -> Self {
        self.constraint(ConstraintName::Lt, value)
    }

    pub fn le(self, value: impl Into<Value>) -> Self {
        self.constraint(ConstraintName::Le, value)
    }

    pub fn multiple_of(self, value: impl Into<Value>) -> Self {
        self.constraint(ConstraintName::MultipleOf, value)
    }

    pub fn constant(self, value: impl Into<Value>) -> Self {
        self.constraint(ConstraintName::Const, value)
    }

    pub fn enum_values<V: Into<Value>>(self, values: impl IntoIterator<Item = V>) -> Self {
        let values = Value::List(values.into_iter().map(Into::into).collect());
        self.constraint(ConstraintName::Enum, values)
    }

    pub fn pattern(self, pattern: impl Into<String>) -> Self {
        self.push(ConstraintName::Regex, Pending::Pattern(pattern.into()), false)
    }

    pub fn max_digits(self, digits: usize) -> Self {
        self.constraint(ConstraintName::MaxDigits, digits)
    }

    pub fn decimal_places(self, places: usize) -> Self {
        self.constraint(ConstraintName::DecimalPlaces, places)
    }

    pub fn length(self, length: usize) -> Self {
        self.constraint(ConstraintName::Length, length)
    }

    pub fn min_length(self, length: usize) -> Self {
        self.constraint(ConstraintName::MinLength, length)
    }

    pub fn max_length(self, length: usize) -> Self {
        self.constraint(ConstraintName::MaxLength, length)
    }

    pub fn contains(self, rule: Rule) -> Self {
        self.push(ConstraintName::Contains, Pending::Rule(rule), false)
    }

    pub fn min_contains(self, count: usize) -> Self {
        self.constraint(ConstraintName::MinContains, count)
    }

    pub fn max_contains(self, count: usize) -> Self {
        self.constraint(ConstraintName::MaxContains, count)
    }

    pub fn unique_items(self) -> Self {
        self.constraint(ConstraintName::UniqueItems, true)
    }

    pub fn arg(mut self, rule: Rule) -> Self {
        self.args.push(rule);
        self
    }

    pub fn args(mut self, rules: impl IntoIterator<Item = Rule>) -> Self {
        self.args.extend(rules);
        self
    }

    pub fn pre_validate(mut self, hook: impl Fn(Value) -> Value + Send + Sync + 'static) -> Self {
        self.pre_validate = Some(Arc::new(hook));
        self
    }

    pub fn post_validate(mut self, hook: impl Fn(Value) -> Value + Send + Sync + 'static) -> Self {
        self.post_validate = Some(Arc::new(hook));
        self
    }

    pub fn on_error(mut self, policy: OnError) -> Self {
        self.on_error = Some(policy);
        self
    }

    pub fn build(self) -> Result<Rule, DeclarationError> {
        let mut seen = HashSet::new();
        for (name, pending, _) in &self.entries {
            if !seen.insert(*name) {
                return Err(DeclarationError::InvalidConstraintValue {
                    constraint: *name,
                    value: pending_value(pending),
                    reason: "declared more than once".to_string(),
                });
            }
        }
        for (a, b) in [(ConstraintName::Gt, ConstraintName::Ge), (ConstraintName::Lt, ConstraintName::Le)] {
            if seen.contains(&a) && seen.contains(&b) {
                return Err(DeclarationError::ExclusiveConstraints(a, b));
            }
        }

        let origin_kind = self.origin.kind();
        let mut constraints = Vec::with_capacity(self.entries.len());
        for (name, pending, lax) in self.entries {
            if let Some(kind) = origin_kind {
                if !supports(name, kind) {
                    return Err(DeclarationError::UnsupportedConstraint { constraint: name, target: self.origin.name() });
                }
            }
            if lax && (!name.has_lax_form() || (matches!(name, ConstraintName::Gt | ConstraintName::Lt) && !origin_kind.is_some_and(|k| k.is_numeric()))) {
                return Err(DeclarationError::NoLaxForm(name));
            }
            let value = match pending {
                Pending::Pattern(pattern) => match Regex::new(&pattern) {
                    Ok(re) => ConstraintValue::Pattern(re),
                    Err(e) => return Err(DeclarationError::InvalidPattern { pattern, reason: e.to_string() }),
                },
                Pending::Rule(rule) => ConstraintValue::Rule(Box::new(rule)),
                Pending::Value(value) => ConstraintValue::Value(check_value(name, value, &self.origin)?),
            };
            if name == ConstraintName::UniqueItems && value == ConstraintValue::Value(Value::Bool(false)) {
                continue;
            }
            constraints.push(Constraint::new(name, value, lax));
        }

        check_consistency(&constraints)?;

        let suppressor = [ConstraintName::Const, ConstraintName::Enum]
            .into_iter()
            .find(|name| constraints.iter().any(|c| c.name() == *name));
        if let Some(keep) = suppressor {
            if constraints.len() > 1 {
                debug!(constraint = %keep, dropped = constraints.len() - 1, "constraint suppresses the others");
            }
            constraints.retain(|c| c.name() == keep);
        }
        constraints.sort_by_key(|c| (c.name().priority(), c.name()));

        Ok(Rule {
            origin: Some(self.origin),
            args: self.args,
            constraints,
            logic: None,
            pre_validate: self.pre_validate,
            post_validate: self.post_validate,
            on_error: self.on_error,
        })
    }
}

fn pending_value(pending: &Pending) -> Value {
    match pending {
        Pending::Value(v) => v.clone(),
        Pending::Pattern(p) => Value::from(p.as_str()),
        Pending::Rule(r) => Value::Str(format!("{r:?}")),
    }
}

fn supports(name: ConstraintName, kind: crate::value::Kind) -> bool {
    match name {
        ConstraintName::Gt | ConstraintName::Ge | ConstraintName::Lt | ConstraintName::Le => kind.is_ordered(),
        ConstraintName::MultipleOf | ConstraintName::DecimalPlaces | ConstraintName::MaxDigits => kind.is_numeric(),
        ConstraintName::Regex => kind.is_text(),
        ConstraintName::Length | ConstraintName::MinLength | ConstraintName::MaxLength => kind.is_sized(),
        ConstraintName::Contains
        | ConstraintName::MinContains
        | ConstraintName::MaxContains
        | ConstraintName::UniqueItems => kind.is_sequence(),
        ConstraintName::Const | ConstraintName::Enum => true,
    }
}

/// Normalize a declared constraint value: bounds and constants take the
/// origin type, counts must be non-negative integers.
fn check_value(name: ConstraintName, value: Value, origin: &Type) -> Result<Value, DeclarationError> {
    let invalid = |value: &Value, reason: String| DeclarationError::InvalidConstraintValue {
        constraint: name,
        value: value.clone(),
        reason,
    };
    let to_origin = |value: Value| {
        let raw = value.clone();
        Transformer::new(Registry::builtin(), &Options::default())
            .apply(value, origin)
            .map_err(|e| invalid(&raw, e.to_string()))
    };
    match name {
        ConstraintName::Gt | ConstraintName::Ge | ConstraintName::Lt | ConstraintName::Le | ConstraintName::Const => {
            to_origin(value)
        }
        ConstraintName::Enum => match value {
            Value::List(items) if !items.is_empty() => {
                items.into_iter().map(to_origin).collect::<Result<Vec<_>, _>>().map(Value::List)
            }
            other => Err(invalid(&other, "expected a non-empty list of values".to_string())),
        },
        ConstraintName::MultipleOf => {
            if !value.kind().is_numeric() || compare_values(&value, &Value::Int(0)) != Some(std::cmp::Ordering::Greater) {
                return Err(invalid(&value, "expected a positive number".to_string()));
            }
            Ok(value)
        }
        ConstraintName::UniqueItems => match value {
            Value::Bool(_) => Ok(value),
            other => Err(invalid(&other, "expected a boolean".to_string())),
        },
        ConstraintName::Regex | ConstraintName::Contains => Err(invalid(&value, "expected a pattern or rule".to_string())),
        _ => match value {
            Value::Int(n) if n >= 0 => Ok(value),
            other => Err(invalid(&other, "expected a non-negative integer".to_string())),
        },
    }
}

fn check_consistency(constraints: &[Constraint]) -> Result<(), DeclarationError> {
    let get = |name: ConstraintName| {
        constraints.iter().find(|c| c.name() == name).and_then(|c| match c.value() {
            ConstraintValue::Value(v) => Some(v.clone()),
            _ => None,
        })
    };
    let count = |name: ConstraintName| get(name).and_then(|v| v.as_i64());
    let invalid = |constraint: ConstraintName, value: Value, reason: &str| DeclarationError::InvalidConstraintValue {
        constraint,
        value,
        reason: reason.to_string(),
    };

    let lower = get(ConstraintName::Gt).map(|v| (v, true)).or_else(|| get(ConstraintName::Ge).map(|v| (v, false)));
    let upper = get(ConstraintName::Lt).map(|v| (v, true)).or_else(|| get(ConstraintName::Le).map(|v| (v, false)));
    if let (Some((low, low_strict)), Some((high, high_strict))) = (lower, upper) {
        let empty = match compare_values(&low, &high) {
            Some(std::cmp::Ordering::Greater) => true,
            Some(std::cmp::Ordering::Equal) => low_strict || high_strict,
            _ => false,
        };
        if empty {
            let name = if high_strict { ConstraintName::Lt } else { ConstraintName::Le };
            return Err(invalid(name, high, "upper bound is below the lower bound"));
        }
    }

    let min_len = count(ConstraintName::MinLength);
    let max_len = count(ConstraintName::MaxLength);
    if let (Some(min), Some(max)) = (min_len, max_len) {
        if min > max {
            return Err(invalid(ConstraintName::MaxLength, Value::Int(max), "below min_length"));
        }
    }
    if let Some(length) = count(ConstraintName::Length) {
        if min_len.is_some_and(|min| min > length) || max_len.is_some_and(|max| max < length) {
            return Err(invalid(ConstraintName::Length, Value::Int(length), "outside min_length..max_length"));
        }
    }

    if let (Some(places), Some(digits)) = (count(ConstraintName::DecimalPlaces), count(ConstraintName::MaxDigits)) {
        if places > digits {
            return Err(invalid(ConstraintName::DecimalPlaces, Value::Int(places), "exceeds max_digits"));
        }
    }

    let has_contains = constraints.iter().any(|c| c.name() == ConstraintName::Contains);
    for name in [ConstraintName::MinContains, ConstraintName::MaxContains] {
        if !has_contains {
            if let Some(n) = count(name) {
                return Err(invalid(name, Value::Int(n), "requires contains"));
            }
        }
    }
    if let (Some(min), Some(max)) = (count(ConstraintName::MinContains), count(ConstraintName::MaxContains)) {
        if min > max {
            return Err(invalid(ConstraintName::MaxContains, Value::Int(max), "below min_contains"));
        }
    }
    Ok(())
}
