//! Constraint keywords and their validators.
//!
//! Every keyword has a strict validator that rejects violating values. Where a
//! nearest compliant value exists, the lax variant returns that value instead
//! (clamp, round, truncate, deduplicate).

use std::cmp::Ordering;
use std::fmt;

use itertools::Itertools;
use regex::Regex;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::comparison::{compare_values, to_decimal, to_f64, values_equal};
use crate::context::Context;
use crate::errors::ParseError;
use crate::options::Options;
use crate::rule::Rule;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConstraintName {
    Gt,
    Ge,
    Lt,
    Le,
    MultipleOf,
    Const,
    Enum,
    Regex,
    DecimalPlaces,
    MaxDigits,
    Length,
    MinLength,
    MaxLength,
    Contains,
    MinContains,
    MaxContains,
    UniqueItems,
}

impl ConstraintName {
    pub fn as_str(self) -> &'static str {
        match self {
            ConstraintName::Gt => "gt",
            ConstraintName::Ge => "ge",
            ConstraintName::Lt => "lt",
            ConstraintName::Le => "le",
            ConstraintName::MultipleOf => "multiple_of",
            ConstraintName::Const => "const",
            ConstraintName::Enum => "enum",
            ConstraintName::Regex => "regex",
            ConstraintName::DecimalPlaces => "decimal_places",
            ConstraintName::MaxDigits => "max_digits",
            ConstraintName::Length => "length",
            ConstraintName::MinLength => "min_length",
            ConstraintName::MaxLength => "max_length",
            ConstraintName::Contains => "contains",
            ConstraintName::MinContains => "min_contains",
            ConstraintName::MaxContains => "max_contains",
            ConstraintName::UniqueItems => "unique_items",
        }
    }

    /// Evaluation order: bounds, const/enum, pattern, precision, length,
    /// containment, uniqueness.
    pub fn priority(self) -> u8 {
        match self {
            ConstraintName::Gt
            | ConstraintName::Ge
            | ConstraintName::Lt
            | ConstraintName::Le
            | ConstraintName::MultipleOf => 0,
            ConstraintName::Const | ConstraintName::Enum => 1,
            ConstraintName::Regex => 2,
            ConstraintName::DecimalPlaces | ConstraintName::MaxDigits => 3,
            ConstraintName::Length | ConstraintName::MinLength | ConstraintName::MaxLength => 4,
            ConstraintName::Contains | ConstraintName::MinContains | ConstraintName::MaxContains => 5,
            ConstraintName::UniqueItems => 6,
        }
    }

    pub fn has_lax_form(self) -> bool {
        !matches!(
            self,
            ConstraintName::Enum
                | ConstraintName::Regex
                | ConstraintName::MinLength
                | ConstraintName::Contains
                | ConstraintName::MinContains
                | ConstraintName::MaxContains
        )
    }

    pub fn is_bound(self) -> bool {
        matches!(self, ConstraintName::Gt | ConstraintName::Ge | ConstraintName::Lt | ConstraintName::Le)
    }

    fn validator(self) -> Validator {
        match self {
            ConstraintName::Gt | ConstraintName::Ge | ConstraintName::Lt | ConstraintName::Le => validate_bound,
            ConstraintName::MultipleOf => validate_multiple_of,
            ConstraintName::Const => validate_const,
            ConstraintName::Enum => validate_enum,
            ConstraintName::Regex => validate_regex,
            ConstraintName::DecimalPlaces | ConstraintName::MaxDigits => validate_precision,
            ConstraintName::Length | ConstraintName::MinLength | ConstraintName::MaxLength => validate_length,
            ConstraintName::Contains => validate_contains,
            // counted by `contains`
            ConstraintName::MinContains | ConstraintName::MaxContains => |_, _, _, _| Ok(None),
            ConstraintName::UniqueItems => validate_unique,
        }
    }
}

impl fmt::Display for ConstraintName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configured value of a constraint.
#[derive(Clone)]
pub enum ConstraintValue {
    Value(Value),
    Pattern(Regex),
    Rule(Box<Rule>),
}

impl ConstraintValue {
    /// Plain value form, used in error reports and introspection.
    pub fn to_value(&self) -> Value {
        match self {
            ConstraintValue::Value(v) => v.clone(),
            ConstraintValue::Pattern(re) => Value::from(re.as_str()),
            ConstraintValue::Rule(rule) => Value::Str(format!("{rule:?}")),
        }
    }
}

impl PartialEq for ConstraintValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ConstraintValue::Value(a), ConstraintValue::Value(b)) => a == b,
            (ConstraintValue::Pattern(a), ConstraintValue::Pattern(b)) => a.as_str() == b.as_str(),
            (ConstraintValue::Rule(a), ConstraintValue::Rule(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for ConstraintValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstraintValue::Value(v) => write!(f, "{v}"),
            ConstraintValue::Pattern(re) => write!(f, "/{}/", re.as_str()),
            ConstraintValue::Rule(rule) => write!(f, "{rule:?}"),
        }
    }
}

/// Checks `value` against one constraint; `Ok(Some(v))` replaces the value
/// (lax coercion), `Ok(None)` keeps it.
pub type Validator = fn(&Constraint, &Value, &[Constraint], &mut Context) -> Result<Option<Value>, ParseError>;

/// One `(name, value, validator)` entry of a rule's ordered constraint list.
#[derive(Clone)]
pub struct Constraint {
    name: ConstraintName,
    value: ConstraintValue,
    lax: bool,
    validator: Validator,
}

impl Constraint {
    pub(crate) fn new(name: ConstraintName, value: ConstraintValue, lax: bool) -> Self {
        Self { name, value, lax, validator: name.validator() }
    }

    pub fn name(&self) -> ConstraintName {
        self.name
    }

    pub fn value(&self) -> &ConstraintValue {
        &self.value
    }

    pub fn is_lax(&self) -> bool {
        self.lax
    }

    pub fn validator(&self) -> Validator {
        self.validator
    }

    pub fn validate(&self, value: &Value, siblings: &[Constraint], ctx: &mut Context) -> Result<Option<Value>, ParseError> {
        (self.validator)(self, value, siblings, ctx)
    }

    fn scalar(&self) -> &Value {
        match &self.value {
            ConstraintValue::Value(v) => v,
            _ => &Value::Null,
        }
    }

    fn count(&self) -> usize {
        self.scalar().as_i64().and_then(|n| usize::try_from(n).ok()).unwrap_or(0)
    }

    fn violation(&self, value: &Value, ctx: &Context) -> ParseError {
        ParseError::Constraint {
            route: ctx.route().clone(),
            constraint: self.name,
            expected: self.value.to_value(),
            value: value.clone(),
        }
    }
}

impl PartialEq for Constraint {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.lax == other.lax && self.value == other.value
    }
}

impl fmt::Debug for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lax = if self.lax { "~" } else { "" };
        write!(f, "{}={lax}{:?}", self.name, self.value)
    }
}

fn validate_bound(c: &Constraint, value: &Value, _: &[Constraint], ctx: &mut Context) -> Result<Option<Value>, ParseError> {
    let bound = c.scalar();
    let Some(ord) = compare_values(value, bound) else {
        return Err(c.violation(value, ctx));
    };
    let ok = match c.name {
        ConstraintName::Gt => ord == Ordering::Greater,
        ConstraintName::Ge => ord != Ordering::Less,
        ConstraintName::Lt => ord == Ordering::Less,
        _ => ord != Ordering::Greater,
    };
    if ok {
        return Ok(None);
    }
    if c.lax {
        let clamped = match c.name {
            ConstraintName::Gt => step(bound, true),
            ConstraintName::Lt => step(bound, false),
            _ => Some(bound.clone()),
        };
        if let Some(v) = clamped {
            return Ok(Some(v));
        }
    }
    Err(c.violation(value, ctx))
}

/// Nearest representable value strictly above (or below) `bound`.
fn step(bound: &Value, up: bool) -> Option<Value> {
    match bound {
        Value::Int(i) => if up { i.checked_add(1) } else { i.checked_sub(1) }.map(Value::Int),
        Value::Float(f) => Some(Value::Float(next_float(*f, up))),
        Value::Decimal(d) => {
            let unit = Decimal::new(1, d.scale());
            if up { d.checked_add(unit) } else { d.checked_sub(unit) }.map(Value::Decimal)
        }
        _ => None,
    }
}

fn next_float(f: f64, up: bool) -> f64 {
    if !f.is_finite() {
        return f;
    }
    if f == 0.0 {
        let tiny = f64::from_bits(1);
        return if up { tiny } else { -tiny };
    }
    let bits = f.to_bits();
    // moving away from zero increments the magnitude bits
    if (f > 0.0) == up {
        f64::from_bits(bits + 1)
    } else {
        f64::from_bits(bits - 1)
    }
}

/// Back to the numeric kind of `template` after decimal arithmetic.
fn like_kind(template: &Value, d: Decimal) -> Value {
    match template {
        Value::Int(_) => d.to_i64().map(Value::Int).unwrap_or(Value::Decimal(d)),
        Value::Float(_) => Value::Float(d.to_f64().unwrap_or(f64::NAN)),
        _ => Value::Decimal(d),
    }
}

fn validate_multiple_of(c: &Constraint, value: &Value, _: &[Constraint], ctx: &mut Context) -> Result<Option<Value>, ParseError> {
    let factor = c.scalar();
    if let (Value::Float(_), Some(v), Some(m)) = (value, to_f64(value), to_f64(factor)) {
        let ratio = v / m;
        if (ratio - ratio.round()).abs() < 1e-9 {
            return Ok(None);
        }
        if c.lax {
            return Ok(Some(Value::Float(ratio.round() * m)));
        }
        return Err(c.violation(value, ctx));
    }
    let (Some(v), Some(m)) = (to_decimal(value), to_decimal(factor)) else {
        return Err(c.violation(value, ctx));
    };
    if m.is_zero() || v.checked_rem(m).is_some_and(|r| r.is_zero()) {
        return Ok(None);
    }
    let nearest = v
        .checked_div(m)
        .and_then(|ratio| ratio.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero).checked_mul(m));
    match nearest {
        Some(nearest) if c.lax => Ok(Some(like_kind(value, nearest))),
        _ => Err(c.violation(value, ctx)),
    }
}

fn validate_const(c: &Constraint, value: &Value, _: &[Constraint], ctx: &mut Context) -> Result<Option<Value>, ParseError> {
    let expected = c.scalar();
    if values_equal(value, expected) {
        Ok(None)
    } else if c.lax {
        Ok(Some(expected.clone()))
    } else {
        Err(c.violation(value, ctx))
    }
}

fn validate_enum(c: &Constraint, value: &Value, _: &[Constraint], ctx: &mut Context) -> Result<Option<Value>, ParseError> {
    let allowed = match c.scalar() {
        Value::List(items) => items.as_slice(),
        _ => &[],
    };
    if allowed.iter().any(|candidate| values_equal(value, candidate)) {
        Ok(None)
    } else {
        Err(c.violation(value, ctx))
    }
}

fn validate_regex(c: &Constraint, value: &Value, _: &[Constraint], ctx: &mut Context) -> Result<Option<Value>, ParseError> {
    let ConstraintValue::Pattern(re) = &c.value else {
        return Ok(None);
    };
    let matched = match value {
        Value::Str(s) => re.is_match(s),
        Value::Bytes(b) => std::str::from_utf8(b).map(|s| re.is_match(s)).unwrap_or(false),
        _ => false,
    };
    if matched {
        Ok(None)
    } else {
        Err(c.violation(value, ctx))
    }
}

/// `(digits, decimal places)` of a number, trailing fractional zeros ignored.
pub(crate) fn digit_counts(d: &Decimal) -> (u32, u32) {
    let n = d.normalize();
    let scale = n.scale();
    let mantissa = n.mantissa().unsigned_abs();
    let len = if mantissa == 0 { 1 } else { mantissa.to_string().len() as u32 };
    (len.max(scale), scale)
}

fn validate_precision(c: &Constraint, value: &Value, _: &[Constraint], ctx: &mut Context) -> Result<Option<Value>, ParseError> {
    let Some(d) = to_decimal(value) else {
        return Err(c.violation(value, ctx));
    };
    let limit = c.count() as u32;
    let (digits, places) = digit_counts(&d);
    let dp = match c.name {
        ConstraintName::DecimalPlaces if places <= limit => return Ok(None),
        ConstraintName::DecimalPlaces => limit,
        _ if digits <= limit => return Ok(None),
        _ => {
            let integer_digits = digits - places;
            if integer_digits > limit {
                return Err(c.violation(value, ctx));
            }
            limit - integer_digits
        }
    };
    if !c.lax {
        return Err(c.violation(value, ctx));
    }
    let mut rounded = d.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero).normalize();
    // rounding up may carry into a new integer digit (99.9 -> 100)
    if c.name == ConstraintName::MaxDigits && digit_counts(&rounded).0 > limit {
        rounded = d.round_dp_with_strategy(dp, RoundingStrategy::ToZero).normalize();
    }
    Ok(Some(like_kind(value, rounded)))
}

fn truncate(value: &Value, n: usize) -> Value {
    match value {
        Value::Str(s) => Value::Str(s.chars().take(n).collect()),
        Value::Bytes(b) => Value::Bytes(b.iter().take(n).copied().collect()),
        Value::List(v) => Value::List(v.iter().take(n).cloned().collect()),
        Value::Tuple(v) => Value::Tuple(v.iter().take(n).cloned().collect()),
        Value::Set(s) => Value::Set(s.iter().take(n).cloned().collect()),
        Value::Map(m) => Value::Map(m.iter().take(n).map(|(k, v)| (k.clone(), v.clone())).collect()),
        other => other.clone(),
    }
}

fn validate_length(c: &Constraint, value: &Value, _: &[Constraint], ctx: &mut Context) -> Result<Option<Value>, ParseError> {
    let Some(len) = value.len() else {
        return Err(c.violation(value, ctx));
    };
    let n = c.count();
    let ok = match c.name {
        ConstraintName::Length => len == n,
        ConstraintName::MinLength => len >= n,
        _ => len <= n,
    };
    if ok {
        Ok(None)
    } else if c.lax && len > n {
        Ok(Some(truncate(value, n)))
    } else {
        Err(c.violation(value, ctx))
    }
}

fn validate_contains(c: &Constraint, value: &Value, siblings: &[Constraint], ctx: &mut Context) -> Result<Option<Value>, ParseError> {
    let ConstraintValue::Rule(rule) = &c.value else {
        return Ok(None);
    };
    let items: Vec<&Value> = match value {
        Value::List(v) | Value::Tuple(v) => v.iter().collect(),
        Value::Set(s) => s.iter().collect(),
        _ => return Err(c.violation(value, ctx)),
    };
    let sibling = |name: ConstraintName| siblings.iter().find(|s| s.name == name).map(Constraint::count);
    let min = sibling(ConstraintName::MinContains).unwrap_or(1);
    let max = sibling(ConstraintName::MaxContains);

    let strict = Options { no_explicit_cast: Some(true), ..Options::default() };
    let count = items
        .into_iter()
        .filter(|item| {
            let mut probe = ctx.speculate_with(&strict);
            rule.parse((*item).clone(), &mut probe).is_ok() && !probe.has_errors()
        })
        .count();
    if count < min || max.is_some_and(|max| count > max) {
        return Err(ParseError::Containment { route: ctx.route().clone(), count, min, max });
    }
    Ok(None)
}

fn validate_unique(c: &Constraint, value: &Value, _: &[Constraint], ctx: &mut Context) -> Result<Option<Value>, ParseError> {
    let items = match value {
        Value::List(v) | Value::Tuple(v) => v,
        Value::Set(_) | Value::Map(_) => return Ok(None),
        _ => return Err(c.violation(value, ctx)),
    };
    if items.iter().all_unique() {
        return Ok(None);
    }
    if !c.lax {
        return Err(c.violation(value, ctx));
    }
    let deduped: Vec<Value> = items.iter().unique().cloned().collect();
    Ok(Some(match value {
        Value::Tuple(_) => Value::Tuple(deduped),
        _ => Value::List(deduped),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn check(name: ConstraintName, expected: impl Into<Value>, lax: bool, value: impl Into<Value>) -> Result<Option<Value>, ParseError> {
        let c = Constraint::new(name, ConstraintValue::Value(expected.into()), lax);
        let mut ctx = Options::default().make_context();
        c.validate(&value.into(), &[], &mut ctx)
    }

    #[test]
    fn strict_bounds_reject_and_lax_bounds_clamp() {
        assert!(check(ConstraintName::Le, 10, false, 11).is_err());
        assert_eq!(check(ConstraintName::Le, 10, true, 11).unwrap(), Some(Value::Int(10)));
        assert_eq!(check(ConstraintName::Gt, 0, true, -5).unwrap(), Some(Value::Int(1)));
        assert_eq!(check(ConstraintName::Ge, 0, false, 0).unwrap(), None);
        let Some(Value::Float(f)) = check(ConstraintName::Lt, 1.0, true, 2.0).unwrap() else {
            panic!("expected a float");
        };
        assert!(f < 1.0 && f > 0.999_999);
    }

    #[test]
    fn precision_counts_digits() {
        assert_eq!(digit_counts(&Decimal::new(12345, 2)), (5, 2));
        assert_eq!(digit_counts(&Decimal::new(5, 2)), (2, 2));
        assert_eq!(digit_counts(&Decimal::new(1200, 2)), (2, 0));
        assert!(check(ConstraintName::DecimalPlaces, 2, false, 1.234).is_err());
        assert_eq!(check(ConstraintName::DecimalPlaces, 2, true, 1.235).unwrap(), Some(Value::Float(1.24)));
        assert_eq!(
            check(ConstraintName::MaxDigits, 4, true, Decimal::new(123456, 3)).unwrap(),
            Some(Value::Decimal(Decimal::new(1235, 1)))
        );
        assert!(check(ConstraintName::MaxDigits, 2, true, 12345).is_err());
    }

    #[test]
    fn lax_max_digits_never_rounds_past_the_limit() {
        assert_eq!(check(ConstraintName::MaxDigits, 2, true, 99.9).unwrap(), Some(Value::Float(99.0)));
        assert_eq!(
            check(ConstraintName::MaxDigits, 2, true, Decimal::new(-999, 1)).unwrap(),
            Some(Value::Decimal(Decimal::from(-99)))
        );
        assert_eq!(check(ConstraintName::MaxDigits, 3, true, 99.96).unwrap(), Some(Value::Float(100.0)));
    }

    #[test]
    fn lax_length_truncates() {
        assert_eq!(check(ConstraintName::MaxLength, 3, true, "abcdef").unwrap(), Some(Value::from("abc")));
        assert!(check(ConstraintName::MaxLength, 3, false, "abcdef").is_err());
        assert!(check(ConstraintName::Length, 3, true, "ab").is_err());
    }

    #[test]
    fn multiple_of_rounds_when_lax() {
        assert_eq!(check(ConstraintName::MultipleOf, 5, false, 15).unwrap(), None);
        assert_eq!(check(ConstraintName::MultipleOf, 5, true, 13).unwrap(), Some(Value::Int(15)));
        assert!(check(ConstraintName::MultipleOf, 0.5, false, 1.2).is_err());
        assert!(check(ConstraintName::MultipleOf, Decimal::new(4, 1), true, Decimal::MAX).is_err());
    }

    #[test]
    fn lax_unique_deduplicates() {
        let list = Value::List(vec![Value::Int(1), Value::Int(1), Value::Int(2)]);
        assert!(check(ConstraintName::UniqueItems, true, false, list.clone()).is_err());
        assert_eq!(
            check(ConstraintName::UniqueItems, true, true, list).unwrap(),
            Some(Value::List(vec![Value::Int(1), Value::Int(2)]))
        );
    }
}
