//! Logical combinators over rules.

use std::fmt;

use itertools::Itertools;

use crate::context::Context;
use crate::errors::{DeclarationError, ParseError};
use crate::rule::Rule;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicOp {
    AllOf,
    AnyOf,
    OneOf,
    Not,
}

impl LogicOp {
    pub fn name(self) -> &'static str {
        match self {
            LogicOp::AllOf => "all_of",
            LogicOp::AnyOf => "any_of",
            LogicOp::OneOf => "one_of",
            LogicOp::Not => "not",
        }
    }
}

/// A combinator and its duplicate-free branches.
#[derive(Clone, PartialEq)]
pub struct Logic {
    op: LogicOp,
    branches: Vec<Rule>,
}

/// Outcome of one branch tried in an isolated context.
type Attempt = (Context, Result<Value, Vec<ParseError>>);

fn attempt(rule: &Rule, value: Value, ctx: &Context) -> Attempt {
    let mut probe = ctx.speculate();
    let result = rule.parse(value, &mut probe);
    match result {
        Ok(parsed) if !probe.has_errors() => (probe, Ok(parsed)),
        failed => {
            let errors = probe.take_failure(failed.err());
            (probe, Err(errors))
        }
    }
}

fn single(mut errors: Vec<ParseError>) -> ParseError {
    if errors.len() == 1 {
        errors.remove(0)
    } else {
        ParseError::aggregate(errors)
    }
}

impl Logic {
    pub fn new(op: LogicOp, branches: impl IntoIterator<Item = Rule>) -> Result<Self, DeclarationError> {
        let mut unique: Vec<Rule> = Vec::new();
        for branch in branches {
            if !unique.contains(&branch) {
                unique.push(branch);
            }
        }
        if unique.is_empty() {
            return Err(DeclarationError::EmptyLogic(op.name()));
        }
        Ok(Self { op, branches: unique })
    }

    pub fn op(&self) -> LogicOp {
        self.op
    }

    pub fn branches(&self) -> &[Rule] {
        &self.branches
    }

    pub fn parse(&self, value: Value, ctx: &mut Context) -> Result<Value, ParseError> {
        match self.op {
            LogicOp::AllOf => self.all_of(value, ctx),
            LogicOp::AnyOf => self.any_of(value, ctx),
            LogicOp::OneOf => self.one_of(value, ctx),
            LogicOp::Not => self.not(value, ctx),
        }
    }

    fn all_of(&self, mut value: Value, ctx: &mut Context) -> Result<Value, ParseError> {
        for branch in &self.branches {
            let (mut probe, result) = attempt(branch, value, ctx);
            ctx.absorb_warnings(&mut probe);
            value = result.map_err(single)?;
        }
        Ok(value)
    }

    fn any_of(&self, value: Value, ctx: &mut Context) -> Result<Value, ParseError> {
        // a branch whose origin already fits the value goes first
        let (exact, rest): (Vec<_>, Vec<_>) = self
            .branches
            .iter()
            .partition(|b| b.origin().is_some_and(|origin| origin.is_exact(&value)));
        let mut errors = Vec::new();
        for branch in exact.into_iter().chain(rest) {
            match attempt(branch, value.clone(), ctx) {
                (mut probe, Ok(parsed)) => {
                    ctx.absorb_warnings(&mut probe);
                    return Ok(parsed);
                }
                (_, Err(failed)) => errors.extend(failed),
            }
        }
        Err(ParseError::NoBranchMatched { route: ctx.route().clone(), value, errors })
    }

    fn one_of(&self, value: Value, ctx: &mut Context) -> Result<Value, ParseError> {
        let mut matched: Option<(usize, Value, Context)> = None;
        let mut errors = Vec::new();
        for (index, branch) in self.branches.iter().enumerate() {
            match attempt(branch, value.clone(), ctx) {
                (probe, Ok(parsed)) => {
                    if let Some((first, ..)) = &matched {
                        return Err(ParseError::OneOfMultipleMatched {
                            route: ctx.route().clone(),
                            value,
                            matched: vec![*first, index],
                        });
                    }
                    matched = Some((index, parsed, probe));
                }
                (_, Err(failed)) => errors.extend(failed),
            }
        }
        match matched {
            Some((_, parsed, mut probe)) => {
                ctx.absorb_warnings(&mut probe);
                Ok(parsed)
            }
            None => Err(ParseError::NoBranchMatched { route: ctx.route().clone(), value, errors }),
        }
    }

    fn not(&self, value: Value, ctx: &mut Context) -> Result<Value, ParseError> {
        for branch in &self.branches {
            if let (_, Ok(_)) = attempt(branch, value.clone(), ctx) {
                return Err(ParseError::NegateViolated { route: ctx.route().clone(), value });
            }
        }
        Ok(value)
    }
}

impl fmt::Debug for Logic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.op.name(), self.branches.iter().map(|b| format!("{b:?}")).join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::ConstraintName;
    use crate::types::Type;
    use pretty_assertions::assert_eq;

    fn positive_int() -> Rule {
        Rule::builder(Type::Int).gt(0).build().unwrap()
    }

    #[test]
    fn any_of_falls_through_to_later_branches() {
        let rule = Rule::any_of([positive_int(), Rule::list_of(Rule::of(Type::Str))]).unwrap();
        assert_eq!(rule.apply(-3).unwrap(), Value::List(vec![Value::from("-3")]));
        assert_eq!(rule.apply("7").unwrap(), Value::Int(7));
    }

    #[test]
    fn any_of_prefers_the_exact_kind() {
        let rule = Rule::any_of([Rule::of(Type::Int), Rule::of(Type::Str)]).unwrap();
        assert_eq!(rule.apply("12").unwrap(), Value::from("12"));
        assert_eq!(rule.apply(12).unwrap(), Value::Int(12));
    }

    #[test]
    fn any_of_reports_every_branch() {
        let rule = Rule::any_of([positive_int(), Rule::of(Type::Bool)]).unwrap();
        let Err(ParseError::NoBranchMatched { errors, .. }) = rule.apply("-5") else {
            panic!("expected no branch to match");
        };
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn one_of_rejects_multiple_matches() {
        let rule = Rule::one_of([Rule::of(Type::Bool), Rule::of(Type::Int)]).unwrap();
        assert!(matches!(rule.apply("1"), Err(ParseError::OneOfMultipleMatched { matched, .. }) if matched == vec![0, 1]));
        assert_eq!(rule.apply("2").unwrap(), Value::Int(2));
    }

    #[test]
    fn all_of_threads_the_value() {
        let rule = Rule::all_of([Rule::of(Type::Float), Rule::builder(Type::Float).lax(ConstraintName::Le, 1.0).build().unwrap()])
            .unwrap();
        assert_eq!(rule.apply("3").unwrap(), Value::Float(1.0));
    }

    #[test]
    fn not_inverts() {
        let rule = Rule::not([Rule::of(Type::Int)]).unwrap();
        assert_eq!(rule.apply("abc").unwrap(), Value::from("abc"));
        assert!(matches!(rule.apply("1"), Err(ParseError::NegateViolated { .. })));
    }

    #[test]
    fn branches_are_deduplicated_and_required() {
        let rule = Rule::any_of([Rule::of(Type::Int), Rule::of(Type::Int)]).unwrap();
        assert_eq!(rule.logic().unwrap().branches().len(), 1);
        assert_eq!(Rule::any_of([]).unwrap_err(), DeclarationError::EmptyLogic("any_of"));
    }
}
