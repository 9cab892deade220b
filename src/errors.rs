use itertools::Itertools;
use thiserror::Error;

use crate::constraints::ConstraintName;
use crate::context::Route;
use crate::value::Value;

/// Failure of a single value conversion inside the transformer registry.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransformError {
    // Input has no reading as the target type
    #[error("cannot convert {value} to {target}: {reason}")]
    Mismatch { value: Value, target: String, reason: String },

    // Cross-category conversion refused under no_explicit_cast
    #[error("explicit cast from {from} to {target} is not allowed")]
    ExplicitCast { from: &'static str, target: String },

    // Lossy conversion refused under no_data_loss
    #[error("converting {value} to {target} would lose data")]
    DataLoss { value: Value, target: String },

    // Registry has no entry for the target
    #[error("no transformer registered for {target}")]
    Unsupported { target: String },
}

impl TransformError {
    pub fn mismatch(value: &Value, target: impl Into<String>, reason: impl Into<String>) -> Self {
        TransformError::Mismatch { value: value.clone(), target: target.into(), reason: reason.into() }
    }

    pub fn data_loss(value: &Value, target: impl Into<String>) -> Self {
        TransformError::DataLoss { value: value.clone(), target: target.into() }
    }
}

/// Everything that can go wrong while matching data against rules and fields.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    // Transformer failure, with the route it happened at
    #[error("{route}: failed to parse {value} as {target}: {source}")]
    Coercion { route: Route, value: Value, target: String, source: TransformError },

    // Strict constraint (or lax one with no compliant value) rejected the value
    #[error("{route}: constraint {constraint}={expected} violated by {value}")]
    Constraint { route: Route, constraint: ConstraintName, expected: Value, value: Value },

    // `not` branch matched
    #[error("{route}: {value} satisfies a negated rule")]
    NegateViolated { route: Route, value: Value },

    #[error("{route}: {value} matched more than one branch ({matched:?})")]
    OneOfMultipleMatched { route: Route, value: Value, matched: Vec<usize> },

    // Every any_of / one_of branch failed; branch errors kept in order
    #[error("{route}: {value} matched none of the branches: {}", .errors.iter().join("; "))]
    NoBranchMatched { route: Route, value: Value, errors: Vec<ParseError> },

    // Required field missing and no default
    #[error("{route}: required field {field:?} is absent")]
    Absence { route: Route, field: String },

    #[error("{route}: aliases {aliases:?} of field {field:?} were all supplied")]
    AliasConflict { route: Route, field: String, aliases: Vec<String> },

    // Supplied field whose dependencies did not survive parsing
    #[error("{route}: field {field:?} depends on absent fields {missing:?}")]
    DependenciesAbsence { route: Route, field: String, missing: Vec<String> },

    #[error("{route}: excess keys {keys:?} are not allowed")]
    Excess { route: Route, keys: Vec<String> },

    // contains / min_contains / max_contains count outside its range
    #[error("{route}: {count} items satisfy the contained rule, expected {}", contains_range(.min, .max))]
    Containment { route: Route, count: usize, min: usize, max: Option<usize> },

    #[error("{route}: depth {depth} exceeds max_depth {max_depth}")]
    RecursionExceeded { route: Route, depth: usize, max_depth: usize },

    #[error("{route}: field {field:?} is immutable")]
    Immutable { route: Route, field: String },

    // Collect mode: every error of one parse, flattened
    #[error("{} errors: {}", .0.len(), .0.iter().join("; "))]
    Aggregate(Vec<ParseError>),
}

fn contains_range(min: &usize, max: &Option<usize>) -> String {
    match max {
        Some(max) => format!("{min}..={max}"),
        None => format!("at least {min}"),
    }
}

impl ParseError {
    /// Where in the input the error was raised; aggregates have no single route.
    pub fn route(&self) -> Option<&Route> {
        match self {
            ParseError::Coercion { route, .. }
            | ParseError::Constraint { route, .. }
            | ParseError::NegateViolated { route, .. }
            | ParseError::OneOfMultipleMatched { route, .. }
            | ParseError::NoBranchMatched { route, .. }
            | ParseError::Absence { route, .. }
            | ParseError::AliasConflict { route, .. }
            | ParseError::DependenciesAbsence { route, .. }
            | ParseError::Excess { route, .. }
            | ParseError::Containment { route, .. }
            | ParseError::RecursionExceeded { route, .. }
            | ParseError::Immutable { route, .. } => Some(route),
            ParseError::Aggregate(_) => None,
        }
    }

    /// Flatten into individual errors, unwrapping nested aggregates.
    pub fn into_errors(self) -> Vec<ParseError> {
        match self {
            ParseError::Aggregate(errors) => errors.into_iter().flat_map(ParseError::into_errors).collect(),
            other => vec![other],
        }
    }

    /// Build an aggregate from collected errors, flattening nested ones.
    pub fn aggregate(errors: impl IntoIterator<Item = ParseError>) -> Self {
        ParseError::Aggregate(errors.into_iter().flat_map(ParseError::into_errors).collect())
    }
}

/// Invalid declarations, detected while building rules, fields and parsers.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DeclarationError {
    // e.g. gt with ge
    #[error("constraints {0} and {1} are mutually exclusive")]
    ExclusiveConstraints(ConstraintName, ConstraintName),

    #[error("constraint {constraint} is not supported by type {target}")]
    UnsupportedConstraint { constraint: ConstraintName, target: String },

    #[error("invalid value {value} for constraint {constraint}: {reason}")]
    InvalidConstraintValue { constraint: ConstraintName, value: Value, reason: String },

    // Lax requested where no nearest compliant value exists
    #[error("constraint {0} has no lax form")]
    NoLaxForm(ConstraintName),

    #[error("invalid pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("logical rule {0} needs at least one branch")]
    EmptyLogic(&'static str),

    #[error("duplicate field {0:?}")]
    DuplicateField(String),

    #[error("alias {alias:?} of field {field:?} collides with field {other:?}")]
    AliasCollision { alias: String, field: String, other: String },

    #[error("field {field:?} depends on undeclared fields {missing:?}")]
    UndeclaredDependency { field: String, missing: Vec<String> },

    #[error("reference {0:?} was never resolved")]
    UnresolvedReference(String),
}

/// Umbrella error for callers that build and parse in one go.
#[derive(Debug, Error)]
pub enum Error {
    #[error("declaration error: {0}")]
    Declaration(#[from] DeclarationError),

    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
}

pub type Result<T> = std::result::Result<T, Error>;
