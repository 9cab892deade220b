use std::fmt;
use std::ops::BitAnd;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::rule::Rule;
use crate::transform::Registry;

const DEFAULT_MAX_DEPTH: usize = 200;

/// What to do with a value that fails its rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnError {
    /// Raise (or collect, in collect mode).
    #[default]
    Throw,
    /// Drop the value, falling back to a default where one exists.
    Exclude,
    /// Keep the raw input value.
    Preserve,
}

/// Policy for input keys that match no field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Addition {
    #[default]
    Ignore,
    Preserve,
    Reject,
}

/// Derives an alias from a field name, e.g. a case-style converter.
#[derive(Clone)]
pub struct AliasGenerator(Arc<dyn Fn(&str) -> String + Send + Sync>);

impl AliasGenerator {
    pub fn new(f: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn generate(&self, name: &str) -> String {
        (self.0)(name)
    }
}

impl fmt::Debug for AliasGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AliasGenerator(..)")
    }
}

/// Immutable configuration bag.
///
/// Every key is optional so that two bags can be combined with `a & b`:
/// keys set in `b` win, unset keys fall back to `a`. When `b.override_` is
/// set, `b` replaces `a` as a whole.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    pub collect_errors: Option<bool>,
    pub max_errors: Option<usize>,
    pub max_depth: Option<usize>,

    pub addition: Option<Addition>,
    /// Typed capture of excess keys; takes precedence over `addition`.
    #[serde(skip)]
    pub addition_rule: Option<Rule>,

    pub invalid_items: Option<OnError>,
    pub invalid_keys: Option<OnError>,
    pub invalid_values: Option<OnError>,
    pub on_error: Option<OnError>,

    pub no_explicit_cast: Option<bool>,
    pub no_data_loss: Option<bool>,
    pub ignore_constraints: Option<bool>,
    pub ignore_alias_conflicts: Option<bool>,
    pub ignore_required: Option<bool>,
    /// Declaration-time only: read by [`Parser`](crate::Parser) when it
    /// builds its folded key map. Passing it to `parse_with` has no effect.
    pub case_insensitive: Option<bool>,

    /// Declaration-time only, like `case_insensitive`.
    #[serde(skip)]
    pub alias_from_generator: Option<AliasGenerator>,
    #[serde(skip)]
    pub alias_to_generator: Option<AliasGenerator>,

    pub mode: Option<String>,
    pub force_default: Option<bool>,
    pub data_first_search: Option<bool>,

    #[serde(skip)]
    pub registry: Option<Registry>,

    #[serde(rename = "override")]
    pub override_: bool,
}

impl Options {
    pub fn from_json(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Right-biased merge; see the type docs.
    pub fn merge(&self, other: &Options) -> Options {
        if other.override_ {
            return other.clone();
        }
        Options {
            collect_errors: other.collect_errors.or(self.collect_errors),
            max_errors: other.max_errors.or(self.max_errors),
            max_depth: other.max_depth.or(self.max_depth),
            addition: other.addition.or(self.addition),
            addition_rule: other.addition_rule.clone().or_else(|| self.addition_rule.clone()),
            invalid_items: other.invalid_items.or(self.invalid_items),
            invalid_keys: other.invalid_keys.or(self.invalid_keys),
            invalid_values: other.invalid_values.or(self.invalid_values),
            on_error: other.on_error.or(self.on_error),
            no_explicit_cast: other.no_explicit_cast.or(self.no_explicit_cast),
            no_data_loss: other.no_data_loss.or(self.no_data_loss),
            ignore_constraints: other.ignore_constraints.or(self.ignore_constraints),
            ignore_alias_conflicts: other.ignore_alias_conflicts.or(self.ignore_alias_conflicts),
            ignore_required: other.ignore_required.or(self.ignore_required),
            case_insensitive: other.case_insensitive.or(self.case_insensitive),
            alias_from_generator: other.alias_from_generator.clone().or_else(|| self.alias_from_generator.clone()),
            alias_to_generator: other.alias_to_generator.clone().or_else(|| self.alias_to_generator.clone()),
            mode: other.mode.clone().or_else(|| self.mode.clone()),
            force_default: other.force_default.or(self.force_default),
            data_first_search: other.data_first_search.or(self.data_first_search),
            registry: other.registry.clone().or_else(|| self.registry.clone()),
            override_: self.override_,
        }
    }

    pub fn make_context(&self) -> Context {
        Context::new(Arc::new(self.clone()))
    }

    pub fn collect_errors(&self) -> bool {
        self.collect_errors.unwrap_or(false)
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth.unwrap_or(DEFAULT_MAX_DEPTH)
    }

    pub fn addition(&self) -> Addition {
        self.addition.unwrap_or_default()
    }

    pub fn invalid_items(&self) -> OnError {
        self.invalid_items.unwrap_or_default()
    }

    pub fn invalid_keys(&self) -> OnError {
        self.invalid_keys.unwrap_or_default()
    }

    pub fn invalid_values(&self) -> OnError {
        self.invalid_values.unwrap_or_default()
    }

    pub fn on_error(&self) -> OnError {
        self.on_error.unwrap_or_default()
    }

    pub fn no_explicit_cast(&self) -> bool {
        self.no_explicit_cast.unwrap_or(false)
    }

    pub fn no_data_loss(&self) -> bool {
        self.no_data_loss.unwrap_or(false)
    }

    pub fn ignore_constraints(&self) -> bool {
        self.ignore_constraints.unwrap_or(false)
    }

    pub fn ignore_alias_conflicts(&self) -> bool {
        self.ignore_alias_conflicts.unwrap_or(false)
    }

    pub fn ignore_required(&self) -> bool {
        self.ignore_required.unwrap_or(false)
    }

    pub fn case_insensitive(&self) -> bool {
        self.case_insensitive.unwrap_or(false)
    }

    pub fn mode(&self) -> Option<&str> {
        self.mode.as_deref()
    }

    pub fn force_default(&self) -> bool {
        self.force_default.unwrap_or(false)
    }

    /// The registry set on these options, else the built-in one.
    pub fn registry(&self) -> &Registry {
        self.registry.as_ref().unwrap_or_else(|| Registry::builtin())
    }
}

impl BitAnd for &Options {
    type Output = Options;

    fn bitand(self, rhs: &Options) -> Options {
        self.merge(rhs)
    }
}

impl BitAnd for Options {
    type Output = Options;

    fn bitand(self, rhs: Options) -> Options {
        self.merge(&rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn merge_is_right_biased_per_key() {
        let base = Options { collect_errors: Some(true), max_errors: Some(5), ..Options::default() };
        let call = Options { max_errors: Some(1), mode: Some("w".into()), ..Options::default() };
        let merged = &base & &call;
        assert_eq!(merged.collect_errors, Some(true));
        assert_eq!(merged.max_errors, Some(1));
        assert_eq!(merged.mode(), Some("w"));
    }

    #[test]
    fn override_replaces_wholesale() {
        let base = Options { collect_errors: Some(true), max_errors: Some(5), ..Options::default() };
        let replacement = Options { max_errors: Some(1), override_: true, ..Options::default() };
        let merged = base & replacement;
        assert_eq!(merged.collect_errors, None);
        assert_eq!(merged.max_errors, Some(1));
    }

    #[test]
    fn loads_from_json() {
        let options = Options::from_json(json!({
            "collect_errors": true,
            "addition": "reject",
            "invalid_items": "exclude",
            "override": true
        }))
        .unwrap();
        assert!(options.collect_errors());
        assert_eq!(options.addition(), Addition::Reject);
        assert_eq!(options.invalid_items(), OnError::Exclude);
        assert_eq!(options.invalid_keys(), OnError::Throw);
        assert!(options.override_);
    }
}
