use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::warn;

use crate::comparison::values_equal;
use crate::constraints::Constraint;
use crate::context::Context;
use crate::errors::ParseError;
use crate::options::{OnError, Options};
use crate::rule::{parse_guarded, Outcome, Rule};
use crate::value::Value;

/// Default of a field; values are cloned per use, factories called per use.
#[derive(Clone)]
pub enum DefaultValue {
    Value(Value),
    Factory(Arc<dyn Fn() -> Value + Send + Sync>),
}

impl DefaultValue {
    pub fn produce(&self) -> Value {
        match self {
            DefaultValue::Value(v) => v.clone(),
            DefaultValue::Factory(f) => f(),
        }
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::Value(v) => write!(f, "{v}"),
            DefaultValue::Factory(_) => f.write_str("<factory>"),
        }
    }
}

/// A no-input / no-output gate.
#[derive(Clone)]
pub enum Gate {
    Flag(bool),
    /// Applies when the current mode is contained in this string.
    Mode(String),
    Predicate(Arc<dyn Fn(&Value) -> bool + Send + Sync>),
}

impl Gate {
    /// Without a current mode a mode gate stays closed.
    pub fn applies(&self, mode: Option<&str>, value: Option<&Value>) -> bool {
        match self {
            Gate::Flag(flag) => *flag,
            Gate::Mode(modes) => mode.is_some_and(|m| modes.contains(m)),
            Gate::Predicate(f) => value.is_some_and(|v| f(v)),
        }
    }
}

impl fmt::Debug for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gate::Flag(flag) => write!(f, "Flag({flag})"),
            Gate::Mode(modes) => write!(f, "Mode({modes:?})"),
            Gate::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    Flag(bool),
    /// Required when the current mode is contained in this string, or when no mode is set.
    Mode(String),
}

impl Requirement {
    pub fn applies(&self, mode: Option<&str>) -> bool {
        match self {
            Requirement::Flag(flag) => *flag,
            Requirement::Mode(modes) => mode.map_or(true, |m| modes.contains(m)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Deprecation {
    pub replacement: Option<String>,
}

/// Picks the field's rule from the parsed value of a sibling field.
#[derive(Debug, Clone)]
pub struct Discriminator {
    field: String,
    mapping: Vec<(Value, Rule)>,
}

impl Discriminator {
    pub fn new<V: Into<Value>>(field: impl Into<String>, mapping: impl IntoIterator<Item = (V, Rule)>) -> Self {
        Self { field: field.into(), mapping: mapping.into_iter().map(|(v, r)| (v.into(), r)).collect() }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn select(&self, sibling: &Value) -> Option<&Rule> {
        let key = match sibling {
            Value::Enum(member) => &*member.value,
            other => other,
        };
        self.mapping.iter().find(|(v, _)| values_equal(v, key)).map(|(_, r)| r)
    }
}

/// One declared slot of a [`Parser`](crate::parser::Parser).
#[derive(Clone)]
pub struct Field {
    name: String,
    aliases: Vec<String>,
    rule: Rule,
    output_rule: Option<Rule>,
    default: Option<DefaultValue>,
    defer_default: bool,
    required: Option<Requirement>,
    mode: Option<String>,
    no_input: Option<Gate>,
    no_output: Option<Gate>,
    immutable: bool,
    dependencies: Vec<String>,
    on_error: Option<OnError>,
    deprecated: Option<Deprecation>,
    case_insensitive: Option<bool>,
    discriminator: Option<Discriminator>,
}

impl Field {
    pub fn new(name: impl Into<String>, rule: Rule) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
            rule,
            output_rule: None,
            default: None,
            defer_default: false,
            required: None,
            mode: None,
            no_input: None,
            no_output: None,
            immutable: false,
            dependencies: Vec::new(),
            on_error: None,
            deprecated: None,
            case_insensitive: None,
            discriminator: None,
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn aliases<S: Into<String>>(mut self, aliases: impl IntoIterator<Item = S>) -> Self {
        self.aliases.extend(aliases.into_iter().map(Into::into));
        self
    }

    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(DefaultValue::Value(value.into()));
        self
    }

    pub fn default_factory(mut self, factory: impl Fn() -> Value + Send + Sync + 'static) -> Self {
        self.default = Some(DefaultValue::Factory(Arc::new(factory)));
        self
    }

    /// Only apply the default in [`Parser::resolve_deferred`](crate::parser::Parser::resolve_deferred)
    /// or under `force_default`.
    pub fn defer_default(mut self) -> Self {
        self.defer_default = true;
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = Some(Requirement::Flag(required));
        self
    }

    pub fn required_in(mut self, modes: impl Into<String>) -> Self {
        self.required = Some(Requirement::Mode(modes.into()));
        self
    }

    pub fn no_input(mut self, gate: Gate) -> Self {
        self.no_input = Some(gate);
        self
    }

    pub fn no_output(mut self, gate: Gate) -> Self {
        self.no_output = Some(gate);
        self
    }

    /// Visible only in the given modes.
    pub fn mode(mut self, modes: impl Into<String>) -> Self {
        self.mode = Some(modes.into());
        self
    }

    pub fn immutable(mut self) -> Self {
        self.immutable = true;
        self
    }

    pub fn depends_on<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.dependencies.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn on_error(mut self, policy: OnError) -> Self {
        self.on_error = Some(policy);
        self
    }

    pub fn deprecated(mut self, replacement: Option<&str>) -> Self {
        self.deprecated = Some(Deprecation { replacement: replacement.map(str::to_string) });
        self
    }

    pub fn case_insensitive(mut self, flag: bool) -> Self {
        self.case_insensitive = Some(flag);
        self
    }

    pub fn output_rule(mut self, rule: Rule) -> Self {
        self.output_rule = Some(rule);
        self
    }

    pub fn discriminator(mut self, discriminator: Discriminator) -> Self {
        self.discriminator = Some(discriminator);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared aliases, without the name.
    pub fn aliases_declared(&self) -> &[String] {
        &self.aliases
    }

    /// The name followed by every declared alias.
    pub fn all_aliases(&self) -> Vec<String> {
        let mut all = vec![self.name.clone()];
        for alias in &self.aliases {
            if !all.contains(alias) {
                all.push(alias.clone());
            }
        }
        all
    }

    pub fn rule(&self) -> &Rule {
        &self.rule
    }

    pub fn get_output_rule(&self) -> Option<&Rule> {
        self.output_rule.as_ref()
    }

    pub fn constraints(&self) -> &[Constraint] {
        self.rule.constraints()
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub fn get_discriminator(&self) -> Option<&Discriminator> {
        self.discriminator.as_ref()
    }

    pub fn deprecation(&self) -> Option<&Deprecation> {
        self.deprecated.as_ref()
    }

    pub fn is_immutable(&self) -> bool {
        self.immutable
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    pub fn is_deferred(&self) -> bool {
        self.defer_default
    }

    /// A fresh default value; deferred defaults need `force` or `force_default`.
    pub fn get_default(&self, options: &Options, force: bool) -> Option<Value> {
        let default = self.default.as_ref()?;
        if self.defer_default && !force && !options.force_default() {
            return None;
        }
        Some(default.produce())
    }

    pub fn is_required(&self, options: &Options) -> bool {
        if options.ignore_required() {
            return false;
        }
        match &self.required {
            Some(requirement) => requirement.applies(options.mode()),
            None => self.default.is_none(),
        }
    }

    /// Hidden by its visibility mode under the current one.
    pub fn is_hidden(&self, options: &Options) -> bool {
        match (&self.mode, options.mode()) {
            (Some(modes), Some(current)) => !modes.contains(current),
            _ => false,
        }
    }

    pub fn is_no_input(&self, options: &Options, value: Option<&Value>) -> bool {
        self.is_hidden(options) || self.no_input.as_ref().is_some_and(|g| g.applies(options.mode(), value))
    }

    pub fn is_no_output(&self, options: &Options, value: Option<&Value>) -> bool {
        self.is_hidden(options) || self.no_output.as_ref().is_some_and(|g| g.applies(options.mode(), value))
    }

    pub fn get_on_error(&self, options: &Options) -> OnError {
        self.on_error.unwrap_or_else(|| options.on_error())
    }

    pub fn is_case_insensitive(&self, options: &Options) -> bool {
        self.case_insensitive.unwrap_or_else(|| options.case_insensitive())
    }

    /// Rule to apply given the already-parsed siblings.
    pub fn rule_for(&self, siblings: &IndexMap<String, Value>) -> &Rule {
        self.discriminator
            .as_ref()
            .and_then(|d| siblings.get(d.field()).and_then(|v| d.select(v)))
            .unwrap_or(&self.rule)
    }

    /// Parse the input value of this field at `$.<name>` under its error policy.
    pub fn parse_value(
        &self,
        value: Value,
        ctx: &mut Context,
        siblings: &IndexMap<String, Value>,
    ) -> Result<Outcome, ParseError> {
        if let Some(deprecation) = &self.deprecated {
            let message = match &deprecation.replacement {
                Some(replacement) => format!("field {:?} is deprecated, use {replacement:?} instead", self.name),
                None => format!("field {:?} is deprecated", self.name),
            };
            warn!(field = %self.name, "{message}");
            ctx.warn(message);
        }
        let policy = self.get_on_error(ctx.options());
        parse_guarded(self.rule_for(siblings), value, ctx, self.name.as_str().into(), policy)
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("rule", &self.rule)
            .field("default", &self.default)
            .field("required", &self.required)
            .field("dependencies", &self.dependencies)
            .finish_non_exhaustive()
    }
}
