//! Field resolution: matching key-value input against a declared set of fields.
//!
//! A [`Parser`] is compiled once by [`ParserBuilder::build`] and is immutable
//! afterwards. Input keys are matched to fields through an alias map (plus a
//! lower-cased map for case-insensitive fields) using one of two strategies:
//!
//! * field-first walks the declared fields and probes the input for each alias;
//! * data-first walks the input keys and looks each one up in the alias maps.
//!
//! The cheaper one is picked per call unless `data_first_search` says otherwise.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use tracing::debug;

use crate::context::{Context, RouteItem, Warning};
use crate::errors::{DeclarationError, ParseError, TransformError};
use crate::field::Field;
use crate::options::{Addition, OnError, Options};
use crate::rule::{parse_guarded, Outcome};
use crate::transform::Transformer;
use crate::types::Type;
use crate::value::Value;

/// Values and warnings of a successful root parse.
#[derive(Debug, Clone, PartialEq)]
pub struct Parsed {
    pub values: IndexMap<String, Value>,
    pub warnings: Vec<Warning>,
}

#[derive(Debug, Clone)]
pub struct Parser {
    name: String,
    fields: IndexMap<String, Field>,
    /// Canonical name to every key it accepts, in preference order.
    aliases: IndexMap<String, Vec<String>>,
    alias_map: IndexMap<String, String>,
    case_insensitive_map: HashMap<String, String>,
    options: Options,
}

/// Builder for [`Parser`]; declaration errors surface in [`build`](ParserBuilder::build).
#[derive(Debug, Clone)]
pub struct ParserBuilder {
    name: String,
    fields: Vec<Field>,
    inherited: HashSet<String>,
    duplicate: Option<String>,
    options: Options,
}

impl ParserBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), fields: Vec::new(), inherited: HashSet::new(), duplicate: None, options: Options::default() }
    }

    /// Inherit the fields and options of `base`. Fields declared afterwards
    /// under the same name replace the inherited ones in place.
    pub fn base(mut self, base: &Parser) -> Self {
        for field in base.fields.values() {
            match self.fields.iter().position(|f| f.name() == field.name()) {
                Some(index) => self.fields[index] = field.clone(),
                None => self.fields.push(field.clone()),
            }
            self.inherited.insert(field.name().to_string());
        }
        self.options = &base.options & &self.options;
        self
    }

    pub fn field(mut self, field: Field) -> Self {
        match self.fields.iter().position(|f| f.name() == field.name()) {
            Some(index) if self.inherited.remove(field.name()) => self.fields[index] = field,
            Some(_) => {
                self.duplicate.get_or_insert_with(|| field.name().to_string());
            }
            None => self.fields.push(field),
        }
        self
    }

    pub fn fields(self, fields: impl IntoIterator<Item = Field>) -> Self {
        fields.into_iter().fold(self, Self::field)
    }

    /// Declaration options, merged over those of any base.
    pub fn options(mut self, options: Options) -> Self {
        self.options = &self.options & &options;
        self
    }

    pub fn build(self) -> Result<Parser, DeclarationError> {
        if let Some(name) = self.duplicate {
            return Err(DeclarationError::DuplicateField(name));
        }
        Parser::generate_fields(self.name, self.fields, self.options)
    }
}

/// Input keys grouped by owning field, plus the keys no field claims.
#[derive(Debug, Default)]
struct Matches {
    hits: HashMap<String, Vec<String>>,
    excess: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pass {
    Full,
    /// Partial update: absent fields stay absent and immutable fields are rejected.
    Update,
}

#[derive(Debug, Default)]
struct Resolved {
    values: IndexMap<String, Value>,
    supplied: HashSet<String>,
    extras: IndexMap<String, Value>,
}

impl Parser {
    pub fn builder(name: impl Into<String>) -> ParserBuilder {
        ParserBuilder::new(name)
    }

    /// Compile declared fields into the alias maps, checking that accepted
    /// keys are pairwise disjoint and that every dependency is declared.
    pub fn generate_fields(name: String, declared: Vec<Field>, options: Options) -> Result<Parser, DeclarationError> {
        let mut fields = IndexMap::with_capacity(declared.len());
        let mut aliases = IndexMap::with_capacity(declared.len());
        let mut alias_map: IndexMap<String, String> = IndexMap::new();
        let mut case_insensitive_map: HashMap<String, String> = HashMap::new();

        for field in declared {
            if fields.contains_key(field.name()) {
                return Err(DeclarationError::DuplicateField(field.name().to_string()));
            }
            let mut keys = field.all_aliases();
            if let Some(generator) = &options.alias_from_generator {
                let generated = generator.generate(field.name());
                if !keys.contains(&generated) {
                    keys.push(generated);
                }
            }
            for key in &keys {
                if let Some(other) = alias_map.get(key) {
                    return Err(DeclarationError::AliasCollision {
                        alias: key.clone(),
                        field: field.name().to_string(),
                        other: other.clone(),
                    });
                }
                alias_map.insert(key.clone(), field.name().to_string());
            }
            if field.is_case_insensitive(&options) {
                for key in &keys {
                    let folded = key.to_lowercase();
                    match case_insensitive_map.get(&folded) {
                        Some(other) if other != field.name() => {
                            return Err(DeclarationError::AliasCollision {
                                alias: key.clone(),
                                field: field.name().to_string(),
                                other: other.clone(),
                            });
                        }
                        _ => {
                            case_insensitive_map.insert(folded, field.name().to_string());
                        }
                    }
                }
            }
            aliases.insert(field.name().to_string(), keys);
            fields.insert(field.name().to_string(), field);
        }

        // a case-insensitive bucket must not swallow another field's exact key
        for (key, owner) in &alias_map {
            if let Some(other) = case_insensitive_map.get(&key.to_lowercase()) {
                if other != owner {
                    return Err(DeclarationError::AliasCollision {
                        alias: key.clone(),
                        field: other.clone(),
                        other: owner.clone(),
                    });
                }
            }
        }

        for field in fields.values() {
            let missing: Vec<String> =
                field.dependencies().iter().filter(|d| !fields.contains_key(*d)).cloned().collect();
            if !missing.is_empty() {
                return Err(DeclarationError::UndeclaredDependency { field: field.name().to_string(), missing });
            }
        }

        Ok(Parser { name, fields, aliases, alias_map, case_insensitive_map, options })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn fields(&self) -> &IndexMap<String, Field> {
        &self.fields
    }

    /// Field by canonical name or by any accepted alias.
    pub fn get_field(&self, key: &str) -> Option<&Field> {
        self.fields.get(key).or_else(|| self.alias_map.get(key).and_then(|name| self.fields.get(name)))
    }

    /// Accepted key to canonical field name.
    pub fn alias_map(&self) -> &IndexMap<String, String> {
        &self.alias_map
    }

    pub fn case_insensitive_map(&self) -> &HashMap<String, String> {
        &self.case_insensitive_map
    }

    /// Parse `data` with this parser's options in a fresh root context.
    pub fn parse(&self, data: impl Into<Value>) -> Result<IndexMap<String, Value>, ParseError> {
        self.parse_with(data, &Options::default()).map(|parsed| parsed.values)
    }

    /// Parse `data` with call options merged over the declaration options.
    /// Errors collected along the way are raised as one aggregate.
    pub fn parse_with(&self, data: impl Into<Value>, options: &Options) -> Result<Parsed, ParseError> {
        let mut ctx = (&self.options & options).make_context();
        let result = self.parse_data(data.into(), &mut ctx);
        Self::conclude(result, &mut ctx)
    }

    fn conclude(result: Result<IndexMap<String, Value>, ParseError>, ctx: &mut Context) -> Result<Parsed, ParseError> {
        match result {
            Ok(values) => {
                let warnings = ctx.finish()?;
                Ok(Parsed { values, warnings })
            }
            Err(err) if ctx.has_errors() => Err(ctx.raise_error(Some(err))),
            Err(err) => Err(err),
        }
    }

    /// Resolve `data` against the fields inside an existing context.
    pub fn parse_data(&self, data: Value, ctx: &mut Context) -> Result<IndexMap<String, Value>, ParseError> {
        let resolved = self.resolve(data, ctx, Pass::Full)?;
        self.finalize(resolved.values, &resolved.supplied, resolved.extras, ctx)
    }

    /// Apply `changes` on top of an already parsed `current` result.
    ///
    /// Absent fields keep their current value and no default is pulled in;
    /// supplying an immutable field raises [`ParseError::Immutable`].
    pub fn update(
        &self,
        current: &IndexMap<String, Value>,
        changes: impl Into<Value>,
        options: &Options,
    ) -> Result<IndexMap<String, Value>, ParseError> {
        let mut ctx = (&self.options & options).make_context();
        let result = self.resolve(changes.into(), &mut ctx, Pass::Update).and_then(|resolved| {
            let mut values = current.clone();
            values.extend(resolved.values);
            self.finalize(values, &resolved.supplied, resolved.extras, &mut ctx)
        });
        Self::conclude(result, &mut ctx).map(|parsed| parsed.values)
    }

    /// Secondary default pass: fill every absent field that has a default,
    /// deferred ones included, then restore declaration order.
    pub fn resolve_deferred(&self, values: &mut IndexMap<String, Value>) {
        for field in self.fields.values() {
            if values.contains_key(field.name()) || field.is_hidden(&self.options) {
                continue;
            }
            if !field.dependencies().iter().all(|d| values.contains_key(d)) {
                continue;
            }
            if let Some(default) = field.get_default(&self.options, true) {
                debug!(parser = %self.name, field = field.name(), "applied deferred default");
                values.insert(field.name().to_string(), default);
            }
        }
        self.sort_by_declaration(values);
    }

    /// Output form of a parsed result: output rules applied, no-output fields
    /// dropped, keys renamed through `alias_to_generator`.
    pub fn dump(&self, values: &IndexMap<String, Value>, options: &Options) -> Result<IndexMap<String, Value>, ParseError> {
        let options = &self.options & options;
        let mut ctx = options.make_context();
        let mut out = IndexMap::with_capacity(values.len());
        for (key, value) in values {
            let Some(field) = self.fields.get(key) else {
                out.insert(key.clone(), value.clone());
                continue;
            };
            if field.is_no_output(&options, Some(value)) {
                continue;
            }
            let value = match field.get_output_rule() {
                Some(rule) => match parse_guarded(rule, value.clone(), &mut ctx, key.as_str().into(), OnError::Throw)?
                    .into_value()
                {
                    Some(value) => value,
                    None => continue,
                },
                None => value.clone(),
            };
            let name = match &options.alias_to_generator {
                Some(generator) => generator.generate(key),
                None => key.clone(),
            };
            out.insert(name, value);
        }
        ctx.finish()?;
        Ok(out)
    }

    fn coerce_input(&self, data: Value, ctx: &Context) -> Result<IndexMap<String, Value>, ParseError> {
        let options = ctx.options();
        let raw = data.clone();
        match Transformer::new(options.registry(), options).apply(data, &Type::Map) {
            Ok(Value::Map(entries)) => Ok(entries.into_iter().map(|(k, v)| (k.key_string(), v)).collect()),
            Ok(other) => Err(ParseError::Coercion {
                route: ctx.route().clone(),
                value: raw,
                target: self.name.clone(),
                source: TransformError::mismatch(&other, "map", "not a mapping"),
            }),
            Err(source) => Err(ParseError::Coercion { route: ctx.route().clone(), value: raw, target: self.name.clone(), source }),
        }
    }

    fn is_case_insensitive(&self, name: &str) -> bool {
        self.fields.get(name).is_some_and(|f| f.is_case_insensitive(&self.options))
    }

    fn prefers_data_first(&self, input: &IndexMap<String, Value>, options: &Options) -> bool {
        if let Some(hint) = options.data_first_search {
            return hint;
        }
        let field_cost: usize = self
            .aliases
            .iter()
            .map(|(name, keys)| keys.len() + if self.is_case_insensitive(name) { input.len() } else { 0 })
            .sum();
        let per_key = if self.case_insensitive_map.is_empty() { 1 } else { 2 };
        let data_cost = input.len() * per_key;
        let data_first = data_cost < field_cost;
        debug!(parser = %self.name, field_cost, data_cost, data_first, "selected search strategy");
        data_first
    }

    fn match_field_first(&self, input: &IndexMap<String, Value>) -> Matches {
        let mut matches = Matches::default();
        let mut taken: HashSet<&str> = HashSet::new();
        for (name, keys) in &self.aliases {
            let mut hits: Vec<String> = keys.iter().filter(|k| input.contains_key(*k)).cloned().collect();
            if self.is_case_insensitive(name) {
                for key in input.keys() {
                    if !hits.contains(key)
                        && !self.alias_map.contains_key(key)
                        && self.case_insensitive_map.get(&key.to_lowercase()) == Some(name)
                    {
                        hits.push(key.clone());
                    }
                }
            }
            if !hits.is_empty() {
                taken.extend(hits.iter().filter_map(|k| input.get_key_value(k).map(|(k, _)| k.as_str())));
                matches.hits.insert(name.clone(), hits);
            }
        }
        matches.excess = input.keys().filter(|k| !taken.contains(k.as_str())).cloned().collect();
        matches
    }

    fn match_data_first(&self, input: &IndexMap<String, Value>) -> Matches {
        let mut matches = Matches::default();
        for key in input.keys() {
            let owner = self.alias_map.get(key).or_else(|| {
                if self.case_insensitive_map.is_empty() {
                    None
                } else {
                    self.case_insensitive_map.get(&key.to_lowercase())
                }
            });
            match owner {
                Some(name) => matches.hits.entry(name.clone()).or_default().push(key.clone()),
                None => matches.excess.push(key.clone()),
            }
        }
        // same preference order as field-first: declared aliases, then folded matches
        for (name, hits) in matches.hits.iter_mut() {
            let keys = &self.aliases[name];
            hits.sort_by_key(|hit| keys.iter().position(|k| k == hit).unwrap_or(usize::MAX));
        }
        matches
    }

    fn resolve(&self, data: Value, ctx: &mut Context, pass: Pass) -> Result<Resolved, ParseError> {
        let options = ctx.shared_options();
        let mut input = self.coerce_input(data, ctx)?;
        let mut matches = if self.prefers_data_first(&input, &options) {
            self.match_data_first(&input)
        } else {
            self.match_field_first(&input)
        };

        let mut resolved = Resolved::default();
        let mut deferred: Vec<(&Field, Value)> = Vec::new();
        for field in self.fields.values() {
            let name = field.name();
            let hits = matches.hits.remove(name).unwrap_or_default();
            if field.is_hidden(&options) {
                continue;
            }
            let Some(first) = hits.first() else {
                if pass == Pass::Full {
                    self.fill_absent(field, &options, ctx, &mut resolved.values)?;
                }
                continue;
            };
            if hits.len() > 1 && !options.ignore_alias_conflicts() {
                let route = ctx.route().child(RouteItem::from(name));
                ctx.collect(ParseError::AliasConflict { route, field: name.to_string(), aliases: hits })?;
                continue;
            }
            let Some(value) = input.swap_remove(first) else {
                continue;
            };
            if field.is_no_input(&options, Some(&value)) {
                debug!(parser = %self.name, field = name, "ignored input for no-input field");
                if pass == Pass::Full {
                    self.fill_absent(field, &options, ctx, &mut resolved.values)?;
                }
                continue;
            }
            if pass == Pass::Update && field.is_immutable() {
                let route = ctx.route().child(RouteItem::from(name));
                ctx.collect(ParseError::Immutable { route, field: name.to_string() })?;
                continue;
            }
            if field.get_discriminator().is_some() {
                deferred.push((field, value));
                continue;
            }
            self.parse_field(field, value, ctx, &options, pass, &mut resolved)?;
        }
        for (field, value) in deferred {
            self.parse_field(field, value, ctx, &options, pass, &mut resolved)?;
        }

        let mut rejected = Vec::new();
        for key in matches.excess {
            let Some(value) = input.swap_remove(&key) else {
                continue;
            };
            if let Some(rule) = &options.addition_rule {
                let policy = options.invalid_values();
                if let Some(value) = parse_guarded(rule, value, ctx, key.as_str().into(), policy)?.into_value() {
                    resolved.extras.insert(key, value);
                }
                continue;
            }
            match options.addition() {
                Addition::Ignore => debug!(parser = %self.name, key = %key, "ignored excess key"),
                Addition::Preserve => {
                    resolved.extras.insert(key, value);
                }
                Addition::Reject => rejected.push(key),
            }
        }
        if !rejected.is_empty() {
            ctx.collect(ParseError::Excess { route: ctx.route().clone(), keys: rejected })?;
        }
        Ok(resolved)
    }

    fn parse_field(
        &self,
        field: &Field,
        value: Value,
        ctx: &mut Context,
        options: &Options,
        pass: Pass,
        resolved: &mut Resolved,
    ) -> Result<(), ParseError> {
        match field.parse_value(value, ctx, &resolved.values)? {
            Outcome::Parsed(value) | Outcome::Preserved(value) => {
                resolved.values.insert(field.name().to_string(), value);
                resolved.supplied.insert(field.name().to_string());
            }
            Outcome::Excluded if pass == Pass::Full => self.fill_absent(field, options, ctx, &mut resolved.values)?,
            Outcome::Excluded | Outcome::Collected => {}
        }
        Ok(())
    }

    fn fill_absent(
        &self,
        field: &Field,
        options: &Options,
        ctx: &mut Context,
        values: &mut IndexMap<String, Value>,
    ) -> Result<(), ParseError> {
        if let Some(default) = field.get_default(options, false) {
            values.insert(field.name().to_string(), default);
        } else if field.is_required(options) {
            ctx.collect(ParseError::Absence { route: ctx.route().clone(), field: field.name().to_string() })?;
        }
        Ok(())
    }

    /// Dependency post-pass, then declaration order with non-field keys and
    /// excess keys last.
    fn finalize(
        &self,
        mut values: IndexMap<String, Value>,
        supplied: &HashSet<String>,
        extras: IndexMap<String, Value>,
        ctx: &mut Context,
    ) -> Result<IndexMap<String, Value>, ParseError> {
        loop {
            let broken: Vec<(&Field, Vec<String>)> = self
                .fields
                .values()
                .filter(|f| values.contains_key(f.name()))
                .filter_map(|f| {
                    let missing: Vec<String> =
                        f.dependencies().iter().filter(|d| !values.contains_key(*d)).cloned().collect();
                    (!missing.is_empty()).then_some((f, missing))
                })
                .collect();
            if broken.is_empty() {
                break;
            }
            for (field, missing) in broken {
                values.shift_remove(field.name());
                if !supplied.contains(field.name()) {
                    continue;
                }
                let route = ctx.route().child(RouteItem::from(field.name()));
                match field.get_on_error(ctx.options()) {
                    OnError::Throw => {
                        ctx.collect(ParseError::DependenciesAbsence { route, field: field.name().to_string(), missing })?
                    }
                    OnError::Exclude | OnError::Preserve => {
                        ctx.warn(format!("dropped field {:?}: depends on absent {missing:?}", field.name()))
                    }
                }
            }
        }
        self.sort_by_declaration(&mut values);
        values.extend(extras);
        Ok(values)
    }

    fn sort_by_declaration(&self, values: &mut IndexMap<String, Value>) {
        let rank = |key: &str| self.fields.get_index_of(key).unwrap_or(usize::MAX);
        values.sort_by(|a, _, b, _| rank(a.as_str()).cmp(&rank(b.as_str())));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Gate;
    use crate::options::AliasGenerator;
    use crate::rule::Rule;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn user() -> Parser {
        Parser::builder("User")
            .field(Field::new("name", Rule::of(Type::Str)).alias("username"))
            .field(Field::new("age", Rule::of(Type::Int)).default(0))
            .build()
            .unwrap()
    }

    fn json_map(values: &IndexMap<String, Value>) -> serde_json::Value {
        Value::Map(values.iter().map(|(k, v)| (Value::from(k.as_str()), v.clone())).collect()).to_json()
    }

    #[test]
    fn both_strategies_agree() {
        let data = Value::from(json!({"username": "ann", "age": "3", "x": 1}));
        for hint in [true, false] {
            let options = Options { data_first_search: Some(hint), ..Options::default() };
            let parsed = user().parse_with(data.clone(), &options).unwrap();
            assert_eq!(json_map(&parsed.values), json!({"name": "ann", "age": 3}));
        }
    }

    fn input(keys: impl IntoIterator<Item = String>) -> IndexMap<String, Value> {
        keys.into_iter().map(|k| (k, Value::Int(1))).collect()
    }

    #[test]
    fn sparse_input_against_many_aliases_searches_data_first() {
        let parser = Parser::builder("Wide")
            .fields((0..6).map(|i| {
                Field::new(format!("f{i}"), Rule::of(Type::Int)).required(false).aliases([format!("a{i}"), format!("b{i}"), format!("c{i}")])
            }))
            .build()
            .unwrap();
        let data = input(["b2".to_string(), "f4".to_string()]);
        assert!(parser.prefers_data_first(&data, &Options::default()));

        let forced = Options { data_first_search: Some(false), ..Options::default() };
        assert!(!parser.prefers_data_first(&data, &forced));

        let by_data = parser.match_data_first(&data);
        let by_field = parser.match_field_first(&data);
        assert_eq!(by_data.hits, by_field.hits);
        assert_eq!(by_data.hits["f2"], vec!["b2".to_string()]);
    }

    #[test]
    fn crowded_input_against_one_field_searches_field_first() {
        let parser = Parser::builder("Narrow").field(Field::new("a", Rule::of(Type::Int))).build().unwrap();
        let data = input((0..10).map(|i| format!("k{i}")).chain(["a".to_string()]));
        assert!(!parser.prefers_data_first(&data, &Options::default()));
        assert!(parser.prefers_data_first(&data, &Options { data_first_search: Some(true), ..Options::default() }));

        let matches = parser.match_field_first(&data);
        assert_eq!(matches.hits["a"], vec!["a".to_string()]);
        assert_eq!(matches.excess.len(), 10);
    }

    #[test]
    fn case_insensitive_fields_weigh_the_input_size() {
        let parser = Parser::builder("Folded")
            .field(Field::new("Token", Rule::of(Type::Str)).case_insensitive(true))
            .build()
            .unwrap();
        // one alias plus one probe per key, against two lookups per key
        let data = input(["TOKEN".to_string(), "x".to_string(), "y".to_string()]);
        assert!(!parser.prefers_data_first(&data, &Options::default()));
        let values = parser.parse(Value::from(json!({"TOKEN": "t", "x": 1, "y": 2}))).unwrap();
        assert_eq!(values["Token"], Value::from("t"));
    }

    #[test]
    fn key_folding_is_fixed_at_declaration() {
        let parser = Parser::builder("P").field(Field::new("Token", Rule::of(Type::Str))).build().unwrap();
        let options = Options { case_insensitive: Some(true), ..Options::default() };
        let err = parser.parse_with(Value::from(json!({"TOKEN": "t"})), &options).unwrap_err();
        assert!(matches!(err, ParseError::Absence { ref field, .. } if field == "Token"), "got {err}");

        let folded = Parser::builder("P")
            .field(Field::new("Token", Rule::of(Type::Str)))
            .options(options)
            .build()
            .unwrap();
        assert_eq!(folded.parse(Value::from(json!({"TOKEN": "t"}))).unwrap()["Token"], Value::from("t"));
    }

    #[test]
    fn alias_conflicts_unless_ignored() {
        let data = Value::from(json!({"name": "a", "username": "b"}));
        assert!(matches!(user().parse(data.clone()), Err(ParseError::AliasConflict { aliases, .. }) if aliases.len() == 2));
        let options = Options { ignore_alias_conflicts: Some(true), ..Options::default() };
        let parsed = user().parse_with(data, &options).unwrap();
        assert_eq!(parsed.values["name"], Value::from("a"));
    }

    #[test]
    fn case_insensitive_keys() {
        let parser = Parser::builder("P")
            .field(Field::new("Token", Rule::of(Type::Str)).case_insensitive(true))
            .build()
            .unwrap();
        for hint in [true, false] {
            let options = Options { data_first_search: Some(hint), ..Options::default() };
            let parsed = parser.parse_with(json!({"TOKEN": "t"}), &options).unwrap();
            assert_eq!(parsed.values["Token"], Value::from("t"));
        }
    }

    #[test]
    fn declaration_checks() {
        let dup = Parser::builder("P")
            .field(Field::new("a", Rule::of(Type::Str)))
            .field(Field::new("a", Rule::of(Type::Int)))
            .build();
        assert_eq!(dup.unwrap_err(), DeclarationError::DuplicateField("a".into()));

        let collision = Parser::builder("P")
            .field(Field::new("a", Rule::of(Type::Str)).alias("k"))
            .field(Field::new("b", Rule::of(Type::Str)).alias("k"))
            .build();
        assert!(matches!(collision, Err(DeclarationError::AliasCollision { .. })));

        let folded = Parser::builder("P")
            .field(Field::new("Key", Rule::of(Type::Str)).case_insensitive(true))
            .field(Field::new("key", Rule::of(Type::Str)))
            .build();
        assert!(matches!(folded, Err(DeclarationError::AliasCollision { .. })));

        let undeclared = Parser::builder("P").field(Field::new("a", Rule::of(Type::Str)).depends_on(["b"])).build();
        assert_eq!(
            undeclared.unwrap_err(),
            DeclarationError::UndeclaredDependency { field: "a".into(), missing: vec!["b".into()] }
        );
    }

    #[test]
    fn base_fields_are_inherited_and_overridable() {
        let admin = Parser::builder("Admin")
            .base(&user())
            .field(Field::new("age", Rule::of(Type::Int)).default(18))
            .field(Field::new("level", Rule::of(Type::Int)).default(1))
            .build()
            .unwrap();
        let values = admin.parse(json!({"name": "root"})).unwrap();
        assert_eq!(json_map(&values), json!({"name": "root", "age": 18, "level": 1}));
    }

    #[test]
    fn excess_policies() {
        let data = json!({"name": "a", "extra": "1"});
        let preserve = Options { addition: Some(Addition::Preserve), ..Options::default() };
        assert_eq!(json_map(&user().parse_with(data.clone(), &preserve).unwrap().values), json!({"name": "a", "age": 0, "extra": "1"}));
        let reject = Options { addition: Some(Addition::Reject), ..Options::default() };
        assert!(matches!(user().parse_with(data.clone(), &reject), Err(ParseError::Excess { keys, .. }) if keys == vec!["extra".to_string()]));
        let typed = Options { addition_rule: Some(Rule::of(Type::Int)), ..Options::default() };
        assert_eq!(user().parse_with(data, &typed).unwrap().values["extra"], Value::Int(1));
    }

    #[test]
    fn dependencies_gate_supplied_and_defaulted_fields() {
        let parser = Parser::builder("P")
            .field(Field::new("card", Rule::of(Type::Str)).required(false))
            .field(Field::new("cvv", Rule::of(Type::Str)).depends_on(["card"]).required(false))
            .field(Field::new("hint", Rule::of(Type::Str)).depends_on(["card"]).default("none"))
            .build()
            .unwrap();
        assert_eq!(json_map(&parser.parse(json!({})).unwrap()), json!({}));
        let err = parser.parse(json!({"cvv": "123"})).unwrap_err();
        assert_eq!(
            err,
            ParseError::DependenciesAbsence {
                route: crate::context::Route::default().child("cvv".into()),
                field: "cvv".into(),
                missing: vec!["card".into()],
            }
        );
        assert_eq!(json_map(&parser.parse(json!({"card": "c", "cvv": "1"})).unwrap()), json!({"card": "c", "cvv": "1", "hint": "none"}));
    }

    #[test]
    fn update_keeps_current_and_rejects_immutable() {
        let parser = Parser::builder("P")
            .field(Field::new("id", Rule::of(Type::Int)).immutable())
            .field(Field::new("name", Rule::of(Type::Str)))
            .field(Field::new("tags", Rule::list_of(Rule::of(Type::Str))).default(Value::List(vec![])))
            .build()
            .unwrap();
        let current = parser.parse(json!({"id": 1, "name": "a"})).unwrap();
        let updated = parser.update(&current, json!({"name": "b"}), &Options::default()).unwrap();
        assert_eq!(json_map(&updated), json!({"id": 1, "name": "b", "tags": []}));
        assert!(matches!(parser.update(&current, json!({"id": 2}), &Options::default()), Err(ParseError::Immutable { .. })));
    }

    #[test]
    fn deferred_defaults_fill_in_a_second_pass() {
        let parser = Parser::builder("P")
            .field(Field::new("a", Rule::of(Type::Int)).default(1).defer_default())
            .field(Field::new("b", Rule::of(Type::Int)))
            .build()
            .unwrap();
        let mut values = parser.parse(json!({"b": 2})).unwrap();
        assert_eq!(json_map(&values), json!({"b": 2}));
        parser.resolve_deferred(&mut values);
        assert_eq!(values.keys().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn dump_applies_output_rules_and_gates() {
        let parser = Parser::builder("P")
            .field(Field::new("count", Rule::of(Type::Int)).output_rule(Rule::of(Type::Str)))
            .field(Field::new("secret", Rule::of(Type::Str)).no_output(Gate::Flag(true)))
            .field(Field::new("user_name", Rule::of(Type::Str)))
            .build()
            .unwrap();
        let values = parser.parse(json!({"count": 3, "secret": "s", "user_name": "u"})).unwrap();
        let options = Options {
            alias_to_generator: Some(AliasGenerator::new(|name| name.replace('_', "-"))),
            ..Options::default()
        };
        let dumped = parser.dump(&values, &options).unwrap();
        assert_eq!(json_map(&dumped), json!({"count": "3", "user-name": "u"}));
    }

    #[test]
    fn generated_aliases_are_accepted() {
        let parser = Parser::builder("P")
            .field(Field::new("user_name", Rule::of(Type::Str)))
            .options(Options {
                alias_from_generator: Some(AliasGenerator::new(|name| name.replace('_', ""))),
                ..Options::default()
            })
            .build()
            .unwrap();
        assert_eq!(parser.alias_map().get("username").map(String::as_str), Some("user_name"));
        assert_eq!(parser.parse(json!({"username": "x"})).unwrap()["user_name"], Value::from("x"));
    }
}
