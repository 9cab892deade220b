use pretty_assertions::assert_eq;
use rule_coerce as rc;
use rc::{ConstraintName, DeclarationError, Field, Options, ParseError, Parser, Rule, TransformError, Type, Value};
use serde_json::json;

// Declaration errors surface when building, never while parsing.

#[test]
fn test_exclusive_bounds() {
    let err = Rule::builder(Type::Int).gt(0).ge(1).build().unwrap_err();
    assert_eq!(err, DeclarationError::ExclusiveConstraints(ConstraintName::Gt, ConstraintName::Ge));
}

#[test]
fn test_constraint_outside_origin_capabilities() {
    let err = Rule::builder(Type::Bool).max_length(3).build().unwrap_err();
    assert!(matches!(err, DeclarationError::UnsupportedConstraint { constraint: ConstraintName::MaxLength, .. }));
    let err = Rule::builder(Type::Int).pattern("^1").build().unwrap_err();
    assert!(matches!(err, DeclarationError::UnsupportedConstraint { constraint: ConstraintName::Regex, .. }));
}

#[test]
fn test_lax_form_is_not_available_for_every_constraint() {
    let err = Rule::builder(Type::Str).lax(ConstraintName::MinLength, 2).build().unwrap_err();
    assert_eq!(err, DeclarationError::NoLaxForm(ConstraintName::MinLength));
}

#[test]
fn test_bad_pattern_is_reported() {
    let err = Rule::builder(Type::Str).pattern("(unclosed").build().unwrap_err();
    assert!(matches!(err, DeclarationError::InvalidPattern { ref pattern, .. } if pattern == "(unclosed"));
}

#[test]
fn test_inconsistent_constraint_values() {
    assert!(matches!(
        Rule::builder(Type::Int).ge(10).le(1).build(),
        Err(DeclarationError::InvalidConstraintValue { constraint: ConstraintName::Le, .. })
    ));
    assert!(matches!(
        Rule::builder(Type::Str).min_length(5).max_length(2).build(),
        Err(DeclarationError::InvalidConstraintValue { constraint: ConstraintName::MaxLength, .. })
    ));
    assert!(matches!(
        Rule::builder(Type::Decimal).decimal_places(4).max_digits(2).build(),
        Err(DeclarationError::InvalidConstraintValue { constraint: ConstraintName::DecimalPlaces, .. })
    ));
    assert!(matches!(
        Rule::builder(Type::List).min_contains(1).build(),
        Err(DeclarationError::InvalidConstraintValue { constraint: ConstraintName::MinContains, .. })
    ));
    assert!(matches!(
        Rule::builder(Type::Int).multiple_of(0).build(),
        Err(DeclarationError::InvalidConstraintValue { constraint: ConstraintName::MultipleOf, .. })
    ));
    assert!(matches!(
        Rule::builder(Type::Int).ge("ten").build(),
        Err(DeclarationError::InvalidConstraintValue { constraint: ConstraintName::Ge, .. })
    ));
}

#[test]
fn test_empty_combinator() {
    assert_eq!(Rule::one_of(Vec::<Rule>::new()).unwrap_err(), DeclarationError::EmptyLogic("one_of"));
}

#[test]
fn test_parser_declaration_errors() {
    let err = Parser::builder("P")
        .field(Field::new("a", Rule::of(Type::Int)).alias("x"))
        .field(Field::new("x", Rule::of(Type::Int)))
        .build()
        .unwrap_err();
    assert_eq!(err, DeclarationError::AliasCollision { alias: "x".into(), field: "x".into(), other: "a".into() });
}

#[test]
fn test_unresolved_reference() {
    let mut refs = rc::RefRegistry::new();
    let _ = refs.placeholder("Ghost");
    assert_eq!(refs.resolve().unwrap_err(), DeclarationError::UnresolvedReference("Ghost".into()));
}

// Parse errors.

#[test]
fn test_explicit_cast_forbidden() {
    let options = Options { no_explicit_cast: Some(true), ..Options::default() };
    let err = Rule::of(Type::Int).apply_with("3", &options).unwrap_err();
    assert!(matches!(err, ParseError::Coercion { source: TransformError::ExplicitCast { .. }, .. }), "got {err}");
    assert_eq!(Rule::of(Type::Int).apply_with(true, &options).unwrap(), Value::Int(1));
}

#[test]
fn test_data_loss_forbidden() {
    let options = Options { no_data_loss: Some(true), ..Options::default() };
    let err = Rule::of(Type::Int).apply_with(1.5, &options).unwrap_err();
    assert!(matches!(err, ParseError::Coercion { source: TransformError::DataLoss { .. }, .. }), "got {err}");
    assert_eq!(Rule::of(Type::Int).apply_with(2.0, &options).unwrap(), Value::Int(2));
}

#[test]
fn test_tuple_arity() {
    let rule = Rule::tuple_of([Rule::of(Type::Int), Rule::of(Type::Str)]);
    assert!(matches!(rule.apply("1"), Err(ParseError::Coercion { .. })));
    assert_eq!(
        rule.apply("1, a, extra").unwrap(),
        Value::Tuple(vec![Value::Int(1), Value::from("a")])
    );
    let strict = Options { no_data_loss: Some(true), ..Options::default() };
    assert!(rule.apply_with("1, a, extra", &strict).is_err());
}

#[test]
fn test_root_coercion_is_raised_even_when_collecting() {
    let parser = Parser::builder("P").field(Field::new("a", Rule::of(Type::Int))).build().unwrap();
    let options = Options { collect_errors: Some(true), ..Options::default() };
    let err = parser.parse_with(json!(5), &options).unwrap_err();
    assert!(matches!(err, ParseError::Coercion { .. }), "got {err}");
}

#[test]
fn test_max_errors_stops_collection_early() {
    let parser = Parser::builder("P")
        .field(Field::new("a", Rule::of(Type::Int)))
        .field(Field::new("b", Rule::of(Type::Int)))
        .field(Field::new("c", Rule::of(Type::Int)))
        .build()
        .unwrap();
    let options = Options { collect_errors: Some(true), max_errors: Some(2), ..Options::default() };
    let err = parser.parse_with(json!({}), &options).unwrap_err();
    assert_eq!(err.into_errors().len(), 2);
}

#[test]
fn test_containment_counts() {
    let rule = Rule::builder(Type::List)
        .contains(Rule::builder(Type::Int).gt(10).build().unwrap())
        .min_contains(2)
        .build()
        .unwrap();
    assert!(rule.apply(json!([11, 12, 1])).is_ok());
    let err = rule.apply(json!([11, 1])).unwrap_err();
    assert!(matches!(err, ParseError::Containment { count: 1, min: 2, max: None, .. }), "got {err}");
}

#[test]
fn test_unique_items() {
    let rule = Rule::builder(Type::List).unique_items().build().unwrap();
    assert!(rule.apply(json!([1, 2])).is_ok());
    assert!(matches!(rule.apply(json!([1, 1])), Err(ParseError::Constraint { constraint: ConstraintName::UniqueItems, .. })));
}

#[test]
fn test_display_names_the_route() {
    let parser = Parser::builder("P")
        .field(Field::new("n", Rule::builder(Type::Int).lt(5).build().unwrap()))
        .build()
        .unwrap();
    let err = parser.parse(json!({"n": 9})).unwrap_err();
    assert!(err.to_string().starts_with("$.n: constraint lt=5"), "got {err}");
}
