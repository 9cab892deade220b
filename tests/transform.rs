use std::sync::Arc;

use chrono::{NaiveDate, TimeDelta};
use pretty_assertions::assert_eq;
use rule_coerce as rc;
use rc::transform::{Category, Detector, Registry, Transformer};
use rc::types::EnumType;
use rc::{ConstraintName, Kind, Options, Rule, TransformError, Type, Value};
use rust_decimal::Decimal;
use serde_json::json;

fn coerce(value: impl Into<Value>, target: Type) -> Value {
    Rule::of(target).apply(value).unwrap()
}

#[test]
fn test_scalars_from_text() {
    assert_eq!(coerce(" 42 ", Type::Int), Value::Int(42));
    assert_eq!(coerce("1_000", Type::Int), Value::Int(1000));
    assert_eq!(coerce("2.5", Type::Float), Value::Float(2.5));
    assert_eq!(coerce("1e3", Type::Int), Value::Int(1000));
    assert_eq!(coerce("0.10", Type::Decimal), Value::Decimal(Decimal::new(10, 2)));
    assert_eq!(coerce("yes", Type::Bool), Value::Bool(true));
    assert_eq!(coerce("off", Type::Bool), Value::Bool(false));
    assert!(Rule::of(Type::Bool).apply("maybe").is_err());
}

#[test]
fn test_temporal_kinds() {
    assert_eq!(coerce("2024-03-09", Type::Date), Value::Date(NaiveDate::from_ymd_opt(2024, 3, 9).unwrap()));
    assert_eq!(coerce("PT1H30M", Type::Duration), Value::Duration(TimeDelta::minutes(90)));
    let Value::DateTimeTz(dt) = coerce("2024-03-09T10:00:00Z", Type::DateTime) else {
        panic!("expected an aware datetime");
    };
    assert_eq!(dt.to_rfc3339(), "2024-03-09T10:00:00+00:00");
    assert_eq!(coerce(Value::Date(NaiveDate::from_ymd_opt(2024, 3, 9).unwrap()), Type::Str), Value::from("2024-03-09"));
}

#[test]
fn test_containers_from_text_and_items() {
    let rule = Rule::list_of(Rule::of(Type::Int));
    assert_eq!(rule.apply("[1, \"2\", 3.0]").unwrap(), Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)]));
    let map = Rule::map_of(Rule::of(Type::Str), Rule::of(Type::Int));
    assert_eq!(map.apply("a=1&b=2").unwrap(), Value::from(json!({"a": 1, "b": 2})));
    let set = Rule::set_of(Rule::of(Type::Int));
    let Value::Set(items) = set.apply("3,1,3").unwrap() else { panic!("expected a set") };
    assert_eq!(items.len(), 2);
}

#[test]
fn test_enum_members() {
    let status = Type::Enum(Arc::new(EnumType::new("Status", [("Active", 1), ("Closed", 0)])));
    let Value::Enum(member) = coerce("1", status.clone()) else { panic!("expected a member") };
    assert_eq!(&*member.name, "Active");
    let Value::Enum(member) = coerce("Closed", status) else { panic!("expected a member") };
    assert_eq!(*member.value, Value::Int(0));
}

#[test]
fn test_lax_constraints_adjust_values() {
    let clamp = Rule::builder(Type::Int).lax(ConstraintName::Ge, 0).lax(ConstraintName::Le, 10).build().unwrap();
    assert_eq!(clamp.apply("-4").unwrap(), Value::Int(0));
    assert_eq!(clamp.apply("40").unwrap(), Value::Int(10));
    let above = Rule::builder(Type::Int).lax(ConstraintName::Gt, 0).build().unwrap();
    assert_eq!(above.apply(0).unwrap(), Value::Int(1));

    let truncate = Rule::builder(Type::Str).lax(ConstraintName::MaxLength, 3).build().unwrap();
    assert_eq!(truncate.apply("abcdef").unwrap(), Value::from("abc"));
}

#[test]
fn test_lax_precision_applies_places_before_digits() {
    let rule = Rule::builder(Type::Decimal)
        .lax(ConstraintName::DecimalPlaces, 2)
        .lax(ConstraintName::MaxDigits, 4)
        .build()
        .unwrap();
    let names: Vec<ConstraintName> = rule.constraints().iter().map(|c| c.name()).collect();
    assert_eq!(names, vec![ConstraintName::DecimalPlaces, ConstraintName::MaxDigits]);
    assert_eq!(rule.apply("123.456").unwrap(), Value::Decimal(Decimal::new(1235, 1)));
}

#[test]
fn test_const_suppresses_other_constraints() {
    let rule = Rule::builder(Type::Int).constant(5).ge(10).build().unwrap();
    assert_eq!(rule.constraints().len(), 1);
    assert_eq!(rule.apply("5").unwrap(), Value::Int(5));
    assert!(rule.apply(6).is_err());
}

#[test]
fn test_hooks_wrap_validation() {
    let rule = Rule::builder(Type::Str)
        .pre_validate(|v| match v {
            Value::Str(s) => Value::Str(s.trim().to_string()),
            other => other,
        })
        .max_length(3)
        .post_validate(|v| match v {
            Value::Str(s) => Value::Str(s.to_uppercase()),
            other => other,
        })
        .build()
        .unwrap();
    assert_eq!(rule.apply("  abc  ").unwrap(), Value::from("ABC"));
}

fn yes_no(_: &Transformer<'_>, value: Value, target: &Type) -> Result<Value, TransformError> {
    match value.as_str() {
        Some("si") => Ok(Value::Bool(true)),
        Some("no") => Ok(Value::Bool(false)),
        _ => Err(TransformError::mismatch(&value, target.name(), "expected si or no")),
    }
}

fn stringify(_: &Transformer<'_>, value: Value, _: &Type) -> Result<Value, TransformError> {
    Ok(Value::Str(format!("<{value}>")))
}

#[test]
fn test_custom_registry_entries_take_precedence() {
    let mut registry = Registry::with_builtins();
    registry.register("si-no", Detector::Exact(Kind::Bool), yes_no, 10);
    let options = Options { registry: Some(registry), ..Options::default() };
    let rule = Rule::of(Type::Bool);
    assert_eq!(rule.apply_with("si", &options).unwrap(), Value::Bool(true));
    assert!(rule.apply_with("true", &options).is_err());
    assert_eq!(rule.apply("true").unwrap(), Value::Bool(true));
}

#[test]
fn test_chained_registry_falls_back_to_base() {
    let mut registry = Registry::new();
    registry.register("text", Detector::Category(Category::Text), stringify, 0);
    let registry = registry.with_base(Registry::with_builtins());
    let options = Options { registry: Some(registry), ..Options::default() };
    assert_eq!(Rule::of(Type::Str).apply_with(7, &options).unwrap(), Value::from("<7>"));
    assert_eq!(Rule::of(Type::Int).apply_with("7", &options).unwrap(), Value::Int(7));
}
