use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Timelike};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use super::numeric::{parse_number_text, text_of};
use super::Transformer;
use crate::comparison::to_decimal;
use crate::errors::TransformError;
use crate::types::Type;
use crate::value::Value;

/// Epoch numbers at or above this magnitude are milliseconds.
const EPOCH_MILLIS_THRESHOLD: i64 = 100_000_000_000;

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d", "%Y%m%d", "%d %B %Y", "%d %b %Y", "%B %d, %Y", "%b %d, %Y"];

const TIME_FORMATS: &[&str] = &["%H:%M:%S%.f", "%H:%M", "%I:%M:%S %p", "%I:%M %p", "%H%M%S"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M",
    "%Y%m%dT%H%M%S",
    "%a %b %d %H:%M:%S %Y",
];

const AWARE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M%:z",
    "%Y-%m-%d %H:%M%:z",
    "%Y/%m/%d %H:%M:%S%.f%:z",
];

static TZ_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(?:z|[+-]\d{2}:?\d{2}|\s?gmt|\s?utc)$").unwrap());

static ISO_DURATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<sign>[-+])?P(?:(?P<w>\d+(?:\.\d+)?)W)?(?:(?P<d>\d+(?:\.\d+)?)D)?(?:T(?:(?P<h>\d+(?:\.\d+)?)H)?(?:(?P<m>\d+(?:\.\d+)?)M)?(?:(?P<s>\d+(?:\.\d+)?)S)?)?$",
    )
    .unwrap()
});

static CLOCK_DURATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:(?P<d>-?\d+) days?,\s*)?(?P<sign>-)?(?P<h>\d+):(?P<m>\d{1,2}):(?P<s>\d{1,2}(?:\.\d+)?)$").unwrap()
});

const OUT_OF_RANGE: &str = "duration out of range";

fn micros(d: Decimal) -> Option<Decimal> {
    d.checked_mul(Decimal::from(1_000_000))
}

/// Seconds of a duration value.
pub(super) fn duration_seconds(value: &Value) -> Option<Decimal> {
    match value {
        Value::Duration(d) => d.num_microseconds().map(|us| Decimal::new(us, 6).normalize()),
        _ => None,
    }
}

/// Seconds since the Unix epoch of a date or datetime value; naive values are read as UTC.
pub(super) fn epoch_seconds(value: &Value) -> Option<Decimal> {
    let us = match value {
        Value::Date(d) => d.and_time(NaiveTime::MIN).and_utc().timestamp_micros(),
        Value::DateTime(dt) => dt.and_utc().timestamp_micros(),
        Value::DateTimeTz(dt) => dt.timestamp_micros(),
        _ => return None,
    };
    Some(Decimal::new(us, 6).normalize())
}

fn from_epoch(value: &Value, target: &Type) -> Result<DateTime<FixedOffset>, TransformError> {
    let out_of_range = || TransformError::mismatch(value, target.name(), "timestamp out of range");
    let mut seconds = to_decimal(value).ok_or_else(|| TransformError::mismatch(value, target.name(), "not a finite number"))?;
    if seconds.abs() >= Decimal::from(EPOCH_MILLIS_THRESHOLD) {
        seconds /= Decimal::from(1000);
    }
    let whole = seconds.floor();
    let nanos = ((seconds - whole) * Decimal::from(1_000_000_000)).round().to_u32().ok_or_else(out_of_range)?;
    let secs = whole.to_i64().ok_or_else(out_of_range)?;
    DateTime::from_timestamp(secs, nanos).map(|dt| dt.fixed_offset()).ok_or_else(out_of_range)
}

fn parse_aware(text: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(dt);
    }
    let upper = text.to_ascii_uppercase();
    let normalized = if let Some(stripped) = upper.strip_suffix('Z') {
        format!("{}+00:00", &text[..stripped.len()])
    } else if upper.ends_with("UTC") || upper.ends_with("GMT") {
        format!("{}+00:00", text[..text.len() - 3].trim_end())
    } else {
        text.to_string()
    };
    DateTime::parse_from_rfc3339(&normalized)
        .ok()
        .or_else(|| AWARE_FORMATS.iter().find_map(|f| DateTime::parse_from_str(&normalized, f).ok()))
}

fn parse_naive(text: &str) -> Option<NaiveDateTime> {
    DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(text, f).ok())
        .or_else(|| parse_date_text(text).map(|d| d.and_time(NaiveTime::MIN)))
}

fn parse_date_text(text: &str) -> Option<NaiveDate> {
    DATE_FORMATS.iter().find_map(|f| NaiveDate::parse_from_str(text, f).ok())
}

/// Datetime from text, either aware (offset suffix present) or naive.
fn parse_datetime_text(text: &str) -> Option<Value> {
    if TZ_SUFFIX.is_match(text) {
        if let Some(dt) = parse_aware(text) {
            return Some(Value::DateTimeTz(dt));
        }
    }
    parse_naive(text).map(Value::DateTime).or_else(|| parse_aware(text).map(Value::DateTimeTz))
}

pub(super) fn to_date(t: &Transformer<'_>, value: Value, target: &Type) -> Result<Value, TransformError> {
    let truncate = |dt: NaiveDateTime, value: &Value| -> Result<Value, TransformError> {
        if dt.time() != NaiveTime::MIN {
            t.allow_loss(value, target)?;
        }
        Ok(Value::Date(dt.date()))
    };
    match &value {
        Value::DateTime(dt) => truncate(*dt, &value),
        Value::DateTimeTz(dt) => truncate(dt.naive_local(), &value),
        Value::Str(_) | Value::Bytes(_) => {
            let text = text_of(&value).unwrap_or_default();
            if let Some(d) = parse_date_text(text) {
                return Ok(Value::Date(d));
            }
            match parse_datetime_text(text) {
                Some(Value::DateTime(dt)) => truncate(dt, &value),
                Some(Value::DateTimeTz(dt)) => truncate(dt.naive_local(), &value),
                _ => match parse_number_text(text) {
                    Some(n) => truncate(from_epoch(&n, target)?.naive_utc(), &value),
                    None => Err(TransformError::mismatch(&value, target.name(), "unrecognized date")),
                },
            }
        }
        Value::Int(_) | Value::Float(_) | Value::Decimal(_) => truncate(from_epoch(&value, target)?.naive_utc(), &value),
        _ => t.collapse(value, target),
    }
}

pub(super) fn to_time(t: &Transformer<'_>, value: Value, target: &Type) -> Result<Value, TransformError> {
    match &value {
        Value::DateTime(dt) => {
            t.allow_loss(&value, target)?;
            Ok(Value::Time(dt.time()))
        }
        Value::DateTimeTz(dt) => {
            t.allow_loss(&value, target)?;
            Ok(Value::Time(dt.time()))
        }
        Value::Str(_) | Value::Bytes(_) => {
            let text = text_of(&value).unwrap_or_default();
            TIME_FORMATS
                .iter()
                .find_map(|f| NaiveTime::parse_from_str(text, f).ok())
                .or_else(|| {
                    // `10:30:00+08:00` keeps the wall-clock time
                    let stripped = TZ_SUFFIX.replace(text, "");
                    TIME_FORMATS.iter().find_map(|f| NaiveTime::parse_from_str(stripped.trim(), f).ok())
                })
                .map(Value::Time)
                .ok_or_else(|| TransformError::mismatch(&value, target.name(), "unrecognized time"))
        }
        Value::Duration(d) => {
            let seconds = d.num_seconds();
            if !(0..86_400).contains(&seconds) {
                return Err(TransformError::mismatch(&value, target.name(), "not within one day"));
            }
            let nanos = (*d - TimeDelta::seconds(seconds)).num_nanoseconds().unwrap_or(0);
            NaiveTime::from_num_seconds_from_midnight_opt(seconds as u32, nanos as u32)
                .map(Value::Time)
                .ok_or_else(|| TransformError::mismatch(&value, target.name(), "not within one day"))
        }
        _ => t.collapse(value, target),
    }
}

pub(super) fn to_datetime(t: &Transformer<'_>, value: Value, target: &Type) -> Result<Value, TransformError> {
    match &value {
        Value::Date(d) => Ok(Value::DateTime(d.and_time(NaiveTime::MIN))),
        Value::Str(_) | Value::Bytes(_) => {
            let text = text_of(&value).unwrap_or_default();
            if let Some(dt) = parse_datetime_text(text) {
                return Ok(dt);
            }
            match parse_number_text(text) {
                Some(n) => Ok(Value::DateTimeTz(from_epoch(&n, target)?)),
                None => Err(TransformError::mismatch(&value, target.name(), "unrecognized datetime")),
            }
        }
        Value::Int(_) | Value::Float(_) | Value::Decimal(_) => Ok(Value::DateTimeTz(from_epoch(&value, target)?)),
        _ => t.collapse(value, target),
    }
}

/// Sum of `component * unit` over the named groups; `None` on overflow.
fn weighted(caps: &Captures<'_>, units: &[(&str, i64)]) -> Option<Decimal> {
    units.iter().try_fold(Decimal::ZERO, |total, (name, unit)| {
        let component = match caps.name(name) {
            // the patterns only admit digits, so a failed parse is an overflow
            Some(m) => Decimal::from_str(m.as_str()).ok()?,
            None => Decimal::ZERO,
        };
        total.checked_add(component.checked_mul(Decimal::from(*unit))?)
    })
}

/// Seconds from `P1DT2H30M` or `1 day, 2:30:00.5`. The error is the mismatch reason.
fn parse_duration_text(text: &str) -> Result<Decimal, &'static str> {
    if let Some(caps) = ISO_DURATION.captures(text) {
        // a bare `P` or `PT` carries no component
        if !text.chars().any(|c| c.is_ascii_digit()) {
            return Err("unrecognized duration");
        }
        let seconds = weighted(&caps, &[("w", 604_800), ("d", 86_400), ("h", 3_600), ("m", 60), ("s", 1)]).ok_or(OUT_OF_RANGE)?;
        return Ok(if caps.name("sign").is_some_and(|m| m.as_str() == "-") { -seconds } else { seconds });
    }
    let caps = CLOCK_DURATION.captures(text).ok_or("unrecognized duration")?;
    let clock = weighted(&caps, &[("h", 3_600), ("m", 60), ("s", 1)]).ok_or(OUT_OF_RANGE)?;
    let clock = if caps.name("sign").is_some() { -clock } else { clock };
    weighted(&caps, &[("d", 86_400)]).and_then(|days| days.checked_add(clock)).ok_or(OUT_OF_RANGE)
}

fn seconds_to_duration(seconds: Decimal, value: &Value, target: &Type) -> Result<Value, TransformError> {
    micros(seconds)
        .and_then(|us| us.round().to_i64())
        .map(|us| Value::Duration(TimeDelta::microseconds(us)))
        .ok_or_else(|| TransformError::mismatch(value, target.name(), OUT_OF_RANGE))
}

pub(super) fn to_duration(t: &Transformer<'_>, value: Value, target: &Type) -> Result<Value, TransformError> {
    match &value {
        Value::Int(_) | Value::Float(_) | Value::Decimal(_) => {
            let seconds = to_decimal(&value).ok_or_else(|| TransformError::mismatch(&value, target.name(), "not a finite number"))?;
            seconds_to_duration(seconds, &value, target)
        }
        Value::Str(_) | Value::Bytes(_) => {
            let text = text_of(&value).unwrap_or_default();
            let seconds = match parse_number_text(text).and_then(|n| to_decimal(&n)) {
                Some(seconds) => seconds,
                None => parse_duration_text(text).map_err(|reason| TransformError::mismatch(&value, target.name(), reason))?,
            };
            seconds_to_duration(seconds, &value, target)
        }
        Value::Time(time) => {
            let seconds = Decimal::from(time.num_seconds_from_midnight()) + Decimal::new(i64::from(time.nanosecond()), 9);
            seconds_to_duration(seconds, &value, target)
        }
        _ => t.collapse(value, target),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Options;
    use crate::transform::Registry;
    use chrono::Datelike;
    use pretty_assertions::assert_eq;

    fn apply(value: impl Into<Value>, target: &Type) -> Result<Value, TransformError> {
        Transformer::new(Registry::builtin(), &Options::default()).apply(value.into(), target)
    }

    #[test]
    fn dates_from_several_formats() {
        let expected = Value::Date(NaiveDate::from_ymd_opt(2024, 3, 9).unwrap());
        for text in ["2024-03-09", "2024/03/09", "20240309", "9 March 2024", "2024-03-09T00:00:00"] {
            assert_eq!(apply(text, &Type::Date).unwrap(), expected, "{text}");
        }
        assert!(apply("2024-13-01", &Type::Date).is_err());
    }

    #[test]
    fn datetime_to_date_truncation_is_data_loss() {
        let strict = Transformer::new(Registry::builtin(), &Options::default()).no_data_loss(true);
        assert!(strict.apply(Value::from("2024-03-09 10:00"), &Type::Date).is_err());
        assert!(apply("2024-03-09 10:00", &Type::Date).is_ok());
    }

    #[test]
    fn offset_suffix_selects_aware_parsing() {
        let Value::DateTimeTz(dt) = apply("2024-03-09T10:00:00+08:00", &Type::DateTime).unwrap() else {
            panic!("expected an aware datetime");
        };
        assert_eq!(dt.offset().local_minus_utc(), 8 * 3600);
        assert!(matches!(apply("2024-03-09T10:00:00Z", &Type::DateTime).unwrap(), Value::DateTimeTz(_)));
        assert!(matches!(apply("2024-03-09 10:00:00 UTC", &Type::DateTime).unwrap(), Value::DateTimeTz(_)));
        assert!(matches!(apply("Sat, 09 Mar 2024 10:00:00 GMT", &Type::DateTime).unwrap(), Value::DateTimeTz(_)));
        assert!(matches!(apply("2024-03-09 10:00:00", &Type::DateTime).unwrap(), Value::DateTime(_)));
    }

    #[test]
    fn epoch_seconds_and_milliseconds() {
        let Value::DateTimeTz(secs) = apply(1_700_000_000, &Type::DateTime).unwrap() else {
            panic!("expected datetime");
        };
        let Value::DateTimeTz(millis) = apply(Value::Int(1_700_000_000_000), &Type::DateTime).unwrap() else {
            panic!("expected datetime");
        };
        assert_eq!(secs, millis);
        assert_eq!(secs.year(), 2023);
    }

    #[test]
    fn durations_from_numbers_and_text() {
        assert_eq!(apply(90, &Type::Duration).unwrap(), Value::Duration(TimeDelta::seconds(90)));
        assert_eq!(apply("P1DT2H", &Type::Duration).unwrap(), Value::Duration(TimeDelta::hours(26)));
        assert_eq!(
            apply("1 day, 2:00:00.5", &Type::Duration).unwrap(),
            Value::Duration(TimeDelta::hours(26) + TimeDelta::milliseconds(500))
        );
        assert_eq!(apply("-PT30S", &Type::Duration).unwrap(), Value::Duration(TimeDelta::seconds(-30)));
        assert!(apply("P", &Type::Duration).is_err());
        assert!(apply("soon", &Type::Duration).is_err());
    }

    #[test]
    fn oversized_durations_are_mismatches() {
        for text in ["1e28", "P99999999999999999999999999W", "P99999999999999999999999999999D", "9999999999999999999999999999 days, 0:00:00"] {
            let err = apply(text, &Type::Duration).unwrap_err();
            assert!(matches!(err, TransformError::Mismatch { .. }), "{text}: {err}");
        }
        assert!(apply(Value::Decimal(Decimal::MAX), &Type::Duration).is_err());
        assert!(apply(i64::MAX, &Type::Duration).is_err());
    }

    #[test]
    fn times_keep_wall_clock() {
        let Value::Time(time) = apply("10:30:15+08:00", &Type::Time).unwrap() else {
            panic!("expected time");
        };
        assert_eq!((time.hour(), time.minute(), time.second()), (10, 30, 15));
        assert!(apply("25:00", &Type::Time).is_err());
    }
}
