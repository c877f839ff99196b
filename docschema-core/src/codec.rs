//! Conversion between native [`Value`]s and their canonical JSON encoding.
//!
//! With an expected [`FieldType`] (a declared field) both directions follow a
//! fixed table and reject values of the wrong kind. Without one (a dynamic
//! field) encoding uses the value's own kind, and decoding infers the kind
//! from the JSON shape using [`infer`].
//!
//! | native   | canonical JSON                               |
//! |----------|----------------------------------------------|
//! | datetime | `"2008-11-10T08:00:00Z"` (UTC, seconds only) |
//! | date     | `"2008-11-10"`                               |
//! | time     | `"08:00:00"` (seconds only)                  |
//! | decimal  | `"12.50"` (plain form, never an exponent)    |
//! | others   | the matching JSON scalar or container        |
//!
//! Sub-second precision of datetimes and times is truncated, not rounded.

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, SubsecRound, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Number, Value as JsonValue};
use std::{collections::BTreeMap, str::FromStr};

use crate::{
    error::{DocumentError, DocumentResult},
    field::FieldType,
    value::Value,
};

lazy_static! {
    static ref DATE_RE: Regex = Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("invalid regex");
    static ref TIME_RE: Regex =
        Regex::new(r"^\d{2}:\d{2}(:\d{2}(\.\d+)?)?$").expect("invalid regex");
    static ref DATETIME_RE: Regex = Regex::new(
        r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}(:\d{2}(\.\d+)?)?([zZ]|[+-]\d{2}:?\d{2})?$"
    )
    .expect("invalid regex");
    static ref DECIMAL_RE: Regex = Regex::new(r"^[+-]?\d+\.\d+$").expect("invalid regex");
}

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S";
const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Encodes a native value into its canonical JSON form.
///
/// # Errors
///
/// Returns [`DocumentError::TypeMismatch`] if `value` does not fit `expected`.
pub fn encode(value: &Value, expected: Option<&FieldType>) -> DocumentResult<JsonValue> {
    encode_named(value, expected, "value")
}

/// Decodes a canonical JSON value into a native value.
///
/// # Errors
///
/// Returns [`DocumentError::TypeMismatch`] if `json` cannot be read as `expected`.
pub fn decode(json: &JsonValue, expected: Option<&FieldType>) -> DocumentResult<Value> {
    decode_named(json, expected, "value")
}

pub(crate) fn encode_named(
    value: &Value,
    expected: Option<&FieldType>,
    field: &str,
) -> DocumentResult<JsonValue> {
    let Some(expected) = expected else {
        return encode_untyped(value, field);
    };

    let mismatch = || DocumentError::TypeMismatch {
        field: field.to_string(),
        expected: expected.name(),
        found: value.kind().to_string(),
    };

    match (expected, value) {
        (_, Value::Null) => Ok(JsonValue::Null),
        (FieldType::String, Value::String(s)) => Ok(JsonValue::String(s.clone())),
        (FieldType::Integer, Value::Integer(n)) => Ok(JsonValue::from(*n)),
        (FieldType::Float, Value::Float(n)) => encode_float(*n, field),
        (FieldType::Float, Value::Integer(n)) => encode_float(*n as f64, field),
        (FieldType::Boolean, Value::Boolean(b)) => Ok(JsonValue::Bool(*b)),
        (FieldType::Decimal, Value::Decimal(d)) => Ok(encode_decimal(d)),
        (FieldType::Decimal, Value::Integer(n)) => Ok(encode_decimal(&BigDecimal::from(*n))),
        (FieldType::Date, Value::Date(d)) => Ok(encode_date(d)),
        (FieldType::Time, Value::Time(t)) => Ok(encode_time(t)),
        (FieldType::DateTime, Value::DateTime(dt)) => Ok(encode_datetime(dt)),
        (FieldType::List(item), Value::List(items)) => items
            .iter()
            .enumerate()
            .map(|(i, item_value)| {
                encode_named(item_value, item.as_deref(), &format!("{field}.{i}"))
            })
            .collect::<DocumentResult<Vec<_>>>()
            .map(JsonValue::Array),
        (FieldType::Set(item), Value::List(items)) => {
            let mut encoded: Vec<JsonValue> = Vec::with_capacity(items.len());
            for (i, item_value) in items.iter().enumerate() {
                let json = encode_named(item_value, item.as_deref(), &format!("{field}.{i}"))?;
                if !encoded.contains(&json) {
                    encoded.push(json);
                }
            }
            Ok(JsonValue::Array(encoded))
        }
        (FieldType::Dict(item), Value::Dict(map)) => map
            .iter()
            .map(|(key, item_value)| {
                encode_named(item_value, item.as_deref(), &format!("{field}.{key}"))
                    .map(|json| (key.clone(), json))
            })
            .collect::<DocumentResult<Map<_, _>>>()
            .map(JsonValue::Object),
        (FieldType::Schema(schema), Value::Dict(map)) => {
            schema.encode_map(map, field).map(JsonValue::Object)
        }
        _ => Err(mismatch()),
    }
}

fn encode_untyped(value: &Value, field: &str) -> DocumentResult<JsonValue> {
    match value {
        Value::Null => Ok(JsonValue::Null),
        Value::String(s) => Ok(JsonValue::String(s.clone())),
        Value::Integer(n) => Ok(JsonValue::from(*n)),
        Value::Float(n) => encode_float(*n, field),
        Value::Boolean(b) => Ok(JsonValue::Bool(*b)),
        Value::Decimal(d) => Ok(encode_decimal(d)),
        Value::Date(d) => Ok(encode_date(d)),
        Value::Time(t) => Ok(encode_time(t)),
        Value::DateTime(dt) => Ok(encode_datetime(dt)),
        Value::List(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| encode_untyped(item, &format!("{field}.{i}")))
            .collect::<DocumentResult<Vec<_>>>()
            .map(JsonValue::Array),
        Value::Dict(map) => map
            .iter()
            .map(|(key, item)| {
                encode_untyped(item, &format!("{field}.{key}")).map(|json| (key.clone(), json))
            })
            .collect::<DocumentResult<Map<_, _>>>()
            .map(JsonValue::Object),
    }
}

fn encode_float(n: f64, field: &str) -> DocumentResult<JsonValue> {
    Number::from_f64(n).map(JsonValue::Number).ok_or_else(|| {
        DocumentError::Serialization(format!("non-finite float {n} in field '{field}'"))
    })
}

fn encode_decimal(d: &BigDecimal) -> JsonValue {
    JsonValue::String(d.to_plain_string())
}

fn encode_date(d: &NaiveDate) -> JsonValue {
    JsonValue::String(d.format(DATE_FORMAT).to_string())
}

fn encode_time(t: &NaiveTime) -> JsonValue {
    JsonValue::String(t.format(TIME_FORMAT).to_string())
}

fn encode_datetime(dt: &DateTime<Utc>) -> JsonValue {
    JsonValue::String(dt.trunc_subsecs(0).format(DATETIME_FORMAT).to_string())
}

pub(crate) fn decode_named(
    json: &JsonValue,
    expected: Option<&FieldType>,
    field: &str,
) -> DocumentResult<Value> {
    let Some(expected) = expected else {
        return Ok(infer(json));
    };

    let mismatch = || DocumentError::TypeMismatch {
        field: field.to_string(),
        expected: expected.name(),
        found: json_kind(json).to_string(),
    };

    match (expected, json) {
        (_, JsonValue::Null) => Ok(Value::Null),
        (FieldType::String, JsonValue::String(s)) => Ok(Value::String(s.clone())),
        (FieldType::Integer, JsonValue::Number(n)) => n.as_i64().map(Value::Integer).ok_or_else(mismatch),
        (FieldType::Float, JsonValue::Number(n)) => n.as_f64().map(Value::Float).ok_or_else(mismatch),
        (FieldType::Boolean, JsonValue::Bool(b)) => Ok(Value::Boolean(*b)),
        (FieldType::Decimal, JsonValue::String(s)) => {
            BigDecimal::from_str(s).map(Value::Decimal).map_err(|_| mismatch())
        }
        (FieldType::Decimal, JsonValue::Number(n)) => BigDecimal::from_str(&n.to_string())
            .map(Value::Decimal)
            .map_err(|_| mismatch()),
        (FieldType::Date, JsonValue::String(s)) => {
            parse_date(s).map(Value::Date).ok_or_else(mismatch)
        }
        (FieldType::Time, JsonValue::String(s)) => {
            parse_time(s).map(Value::Time).ok_or_else(mismatch)
        }
        (FieldType::DateTime, JsonValue::String(s)) => {
            parse_datetime(s).map(Value::DateTime).ok_or_else(mismatch)
        }
        (FieldType::Set(item), JsonValue::Array(items)) => {
            let mut unique = items.clone();
            dedup_set(&mut unique);
            unique
                .iter()
                .enumerate()
                .map(|(i, item_json)| decode_named(item_json, item.as_deref(), &format!("{field}.{i}")))
                .collect::<DocumentResult<Vec<_>>>()
                .map(Value::List)
        }
        (FieldType::List(item), JsonValue::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(i, item_json)| decode_named(item_json, item.as_deref(), &format!("{field}.{i}")))
            .collect::<DocumentResult<Vec<_>>>()
            .map(Value::List),
        (FieldType::Dict(item), JsonValue::Object(map)) => map
            .iter()
            .map(|(key, item_json)| {
                decode_named(item_json, item.as_deref(), &format!("{field}.{key}"))
                    .map(|value| (key.clone(), value))
            })
            .collect::<DocumentResult<BTreeMap<_, _>>>()
            .map(Value::Dict),
        (FieldType::Schema(schema), JsonValue::Object(map)) => {
            schema.decode_map(map, field).map(Value::Dict)
        }
        _ => Err(mismatch()),
    }
}

/// Drops repeated elements of a canonical set array, keeping the first
/// occurrence of each.
pub(crate) fn dedup_set(items: &mut Vec<JsonValue>) {
    let mut seen: Vec<JsonValue> = Vec::with_capacity(items.len());
    items.retain(|item| {
        if seen.contains(item) {
            false
        } else {
            seen.push(item.clone());
            true
        }
    });
}

/// Infers a native value from the shape of an untyped JSON value.
///
/// Strings are matched against ordered patterns: date, time, datetime, then
/// decimal. The first pattern whose value also parses wins; anything else
/// stays a plain string. Numbers become integers when they fit an `i64`.
pub fn infer(json: &JsonValue) -> Value {
    match json {
        JsonValue::Null => Value::Null,
        JsonValue::Bool(b) => Value::Boolean(*b),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => Value::Integer(i),
            None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        JsonValue::String(s) => infer_string(s),
        JsonValue::Array(items) => Value::List(items.iter().map(infer).collect()),
        JsonValue::Object(map) => Value::Dict(
            map.iter()
                .map(|(key, item)| (key.clone(), infer(item)))
                .collect(),
        ),
    }
}

fn infer_string(s: &str) -> Value {
    if DATE_RE.is_match(s) {
        if let Some(date) = parse_date(s) {
            return Value::Date(date);
        }
    }
    if TIME_RE.is_match(s) {
        if let Some(time) = parse_time(s) {
            return Value::Time(time);
        }
    }
    if DATETIME_RE.is_match(s) {
        if let Some(datetime) = parse_datetime(s) {
            return Value::DateTime(datetime);
        }
    }
    if DECIMAL_RE.is_match(s) {
        if let Ok(decimal) = BigDecimal::from_str(s) {
            return Value::Decimal(decimal);
        }
    }

    tracing::trace!(value = %s, "no inference pattern matched, keeping string");
    Value::String(s.to_string())
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT).ok()
}

fn parse_time(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .ok()
        .map(|t| t.trunc_subsecs(0))
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    let parsed = if let Some(naive) = s.strip_suffix(['Z', 'z']) {
        parse_naive_datetime(naive).map(|dt| dt.and_utc())
    } else if let Some(naive) = parse_naive_datetime(s) {
        Some(naive.and_utc())
    } else {
        DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f%z")
            .or_else(|_| DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f%:z"))
            .or_else(|_| DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M%z"))
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    };

    parsed.map(|dt| dt.trunc_subsecs(0))
}

fn parse_naive_datetime(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M"))
        .ok()
}

pub(crate) fn json_kind(json: &JsonValue) -> &'static str {
    match json {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};
    use serde_json::json;

    fn datetime(s: &str) -> DateTime<Utc> {
        parse_datetime(s).unwrap()
    }

    #[test]
    fn datetime_encoding_truncates_to_seconds() {
        let dt = Utc
            .with_ymd_and_hms(2008, 11, 10, 8, 0, 59)
            .unwrap()
            .with_nanosecond(999_999_999)
            .unwrap();

        let encoded = encode(&Value::DateTime(dt), Some(&FieldType::DateTime)).unwrap();
        assert_eq!(encoded, json!("2008-11-10T08:00:59Z"));

        let decoded = decode(&encoded, Some(&FieldType::DateTime)).unwrap();
        assert_eq!(decoded, Value::DateTime(dt.with_nanosecond(0).unwrap()));
    }

    #[test]
    fn time_encoding_truncates_to_seconds() {
        let t = NaiveTime::from_hms_milli_opt(23, 59, 59, 900).unwrap();

        let encoded = encode(&Value::Time(t), Some(&FieldType::Time)).unwrap();
        assert_eq!(encoded, json!("23:59:59"));
    }

    #[test]
    fn decimal_encodes_without_exponent() {
        let d = BigDecimal::from_str("1E+3").unwrap();

        assert_eq!(encode(&Value::Decimal(d), Some(&FieldType::Decimal)).unwrap(), json!("1000"));

        let d = BigDecimal::from_str("12.50").unwrap();
        let encoded = encode(&Value::Decimal(d.clone()), Some(&FieldType::Decimal)).unwrap();
        assert_eq!(encoded, json!("12.50"));
        assert_eq!(decode(&encoded, Some(&FieldType::Decimal)).unwrap(), Value::Decimal(d));
    }

    #[test]
    fn declared_type_rejects_other_kinds() {
        let err = encode_named(&Value::Integer(123), Some(&FieldType::String), "name").unwrap_err();

        assert!(matches!(err, DocumentError::TypeMismatch { ref field, .. } if field == "name"));
    }

    #[test]
    fn integer_widens_into_float_and_decimal() {
        assert_eq!(encode(&Value::Integer(2), Some(&FieldType::Float)).unwrap(), json!(2.0));
        assert_eq!(encode(&Value::Integer(2), Some(&FieldType::Decimal)).unwrap(), json!("2"));
    }

    #[test]
    fn set_encoding_drops_duplicates() {
        let value = Value::from(vec!["x", "y", "x"]);
        let expected = FieldType::Set(Some(Box::new(FieldType::String)));

        assert_eq!(encode(&value, Some(&expected)).unwrap(), json!(["x", "y"]));
        assert_eq!(decode(&json!(["x", "x", "y"]), Some(&expected)).unwrap(), Value::from(vec!["x", "y"]));
    }

    #[test]
    fn inference_follows_pattern_order() {
        assert_eq!(infer(&json!("2008-11-10")), Value::Date(NaiveDate::from_ymd_opt(2008, 11, 10).unwrap()));
        assert_eq!(infer(&json!("08:30")), Value::Time(NaiveTime::from_hms_opt(8, 30, 0).unwrap()));
        assert_eq!(
            infer(&json!("2008-11-10T08:00:00Z")),
            Value::DateTime(Utc.with_ymd_and_hms(2008, 11, 10, 8, 0, 0).unwrap())
        );
        assert_eq!(infer(&json!("3.14")), Value::Decimal(BigDecimal::from_str("3.14").unwrap()));
        assert_eq!(infer(&json!("hello")), Value::from("hello"));
    }

    #[test]
    fn invalid_pattern_matches_fall_through_to_string() {
        assert_eq!(infer(&json!("2008-13-45")), Value::from("2008-13-45"));
        assert_eq!(infer(&json!("99:99")), Value::from("99:99"));
    }

    #[test]
    fn inference_handles_numbers_and_containers() {
        assert_eq!(infer(&json!(3)), Value::Integer(3));
        assert_eq!(infer(&json!(2.5)), Value::Float(2.5));
        assert_eq!(
            infer(&json!({"when": "2008-11-10", "tags": ["a", 1]})),
            Value::Dict(BTreeMap::from([
                ("tags".to_string(), Value::List(vec![Value::from("a"), Value::Integer(1)])),
                ("when".to_string(), Value::Date(NaiveDate::from_ymd_opt(2008, 11, 10).unwrap())),
            ]))
        );
    }

    #[test]
    fn offsets_are_normalized_to_utc() {
        assert_eq!(datetime("2008-11-10T10:00:00+02:00"), datetime("2008-11-10T08:00:00Z"));
        assert_eq!(datetime("2008-11-10T08:00:00"), datetime("2008-11-10T08:00:00Z"));
    }

    #[test]
    fn null_is_accepted_by_every_declared_type() {
        assert_eq!(encode(&Value::Null, Some(&FieldType::Date)).unwrap(), JsonValue::Null);
        assert_eq!(decode(&JsonValue::Null, Some(&FieldType::Integer)).unwrap(), Value::Null);
    }
}
