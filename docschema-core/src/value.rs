//! Native values exchanged between application code and the canonical tree.
//!
//! [`Value`] is the typed view of a canonical JSON slot: scalars carry their
//! native Rust representation (dates as [`chrono`] types, decimals as
//! [`BigDecimal`]) and containers hold further values. Values are converted to
//! and from JSON by the [`codec`](crate::codec) module.

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use std::{collections::BTreeMap, fmt};

use crate::error::{DocumentError, DocumentResult};

/// A native value read from, or written to, a document field.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Absent or explicitly unset.
    #[default]
    Null,
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    /// Arbitrary-precision decimal, transmitted as a plain decimal string.
    Decimal(BigDecimal),
    Date(NaiveDate),
    /// Time of day, second precision on the wire.
    Time(NaiveTime),
    /// UTC timestamp, second precision on the wire.
    DateTime(DateTime<Utc>),
    /// An ordered sequence; also the native form of set fields.
    List(Vec<Value>),
    /// A string-keyed map; also the native form of nested schemas.
    Dict(BTreeMap<String, Value>),
}

impl Value {
    /// Returns a short name of this value's kind, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::String(_) => "string",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::Boolean(_) => "boolean",
            Value::Decimal(_) => "decimal",
            Value::Date(_) => "date",
            Value::Time(_) => "time",
            Value::DateTime(_) => "datetime",
            Value::List(_) => "list",
            Value::Dict(_) => "dict",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns `true` for values considered empty by the `required` check:
    /// null, the empty string and empty containers.
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Null => true,
            Value::String(s) => s.is_empty(),
            Value::List(items) => items.is_empty(),
            Value::Dict(map) => map.is_empty(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(n) => Some(*n),
            Value::Integer(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_decimal(&self) -> Option<&BigDecimal> {
        match self {
            Value::Decimal(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<NaiveTime> {
        match self {
            Value::Time(t) => Some(*t),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Dict(map) => Some(map),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Integer(n) => write!(f, "{n}"),
            Value::Float(n) => write!(f, "{n}"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Decimal(d) => write!(f, "{}", d.to_plain_string()),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::Time(t) => write!(f, "{}", t.format("%H:%M:%S")),
            Value::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%SZ")),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Dict(map) => {
                write!(f, "{{")?;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key:?}: {value}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(value as i64)
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Integer(value as i64)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<BigDecimal> for Value {
    fn from(value: BigDecimal) -> Self {
        Value::Decimal(value)
    }
}

impl From<NaiveDate> for Value {
    fn from(value: NaiveDate) -> Self {
        Value::Date(value)
    }
}

impl From<NaiveTime> for Value {
    fn from(value: NaiveTime) -> Self {
        Value::Time(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::DateTime(value)
    }
}

/// Naive datetimes are interpreted as UTC.
impl From<NaiveDateTime> for Value {
    fn from(value: NaiveDateTime) -> Self {
        Value::DateTime(value.and_utc())
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(values: Vec<T>) -> Self {
        Value::List(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<BTreeMap<String, T>> for Value {
    fn from(map: BTreeMap<String, T>) -> Self {
        Value::Dict(map.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Conversion from a native [`Value`] into a concrete Rust type.
///
/// Used by typed accessors; a value of the wrong kind yields
/// [`DocumentError::TypeMismatch`].
pub trait FromValue: Sized {
    fn from_value(value: Value) -> DocumentResult<Self>;
}

fn mismatch<T>(expected: &str, value: &Value) -> DocumentResult<T> {
    Err(DocumentError::TypeMismatch {
        field: "value".to_string(),
        expected: expected.to_string(),
        found: value.kind().to_string(),
    })
}

impl FromValue for Value {
    fn from_value(value: Value) -> DocumentResult<Self> {
        Ok(value)
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> DocumentResult<Self> {
        match value {
            Value::String(s) => Ok(s),
            other => mismatch("string", &other),
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: Value) -> DocumentResult<Self> {
        match value {
            Value::Integer(n) => Ok(n),
            other => mismatch("integer", &other),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> DocumentResult<Self> {
        value.as_f64().map_or_else(|| mismatch("float", &value), Ok)
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> DocumentResult<Self> {
        match value {
            Value::Boolean(b) => Ok(b),
            other => mismatch("boolean", &other),
        }
    }
}

impl FromValue for BigDecimal {
    fn from_value(value: Value) -> DocumentResult<Self> {
        match value {
            Value::Decimal(d) => Ok(d),
            other => mismatch("decimal", &other),
        }
    }
}

impl FromValue for NaiveDate {
    fn from_value(value: Value) -> DocumentResult<Self> {
        match value {
            Value::Date(d) => Ok(d),
            other => mismatch("date", &other),
        }
    }
}

impl FromValue for NaiveTime {
    fn from_value(value: Value) -> DocumentResult<Self> {
        match value {
            Value::Time(t) => Ok(t),
            other => mismatch("time", &other),
        }
    }
}

impl FromValue for DateTime<Utc> {
    fn from_value(value: Value) -> DocumentResult<Self> {
        match value {
            Value::DateTime(dt) => Ok(dt),
            other => mismatch("datetime", &other),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> DocumentResult<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: Value) -> DocumentResult<Self> {
        match value {
            Value::List(items) => items.into_iter().map(T::from_value).collect(),
            other => mismatch("list", &other),
        }
    }
}

impl<T: FromValue> FromValue for BTreeMap<String, T> {
    fn from_value(value: Value) -> DocumentResult<Self> {
        match value {
            Value::Dict(map) => map
                .into_iter()
                .map(|(k, v)| T::from_value(v).map(|v| (k, v)))
                .collect(),
            other => mismatch("dict", &other),
        }
    }
}
