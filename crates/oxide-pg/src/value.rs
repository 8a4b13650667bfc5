//! Native values and row containers.
//!
//! [`Value`] is the tagged union that every payload, filter operand and
//! scanned column passes through. [`ToValue`] and [`FromValue`] convert
//! between it and ordinary Rust types; [`Row`] is an insertion-ordered map
//! of column name to value.

use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;

use crate::error::{Error, Result};

/// A native value understood by the coercion layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// NULL value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Float value.
    Float(f64),
    /// Text value.
    Text(String),
    /// Point in time.
    Timestamp(DateTime<Utc>),
    /// Structured value (maps, lists, nested records).
    Json(serde_json::Value),
}

impl Value {
    /// Returns `true` for [`Value::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns `true` for [`Value::Text`].
    ///
    /// Text operands use `like` comparisons in the filter compiler.
    #[must_use]
    pub const fn is_text(&self) -> bool {
        matches!(self, Self::Text(_))
    }

    /// Returns `true` for integers and floats.
    #[must_use]
    pub const fn is_numeric(&self) -> bool {
        matches!(self, Self::Int(_) | Self::Float(_))
    }

    /// Short name of the variant, used in error messages.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Timestamp(_) => "timestamp",
            Self::Json(_) => "json",
        }
    }

    /// Converts to a JSON value. Timestamps become RFC 3339 strings.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Int(n) => serde_json::Value::from(*n),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Self::Text(s) => serde_json::Value::String(s.clone()),
            Self::Timestamp(dt) => serde_json::Value::String(dt.to_rfc3339()),
            Self::Json(j) => j.clone(),
        }
    }

    /// Converts a JSON value back, keeping scalars as scalars.
    #[must_use]
    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map_or_else(|| n.as_f64().map_or(Self::Null, Self::Float), Self::Int),
            serde_json::Value::String(s) => Self::Text(s),
            other => Self::Json(other),
        }
    }
}

// ================================================================
// ToValue
// ================================================================

/// Trait for types that can be converted to a [`Value`].
pub trait ToValue {
    /// Converts the value to a `Value`.
    fn to_value(&self) -> Value;
}

impl ToValue for Value {
    fn to_value(&self) -> Value {
        self.clone()
    }
}

impl<T: ToValue + ?Sized> ToValue for &T {
    fn to_value(&self) -> Value {
        (**self).to_value()
    }
}

impl ToValue for bool {
    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }
}

macro_rules! impl_to_value_int {
    ($($ty:ty),+) => {
        $(
            impl ToValue for $ty {
                fn to_value(&self) -> Value {
                    Value::Int(i64::from(*self))
                }
            }
        )+
    };
}

impl_to_value_int!(i8, i16, i32, i64, u8, u16, u32);

macro_rules! impl_to_value_wide_int {
    ($($ty:ty),+) => {
        $(
            impl ToValue for $ty {
                fn to_value(&self) -> Value {
                    // Out of i64 range: keep the digits, the engine casts them.
                    i64::try_from(*self).map_or_else(|_| Value::Text(self.to_string()), Value::Int)
                }
            }
        )+
    };
}

impl_to_value_wide_int!(u64, usize, isize);

impl ToValue for f64 {
    fn to_value(&self) -> Value {
        Value::Float(*self)
    }
}

impl ToValue for f32 {
    fn to_value(&self) -> Value {
        Value::Float(f64::from(*self))
    }
}

impl ToValue for str {
    fn to_value(&self) -> Value {
        Value::Text(self.to_string())
    }
}

impl ToValue for String {
    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }
}

impl ToValue for char {
    fn to_value(&self) -> Value {
        Value::Text(self.to_string())
    }
}

impl ToValue for DateTime<Utc> {
    fn to_value(&self) -> Value {
        Value::Timestamp(*self)
    }
}

impl ToValue for DateTime<FixedOffset> {
    fn to_value(&self) -> Value {
        Value::Timestamp(self.with_timezone(&Utc))
    }
}

impl ToValue for NaiveDateTime {
    fn to_value(&self) -> Value {
        Value::Timestamp(self.and_utc())
    }
}

impl ToValue for NaiveDate {
    fn to_value(&self) -> Value {
        Value::Timestamp(self.and_time(NaiveTime::MIN).and_utc())
    }
}

impl ToValue for serde_json::Value {
    fn to_value(&self) -> Value {
        Value::Json(self.clone())
    }
}

impl<T: ToValue> ToValue for Option<T> {
    fn to_value(&self) -> Value {
        self.as_ref().map_or(Value::Null, ToValue::to_value)
    }
}

impl<T: ToValue> ToValue for Vec<T> {
    fn to_value(&self) -> Value {
        Value::Json(serde_json::Value::Array(
            self.iter().map(|v| v.to_value().to_json()).collect(),
        ))
    }
}

impl<T: ToValue, S: BuildHasher> ToValue for HashMap<String, T, S> {
    fn to_value(&self) -> Value {
        Value::Json(serde_json::Value::Object(
            self.iter()
                .map(|(k, v)| (k.clone(), v.to_value().to_json()))
                .collect(),
        ))
    }
}

impl<T: ToValue> ToValue for BTreeMap<String, T> {
    fn to_value(&self) -> Value {
        Value::Json(serde_json::Value::Object(
            self.iter()
                .map(|(k, v)| (k.clone(), v.to_value().to_json()))
                .collect(),
        ))
    }
}

// ================================================================
// FromValue
// ================================================================

/// Trait for types that can be read back from a [`Value`].
pub trait FromValue: Sized {
    /// Converts a scanned value into `Self`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Coercion`] when the value cannot represent `Self`.
    fn from_value(value: &Value) -> Result<Self>;
}

fn mismatch(expected: &str, value: &Value) -> Error {
    Error::coercion(format!("expected {expected}, found {}", value.kind_name()))
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self> {
        Ok(value.clone())
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Bool(b) => Ok(*b),
            Value::Int(0) => Ok(false),
            Value::Int(1) => Ok(true),
            Value::Text(s) => match s.as_str() {
                "t" | "T" | "true" | "TRUE" => Ok(true),
                "f" | "F" | "false" | "FALSE" => Ok(false),
                _ => Err(Error::coercion(format!("expected bool, found '{s}'"))),
            },
            other => Err(mismatch("bool", other)),
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Int(n) => Ok(*n),
            #[allow(clippy::cast_possible_truncation)]
            Value::Float(f) if f.fract() == 0.0 && f.abs() < 9.2e18 => Ok(*f as i64),
            Value::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| Error::coercion(format!("expected integer, found '{s}'"))),
            other => Err(mismatch("integer", other)),
        }
    }
}

macro_rules! impl_from_value_int {
    ($($ty:ty),+) => {
        $(
            impl FromValue for $ty {
                fn from_value(value: &Value) -> Result<Self> {
                    let n = i64::from_value(value)?;
                    <$ty>::try_from(n).map_err(|_| {
                        Error::coercion(format!("{n} is out of range for {}", stringify!($ty)))
                    })
                }
            }
        )+
    };
}

impl_from_value_int!(i8, i16, i32, u8, u16, u32, u64, usize, isize);

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Float(f) => Ok(*f),
            #[allow(clippy::cast_precision_loss)]
            Value::Int(n) => Ok(*n as f64),
            Value::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| Error::coercion(format!("expected float, found '{s}'"))),
            other => Err(mismatch("float", other)),
        }
    }
}

impl FromValue for f32 {
    #[allow(clippy::cast_possible_truncation)]
    fn from_value(value: &Value) -> Result<Self> {
        f64::from_value(value).map(|f| f as f32)
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Text(s) => Ok(s.clone()),
            Value::Int(n) => Ok(n.to_string()),
            Value::Float(f) => Ok(f.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            Value::Timestamp(dt) => Ok(dt.to_rfc3339()),
            Value::Json(serde_json::Value::String(s)) => Ok(s.clone()),
            Value::Json(j) => Ok(j.to_string()),
            Value::Null => Err(mismatch("text", value)),
        }
    }
}

impl FromValue for DateTime<Utc> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Timestamp(dt) => Ok(*dt),
            Value::Text(s) => DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|_| Error::coercion(format!("expected timestamp, found '{s}'"))),
            other => Err(mismatch("timestamp", other)),
        }
    }
}

impl FromValue for NaiveDateTime {
    fn from_value(value: &Value) -> Result<Self> {
        DateTime::<Utc>::from_value(value).map(|dt| dt.naive_utc())
    }
}

impl FromValue for NaiveDate {
    fn from_value(value: &Value) -> Result<Self> {
        DateTime::<Utc>::from_value(value).map(|dt| dt.date_naive())
    }
}

impl FromValue for serde_json::Value {
    fn from_value(value: &Value) -> Result<Self> {
        Ok(value.to_json())
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

/// Reads a structured value, parsing text buffers as JSON first.
fn structured(value: &Value, expected: &str) -> Result<serde_json::Value> {
    match value {
        Value::Json(j) => Ok(j.clone()),
        Value::Text(s) => Ok(serde_json::from_str(s)?),
        other => Err(mismatch(expected, other)),
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: &Value) -> Result<Self> {
        match structured(value, "json array")? {
            serde_json::Value::Array(items) => items
                .into_iter()
                .map(|item| T::from_value(&Value::from_json(item)))
                .collect(),
            other => Err(mismatch("json array", &Value::Json(other))),
        }
    }
}

impl<T: FromValue, S: BuildHasher + Default> FromValue for HashMap<String, T, S> {
    fn from_value(value: &Value) -> Result<Self> {
        match structured(value, "json object")? {
            serde_json::Value::Object(map) => map
                .into_iter()
                .map(|(k, v)| T::from_value(&Value::from_json(v)).map(|v| (k, v)))
                .collect(),
            other => Err(mismatch("json object", &Value::Json(other))),
        }
    }
}

impl<T: FromValue> FromValue for BTreeMap<String, T> {
    fn from_value(value: &Value) -> Result<Self> {
        match structured(value, "json object")? {
            serde_json::Value::Object(map) => map
                .into_iter()
                .map(|(k, v)| T::from_value(&Value::from_json(v)).map(|v| (k, v)))
                .collect(),
            other => Err(mismatch("json object", &Value::Json(other))),
        }
    }
}

// ================================================================
// Row
// ================================================================

/// An insertion-ordered map of column name to value.
///
/// Used both as an Insert/Update payload and as the scanned form of a
/// result row.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Row {
    values: IndexMap<String, Value>,
}

impl Row {
    /// Creates an empty row.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a column, returning the row for chaining.
    #[must_use]
    pub fn set(mut self, column: impl Into<String>, value: impl ToValue) -> Self {
        self.values.insert(column.into(), value.to_value());
        self
    }

    /// Inserts or replaces a column value.
    pub fn insert(&mut self, column: impl Into<String>, value: Value) {
        self.values.insert(column.into(), value);
    }

    /// Appends every column of `other`, replacing duplicates.
    pub fn extend(&mut self, other: Self) {
        self.values.extend(other.values);
    }

    /// Looks up a column by exact name.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    /// Looks up a column ignoring ASCII case.
    ///
    /// The engine folds unquoted identifiers to lower case, so scanned rows
    /// rarely match the record's spelling exactly.
    #[must_use]
    pub fn get_ci(&self, column: &str) -> Option<&Value> {
        self.values.get(column).or_else(|| {
            self.values
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(column))
                .map(|(_, value)| value)
        })
    }

    /// Reads a column as `T`. A missing column reads as NULL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Coercion`] naming the column on mismatch.
    pub fn get_as<T: FromValue>(&self, column: &str) -> Result<T> {
        let value = self.get_ci(column).unwrap_or(&Value::Null);
        T::from_value(value).map_err(|e| e.at_column(column))
    }

    /// Column names in insertion order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Iterates over `(column, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` when the row has no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Converts the row into a JSON object.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.values
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }
}

impl FromIterator<(String, Value)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Row {
    type Item = (String, Value);
    type IntoIter = indexmap::map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}
