//! Value coercion between wire values, native values and SQL literals.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

use crate::error::{Error, Result};
use crate::value::Value;

/// Converts scanned values to native values and native values to literals.
pub trait ValueCoder {
    /// Converts a scanned value of a column declared as `column_type`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Coercion`] when a text buffer cannot be parsed as
    /// the column's class.
    fn to_native(&self, raw: RawValue, column_type: &str) -> Result<Value>;

    /// Renders a value as a SQL literal that is safe to splice into a
    /// statement.
    fn to_literal(&self, value: &Value) -> String;
}

/// A scanned column value.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    /// SQL NULL.
    Null,
    /// Already decoded by the driver.
    Typed(Value),
    /// Undecoded text or bytes.
    Bytes(Vec<u8>),
}

impl RawValue {
    /// A text buffer.
    #[must_use]
    pub fn text(s: impl Into<String>) -> Self {
        Self::Bytes(s.into().into_bytes())
    }
}

/// Wire class of a declared column type, used to parse text buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScanKind {
    /// Integer types.
    Int,
    /// Decimal, numeric and floating point types.
    Float,
    /// Boolean.
    Bool,
    /// Dates and timestamps.
    Time,
    /// `json` and `jsonb`.
    Json,
    /// Everything else is kept as text.
    Text,
}

impl ScanKind {
    /// Classifies a declared type such as `INT8`, `numeric(64,8)` or
    /// `timestamptz`.
    #[must_use]
    pub fn classify(column_type: &str) -> Self {
        let lower = column_type.trim().to_lowercase();
        let t = lower.split('(').next().unwrap_or(&lower).trim();
        // Ranges and intervals share prefixes with scalar types but arrive as text.
        if t.ends_with("range") || t.starts_with("interval") {
            Self::Text
        } else if matches!(
            t,
            "int"
                | "int2"
                | "int4"
                | "int8"
                | "integer"
                | "smallint"
                | "bigint"
                | "oid"
                | "serial"
                | "serial2"
                | "serial4"
                | "serial8"
                | "smallserial"
                | "bigserial"
        ) {
            Self::Int
        } else if t.starts_with("dec")
            || t.starts_with("num")
            || t.starts_with("float")
            || t.starts_with("double")
            || t == "real"
        {
            Self::Float
        } else if t.starts_with("bool") {
            Self::Bool
        } else if t.starts_with("date") || t.starts_with("timestamp") {
            Self::Time
        } else if t.starts_with("json") {
            Self::Json
        } else {
            Self::Text
        }
    }
}

/// Decodes a scanned value according to its wire class.
///
/// Driver-decoded values pass through untouched.
///
/// # Errors
///
/// Returns [`Error::Coercion`] for buffers that do not parse.
pub fn decode(raw: RawValue, kind: ScanKind, time_format: &str) -> Result<Value> {
    let bytes = match raw {
        RawValue::Null => return Ok(Value::Null),
        RawValue::Typed(value) => return Ok(value),
        RawValue::Bytes(bytes) => bytes,
    };
    let text = String::from_utf8(bytes).map_err(|e| Error::coercion(e.to_string()))?;
    match kind {
        ScanKind::Int => text
            .trim()
            .parse()
            .map(Value::Int)
            .map_err(|e| Error::coercion(format!("'{text}' is not an integer: {e}"))),
        ScanKind::Float => text
            .trim()
            .parse()
            .map(Value::Float)
            .map_err(|e| Error::coercion(format!("'{text}' is not a number: {e}"))),
        ScanKind::Bool => match text.trim() {
            "t" | "true" | "TRUE" | "1" => Ok(Value::Bool(true)),
            "f" | "false" | "FALSE" | "0" => Ok(Value::Bool(false)),
            other => Err(Error::coercion(format!("'{other}' is not a boolean"))),
        },
        ScanKind::Time => parse_timestamp(&text, time_format)
            .map(Value::Timestamp)
            .ok_or_else(|| Error::coercion(format!("'{text}' is not a timestamp"))),
        ScanKind::Json => serde_json::from_str(&text)
            .map(Value::Json)
            .map_err(|e| Error::coercion(format!("invalid json: {e}"))),
        ScanKind::Text => Ok(Value::Text(text)),
    }
}

/// Parses a timestamp, trying RFC 3339, the engine's text output, the
/// configured fallback (read as UTC) and finally a bare date.
#[must_use]
pub fn parse_timestamp(text: &str, fallback_format: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, fallback_format) {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .map(|date| date.and_time(NaiveTime::MIN).and_utc())
}

/// Wraps text in single quotes, doubling embedded quotes.
#[must_use]
pub fn quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

/// Built-in literal rendering.
///
/// Only integers, finite floats, booleans and NULL are emitted bare;
/// everything else goes through [`quote`].
#[must_use]
pub fn literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Int(n) => n.to_string(),
        Value::Float(f) if f.is_nan() => "'NaN'::float8".to_string(),
        Value::Float(f) if f.is_infinite() && *f > 0.0 => "'Infinity'::float8".to_string(),
        Value::Float(f) if f.is_infinite() => "'-Infinity'::float8".to_string(),
        Value::Float(f) => f.to_string(),
        Value::Text(s) => quote(s),
        Value::Timestamp(dt) => format!(
            "{}::timestamptz",
            quote(&dt.format("%Y-%m-%d %H:%M:%S%.f%:z").to_string())
        ),
        Value::Json(j) => quote(&j.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    const FALLBACK: &str = "%Y-%m-%d %H:%M:%S%.f";

    #[test]
    fn test_classify() {
        assert_eq!(ScanKind::classify("INT8"), ScanKind::Int);
        assert_eq!(ScanKind::classify("bigint"), ScanKind::Int);
        assert_eq!(ScanKind::classify("numeric(64,8)"), ScanKind::Float);
        assert_eq!(ScanKind::classify("FLOAT8"), ScanKind::Float);
        assert_eq!(ScanKind::classify("double precision"), ScanKind::Float);
        assert_eq!(ScanKind::classify("BOOL"), ScanKind::Bool);
        assert_eq!(ScanKind::classify("TIMESTAMPTZ"), ScanKind::Time);
        assert_eq!(ScanKind::classify("date"), ScanKind::Time);
        assert_eq!(ScanKind::classify("JSONB"), ScanKind::Json);
        assert_eq!(ScanKind::classify("VARCHAR"), ScanKind::Text);
        assert_eq!(ScanKind::classify("SERIAL"), ScanKind::Int);
    }

    #[test]
    fn test_classify_ranges_and_intervals_as_text() {
        for t in ["INTERVAL", "interval(3)", "int4range", "INT8RANGE", "numrange", "tstzrange", "daterange"] {
            assert_eq!(ScanKind::classify(t), ScanKind::Text, "{t}");
        }
        assert_eq!(
            decode(RawValue::text("1 day"), ScanKind::classify("INTERVAL"), FALLBACK).unwrap(),
            Value::Text("1 day".into())
        );
        assert_eq!(
            decode(RawValue::text("[1,5)"), ScanKind::classify("int4range"), FALLBACK).unwrap(),
            Value::Text("[1,5)".into())
        );
    }

    #[test]
    fn test_decode_text_buffers() {
        assert_eq!(
            decode(RawValue::text("42"), ScanKind::Int, FALLBACK).unwrap(),
            Value::Int(42)
        );
        assert_eq!(
            decode(RawValue::text("80.32000000"), ScanKind::Float, FALLBACK).unwrap(),
            Value::Float(80.32)
        );
        assert_eq!(
            decode(RawValue::text("t"), ScanKind::Bool, FALLBACK).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            decode(RawValue::text(r#"{"a":[1]}"#), ScanKind::Json, FALLBACK).unwrap(),
            Value::Json(serde_json::json!({"a": [1]}))
        );
        assert_eq!(decode(RawValue::Null, ScanKind::Int, FALLBACK).unwrap(), Value::Null);
    }

    #[test]
    fn test_decode_passes_typed_values() {
        let raw = RawValue::Typed(Value::Text("7".into()));
        assert_eq!(
            decode(raw, ScanKind::Int, FALLBACK).unwrap(),
            Value::Text("7".into())
        );
    }

    #[test]
    fn test_decode_errors() {
        assert!(matches!(
            decode(RawValue::text("abc"), ScanKind::Int, FALLBACK),
            Err(Error::Coercion { .. })
        ));
        assert!(decode(RawValue::text("yesterday"), ScanKind::Time, FALLBACK).is_err());
    }

    #[test]
    fn test_timestamp_parse_order() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 10, 30, 0).unwrap();
        assert_eq!(parse_timestamp("2024-03-01T10:30:00Z", FALLBACK), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01 12:30:00+02", FALLBACK), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01 10:30:00", FALLBACK), Some(expected));
        assert_eq!(
            parse_timestamp("01/03/2024 10:30", "%d/%m/%Y %H:%M"),
            Some(expected)
        );
        assert_eq!(
            parse_timestamp("2024-03-01", FALLBACK),
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_literals() {
        assert_eq!(literal(&Value::Int(-5)), "-5");
        assert_eq!(literal(&Value::Float(80.32)), "80.32");
        assert_eq!(literal(&Value::Float(f64::NAN)), "'NaN'::float8");
        assert_eq!(literal(&Value::Bool(false)), "false");
        assert_eq!(literal(&Value::Null), "NULL");
        assert_eq!(literal(&Value::Text("O'Brien".into())), "'O''Brien'");
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 10, 30, 0).unwrap();
        assert_eq!(
            literal(&Value::Timestamp(ts)),
            "'2024-03-01 10:30:00+00:00'::timestamptz"
        );
        assert_eq!(
            literal(&Value::Json(serde_json::json!({"n": "it's"}))),
            r#"'{"n":"it''s"}'"#
        );
    }

    #[test]
    fn test_literal_quotes_stay_balanced() {
        for s in ["'", "''", "a'b'c", "'; DROP TABLE t; --", "\\'"] {
            let lit = literal(&Value::Text(s.to_string()));
            assert!(lit.starts_with('\'') && lit.ends_with('\''));
            let inner = &lit[1..lit.len() - 1];
            assert_eq!(inner.replace("''", "").matches('\'').count(), 0, "{s}");
        }
    }
}
