//! Raw and canonical field values, and coercion between them.
//!
//! Number parsing is explicit rather than locale-inferred:
//! - `.` is the decimal point
//! - `,` is a thousands separator and is stripped
//! - an optional leading `$` (after any sign) is stripped
//!
//! Dates are parsed with the column's format string only.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default format for `date` columns.
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

/// A field as decoded from a source object, before any coercion.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Null,
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
}

impl RawValue {
    pub fn is_null(&self) -> bool {
        matches!(self, RawValue::Null)
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Text(value.to_string())
    }
}

/// Target type of a canonical column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    #[default]
    String,
    Integer,
    Float,
    Boolean,
    Date,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::String => "string",
            ColumnType::Integer => "integer",
            ColumnType::Float => "float",
            ColumnType::Boolean => "boolean",
            ColumnType::Date => "date",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A canonical, typed column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Date(NaiveDate),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Text form used when building record keys and lookup keys.
    ///
    /// Values that compare equal after coercion render identically, so an
    /// integer `2` from a CSV and a `BIGINT 2` from the warehouse match.
    pub fn key_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Text(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Date(d) => d.format(DEFAULT_DATE_FORMAT).to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            other => f.write_str(&other.key_text()),
        }
    }
}

/// Coerce a raw value into `column_type`.
///
/// `Null` stays `Null`; the caller decides whether that is allowed. The
/// error string describes what could not be converted.
pub fn coerce(raw: &RawValue, column_type: ColumnType, format: Option<&str>) -> Result<Value, String> {
    match (raw, column_type) {
        (RawValue::Null, _) => Ok(Value::Null),

        (RawValue::Text(s), ColumnType::String) => Ok(Value::Text(s.clone())),
        (RawValue::Integer(i), ColumnType::String) => Ok(Value::Text(i.to_string())),
        (RawValue::Float(f), ColumnType::String) => Ok(Value::Text(f.to_string())),
        (RawValue::Bool(b), ColumnType::String) => Ok(Value::Text(b.to_string())),

        (RawValue::Integer(i), ColumnType::Integer) => Ok(Value::Integer(*i)),
        (RawValue::Float(f), ColumnType::Integer) => float_to_integer(*f).map(Value::Integer),
        (RawValue::Text(s), ColumnType::Integer) => parse_integer(s).map(Value::Integer),

        (RawValue::Integer(i), ColumnType::Float) => Ok(Value::Float(*i as f64)),
        (RawValue::Float(f), ColumnType::Float) => Ok(Value::Float(*f)),
        (RawValue::Text(s), ColumnType::Float) => parse_number(s).map(Value::Float),

        (RawValue::Bool(b), ColumnType::Boolean) => Ok(Value::Boolean(*b)),
        (RawValue::Integer(0), ColumnType::Boolean) => Ok(Value::Boolean(false)),
        (RawValue::Integer(1), ColumnType::Boolean) => Ok(Value::Boolean(true)),
        (RawValue::Text(s), ColumnType::Boolean) => parse_bool(s).map(Value::Boolean),

        (RawValue::Text(s), ColumnType::Date) => {
            let format = format.unwrap_or(DEFAULT_DATE_FORMAT);
            NaiveDate::parse_from_str(s.trim(), format)
                .map(Value::Date)
                .map_err(|e| format!("'{s}' is not a date in format '{format}': {e}"))
        }

        (other, target) => Err(format!("cannot convert {other:?} to {target}")),
    }
}

/// Parse a decimal number under the documented rules.
pub fn parse_number(text: &str) -> Result<f64, String> {
    let cleaned = clean_number(text).ok_or_else(|| format!("'{text}' is not a number"))?;
    let value: f64 = cleaned
        .parse()
        .map_err(|_| format!("'{text}' is not a number"))?;
    if !value.is_finite() {
        return Err(format!("'{text}' is not a finite number"));
    }
    Ok(value)
}

/// Parse an integer, accepting integral decimals such as `2.0`.
pub fn parse_integer(text: &str) -> Result<i64, String> {
    let cleaned = clean_number(text).ok_or_else(|| format!("'{text}' is not an integer"))?;
    if let Ok(value) = cleaned.parse::<i64>() {
        return Ok(value);
    }
    let value = parse_number(text).map_err(|_| format!("'{text}' is not an integer"))?;
    float_to_integer(value)
}

fn float_to_integer(value: f64) -> Result<i64, String> {
    // i64::MAX is not exactly representable; 2^63 is the first value out of range.
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    if value.fract() != 0.0 || !value.is_finite() || value >= LIMIT || value < -LIMIT {
        return Err(format!("{value} is not an integer"));
    }
    Ok(value as i64)
}

fn parse_bool(text: &str) -> Result<bool, String> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" => Ok(true),
        "false" | "f" | "no" | "n" | "0" => Ok(false),
        _ => Err(format!("'{text}' is not a boolean")),
    }
}

/// Strip sign-preserving currency and grouping characters.
///
/// Returns `None` when nothing numeric is left.
fn clean_number(text: &str) -> Option<String> {
    let trimmed = text.trim();
    let (sign, rest) = match trimmed.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let rest = rest.strip_prefix('$').unwrap_or(rest);
    let digits: String = rest.chars().filter(|c| *c != ',').collect();
    if digits.is_empty() {
        return None;
    }
    Some(format!("{sign}{digits}"))
}
