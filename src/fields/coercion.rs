//! Value conversions shared by the field kinds.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::{Number, Value};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoercionError {
    #[error("Cannot convert '{0}' to number")]
    NotANumber(String),
    #[error("Cannot convert '{0}' to boolean")]
    NotABoolean(String),
    #[error("Cannot read '{0}' as a date")]
    InvalidDate(String),
    #[error("'{0}' is not one of the field options")]
    NotAnOption(String),
    #[error("Expected an object, got '{0}'")]
    NotAnObject(String),
}

pub fn to_f64(value: &Value) -> Result<f64, CoercionError> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| CoercionError::NotANumber(n.to_string())),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| CoercionError::NotANumber(s.clone())),
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        other => Err(CoercionError::NotANumber(other.to_string())),
    }
}

/// A JSON number, integral when the value has no fractional part.
pub fn to_number(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < 9_007_199_254_740_992.0 {
        Value::Number(Number::from(value as i64))
    } else {
        Number::from_f64(value).map(Value::Number).unwrap_or(Value::Null)
    }
}

pub fn to_bool(value: &Value) -> Result<bool, CoercionError> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(CoercionError::NotABoolean(n.to_string())),
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "y" | "yes" | "on" => Ok(true),
            "false" | "0" | "n" | "no" | "off" | "" => Ok(false),
            _ => Err(CoercionError::NotABoolean(s.clone())),
        },
        Value::Null => Ok(false),
        other => Err(CoercionError::NotABoolean(other.to_string())),
    }
}

/// Plain-text rendering of a value; `null` renders empty.
pub fn to_display_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Null, blank strings and empty containers carry no user input.
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.values().all(is_blank),
        _ => false,
    }
}

const DATE_TIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y/%m/%d %H:%M:%S"];
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y%m%d", "%d/%m/%Y"];

/// Read a date from RFC 3339, common date/time layouts, an explicit layout,
/// or epoch milliseconds.
pub fn to_datetime(value: &Value, format: Option<&str>) -> Result<NaiveDateTime, CoercionError> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .map(|dt| dt.naive_utc())
            .ok_or_else(|| CoercionError::InvalidDate(n.to_string())),
        Value::String(s) => parse_date_str(s.trim(), format)
            .ok_or_else(|| CoercionError::InvalidDate(s.clone())),
        other => Err(CoercionError::InvalidDate(other.to_string())),
    }
}

fn parse_date_str(s: &str, format: Option<&str>) -> Option<NaiveDateTime> {
    if let Some(format) = format {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt);
        }
        if let Ok(d) = NaiveDate::parse_from_str(s, format) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for f in DATE_TIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, f) {
            return Some(dt);
        }
    }
    for f in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, f) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    if let Ok(millis) = s.parse::<i64>() {
        return DateTime::<Utc>::from_timestamp_millis(millis).map(|dt| dt.naive_utc());
    }
    None
}
