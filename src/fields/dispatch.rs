//! Type-tag dispatch: display, coercion and validation per field kind.

use std::fmt::Write;

use chrono::NaiveDateTime;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use super::coercion::{
    is_blank, to_bool, to_datetime, to_display_string, to_f64, to_number, CoercionError,
};
use super::kind::FieldKind;
use crate::core::lookup_path;
use crate::dsl::{FieldOption, FieldSchema, ParsedConfig};

const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";
const DEFAULT_LANG: &str = "en";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationIssue {
    #[error("This field is required")]
    Required,
    #[error("Value must be at least {0}")]
    BelowMin(f64),
    #[error("Value must be at most {0}")]
    AboveMax(f64),
    #[error("Value must be at most {0} characters")]
    TooLong(usize),
    #[error("Value does not match the pattern {0}")]
    PatternMismatch(String),
    #[error(transparent)]
    Coercion(#[from] CoercionError),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValidationResult {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn first_message(&self) -> Option<String> {
        self.issues.first().map(ToString::to_string)
    }
}

/// A field resolved against its type tag and configuration.
#[derive(Debug, Clone, Serialize)]
pub struct FieldView {
    pub kind: FieldKind,
    pub display_value: String,
    pub required: bool,
    #[serde(skip)]
    config: ParsedConfig,
    #[serde(skip)]
    options: Vec<FieldOption>,
}

/// Resolve `value` for display under `type_tag`. Pure; total over any tag.
pub fn dispatch(type_tag: &str, value: &Value, config: &ParsedConfig) -> FieldView {
    let kind = FieldKind::from_tag(type_tag);
    let options = config_options(config);
    let mut view = FieldView {
        kind,
        display_value: String::new(),
        required: false,
        config: config.clone(),
        options,
    };
    view.display_value = view.display(value);
    view
}

/// Dispatch a schema field: its `required` flag and inline options apply.
pub fn dispatch_field(schema: &FieldSchema, value: &Value) -> FieldView {
    let mut view = dispatch(&schema.inputtype, value, schema.config.parsed());
    if let Some(options) = &schema.options {
        view.options = options.clone();
        view.display_value = view.display(value);
    }
    view.required = schema.required && view.kind.can_be_required();
    view
}

fn config_options(config: &ParsedConfig) -> Vec<FieldOption> {
    config
        .get("options")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| serde_json::from_value(item.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

impl FieldView {
    pub fn with_required(mut self, required: bool) -> Self {
        self.required = required && self.kind.can_be_required();
        self
    }

    pub fn options(&self) -> &[FieldOption] {
        &self.options
    }

    /// Convert raw user input into the value stored for this field.
    pub fn coerce(&self, raw: &Value) -> Result<Value, CoercionError> {
        match &self.kind {
            FieldKind::Text | FieldKind::TextArea => Ok(match raw {
                Value::Null => Value::Null,
                other => Value::String(to_display_string(other)),
            }),
            FieldKind::Numeric => {
                if is_blank(raw) {
                    return Ok(Value::Null);
                }
                Ok(to_number(to_f64(raw)?))
            }
            FieldKind::Toggle => Ok(Value::Bool(to_bool(raw)?)),
            FieldKind::Select | FieldKind::Tag => self.coerce_option(raw),
            FieldKind::MultiLanguage => match raw {
                Value::Null => Ok(Value::Null),
                Value::Object(_) => Ok(raw.clone()),
                Value::String(s) => match serde_json::from_str::<Value>(s) {
                    Ok(Value::Object(map)) => Ok(Value::Object(map)),
                    _ => {
                        let mut map = Map::new();
                        map.insert(self.default_lang().to_string(), Value::String(s.clone()));
                        Ok(Value::Object(map))
                    }
                },
                other => Err(CoercionError::NotAnObject(other.to_string())),
            },
            FieldKind::MaskedDate => {
                if is_blank(raw) {
                    return Ok(Value::Null);
                }
                let format = self.config.str("format").map(mask_to_strftime);
                let dt = to_datetime(raw, format.as_deref())?;
                let value_format = self
                    .config
                    .str("valueFormat")
                    .map(mask_to_strftime)
                    .unwrap_or_else(|| DEFAULT_DATE_FORMAT.to_string());
                Ok(Value::String(format_date(&dt, &value_format)))
            }
            FieldKind::ObjectPreview => match raw {
                Value::Null | Value::Object(_) | Value::Array(_) => Ok(raw.clone()),
                Value::String(s) => match serde_json::from_str::<Value>(s) {
                    Ok(v @ (Value::Object(_) | Value::Array(_))) => Ok(v),
                    _ => Err(CoercionError::NotAnObject(s.clone())),
                },
                other => Err(CoercionError::NotAnObject(other.to_string())),
            },
            FieldKind::ActionTrigger | FieldKind::Unknown(_) => Ok(raw.clone()),
        }
    }

    pub fn validate(&self, value: &Value) -> ValidationResult {
        let mut result = ValidationResult::default();
        if is_blank(value) {
            if self.required {
                result.issues.push(ValidationIssue::Required);
            }
            return result;
        }

        let coerced = match self.coerce(value) {
            Ok(v) => v,
            Err(e) => {
                result.issues.push(e.into());
                return result;
            }
        };

        match &self.kind {
            FieldKind::Numeric => {
                if let Ok(n) = to_f64(&coerced) {
                    if let Some(min) = self.config.f64("min") {
                        if n < min {
                            result.issues.push(ValidationIssue::BelowMin(min));
                        }
                    }
                    if let Some(max) = self.config.f64("max") {
                        if n > max {
                            result.issues.push(ValidationIssue::AboveMax(max));
                        }
                    }
                }
            }
            FieldKind::Text | FieldKind::TextArea => {
                self.check_text(&to_display_string(&coerced), &mut result);
            }
            FieldKind::MultiLanguage => {
                if let Value::Object(map) = &coerced {
                    for text in map.values().filter_map(Value::as_str) {
                        self.check_text(text, &mut result);
                    }
                }
            }
            _ => {}
        }
        result
    }

    fn check_text(&self, text: &str, result: &mut ValidationResult) {
        if let Some(max_len) = self.config.f64("maxLength") {
            let max_len = max_len.max(0.0) as usize;
            if text.chars().count() > max_len {
                result.issues.push(ValidationIssue::TooLong(max_len));
            }
        }
        if let Some(pattern) = self.config.str("pattern") {
            match Regex::new(pattern) {
                Ok(re) if !re.is_match(text) => {
                    result.issues.push(ValidationIssue::PatternMismatch(pattern.to_string()));
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(pattern, error = %e, "ignoring invalid field pattern"),
            }
        }
    }

    fn coerce_option(&self, raw: &Value) -> Result<Value, CoercionError> {
        if self.options.is_empty() || raw.is_null() {
            return Ok(raw.clone());
        }
        if let Value::Array(items) = raw {
            return items
                .iter()
                .map(|item| self.coerce_option(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array);
        }
        self.find_option(raw)
            .map(|o| o.value.clone())
            .ok_or_else(|| CoercionError::NotAnOption(to_display_string(raw)))
    }

    fn find_option(&self, value: &Value) -> Option<&FieldOption> {
        let wanted = to_display_string(value);
        self.options
            .iter()
            .find(|o| o.value == *value || to_display_string(&o.value) == wanted)
    }

    fn default_lang(&self) -> &str {
        self.config.str("defaultLang").unwrap_or(DEFAULT_LANG)
    }

    fn display(&self, value: &Value) -> String {
        match &self.kind {
            FieldKind::Text | FieldKind::TextArea | FieldKind::Unknown(_) => {
                to_display_string(value)
            }
            FieldKind::Numeric => match (to_f64(value), self.precision()) {
                (Ok(n), Some(p)) => format!("{:.*}", p, n),
                _ => to_display_string(value),
            },
            FieldKind::Toggle => match to_bool(value) {
                Ok(true) => self.config.str("trueLabel").unwrap_or("Yes").to_string(),
                Ok(false) => self.config.str("falseLabel").unwrap_or("No").to_string(),
                Err(_) => to_display_string(value),
            },
            FieldKind::Select | FieldKind::Tag => match value {
                Value::Array(items) => items
                    .iter()
                    .map(|v| self.option_label(v))
                    .collect::<Vec<_>>()
                    .join(", "),
                other => self.option_label(other),
            },
            FieldKind::MultiLanguage => self.display_multi_language(value),
            FieldKind::MaskedDate => {
                if is_blank(value) {
                    return String::new();
                }
                let format = self
                    .config
                    .str("format")
                    .map(mask_to_strftime)
                    .unwrap_or_else(|| DEFAULT_DATE_FORMAT.to_string());
                match to_datetime(value, None) {
                    Ok(dt) => format_date(&dt, &format),
                    Err(_) => to_display_string(value),
                }
            }
            FieldKind::ObjectPreview => self.display_preview(value),
            FieldKind::ActionTrigger => self
                .config
                .str("label")
                .or_else(|| self.config.str("text"))
                .map(str::to_string)
                .unwrap_or_else(|| to_display_string(value)),
        }
    }

    fn precision(&self) -> Option<usize> {
        self.config
            .f64("precision")
            .or_else(|| self.config.f64("decimals"))
            .map(|p| p.clamp(0.0, 12.0) as usize)
    }

    fn option_label(&self, value: &Value) -> String {
        match self.find_option(value) {
            Some(option) if !option.label.is_empty() => option.label.clone(),
            _ => to_display_string(value),
        }
    }

    fn display_multi_language(&self, value: &Value) -> String {
        let parsed;
        let map = match value {
            Value::Object(map) => map,
            Value::String(s) => match serde_json::from_str::<Value>(s) {
                Ok(Value::Object(map)) => {
                    parsed = map;
                    &parsed
                }
                _ => return s.clone(),
            },
            other => return to_display_string(other),
        };
        map.get(self.default_lang())
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .or_else(|| map.values().filter_map(Value::as_str).find(|s| !s.is_empty()))
            .unwrap_or_default()
            .to_string()
    }

    fn display_preview(&self, value: &Value) -> String {
        let parsed;
        let target = match value {
            Value::String(s) => match serde_json::from_str::<Value>(s) {
                Ok(v) => {
                    parsed = v;
                    &parsed
                }
                Err(_) => return s.clone(),
            },
            other => other,
        };
        let paths = self.preview_paths();
        if paths.is_empty() {
            return to_display_string(target);
        }
        paths
            .iter()
            .filter_map(|p| lookup_path(target, p))
            .filter(|v| !v.is_null())
            .map(to_display_string)
            .collect::<Vec<_>>()
            .join(" / ")
    }

    fn preview_paths(&self) -> Vec<String> {
        self.config
            .get("previewinfo")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| match v {
                        Value::String(s) => Some(s.clone()),
                        Value::Object(o) => o.get("code").and_then(Value::as_str).map(str::to_string),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Accepts both strftime layouts and `YYYY-MM-DD` style masks.
fn mask_to_strftime(format: &str) -> String {
    if format.contains('%') {
        return format.to_string();
    }
    format
        .replace("YYYY", "%Y")
        .replace("DD", "%d")
        .replace("HH", "%H")
        .replace("ss", "%S")
        .replace("MM", "%m")
        .replace("mm", "%M")
}

fn format_date(dt: &NaiveDateTime, format: &str) -> String {
    let mut out = String::new();
    if write!(out, "{}", dt.format(format)).is_ok() {
        return out;
    }
    tracing::warn!(format, "invalid date format, using default");
    dt.format(DEFAULT_DATE_FORMAT).to_string()
}
