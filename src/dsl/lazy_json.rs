//! Lazily parsed, never-trusted JSON configuration strings.
//!
//! Schema payloads embed JSON as strings (`config`, `columns`, `list_layout`,
//! `previewinfo`, `txFo`). Most of them are never read in a given session, so
//! parsing is deferred until first access and a malformed string degrades to
//! an empty structure instead of failing the screen.

use std::sync::OnceLock;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use thiserror::Error;

/// Declared shape of a configuration string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfigShape {
    #[default]
    Object,
    Array,
}

impl ConfigShape {
    pub fn empty(self) -> Value {
        match self {
            ConfigShape::Object => Value::Object(Map::new()),
            ConfigShape::Array => Value::Array(Vec::new()),
        }
    }

    fn accepts(self, value: &Value) -> bool {
        match self {
            ConfigShape::Object => value.is_object(),
            ConfigShape::Array => value.is_array(),
        }
    }
}

/// Diagnostic recorded when a configuration string could not be used.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigParseError {
    #[error("malformed JSON: {0}")]
    Malformed(String),
    #[error("expected {expected:?}, found {found}")]
    WrongShape { expected: ConfigShape, found: &'static str },
}

/// Result of resolving a configuration string.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedConfig {
    pub value: Value,
    pub diagnostic: Option<ConfigParseError>,
}

impl ParsedConfig {
    pub fn is_default(&self) -> bool {
        self.diagnostic.is_some()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.value.get(key)
    }

    pub fn str(&self, key: &str) -> Option<&str> {
        self.value.get(key).and_then(Value::as_str)
    }

    pub fn f64(&self, key: &str) -> Option<f64> {
        self.value.get(key).and_then(|v| match v {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
    }
}

impl Default for ParsedConfig {
    fn default() -> Self {
        Self {
            value: ConfigShape::Object.empty(),
            diagnostic: None,
        }
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Turns raw configuration strings into JSON values without ever failing.
pub struct SchemaResolver;

impl SchemaResolver {
    /// Resolve `raw` into a value of the declared shape.
    ///
    /// `None`, the empty string and `"null"` resolve to the empty shape
    /// without a diagnostic. Anything else that is not valid JSON of the
    /// declared shape resolves to the empty shape with a diagnostic.
    pub fn resolve(raw: Option<&str>, shape: ConfigShape) -> ParsedConfig {
        let text = match raw.map(str::trim) {
            None | Some("") | Some("null") => {
                return ParsedConfig {
                    value: shape.empty(),
                    diagnostic: None,
                }
            }
            Some(text) => text,
        };
        match serde_json::from_str::<Value>(text) {
            Ok(value) => Self::resolve_value(value, shape),
            Err(e) => {
                tracing::warn!(error = %e, "config string is not valid JSON; using empty default");
                ParsedConfig {
                    value: shape.empty(),
                    diagnostic: Some(ConfigParseError::Malformed(e.to_string())),
                }
            }
        }
    }

    /// Same contract for a config that arrived already decoded.
    pub fn resolve_value(value: Value, shape: ConfigShape) -> ParsedConfig {
        if value.is_null() {
            return ParsedConfig {
                value: shape.empty(),
                diagnostic: None,
            };
        }
        // Some payloads double-encode: a JSON string that itself holds JSON.
        if let Value::String(inner) = &value {
            return Self::resolve(Some(inner), shape);
        }
        if shape.accepts(&value) {
            return ParsedConfig {
                value,
                diagnostic: None,
            };
        }
        let found = kind_name(&value);
        tracing::warn!(expected = ?shape, found, "config has unexpected shape; using empty default");
        ParsedConfig {
            value: shape.empty(),
            diagnostic: Some(ConfigParseError::WrongShape {
                expected: shape,
                found,
            }),
        }
    }
}

/// A JSON configuration carried as a string and parsed on first access.
#[derive(Debug, Default)]
pub struct LazyJson {
    raw: Option<String>,
    shape: ConfigShape,
    parsed: OnceLock<ParsedConfig>,
}

impl LazyJson {
    pub fn new(raw: Option<String>, shape: ConfigShape) -> Self {
        Self {
            raw,
            shape,
            parsed: OnceLock::new(),
        }
    }

    pub fn object(raw: impl Into<String>) -> Self {
        Self::new(Some(raw.into()), ConfigShape::Object)
    }

    pub fn array(raw: impl Into<String>) -> Self {
        Self::new(Some(raw.into()), ConfigShape::Array)
    }

    /// Re-declare the shape. Only meaningful before first access.
    pub fn with_shape(mut self, shape: ConfigShape) -> Self {
        self.shape = shape;
        self.parsed = OnceLock::new();
        self
    }

    pub fn raw(&self) -> Option<&str> {
        self.raw.as_deref()
    }

    pub fn is_parsed(&self) -> bool {
        self.parsed.get().is_some()
    }

    pub fn parsed(&self) -> &ParsedConfig {
        self.parsed
            .get_or_init(|| SchemaResolver::resolve(self.raw.as_deref(), self.shape))
    }

    pub fn value(&self) -> &Value {
        &self.parsed().value
    }

    pub fn diagnostic(&self) -> Option<&ConfigParseError> {
        self.parsed().diagnostic.as_ref()
    }

    /// Typed view of the parsed value; falls back to `T::default()` when the
    /// JSON does not match `T`.
    pub fn decode<T: DeserializeOwned + Default>(&self) -> T {
        match serde_json::from_value::<T>(self.value().clone()) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "config does not match expected structure; using default");
                T::default()
            }
        }
    }
}

impl Clone for LazyJson {
    fn clone(&self) -> Self {
        let parsed = OnceLock::new();
        if let Some(p) = self.parsed.get() {
            let _ = parsed.set(p.clone());
        }
        Self {
            raw: self.raw.clone(),
            shape: self.shape,
            parsed,
        }
    }
}

impl PartialEq for LazyJson {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw && self.shape == other.shape
    }
}

impl Serialize for LazyJson {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match &self.raw {
            Some(raw) => serializer.serialize_str(raw),
            None => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for LazyJson {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        let raw = match value {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s),
            // Already-decoded config: keep its text form so laziness and
            // equality behave the same as for string configs.
            Some(other) => Some(other.to_string()),
        };
        Ok(LazyJson::new(raw, ConfigShape::Object))
    }
}
