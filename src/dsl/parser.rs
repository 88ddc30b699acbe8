//! Source parser: converts raw YAML/JSON/TOML text into typed documents
//! (console configuration, workflow graphs, screen payloads).

use serde::de::DeserializeOwned;

use crate::error::ConsoleError;

/// Supported input formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// YAML format (`.yaml` / `.yml`).
    Yaml,
    /// JSON format (`.json`).
    Json,
    /// TOML format (`.toml`).
    Toml,
}

impl SourceFormat {
    /// Guess the format from a file extension; defaults to JSON.
    pub fn from_path(path: &std::path::Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("yaml") | Some("yml") => SourceFormat::Yaml,
            Some("toml") => SourceFormat::Toml,
            _ => SourceFormat::Json,
        }
    }
}

/// Parse `content` into `T`.
pub fn parse_source<T: DeserializeOwned>(content: &str, format: SourceFormat) -> Result<T, ConsoleError> {
    match format {
        SourceFormat::Yaml => serde_saphyr::from_str(content)
            .map_err(|e| ConsoleError::ConfigParseError(e.to_string())),
        SourceFormat::Json => serde_json::from_str(content)
            .map_err(|e| ConsoleError::ConfigParseError(e.to_string())),
        SourceFormat::Toml => {
            // TOML → toml::Value → serde_json::Value → T, so fields typed as
            // serde_json::Value (step inputs, literals) decode the same way
            // as from JSON.
            let toml_val: toml::Value = toml::from_str(content)
                .map_err(|e| ConsoleError::ConfigParseError(e.to_string()))?;
            let json_val = toml_value_to_json(toml_val);
            serde_json::from_value(json_val)
                .map_err(|e| ConsoleError::ConfigParseError(e.to_string()))
        }
    }
}

/// Convert a [`toml::Value`] into a [`serde_json::Value`].
///
/// TOML has no null; `Datetime` values are stringified.
fn toml_value_to_json(val: toml::Value) -> serde_json::Value {
    match val {
        toml::Value::String(s) => serde_json::Value::String(s),
        toml::Value::Integer(i) => serde_json::json!(i),
        toml::Value::Float(f) => serde_json::json!(f),
        toml::Value::Boolean(b) => serde_json::Value::Bool(b),
        toml::Value::Array(arr) => {
            serde_json::Value::Array(arr.into_iter().map(toml_value_to_json).collect())
        }
        toml::Value::Table(tbl) => {
            let map: serde_json::Map<String, serde_json::Value> = tbl
                .into_iter()
                .map(|(k, v)| (k, toml_value_to_json(v)))
                .collect();
            serde_json::Value::Object(map)
        }
        toml::Value::Datetime(dt) => serde_json::Value::String(dt.to_string()),
    }
}
