//! Server-delivered screen schemas: fields, columns and the screen payload
//! that carries them.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::lazy_json::{ConfigShape, LazyJson};
use super::workflow::WorkflowGraph;

// ================================
// Field / column schema
// ================================

/// Selectable option of a field.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct FieldOption {
    #[serde(alias = "key", alias = "code")]
    pub value: Value,
    #[serde(default, alias = "name", alias = "text")]
    pub label: String,
}

/// One form field as delivered by the server.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct FieldSchema {
    pub code: String,
    #[serde(default)]
    pub inputtype: String,
    #[serde(default)]
    pub label: String,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub required: bool,
    #[serde(default)]
    pub config: LazyJson,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<FieldOption>>,
}

impl FieldSchema {
    pub fn new(code: impl Into<String>, inputtype: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            inputtype: inputtype.into(),
            label: String::new(),
            required: false,
            config: LazyJson::default(),
            options: None,
        }
    }

    pub fn with_config(mut self, raw: impl Into<String>) -> Self {
        self.config = LazyJson::object(raw);
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// One table column as delivered by the server.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ColumnSchema {
    pub code: String,
    #[serde(default, alias = "name", alias = "label")]
    pub title: String,
    #[serde(default)]
    pub inputtype: String,
    #[serde(default)]
    pub config: LazyJson,
}

impl ColumnSchema {
    pub fn new(code: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            title: title.into(),
            inputtype: String::new(),
            config: LazyJson::default(),
        }
    }

    pub fn with_inputtype(mut self, inputtype: impl Into<String>) -> Self {
        self.inputtype = inputtype.into();
        self
    }
}

// ================================
// Screen payload
// ================================

/// A screen definition: typed fields plus string-encoded layout and
/// workflow configuration, each parsed on first use.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct ViewSchema {
    /// Entries that do not decode are skipped.
    #[serde(default, deserialize_with = "lenient_fields")]
    pub fields: Vec<FieldSchema>,
    #[serde(default, deserialize_with = "lazy_array")]
    pub columns: LazyJson,
    #[serde(default)]
    pub list_layout: LazyJson,
    #[serde(default, deserialize_with = "lazy_array")]
    pub previewinfo: LazyJson,
    #[serde(default, rename = "txFo", alias = "txfo", alias = "tx_fo")]
    pub tx_fo: LazyJson,
}

impl ViewSchema {
    /// Column list; entries that do not decode are skipped.
    pub fn columns(&self) -> Vec<ColumnSchema> {
        decode_each(self.columns.value(), "column")
    }

    /// Preview paths of an object-preview screen.
    pub fn preview_paths(&self) -> Vec<String> {
        self.previewinfo
            .value()
            .as_array()
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

    pub fn workflow(&self) -> WorkflowGraph {
        WorkflowGraph::from_value(self.tx_fo.value())
    }

    pub fn field(&self, code: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.code == code)
    }
}

fn decode_each<T: serde::de::DeserializeOwned>(value: &Value, what: &str) -> Vec<T> {
    let Some(items) = value.as_array() else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match serde_json::from_value::<T>(item.clone()) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!(error = %e, "skipping undecodable {}", what);
                None
            }
        })
        .collect()
}

fn lenient_fields<'de, D>(deserializer: D) -> Result<Vec<FieldSchema>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?.unwrap_or(Value::Null);
    Ok(decode_each(&value, "field"))
}

fn lazy_array<'de, D>(deserializer: D) -> Result<LazyJson, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(LazyJson::deserialize(deserializer)?.with_shape(ConfigShape::Array))
}

fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Bool(b)) => b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => matches!(s.trim().to_lowercase().as_str(), "true" | "1" | "y" | "yes"),
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_schema_lenient_decode() {
        let field: FieldSchema = serde_json::from_value(json!({
            "code": "amount",
            "inputtype": "numeric",
            "required": "1",
            "config": "{\"min\": 0}"
        }))
        .unwrap();
        assert!(field.required);
        assert!(!field.config.is_parsed());
        assert_eq!(field.config.value()["min"], 0);
    }

    #[test]
    fn test_field_schema_bad_config_never_fails() {
        let field: FieldSchema = serde_json::from_value(json!({
            "code": "x",
            "config": "{broken"
        }))
        .unwrap();
        assert_eq!(field.config.value(), &json!({}));
        assert!(field.config.diagnostic().is_some());
    }

    #[test]
    fn test_view_schema_columns_and_workflow() {
        let view: ViewSchema = serde_json::from_value(json!({
            "columns": "[{\"code\": \"user.name\", \"title\": \"Name\"}, {\"title\": \"no code\"}]",
            "previewinfo": "[\"id\", {\"code\": \"status\"}]",
            "txFo": "{\"load\": [{\"workflowId\": \"WF_LIST\"}]}"
        }))
        .unwrap();
        let columns = view.columns();
        assert_eq!(columns.len(), 1);
        assert_eq!(columns[0].code, "user.name");
        assert_eq!(view.preview_paths(), vec!["id", "status"]);
        assert_eq!(view.workflow().names().collect::<Vec<_>>(), vec!["load"]);
    }

    #[test]
    fn test_view_schema_skips_bad_fields() {
        let view: ViewSchema = serde_json::from_value(json!({
            "fields": [
                {"code": "name", "inputtype": "text"},
                {"inputtype": "numeric"},
                {"code": "status", "label": 7},
                {"code": "amount", "inputtype": "numeric"}
            ]
        }))
        .unwrap();
        let codes: Vec<_> = view.fields.iter().map(|f| f.code.as_str()).collect();
        assert_eq!(codes, vec!["name", "amount"]);
        assert!(view.field("amount").is_some());

        let view: ViewSchema = serde_json::from_value(json!({"fields": null})).unwrap();
        assert!(view.fields.is_empty());
    }

    #[test]
    fn test_view_schema_malformed_columns() {
        let view: ViewSchema = serde_json::from_value(json!({"columns": "{\"code\": 1}"})).unwrap();
        assert!(view.columns().is_empty());
        assert_eq!(view.columns.value(), &json!([]));
    }
}
