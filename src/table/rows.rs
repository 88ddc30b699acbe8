//! Row extraction and cell rendering.

use serde_json::Value;

use crate::core::lookup_path;
use crate::dsl::ColumnSchema;
use crate::fields::dispatch;

const ROW_KEYS: &[&str] = &["rows", "list", "items", "data", "records"];
const TOTAL_KEYS: &[&str] = &["total", "totalCount", "total_count"];

/// Rows carried by a response `data` value.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RowSet {
    pub rows: Vec<Value>,
    pub total: Option<usize>,
}

/// Accepts a bare array, or an object holding the rows under one of
/// `rows`, `list`, `items`, `data`, `records` next to an optional total.
pub fn extract_rows(data: &Value) -> RowSet {
    match data {
        Value::Array(items) => RowSet {
            rows: items.clone(),
            total: None,
        },
        Value::Object(map) => {
            let rows = ROW_KEYS
                .iter()
                .find_map(|k| map.get(*k).and_then(Value::as_array))
                .cloned()
                .unwrap_or_default();
            let total = TOTAL_KEYS
                .iter()
                .find_map(|k| map.get(*k))
                .and_then(|v| match v {
                    Value::Number(n) => n.as_u64().map(|n| n as usize),
                    Value::String(s) => s.trim().parse().ok(),
                    _ => None,
                });
            RowSet { rows, total }
        }
        _ => RowSet::default(),
    }
}

/// Render one cell. A missing or null path yields `sentinel`.
pub fn render_cell(row: &Value, column: &ColumnSchema, sentinel: &str) -> String {
    match lookup_path(row, &column.code) {
        None | Some(Value::Null) => sentinel.to_string(),
        Some(value) => dispatch(&column.inputtype, value, column.config.parsed()).display_value,
    }
}

pub fn render_row(row: &Value, columns: &[ColumnSchema], sentinel: &str) -> Vec<String> {
    columns
        .iter()
        .map(|column| render_cell(row, column, sentinel))
        .collect()
}
