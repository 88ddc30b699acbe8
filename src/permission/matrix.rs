//! Role × command operation matrix.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::tree::{id_string, CommandType};

/// Which checkbox of a cell is meant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationFlag {
    Invoke,
    Approve,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationRow {
    #[serde(deserialize_with = "lenient_id")]
    pub role_id: String,
    #[serde(default)]
    pub role_name: String,
    #[serde(deserialize_with = "lenient_id")]
    pub command_id: String,
    #[serde(default)]
    pub command_type: CommandType,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub invoke: u8,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub approve: u8,
}

impl OperationRow {
    pub fn flag(&self, flag: OperationFlag) -> u8 {
        match flag {
            OperationFlag::Invoke => self.invoke,
            OperationFlag::Approve => self.approve,
        }
    }

    pub fn set_flag(&mut self, flag: OperationFlag, value: u8) {
        let value = u8::from(value != 0);
        match flag {
            OperationFlag::Invoke => self.invoke = value,
            OperationFlag::Approve => self.approve = value,
        }
    }

    /// Flip `flag` and return the new value.
    pub fn toggle(&mut self, flag: OperationFlag) -> u8 {
        let next = 1 - self.flag(flag).min(1);
        self.set_flag(flag, next);
        next
    }
}

/// Rows of one role, keyed by command id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupedOperation {
    pub role_id: String,
    pub role_name: String,
    pub operations: BTreeMap<String, OperationRow>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct OperationMatrix {
    pub groups: Vec<GroupedOperation>,
    /// Distinct command ids, first-seen order across all rows.
    pub columns: Vec<String>,
}

impl OperationMatrix {
    /// Group by `role_name` in first-seen order. A later row for the same
    /// role and command replaces the earlier one.
    pub fn from_rows(rows: impl IntoIterator<Item = OperationRow>) -> Self {
        let mut matrix = OperationMatrix::default();
        for row in rows {
            if !matrix.columns.contains(&row.command_id) {
                matrix.columns.push(row.command_id.clone());
            }
            let position = matrix.groups.iter().position(|g| g.role_name == row.role_name);
            let group = match position {
                Some(i) => &mut matrix.groups[i],
                None => {
                    matrix.groups.push(GroupedOperation {
                        role_id: row.role_id.clone(),
                        role_name: row.role_name.clone(),
                        operations: BTreeMap::new(),
                    });
                    let last = matrix.groups.len() - 1;
                    &mut matrix.groups[last]
                }
            };
            group.operations.insert(row.command_id.clone(), row);
        }
        matrix
    }

    /// Decode raw rows, skipping entries that are not operation rows.
    pub fn from_values(items: &[Value]) -> Self {
        Self::from_rows(items.iter().filter_map(|item| {
            serde_json::from_value::<OperationRow>(item.clone())
                .map_err(|e| tracing::warn!(error = %e, "skipping undecodable operation row"))
                .ok()
        }))
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn group(&self, role_name: &str) -> Option<&GroupedOperation> {
        self.groups.iter().find(|g| g.role_name == role_name)
    }

    pub fn cell(&self, role_id: &str, command_id: &str) -> Option<&OperationRow> {
        self.groups
            .iter()
            .filter_map(|g| g.operations.get(command_id))
            .find(|row| row.role_id == role_id)
    }

    pub fn cell_mut(&mut self, role_id: &str, command_id: &str) -> Option<&mut OperationRow> {
        self.groups
            .iter_mut()
            .filter_map(|g| g.operations.get_mut(command_id))
            .find(|row| row.role_id == role_id)
    }
}

fn lenient_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(id_string(&value).unwrap_or_default())
}

fn lenient_flag<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Bool(b) => u8::from(b),
        Value::Number(n) => u8::from(n.as_f64().is_some_and(|f| f != 0.0)),
        Value::String(s) => u8::from(matches!(s.trim(), "1" | "true" | "Y" | "y")),
        _ => 0,
    })
}
