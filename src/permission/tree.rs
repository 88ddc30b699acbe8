//! Menu tree built from the flat `load_menu` listing.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// `parent_id` marking a root node.
pub const ROOT_PARENT_ID: &str = "0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CommandType {
    /// Menu entry; may have children.
    #[default]
    #[serde(rename = "M", alias = "m")]
    Menu,
    /// Command (button / operation) attached to a menu.
    #[serde(rename = "C", alias = "c")]
    Command,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionNode {
    #[serde(deserialize_with = "lenient_id")]
    pub command_id: String,
    #[serde(default, deserialize_with = "lenient_id")]
    pub parent_id: String,
    #[serde(default)]
    pub command_type: CommandType,
    #[serde(default)]
    pub command_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_opt_id")]
    pub service_id: Option<String>,
    #[serde(default)]
    pub children: Vec<PermissionNode>,
}

impl PermissionNode {
    pub fn new(command_id: impl Into<String>, parent_id: impl Into<String>) -> Self {
        Self {
            command_id: command_id.into(),
            parent_id: parent_id.into(),
            command_type: CommandType::Menu,
            command_name: String::new(),
            service_id: None,
            children: Vec::new(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_id == ROOT_PARENT_ID
    }

    /// Service id sent with operation loads; the command id when absent.
    pub fn service_id(&self) -> &str {
        self.service_id.as_deref().unwrap_or(&self.command_id)
    }

    pub fn find(&self, command_id: &str) -> Option<&PermissionNode> {
        if self.command_id == command_id {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(command_id))
    }
}

/// Decode listing entries, skipping those that are not nodes.
pub fn decode_nodes(items: &[Value]) -> Vec<PermissionNode> {
    items
        .iter()
        .filter_map(|item| match serde_json::from_value::<PermissionNode>(item.clone()) {
            Ok(node) => Some(node),
            Err(e) => {
                tracing::warn!(error = %e, "skipping undecodable menu entry");
                None
            }
        })
        .collect()
}

/// Build the forest rooted at `parent_id == "0"`. Children keep the order in
/// which they appear in `flat`; nodes not reachable from a root are dropped.
pub fn build_tree(flat: Vec<PermissionNode>) -> Vec<PermissionNode> {
    let mut by_parent: HashMap<String, Vec<usize>> = HashMap::new();
    for (i, node) in flat.iter().enumerate() {
        by_parent.entry(node.parent_id.clone()).or_default().push(i);
    }

    let mut visited = HashSet::new();
    let roots: Vec<PermissionNode> = flat
        .iter()
        .enumerate()
        .filter(|(_, n)| n.is_root())
        .filter_map(|(i, _)| attach(i, &flat, &by_parent, &mut visited))
        .collect();

    for (i, node) in flat.iter().enumerate() {
        if !visited.contains(&i) {
            tracing::warn!(
                command_id = %node.command_id,
                parent_id = %node.parent_id,
                "dropping menu node without a reachable parent"
            );
        }
    }
    roots
}

fn attach(
    index: usize,
    flat: &[PermissionNode],
    by_parent: &HashMap<String, Vec<usize>>,
    visited: &mut HashSet<usize>,
) -> Option<PermissionNode> {
    if !visited.insert(index) {
        return None;
    }
    let mut node = flat[index].clone();
    node.children = by_parent
        .get(&node.command_id)
        .map(|children| {
            children
                .iter()
                .filter_map(|&c| attach(c, flat, by_parent, visited))
                .collect()
        })
        .unwrap_or_default();
    Some(node)
}

pub(crate) fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn lenient_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(id_string(&value).unwrap_or_default())
}

fn lenient_opt_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(id_string(&value).filter(|s| !s.is_empty()))
}
