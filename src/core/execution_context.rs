//! Per-run key/value store threading data between chained steps.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::value_path::lookup_path;

/// One recorded write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextWrite {
    pub key: String,
    pub value: Value,
}

/// Mutable key → value store scoped to one orchestration run.
///
/// Writes are last-write-wins per key with no deep merge. Every write is also
/// appended to a journal so writes made on a snapshot can be replayed onto
/// another context in a chosen order.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    values: HashMap<String, Value>,
    journal: Vec<ContextWrite>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(values: HashMap<String, Value>) -> Self {
        Self {
            values,
            journal: Vec::new(),
        }
    }

    /// Build from a JSON object; other values yield an empty context.
    pub fn from_value(value: &Value) -> Self {
        let values = value
            .as_object()
            .map(|obj| obj.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();
        Self::from_map(values)
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Exact key first, then a dot path whose first segment is a key
    /// (`"menu.command_id"` reads `command_id` out of the `menu` entry).
    pub fn get(&self, key: &str) -> Option<&Value> {
        if let Some(v) = self.values.get(key) {
            return Some(v);
        }
        let (head, rest) = key.split_once('.')?;
        lookup_path(self.values.get(head)?, rest)
    }

    /// Whether `key` resolves to a present, non-null value.
    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some_and(|v| !v.is_null())
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        self.journal.push(ContextWrite {
            key: key.clone(),
            value: value.clone(),
        });
        self.values.insert(key, value);
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.values.keys()
    }

    /// Position in the journal; pass to [`writes_since`](Self::writes_since).
    pub fn mark(&self) -> usize {
        self.journal.len()
    }

    pub fn writes_since(&self, mark: usize) -> &[ContextWrite] {
        self.journal.get(mark..).unwrap_or(&[])
    }

    /// Forget recorded writes. Values are kept.
    pub fn clear_journal(&mut self) {
        self.journal.clear();
    }

    /// A copy of the values with an empty journal.
    pub fn snapshot(&self) -> Self {
        Self::from_map(self.values.clone())
    }

    /// Replay writes in order (last write wins).
    pub fn apply(&mut self, writes: &[ContextWrite]) {
        for w in writes {
            self.set(w.key.clone(), w.value.clone());
        }
    }

    pub fn to_value(&self) -> Value {
        let mut keys: Vec<&String> = self.values.keys().collect();
        keys.sort();
        let map: Map<String, Value> = keys
            .into_iter()
            .map(|k| (k.clone(), self.values[k].clone()))
            .collect();
        Value::Object(map)
    }
}

impl PartialEq for ExecutionContext {
    fn eq(&self, other: &Self) -> bool {
        self.values == other.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_last_write_wins() {
        let mut ctx = ExecutionContext::new();
        ctx.set("k", json!({"a": 1}));
        ctx.set("k", json!({"b": 2}));
        assert_eq!(ctx.get("k"), Some(&json!({"b": 2})));
    }

    #[test]
    fn test_dot_path_get() {
        let ctx = ExecutionContext::new().with("menu", json!({"command_id": "10"}));
        assert_eq!(ctx.get("menu.command_id"), Some(&json!("10")));
        assert!(ctx.get("menu.parent_id").is_none());
        assert!(!ctx.has("nothing"));
    }

    #[test]
    fn test_exact_key_with_dot_wins() {
        let ctx = ExecutionContext::new()
            .with("a.b", "exact")
            .with("a", json!({"b": "nested"}));
        assert_eq!(ctx.get("a.b"), Some(&json!("exact")));
    }

    #[test]
    fn test_journal_replay() {
        let mut ctx = ExecutionContext::new().with("seed", 1);
        let mark = ctx.mark();
        ctx.set("x", 1);
        ctx.set("x", 2);
        let writes = ctx.writes_since(mark).to_vec();
        assert_eq!(writes.len(), 2);

        let mut other = ExecutionContext::new();
        other.apply(&writes);
        assert_eq!(other.get("x"), Some(&json!(2)));
        assert!(other.get("seed").is_none());
    }

    #[test]
    fn test_snapshot_drops_journal() {
        let mut ctx = ExecutionContext::new().with("a", 1).with("a", 2);
        let snap = ctx.snapshot();
        assert_eq!(snap.mark(), 0);
        assert_eq!(snap, ctx);
        ctx.clear_journal();
        assert_eq!(ctx.mark(), 0);
        assert_eq!(ctx.get("a"), Some(&json!(2)));
    }

    #[test]
    fn test_from_value() {
        let ctx = ExecutionContext::from_value(&json!({"userId": "u1"}));
        assert_eq!(ctx.get("userId"), Some(&json!("u1")));
        assert!(ExecutionContext::from_value(&json!([1])).is_empty());
    }
}
