//! FO/BO workflow model: request steps, execution groups and graphs.
//!
//! A graph arrives as a JSON object (conventionally the string-encoded `txFo`
//! field of a screen payload) mapping group names to ordered step arrays.
//! Templates in this module are immutable; binding them against a context
//! happens in [`crate::engine::substitution`] and always yields a fresh
//! request.

use std::collections::BTreeSet;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use super::lazy_json::{ConfigShape, SchemaResolver};

/// Marker member of a transform expression: `{"$fn": "uuid"}`.
pub const TRANSFORM_MARKER: &str = "$fn";

/// Statically registered value transforms.
#[derive(Debug, Clone, PartialEq)]
pub enum Transform {
    /// Fresh identifier from the runtime id generator.
    Uuid,
    /// Current time, RFC 3339.
    Now,
    /// Current time, epoch milliseconds.
    Timestamp,
    /// Current date, `YYYY-MM-DD`.
    Today,
    /// Context lookup with optional fallback.
    FromContext { key: String, default: Option<Value> },
    /// Name not in the registry; fails resolution.
    Unknown(String),
}

impl Transform {
    fn parse(name: &str, obj: &Map<String, Value>) -> Self {
        match name {
            "uuid" => Transform::Uuid,
            "now" => Transform::Now,
            "timestamp" => Transform::Timestamp,
            "today" => Transform::Today,
            "fromContext" | "from_context" => match obj.get("key").and_then(Value::as_str) {
                Some(key) => Transform::FromContext {
                    key: key.to_string(),
                    default: obj.get("default").cloned(),
                },
                None => Transform::Unknown(name.to_string()),
            },
            other => Transform::Unknown(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Transform::Uuid => "uuid",
            Transform::Now => "now",
            Transform::Timestamp => "timestamp",
            Transform::Today => "today",
            Transform::FromContext { .. } => "fromContext",
            Transform::Unknown(name) => name,
        }
    }
}

/// One input value of a request step.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueExpr {
    Literal(Value),
    ContextRef { key: String, default: Option<Value> },
    Transform(Transform),
    /// Legacy script text. Recognised so it is never sent as a literal, and
    /// never evaluated.
    Script(String),
}

impl ValueExpr {
    pub fn literal(value: impl Into<Value>) -> Self {
        ValueExpr::Literal(value.into())
    }

    pub fn key(key: impl Into<String>) -> Self {
        ValueExpr::ContextRef {
            key: key.into(),
            default: None,
        }
    }

    pub fn key_or(key: impl Into<String>, default: impl Into<Value>) -> Self {
        ValueExpr::ContextRef {
            key: key.into(),
            default: Some(default.into()),
        }
    }

    pub fn from_value(value: Value) -> Self {
        match value {
            Value::String(s) if looks_like_script(&s) => ValueExpr::Script(s),
            Value::Object(obj) => {
                if let Some(name) = obj.get(TRANSFORM_MARKER).and_then(Value::as_str) {
                    return ValueExpr::Transform(Transform::parse(name, &obj));
                }
                let is_ref = obj.get("key").is_some_and(Value::is_string)
                    && obj.keys().all(|k| k == "key" || k == "default");
                if is_ref {
                    let key = obj
                        .get("key")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string();
                    return ValueExpr::ContextRef {
                        key,
                        default: obj.get("default").cloned(),
                    };
                }
                ValueExpr::Literal(Value::Object(obj))
            }
            other => ValueExpr::Literal(other),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            ValueExpr::Literal(v) => v.clone(),
            ValueExpr::ContextRef { key, default } => {
                let mut obj = Map::new();
                obj.insert("key".into(), Value::String(key.clone()));
                if let Some(d) = default {
                    obj.insert("default".into(), d.clone());
                }
                Value::Object(obj)
            }
            ValueExpr::Transform(t) => {
                let mut obj = Map::new();
                obj.insert(TRANSFORM_MARKER.into(), Value::String(t.name().to_string()));
                if let Transform::FromContext { key, default } = t {
                    obj.insert("key".into(), Value::String(key.clone()));
                    if let Some(d) = default {
                        obj.insert("default".into(), d.clone());
                    }
                }
                Value::Object(obj)
            }
            ValueExpr::Script(s) => Value::String(s.clone()),
        }
    }

    /// Context key this expression reads, if any.
    pub fn context_key(&self) -> Option<&str> {
        match self {
            ValueExpr::ContextRef { key, .. }
            | ValueExpr::Transform(Transform::FromContext { key, .. }) => Some(key),
            _ => None,
        }
    }
}

/// `function (...) {...}`, `function name(...)`, `(a, b) => ...`, `ctx => ...`.
pub fn looks_like_script(s: &str) -> bool {
    let t = s.trim();
    if let Some(rest) = t.strip_prefix("function") {
        return rest.starts_with(|c: char| c.is_whitespace() || c == '(');
    }
    let Some((head, _)) = t.split_once("=>") else {
        return false;
    };
    let head = head.trim();
    let head = head.strip_prefix("async").map(str::trim).unwrap_or(head);
    if head.starts_with('(') && head.ends_with(')') {
        return true;
    }
    !head.is_empty()
        && head
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        && !head.starts_with(|c: char| c.is_ascii_digit())
}

impl Serialize for ValueExpr {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ValueExpr {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(ValueExpr::from_value(Value::deserialize(deserializer)?))
    }
}

/// Copies a value out of a successful response into the context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteBack {
    /// Dot path into the envelope's `data`; empty means the whole `data`.
    #[serde(default)]
    pub from: String,
    /// Destination context key.
    pub to: String,
}

fn default_should_await() -> bool {
    true
}

/// One FO call template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestStep {
    /// Output slot: on success the step's `data` is stored under this key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(alias = "workflowid", alias = "workflow_id")]
    pub workflow_id: String,
    #[serde(default, alias = "learnapi", alias = "learn_api", skip_serializing_if = "Option::is_none")]
    pub learn_api: Option<String>,
    #[serde(default, alias = "usemicroservice", alias = "use_microservice", skip_serializing_if = "Option::is_none")]
    pub use_microservice: Option<bool>,
    #[serde(default = "default_should_await", alias = "shouldawait", alias = "should_await")]
    pub should_await: bool,
    #[serde(default)]
    pub critical: bool,
    #[serde(default)]
    pub input: Map<String, Value>,
    #[serde(default, alias = "write_back", skip_serializing_if = "Vec::is_empty")]
    pub write_back: Vec<WriteBack>,
}

impl RequestStep {
    pub fn new(workflow_id: impl Into<String>) -> Self {
        Self {
            id: None,
            workflow_id: workflow_id.into(),
            learn_api: None,
            use_microservice: None,
            should_await: true,
            critical: false,
            input: Map::new(),
            write_back: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_input(mut self, field: impl Into<String>, expr: ValueExpr) -> Self {
        self.input.insert(field.into(), expr.to_value());
        self
    }

    pub fn with_write_back(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.write_back.push(WriteBack {
            from: from.into(),
            to: to.into(),
        });
        self
    }

    pub fn critical(mut self) -> Self {
        self.critical = true;
        self
    }

    pub fn detached(mut self) -> Self {
        self.should_await = false;
        self
    }

    /// Input expressions in declaration order.
    pub fn input_exprs(&self) -> impl Iterator<Item = (&String, ValueExpr)> {
        self.input
            .iter()
            .map(|(k, v)| (k, ValueExpr::from_value(v.clone())))
    }

    /// Context keys this step reads.
    pub fn reads(&self) -> BTreeSet<String> {
        self.input_exprs()
            .filter_map(|(_, e)| e.context_key().map(str::to_string))
            .collect()
    }

    /// Context keys this step writes on success.
    pub fn writes(&self) -> BTreeSet<String> {
        let mut keys: BTreeSet<String> = self.write_back.iter().map(|w| w.to.clone()).collect();
        if let Some(id) = &self.id {
            keys.insert(id.clone());
        }
        keys
    }
}

/// Named, ordered array of steps.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionGroup {
    pub steps: Vec<RequestStep>,
}

impl ExecutionGroup {
    pub fn new(steps: Vec<RequestStep>) -> Self {
        Self { steps }
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Keys read from outside the group: a key read by a step after an
    /// earlier step of the same group writes it is internal chaining.
    pub fn external_reads(&self) -> BTreeSet<String> {
        let mut written = BTreeSet::new();
        let mut reads = BTreeSet::new();
        for step in &self.steps {
            for key in step.reads() {
                if !written.contains(&key) {
                    reads.insert(key);
                }
            }
            written.extend(step.writes());
        }
        reads
    }

    pub fn writes(&self) -> BTreeSet<String> {
        self.steps.iter().flat_map(RequestStep::writes).collect()
    }
}

/// Ordered mapping of group name to group. Declaration order is the order
/// in which concurrent groups' writes are merged.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WorkflowGraph {
    groups: Vec<(String, ExecutionGroup)>,
}

impl WorkflowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a group; a replaced group keeps its position.
    pub fn insert(&mut self, name: impl Into<String>, group: ExecutionGroup) {
        let name = name.into();
        if let Some(slot) = self.groups.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = group;
        } else {
            self.groups.push((name, group));
        }
    }

    pub fn with_group(mut self, name: impl Into<String>, group: ExecutionGroup) -> Self {
        self.insert(name, group);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ExecutionGroup> {
        self.groups.iter().find(|(n, _)| n == name).map(|(_, g)| g)
    }

    pub fn groups(&self) -> impl Iterator<Item = (&str, &ExecutionGroup)> {
        self.groups.iter().map(|(n, g)| (n.as_str(), g))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Build from a JSON object, skipping (and logging) groups whose steps do
    /// not decode. A single step object is accepted as a one-step group.
    pub fn from_value(value: &Value) -> Self {
        let mut graph = WorkflowGraph::new();
        let Some(obj) = value.as_object() else {
            return graph;
        };
        for (name, raw) in obj {
            let raw = match raw {
                Value::Object(_) => Value::Array(vec![raw.clone()]),
                other => other.clone(),
            };
            match serde_json::from_value::<ExecutionGroup>(raw) {
                Ok(group) => graph.insert(name.clone(), group),
                Err(e) => {
                    tracing::warn!(group = %name, error = %e, "skipping undecodable execution group");
                }
            }
        }
        graph
    }

    pub fn to_value(&self) -> Value {
        let mut obj = Map::new();
        for (name, group) in &self.groups {
            obj.insert(
                name.clone(),
                serde_json::to_value(group).unwrap_or(Value::Array(Vec::new())),
            );
        }
        Value::Object(obj)
    }
}

impl Serialize for WorkflowGraph {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for WorkflowGraph {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(WorkflowGraph::from_value(&value))
    }
}

/// Resolve a string-encoded graph (`txFo`). Malformed input yields an empty
/// graph.
pub fn parse_workflow_graph(raw: Option<&str>) -> WorkflowGraph {
    let parsed = SchemaResolver::resolve(raw, ConfigShape::Object);
    WorkflowGraph::from_value(&parsed.value)
}
