//! The transport seam: the orchestrator never performs I/O itself.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::TransportError;

/// A fully bound FO call, produced fresh from a template for every dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchRequest {
    pub workflow_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub learn_api: Option<String>,
    #[serde(default)]
    pub use_microservice: bool,
    #[serde(default)]
    pub input: Map<String, Value>,
}

impl DispatchRequest {
    pub fn new(workflow_id: impl Into<String>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            learn_api: None,
            use_microservice: false,
            input: Map::new(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.input.get(name)
    }
}

/// Executes one FO call and returns the raw response body.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn invoke(&self, request: &DispatchRequest) -> Result<Value, TransportError>;
}

/// Transport answering from canned responses keyed by workflow id.
///
/// Each workflow id holds a queue; the last response repeats once the queue
/// is drained. Every request is recorded.
#[derive(Debug, Default)]
pub struct ReplayTransport {
    responses: Mutex<HashMap<String, VecDeque<Value>>>,
    calls: Mutex<Vec<DispatchRequest>>,
}

impl ReplayTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(self, workflow_id: impl Into<String>, response: Value) -> Self {
        self.push(workflow_id, response);
        self
    }

    pub fn push(&self, workflow_id: impl Into<String>, response: Value) {
        self.responses
            .lock()
            .entry(workflow_id.into())
            .or_default()
            .push_back(response);
    }

    /// Build from `{ "<workflowId>": envelope | [envelope, ...] }`.
    pub fn from_value(value: &Value) -> Self {
        let transport = Self::new();
        if let Some(obj) = value.as_object() {
            for (workflow_id, entry) in obj {
                match entry {
                    Value::Array(seq) => {
                        for response in seq {
                            transport.push(workflow_id.clone(), response.clone());
                        }
                    }
                    other => transport.push(workflow_id.clone(), other.clone()),
                }
            }
        }
        transport
    }

    pub fn calls(&self) -> Vec<DispatchRequest> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn calls_for(&self, workflow_id: &str) -> Vec<DispatchRequest> {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.workflow_id == workflow_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Transport for ReplayTransport {
    async fn invoke(&self, request: &DispatchRequest) -> Result<Value, TransportError> {
        self.calls.lock().push(request.clone());
        let mut responses = self.responses.lock();
        let queue = responses
            .get_mut(&request.workflow_id)
            .ok_or_else(|| TransportError::NoResponse(request.workflow_id.clone()))?;
        let response = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        response.ok_or_else(|| TransportError::NoResponse(request.workflow_id.clone()))
    }
}
