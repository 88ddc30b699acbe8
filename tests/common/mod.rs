#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::Notify;

use xconsole::{DispatchRequest, Transport, TransportError};

pub fn ok(data: Value) -> Value {
    json!({"status": 200, "payload": {"dataresponse": {"data": data, "errors": []}}})
}

pub fn backend_error(key: &str, execute_id: &str, info: &str) -> Value {
    json!({
        "status": 200,
        "payload": {"dataresponse": {"errors": [{"key": key, "execute_id": execute_id, "info": info}]}}
    })
}

type Responder = Box<dyn Fn(&DispatchRequest) -> Value + Send + Sync>;

/// Transport that holds every call until its gate is opened. The gate of a
/// call is the string form of one input field.
pub struct GatedTransport {
    gate_field: String,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    started: AtomicUsize,
    respond: Responder,
}

impl GatedTransport {
    pub fn new(
        gate_field: &str,
        respond: impl Fn(&DispatchRequest) -> Value + Send + Sync + 'static,
    ) -> Self {
        Self {
            gate_field: gate_field.to_string(),
            gates: Mutex::new(HashMap::new()),
            started: AtomicUsize::new(0),
            respond: Box::new(respond),
        }
    }

    fn gate(&self, key: &str) -> Arc<Notify> {
        self.gates
            .lock()
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Notify::new()))
            .clone()
    }

    pub fn open(&self, key: &str) {
        self.gate(key).notify_one();
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub async fn wait_started(&self, count: usize) {
        while self.started() < count {
            tokio::task::yield_now().await;
        }
    }
}

#[async_trait]
impl Transport for GatedTransport {
    async fn invoke(&self, request: &DispatchRequest) -> Result<Value, TransportError> {
        let key = match request.field(&self.gate_field) {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        };
        let gate = self.gate(&key);
        self.started.fetch_add(1, Ordering::SeqCst);
        gate.notified().await;
        Ok((self.respond)(request))
    }
}
