//! Wire response envelope with tolerant decoding and nested `fo`/`bo`
//! results.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error key used for envelopes synthesised from transport failures.
pub const TRANSPORT_ERROR_KEY: &str = "TRANSPORT";
/// Error key used when a raw response is not an envelope at all.
pub const DECODE_ERROR_KEY: &str = "DECODE";

/// One entry of `dataresponse.errors`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ErrorEntry {
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_string")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_string")]
    pub execute_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_info")]
    pub info: String,
}

/// `payload.dataresponse` of an envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DataResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub errors: Vec<ErrorEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fo: Option<Vec<ResponseEnvelope>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bo: Option<Vec<ResponseEnvelope>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Payload {
    #[serde(default)]
    pub dataresponse: DataResponse,
}

/// The single wire contract returned by every backend call, at every level
/// of a chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ResponseEnvelope {
    #[serde(default)]
    pub status: u16,
    #[serde(default)]
    pub payload: Payload,
}

impl ResponseEnvelope {
    /// Decode a raw transport response. Missing members take their defaults;
    /// a value that is not an envelope becomes a status-0 envelope carrying a
    /// decode error, so the caller always gets something classifiable.
    pub fn from_raw(raw: Value) -> Self {
        match serde_json::from_value::<ResponseEnvelope>(raw) {
            Ok(envelope) => envelope,
            Err(e) => Self::failure(
                0,
                ErrorEntry {
                    key: Some(DECODE_ERROR_KEY.to_string()),
                    execute_id: None,
                    info: format!("malformed response envelope: {}", e),
                },
            ),
        }
    }

    pub fn success(data: Value) -> Self {
        Self {
            status: 200,
            payload: Payload {
                dataresponse: DataResponse {
                    data: Some(data),
                    ..DataResponse::default()
                },
            },
        }
    }

    pub fn failure(status: u16, entry: ErrorEntry) -> Self {
        Self {
            status,
            payload: Payload {
                dataresponse: DataResponse {
                    errors: vec![entry],
                    ..DataResponse::default()
                },
            },
        }
    }

    pub fn data(&self) -> Option<&Value> {
        self.payload.dataresponse.data.as_ref()
    }

    pub fn errors(&self) -> &[ErrorEntry] {
        &self.payload.dataresponse.errors
    }

    /// Nested `fo` then `bo` envelopes, in wire order.
    pub fn nested(&self) -> impl Iterator<Item = &ResponseEnvelope> {
        let dr = &self.payload.dataresponse;
        dr.fo
            .iter()
            .flatten()
            .chain(dr.bo.iter().flatten())
    }

    /// `status == 200 && errors.is_empty()`, applied at this level only.
    pub fn is_local_success(&self) -> bool {
        self.status == 200 && self.errors().is_empty()
    }

    /// Success rule applied uniformly to this envelope and every nested one.
    pub fn is_success(&self) -> bool {
        self.is_local_success() && self.nested().all(ResponseEnvelope::is_success)
    }

    /// First error in depth-first order: own errors before nested ones.
    pub fn first_error(&self) -> Option<&ErrorEntry> {
        self.errors()
            .first()
            .or_else(|| self.nested().find_map(ResponseEnvelope::first_error))
    }

    /// All error entries, depth first.
    pub fn all_errors(&self) -> Vec<&ErrorEntry> {
        let mut out: Vec<&ErrorEntry> = self.errors().iter().collect();
        for child in self.nested() {
            out.extend(child.all_errors());
        }
        out
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// Backends send codes both as strings and as numbers ("401" vs 401).
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

fn lenient_info<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s,
        Some(other) => other.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_raw_defaults() {
        let env = ResponseEnvelope::from_raw(json!({"status": 200}));
        assert!(env.is_success());
        assert!(env.data().is_none());
        assert!(env.errors().is_empty());
    }

    #[test]
    fn test_from_raw_numeric_key() {
        let env = ResponseEnvelope::from_raw(json!({
            "status": 200,
            "payload": {"dataresponse": {"errors": [{"key": 401, "info": "expired"}]}}
        }));
        assert!(!env.is_success());
        assert_eq!(env.errors()[0].key.as_deref(), Some("401"));
    }

    #[test]
    fn test_from_raw_not_an_envelope() {
        let env = ResponseEnvelope::from_raw(json!("gateway timeout"));
        assert_eq!(env.status, 0);
        assert_eq!(env.first_error().and_then(|e| e.key.as_deref()), Some(DECODE_ERROR_KEY));
    }

    #[test]
    fn test_null_errors_is_empty() {
        let env = ResponseEnvelope::from_raw(json!({
            "status": 200,
            "payload": {"dataresponse": {"data": [1], "errors": null}}
        }));
        assert!(env.is_success());
    }

    #[test]
    fn test_nested_failure_breaks_success() {
        let env = ResponseEnvelope::from_raw(json!({
            "status": 200,
            "payload": {"dataresponse": {
                "errors": [],
                "fo": [
                    {"status": 200, "payload": {"dataresponse": {"errors": []}}},
                    {"status": 500, "payload": {"dataresponse": {"errors": [{"execute_id": "x1", "info": "fo failed"}]}}}
                ]
            }}
        }));
        assert!(env.is_local_success());
        assert!(!env.is_success());
        let first = env.first_error().unwrap();
        assert_eq!(first.execute_id.as_deref(), Some("x1"));
        assert_eq!(env.all_errors().len(), 1);
    }
}
