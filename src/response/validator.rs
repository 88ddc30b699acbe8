//! Classification of response envelopes into success, execution failure
//! and authentication failure.

use std::collections::HashSet;

use serde::Serialize;

use super::envelope::{ErrorEntry, ResponseEnvelope};
use crate::error::StepError;

/// Error keys that force a session teardown when no configuration overrides
/// them: the authentication code and the bad-request code.
pub const DEFAULT_AUTH_ERROR_KEYS: &[&str] = &["401", "400"];

/// Outcome of classifying one envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    Success,
    Execution(ErrorEntry),
    Auth(ErrorEntry),
}

impl Classification {
    pub fn is_success(&self) -> bool {
        matches!(self, Classification::Success)
    }

    pub fn into_step_error(self) -> Option<StepError> {
        match self {
            Classification::Success => None,
            Classification::Execution(entry) => Some(StepError::Execution(entry)),
            Classification::Auth(entry) => Some(StepError::Auth(entry)),
        }
    }
}

/// What the UI collaborator renders for a failed call: always derived from
/// `errors[0]` of the relevant envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserFacingError {
    pub info: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execute_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl From<&ErrorEntry> for UserFacingError {
    fn from(entry: &ErrorEntry) -> Self {
        Self {
            info: entry.info.clone(),
            execute_id: entry.execute_id.clone(),
            key: entry.key.clone(),
        }
    }
}

/// Shared envelope classification used by every screen.
#[derive(Debug, Clone)]
pub struct ResponseValidator {
    auth_keys: HashSet<String>,
}

impl Default for ResponseValidator {
    fn default() -> Self {
        Self::new(DEFAULT_AUTH_ERROR_KEYS.iter().map(|k| k.to_string()))
    }
}

impl ResponseValidator {
    pub fn new(auth_keys: impl IntoIterator<Item = String>) -> Self {
        Self {
            auth_keys: auth_keys.into_iter().collect(),
        }
    }

    pub fn is_auth_key(&self, key: &str) -> bool {
        self.auth_keys.contains(key)
    }

    /// Classify an envelope.
    ///
    /// Authentication wins over plain execution failures: `status == 401` or
    /// any error (at any nesting level) whose key is a designated auth code.
    /// Either way the carried entry is the envelope's first error.
    pub fn classify(&self, envelope: &ResponseEnvelope) -> Classification {
        let auth = envelope.status == 401
            || envelope
                .all_errors()
                .iter()
                .any(|e| e.key.as_deref().is_some_and(|k| self.is_auth_key(k)));
        if !auth && envelope.is_success() {
            return Classification::Success;
        }
        let first = envelope.first_error().cloned();
        if auth {
            return Classification::Auth(first.unwrap_or_else(|| ErrorEntry {
                key: Some("401".to_string()),
                execute_id: None,
                info: "unauthorized".to_string(),
            }));
        }
        Classification::Execution(first.unwrap_or_else(|| ErrorEntry {
            key: None,
            execute_id: None,
            info: format!("request failed with status {}", envelope.status),
        }))
    }

    pub fn user_error(&self, envelope: &ResponseEnvelope) -> Option<UserFacingError> {
        match self.classify(envelope) {
            Classification::Success => None,
            Classification::Execution(entry) | Classification::Auth(entry) => {
                Some(UserFacingError::from(&entry))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope(v: serde_json::Value) -> ResponseEnvelope {
        ResponseEnvelope::from_raw(v)
    }

    #[test]
    fn test_success() {
        let v = ResponseValidator::default();
        let env = envelope(json!({"status": 200, "payload": {"dataresponse": {"data": [], "errors": []}}}));
        assert_eq!(v.classify(&env), Classification::Success);
        assert!(v.user_error(&env).is_none());
    }

    #[test]
    fn test_status_not_200_is_failure() {
        let v = ResponseValidator::default();
        let env = envelope(json!({"status": 500}));
        match v.classify(&env) {
            Classification::Execution(entry) => assert!(entry.info.contains("500")),
            other => panic!("unexpected classification: {:?}", other),
        }
    }

    #[test]
    fn test_auth_key_with_status_200() {
        let v = ResponseValidator::default();
        let env = envelope(json!({
            "status": 200,
            "payload": {"dataresponse": {"errors": [{"key": "401", "execute_id": "e-1", "info": "session expired"}]}}
        }));
        match v.classify(&env) {
            Classification::Auth(entry) => assert_eq!(entry.execute_id.as_deref(), Some("e-1")),
            other => panic!("unexpected classification: {:?}", other),
        }
    }

    #[test]
    fn test_status_401_without_errors() {
        let v = ResponseValidator::default();
        let env = envelope(json!({"status": 401}));
        assert!(matches!(v.classify(&env), Classification::Auth(_)));
    }

    #[test]
    fn test_custom_auth_keys() {
        let v = ResponseValidator::new(vec!["AUTH_EXPIRED".to_string()]);
        let env = envelope(json!({
            "status": 200,
            "payload": {"dataresponse": {"errors": [{"key": "400", "info": "bad"}]}}
        }));
        assert!(matches!(v.classify(&env), Classification::Execution(_)));
        let env = envelope(json!({
            "status": 200,
            "payload": {"dataresponse": {"errors": [{"key": "AUTH_EXPIRED", "info": "x"}]}}
        }));
        assert!(matches!(v.classify(&env), Classification::Auth(_)));
    }

    #[test]
    fn test_user_error_uses_first_entry() {
        let v = ResponseValidator::default();
        let env = envelope(json!({
            "status": 200,
            "payload": {"dataresponse": {"errors": [
                {"key": "E1", "execute_id": "id-1", "info": "first"},
                {"key": "E2", "execute_id": "id-2", "info": "second"}
            ]}}
        }));
        let err = v.user_error(&env).unwrap();
        assert_eq!(err.info, "first");
        assert_eq!(err.execute_id.as_deref(), Some("id-1"));
    }

    #[test]
    fn test_auth_entry_after_first_still_reports_first() {
        let v = ResponseValidator::default();
        let env = envelope(json!({
            "status": 200,
            "payload": {"dataresponse": {"errors": [
                {"key": "E1", "execute_id": "id-1", "info": "first"},
                {"key": "401", "execute_id": "id-2", "info": "second"}
            ]}}
        }));
        match v.classify(&env) {
            Classification::Auth(entry) => assert_eq!(entry.info, "first"),
            other => panic!("unexpected classification: {:?}", other),
        }
        let err = v.user_error(&env).unwrap();
        assert_eq!(err.info, "first");
        assert_eq!(err.execute_id.as_deref(), Some("id-1"));
    }
}
