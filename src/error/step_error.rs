//! Per-step failures carried inside orchestration outcomes.

use thiserror::Error;

use super::error_context::{ErrorCode, ErrorContext, ErrorSeverity};
use crate::response::ErrorEntry;

/// Why a step's input could not be bound against the execution context.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error("Context key not found: {key} (input field '{field}')")]
    MissingKey { field: String, key: String },
    #[error("Script expressions are not executed (input field '{field}')")]
    UnsupportedScript { field: String },
    #[error("Unknown transform '{name}' (input field '{field}')")]
    UnknownTransform { field: String, name: String },
}

impl ResolutionError {
    pub fn field(&self) -> &str {
        match self {
            ResolutionError::MissingKey { field, .. }
            | ResolutionError::UnsupportedScript { field }
            | ResolutionError::UnknownTransform { field, .. } => field,
        }
    }
}

/// Failure of the transport collaborator before any envelope was produced.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Response decode error: {0}")]
    Decode(String),
    #[error("No response registered for workflow: {0}")]
    NoResponse(String),
}

/// Step-level failure. Never crosses the orchestrator boundary as a panic or
/// `Err`; it is carried inside a [`StepOutcome`](crate::engine::StepOutcome).
#[derive(Debug, Clone, Error)]
pub enum StepError {
    #[error("Resolution error: {0}")]
    Resolution(#[from] ResolutionError),
    #[error("Execution error: {}", .0.info)]
    Execution(ErrorEntry),
    #[error("Authentication error: {}", .0.info)]
    Auth(ErrorEntry),
}

impl StepError {
    pub fn is_auth(&self) -> bool {
        matches!(self, StepError::Auth(_))
    }

    /// Backend entry behind this error, if the failure came from an envelope.
    pub fn entry(&self) -> Option<&ErrorEntry> {
        match self {
            StepError::Execution(entry) | StepError::Auth(entry) => Some(entry),
            StepError::Resolution(_) => None,
        }
    }

    pub fn context(&self) -> ErrorContext {
        match self {
            StepError::Resolution(ResolutionError::MissingKey { .. }) => {
                ErrorContext::non_retryable(ErrorCode::VariableNotFound, self.to_string())
            }
            StepError::Resolution(_) => {
                ErrorContext::non_retryable(ErrorCode::UnsupportedScript, self.to_string())
            }
            StepError::Execution(entry) => {
                let code = match entry.key.as_deref() {
                    Some(crate::response::TRANSPORT_ERROR_KEY) => ErrorCode::NetworkError,
                    Some(crate::response::DECODE_ERROR_KEY) => ErrorCode::DecodeError,
                    _ => ErrorCode::ExecutionError,
                };
                let ctx = if code == ErrorCode::NetworkError {
                    ErrorContext::retryable(code, entry.info.clone())
                } else {
                    ErrorContext::non_retryable(code, entry.info.clone())
                };
                ctx.with_execute_id(entry.execute_id.clone())
            }
            StepError::Auth(entry) => {
                ErrorContext::non_retryable(ErrorCode::AuthenticationError, entry.info.clone())
                    .with_severity(ErrorSeverity::Fatal)
                    .with_execute_id(entry.execute_id.clone())
                    .with_http_status(401)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorRetryability;

    fn entry(key: Option<&str>) -> ErrorEntry {
        ErrorEntry {
            key: key.map(str::to_string),
            execute_id: Some("exec-9".into()),
            info: "boom".into(),
        }
    }

    #[test]
    fn test_resolution_error_display() {
        let err = ResolutionError::MissingKey {
            field: "MenuId".into(),
            key: "selectedMenuId".into(),
        };
        assert_eq!(
            err.to_string(),
            "Context key not found: selectedMenuId (input field 'MenuId')"
        );
        assert_eq!(err.field(), "MenuId");
    }

    #[test]
    fn test_step_error_context_codes() {
        let auth = StepError::Auth(entry(Some("401")));
        let ctx = auth.context();
        assert_eq!(ctx.code, ErrorCode::AuthenticationError);
        assert_eq!(ctx.severity, ErrorSeverity::Fatal);
        assert_eq!(ctx.execute_id.as_deref(), Some("exec-9"));

        let net = StepError::Execution(entry(Some(crate::response::TRANSPORT_ERROR_KEY)));
        assert_eq!(net.context().code, ErrorCode::NetworkError);
        assert_eq!(net.context().retryability, ErrorRetryability::Retryable);

        let exec = StepError::Execution(entry(None));
        assert_eq!(exec.context().code, ErrorCode::ExecutionError);
        assert!(!exec.is_auth());
        assert_eq!(exec.entry().map(|e| e.info.as_str()), Some("boom"));
    }
}
