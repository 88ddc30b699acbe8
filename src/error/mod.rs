//! Error types for the console core.
//!
//! - [`ConsoleError`]: Configuration loading and tool-level errors.
//! - [`StepError`]: Per-step failures carried inside orchestration outcomes.
//! - [`ResolutionError`]: A step input could not be bound to the context.
//! - [`TransportError`]: The transport collaborator failed before replying.
//! - [`ScreenError`]: Menu, operation-matrix and table operations.
//! - [`ErrorContext`]: Structured error metadata (code, retryability, severity).

pub mod console_error;
pub mod error_context;
pub mod screen_error;
pub mod step_error;

pub use console_error::ConsoleError;
pub use error_context::{ErrorCode, ErrorContext, ErrorRetryability, ErrorSeverity};
pub use screen_error::ScreenError;
pub use step_error::{ResolutionError, StepError, TransportError};

/// Convenience alias for console-level results.
pub type ConsoleResult<T> = Result<T, ConsoleError>;
