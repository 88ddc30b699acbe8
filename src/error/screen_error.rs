//! Errors of screen-level operations.

use thiserror::Error;

use crate::response::UserFacingError;

/// Failure of a screen-level operation (menu, operation matrix, table page).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScreenError {
    #[error("Workflow group not configured: {0}")]
    MissingGroup(String),
    #[error("{}", .0.info)]
    Backend(UserFacingError),
    /// The session must be torn down.
    #[error("Session ended: {}", .0.info)]
    ForceLogout(UserFacingError),
    /// A newer request on the same handle superseded this one.
    #[error("Superseded by a newer request")]
    Stale,
    #[error("No operation row for role {role_id} and command {command_id}")]
    UnknownCell { role_id: String, command_id: String },
    #[error("Page size must be greater than zero")]
    InvalidPageSize,
}

impl ScreenError {
    pub fn user_error(&self) -> Option<&UserFacingError> {
        match self {
            ScreenError::Backend(e) | ScreenError::ForceLogout(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_force_logout(&self) -> bool {
        matches!(self, ScreenError::ForceLogout(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_uses_info() {
        let err = ScreenError::Backend(UserFacingError {
            info: "Role is locked".into(),
            execute_id: Some("ex-9".into()),
            key: None,
        });
        assert_eq!(err.to_string(), "Role is locked");
        assert_eq!(err.user_error().and_then(|e| e.execute_id.as_deref()), Some("ex-9"));
        assert!(!ScreenError::Stale.is_force_logout());
    }
}
