use thiserror::Error;

use crate::domain::{feedback::FeedbackError, session::SessionError};

/// Error as presented at the HTTP edge.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("not found: {message}")]
    NotFound { message: String },
    #[error("conflict: {message}")]
    Conflict { message: String },
    #[error("unprocessable: {message}")]
    Unprocessable { message: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String },
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl InterfaceError {
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::Conflict { .. } => 409,
            Self::Unprocessable { .. } => 422,
            Self::ServiceUnavailable { .. } => 503,
            Self::Internal { .. } => 500,
        }
    }

    /// Detail safe to hand back to callers. Storage and internal failures
    /// are summarized; the full error goes to the log.
    pub fn detail(&self) -> String {
        match self {
            Self::NotFound { message }
            | Self::Conflict { message }
            | Self::Unprocessable { message } => message.clone(),
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly.".to_string()
            }
            Self::Internal { .. } => "An unexpected internal error occurred.".to_string(),
        }
    }
}

impl From<SessionError> for InterfaceError {
    fn from(value: SessionError) -> Self {
        match value {
            SessionError::AlreadyExists { .. } => Self::Conflict { message: value.to_string() },
            SessionError::Storage(message) => Self::ServiceUnavailable { message },
            SessionError::CorruptState(message) => Self::Internal { message },
        }
    }
}

impl From<FeedbackError> for InterfaceError {
    fn from(value: FeedbackError) -> Self {
        Self::Unprocessable { message: value.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::{feedback::FeedbackError, session::SessionError};
    use crate::errors::InterfaceError;

    #[test]
    fn duplicate_session_maps_to_conflict() {
        let interface = InterfaceError::from(SessionError::AlreadyExists { id: "s1".to_owned() });

        assert_eq!(interface.status_code(), 409);
        assert_eq!(interface.detail(), "session `s1` already exists");
    }

    #[test]
    fn storage_failure_maps_to_service_unavailable_without_leaking_detail() {
        let interface =
            InterfaceError::from(SessionError::Storage("database is locked".to_owned()));

        assert_eq!(interface.status_code(), 503);
        assert!(!interface.detail().contains("locked"));
    }

    #[test]
    fn feedback_mismatch_maps_to_unprocessable() {
        let interface = InterfaceError::from(FeedbackError::ServiceNameMismatch {
            expected: "a".to_owned(),
            submitted: "b".to_owned(),
        });

        assert_eq!(interface.status_code(), 422);
        assert!(interface.detail().contains("service_name"));
    }

    #[test]
    fn corrupt_state_maps_to_internal() {
        let interface = InterfaceError::from(SessionError::CorruptState("[]".to_owned()));

        assert_eq!(interface.status_code(), 500);
        assert_eq!(interface.detail(), "An unexpected internal error occurred.");
    }
}
