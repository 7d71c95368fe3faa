use thiserror::Error;

/// An assignee name the classifier produced that matches no enabled roster
/// member. Carries the valid names so the reply can list them.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("assignee `{requested}` not found in directory")]
pub struct AssigneeResolutionError {
    pub requested: String,
    pub valid_assignees: Vec<String>,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InputValidationError {
    #[error("description cannot be empty")]
    EmptyDescription,
    #[error("description exceeds maximum length ({chars} chars)")]
    DescriptionTooLong { chars: usize },
}

/// Normalized failure of the record-persistence system. Both transport-level
/// errors and body-encoded error envelopes decode into this one taxonomy
/// before any retry or propagation logic looks at them.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PersistenceError {
    #[error("persistence authentication failed")]
    Auth,
    #[error("persistence validation failed: {}", messages.join("; "))]
    Validation { messages: Vec<String> },
    #[error("persistence resource not found")]
    NotFound,
    #[error("persistence rate limited")]
    RateLimited { retry_after_secs: Option<u64> },
    #[error("persistence server error (status {status})")]
    Server { status: u16 },
    #[error("persistence request timed out")]
    Timeout,
    #[error("persistence network error: {0}")]
    Network(String),
    #[error("persistence error: {0}")]
    Unknown(String),
}

impl PersistenceError {
    /// Bridge to the retry policy's outcome classification.
    pub fn as_call_outcome(&self) -> crate::retry::CallOutcome {
        use crate::retry::CallOutcome;
        match self {
            Self::Auth => CallOutcome::HttpStatus(401),
            Self::Validation { .. } => CallOutcome::HttpStatus(417),
            Self::NotFound => CallOutcome::HttpStatus(404),
            Self::RateLimited { retry_after_secs: Some(secs) } => {
                CallOutcome::ServerSuppliedDelay(*secs)
            }
            Self::RateLimited { retry_after_secs: None } => CallOutcome::HttpStatus(429),
            Self::Server { status } => CallOutcome::HttpStatus(*status),
            Self::Timeout => CallOutcome::Timeout,
            Self::Network(_) => CallOutcome::NetworkError,
            Self::Unknown(_) => CallOutcome::HttpStatus(400),
        }
    }
}

/// Terminal pipeline failure. Every variant maps to exactly one user-facing
/// reply and one failed audit entry; none of them escape the orchestrator.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error(transparent)]
    Validation(#[from] InputValidationError),
    #[error(transparent)]
    AssigneeNotFound(#[from] AssigneeResolutionError),
    #[error("classification failed: {0}")]
    Classification(String),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

#[cfg(test)]
mod tests {
    use crate::retry::CallOutcome;

    use super::*;

    #[test]
    fn persistence_failures_bridge_to_retry_outcomes() {
        assert_eq!(PersistenceError::Auth.as_call_outcome(), CallOutcome::HttpStatus(401));
        assert_eq!(
            PersistenceError::RateLimited { retry_after_secs: Some(9) }.as_call_outcome(),
            CallOutcome::ServerSuppliedDelay(9)
        );
        assert_eq!(
            PersistenceError::Server { status: 502 }.as_call_outcome(),
            CallOutcome::HttpStatus(502)
        );
        assert_eq!(PersistenceError::Timeout.as_call_outcome(), CallOutcome::Timeout);
    }

    #[test]
    fn validation_error_joins_server_messages() {
        let error = PersistenceError::Validation {
            messages: vec!["Customer is mandatory".to_string(), "Date is invalid".to_string()],
        };
        assert_eq!(
            error.to_string(),
            "persistence validation failed: Customer is mandatory; Date is invalid"
        );
    }
}
