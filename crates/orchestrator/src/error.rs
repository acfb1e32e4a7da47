use classworks_core::{ClassroomId, CoreError, GroupId, RejectReason};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Session group not found: {0}")]
    GroupNotFound(GroupId),

    #[error("Classroom not found: {0}")]
    ClassroomNotFound(ClassroomId),

    #[error("No active session for group: {0}")]
    NoActiveSession(GroupId),

    #[error("Validation failed: {0}")]
    Validation(RejectReason),

    #[error(transparent)]
    Core(#[from] CoreError),
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_carries_reason() {
        let error = OrchestratorError::Validation(RejectReason::NoStudents);
        assert!(error.to_string().contains("at least one student"));
    }
}
