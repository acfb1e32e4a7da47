use thiserror::Error;

use crate::domain::{ClassroomId, GroupId};

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Session group not found: {0}")]
    GroupNotFound(GroupId),

    #[error("Classroom not found: {0}")]
    ClassroomNotFound(ClassroomId),

    #[error("Validation error: {0}")]
    Validation(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = CoreError::GroupNotFound(GroupId(7));
        assert!(error.to_string().contains('7'));
    }
}
