//! Error taxonomy shared by every workflow
//!
//! Each variant is a terminal outcome for the call that produced it. The
//! HTTP boundary turns them into a machine-readable kind plus a message.

use common::error::DatabaseError;
use thiserror::Error;

/// Error returned by workflow operations
#[derive(Error, Debug)]
pub enum WorkflowError {
    /// Malformed or missing input
    #[error("{0}")]
    Validation(String),

    /// Unknown role, user, request, project or donation
    #[error("{0}")]
    NotFound(String),

    /// Already-terminal workflow state or duplicate record
    #[error("{0}")]
    Conflict(String),

    /// Caller lacks the authority for this transition
    #[error("{0}")]
    Permission(String),

    /// Project has no open participant slot left
    #[error("{0}")]
    Capacity(String),

    /// Target is not in a state that accepts the operation
    #[error("{0}")]
    State(String),

    /// Storage failure
    #[error("Storage error: {0}")]
    Storage(#[from] DatabaseError),

    /// Unexpected internal failure (e.g. password hashing)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl WorkflowError {
    /// Stable machine-readable error kind
    pub fn kind(&self) -> &'static str {
        match self {
            WorkflowError::Validation(_) => "validation",
            WorkflowError::NotFound(_) => "not_found",
            WorkflowError::Conflict(_) => "conflict",
            WorkflowError::Permission(_) => "permission",
            WorkflowError::Capacity(_) => "capacity",
            WorkflowError::State(_) => "state",
            WorkflowError::Storage(_) | WorkflowError::Internal(_) => "internal",
        }
    }

    pub(crate) fn not_found(entity: &str, id: impl std::fmt::Display) -> Self {
        WorkflowError::NotFound(format!("{} {} not found", entity, id))
    }
}

/// Type alias for workflow results
pub type WorkflowResult<T> = Result<T, WorkflowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_are_stable() {
        assert_eq!(WorkflowError::Validation("x".into()).kind(), "validation");
        assert_eq!(WorkflowError::not_found("project", 7).kind(), "not_found");
        assert_eq!(WorkflowError::Conflict("x".into()).kind(), "conflict");
        assert_eq!(WorkflowError::Permission("x".into()).kind(), "permission");
        assert_eq!(WorkflowError::Capacity("x".into()).kind(), "capacity");
        assert_eq!(WorkflowError::State("x".into()).kind(), "state");
        assert_eq!(WorkflowError::Internal("x".into()).kind(), "internal");
    }

    #[test]
    fn test_not_found_message() {
        let err = WorkflowError::not_found("role request", "abc");
        assert_eq!(err.to_string(), "role request abc not found");
    }
}
