//! Run-state error types.

use quasar_core::RunId;
use thiserror::Error;

use crate::status::RunStatus;

/// Errors from run-state operations.
#[derive(Debug, Error)]
pub enum RunError {
    /// A status transition is not valid for the current status.
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition {
        /// Current status.
        from: RunStatus,
        /// Attempted target status.
        to: RunStatus,
    },

    /// A referenced run does not exist.
    #[error("run not found: {0}")]
    NotFound(RunId),

    /// A run with the same id was already created.
    #[error("run already exists: {0}")]
    AlreadyExists(RunId),

    /// A serialization or deserialization error.
    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_transition_display() {
        let err = RunError::InvalidTransition {
            from: RunStatus::Completed,
            to: RunStatus::Running,
        };
        assert_eq!(err.to_string(), "invalid transition from completed to running");
    }

    #[test]
    fn not_found_display() {
        let id = RunId::v4();
        assert!(RunError::NotFound(id).to_string().contains("run not found"));
    }
}
