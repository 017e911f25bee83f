//! Run status state machine.

use serde::{Deserialize, Serialize};

/// The lifecycle status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Admission was deferred; waiting for a concurrency slot.
    Queued,
    /// Admitted, not yet started.
    Pending,
    /// Actively executing users.
    Running,
    /// Every user completed successfully.
    Completed,
    /// At least one user failed.
    Failed,
    /// The run was cancelled before completing.
    Cancelled,
}

impl RunStatus {
    /// Returns `true` if the run has reached a final state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Returns `true` if the run completed successfully.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// Returns `true` if the transition from `from` to `to` is valid.
///
/// Statuses are monotone: no terminal state ever transitions again, and
/// a run never moves backwards through the lifecycle.
#[must_use]
pub fn can_transition(from: RunStatus, to: RunStatus) -> bool {
    matches!(
        (from, to),
        (RunStatus::Queued, RunStatus::Pending)
            | (RunStatus::Queued, RunStatus::Cancelled)
            | (RunStatus::Pending, RunStatus::Running)
            | (RunStatus::Pending, RunStatus::Cancelled)
            | (RunStatus::Running, RunStatus::Completed)
            | (RunStatus::Running, RunStatus::Failed)
            | (RunStatus::Running, RunStatus::Cancelled)
    )
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Queued => write!(f, "queued"),
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}
