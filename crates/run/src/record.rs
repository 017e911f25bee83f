//! The durable run record.

use chrono::{DateTime, Utc};
use quasar_core::{AutomationId, RunId};
use serde::{Deserialize, Serialize};

use crate::error::RunError;
use crate::event::RunEvent;
use crate::status::{RunStatus, can_transition};

/// One execution of an automation, as persisted by the repository.
///
/// Invariants, enforced by [`advance`](Self::advance):
/// - status is monotone (no terminal state ever transitions);
/// - `end_time` is set iff the status is terminal;
/// - `start_time <= end_time` when both are present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    /// Run identifier.
    pub id: RunId,
    /// The automation this run executes.
    pub automation_id: AutomationId,
    /// Lifecycle status.
    pub status: RunStatus,
    /// When the run was created.
    pub created_at: DateTime<Utc>,
    /// Stamped on the transition into `running`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    /// Stamped on the transition into a terminal status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// First user error, or a summary when several users failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Coalesced log and error events (the durable timeline).
    #[serde(default)]
    pub logs: Vec<RunEvent>,
    /// Public URLs of produced artifacts.
    #[serde(default)]
    pub output_files: Vec<String>,
    /// Events dropped by the live bus for slow subscribers.
    #[serde(default)]
    pub dropped_events: u64,
}

impl RunRecord {
    /// Create a record in the given initial status (`pending` for
    /// admitted runs, `queued` for deferred ones).
    #[must_use]
    pub fn new(automation_id: AutomationId, status: RunStatus) -> Self {
        Self {
            id: RunId::v4(),
            automation_id,
            status,
            created_at: Utc::now(),
            start_time: None,
            end_time: None,
            error_message: None,
            logs: Vec::new(),
            output_files: Vec::new(),
            dropped_events: 0,
        }
    }

    /// Advance the status, validating the transition and stamping
    /// `start_time` / `end_time`.
    pub fn advance(&mut self, to: RunStatus) -> Result<(), RunError> {
        if !can_transition(self.status, to) {
            return Err(RunError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        let now = Utc::now();
        if to == RunStatus::Running {
            self.start_time = Some(now);
        }
        if to.is_terminal() {
            self.end_time = Some(now);
        }
        self.status = to;
        Ok(())
    }

    /// Append a coalesced event to the durable timeline.
    pub fn push_log(&mut self, event: RunEvent) {
        self.logs.push(event);
    }

    /// Record a produced artifact URL.
    pub fn push_output_file(&mut self, url: impl Into<String>) {
        self.output_files.push(url.into());
    }

    /// Total run duration, when both timestamps are present.
    #[must_use]
    pub fn duration(&self) -> Option<chrono::Duration> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }
}
