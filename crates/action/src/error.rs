//! Action error types.
//!
//! One enum covers every failure class an action can produce. An error
//! aborts the remaining steps of the current user only; other users of
//! the run continue.

use quasar_driver::DriverError;
use quasar_expression::ExpressionError;
use quasar_storage::StorageError;
use thiserror::Error;

/// Errors raised while executing a single action.
#[derive(Debug, Error)]
pub enum ActionError {
    /// Malformed config, missing required field, bad value.
    #[error("validation: {0}")]
    Validation(String),

    /// No handler is registered for the action's type key.
    #[error("unknown action type: {0}")]
    UnknownType(String),

    /// A browser driver operation failed.
    #[error(transparent)]
    Driver(#[from] DriverError),

    /// An HTTP request failed or returned a non-success status.
    #[error("http {method} {url}: {reason}{status_suffix}", status_suffix = fmt_status(.status))]
    Http {
        /// Request method.
        method: String,
        /// Request URL (after template expansion).
        url: String,
        /// Response status, when a response arrived.
        status: Option<u16>,
        /// Elapsed time until failure.
        elapsed_ms: u64,
        /// Failure description.
        reason: String,
    },

    /// An object storage operation failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Template expansion or runtime-path lookup failed.
    #[error(transparent)]
    Template(#[from] ExpressionError),

    /// The run was cancelled while this action was pending or running.
    #[error("cancelled")]
    Cancelled,

    /// A bounded loop exhausted its iteration or time budget with
    /// `fail_on_force_stop` set.
    #[error("loop force-stopped after {iterations} iterations")]
    ForceStop {
        /// Iterations completed before the stop.
        iterations: usize,
    },
}

fn fmt_status(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" (status {code})"),
        None => String::new(),
    }
}

impl ActionError {
    /// Returns `true` for cooperative cancellation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Shorthand for a validation failure.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}
