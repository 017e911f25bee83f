//! Driver error types.

use thiserror::Error;

/// Result alias for driver operations.
pub type DriverResult<T> = Result<T, DriverError>;

/// Errors surfaced by a browser driver implementation.
#[derive(Debug, Clone, Error)]
pub enum DriverError {
    /// Navigation failed or timed out.
    #[error("navigation to {url} failed: {reason}")]
    Navigation {
        /// Target URL.
        url: String,
        /// Backend-reported reason.
        reason: String,
    },

    /// An element interaction failed.
    #[error("interaction with {selector:?} failed: {reason}")]
    Interaction {
        /// CSS selector of the target element.
        selector: String,
        /// Backend-reported reason.
        reason: String,
    },

    /// A wait exceeded its timeout.
    #[error("timed out after {ms}ms waiting for {what}")]
    Timeout {
        /// What was being waited on.
        what: String,
        /// The timeout that elapsed.
        ms: u64,
    },

    /// A user-supplied expression failed to evaluate in the page.
    #[error("evaluation failed: {0}")]
    Evaluation(String),

    /// The driver backend misbehaved (protocol error, lost session).
    #[error("driver backend: {0}")]
    Backend(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        let err = DriverError::Navigation {
            url: "https://x.io".into(),
            reason: "dns failure".into(),
        };
        assert_eq!(err.to_string(), "navigation to https://x.io failed: dns failure");

        let err = DriverError::Timeout {
            what: "selector #submit".into(),
            ms: 5000,
        };
        assert_eq!(err.to_string(), "timed out after 5000ms waiting for selector #submit");
    }
}
