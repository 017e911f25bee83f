//! Cache error types.

use thiserror::Error;

/// Errors from the run cache backend.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The backing store failed (connection loss, script error, ...).
    #[error("cache backend: {0}")]
    Backend(String),
}
