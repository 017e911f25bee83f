//! Storage error types.

use thiserror::Error;

/// Errors from object storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The key does not name a stored object.
    #[error("object not found: {0}")]
    NotFound(String),

    /// A key escapes the store's namespace (e.g. `..` segments).
    #[error("invalid object key: {0}")]
    InvalidKey(String),

    /// An underlying I/O failure.
    #[error("storage io: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(
            StorageError::NotFound("a/b.png".into()).to_string(),
            "object not found: a/b.png"
        );
        assert_eq!(
            StorageError::InvalidKey("../etc".into()).to_string(),
            "invalid object key: ../etc"
        );
    }
}
