//! Resolver error types.

use thiserror::Error;

/// Errors raised while resolving templates or runtime paths.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpressionError {
    /// A `{{key}}` placeholder named a variable that is not declared.
    #[error("unknown variable: {0}")]
    UnknownVariable(String),

    /// A template contained `{{` with no matching `}}`.
    #[error("unclosed '{{{{' at offset {0}")]
    UnclosedPlaceholder(usize),

    /// A path segment could not be parsed.
    #[error("path {path:?}: invalid segment {segment:?}")]
    InvalidSegment {
        /// The full path being parsed.
        path: String,
        /// The offending segment text.
        segment: String,
    },

    /// A key segment did not exist in the object being traversed.
    #[error("path {path:?}: key {segment:?} not found")]
    MissingKey {
        /// The full path being resolved.
        path: String,
        /// The missing key.
        segment: String,
    },

    /// An array index was out of bounds.
    #[error("path {path:?}: index {index} out of bounds (len {len})")]
    IndexOutOfBounds {
        /// The full path being resolved.
        path: String,
        /// The requested index.
        index: usize,
        /// The array length.
        len: usize,
    },

    /// A segment tried to descend into a scalar value.
    #[error("path {path:?}: cannot descend into {kind} at segment {segment:?}")]
    NotTraversable {
        /// The full path being resolved.
        path: String,
        /// The segment that failed.
        segment: String,
        /// JSON kind of the value that blocked traversal.
        kind: &'static str,
    },

    /// A `{{faker.X}}` token named an unknown generator.
    #[error("unknown faker generator: {0}")]
    UnknownFaker(String),
}
