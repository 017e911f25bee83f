//! Variable resolution for automation configs.
//!
//! Action configs are free-form JSON documents whose string leaves may
//! embed `{{...}}` placeholders. This crate owns the per-user
//! [`VariableContext`] those placeholders resolve against, the dotted-path
//! lookup over runtime value trees, and the fake-data generators used by
//! dynamic variables.

pub mod context;
pub mod error;
pub mod faker;
pub mod path;
mod template;

pub use context::{VariableContext, VariableScope};
pub use error::ExpressionError;
pub use path::{PathSegment, lookup, parse_path};

/// Result alias for resolver operations.
pub type ExpressionResult<T> = Result<T, ExpressionError>;
