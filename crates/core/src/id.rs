//! Unique identifiers for quasar entities.
//!
//! All ID types are `Copy` (16 bytes, stack-allocated) and support:
//! - `v4()` for random UUID generation
//! - `nil()` for zero-valued default
//! - `parse(&str)` for string parsing
//! - Full serde support (serializes as UUID string)
//! - `Display`, `FromStr`, `Eq`, `Ord`, `Hash`

use domain_key::define_uuid;

// Re-export for downstream parse error handling
pub use domain_key::UuidParseError;

// Entity identifiers — UUID-based, Copy, 16 bytes each
define_uuid!(pub OrganizationIdDomain => OrganizationId);
define_uuid!(pub ProjectIdDomain => ProjectId);
define_uuid!(pub AutomationIdDomain => AutomationId);
define_uuid!(pub StepIdDomain => StepId);
define_uuid!(pub ActionIdDomain => ActionId);
define_uuid!(pub RunIdDomain => RunId);
