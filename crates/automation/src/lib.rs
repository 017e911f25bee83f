//! Automation definition model.
//!
//! An automation is a tree: ordered steps, each holding an ordered list
//! of typed actions. Control-flow actions nest further action arrays
//! inside their config. This crate owns the serde model for the
//! canonical JSON document, structural validation (including the
//! nested-action depth limit), and deterministic id assignment on
//! export.

pub mod config;
pub mod definition;
pub mod error;
mod export;

pub use config::{
    AutomationConfig, MultiRunConfig, MultiRunMode, NotificationChannel, ScreenshotConfig,
    VariableKind, VariableSpec,
};
pub use definition::{
    ActionDef, AutomationDefinition, AutomationMeta, StepConfig, StepDefinition, StepPredicate,
};
pub use error::DefinitionError;
pub use export::MAX_ACTION_DEPTH;
