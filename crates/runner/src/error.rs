//! Runner error types.

use quasar_automation::DefinitionError;
use quasar_cache::CacheError;
use quasar_core::{AutomationId, RunId};
use quasar_run::RunError;
use thiserror::Error;

/// Errors surfaced by the run service.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// No automation is registered under the id.
    #[error("unknown automation: {0}")]
    UnknownAutomation(AutomationId),

    /// The run is neither active nor queued.
    #[error("run {0} is not active")]
    NotActive(RunId),

    /// The automation definition failed validation.
    #[error(transparent)]
    Definition(#[from] DefinitionError),

    /// A run-state operation failed.
    #[error(transparent)]
    Run(#[from] RunError),

    /// The run cache failed.
    #[error(transparent)]
    Cache(#[from] CacheError),
}
