//! The run cache trait.

use std::time::Duration;

use async_trait::async_trait;
use quasar_core::RunId;
use quasar_run::RunStatus;

use crate::error::CacheError;

/// Fast-path status mirror and admission accounting for runs.
#[async_trait]
pub trait RunCache: Send + Sync {
    /// Record a run's live status.
    async fn set_run_status(&self, id: RunId, status: RunStatus) -> Result<(), CacheError>;

    /// Record a status that expires after `ttl` (used for terminal
    /// states).
    async fn set_run_status_with_ttl(
        &self,
        id: RunId,
        status: RunStatus,
        ttl: Duration,
    ) -> Result<(), CacheError>;

    /// The live status, `None` once evicted or never cached.
    async fn get_run_status(&self, id: RunId) -> Result<Option<RunStatus>, CacheError>;

    /// Current number of running runs.
    async fn running_count(&self) -> Result<usize, CacheError>;

    /// Atomically claim a concurrency slot when `running < ceiling`.
    ///
    /// Returns `true` (and increments the counter) on success; `false`
    /// without side effects at capacity.
    async fn try_acquire_slot(&self, ceiling: usize) -> Result<bool, CacheError>;

    /// Release a concurrency slot on terminal transition.
    async fn release_slot(&self) -> Result<(), CacheError>;

    /// Append a run to the admission queue.
    async fn queue_push(&self, id: RunId) -> Result<(), CacheError>;

    /// Pop the queue head, if any.
    async fn queue_pop(&self) -> Result<Option<RunId>, CacheError>;

    /// Current queue length.
    async fn queue_len(&self) -> Result<usize, CacheError>;
}
