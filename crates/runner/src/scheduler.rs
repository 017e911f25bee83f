//! Admission control.
//!
//! A process-wide cap on concurrently running runs, backed by the run
//! cache's atomic slot accounting. Triggers that find the cap reached
//! are queued; when a run terminates its slot either transfers to the
//! queue head (promotion) or is released.

use std::sync::Arc;

use quasar_cache::{CacheError, RunCache};
use quasar_core::RunId;
use tracing::debug;

/// Slot accounting over the run cache.
#[derive(Clone)]
pub struct AdmissionScheduler {
    cache: Arc<dyn RunCache>,
    ceiling: usize,
}

impl AdmissionScheduler {
    /// Create a scheduler enforcing `ceiling` concurrent runs.
    #[must_use]
    pub fn new(cache: Arc<dyn RunCache>, ceiling: usize) -> Self {
        Self { cache, ceiling }
    }

    /// The configured cap.
    #[must_use]
    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    /// Try to claim a slot for a fresh trigger.
    pub async fn admit(&self) -> Result<bool, CacheError> {
        let admitted = self.cache.try_acquire_slot(self.ceiling).await?;
        debug!(admitted, ceiling = self.ceiling, "admission decision");
        Ok(admitted)
    }

    /// Queue a run that could not be admitted.
    pub async fn enqueue(&self, id: RunId) -> Result<(), CacheError> {
        self.cache.queue_push(id).await
    }

    /// Account for a terminal run.
    ///
    /// If the queue is non-empty the freed slot transfers to the popped
    /// run (the counter stays put) and its id is returned for
    /// promotion; otherwise the slot is released.
    pub async fn on_terminal(&self) -> Result<Option<RunId>, CacheError> {
        match self.cache.queue_pop().await? {
            Some(next) => {
                debug!(%next, "transferring slot to queued run");
                Ok(Some(next))
            }
            None => {
                self.cache.release_slot().await?;
                Ok(None)
            }
        }
    }

    /// Release a slot without promotion (used when a promoted run turns
    /// out to be unrunnable).
    pub async fn release(&self) -> Result<(), CacheError> {
        self.cache.release_slot().await
    }
}
