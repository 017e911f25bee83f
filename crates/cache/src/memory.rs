//! Single-process cache implementation.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use quasar_core::RunId;
use quasar_run::RunStatus;

use crate::error::CacheError;
use crate::port::RunCache;

#[derive(Debug, Default)]
struct Inner {
    statuses: HashMap<RunId, (RunStatus, Option<Instant>)>,
    running: usize,
    queue: VecDeque<RunId>,
}

/// Lock-backed cache for single-process deployments and tests.
///
/// One mutex guards statuses, counter, and queue, which makes
/// check-and-increment admission naturally atomic.
#[derive(Debug, Default)]
pub struct InMemoryRunCache {
    inner: Mutex<Inner>,
}

impl InMemoryRunCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RunCache for InMemoryRunCache {
    async fn set_run_status(&self, id: RunId, status: RunStatus) -> Result<(), CacheError> {
        self.inner.lock().statuses.insert(id, (status, None));
        Ok(())
    }

    async fn set_run_status_with_ttl(
        &self,
        id: RunId,
        status: RunStatus,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let expires = Instant::now() + ttl;
        self.inner.lock().statuses.insert(id, (status, Some(expires)));
        Ok(())
    }

    async fn get_run_status(&self, id: RunId) -> Result<Option<RunStatus>, CacheError> {
        let mut inner = self.inner.lock();
        match inner.statuses.get(&id) {
            Some((_, Some(expires))) if *expires <= Instant::now() => {
                inner.statuses.remove(&id);
                Ok(None)
            }
            Some((status, _)) => Ok(Some(*status)),
            None => Ok(None),
        }
    }

    async fn running_count(&self) -> Result<usize, CacheError> {
        Ok(self.inner.lock().running)
    }

    async fn try_acquire_slot(&self, ceiling: usize) -> Result<bool, CacheError> {
        let mut inner = self.inner.lock();
        if inner.running < ceiling {
            inner.running += 1;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn release_slot(&self) -> Result<(), CacheError> {
        let mut inner = self.inner.lock();
        inner.running = inner.running.saturating_sub(1);
        Ok(())
    }

    async fn queue_push(&self, id: RunId) -> Result<(), CacheError> {
        self.inner.lock().queue.push_back(id);
        Ok(())
    }

    async fn queue_pop(&self) -> Result<Option<RunId>, CacheError> {
        Ok(self.inner.lock().queue.pop_front())
    }

    async fn queue_len(&self) -> Result<usize, CacheError> {
        Ok(self.inner.lock().queue.len())
    }
}
