//! Run repository port and the in-memory implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use quasar_core::{AutomationId, RunId};

use crate::error::RunError;
use crate::record::RunRecord;

/// Durable storage for run records.
///
/// The executor is the single writer for a given run; subscribers read.
#[async_trait]
pub trait RunRepository: Send + Sync {
    /// Persist a freshly created run.
    async fn create_run(&self, run: RunRecord) -> Result<(), RunError>;

    /// Replace the stored record for an existing run.
    async fn update_run(&self, run: &RunRecord) -> Result<(), RunError>;

    /// Fetch a run by id.
    async fn get_run(&self, id: RunId) -> Result<RunRecord, RunError>;

    /// All runs of one automation, newest first.
    async fn runs_for_automation(&self, id: AutomationId) -> Result<Vec<RunRecord>, RunError>;
}

/// Map-backed repository for tests and single-process deployments.
#[derive(Debug, Default)]
pub struct InMemoryRunRepository {
    runs: RwLock<HashMap<RunId, RunRecord>>,
}

impl InMemoryRunRepository {
    /// Create an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RunRepository for InMemoryRunRepository {
    async fn create_run(&self, run: RunRecord) -> Result<(), RunError> {
        let mut runs = self.runs.write();
        if runs.contains_key(&run.id) {
            return Err(RunError::AlreadyExists(run.id));
        }
        runs.insert(run.id, run);
        Ok(())
    }

    async fn update_run(&self, run: &RunRecord) -> Result<(), RunError> {
        let mut runs = self.runs.write();
        if !runs.contains_key(&run.id) {
            return Err(RunError::NotFound(run.id));
        }
        runs.insert(run.id, run.clone());
        Ok(())
    }

    async fn get_run(&self, id: RunId) -> Result<RunRecord, RunError> {
        self.runs
            .read()
            .get(&id)
            .cloned()
            .ok_or(RunError::NotFound(id))
    }

    async fn runs_for_automation(&self, id: AutomationId) -> Result<Vec<RunRecord>, RunError> {
        let mut runs: Vec<RunRecord> = self
            .runs
            .read()
            .values()
            .filter(|run| run.automation_id == id)
            .cloned()
            .collect();
        runs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(runs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::RunStatus;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn create_and_get() {
        let repo = InMemoryRunRepository::new();
        let run = RunRecord::new(AutomationId::v4(), RunStatus::Pending);
        let id = run.id;
        repo.create_run(run.clone()).await.unwrap();

        let fetched = repo.get_run(id).await.unwrap();
        assert_eq!(fetched, run);
    }

    #[tokio::test]
    async fn create_duplicate_fails() {
        let repo = InMemoryRunRepository::new();
        let run = RunRecord::new(AutomationId::v4(), RunStatus::Pending);
        repo.create_run(run.clone()).await.unwrap();

        let err = repo.create_run(run).await.unwrap_err();
        assert!(matches!(err, RunError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn update_replaces_record() {
        let repo = InMemoryRunRepository::new();
        let mut run = RunRecord::new(AutomationId::v4(), RunStatus::Pending);
        repo.create_run(run.clone()).await.unwrap();

        run.advance(RunStatus::Running).unwrap();
        repo.update_run(&run).await.unwrap();

        let fetched = repo.get_run(run.id).await.unwrap();
        assert_eq!(fetched.status, RunStatus::Running);
    }

    #[tokio::test]
    async fn update_missing_run_fails() {
        let repo = InMemoryRunRepository::new();
        let run = RunRecord::new(AutomationId::v4(), RunStatus::Pending);
        let err = repo.update_run(&run).await.unwrap_err();
        assert!(matches!(err, RunError::NotFound(_)));
    }

    #[tokio::test]
    async fn get_missing_run_fails() {
        let repo = InMemoryRunRepository::new();
        let err = repo.get_run(RunId::v4()).await.unwrap_err();
        assert!(matches!(err, RunError::NotFound(_)));
    }

    #[tokio::test]
    async fn runs_for_automation_filters_and_orders() {
        let repo = InMemoryRunRepository::new();
        let automation = AutomationId::v4();
        let other = AutomationId::v4();

        let first = RunRecord::new(automation, RunStatus::Pending);
        let second = RunRecord::new(automation, RunStatus::Pending);
        let unrelated = RunRecord::new(other, RunStatus::Pending);
        repo.create_run(first.clone()).await.unwrap();
        repo.create_run(second.clone()).await.unwrap();
        repo.create_run(unrelated).await.unwrap();

        let runs = repo.runs_for_automation(automation).await.unwrap();
        assert_eq!(runs.len(), 2);
        assert!(runs[0].created_at >= runs[1].created_at);
    }
}
