//! The run service.
//!
//! Entry point the front-end tier calls: register automation
//! definitions, trigger runs (admitted immediately or queued), cancel
//! in-flight runs, and read records back. Execution itself happens on
//! spawned tasks; the service tracks per-run cancellation tokens and
//! performs queue promotion when a run terminates.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use quasar_action::{Interpreter, Registry};
use quasar_automation::AutomationDefinition;
use quasar_cache::RunCache;
use quasar_core::{AutomationId, ProjectId, RunId};
use quasar_driver::BrowserDriver;
use quasar_run::{RunRecord, RunRepository, RunStatus};
use quasar_storage::ObjectStore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::RunnerConfig;
use crate::error::RunnerError;
use crate::executor::{self, ExecutionEnv};
use crate::scheduler::AdmissionScheduler;

struct RegisteredAutomation {
    definition: Arc<AutomationDefinition>,
    project_id: ProjectId,
}

/// Orchestrating facade over the executor, scheduler, and stores.
pub struct RunService {
    env: Arc<ExecutionEnv>,
    scheduler: AdmissionScheduler,
    automations: RwLock<HashMap<AutomationId, RegisteredAutomation>>,
    active: Mutex<HashMap<RunId, CancellationToken>>,
    // Handed to spawned run tasks so they can report termination back.
    self_ref: Weak<RunService>,
}

impl RunService {
    /// Assemble a service from its collaborators.
    pub fn new(
        repo: Arc<dyn RunRepository>,
        cache: Arc<dyn RunCache>,
        driver: Arc<dyn BrowserDriver>,
        store: Arc<dyn ObjectStore>,
        registry: Arc<Registry>,
        config: RunnerConfig,
    ) -> Arc<Self> {
        let scheduler = AdmissionScheduler::new(Arc::clone(&cache), config.max_concurrent_runs);
        let env = Arc::new(ExecutionEnv {
            repo,
            cache,
            driver,
            store,
            interpreter: Interpreter::new(registry),
            config,
        });
        Arc::new_cyclic(|self_ref| Self {
            env,
            scheduler,
            automations: RwLock::new(HashMap::new()),
            active: Mutex::new(HashMap::new()),
            self_ref: self_ref.clone(),
        })
    }

    /// Validate and register an automation definition, returning its id.
    ///
    /// Assigns a fresh id to hand-authored documents (nil id) and
    /// normalizes nested-action ids so events can always name their
    /// action.
    pub fn register_automation(
        &self,
        mut definition: AutomationDefinition,
        project_id: ProjectId,
    ) -> Result<AutomationId, RunnerError> {
        definition.validate()?;
        definition
            .validate_action_kinds(|kind| self.env.interpreter.registry().contains(kind))?;
        if definition.automation.id.is_nil() {
            definition.automation.id = AutomationId::v4();
        }
        definition.normalize_ids();

        let id = definition.automation.id;
        self.automations.write().insert(
            id,
            RegisteredAutomation {
                definition: Arc::new(definition),
                project_id,
            },
        );
        Ok(id)
    }

    /// Trigger a run: admitted to execution when capacity allows,
    /// queued otherwise.
    pub async fn trigger_run(
        &self,
        automation_id: AutomationId,
    ) -> Result<RunRecord, RunnerError> {
        let (definition, project_id) = self.lookup(automation_id)?;

        if self.scheduler.admit().await? {
            let record = RunRecord::new(automation_id, RunStatus::Pending);
            self.env.repo.create_run(record.clone()).await?;
            self.env
                .cache
                .set_run_status(record.id, RunStatus::Pending)
                .await?;
            self.spawn_execution(record.clone(), definition, project_id);
            Ok(record)
        } else {
            let record = RunRecord::new(automation_id, RunStatus::Queued);
            self.env.repo.create_run(record.clone()).await?;
            self.env
                .cache
                .set_run_status(record.id, RunStatus::Queued)
                .await?;
            self.scheduler.enqueue(record.id).await?;
            info!(run_id = %record.id, "run queued at capacity");
            Ok(record)
        }
    }

    /// Cancel a run: active runs get their token cancelled; queued runs
    /// transition straight to `cancelled` and are skipped at promotion.
    pub async fn cancel_run(&self, run_id: RunId) -> Result<(), RunnerError> {
        if let Some(token) = self.active.lock().get(&run_id) {
            info!(%run_id, "cancelling active run");
            token.cancel();
            return Ok(());
        }

        let mut record = self.env.repo.get_run(run_id).await?;
        match record.status {
            RunStatus::Queued => {
                record.advance(RunStatus::Cancelled)?;
                self.env.repo.update_run(&record).await?;
                self.env
                    .cache
                    .set_run_status_with_ttl(
                        run_id,
                        RunStatus::Cancelled,
                        self.env.config.terminal_status_ttl,
                    )
                    .await?;
                Ok(())
            }
            status if status.is_terminal() => Ok(()),
            _ => Err(RunnerError::NotActive(run_id)),
        }
    }

    /// Fetch a run record.
    pub async fn get_run(&self, run_id: RunId) -> Result<RunRecord, RunnerError> {
        Ok(self.env.repo.get_run(run_id).await?)
    }

    /// All runs of an automation, newest first.
    pub async fn runs_for_automation(
        &self,
        automation_id: AutomationId,
    ) -> Result<Vec<RunRecord>, RunnerError> {
        Ok(self.env.repo.runs_for_automation(automation_id).await?)
    }

    /// Number of currently executing runs (per this process's tokens).
    #[must_use]
    pub fn active_runs(&self) -> usize {
        self.active.lock().len()
    }

    fn lookup(
        &self,
        automation_id: AutomationId,
    ) -> Result<(Arc<AutomationDefinition>, ProjectId), RunnerError> {
        let automations = self.automations.read();
        let registered = automations
            .get(&automation_id)
            .ok_or(RunnerError::UnknownAutomation(automation_id))?;
        Ok((Arc::clone(&registered.definition), registered.project_id))
    }

    fn spawn_execution(
        &self,
        record: RunRecord,
        definition: Arc<AutomationDefinition>,
        project_id: ProjectId,
    ) {
        let Some(service) = self.self_ref.upgrade() else {
            warn!(run_id = %record.id, "service dropped before spawn");
            return;
        };
        let token = CancellationToken::new();
        self.active.lock().insert(record.id, token.clone());

        tokio::spawn(async move {
            let run_id = record.id;
            let env = Arc::clone(&service.env);
            executor::execute_run(env, definition, project_id, record, token).await;
            service.active.lock().remove(&run_id);
            service.promote_next().await;
        });
    }

    /// Transfer the freed slot to the next runnable queued run, if any.
    async fn promote_next(&self) {
        loop {
            let next = match self.scheduler.on_terminal().await {
                Ok(next) => next,
                Err(err) => {
                    error!(%err, "terminal slot accounting failed");
                    return;
                }
            };
            let Some(run_id) = next else { return };

            match self.promote(run_id).await {
                Ok(true) => return,
                // Skipped (cancelled while queued, or unrunnable): the
                // slot is still held, try the next queued run.
                Ok(false) => continue,
                Err(err) => {
                    error!(%run_id, %err, "promotion failed, releasing slot");
                    if let Err(release_err) = self.scheduler.release().await {
                        error!(%release_err, "slot release failed");
                    }
                    return;
                }
            }
        }
    }

    /// Promote one queued run to `pending` and start it. Returns
    /// `false` when the run should be skipped.
    async fn promote(&self, run_id: RunId) -> Result<bool, RunnerError> {
        let mut record = self.env.repo.get_run(run_id).await?;
        if record.status != RunStatus::Queued {
            warn!(%run_id, status = %record.status, "skipping non-queued run at promotion");
            return Ok(false);
        }
        let Ok((definition, project_id)) = self.lookup(record.automation_id) else {
            warn!(%run_id, "automation vanished before promotion");
            record.advance(RunStatus::Cancelled)?;
            self.env.repo.update_run(&record).await?;
            return Ok(false);
        };

        record.advance(RunStatus::Pending)?;
        self.env.repo.update_run(&record).await?;
        self.env
            .cache
            .set_run_status(run_id, RunStatus::Pending)
            .await?;
        info!(%run_id, "promoting queued run");
        self.spawn_execution(record, definition, project_id);
        Ok(true)
    }
}
