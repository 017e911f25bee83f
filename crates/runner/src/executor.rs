//! Per-run execution.
//!
//! Materializes one run end to end: status transitions, per-user
//! variable contexts, step traversal with skip predicates, event
//! collection onto the durable record, report generation, and teardown.
//! The browser page acquired for a user is always released, failure
//! paths included.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::RwLock;
use quasar_action::{ActionContext, ActionError, Interpreter};
use quasar_automation::{
    ActionDef, AutomationDefinition, ScreenshotConfig, StepDefinition, StepPredicate,
    VariableKind,
};
use quasar_cache::RunCache;
use quasar_core::{AutomationId, ProjectId, RunId};
use quasar_driver::{BrowserDriver, ScreenshotOptions};
use quasar_eventbus::EventBus;
use quasar_expression::VariableContext;
use quasar_run::{RunEvent, RunRecord, RunRepository, RunStatus};
use quasar_storage::{ObjectStore, content_type_for_key};
use rand::Rng;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::RunnerConfig;
use crate::orchestrator::{self, FanOutOutcome};

/// Shared collaborators the executor runs against.
pub struct ExecutionEnv {
    /// Durable run records.
    pub repo: Arc<dyn RunRepository>,
    /// Live status mirror.
    pub cache: Arc<dyn RunCache>,
    /// Page factory.
    pub driver: Arc<dyn BrowserDriver>,
    /// Artifact storage.
    pub store: Arc<dyn ObjectStore>,
    /// Action dispatch.
    pub interpreter: Interpreter,
    /// Process configuration.
    pub config: RunnerConfig,
}

/// Execute a pending run to its terminal state and return the final
/// record.
///
/// Infrastructure failures (repository or cache writes) are logged and
/// do not abort the run; the returned record is authoritative.
pub async fn execute_run(
    env: Arc<ExecutionEnv>,
    definition: Arc<AutomationDefinition>,
    project_id: ProjectId,
    mut record: RunRecord,
    cancellation: CancellationToken,
) -> RunRecord {
    let run_id = record.id;
    let automation_id = record.automation_id;
    info!(%run_id, %automation_id, "run starting");

    let bus = Arc::new(EventBus::with_capacity(env.config.event_bus_capacity));
    let collector = {
        let stream = bus.subscribe();
        tokio::spawn(stream.collect::<Vec<RunEvent>>())
    };

    if let Err(err) = record.advance(RunStatus::Running) {
        error!(%run_id, %err, "run not startable");
        return record;
    }
    persist(&env, &record).await;
    if let Err(err) = env.cache.set_run_status(run_id, RunStatus::Running).await {
        warn!(%run_id, %err, "cache status write failed");
    }
    bus.emit(RunEvent::status_change(RunStatus::Running));

    // Outer run timeout triggers cooperative cancellation.
    let timeout_s = definition.automation.config.timeout;
    let watchdog = (timeout_s > 0).then(|| {
        let token = cancellation.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(timeout_s)).await;
            warn!(%run_id, timeout_s, "run timeout elapsed, cancelling");
            token.cancel();
        })
    });

    let multirun = &definition.automation.config.multirun;
    let count = multirun.effective_count();
    let global_vars: Arc<RwLock<serde_json::Map<String, serde_json::Value>>> = Arc::default();

    let outcome = {
        let run_user = |index: usize| {
            let env = Arc::clone(&env);
            let definition = Arc::clone(&definition);
            let bus = Arc::clone(&bus);
            let global_vars = Arc::clone(&global_vars);
            let token = cancellation.clone();
            async move {
                run_single_user(
                    env,
                    definition,
                    project_id,
                    run_id,
                    automation_id,
                    index,
                    global_vars,
                    bus,
                    token,
                )
                .await
            }
        };
        orchestrator::fan_out(count, multirun.mode, multirun.delay_ms, &cancellation, run_user)
            .await
    };

    if let Some(watchdog) = watchdog {
        watchdog.abort();
    }

    let status = terminal_status(&outcome, &cancellation);
    record.error_message = aggregate_error(&outcome, count);
    bus.emit(RunEvent::status_change(status));
    bus.close();

    let events = collector.await.unwrap_or_default();
    record.dropped_events = bus.dropped();
    for event in &events {
        if let Some(url) = &event.output_file {
            record.push_output_file(url.clone());
        }
    }
    record.logs = events;

    if let Err(err) = record.advance(status) {
        error!(%run_id, %err, "terminal transition rejected");
    }
    persist(&env, &record).await;
    if let Err(err) = env
        .cache
        .set_run_status_with_ttl(run_id, status, env.config.terminal_status_ttl)
        .await
    {
        warn!(%run_id, %err, "terminal cache status write failed");
    }

    publish_reports(&env, &mut record).await;
    info!(%run_id, %status, successes = outcome.successes, failures = outcome.failures,
          "run finished");
    record
}

fn terminal_status(outcome: &FanOutOutcome, cancellation: &CancellationToken) -> RunStatus {
    if outcome.failures == 0 {
        RunStatus::Completed
    } else if cancellation.is_cancelled() && outcome.all_failures_cancelled() {
        RunStatus::Cancelled
    } else {
        RunStatus::Failed
    }
}

fn aggregate_error(outcome: &FanOutOutcome, count: usize) -> Option<String> {
    match outcome.errors.as_slice() {
        [] => None,
        [only] => Some(format!("user {}: {}", only.loop_index, only.error)),
        [first, ..] => Some(format!(
            "{} of {count} users failed; first (user {}): {}",
            outcome.errors.len(),
            first.loop_index,
            first.error,
        )),
    }
}

async fn persist(env: &ExecutionEnv, record: &RunRecord) {
    if let Err(err) = env.repo.update_run(record).await {
        warn!(run_id = %record.id, %err, "repository update failed");
    }
}

async fn publish_reports(env: &ExecutionEnv, record: &mut RunRecord) {
    let bundle = match quasar_report::generate(record) {
        Ok(bundle) => bundle,
        Err(err) => {
            warn!(run_id = %record.id, %err, "report generation failed");
            return;
        }
    };
    let prefix = format!("{}/{}", env.config.artifact_prefix, record.id);
    let artifacts = [
        ("report.json", bundle.json),
        ("report.csv", bundle.csv),
        ("report.html", bundle.html),
    ];
    let mut updated = false;
    for (name, content) in artifacts {
        let key = format!("{prefix}/{name}");
        match env
            .store
            .upload(&key, Bytes::from(content.into_bytes()), content_type_for_key(&key))
            .await
        {
            Ok(url) => {
                record.push_output_file(url);
                updated = true;
            }
            Err(err) => warn!(run_id = %record.id, key, %err, "report upload failed"),
        }
    }
    if updated {
        persist(env, record).await;
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_single_user(
    env: Arc<ExecutionEnv>,
    definition: Arc<AutomationDefinition>,
    project_id: ProjectId,
    run_id: RunId,
    automation_id: AutomationId,
    loop_index: usize,
    global_vars: Arc<RwLock<serde_json::Map<String, serde_json::Value>>>,
    bus: Arc<EventBus<RunEvent>>,
    cancellation: CancellationToken,
) -> Result<(), ActionError> {
    if cancellation.is_cancelled() {
        return Err(ActionError::Cancelled);
    }
    let page = env.driver.new_page().await.map_err(ActionError::Driver)?;

    let mut vars = VariableContext::new(
        run_id.to_string(),
        project_id.to_string(),
        automation_id.to_string(),
        loop_index,
        global_vars,
    );
    seed_variables(&mut vars, &definition);

    let mut ctx = ActionContext::new(
        run_id,
        automation_id,
        project_id,
        vars,
        Arc::clone(&page),
        Arc::clone(&env.store),
        bus,
        cancellation,
    );
    ctx.emit(RunEvent::progress("user started"));

    let result = run_steps(&env.interpreter, &definition, &mut ctx).await;
    let screenshots = &definition.automation.config.screenshots;
    match &result {
        Ok(()) => {
            ctx.emit(RunEvent::progress("user completed"));
            if screenshots.enabled && screenshots.on_success {
                capture_screenshot(&ctx, screenshots, "success").await;
            }
        }
        Err(err) => {
            ctx.emit(RunEvent::progress(format!("user failed: {err}")));
            if screenshots.enabled && screenshots.on_error && !err.is_cancelled() {
                capture_screenshot(&ctx, screenshots, "error").await;
            }
        }
    }

    if let Err(err) = page.close().await {
        warn!(%run_id, loop_index, %err, "page teardown failed");
    }
    result
}

fn seed_variables(vars: &mut VariableContext, definition: &AutomationDefinition) {
    for spec in &definition.automation.config.variables {
        match spec.kind {
            VariableKind::Static => vars.set_static(spec.key.clone(), spec.value.clone()),
            VariableKind::Dynamic => vars.set_dynamic(spec.key.clone(), spec.value.clone()),
            // Environment values name a system token (`runId`, `timestamp`,
            // ...) or carry a template outright.
            VariableKind::Environment => {
                let template = if spec.value.contains("{{") {
                    spec.value.clone()
                } else {
                    format!("{{{{{}}}}}", spec.value)
                };
                vars.set_dynamic(spec.key.clone(), template);
            }
        }
    }
}

async fn run_steps(
    interpreter: &Interpreter,
    definition: &AutomationDefinition,
    ctx: &mut ActionContext,
) -> Result<(), ActionError> {
    for step in definition.ordered_steps() {
        ctx.check_cancelled()?;
        let identity = step_identity(step);
        if should_skip(step, ctx.vars.loop_index) {
            debug!(step = %step.name, loop_index = ctx.vars.loop_index, "step skipped");
            ctx.emit(
                RunEvent::progress(format!("step skipped: {}", step.name))
                    .with_step(identity, step.name.clone()),
            );
            continue;
        }
        ctx.enter_step(identity, step.name.clone());

        let mut actions: Vec<&ActionDef> = step.actions.iter().collect();
        actions.sort_by_key(|a| a.action_order);
        for action in actions {
            interpreter.execute(ctx, action).await?;
        }
        ctx.leave_step();
    }
    Ok(())
}

fn step_identity(step: &StepDefinition) -> String {
    if step.id.is_nil() {
        format!("s{}", step.step_order)
    } else {
        step.id.to_string()
    }
}

fn should_skip(step: &StepDefinition, loop_index: usize) -> bool {
    let probability = step.config.probability;
    if let Some(predicate) = step.config.skip_on {
        return predicate_holds(predicate, loop_index, probability);
    }
    if let Some(predicate) = step.config.run_only_on {
        return !predicate_holds(predicate, loop_index, probability);
    }
    false
}

fn predicate_holds(predicate: StepPredicate, loop_index: usize, probability: Option<f64>) -> bool {
    match predicate {
        StepPredicate::LoopIndexIsEven => loop_index % 2 == 0,
        StepPredicate::LoopIndexIsOdd => loop_index % 2 == 1,
        StepPredicate::LoopIndexIsPrime => is_prime(loop_index),
        StepPredicate::Random => {
            let p = probability.unwrap_or(0.5).clamp(0.0, 1.0);
            rand::thread_rng().gen_bool(p)
        }
    }
}

fn is_prime(n: usize) -> bool {
    if n < 2 {
        return false;
    }
    let mut divisor = 2;
    while divisor * divisor <= n {
        if n % divisor == 0 {
            return false;
        }
        divisor += 1;
    }
    true
}

async fn capture_screenshot(ctx: &ActionContext, config: &ScreenshotConfig, suffix: &str) {
    let template = config.path_template.clone().unwrap_or_else(|| {
        format!("screenshots/{{{{runId}}}}/{{{{loopIndex}}}}-{suffix}.png")
    });
    let key = match ctx.resolve_str(&template) {
        Ok(key) => key,
        Err(err) => {
            warn!(%err, "screenshot path template failed to resolve");
            return;
        }
    };
    let bytes = match ctx.page().screenshot(ScreenshotOptions::default()).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(%err, "automatic screenshot failed");
            return;
        }
    };
    match ctx
        .store()
        .upload(&key, bytes, content_type_for_key(&key))
        .await
    {
        Ok(url) => ctx.emit(RunEvent::output_file(url)),
        Err(err) => warn!(%err, key, "automatic screenshot upload failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use quasar_automation::StepConfig;
    use quasar_core::StepId;
    use rstest::rstest;

    #[rstest]
    #[case(0, false)]
    #[case(1, false)]
    #[case(2, true)]
    #[case(3, true)]
    #[case(4, false)]
    #[case(17, true)]
    #[case(21, false)]
    #[case(97, true)]
    fn prime_detection(#[case] n: usize, #[case] expected: bool) {
        assert_eq!(is_prime(n), expected);
    }

    fn step_with(config: StepConfig) -> StepDefinition {
        StepDefinition {
            id: StepId::nil(),
            name: "s".into(),
            step_order: 1,
            config,
            actions: vec![],
        }
    }

    #[test]
    fn skip_on_even_skips_even_indices() {
        let step = step_with(StepConfig {
            skip_on: Some(StepPredicate::LoopIndexIsEven),
            ..Default::default()
        });
        assert!(should_skip(&step, 0));
        assert!(!should_skip(&step, 1));
        assert!(should_skip(&step, 2));
        assert!(!should_skip(&step, 3));
    }

    #[test]
    fn run_only_on_odd_skips_even_indices() {
        let step = step_with(StepConfig {
            run_only_on: Some(StepPredicate::LoopIndexIsOdd),
            ..Default::default()
        });
        assert!(should_skip(&step, 0));
        assert!(!should_skip(&step, 1));
    }

    #[test]
    fn skip_on_takes_precedence_over_run_only_on() {
        let step = step_with(StepConfig {
            skip_on: Some(StepPredicate::LoopIndexIsOdd),
            run_only_on: Some(StepPredicate::LoopIndexIsOdd),
            ..Default::default()
        });
        // skip_on says: skip odd. run_only_on would keep odd. skip_on wins.
        assert!(should_skip(&step, 1));
        assert!(!should_skip(&step, 0));
    }

    #[test]
    fn random_predicate_extremes() {
        let always = step_with(StepConfig {
            skip_on: Some(StepPredicate::Random),
            probability: Some(1.0),
            ..Default::default()
        });
        let never = step_with(StepConfig {
            skip_on: Some(StepPredicate::Random),
            probability: Some(0.0),
            ..Default::default()
        });
        for index in 0..16 {
            assert!(should_skip(&always, index));
            assert!(!should_skip(&never, index));
        }
    }

    #[test]
    fn no_predicates_never_skips() {
        let step = step_with(StepConfig::default());
        assert!(!should_skip(&step, 0));
    }
}
