//! End-to-end runner scenarios against scripted collaborators.

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use quasar_automation::AutomationDefinition;
use quasar_cache::{InMemoryRunCache, RunCache};
use quasar_core::{ProjectId, RunId};
use quasar_driver::testing::ScriptedDriver;
use quasar_plugins::builtin_registry;
use quasar_run::{InMemoryRunRepository, LogLevel, RunEventKind, RunRecord, RunStatus};
use quasar_runner::{RunService, RunnerConfig};
use quasar_storage::MemoryStore;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Harness {
    service: Arc<RunService>,
    cache: Arc<InMemoryRunCache>,
    driver: Arc<ScriptedDriver>,
    store: Arc<MemoryStore>,
}

fn harness_with_driver(config: RunnerConfig, driver: Arc<ScriptedDriver>) -> Harness {
    let repo = Arc::new(InMemoryRunRepository::new());
    let cache = Arc::new(InMemoryRunCache::new());
    let store = Arc::new(MemoryStore::new("https://cdn.test"));
    let service = RunService::new(
        repo,
        Arc::clone(&cache) as Arc<dyn RunCache>,
        Arc::clone(&driver) as Arc<dyn quasar_driver::BrowserDriver>,
        Arc::clone(&store) as Arc<dyn quasar_storage::ObjectStore>,
        Arc::new(builtin_registry()),
        config,
    );
    Harness {
        service,
        cache,
        driver,
        store,
    }
}

fn harness_with(config: RunnerConfig) -> Harness {
    harness_with_driver(config, Arc::new(ScriptedDriver::new()))
}

fn harness() -> Harness {
    harness_with(RunnerConfig::default())
}

fn definition(doc: serde_json::Value) -> AutomationDefinition {
    serde_json::from_value(doc).unwrap()
}

async fn wait_terminal(harness: &Harness, run_id: RunId) -> RunRecord {
    for _ in 0..500 {
        let record = harness.service.get_run(run_id).await.unwrap();
        if record.status.is_terminal() {
            // Terminal invariants hold for every run.
            let end = record.end_time.expect("terminal run has end_time");
            if let Some(start) = record.start_time {
                assert!(start <= end);
            }
            return record;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("run {run_id} never reached a terminal status");
}

async fn wait_for_report(harness: &Harness, run_id: RunId) -> RunRecord {
    for _ in 0..200 {
        let record = harness.service.get_run(run_id).await.unwrap();
        if record
            .output_files
            .iter()
            .any(|url| url.ends_with("report.html"))
        {
            return record;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("run {run_id} never published reports");
}

fn log_messages(record: &RunRecord) -> Vec<String> {
    record
        .logs
        .iter()
        .filter(|e| e.kind == RunEventKind::Log)
        .filter_map(|e| e.message.clone())
        .collect()
}

#[tokio::test(flavor = "multi_thread")]
async fn happy_path_sequential_two_users() {
    let harness = harness();
    let automation_id = harness
        .service
        .register_automation(
            definition(json!({
                "automation": {
                    "name": "goto and screenshot",
                    "config": {"multirun": {"enabled": true, "mode": "sequential", "count": 2}}
                },
                "steps": [{
                    "name": "visit",
                    "step_order": 1,
                    "actions": [
                        {"action_type": "browser:goto", "action_order": 1,
                         "action_config": {"url": "https://example.com"}},
                        {"action_type": "browser:screenshot", "action_order": 2,
                         "action_config": {"upload_to_storage": true,
                                            "storage_key": "s/{{loopIndex}}.png"}}
                    ]
                }]
            })),
            ProjectId::v4(),
        )
        .unwrap();

    let run = harness.service.trigger_run(automation_id).await.unwrap();
    assert_eq!(run.status, RunStatus::Pending);

    let record = wait_terminal(&harness, run.id).await;
    assert_eq!(record.status, RunStatus::Completed);
    assert!(record.error_message.is_none());

    // One artifact per user, with per-user keys.
    let shots: Vec<&String> = record
        .output_files
        .iter()
        .filter(|url| url.contains("/s/"))
        .collect();
    assert_eq!(shots.len(), 2);
    assert!(shots.iter().any(|url| url.ends_with("/s/0.png")));
    assert!(shots.iter().any(|url| url.ends_with("/s/1.png")));

    // Both users drove their own page through the same journey.
    let pages = harness.driver.pages();
    assert_eq!(pages.len(), 2);
    for page in &pages {
        assert_eq!(page.calls(), vec!["goto https://example.com", "screenshot", "close"]);
        assert!(page.was_closed());
    }

    // Reports land in storage and on the record.
    let record = wait_for_report(&harness, run.id).await;
    let html_key = format!("reports/{}/report.html", run.id);
    let (html, _) = harness.store.get(&html_key).expect("html report stored");
    let html = String::from_utf8(html.to_vec()).unwrap();
    assert!(html.contains("completed"));
    assert_eq!(
        record
            .output_files
            .iter()
            .filter(|u| u.contains("/report."))
            .count(),
        3
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn parallel_ramp_up_staggers_user_starts() {
    let harness = harness();
    let automation_id = harness
        .service
        .register_automation(
            definition(json!({
                "automation": {
                    "name": "parallel ramp",
                    "config": {"multirun": {"enabled": true, "mode": "parallel",
                                             "count": 3, "delay_ms": 200}}
                },
                "steps": [{
                    "name": "visit",
                    "step_order": 1,
                    "actions": [{"action_type": "browser:goto", "action_order": 1,
                                 "action_config": {"url": "https://example.com"}}]
                }]
            })),
            ProjectId::v4(),
        )
        .unwrap();

    let run = harness.service.trigger_run(automation_id).await.unwrap();
    let record = wait_terminal(&harness, run.id).await;
    assert_eq!(record.status, RunStatus::Completed);

    let mut starts: Vec<_> = record
        .logs
        .iter()
        .filter(|e| e.kind == RunEventKind::Progress)
        .filter(|e| e.message.as_deref() == Some("user started"))
        .map(|e| (e.loop_index.unwrap(), e.timestamp))
        .collect();
    starts.sort_by_key(|(index, _)| *index);
    assert_eq!(starts.len(), 3);

    let gap_01 = (starts[1].1 - starts[0].1).num_milliseconds();
    let gap_12 = (starts[2].1 - starts[1].1).num_milliseconds();
    assert!(gap_01 >= 150, "users 0/1 started {gap_01}ms apart");
    assert!(gap_12 >= 150, "users 1/2 started {gap_12}ms apart");
}

#[tokio::test(flavor = "multi_thread")]
async fn global_variables_cross_users() {
    let harness = harness_with_driver(
        RunnerConfig::default(),
        Arc::new(ScriptedDriver::with_setup(|page| {
            page.script_eval("claim()", json!("claimed"));
        })),
    );
    // User 0 finds the marker unset and writes it globally; user 1
    // observes the write.
    let automation_id = harness
        .service
        .register_automation(
            definition(json!({
                "automation": {
                    "name": "global marker",
                    "config": {"multirun": {"enabled": true, "mode": "sequential", "count": 2}}
                },
                "steps": [{
                    "name": "claim",
                    "step_order": 1,
                    "actions": [{
                        "action_type": "flow:if",
                        "action_order": 1,
                        "action_config": {
                            "variable_path": "runtime.marker",
                            "condition_type": "is_null",
                            "if_actions": [
                                {"action_type": "browser:evaluate",
                                 "action_config": {"expression": "claim()", "save_as": "marker",
                                                    "scope": "global"}},
                                {"action_type": "flow:log",
                                 "action_config": {"message": "claimed by {{loopIndex}}"}}
                            ],
                            "else_actions": [
                                {"action_type": "flow:log",
                                 "action_config": {"message": "seen by {{loopIndex}}"}}
                            ]
                        }
                    }]
                }]
            })),
            ProjectId::v4(),
        )
        .unwrap();

    let run = harness.service.trigger_run(automation_id).await.unwrap();
    let record = wait_terminal(&harness, run.id).await;
    assert_eq!(record.status, RunStatus::Completed);
    assert_eq!(log_messages(&record), vec!["claimed by 0", "seen by 1"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn admission_queues_past_capacity_and_promotes() {
    let harness = harness_with(RunnerConfig {
        max_concurrent_runs: 1,
        ..RunnerConfig::default()
    });
    let automation_id = harness
        .service
        .register_automation(
            definition(json!({
                "automation": {"name": "slow"},
                "steps": [{
                    "name": "wait",
                    "step_order": 1,
                    "actions": [{"action_type": "browser:wait_for_timeout", "action_order": 1,
                                 "action_config": {"timeout": 300}}]
                }]
            })),
            ProjectId::v4(),
        )
        .unwrap();

    let first = harness.service.trigger_run(automation_id).await.unwrap();
    assert_eq!(first.status, RunStatus::Pending);

    let second = harness.service.trigger_run(automation_id).await.unwrap();
    assert_eq!(second.status, RunStatus::Queued);
    assert_eq!(harness.cache.running_count().await.unwrap(), 1);

    let first_record = wait_terminal(&harness, first.id).await;
    let second_record = wait_terminal(&harness, second.id).await;
    assert_eq!(first_record.status, RunStatus::Completed);
    assert_eq!(second_record.status, RunStatus::Completed);

    // The queued run only started once the first finished.
    assert!(second_record.start_time.unwrap() >= first_record.end_time.unwrap());

    // Queue drained and the last slot released.
    assert_eq!(harness.cache.queue_len().await.unwrap(), 0);
    for _ in 0..100 {
        if harness.cache.running_count().await.unwrap() == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(harness.cache.running_count().await.unwrap(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn http_extraction_feeds_flow_if() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
        .mount(&server)
        .await;

    let harness = harness();
    let automation_id = harness
        .service
        .register_automation(
            definition(json!({
                "automation": {"name": "api check"},
                "steps": [{
                    "name": "probe",
                    "step_order": 1,
                    "actions": [
                        {"action_type": "http:get", "action_order": 1,
                         "action_config": {
                             "url": format!("{}/health", server.uri()),
                             "after_hooks": [{"path": "status", "save_as": "api.status"}]
                         }},
                        {"action_type": "flow:if", "action_order": 2,
                         "action_config": {
                             "variable_path": "runtime.api.status",
                             "condition_type": "equals",
                             "expected_value": "ok",
                             "if_actions": [{"action_type": "flow:log",
                                              "action_config": {"message": "api ok",
                                                                 "level": "info"}}],
                             "final_actions": [{"action_type": "flow:log",
                                                 "action_config": {"message": "checked"}}]
                         }}
                    ]
                }]
            })),
            ProjectId::v4(),
        )
        .unwrap();

    let run = harness.service.trigger_run(automation_id).await.unwrap();
    let record = wait_terminal(&harness, run.id).await;

    assert_eq!(record.status, RunStatus::Completed);
    assert_eq!(log_messages(&record), vec!["api ok", "checked"]);
    let api_ok = record
        .logs
        .iter()
        .find(|e| e.message.as_deref() == Some("api ok"))
        .unwrap();
    assert_eq!(api_ok.level, Some(LogLevel::Info));
}

#[tokio::test(flavor = "multi_thread")]
async fn bounded_loop_force_stop_fails_the_run() {
    let harness = harness();
    let automation_id = harness
        .service
        .register_automation(
            definition(json!({
                "automation": {"name": "stuck loop"},
                "steps": [{
                    "name": "poll",
                    "step_order": 1,
                    "actions": [{
                        "action_type": "flow:loop",
                        "action_order": 1,
                        "action_config": {
                            "variable_path": "runtime.never",
                            "condition_type": "is_not_null",
                            "max_loops": 3,
                            "fail_on_force_stop": true,
                            "loop_actions": [{"action_type": "flow:log",
                                               "action_config": {"message": "iter {{localLoopIndex}}"}}]
                        }
                    }]
                }]
            })),
            ProjectId::v4(),
        )
        .unwrap();

    let run = harness.service.trigger_run(automation_id).await.unwrap();
    let record = wait_terminal(&harness, run.id).await;

    assert_eq!(record.status, RunStatus::Failed);
    assert!(
        record
            .error_message
            .as_deref()
            .unwrap()
            .contains("force-stopped after 3 iterations")
    );
    assert_eq!(log_messages(&record), vec!["iter 1", "iter 2", "iter 3"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn step_skip_by_loop_index_parity() {
    let harness = harness();
    let automation_id = harness
        .service
        .register_automation(
            definition(json!({
                "automation": {
                    "name": "parity",
                    "config": {"multirun": {"enabled": true, "mode": "sequential", "count": 4}}
                },
                "steps": [{
                    "name": "clicker",
                    "step_order": 1,
                    "config": {"skip_on": "loop_index_is_even"},
                    "actions": [{"action_type": "browser:click", "action_order": 1,
                                 "action_config": {"selector": "#next"}}]
                }]
            })),
            ProjectId::v4(),
        )
        .unwrap();

    let run = harness.service.trigger_run(automation_id).await.unwrap();
    let record = wait_terminal(&harness, run.id).await;
    assert_eq!(record.status, RunStatus::Completed);

    // Users 0 and 2 skipped; 1 and 3 clicked.
    let skipped: Vec<usize> = record
        .logs
        .iter()
        .filter(|e| {
            e.kind == RunEventKind::Progress
                && e.message.as_deref().is_some_and(|m| m.starts_with("step skipped"))
        })
        .map(|e| e.loop_index.unwrap())
        .collect();
    assert_eq!(skipped, vec![0, 2]);

    let pages = harness.driver.pages();
    assert_eq!(pages.len(), 4);
    for (index, page) in pages.iter().enumerate() {
        let clicked = page.calls().iter().any(|c| c.starts_with("click"));
        assert_eq!(clicked, index % 2 == 1, "user {index}");
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn cancel_run_mid_flight_marks_cancelled() {
    let harness = harness();
    let automation_id = harness
        .service
        .register_automation(
            definition(json!({
                "automation": {"name": "long wait"},
                "steps": [{
                    "name": "wait",
                    "step_order": 1,
                    "actions": [{"action_type": "browser:wait_for_timeout", "action_order": 1,
                                 "action_config": {"timeout": 30000}}]
                }]
            })),
            ProjectId::v4(),
        )
        .unwrap();

    let run = harness.service.trigger_run(automation_id).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    harness.service.cancel_run(run.id).await.unwrap();

    let record = wait_terminal(&harness, run.id).await;
    assert_eq!(record.status, RunStatus::Cancelled);
    assert!(record.end_time.is_some());

    // The page still got torn down.
    let pages = harness.driver.pages();
    assert_eq!(pages.len(), 1);
    assert!(pages[0].was_closed());
}

#[tokio::test(flavor = "multi_thread")]
async fn run_timeout_cancels_users() {
    let harness = harness();
    let automation_id = harness
        .service
        .register_automation(
            definition(json!({
                "automation": {"name": "outer timeout", "config": {"timeout": 1}},
                "steps": [{
                    "name": "wait forever",
                    "step_order": 1,
                    "actions": [{"action_type": "browser:wait_for_timeout", "action_order": 1,
                                 "action_config": {"timeout": 60000}}]
                }]
            })),
            ProjectId::v4(),
        )
        .unwrap();

    let run = harness.service.trigger_run(automation_id).await.unwrap();
    let record = wait_terminal(&harness, run.id).await;
    assert_eq!(record.status, RunStatus::Cancelled);
}

#[tokio::test(flavor = "multi_thread")]
async fn failing_user_does_not_poison_others() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/only-even"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let harness = harness();
    // User 0 hits a failing endpoint; user 1 skips that step.
    let automation_id = harness
        .service
        .register_automation(
            definition(json!({
                "automation": {
                    "name": "partial failure",
                    "config": {"multirun": {"enabled": true, "mode": "sequential", "count": 2}}
                },
                "steps": [
                    {"name": "flaky", "step_order": 1,
                     "config": {"run_only_on": "loop_index_is_even"},
                     "actions": [{"action_type": "http:get", "action_order": 1,
                                  "action_config": {"url": format!("{}/only-even", server.uri())}}]},
                    {"name": "always", "step_order": 2,
                     "actions": [{"action_type": "flow:log", "action_order": 1,
                                  "action_config": {"message": "done {{loopIndex}}"}}]}
                ]
            })),
            ProjectId::v4(),
        )
        .unwrap();

    let run = harness.service.trigger_run(automation_id).await.unwrap();
    let record = wait_terminal(&harness, run.id).await;

    // User 0 failed at step 1 and never ran step 2; user 1 completed.
    assert_eq!(record.status, RunStatus::Failed);
    assert_eq!(log_messages(&record), vec!["done 1"]);
    let message = record.error_message.as_deref().unwrap();
    assert!(message.contains("user 0"));
    assert!(message.contains("status 500"));
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_action_type_rejected_at_registration() {
    let harness = harness();
    let err = harness
        .service
        .register_automation(
            definition(json!({
                "automation": {"name": "bad"},
                "steps": [{"name": "s", "step_order": 1,
                            "actions": [{"action_type": "teleport:now", "action_config": {}}]}]
            })),
            ProjectId::v4(),
        )
        .unwrap_err();
    assert!(err.to_string().contains("unknown action type: teleport:now"));
}
