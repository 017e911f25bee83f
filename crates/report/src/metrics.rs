//! Metrics derived from a run's event timeline.

use std::collections::BTreeMap;

use quasar_run::{RunEvent, RunEventKind, RunRecord};
use serde::Serialize;

/// Aggregated timing and failure statistics for one step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepMetrics {
    /// Step name (events without one group under `"(no step)"`).
    pub step_name: String,
    /// Action events observed.
    pub actions: usize,
    /// Failed action events.
    pub failures: usize,
    /// `failures / actions`.
    pub failure_rate: f64,
    /// Mean action duration.
    pub mean_ms: f64,
    /// Median action duration.
    pub p50_ms: u64,
    /// 95th-percentile action duration.
    pub p95_ms: u64,
}

/// Per-user journey statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserMetrics {
    /// The user's ordinal within the run.
    pub loop_index: usize,
    /// Wall-clock span from the user's first to last event.
    pub total_ms: u64,
    /// Action events observed for this user.
    pub actions: usize,
    /// Failed action events for this user.
    pub failures: usize,
}

/// Everything the report renders, derived purely from the timeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunMetrics {
    /// Per-step statistics, in first-seen order.
    pub per_step: Vec<StepMetrics>,
    /// Per-user statistics, ordered by loop index.
    pub per_user: Vec<UserMetrics>,
    /// Action events across the run.
    pub total_actions: usize,
    /// Failed action events across the run.
    pub total_failures: usize,
    /// `total_failures / total_actions`.
    pub failure_rate: f64,
    /// Events dropped by the live bus.
    pub dropped_events: u64,
}

/// An event that represents one executed action (carries a type and a
/// duration).
fn is_action_event(event: &RunEvent) -> bool {
    event.action_type.is_some()
        && event.duration_ms.is_some()
        && matches!(event.kind, RunEventKind::Progress | RunEventKind::Error)
}

impl RunMetrics {
    /// Compute metrics from a terminal record's timeline.
    #[must_use]
    pub fn from_record(record: &RunRecord) -> Self {
        let action_events: Vec<&RunEvent> =
            record.logs.iter().filter(|e| is_action_event(e)).collect();

        // Per-step grouping, preserving first-seen order.
        let mut step_order: Vec<String> = Vec::new();
        let mut durations: BTreeMap<String, Vec<u64>> = BTreeMap::new();
        let mut failures: BTreeMap<String, usize> = BTreeMap::new();
        for event in &action_events {
            let step = event
                .step_name
                .clone()
                .unwrap_or_else(|| "(no step)".to_string());
            if !step_order.contains(&step) {
                step_order.push(step.clone());
            }
            durations
                .entry(step.clone())
                .or_default()
                .push(event.duration_ms.unwrap_or(0));
            if event.kind == RunEventKind::Error {
                *failures.entry(step).or_default() += 1;
            }
        }

        let per_step = step_order
            .into_iter()
            .map(|step| {
                let mut times = durations.remove(&step).unwrap_or_default();
                times.sort_unstable();
                let actions = times.len();
                let failed = failures.get(&step).copied().unwrap_or(0);
                let sum: u64 = times.iter().sum();
                StepMetrics {
                    failure_rate: ratio(failed, actions),
                    mean_ms: if actions == 0 { 0.0 } else { sum as f64 / actions as f64 },
                    p50_ms: percentile(&times, 0.50),
                    p95_ms: percentile(&times, 0.95),
                    step_name: step,
                    actions,
                    failures: failed,
                }
            })
            .collect();

        // Per-user journeys from every event carrying a loop index.
        let mut users: BTreeMap<usize, Vec<&RunEvent>> = BTreeMap::new();
        for event in &record.logs {
            if let Some(loop_index) = event.loop_index {
                users.entry(loop_index).or_default().push(event);
            }
        }
        let per_user = users
            .into_iter()
            .map(|(loop_index, events)| {
                let first = events.iter().map(|e| e.timestamp).min();
                let last = events.iter().map(|e| e.timestamp).max();
                let total_ms = match (first, last) {
                    (Some(first), Some(last)) => {
                        (last - first).num_milliseconds().max(0) as u64
                    }
                    _ => 0,
                };
                let actions = events.iter().filter(|e| is_action_event(e)).count();
                let failures = events
                    .iter()
                    .filter(|e| is_action_event(e) && e.kind == RunEventKind::Error)
                    .count();
                UserMetrics {
                    loop_index,
                    total_ms,
                    actions,
                    failures,
                }
            })
            .collect();

        let total_actions = action_events.len();
        let total_failures = action_events
            .iter()
            .filter(|e| e.kind == RunEventKind::Error)
            .count();
        Self {
            per_step,
            per_user,
            total_actions,
            total_failures,
            failure_rate: ratio(total_failures, total_actions),
            dropped_events: record.dropped_events,
        }
    }
}

fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

/// Nearest-rank percentile over a sorted slice.
fn percentile(sorted: &[u64], p: f64) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let rank = (p * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}
