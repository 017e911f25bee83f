//! Multi-user fan-out.
//!
//! One run becomes `count` user executions, sequential or parallel with
//! a staggered ramp-up. Each user owns its own page and variable
//! context; only the run-global variable map is shared. Cancellation is
//! observed between users (sequential) and inside every worker
//! (parallel) — users that never got to start are still accounted as
//! failures so `successes + failures = count` holds.

use std::future::Future;
use std::time::Duration;

use quasar_action::ActionError;
use quasar_automation::MultiRunMode;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// One user's failure.
#[derive(Debug)]
pub struct UserError {
    /// The user's ordinal within the run.
    pub loop_index: usize,
    /// What stopped the user.
    pub error: ActionError,
}

/// Aggregated fan-out result. `successes + failures` always equals the
/// requested user count.
#[derive(Debug, Default)]
pub struct FanOutOutcome {
    /// Users that ran every step.
    pub successes: usize,
    /// Users that failed or were cancelled.
    pub failures: usize,
    /// Per-user failures, ordered by loop index.
    pub errors: Vec<UserError>,
}

impl FanOutOutcome {
    fn record(&mut self, loop_index: usize, result: Result<(), ActionError>) {
        match result {
            Ok(()) => self.successes += 1,
            Err(error) => {
                self.failures += 1;
                self.errors.push(UserError { loop_index, error });
            }
        }
    }

    /// Returns `true` when every failure is a cancellation.
    #[must_use]
    pub fn all_failures_cancelled(&self) -> bool {
        !self.errors.is_empty() && self.errors.iter().all(|e| e.error.is_cancelled())
    }
}

/// Run `count` users through `run_user`.
///
/// Sequential mode sleeps `delay_ms` between users; parallel mode
/// launches all workers, the i-th sleeping `i * delay_ms` before
/// starting.
pub async fn fan_out<F, Fut>(
    count: usize,
    mode: MultiRunMode,
    delay_ms: u64,
    cancellation: &CancellationToken,
    run_user: F,
) -> FanOutOutcome
where
    F: Fn(usize) -> Fut,
    Fut: Future<Output = Result<(), ActionError>> + Send + 'static,
{
    let mut outcome = FanOutOutcome::default();
    match mode {
        MultiRunMode::Sequential => {
            for index in 0..count {
                if index > 0 && delay_ms > 0 && !cancellation.is_cancelled() {
                    tokio::select! {
                        () = tokio::time::sleep(Duration::from_millis(delay_ms)) => {}
                        () = cancellation.cancelled() => {}
                    }
                }
                if cancellation.is_cancelled() {
                    outcome.record(index, Err(ActionError::Cancelled));
                    continue;
                }
                debug!(loop_index = index, "starting user");
                outcome.record(index, run_user(index).await);
            }
        }
        MultiRunMode::Parallel => {
            let mut workers: JoinSet<(usize, Result<(), ActionError>)> = JoinSet::new();
            for index in 0..count {
                let stagger = Duration::from_millis(delay_ms * index as u64);
                let token = cancellation.clone();
                let user = run_user(index);
                workers.spawn(async move {
                    if stagger > Duration::ZERO {
                        tokio::select! {
                            () = tokio::time::sleep(stagger) => {}
                            () = token.cancelled() => return (index, Err(ActionError::Cancelled)),
                        }
                    }
                    if token.is_cancelled() {
                        return (index, Err(ActionError::Cancelled));
                    }
                    debug!(loop_index = index, "starting user");
                    (index, user.await)
                });
            }
            while let Some(joined) = workers.join_next().await {
                match joined {
                    Ok((index, result)) => outcome.record(index, result),
                    Err(join_error) => {
                        warn!(%join_error, "user worker panicked");
                        outcome.record(usize::MAX, Err(ActionError::validation("worker panicked")));
                    }
                }
            }
        }
    }
    outcome.errors.sort_by_key(|e| e.loop_index);
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::time::Instant;

    #[tokio::test]
    async fn sequential_runs_every_user_in_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let token = CancellationToken::new();

        let outcome = fan_out(3, MultiRunMode::Sequential, 0, &token, |index| {
            let order = Arc::clone(&order);
            async move {
                order.lock().push(index);
                Ok(())
            }
        })
        .await;

        assert_eq!(outcome.successes, 3);
        assert_eq!(outcome.failures, 0);
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn successes_plus_failures_equals_count() {
        let token = CancellationToken::new();
        let outcome = fan_out(4, MultiRunMode::Sequential, 0, &token, |index| async move {
            if index % 2 == 0 {
                Ok(())
            } else {
                Err(ActionError::validation("odd user fails"))
            }
        })
        .await;

        assert_eq!(outcome.successes + outcome.failures, 4);
        assert_eq!(outcome.failures, 2);
        let failed: Vec<usize> = outcome.errors.iter().map(|e| e.loop_index).collect();
        assert_eq!(failed, vec![1, 3]);
    }

    #[tokio::test]
    async fn parallel_staggers_worker_starts() {
        let starts = Arc::new(Mutex::new(Vec::new()));
        let token = CancellationToken::new();
        let begun = Instant::now();

        let outcome = fan_out(3, MultiRunMode::Parallel, 50, &token, |index| {
            let starts = Arc::clone(&starts);
            async move {
                starts.lock().push((index, begun.elapsed()));
                Ok(())
            }
        })
        .await;

        assert_eq!(outcome.successes, 3);
        let mut starts = starts.lock().clone();
        starts.sort_by_key(|(index, _)| *index);
        // Worker i sleeps i * delay before starting.
        assert!(starts[1].1 >= Duration::from_millis(45));
        assert!(starts[2].1 >= Duration::from_millis(95));
    }

    #[tokio::test]
    async fn cancellation_marks_remaining_users_failed() {
        let token = CancellationToken::new();
        let cancel_after_first = token.clone();

        let outcome = fan_out(3, MultiRunMode::Sequential, 0, &token, move |index| {
            let token = cancel_after_first.clone();
            async move {
                token.cancel();
                if index == 0 { Ok(()) } else { Err(ActionError::Cancelled) }
            }
        })
        .await;

        // User 0 completed before cancelling; 1 and 2 never started.
        assert_eq!(outcome.successes, 1);
        assert_eq!(outcome.failures, 2);
        assert!(outcome.all_failures_cancelled());
    }

    #[tokio::test]
    async fn parallel_collects_all_results() {
        let token = CancellationToken::new();
        let outcome = fan_out(8, MultiRunMode::Parallel, 0, &token, |index| async move {
            if index == 5 {
                Err(ActionError::validation("five"))
            } else {
                Ok(())
            }
        })
        .await;

        assert_eq!(outcome.successes, 7);
        assert_eq!(outcome.failures, 1);
        assert_eq!(outcome.errors[0].loop_index, 5);
    }

    #[test]
    fn all_failures_cancelled_requires_at_least_one_error() {
        let outcome = FanOutOutcome::default();
        assert!(!outcome.all_failures_cancelled());
    }
}
