//! Recursive action dispatch.
//!
//! The interpreter resolves one [`ActionDef`] to its handler, stamps
//! timing and identity onto the run's event stream, and exposes
//! [`run_sequence`](Interpreter::run_sequence) for control-flow handlers
//! to dispatch their nested action arrays. Cancellation is polled before
//! every dispatch, making each action a cooperative checkpoint.

use std::sync::Arc;
use std::time::Instant;

use quasar_automation::ActionDef;
use quasar_run::RunEvent;
use tracing::debug;

use crate::context::ActionContext;
use crate::error::ActionError;
use crate::registry::Registry;

/// Maximum nesting depth for control-flow dispatch, matching the
/// definition-level limit enforced at load time.
pub const MAX_NESTING_DEPTH: usize = 16;

/// Dispatches actions through a [`Registry`].
#[derive(Debug, Clone)]
pub struct Interpreter {
    registry: Arc<Registry>,
}

impl Interpreter {
    /// Create an interpreter over the given registry.
    #[must_use]
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// The underlying registry.
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Execute one action.
    ///
    /// Emits a `progress` event with the action's duration on success
    /// and an `error` event on failure, then restores the context's
    /// previous action identity so callers see their own frame again.
    pub async fn execute(
        &self,
        ctx: &mut ActionContext,
        action: &ActionDef,
    ) -> Result<(), ActionError> {
        ctx.check_cancelled()?;

        let handler = self
            .registry
            .get(&action.action_type)
            .cloned()
            .ok_or_else(|| ActionError::UnknownType(action.action_type.clone()))?;

        let prev_id = ctx.action_id.take();
        let prev_type = ctx.action_type.take();
        ctx.action_id.clone_from(&action.id);
        ctx.action_type = Some(action.action_type.clone());

        debug!(
            action = %action.action_type,
            action_id = action.id.as_deref().unwrap_or("-"),
            loop_index = ctx.vars.loop_index,
            "dispatching action"
        );

        let started = Instant::now();
        let result = handler.execute(ctx, &action.action_config, self).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match &result {
            Ok(()) => {
                ctx.emit(RunEvent::progress("action completed").with_duration(duration_ms));
            }
            Err(err) => {
                ctx.emit(RunEvent::error(err.to_string()).with_duration(duration_ms));
            }
        }

        ctx.action_id = prev_id;
        ctx.action_type = prev_type;
        result
    }

    /// Execute a nested action array in order, stopping at the first
    /// failure.
    ///
    /// The currently executing action becomes the `parent_action_id` of
    /// every nested event, so subscribers can render the dispatch tree.
    pub async fn run_sequence(
        &self,
        ctx: &mut ActionContext,
        actions: &[ActionDef],
    ) -> Result<(), ActionError> {
        if actions.is_empty() {
            return Ok(());
        }
        if ctx.depth >= MAX_NESTING_DEPTH {
            return Err(ActionError::validation(format!(
                "nested actions exceed max depth {MAX_NESTING_DEPTH}"
            )));
        }

        let prev_parent = ctx.parent_action_id.take();
        ctx.parent_action_id.clone_from(&ctx.action_id);
        ctx.depth += 1;

        let mut result = Ok(());
        for action in actions {
            if let Err(err) = Box::pin(self.execute(ctx, action)).await {
                result = Err(err);
                break;
            }
        }

        ctx.depth -= 1;
        ctx.parent_action_id = prev_parent;
        result
    }
}
