//! Runtime context threaded through every action.

use std::sync::Arc;

use quasar_core::{AutomationId, ProjectId, RunId};
use quasar_driver::Page;
use quasar_eventbus::EventBus;
use quasar_expression::VariableContext;
use quasar_run::RunEvent;
use quasar_storage::ObjectStore;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::ActionError;

/// Everything one user's actions execute against.
///
/// Built by the executor at user start and owned by that user for its
/// lifetime: the page is exclusive, the variable context is private
/// (apart from its shared global slice), and the event bus fans out to
/// the run's subscribers.
///
/// Long-running handlers **must** poll
/// [`check_cancelled`](Self::check_cancelled) at their suspension
/// points; the interpreter additionally polls before every dispatch.
pub struct ActionContext {
    /// The run being executed.
    pub run_id: RunId,
    /// The automation being executed.
    pub automation_id: AutomationId,
    /// The owning project.
    pub project_id: ProjectId,
    /// Per-user variables (static, dynamic, runtime, shared global).
    pub vars: VariableContext,
    /// Cancellation signal, checked cooperatively.
    pub cancellation: CancellationToken,
    /// Current step identity, stamped onto emitted events.
    pub step_id: Option<String>,
    /// Current step name.
    pub step_name: Option<String>,
    /// Currently executing action id.
    pub action_id: Option<String>,
    /// Currently executing action type key.
    pub action_type: Option<String>,
    /// Enclosing control-flow action id during nested dispatch.
    pub parent_action_id: Option<String>,
    /// Current nesting depth of control-flow dispatch.
    pub depth: usize,
    page: Arc<dyn Page>,
    store: Arc<dyn ObjectStore>,
    events: Arc<EventBus<RunEvent>>,
}

impl ActionContext {
    /// Assemble a context for one user.
    pub fn new(
        run_id: RunId,
        automation_id: AutomationId,
        project_id: ProjectId,
        vars: VariableContext,
        page: Arc<dyn Page>,
        store: Arc<dyn ObjectStore>,
        events: Arc<EventBus<RunEvent>>,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            run_id,
            automation_id,
            project_id,
            vars,
            cancellation,
            step_id: None,
            step_name: None,
            action_id: None,
            action_type: None,
            parent_action_id: None,
            depth: 0,
            page,
            store,
            events,
        }
    }

    /// The user's browser page.
    #[must_use]
    pub fn page(&self) -> &Arc<dyn Page> {
        &self.page
    }

    /// The run's object store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// The run's event bus.
    #[must_use]
    pub fn events(&self) -> &Arc<EventBus<RunEvent>> {
        &self.events
    }

    /// Emit an event, stamping current step/action identity and loop
    /// ordinals onto any fields the caller left unset.
    pub fn emit(&self, mut event: RunEvent) {
        if event.step_id.is_none() {
            event.step_id.clone_from(&self.step_id);
        }
        if event.step_name.is_none() {
            event.step_name.clone_from(&self.step_name);
        }
        if event.action_id.is_none() {
            event.action_id.clone_from(&self.action_id);
        }
        if event.action_type.is_none() {
            event.action_type.clone_from(&self.action_type);
        }
        if event.parent_action_id.is_none() {
            event.parent_action_id.clone_from(&self.parent_action_id);
        }
        if event.loop_index.is_none() {
            event.loop_index = Some(self.vars.loop_index);
        }
        if event.local_loop_index.is_none() {
            event.local_loop_index = Some(self.vars.local_loop_index);
        }
        self.events.emit(event);
    }

    /// Fail fast when the run has been cancelled.
    pub fn check_cancelled(&self) -> Result<(), ActionError> {
        if self.cancellation.is_cancelled() {
            Err(ActionError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Expand templates in a string against the user's variables.
    pub fn resolve_str(&self, input: &str) -> Result<String, ActionError> {
        Ok(self.vars.resolve_str(input)?)
    }

    /// Expand templates in every string leaf of a config document.
    pub fn resolve_value(&self, value: &Value) -> Result<Value, ActionError> {
        Ok(self.vars.resolve_value(value)?)
    }

    /// Enter a step: subsequent events carry its identity.
    pub fn enter_step(&mut self, id: impl Into<String>, name: impl Into<String>) {
        self.step_id = Some(id.into());
        self.step_name = Some(name.into());
    }

    /// Leave the current step.
    pub fn leave_step(&mut self) {
        self.step_id = None;
        self.step_name = None;
    }
}
