//! The action handler trait.

use async_trait::async_trait;
use serde_json::Value;

use crate::context::ActionContext;
use crate::error::ActionError;
use crate::interpreter::Interpreter;

/// One executable action type.
///
/// Handlers are stateless: a single instance is shared across every
/// dispatch and every run. All per-execution state lives in the
/// [`ActionContext`] and the `config` document.
///
/// Control-flow handlers receive the [`Interpreter`] to recursively
/// dispatch the action arrays nested in their config.
///
/// # Object Safety
///
/// The trait is object-safe; the registry stores handlers as
/// `Arc<dyn ActionHandler>`.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// The namespaced type key this handler executes
    /// (e.g. `"browser:goto"`).
    fn kind(&self) -> &'static str;

    /// Execute one action against the user's context.
    ///
    /// `config` is the raw (unresolved) config document; handlers run
    /// their string leaves through the context's resolver so runtime
    /// variables written by earlier actions are visible.
    async fn execute(
        &self,
        ctx: &mut ActionContext,
        config: &Value,
        interpreter: &Interpreter,
    ) -> Result<(), ActionError>;
}
