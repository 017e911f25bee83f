//! Definition validation errors.

use thiserror::Error;

/// Errors raised while validating or exporting an automation document.
#[derive(Debug, Error)]
pub enum DefinitionError {
    /// The automation name is empty.
    #[error("automation name is empty")]
    EmptyName,

    /// A step has no name.
    #[error("step at order {step_order} has no name")]
    EmptyStepName {
        /// The offending step's order.
        step_order: u32,
    },

    /// Multi-run is enabled with a zero user count.
    #[error("multirun enabled with count 0")]
    ZeroMultiRunCount,

    /// A step probability is outside `[0, 1]`.
    #[error("step {step:?}: probability {value} outside [0, 1]")]
    InvalidProbability {
        /// Step name.
        step: String,
        /// The offending value.
        value: f64,
    },

    /// An action's type key is empty or not namespaced.
    #[error("step {step:?}: action type {kind:?} is not a namespaced key")]
    InvalidActionType {
        /// Step name.
        step: String,
        /// The offending type key.
        kind: String,
    },

    /// An action type has no registered handler.
    #[error("unknown action type: {kind}")]
    UnknownActionType {
        /// The unknown type key.
        kind: String,
    },

    /// Nested control-flow actions exceed the depth limit.
    #[error("nested actions exceed max depth {max}")]
    NestingTooDeep {
        /// The configured limit.
        max: usize,
    },

    /// A `flow:loop` declares neither `max_loops` nor `timeout_ms`.
    #[error("flow:loop without max_loops or timeout_ms")]
    LoopWithoutBound,

    /// A nested action entry did not parse as `{id?, action_type,
    /// action_config}`.
    #[error("malformed nested action under {key:?}: {source}")]
    MalformedNestedAction {
        /// The config key holding the nested array.
        key: String,
        /// The parse failure.
        #[source]
        source: serde_json::Error,
    },
}
