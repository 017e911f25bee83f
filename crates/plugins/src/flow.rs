//! Control-flow actions.
//!
//! `flow:if` and `flow:loop` hold nested action arrays in their config
//! and dispatch them through the interpreter, so the full variable
//! context (and cancellation) flows into every branch. Their configs
//! are parsed raw: nested action configs must stay unresolved until
//! their own dispatch, because runtime variables can change between
//! branch selection and execution.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use quasar_action::{ActionContext, ActionError, ActionHandler, Interpreter};
use quasar_automation::ActionDef;
use quasar_driver::ElementState;
use quasar_expression::ExpressionError;
use quasar_run::{LogLevel, RunEvent};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::config::{parse_config, parse_raw};

/// Pause between loop iterations, a back-off against busy condition
/// polling.
const LOOP_ITERATION_BACKOFF: Duration = Duration::from_millis(100);

/// Every condition a `flow:if` / `flow:loop` can test.
///
/// Element conditions require a `selector`; the rest operate on a
/// `variable_path` into the runtime scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionType {
    // Element conditions
    /// Element accepts input.
    IsEnabled,
    /// Element rejects input.
    IsDisabled,
    /// Element is rendered.
    IsVisible,
    /// Element is not rendered.
    IsHidden,
    /// Checkbox/radio is checked.
    IsChecked,
    /// Element is editable.
    IsEditable,
    // Runtime-variable conditions
    /// Deep equality with `expected_value`.
    Equals,
    /// Negated equality.
    NotEquals,
    /// String/array/object containment of `expected_value`.
    Contains,
    /// Negated containment.
    NotContains,
    /// The value is `null` (or the path is absent).
    IsNull,
    /// The value is present and non-null.
    IsNotNull,
    /// The value is `true`.
    IsTrue,
    /// The value is `false`.
    IsFalse,
    /// Numeric `>` against `expected_value`.
    GreaterThan,
    /// Numeric `<`.
    LessThan,
    /// Numeric `>=`.
    GreaterThanOrEqual,
    /// Numeric `<=`.
    LessThanOrEqual,
}

impl ConditionType {
    fn element_state(self) -> Option<ElementState> {
        match self {
            Self::IsEnabled => Some(ElementState::IsEnabled),
            Self::IsDisabled => Some(ElementState::IsDisabled),
            Self::IsVisible => Some(ElementState::IsVisible),
            Self::IsHidden => Some(ElementState::IsHidden),
            Self::IsChecked => Some(ElementState::IsChecked),
            Self::IsEditable => Some(ElementState::IsEditable),
            _ => None,
        }
    }

    fn tolerates_missing_path(self) -> bool {
        matches!(self, Self::IsNull | Self::IsNotNull)
    }
}

/// A testable condition: a browser element state or a predicate over a
/// runtime variable.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Condition {
    /// Element selector (browser variant).
    #[serde(default)]
    pub selector: Option<String>,
    /// Path into the runtime scope, `runtime.`-prefixed.
    #[serde(default)]
    pub variable_path: Option<String>,
    /// The predicate to apply.
    #[serde(default)]
    pub condition_type: Option<ConditionType>,
    /// Comparison operand for binary predicates.
    #[serde(default)]
    pub expected_value: Option<Value>,
}

impl Condition {
    /// Whether any condition is configured at all.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.selector.is_some() || self.variable_path.is_some()
    }

    /// Evaluate against the current context.
    pub async fn evaluate(&self, ctx: &ActionContext) -> Result<bool, ActionError> {
        let condition_type = self.condition_type.ok_or_else(|| {
            ActionError::validation("condition requires condition_type")
        })?;

        if let Some(selector) = &self.selector {
            let state = condition_type.element_state().ok_or_else(|| {
                ActionError::validation(format!(
                    "condition {condition_type:?} requires variable_path, not selector"
                ))
            })?;
            let selector = ctx.resolve_str(selector)?;
            return Ok(ctx.page().element_state(&selector, state).await?);
        }

        let Some(path) = &self.variable_path else {
            return Err(ActionError::validation(
                "condition requires selector or variable_path",
            ));
        };
        if condition_type.element_state().is_some() {
            return Err(ActionError::validation(format!(
                "condition {condition_type:?} requires selector, not variable_path"
            )));
        }
        let path = ctx.resolve_str(path)?;
        let inner = path.strip_prefix("runtime.").ok_or_else(|| {
            ActionError::validation(format!("variable_path must start with 'runtime.': {path}"))
        })?;
        let value = match ctx.vars.lookup_runtime(inner) {
            Ok(value) => value,
            Err(
                ExpressionError::MissingKey { .. } | ExpressionError::IndexOutOfBounds { .. },
            ) if condition_type.tolerates_missing_path() => Value::Null,
            Err(err) => return Err(err.into()),
        };
        let expected = match &self.expected_value {
            Some(raw) => Some(ctx.resolve_value(raw)?),
            None => None,
        };
        evaluate_runtime_condition(condition_type, &value, expected.as_ref())
    }
}

fn evaluate_runtime_condition(
    condition_type: ConditionType,
    value: &Value,
    expected: Option<&Value>,
) -> Result<bool, ActionError> {
    let require_expected = || {
        expected.ok_or_else(|| {
            ActionError::validation(format!(
                "condition {condition_type:?} requires expected_value"
            ))
        })
    };
    match condition_type {
        ConditionType::Equals => Ok(values_equal(value, require_expected()?)),
        ConditionType::NotEquals => Ok(!values_equal(value, require_expected()?)),
        ConditionType::Contains => Ok(value_contains(value, require_expected()?)),
        ConditionType::NotContains => Ok(!value_contains(value, require_expected()?)),
        ConditionType::IsNull => Ok(value.is_null()),
        ConditionType::IsNotNull => Ok(!value.is_null()),
        ConditionType::IsTrue => Ok(value_truth(value) == Some(true)),
        ConditionType::IsFalse => Ok(value_truth(value) == Some(false)),
        ConditionType::GreaterThan
        | ConditionType::LessThan
        | ConditionType::GreaterThanOrEqual
        | ConditionType::LessThanOrEqual => {
            let left = value_number(value).ok_or_else(|| {
                ActionError::validation(format!("cannot compare non-numeric value {value}"))
            })?;
            let right = value_number(require_expected()?).ok_or_else(|| {
                ActionError::validation("cannot compare against non-numeric expected_value")
            })?;
            Ok(match condition_type {
                ConditionType::GreaterThan => left > right,
                ConditionType::LessThan => left < right,
                ConditionType::GreaterThanOrEqual => left >= right,
                _ => left <= right,
            })
        }
        _ => unreachable!("element conditions handled before runtime dispatch"),
    }
}

/// Equality tolerant of string/number representation differences, since
/// template expansion stringifies scalars.
fn values_equal(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    match (a, b) {
        (Value::String(s), other) | (other, Value::String(s)) => {
            !other.is_string() && render(other) == *s
        }
        _ => false,
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn value_contains(haystack: &Value, needle: &Value) -> bool {
    match haystack {
        Value::String(s) => s.contains(&render(needle)),
        Value::Array(items) => items.iter().any(|item| values_equal(item, needle)),
        Value::Object(map) => map.contains_key(&render(needle)),
        _ => false,
    }
}

fn value_truth(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) if s == "true" => Some(true),
        Value::String(s) if s == "false" => Some(false),
        _ => None,
    }
}

fn value_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
struct ElseIfBranch {
    #[serde(flatten)]
    condition: Condition,
    #[serde(default)]
    actions: Vec<ActionDef>,
}

#[derive(Debug, Deserialize)]
struct FlowIfConfig {
    #[serde(flatten)]
    condition: Condition,
    #[serde(default)]
    if_actions: Vec<ActionDef>,
    #[serde(default)]
    else_if_conditions: Vec<ElseIfBranch>,
    #[serde(default)]
    else_actions: Vec<ActionDef>,
    #[serde(default)]
    final_actions: Vec<ActionDef>,
}

/// `flow:if` — conditional branching with else-if chains and an
/// always-run final block.
pub struct If;

#[async_trait]
impl ActionHandler for If {
    fn kind(&self) -> &'static str {
        "flow:if"
    }

    async fn execute(
        &self,
        ctx: &mut ActionContext,
        config: &Value,
        interpreter: &Interpreter,
    ) -> Result<(), ActionError> {
        let cfg: FlowIfConfig = parse_raw(config)?;
        if !cfg.condition.is_configured() {
            return Err(ActionError::validation(
                "flow:if requires selector or variable_path",
            ));
        }

        let mut outcome: Result<(), ActionError> = Ok(());
        let mut branch: Option<&[ActionDef]> = None;
        match cfg.condition.evaluate(ctx).await {
            Ok(true) => branch = Some(&cfg.if_actions),
            Ok(false) => {
                for else_if in &cfg.else_if_conditions {
                    match else_if.condition.evaluate(ctx).await {
                        Ok(true) => {
                            branch = Some(&else_if.actions);
                            break;
                        }
                        Ok(false) => {}
                        Err(err) => {
                            outcome = Err(err);
                            break;
                        }
                    }
                }
                if branch.is_none() && outcome.is_ok() {
                    branch = Some(&cfg.else_actions);
                }
            }
            Err(err) => outcome = Err(err),
        }

        if outcome.is_ok()
            && let Some(actions) = branch
        {
            outcome = interpreter.run_sequence(ctx, actions).await;
        }

        // final_actions run regardless; the earliest error wins.
        let final_outcome = interpreter.run_sequence(ctx, &cfg.final_actions).await;
        match outcome {
            Err(err) => Err(err),
            Ok(()) => final_outcome,
        }
    }
}

#[derive(Debug, Deserialize)]
struct FlowLoopConfig {
    #[serde(flatten)]
    condition: Condition,
    #[serde(default)]
    max_loops: u64,
    #[serde(default)]
    timeout_ms: u64,
    #[serde(default)]
    fail_on_force_stop: bool,
    #[serde(default)]
    loop_actions: Vec<ActionDef>,
}

/// `flow:loop` — bounded loop with an optional exit condition.
///
/// At least one of `max_loops` / `timeout_ms` must be positive. Budget
/// exhaustion force-stops the loop: a failure when
/// `fail_on_force_stop` is set, a warning event otherwise.
pub struct Loop;

#[async_trait]
impl ActionHandler for Loop {
    fn kind(&self) -> &'static str {
        "flow:loop"
    }

    async fn execute(
        &self,
        ctx: &mut ActionContext,
        config: &Value,
        interpreter: &Interpreter,
    ) -> Result<(), ActionError> {
        let cfg: FlowLoopConfig = parse_raw(config)?;
        if cfg.max_loops == 0 && cfg.timeout_ms == 0 {
            return Err(ActionError::validation(
                "flow:loop requires max_loops or timeout_ms",
            ));
        }

        let started = Instant::now();
        let saved_index = ctx.vars.local_loop_index;
        let result = self.run_loop(ctx, &cfg, interpreter, started).await;
        ctx.vars.local_loop_index = saved_index;
        result
    }
}

impl Loop {
    async fn run_loop(
        &self,
        ctx: &mut ActionContext,
        cfg: &FlowLoopConfig,
        interpreter: &Interpreter,
        started: Instant,
    ) -> Result<(), ActionError> {
        let mut iteration: u64 = 0;
        loop {
            iteration += 1;
            ctx.vars.local_loop_index = iteration as usize;
            ctx.check_cancelled()?;

            if cfg.condition.is_configured() && cfg.condition.evaluate(ctx).await? {
                debug!(iteration, "loop condition met");
                return Ok(());
            }

            let budget_spent = (cfg.max_loops > 0 && iteration > cfg.max_loops)
                || (cfg.timeout_ms > 0
                    && started.elapsed() >= Duration::from_millis(cfg.timeout_ms));
            if budget_spent {
                let iterations = (iteration - 1) as usize;
                if cfg.fail_on_force_stop {
                    return Err(ActionError::ForceStop { iterations });
                }
                ctx.emit(RunEvent::log(
                    LogLevel::Warn,
                    format!("loop force-stopped after {iterations} iterations"),
                ));
                return Ok(());
            }

            interpreter.run_sequence(ctx, &cfg.loop_actions).await?;

            tokio::select! {
                () = tokio::time::sleep(LOOP_ITERATION_BACKOFF) => {}
                () = ctx.cancellation.cancelled() => return Err(ActionError::Cancelled),
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct FlowLogConfig {
    message: String,
    #[serde(default)]
    level: LogLevel,
}

/// `flow:log` — emit a log event with template expansion.
pub struct Log;

#[async_trait]
impl ActionHandler for Log {
    fn kind(&self) -> &'static str {
        "flow:log"
    }

    async fn execute(
        &self,
        ctx: &mut ActionContext,
        config: &Value,
        _interpreter: &Interpreter,
    ) -> Result<(), ActionError> {
        let cfg: FlowLogConfig = parse_config(ctx, config)?;
        ctx.emit(RunEvent::log(cfg.level, cfg.message));
        Ok(())
    }
}
