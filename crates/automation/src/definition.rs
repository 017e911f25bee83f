//! Automation, step, and action definitions.

use quasar_core::{AutomationId, StepId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::AutomationConfig;

/// Predicate over the current user's loop index, used by step skip
/// conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepPredicate {
    /// True for users 0, 2, 4, ...
    LoopIndexIsEven,
    /// True for users 1, 3, 5, ...
    LoopIndexIsOdd,
    /// True when the loop index is prime.
    LoopIndexIsPrime,
    /// Bernoulli draw (`probability` from the step config, default 0.5).
    Random,
}

/// Step-level configuration.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StepConfig {
    /// Skip the step when the predicate holds. Takes precedence over
    /// `run_only_on` when both are set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_on: Option<StepPredicate>,
    /// Run the step only when the predicate holds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_only_on: Option<StepPredicate>,
    /// Bernoulli parameter for the `random` predicate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probability: Option<f64>,
}

/// One typed action within a step.
///
/// `action_config`'s schema is owned by the plugin registered for
/// `action_type`. Control-flow actions nest further `{id?, action_type,
/// action_config}` arrays inside their config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDef {
    /// Stable identifier; assigned deterministically on export when
    /// missing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Namespaced type key, e.g. `"browser:goto"`.
    pub action_type: String,
    /// Position within the owning step.
    #[serde(default)]
    pub action_order: u32,
    /// Plugin-owned configuration document.
    #[serde(default = "default_config")]
    pub action_config: Value,
}

fn default_config() -> Value {
    Value::Object(serde_json::Map::new())
}

impl ActionDef {
    /// Construct an action with an empty config.
    #[must_use]
    pub fn new(action_type: impl Into<String>) -> Self {
        Self {
            id: None,
            action_type: action_type.into(),
            action_order: 0,
            action_config: default_config(),
        }
    }

    /// Construct an action with the given config document.
    #[must_use]
    pub fn with_config(action_type: impl Into<String>, config: Value) -> Self {
        Self {
            id: None,
            action_type: action_type.into(),
            action_order: 0,
            action_config: config,
        }
    }
}

/// An ordered group of actions with an optional skip predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDefinition {
    /// Durable identifier; nil for documents authored by hand.
    #[serde(default = "StepId::nil")]
    pub id: StepId,
    /// Human-readable step name, surfaced on events and reports.
    pub name: String,
    /// Position within the automation.
    #[serde(default)]
    pub step_order: u32,
    /// Skip/run-only predicates.
    #[serde(default)]
    pub config: StepConfig,
    /// Ordered actions.
    #[serde(default)]
    pub actions: Vec<ActionDef>,
}

/// Automation identity and configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomationMeta {
    /// Durable identifier; nil for documents authored by hand.
    #[serde(default = "AutomationId::nil")]
    pub id: AutomationId,
    /// Automation name.
    pub name: String,
    /// Free-text description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Automation-level configuration.
    #[serde(default)]
    pub config: AutomationConfig,
}

/// The full automation document: metadata plus ordered steps.
///
/// This type serializes to the canonical export shape directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomationDefinition {
    /// Identity, description, and configuration.
    pub automation: AutomationMeta,
    /// Ordered steps.
    #[serde(default)]
    pub steps: Vec<StepDefinition>,
}

impl AutomationDefinition {
    /// Parse a definition from its canonical JSON text.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Steps sorted by `step_order` (stable for equal orders).
    #[must_use]
    pub fn ordered_steps(&self) -> Vec<&StepDefinition> {
        let mut steps: Vec<&StepDefinition> = self.steps.iter().collect();
        steps.sort_by_key(|s| s.step_order);
        steps
    }
}
