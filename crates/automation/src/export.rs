//! Validation and canonical export.
//!
//! Validation walks the whole action tree, including arrays nested
//! inside control-flow configs, enforcing the depth limit and the
//! structural rules plugins rely on. Export assigns deterministic ids to
//! actions that lack one, so re-exporting the same document is stable.

use serde_json::Value;

use crate::definition::{ActionDef, AutomationDefinition, StepDefinition};
use crate::error::DefinitionError;

/// Maximum nesting depth for control-flow action trees.
pub const MAX_ACTION_DEPTH: usize = 16;

/// Config keys holding nested action arrays, in traversal order.
const NESTED_ACTION_KEYS: [&str; 4] = ["if_actions", "else_actions", "final_actions", "loop_actions"];

impl AutomationDefinition {
    /// Structural validation: names, fan-out settings, action type keys,
    /// loop bounds, and the nested-action depth limit.
    pub fn validate(&self) -> Result<(), DefinitionError> {
        if self.automation.name.trim().is_empty() {
            return Err(DefinitionError::EmptyName);
        }
        let multirun = &self.automation.config.multirun;
        if multirun.enabled && multirun.count == 0 {
            return Err(DefinitionError::ZeroMultiRunCount);
        }
        for step in &self.steps {
            validate_step(step)?;
        }
        Ok(())
    }

    /// Check every action type (nested included) against a registry
    /// snapshot.
    pub fn validate_action_kinds(
        &self,
        is_known: impl Fn(&str) -> bool,
    ) -> Result<(), DefinitionError> {
        let mut unknown = None;
        self.visit_actions(&mut |action: &ActionDef| {
            if unknown.is_none() && !is_known(&action.action_type) {
                unknown = Some(action.action_type.clone());
            }
        });
        match unknown {
            Some(kind) => Err(DefinitionError::UnknownActionType { kind }),
            None => Ok(()),
        }
    }

    /// Visit every action in the document, nested arrays included.
    pub fn visit_actions(&self, visit: &mut impl FnMut(&ActionDef)) {
        for step in &self.steps {
            for action in &step.actions {
                visit_action(action, visit);
            }
        }
    }

    /// Assign deterministic ids to actions that lack one.
    ///
    /// Top-level actions inherit from their step (`{step_id}-{index}`);
    /// nested actions concatenate the parent action id with a running
    /// position index across the parent's nested arrays.
    pub fn normalize_ids(&mut self) {
        for step in &mut self.steps {
            let parent = if step.id.is_nil() {
                format!("s{}", step.step_order)
            } else {
                step.id.to_string()
            };
            for (index, action) in step.actions.iter_mut().enumerate() {
                normalize_action(action, &parent, index);
            }
        }
    }

    /// Canonical JSON export: normalized ids, stable shape.
    pub fn to_canonical_json(&self) -> Result<Value, serde_json::Error> {
        let mut doc = self.clone();
        doc.normalize_ids();
        serde_json::to_value(&doc)
    }
}

fn validate_step(step: &StepDefinition) -> Result<(), DefinitionError> {
    if step.name.trim().is_empty() {
        return Err(DefinitionError::EmptyStepName {
            step_order: step.step_order,
        });
    }
    if let Some(p) = step.config.probability
        && !(0.0..=1.0).contains(&p)
    {
        return Err(DefinitionError::InvalidProbability {
            step: step.name.clone(),
            value: p,
        });
    }
    for action in &step.actions {
        validate_action(action, &step.name, 1)?;
    }
    Ok(())
}

fn validate_action(
    action: &ActionDef,
    step_name: &str,
    depth: usize,
) -> Result<(), DefinitionError> {
    if depth > MAX_ACTION_DEPTH {
        return Err(DefinitionError::NestingTooDeep {
            max: MAX_ACTION_DEPTH,
        });
    }
    let kind = action.action_type.as_str();
    if !kind.contains(':') || kind.starts_with(':') || kind.ends_with(':') {
        return Err(DefinitionError::InvalidActionType {
            step: step_name.to_string(),
            kind: kind.to_string(),
        });
    }
    if kind == "flow:loop" && !loop_has_bound(&action.action_config) {
        return Err(DefinitionError::LoopWithoutBound);
    }
    for (key, nested) in nested_arrays(&action.action_config) {
        for item in nested {
            let child: ActionDef = serde_json::from_value(item.clone()).map_err(|source| {
                DefinitionError::MalformedNestedAction {
                    key: key.to_string(),
                    source,
                }
            })?;
            validate_action(&child, step_name, depth + 1)?;
        }
    }
    Ok(())
}

fn loop_has_bound(config: &Value) -> bool {
    let positive = |key: &str| config.get(key).and_then(Value::as_u64).is_some_and(|v| v > 0);
    positive("max_loops") || positive("timeout_ms")
}

/// Collect `(key, items)` for every nested action array in a config,
/// including each `else_if_conditions[i].actions`.
fn nested_arrays(config: &Value) -> Vec<(String, Vec<Value>)> {
    let mut found = Vec::new();
    let Some(map) = config.as_object() else {
        return found;
    };
    for key in NESTED_ACTION_KEYS {
        if let Some(Value::Array(items)) = map.get(key) {
            found.push((key.to_string(), items.clone()));
        }
    }
    if let Some(Value::Array(branches)) = map.get("else_if_conditions") {
        for (index, branch) in branches.iter().enumerate() {
            if let Some(Value::Array(items)) = branch.get("actions") {
                found.push((format!("else_if_conditions[{index}].actions"), items.clone()));
            }
        }
    }
    found
}

fn visit_action(action: &ActionDef, visit: &mut impl FnMut(&ActionDef)) {
    visit(action);
    for (_, nested) in nested_arrays(&action.action_config) {
        for item in nested {
            if let Ok(child) = serde_json::from_value::<ActionDef>(item) {
                visit_action(&child, visit);
            }
        }
    }
}

fn normalize_action(action: &mut ActionDef, parent: &str, index: usize) {
    let id = action
        .id
        .get_or_insert_with(|| format!("{parent}-{index}"))
        .clone();
    normalize_nested(&mut action.action_config, &id);
}

fn normalize_nested(config: &mut Value, parent: &str) {
    let mut position = 0usize;
    let Some(map) = config.as_object_mut() else {
        return;
    };
    for key in NESTED_ACTION_KEYS {
        if let Some(Value::Array(items)) = map.get_mut(key) {
            for item in items {
                normalize_nested_item(item, parent, &mut position);
            }
        }
    }
    if let Some(Value::Array(branches)) = map.get_mut("else_if_conditions") {
        for branch in branches {
            if let Some(Value::Array(items)) = branch.get_mut("actions") {
                for item in items {
                    normalize_nested_item(item, parent, &mut position);
                }
            }
        }
    }
}

fn normalize_nested_item(item: &mut Value, parent: &str, position: &mut usize) {
    let Some(map) = item.as_object_mut() else {
        return;
    };
    let id = match map.get("id").and_then(Value::as_str) {
        Some(existing) => existing.to_string(),
        None => {
            let assigned = format!("{parent}-{position}", position = *position);
            map.insert("id".into(), Value::String(assigned.clone()));
            assigned
        }
    };
    *position += 1;
    if let Some(child_config) = map.get_mut("action_config") {
        normalize_nested(child_config, &id);
    }
}
