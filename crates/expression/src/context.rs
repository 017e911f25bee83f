//! Per-user variable context.
//!
//! Each user of a run owns one context. The runtime scope is local to the
//! user; the global scope is shared across all users of the same run and
//! guarded by a lock. Environment values (`runId`, `loopIndex`, ...) are
//! carried as fields and surfaced through template placeholders.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ExpressionError;
use crate::path;

/// Where a runtime-variable write lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableScope {
    /// Visible only to the writing user.
    #[default]
    Local,
    /// Shared across every user of the run.
    Global,
}

/// The per-user bag of variables available to template expansion.
#[derive(Debug, Clone)]
pub struct VariableContext {
    /// Run identifier, as rendered by `{{runId}}`.
    pub run_id: String,
    /// Project identifier, as rendered by `{{projectId}}`.
    pub project_id: String,
    /// Automation identifier, as rendered by `{{automationId}}`.
    pub automation_id: String,
    /// User ordinal within the run (0-based).
    pub loop_index: usize,
    /// Ordinal within the innermost enclosing bounded loop (1-based, 0
    /// outside any loop).
    pub local_loop_index: usize,
    static_vars: HashMap<String, String>,
    dynamic_vars: HashMap<String, String>,
    runtime_vars: Map<String, Value>,
    global_vars: Arc<RwLock<Map<String, Value>>>,
}

impl VariableContext {
    /// Create a context for one user.
    ///
    /// `global_vars` is the run-wide shared map; every user of the run
    /// receives a clone of the same `Arc`.
    #[must_use]
    pub fn new(
        run_id: impl Into<String>,
        project_id: impl Into<String>,
        automation_id: impl Into<String>,
        loop_index: usize,
        global_vars: Arc<RwLock<Map<String, Value>>>,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            project_id: project_id.into(),
            automation_id: automation_id.into(),
            loop_index,
            local_loop_index: 0,
            static_vars: HashMap::new(),
            dynamic_vars: HashMap::new(),
            runtime_vars: Map::new(),
            global_vars,
        }
    }

    /// Declare a static variable (literal value, resolved once).
    pub fn set_static(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.static_vars.insert(key.into(), value.into());
    }

    /// Declare a dynamic variable (template re-expanded on each use).
    pub fn set_dynamic(&mut self, key: impl Into<String>, template: impl Into<String>) {
        self.dynamic_vars.insert(key.into(), template.into());
    }

    /// Write a runtime value into the chosen scope.
    pub fn set_runtime(&mut self, key: impl Into<String>, value: Value, scope: VariableScope) {
        match scope {
            VariableScope::Local => {
                self.runtime_vars.insert(key.into(), value);
            }
            VariableScope::Global => {
                self.global_vars.write().insert(key.into(), value);
            }
        }
    }

    /// Write a runtime value under a dotted name, creating intermediate
    /// objects (`save_as = "api.status"` yields `{"api": {"status": ...}}`).
    pub fn set_runtime_path(&mut self, path: &str, value: Value, scope: VariableScope) {
        let segments: Vec<&str> = path.split('.').filter(|s| !s.is_empty()).collect();
        if segments.len() <= 1 {
            self.set_runtime(path, value, scope);
            return;
        }
        match scope {
            VariableScope::Local => insert_nested(&mut self.runtime_vars, &segments, value),
            VariableScope::Global => {
                insert_nested(&mut self.global_vars.write(), &segments, value);
            }
        }
    }

    /// Read a top-level runtime value, local scope first, then global.
    #[must_use]
    pub fn get_runtime(&self, key: &str) -> Option<Value> {
        self.runtime_vars
            .get(key)
            .cloned()
            .or_else(|| self.global_vars.read().get(key).cloned())
    }

    /// Resolve a dotted runtime path (without the `runtime.` prefix).
    ///
    /// The first segment decides the scope: a root key present in the
    /// local map binds locally, otherwise the global map is consulted.
    pub fn lookup_runtime(&self, inner_path: &str) -> Result<Value, ExpressionError> {
        let segments = path::parse_path(inner_path)?;
        let root_key = match segments.first() {
            Some(path::PathSegment::Key(key)) => key.clone(),
            _ => {
                return Err(ExpressionError::InvalidSegment {
                    path: inner_path.to_string(),
                    segment: String::new(),
                });
            }
        };

        if self.runtime_vars.contains_key(&root_key) {
            let root = Value::Object(self.runtime_vars.clone());
            return path::lookup(&root, inner_path).cloned();
        }
        let globals = self.global_vars.read();
        if globals.contains_key(&root_key) {
            let root = Value::Object(globals.clone());
            return path::lookup(&root, inner_path).cloned();
        }
        Err(ExpressionError::MissingKey {
            path: inner_path.to_string(),
            segment: root_key,
        })
    }

    /// The static variable map (resolved literals).
    #[must_use]
    pub fn static_vars(&self) -> &HashMap<String, String> {
        &self.static_vars
    }

    /// The dynamic variable templates.
    #[must_use]
    pub fn dynamic_vars(&self) -> &HashMap<String, String> {
        &self.dynamic_vars
    }

    /// Snapshot of the local runtime scope.
    #[must_use]
    pub fn runtime_vars(&self) -> &Map<String, Value> {
        &self.runtime_vars
    }

    /// Handle to the shared global scope.
    #[must_use]
    pub fn global_vars(&self) -> Arc<RwLock<Map<String, Value>>> {
        Arc::clone(&self.global_vars)
    }
}

fn insert_nested(map: &mut Map<String, Value>, segments: &[&str], value: Value) {
    let Some((first, rest)) = segments.split_first() else {
        return;
    };
    if rest.is_empty() {
        map.insert((*first).to_string(), value);
        return;
    }
    let entry = map
        .entry((*first).to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !entry.is_object() {
        *entry = Value::Object(Map::new());
    }
    if let Value::Object(child) = entry {
        insert_nested(child, rest, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn ctx() -> VariableContext {
        VariableContext::new("run-1", "proj-1", "auto-1", 0, Arc::default())
    }

    #[test]
    fn runtime_write_and_read_local() {
        let mut ctx = ctx();
        ctx.set_runtime("token", json!("abc"), VariableScope::Local);
        assert_eq!(ctx.get_runtime("token"), Some(json!("abc")));
    }

    #[test]
    fn global_writes_visible_to_other_users() {
        let shared = Arc::new(RwLock::new(Map::new()));
        let mut user0 =
            VariableContext::new("r", "p", "a", 0, Arc::clone(&shared));
        let user1 = VariableContext::new("r", "p", "a", 1, shared);

        user0.set_runtime("winner", json!(0), VariableScope::Global);
        assert_eq!(user1.get_runtime("winner"), Some(json!(0)));
    }

    #[test]
    fn local_scope_shadows_global() {
        let shared = Arc::new(RwLock::new(Map::new()));
        shared.write().insert("k".into(), json!("global"));
        let mut ctx = VariableContext::new("r", "p", "a", 0, shared);
        ctx.set_runtime("k", json!("local"), VariableScope::Local);

        assert_eq!(ctx.get_runtime("k"), Some(json!("local")));
        assert_eq!(ctx.lookup_runtime("k").unwrap(), json!("local"));
    }

    #[test]
    fn lookup_runtime_traverses_nested_values() {
        let mut ctx = ctx();
        ctx.set_runtime(
            "api",
            json!({"items": [{"id": 1}, {"id": 2}]}),
            VariableScope::Local,
        );
        assert_eq!(ctx.lookup_runtime("api.items[1].id").unwrap(), json!(2));
    }

    #[test]
    fn lookup_runtime_falls_back_to_global_scope() {
        let shared = Arc::new(RwLock::new(Map::new()));
        shared.write().insert("session".into(), json!({"id": "s-9"}));
        let ctx = VariableContext::new("r", "p", "a", 0, shared);
        assert_eq!(ctx.lookup_runtime("session.id").unwrap(), json!("s-9"));
    }

    #[test]
    fn dotted_save_as_builds_nested_objects() {
        let mut ctx = ctx();
        ctx.set_runtime_path("api.status", json!("ok"), VariableScope::Local);
        ctx.set_runtime_path("api.user.id", json!(7), VariableScope::Local);

        assert_eq!(
            ctx.get_runtime("api"),
            Some(json!({"status": "ok", "user": {"id": 7}}))
        );
        assert_eq!(ctx.lookup_runtime("api.status").unwrap(), json!("ok"));
    }

    #[test]
    fn dotted_save_as_replaces_scalar_intermediates() {
        let mut ctx = ctx();
        ctx.set_runtime("api", json!("scalar"), VariableScope::Local);
        ctx.set_runtime_path("api.status", json!("ok"), VariableScope::Local);
        assert_eq!(ctx.lookup_runtime("api.status").unwrap(), json!("ok"));
    }

    #[test]
    fn dotted_save_as_into_global_scope() {
        let shared = Arc::new(RwLock::new(Map::new()));
        let mut user0 = VariableContext::new("r", "p", "a", 0, Arc::clone(&shared));
        let user1 = VariableContext::new("r", "p", "a", 1, shared);

        user0.set_runtime_path("session.token", json!("t-1"), VariableScope::Global);
        assert_eq!(user1.lookup_runtime("session.token").unwrap(), json!("t-1"));
    }

    #[test]
    fn unknown_root_reports_the_segment() {
        let err = ctx().lookup_runtime("nope.deeper").unwrap_err();
        assert_eq!(
            err,
            ExpressionError::MissingKey {
                path: "nope.deeper".into(),
                segment: "nope".into(),
            }
        );
    }
}
