//! `{{...}}` template expansion against a [`VariableContext`].
//!
//! Placeholders resolve in this order: environment tokens (`loopIndex`,
//! `runId`, ...), `runtime.` paths, `faker.` generators, then declared
//! automation variables (static literal or dynamic template). Strings
//! without placeholders pass through untouched, so resolution is
//! idempotent on literals.

use chrono::Utc;
use serde_json::Value;

use crate::context::VariableContext;
use crate::error::ExpressionError;
use crate::faker;

/// Dynamic variables may reference other variables; cap the chain so a
/// self-referential declaration cannot recurse forever.
const MAX_DYNAMIC_DEPTH: usize = 8;

impl VariableContext {
    /// Expand every `{{...}}` placeholder in `input`.
    pub fn resolve_str(&self, input: &str) -> Result<String, ExpressionError> {
        self.resolve_with_depth(input, 0)
    }

    /// Recursively resolve every string leaf of a JSON document.
    ///
    /// Non-string leaves keep their structure; only embedded strings are
    /// expanded.
    pub fn resolve_value(&self, value: &Value) -> Result<Value, ExpressionError> {
        match value {
            Value::String(s) => Ok(Value::String(self.resolve_str(s)?)),
            Value::Array(items) => items
                .iter()
                .map(|item| self.resolve_value(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Value::Object(map) => {
                let mut out = serde_json::Map::with_capacity(map.len());
                for (key, item) in map {
                    out.insert(key.clone(), self.resolve_value(item)?);
                }
                Ok(Value::Object(out))
            }
            other => Ok(other.clone()),
        }
    }

    fn resolve_with_depth(&self, input: &str, depth: usize) -> Result<String, ExpressionError> {
        let Some(first) = input.find("{{") else {
            return Ok(input.to_string());
        };

        let mut result = String::with_capacity(input.len());
        result.push_str(&input[..first]);
        let mut rest = &input[first..];

        while let Some(open) = rest.find("{{") {
            result.push_str(&rest[..open]);
            let after_open = &rest[open + 2..];
            let close = after_open.find("}}").ok_or_else(|| {
                let offset = input.len() - rest.len() + open;
                ExpressionError::UnclosedPlaceholder(offset)
            })?;
            let token = after_open[..close].trim();
            result.push_str(&self.expand_token(token, depth)?);
            rest = &after_open[close + 2..];
        }
        result.push_str(rest);
        Ok(result)
    }

    fn expand_token(&self, token: &str, depth: usize) -> Result<String, ExpressionError> {
        match token {
            "loopIndex" => return Ok(self.loop_index.to_string()),
            "localLoopIndex" => return Ok(self.local_loop_index.to_string()),
            "timestamp" => return Ok(Utc::now().timestamp_millis().to_string()),
            "runId" => return Ok(self.run_id.clone()),
            "projectId" => return Ok(self.project_id.clone()),
            "automationId" => return Ok(self.automation_id.clone()),
            _ => {}
        }

        if let Some(inner) = token.strip_prefix("runtime.") {
            let value = self.lookup_runtime(inner)?;
            return Ok(render_value(&value));
        }
        if let Some(generator) = token.strip_prefix("faker.") {
            return faker::generate(generator);
        }

        if let Some(literal) = self.static_vars().get(token) {
            return Ok(literal.clone());
        }
        if let Some(template) = self.dynamic_vars().get(token) {
            if depth >= MAX_DYNAMIC_DEPTH {
                return Err(ExpressionError::UnknownVariable(token.to_string()));
            }
            // Re-evaluated on every call so faker tokens yield fresh data.
            return self.resolve_with_depth(&template.clone(), depth + 1);
        }

        Err(ExpressionError::UnknownVariable(token.to_string()))
    }
}

/// Render a runtime value for string interpolation: strings verbatim,
/// everything else as compact JSON.
fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::VariableScope;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;

    fn ctx() -> VariableContext {
        let mut ctx =
            VariableContext::new("run-7", "proj-3", "auto-9", 2, Arc::default());
        ctx.set_static("base_url", "https://api.example.com");
        ctx.set_dynamic("fresh_email", "{{faker.uuid}}@example.com");
        ctx
    }

    #[test]
    fn literal_passes_through() {
        assert_eq!(ctx().resolve_str("plain text").unwrap(), "plain text");
    }

    #[test]
    fn resolution_is_idempotent_on_literals() {
        let ctx = ctx();
        let once = ctx.resolve_str("https://api.example.com/users").unwrap();
        let twice = ctx.resolve_str(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn expands_static_variable() {
        assert_eq!(
            ctx().resolve_str("{{base_url}}/health").unwrap(),
            "https://api.example.com/health"
        );
    }

    #[test]
    fn expands_environment_tokens() {
        let ctx = ctx();
        assert_eq!(ctx.resolve_str("{{loopIndex}}").unwrap(), "2");
        assert_eq!(ctx.resolve_str("{{localLoopIndex}}").unwrap(), "0");
        assert_eq!(ctx.resolve_str("{{runId}}").unwrap(), "run-7");
        assert_eq!(ctx.resolve_str("{{projectId}}").unwrap(), "proj-3");
        assert_eq!(ctx.resolve_str("{{automationId}}").unwrap(), "auto-9");
    }

    #[test]
    fn timestamp_is_numeric() {
        let rendered = ctx().resolve_str("{{timestamp}}").unwrap();
        assert!(rendered.parse::<i64>().is_ok());
    }

    #[test]
    fn expands_multiple_placeholders() {
        let rendered = ctx()
            .resolve_str("user-{{loopIndex}}@{{projectId}}.test")
            .unwrap();
        assert_eq!(rendered, "user-2@proj-3.test");
    }

    #[test]
    fn dynamic_variable_reevaluates_each_call() {
        let ctx = ctx();
        let a = ctx.resolve_str("{{fresh_email}}").unwrap();
        let b = ctx.resolve_str("{{fresh_email}}").unwrap();
        assert!(a.ends_with("@example.com"));
        assert_ne!(a, b);
    }

    #[test]
    fn runtime_path_expansion() {
        let mut ctx = ctx();
        ctx.set_runtime(
            "api",
            json!({"user": {"name": "Ada"}, "codes": [7, 11]}),
            VariableScope::Local,
        );
        assert_eq!(
            ctx.resolve_str("hello {{runtime.api.user.name}}").unwrap(),
            "hello Ada"
        );
        assert_eq!(ctx.resolve_str("{{runtime.api.codes[1]}}").unwrap(), "11");
    }

    #[test]
    fn non_string_runtime_values_render_as_json() {
        let mut ctx = ctx();
        ctx.set_runtime("flags", json!({"on": true}), VariableScope::Local);
        assert_eq!(ctx.resolve_str("{{runtime.flags}}").unwrap(), r#"{"on":true}"#);
    }

    #[test]
    fn missing_runtime_path_fails() {
        let err = ctx().resolve_str("{{runtime.api.status}}").unwrap_err();
        assert!(err.to_string().contains("api"));
    }

    #[test]
    fn unknown_variable_fails() {
        let err = ctx().resolve_str("{{nope}}").unwrap_err();
        assert_eq!(err, ExpressionError::UnknownVariable("nope".into()));
    }

    #[test]
    fn unclosed_placeholder_fails_with_offset() {
        let err = ctx().resolve_str("abc {{runId").unwrap_err();
        assert_eq!(err, ExpressionError::UnclosedPlaceholder(4));
    }

    #[test]
    fn self_referential_dynamic_variable_is_cut_off() {
        let mut ctx = ctx();
        ctx.set_dynamic("loop", "{{loop}}");
        assert!(ctx.resolve_str("{{loop}}").is_err());
    }

    #[test]
    fn resolve_value_walks_nested_documents() {
        let ctx = ctx();
        let config = json!({
            "url": "{{base_url}}/users/{{loopIndex}}",
            "timeout": 5000,
            "headers": [{"name": "X-Proj", "value": "{{projectId}}"}],
            "verify": true,
        });
        let resolved = ctx.resolve_value(&config).unwrap();
        assert_eq!(
            resolved,
            json!({
                "url": "https://api.example.com/users/2",
                "timeout": 5000,
                "headers": [{"name": "X-Proj", "value": "proj-3"}],
                "verify": true,
            })
        );
    }

    #[test]
    fn whitespace_inside_placeholder_is_tolerated() {
        assert_eq!(ctx().resolve_str("{{ loopIndex }}").unwrap(), "2");
    }
}
