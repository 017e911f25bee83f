//! Automation-level configuration document.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How a declared variable obtains its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableKind {
    /// Literal value, resolved once.
    Static,
    /// Template re-evaluated per user (may embed `{{faker.*}}` tokens).
    Dynamic,
    /// System-derived value (run id, timestamp, loop indices).
    Environment,
}

/// One declared automation variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableSpec {
    /// Name referenced by `{{key}}` placeholders.
    pub key: String,
    /// Resolution strategy.
    pub kind: VariableKind,
    /// Literal value, template, or environment token depending on `kind`.
    pub value: String,
    /// Free-text description, carried for the editing UI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Fan-out mode for multi-user runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MultiRunMode {
    /// Users run one after another.
    #[default]
    Sequential,
    /// Users run concurrently with a staggered ramp-up.
    Parallel,
}

/// Multi-user fan-out settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiRunConfig {
    /// Whether fan-out is enabled at all.
    #[serde(default)]
    pub enabled: bool,
    /// Sequential or parallel execution.
    #[serde(default)]
    pub mode: MultiRunMode,
    /// Number of users.
    #[serde(default = "default_count")]
    pub count: usize,
    /// Sequential: sleep between users. Parallel: per-worker start stagger.
    #[serde(default)]
    pub delay_ms: u64,
}

fn default_count() -> usize {
    1
}

impl Default for MultiRunConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: MultiRunMode::Sequential,
            count: 1,
            delay_ms: 0,
        }
    }
}

impl MultiRunConfig {
    /// Effective user count: 1 unless fan-out is enabled.
    #[must_use]
    pub fn effective_count(&self) -> usize {
        if self.enabled { self.count.max(1) } else { 1 }
    }
}

/// Automatic screenshot policy.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScreenshotConfig {
    /// Master switch.
    #[serde(default)]
    pub enabled: bool,
    /// Capture on action failure.
    #[serde(default)]
    pub on_error: bool,
    /// Capture after a user completes successfully.
    #[serde(default)]
    pub on_success: bool,
    /// Storage key template, resolved per capture.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_template: Option<String>,
}

/// Completion notification channel, opaque to the runner.
///
/// Delivery belongs to an external collaborator; the runner only parses
/// and carries the descriptors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationChannel {
    /// Channel discriminator (e.g. `"email"`, `"webhook"`).
    pub kind: String,
    /// Channel-specific settings.
    #[serde(default)]
    pub config: Value,
}

/// The automation configuration document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AutomationConfig {
    /// Declared variables, in declaration order.
    #[serde(default)]
    pub variables: Vec<VariableSpec>,
    /// Multi-user fan-out settings.
    #[serde(default)]
    pub multirun: MultiRunConfig,
    /// Outer run timeout in seconds; 0 disables it.
    #[serde(default)]
    pub timeout: u64,
    /// Reserved: parsed and carried, never consulted by the executor.
    #[serde(default)]
    pub retries: u32,
    /// Automatic screenshot policy.
    #[serde(default)]
    pub screenshots: ScreenshotConfig,
    /// Completion notification descriptors.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notifications: Vec<NotificationChannel>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn config_defaults_from_empty_document() {
        let config: AutomationConfig = serde_json::from_value(json!({})).unwrap();
        assert!(config.variables.is_empty());
        assert!(!config.multirun.enabled);
        assert_eq!(config.multirun.count, 1);
        assert_eq!(config.timeout, 0);
        assert_eq!(config.retries, 0);
        assert!(config.notifications.is_empty());
    }

    #[test]
    fn variable_kind_uses_snake_case() {
        let spec: VariableSpec = serde_json::from_value(json!({
            "key": "email",
            "kind": "dynamic",
            "value": "{{faker.email}}",
        }))
        .unwrap();
        assert_eq!(spec.kind, VariableKind::Dynamic);
    }

    #[test]
    fn effective_count_collapses_when_disabled() {
        let multirun = MultiRunConfig {
            enabled: false,
            count: 10,
            ..Default::default()
        };
        assert_eq!(multirun.effective_count(), 1);

        let multirun = MultiRunConfig {
            enabled: true,
            count: 10,
            ..Default::default()
        };
        assert_eq!(multirun.effective_count(), 10);
    }

    #[test]
    fn effective_count_never_zero() {
        let multirun = MultiRunConfig {
            enabled: true,
            count: 0,
            ..Default::default()
        };
        assert_eq!(multirun.effective_count(), 1);
    }

    #[test]
    fn full_config_roundtrips() {
        let config = AutomationConfig {
            variables: vec![VariableSpec {
                key: "base".into(),
                kind: VariableKind::Static,
                value: "https://example.com".into(),
                description: None,
            }],
            multirun: MultiRunConfig {
                enabled: true,
                mode: MultiRunMode::Parallel,
                count: 3,
                delay_ms: 500,
            },
            timeout: 120,
            retries: 2,
            screenshots: ScreenshotConfig {
                enabled: true,
                on_error: true,
                on_success: false,
                path_template: Some("shots/{{runId}}/{{loopIndex}}.png".into()),
            },
            notifications: vec![NotificationChannel {
                kind: "webhook".into(),
                config: json!({"url": "https://hooks.example.com/x"}),
            }],
        };
        let json = serde_json::to_value(&config).unwrap();
        let back: AutomationConfig = serde_json::from_value(json).unwrap();
        assert_eq!(config, back);
    }
}
