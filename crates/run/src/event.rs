//! Typed run events.
//!
//! Every observable moment of a run (log lines, errors, produced files,
//! progress, status changes) is an event on the run's bus. Events are
//! append-only within a run; the executor coalesces them onto the
//! durable record, so live subscribers may drop under overload without
//! losing the source of truth.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Discriminator for [`RunEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunEventKind {
    /// A log line emitted by an action.
    Log,
    /// An action or user failure.
    Error,
    /// An artifact became available at a public URL.
    OutputFile,
    /// Step/user progress (start, finish, skip).
    Progress,
    /// The run's status advanced.
    StatusChange,
}

/// Severity attached to log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    /// Diagnostic detail.
    Debug,
    /// Routine information.
    #[default]
    Info,
    /// Something unexpected but survivable.
    Warn,
    /// A failure.
    Error,
}

/// One event in a run's timeline.
///
/// Context fields are optional; events emitted from inside an action
/// carry step and action identity, and `loop_index` correlates events
/// across concurrent users.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunEvent {
    /// Event discriminator.
    #[serde(rename = "type")]
    pub kind: RunEventKind,
    /// Emission time.
    pub timestamp: DateTime<Utc>,
    /// Owning step id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_id: Option<String>,
    /// Owning step name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_name: Option<String>,
    /// Emitting action id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_id: Option<String>,
    /// Emitting action type key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_type: Option<String>,
    /// Enclosing control-flow action id for nested dispatch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_action_id: Option<String>,
    /// User ordinal within the run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loop_index: Option<usize>,
    /// Ordinal within the innermost bounded loop.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_loop_index: Option<usize>,
    /// Log severity, for `log` events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<LogLevel>,
    /// Human-readable message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Error text, for `error` events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Action wall-clock duration in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    /// Public URL of a produced artifact.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_file: Option<String>,
    /// Free-form payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RunEvent {
    /// Create an event of the given kind, stamped now.
    #[must_use]
    pub fn new(kind: RunEventKind) -> Self {
        Self {
            kind,
            timestamp: Utc::now(),
            step_id: None,
            step_name: None,
            action_id: None,
            action_type: None,
            parent_action_id: None,
            loop_index: None,
            local_loop_index: None,
            level: None,
            message: None,
            error: None,
            duration_ms: None,
            output_file: None,
            data: None,
        }
    }

    /// A log event with the given level and message.
    #[must_use]
    pub fn log(level: LogLevel, message: impl Into<String>) -> Self {
        let mut event = Self::new(RunEventKind::Log);
        event.level = Some(level);
        event.message = Some(message.into());
        event
    }

    /// An error event carrying the failure text.
    #[must_use]
    pub fn error(error: impl Into<String>) -> Self {
        let mut event = Self::new(RunEventKind::Error);
        event.error = Some(error.into());
        event
    }

    /// A progress event with a message.
    #[must_use]
    pub fn progress(message: impl Into<String>) -> Self {
        let mut event = Self::new(RunEventKind::Progress);
        event.message = Some(message.into());
        event
    }

    /// An output-file event carrying the artifact URL.
    #[must_use]
    pub fn output_file(url: impl Into<String>) -> Self {
        let mut event = Self::new(RunEventKind::OutputFile);
        event.output_file = Some(url.into());
        event
    }

    /// A status-change event with the new status as message.
    #[must_use]
    pub fn status_change(status: impl std::fmt::Display) -> Self {
        let mut event = Self::new(RunEventKind::StatusChange);
        event.message = Some(status.to_string());
        event
    }

    /// Attach step identity.
    #[must_use]
    pub fn with_step(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.step_id = Some(id.into());
        self.step_name = Some(name.into());
        self
    }

    /// Attach action identity.
    #[must_use]
    pub fn with_action(mut self, id: impl Into<String>, kind: impl Into<String>) -> Self {
        self.action_id = Some(id.into());
        self.action_type = Some(kind.into());
        self
    }

    /// Attach the enclosing control-flow action id.
    #[must_use]
    pub fn with_parent_action(mut self, id: impl Into<String>) -> Self {
        self.parent_action_id = Some(id.into());
        self
    }

    /// Attach user and loop ordinals.
    #[must_use]
    pub fn with_loop(mut self, loop_index: usize, local_loop_index: usize) -> Self {
        self.loop_index = Some(loop_index);
        self.local_loop_index = Some(local_loop_index);
        self
    }

    /// Attach the action duration.
    #[must_use]
    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    /// Attach a free-form payload.
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn log_event_carries_level_and_message() {
        let event = RunEvent::log(LogLevel::Warn, "low disk");
        assert_eq!(event.kind, RunEventKind::Log);
        assert_eq!(event.level, Some(LogLevel::Warn));
        assert_eq!(event.message.as_deref(), Some("low disk"));
    }

    #[test]
    fn builder_attaches_context() {
        let event = RunEvent::error("boom")
            .with_step("step-1", "login")
            .with_action("a-3", "browser:click")
            .with_parent_action("a-2")
            .with_loop(2, 5)
            .with_duration(120);

        assert_eq!(event.step_name.as_deref(), Some("login"));
        assert_eq!(event.action_type.as_deref(), Some("browser:click"));
        assert_eq!(event.parent_action_id.as_deref(), Some("a-2"));
        assert_eq!(event.loop_index, Some(2));
        assert_eq!(event.local_loop_index, Some(5));
        assert_eq!(event.duration_ms, Some(120));
    }

    #[test]
    fn serializes_kind_as_type_and_omits_empty_fields() {
        let event = RunEvent::progress("step skipped");
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], json!("progress"));
        assert_eq!(json["message"], json!("step skipped"));
        assert!(json.get("error").is_none());
        assert!(json.get("step_id").is_none());
        assert!(json.get("duration_ms").is_none());
    }

    #[test]
    fn roundtrips_through_json() {
        let event = RunEvent::output_file("https://cdn.example.com/r/0.png")
            .with_loop(0, 0)
            .with_data(json!({"bytes": 1024}));
        let json = serde_json::to_string(&event).unwrap();
        let back: RunEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event, back);
    }

    #[test]
    fn status_change_renders_status() {
        let event = RunEvent::status_change(crate::RunStatus::Running);
        assert_eq!(event.message.as_deref(), Some("running"));
    }
}
