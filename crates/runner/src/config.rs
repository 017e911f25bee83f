//! Process configuration, read once at startup.

use std::time::Duration;

use thiserror::Error;

/// A malformed environment variable.
#[derive(Debug, Error)]
#[error("invalid {name}: {value:?}")]
pub struct ConfigError {
    /// The environment variable name.
    pub name: &'static str,
    /// The rejected value.
    pub value: String,
}

/// Runner-wide settings.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Process-wide cap on concurrently running runs.
    pub max_concurrent_runs: usize,
    /// Default per-action timeout handed to action contexts.
    pub default_action_timeout_ms: u64,
    /// Per-subscriber event bus capacity.
    pub event_bus_capacity: usize,
    /// How long terminal statuses stay in the cache.
    pub terminal_status_ttl: Duration,
    /// Storage key prefix for report artifacts.
    pub artifact_prefix: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_runs: 5,
            default_action_timeout_ms: 30_000,
            event_bus_capacity: 1024,
            terminal_status_ttl: Duration::from_secs(60),
            artifact_prefix: "reports".to_string(),
        }
    }
}

impl RunnerConfig {
    /// Read settings from the environment, falling back to defaults.
    ///
    /// Rejects values that parse but are meaningless
    /// (`MAX_CONCURRENT_RUNS=0`).
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            max_concurrent_runs: parse_env(
                "MAX_CONCURRENT_RUNS",
                defaults.max_concurrent_runs,
            )?,
            default_action_timeout_ms: parse_env(
                "DEFAULT_ACTION_TIMEOUT_MS",
                defaults.default_action_timeout_ms,
            )?,
            event_bus_capacity: parse_env("EVENT_BUS_CAPACITY", defaults.event_bus_capacity)?,
            terminal_status_ttl: Duration::from_secs(parse_env(
                "TERMINAL_STATUS_TTL_SECS",
                defaults.terminal_status_ttl.as_secs(),
            )?),
            artifact_prefix: std::env::var("ARTIFACT_PREFIX")
                .unwrap_or(defaults.artifact_prefix),
        };
        if config.max_concurrent_runs == 0 {
            return Err(ConfigError {
                name: "MAX_CONCURRENT_RUNS",
                value: "0".to_string(),
            });
        }
        if config.event_bus_capacity == 0 {
            return Err(ConfigError {
                name: "EVENT_BUS_CAPACITY",
                value: "0".to_string(),
            });
        }
        Ok(config)
    }
}

fn parse_env<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError { name, value: raw }),
        Err(_) => Ok(default),
    }
}
