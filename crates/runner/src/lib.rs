//! The automation runner.
//!
//! Ties the whole engine together: the [`RunService`] accepts triggers,
//! the [`AdmissionScheduler`] enforces the process-wide concurrency cap,
//! the executor materializes a run (variable resolution, multi-user
//! fan-out, step traversal, event emission, report generation), and the
//! orchestrator fans a run out into per-user workers with cooperative
//! cancellation.

pub mod config;
pub mod error;
pub mod executor;
pub mod orchestrator;
pub mod scheduler;
pub mod service;

pub use config::{ConfigError, RunnerConfig};
pub use error::RunnerError;
pub use orchestrator::{FanOutOutcome, UserError};
pub use scheduler::AdmissionScheduler;
pub use service::RunService;
