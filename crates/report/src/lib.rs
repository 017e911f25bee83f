//! Run reports.
//!
//! At run end the executor hands the terminal [`RunRecord`] (whose
//! `logs` hold the coalesced event timeline) to [`generate`], which
//! derives [`RunMetrics`] and renders three artifacts: a structured JSON
//! dump, a CSV of action events, and a self-contained HTML page. All
//! metrics come from the timeline; no extra I/O happens here.

pub mod csv;
pub mod html;
pub mod metrics;

use quasar_run::RunRecord;
use thiserror::Error;

pub use metrics::{RunMetrics, StepMetrics, UserMetrics};

/// Rendering errors.
#[derive(Debug, Error)]
pub enum ReportError {
    /// JSON serialization failed.
    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// The three rendered artifacts for one run.
#[derive(Debug, Clone)]
pub struct ReportBundle {
    /// Structured dump: metadata, metrics, timeline.
    pub json: String,
    /// One row per action event.
    pub csv: String,
    /// Self-contained summary page.
    pub html: String,
}

/// Render all artifacts for a terminal run.
pub fn generate(record: &RunRecord) -> Result<ReportBundle, ReportError> {
    let metrics = RunMetrics::from_record(record);
    let json = render_json(record, &metrics)?;
    let csv = csv::render(record);
    let html = html::render(record, &metrics);
    Ok(ReportBundle { json, csv, html })
}

fn render_json(record: &RunRecord, metrics: &RunMetrics) -> Result<String, ReportError> {
    let doc = serde_json::json!({
        "run": {
            "id": record.id,
            "automation_id": record.automation_id,
            "status": record.status,
            "created_at": record.created_at,
            "start_time": record.start_time,
            "end_time": record.end_time,
            "error_message": record.error_message,
            "output_files": record.output_files,
            "dropped_events": record.dropped_events,
        },
        "metrics": metrics,
        "timeline": record.logs,
    });
    Ok(serde_json::to_string_pretty(&doc)?)
}
