//! Self-contained HTML report.
//!
//! No external assets: styling is inlined so the artifact renders from
//! object storage or a local file equally well.

use std::fmt::Write as _;

use quasar_run::{RunEventKind, RunRecord};

use crate::metrics::RunMetrics;

/// Render the summary page.
#[must_use]
pub fn render(record: &RunRecord, metrics: &RunMetrics) -> String {
    let mut page = String::with_capacity(8 * 1024);
    let duration = record
        .duration()
        .map_or_else(|| "-".to_string(), |d| format!("{} ms", d.num_milliseconds()));

    let _ = write!(
        page,
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>Run {id}</title>\n<style>{style}</style>\n</head>\n<body>\n\
         <h1>Run report</h1>\n<p class=\"meta\">run <code>{id}</code> · automation <code>{automation}</code></p>\n",
        id = record.id,
        automation = record.automation_id,
        style = STYLE,
    );

    // Summary cards
    let _ = write!(
        page,
        "<section class=\"cards\">\n{}{}{}{}{}</section>\n",
        card("Status", &record.status.to_string()),
        card("Duration", &duration),
        card("Users", &metrics.per_user.len().to_string()),
        card(
            "Failure rate",
            &format!("{:.1}%", metrics.failure_rate * 100.0)
        ),
        card("Artifacts", &record.output_files.len().to_string()),
    );

    // Step timing table
    page.push_str(
        "<h2>Step timings</h2>\n<table>\n<tr><th>Step</th><th>Actions</th><th>Failures</th>\
         <th>Mean (ms)</th><th>p50 (ms)</th><th>p95 (ms)</th></tr>\n",
    );
    for step in &metrics.per_step {
        let _ = write!(
            page,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{:.0}</td><td>{}</td><td>{}</td></tr>\n",
            escape(&step.step_name),
            step.actions,
            step.failures,
            step.mean_ms,
            step.p50_ms,
            step.p95_ms,
        );
    }
    page.push_str("</table>\n");

    // Per-user table
    page.push_str(
        "<h2>Users</h2>\n<table>\n<tr><th>User</th><th>Total (ms)</th><th>Actions</th>\
         <th>Failures</th></tr>\n",
    );
    for user in &metrics.per_user {
        let _ = write!(
            page,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            user.loop_index, user.total_ms, user.actions, user.failures,
        );
    }
    page.push_str("</table>\n");

    // Failures table
    let failures: Vec<_> = record
        .logs
        .iter()
        .filter(|e| e.kind == RunEventKind::Error)
        .collect();
    page.push_str("<h2>Failures</h2>\n");
    if failures.is_empty() {
        page.push_str("<p>None.</p>\n");
    } else {
        page.push_str(
            "<table>\n<tr><th>User</th><th>Step</th><th>Action</th><th>Error</th></tr>\n",
        );
        for event in failures {
            let _ = write!(
                page,
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
                event.loop_index.map_or_else(String::new, |i| i.to_string()),
                escape(event.step_name.as_deref().unwrap_or("-")),
                escape(event.action_type.as_deref().unwrap_or("-")),
                escape(event.error.as_deref().unwrap_or("-")),
            );
        }
        page.push_str("</table>\n");
    }

    // Artifact links
    if !record.output_files.is_empty() {
        page.push_str("<h2>Artifacts</h2>\n<ul>\n");
        for url in &record.output_files {
            let _ = write!(
                page,
                "<li><a href=\"{url}\">{url}</a></li>\n",
                url = escape(url)
            );
        }
        page.push_str("</ul>\n");
    }

    page.push_str("</body>\n</html>\n");
    page
}

fn card(label: &str, value: &str) -> String {
    format!(
        "<div class=\"card\"><span class=\"label\">{}</span><span class=\"value\">{}</span></div>\n",
        escape(label),
        escape(value),
    )
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

const STYLE: &str = "body{font-family:system-ui,sans-serif;margin:2rem;color:#1a1a2e}\
h1{margin-bottom:.25rem}.meta{color:#666}\
.cards{display:flex;gap:1rem;flex-wrap:wrap;margin:1.5rem 0}\
.card{border:1px solid #ddd;border-radius:8px;padding:.75rem 1.25rem;min-width:7rem}\
.card .label{display:block;font-size:.75rem;text-transform:uppercase;color:#888}\
.card .value{font-size:1.4rem;font-weight:600}\
table{border-collapse:collapse;margin:.5rem 0 1.5rem}\
th,td{border:1px solid #ddd;padding:.4rem .8rem;text-align:left}\
th{background:#f5f5f7}";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::test_support::sample_record;

    #[test]
    fn renders_summary_and_tables() {
        let record = sample_record();
        let metrics = RunMetrics::from_record(&record);
        let html = render(&record, &metrics);

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("completed"));
        assert!(html.contains("open page"));
        assert!(html.contains("validation: boom"));
        assert!(html.contains("https://cdn.test/r/0.png"));
    }

    #[test]
    fn escapes_markup_in_errors() {
        let mut record = sample_record();
        record.push_log(
            quasar_run::RunEvent::error("<script>alert(1)</script>")
                .with_action("a-x", "browser:evaluate")
                .with_duration(1),
        );
        let metrics = RunMetrics::from_record(&record);
        let html = render(&record, &metrics);
        assert!(!html.contains("<script>alert"));
        assert!(html.contains("&lt;script&gt;"));
    }
}
