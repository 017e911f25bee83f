//! CSV artifact: one row per action event.

use quasar_run::{RunEventKind, RunRecord};

const HEADER: &str = "run_id,user_index,step_name,action_type,started_at,duration_ms,status,error";

/// Render the action-event rows for a record.
#[must_use]
pub fn render(record: &RunRecord) -> String {
    let mut out = String::from(HEADER);
    out.push('\n');
    for event in &record.logs {
        let (Some(action_type), Some(duration_ms)) = (&event.action_type, event.duration_ms)
        else {
            continue;
        };
        let (status, error) = match event.kind {
            RunEventKind::Progress => ("ok", None),
            RunEventKind::Error => ("error", event.error.as_deref()),
            _ => continue,
        };
        let row = [
            record.id.to_string(),
            event.loop_index.map_or_else(String::new, |i| i.to_string()),
            event.step_name.clone().unwrap_or_default(),
            action_type.clone(),
            event.timestamp.to_rfc3339(),
            duration_ms.to_string(),
            status.to_string(),
            error.unwrap_or_default().to_string(),
        ];
        let escaped: Vec<String> = row.iter().map(|field| escape(field)).collect();
        out.push_str(&escaped.join(","));
        out.push('\n');
    }
    out
}

/// Quote a field when it contains a delimiter, quote, or newline.
fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::test_support::sample_record;
    use pretty_assertions::assert_eq;

    #[test]
    fn renders_header_and_action_rows_only() {
        let record = sample_record();
        let csv = render(&record);
        let lines: Vec<&str> = csv.trim_end().lines().collect();

        // 3 action events; log/progress-without-duration events skipped.
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], HEADER);
        assert!(lines[1].contains("browser:goto"));
        assert!(lines[1].contains(",ok,"));
        assert!(lines[3].contains(",error,"));
        assert!(lines[3].contains("validation: boom"));
    }

    #[test]
    fn escape_quotes_fields_with_delimiters() {
        assert_eq!(escape("plain"), "plain");
        assert_eq!(escape("a,b"), "\"a,b\"");
        assert_eq!(escape("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape("line\nbreak"), "\"line\nbreak\"");
    }

    #[test]
    fn rows_carry_user_index() {
        let record = sample_record();
        let csv = render(&record);
        let row: Vec<&str> = csv.lines().nth(1).unwrap().split(',').collect();
        assert_eq!(row[1], "0");
        assert_eq!(row[2], "open page");
    }
}
