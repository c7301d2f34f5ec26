//! Gateway statistics handler.

use serde::Serialize;
use serde_json::Value;
use tabled::Tabled;

use tagsync_core::Session;

use crate::cli::{GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

use super::ErrorCapture;

#[derive(Serialize, Tabled)]
struct StatRow {
    #[tabled(rename = "Metric")]
    metric: String,
    #[tabled(rename = "Value")]
    value: String,
}

/// Flatten nested objects into dotted keys.
fn flatten(prefix: &str, value: &Value, rows: &mut Vec<StatRow>) {
    match value {
        Value::Object(map) => {
            for (key, inner) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten(&path, inner, rows);
            }
        }
        Value::String(s) => rows.push(StatRow {
            metric: prefix.to_owned(),
            value: s.clone(),
        }),
        other => rows.push(StatRow {
            metric: prefix.to_owned(),
            value: other.to_string(),
        }),
    }
}

pub async fn handle(session: &Session, global: &GlobalOpts) -> Result<(), CliError> {
    let core = session.core();
    let capture = ErrorCapture::attach(core);

    let stats = core
        .server_statistics()
        .await
        .ok_or_else(|| CliError::RequestFailed {
            operation: "statistics".into(),
            reason: capture.reason(),
        })?;

    let out = match global.output {
        // Structured formats pass the server's document through unchanged
        OutputFormat::Json => output::render_json(&stats, false)?,
        OutputFormat::JsonCompact => output::render_json(&stats, true)?,
        OutputFormat::Yaml => output::render_yaml(&stats)?,
        format => {
            let mut rows = Vec::new();
            flatten("", &stats, &mut rows);
            output::render_list(
                format,
                &rows,
                |r| StatRow {
                    metric: r.metric.clone(),
                    value: r.value.clone(),
                },
                |r| format!("{}={}", r.metric, r.value),
            )?
        }
    };
    output::print_output(&out, global.quiet);
    Ok(())
}
