//! Read and write handlers.

use serde::Serialize;

use tagsync_core::{Session, TagValue};

use crate::cli::{GlobalOpts, ReadArgs, WriteArgs};
use crate::error::CliError;
use crate::output;

use super::ErrorCapture;

#[derive(Serialize)]
struct ReadReport {
    device_id: String,
    variable: String,
    value: TagValue,
    declared_type: String,
    source: String,
    timestamp: f64,
}

fn read_detail(r: &ReadReport, color: bool) -> String {
    let mut lines = vec![
        format!(
            "{} = {}",
            output::key_text(&format!("{}/{}", r.device_id, r.variable), color),
            r.value
        ),
        format!("  Time:    {}", output::format_timestamp(r.timestamp)),
        format!("  Source:  {}", r.source),
    ];
    if !r.declared_type.is_empty() {
        lines.push(format!("  Type:    {}", r.declared_type));
    }
    lines.join("\n")
}

pub async fn read(session: &Session, args: ReadArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let core = session.core();
    let capture = ErrorCapture::attach(core);

    let result = core
        .read_variable(&args.variable, !args.fresh, None)
        .await
        .ok_or_else(|| CliError::ReadFailed {
            variable: args.variable.clone(),
            reason: capture.reason(),
        })?;

    let report = ReadReport {
        device_id: core.default_device_id().to_owned(),
        variable: args.variable,
        value: result.value,
        declared_type: result.declared_type,
        source: result.source,
        timestamp: result.timestamp,
    };

    let color = output::should_color(global.color);
    let out = output::render_single(
        global.output,
        &report,
        |r| read_detail(r, color),
        |r| r.value.to_string(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

#[derive(Serialize)]
struct WriteReport {
    device_id: String,
    variable: String,
    value: TagValue,
    confirmed: bool,
}

pub async fn write(
    session: &Session,
    args: WriteArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let value = TagValue::parse_literal(&args.value, args.declared_type.as_deref())?;

    let core = session.core();
    let capture = ErrorCapture::attach(core);

    if !core.write_variable(&args.variable, value.clone(), None).await {
        return Err(CliError::WriteFailed {
            variable: args.variable,
            reason: capture.reason(),
        });
    }

    let report = WriteReport {
        device_id: core.default_device_id().to_owned(),
        variable: args.variable,
        value,
        confirmed: true,
    };

    let color = output::should_color(global.color);
    let out = output::render_single(
        global.output,
        &report,
        |r| {
            format!(
                "{} {}/{} = {}",
                output::ok_text("✓", color),
                r.device_id,
                r.variable,
                r.value
            )
        },
        |r| r.value.to_string(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
