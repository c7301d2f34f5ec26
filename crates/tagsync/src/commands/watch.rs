//! Live update watcher.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_stream::StreamExt;
use tracing::{info, warn};

use tagsync_core::{DeliveryError, Session, VariableUpdate};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

use super::require_stream;

fn subscriber_id(index: usize) -> String {
    format!("tagsync-{}-watch-{index}", std::process::id())
}

fn render_update(
    update: &VariableUpdate,
    format: OutputFormat,
    color: bool,
) -> Result<String, CliError> {
    match format {
        OutputFormat::Table => Ok(format!(
            "{}  {} = {}",
            output::format_timestamp(update.timestamp),
            output::key_text(&update.key().to_string(), color),
            update.value
        )),
        OutputFormat::Json => output::render_json(update, false),
        OutputFormat::JsonCompact => output::render_json(update, true),
        OutputFormat::Yaml => Ok(format!("---\n{}", output::render_yaml(update)?)),
        OutputFormat::Plain => Ok(format!("{} {}", update.key(), update.value)),
    }
}

pub async fn handle(
    session: &Session,
    args: WatchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let core = session.core();
    let (tx, mut updates) = mpsc::unbounded_channel::<VariableUpdate>();

    let ids: Vec<String> = (0..args.variables.len()).map(subscriber_id).collect();
    for (id, variable) in ids.iter().zip(&args.variables) {
        let tx = tx.clone();
        core.subscribe(id, variable, None, move |update| {
            tx.send(update.clone())
                .map_err(|_| DeliveryError::from("watch output closed"))
        });
    }
    drop(tx);

    if let Err(e) = require_stream(session).await {
        for id in &ids {
            core.unsubscribe(id);
        }
        return Err(e);
    }
    info!(count = ids.len(), "watching variables");

    let deadline = async {
        match args.duration {
            Some(secs) => {
                tokio::time::sleep_until(Instant::now() + Duration::from_secs(secs)).await;
            }
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut connection = core.connection_changes();
    let color = output::should_color(global.color);
    let mut seen: u64 = 0;

    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            () = &mut deadline => break,
            Some(connected) = connection.next() => {
                if connected {
                    info!("stream connected");
                } else {
                    warn!("stream lost, reconnecting");
                }
            }
            Some(update) = updates.recv() => {
                let line = render_update(&update, global.output, color)?;
                output::print_output(&line, global.quiet);
                seen += 1;
                if args.count.is_some_and(|limit| seen >= limit) {
                    break;
                }
            }
        }
    }

    for id in &ids {
        core.unsubscribe(id);
    }
    Ok(())
}
