//! Subscribe, wait for server confirmations, and report them.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tabled::Tabled;
use tokio::sync::Notify;
use tokio::time::Instant;

use tagsync_core::{CoreEvent, EventKind, Session};

use crate::cli::{GlobalOpts, SubscriptionsArgs};
use crate::error::CliError;
use crate::output;

use super::require_stream;

#[derive(Serialize)]
struct SubscriptionReport {
    subscriber_id: String,
    device_id: String,
    variable: String,
    confirmed: bool,
}

#[derive(Tabled)]
struct SubscriptionRow {
    #[tabled(rename = "Subscriber")]
    subscriber_id: String,
    #[tabled(rename = "Device")]
    device_id: String,
    #[tabled(rename = "Variable")]
    variable: String,
    #[tabled(rename = "Confirmed")]
    confirmed: String,
}

fn confirmed_count(confirmed: &Mutex<HashSet<String>>) -> usize {
    confirmed.lock().map(|set| set.len()).unwrap_or_default()
}

pub async fn handle(
    session: &Session,
    args: SubscriptionsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let core = session.core();

    let ids: Vec<String> = (0..args.variables.len())
        .map(|i| format!("tagsync-{}-sub-{i}", std::process::id()))
        .collect();
    let expected: HashSet<String> = ids.iter().cloned().collect();

    let confirmed = Arc::new(Mutex::new(HashSet::new()));
    let notify = Arc::new(Notify::new());
    let observer = {
        let confirmed = Arc::clone(&confirmed);
        let notify = Arc::clone(&notify);
        core.on(EventKind::SubscribeSuccess, move |event| {
            let CoreEvent::SubscribeSuccess { subscriber_id, .. } = event else {
                return;
            };
            if !expected.contains(subscriber_id) {
                return;
            }
            if let Ok(mut set) = confirmed.lock() {
                set.insert(subscriber_id.clone());
            }
            notify.notify_one();
        })
    };

    for (id, variable) in ids.iter().zip(&args.variables) {
        core.subscribe(id, variable, None, |_| Ok(()));
    }

    let connected = require_stream(session).await;
    if connected.is_ok() {
        let deadline = Instant::now() + Duration::from_secs(args.wait);
        while confirmed_count(&confirmed) < ids.len() {
            if tokio::time::timeout_at(deadline, notify.notified()).await.is_err() {
                break;
            }
        }
    }

    let confirmed_ids = confirmed.lock().map(|set| set.clone()).unwrap_or_default();
    let reports: Vec<SubscriptionReport> = core
        .active_subscriptions()
        .into_iter()
        .filter(|sub| ids.contains(&sub.subscriber_id))
        .map(|sub| SubscriptionReport {
            confirmed: confirmed_ids.contains(&sub.subscriber_id),
            subscriber_id: sub.subscriber_id,
            device_id: sub.device_id,
            variable: sub.variable,
        })
        .collect();

    core.off(EventKind::SubscribeSuccess, observer);
    for id in &ids {
        core.unsubscribe(id);
    }
    connected?;

    let color = output::should_color(global.color);
    let out = output::render_list(
        global.output,
        &reports,
        |r| SubscriptionRow {
            subscriber_id: r.subscriber_id.clone(),
            device_id: r.device_id.clone(),
            variable: r.variable.clone(),
            confirmed: if r.confirmed {
                output::ok_text("yes", color)
            } else {
                output::bad_text("no", color)
            },
        },
        |r| format!("{}/{} {}", r.device_id, r.variable, r.confirmed),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
