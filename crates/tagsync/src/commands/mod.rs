//! Command dispatch: bridges CLI args -> core operations -> output formatting.

pub mod config_cmd;
pub mod control;
pub mod stats;
pub mod subscriptions;
pub mod variables;
pub mod watch;

use std::sync::{Arc, Mutex};

use tagsync_config::Config;
use tagsync_core::{CoreEvent, EventKind, ObserverId, Session, SyncCore};

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a gateway-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    session: &Session,
    global: &GlobalOpts,
    config: &Config,
) -> Result<(), CliError> {
    match cmd {
        Command::Watch(args) => watch::handle(session, args, global).await,
        Command::Read(args) => variables::read(session, args, global).await,
        Command::Write(args) => variables::write(session, args, global).await,
        Command::Toggle(args) => control::toggle(session, args, global).await,
        Command::Pulse(args) => control::pulse(session, args, global, config).await,
        Command::Stats => stats::handle(session, global).await,
        Command::Subscriptions(args) => subscriptions::handle(session, args, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => Ok(()),
    }
}

/// Keeps the most recent `Error` event while alive.
///
/// Core operations report failures as events and a `false`/`None` return;
/// this turns the event back into a reason for the CLI error.
pub(crate) struct ErrorCapture {
    core: SyncCore,
    observer: ObserverId,
    last: Arc<Mutex<Option<String>>>,
}

impl ErrorCapture {
    pub(crate) fn attach(core: &SyncCore) -> Self {
        let last = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&last);
        let observer = core.on(EventKind::Error, move |event| {
            if let CoreEvent::Error { message } = event {
                if let Ok(mut slot) = slot.lock() {
                    *slot = Some(message.clone());
                }
            }
        });
        Self {
            core: core.clone(),
            observer,
            last,
        }
    }

    pub(crate) fn reason(&self) -> String {
        self.last
            .lock()
            .ok()
            .and_then(|slot| slot.clone())
            .unwrap_or_else(|| "no reason given".into())
    }
}

impl Drop for ErrorCapture {
    fn drop(&mut self) {
        self.core.off(EventKind::Error, self.observer);
    }
}

/// Map a failed stream wait onto the CLI error for it.
pub(crate) async fn require_stream(session: &Session) -> Result<(), CliError> {
    let timeout = session.config().timeout;
    session
        .wait_connected(timeout)
        .await
        .map_err(|_| CliError::StreamUnavailable {
            seconds: timeout.as_secs(),
        })
}
