//! Toggle and pulse handlers.

use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;

use tagsync_config::Config;
use tagsync_core::{Session, SwitchControl, SwitchMode, SwitchView, ToggleOutcome};

use crate::cli::{GlobalOpts, PulseArgs, ToggleArgs};
use crate::error::CliError;
use crate::output;

use super::ErrorCapture;

/// Terminal stand-in for a widget: shows nothing until told to.
#[derive(Default)]
struct TerminalView {
    shown: Mutex<Option<bool>>,
}

impl SwitchView for TerminalView {
    fn current(&self) -> Option<bool> {
        self.shown.lock().ok().and_then(|shown| *shown)
    }

    fn apply(&self, on: bool) {
        tracing::debug!(on, "switch view updated");
        if let Ok(mut shown) = self.shown.lock() {
            *shown = Some(on);
        }
    }
}

#[derive(Serialize)]
struct ToggleReport {
    control: String,
    value: bool,
}

pub async fn toggle(
    session: &Session,
    args: ToggleArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let core = session.core();
    let capture = ErrorCapture::attach(core);

    let mut switch = SwitchControl::new(core.clone(), &args.variable, None, SwitchMode::Toggle);
    if let Some(feedback) = args.feedback.as_deref() {
        switch = switch.with_feedback(feedback);
    }

    let view = TerminalView::default();
    let value = match switch.toggle(&view).await {
        ToggleOutcome::Confirmed(value) => value,
        ToggleOutcome::Reverted(_) => {
            return Err(CliError::ToggleReverted {
                variable: args.variable,
                reason: capture.reason(),
            });
        }
    };

    let report = ToggleReport {
        control: switch.control().to_string(),
        value,
    };
    let color = output::should_color(global.color);
    let out = output::render_single(
        global.output,
        &report,
        |r| {
            let state = if r.value { "on" } else { "off" };
            format!("{} {} is now {state}", output::ok_text("✓", color), r.control)
        },
        |r| r.value.to_string(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

#[derive(Serialize)]
struct PulseReport {
    control: String,
    duration_ms: u64,
    engaged_ok: bool,
    released_ok: bool,
}

pub async fn pulse(
    session: &Session,
    args: PulseArgs,
    global: &GlobalOpts,
    config: &Config,
) -> Result<(), CliError> {
    let core = session.core();
    let capture = ErrorCapture::attach(core);

    let duration_ms = args.ms.unwrap_or(config.defaults.pulse_ms);
    let duration = Duration::from_millis(duration_ms);
    let switch = SwitchControl::new(
        core.clone(),
        &args.variable,
        None,
        SwitchMode::Pulse { duration },
    );

    let outcome = switch.pulse(duration).await;
    if !outcome.released_ok {
        return Err(CliError::PulseIncomplete {
            variable: args.variable,
        });
    }
    if !outcome.engaged_ok {
        return Err(CliError::WriteFailed {
            variable: args.variable,
            reason: capture.reason(),
        });
    }

    let report = PulseReport {
        control: switch.control().to_string(),
        duration_ms,
        engaged_ok: outcome.engaged_ok,
        released_ok: outcome.released_ok,
    };
    let color = output::should_color(global.color);
    let out = output::render_single(
        global.output,
        &report,
        |r| {
            format!(
                "{} {} pulsed for {}ms",
                output::ok_text("✓", color),
                r.control,
                r.duration_ms
            )
        },
        |r| r.released_ok.to_string(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
