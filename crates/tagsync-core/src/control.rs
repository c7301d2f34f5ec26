// ── Switch control ──
//
// A boolean control bound to a writable variable, optionally paired with
// a read-only feedback variable. Toggles update the view optimistically
// and revert when the gateway does not confirm. Pulses write true, hold,
// then write false; pulses on the same variable run one after another.

use std::time::Duration;

use serde::Serialize;
use strum::Display;
use tokio::sync::watch;
use tracing::{debug, error, warn};

use crate::sync::SyncCore;
use crate::value::{TagValue, VariableKey};

/// Default hold time for momentary controls.
pub const DEFAULT_PULSE: Duration = Duration::from_millis(500);

/// The widget side of a switch.
pub trait SwitchView: Send + Sync {
    /// What the widget currently shows, if it shows anything.
    fn current(&self) -> Option<bool>;

    /// Show `on`.
    fn apply(&self, on: bool);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchMode {
    /// Latching: each activation flips the control variable.
    Toggle,
    /// Momentary: true for `duration`, then false.
    Pulse { duration: Duration },
}

/// Where a toggle is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ToggleState {
    Idle,
    /// The view shows the new value; the gateway has not answered yet.
    OptimisticApplied,
    Confirmed,
    Reverted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "value", rename_all = "snake_case")]
pub enum ToggleOutcome {
    /// The gateway accepted the new value.
    Confirmed(bool),
    /// The write failed; the view is back at this value.
    Reverted(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PulseOutcome {
    pub engaged_ok: bool,
    pub released_ok: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ActivateOutcome {
    Toggle(ToggleOutcome),
    Pulse(PulseOutcome),
}

pub struct SwitchControl {
    core: SyncCore,
    control: VariableKey,
    feedback: Option<VariableKey>,
    mode: SwitchMode,
    state: watch::Sender<ToggleState>,
}

impl SwitchControl {
    /// Bind to `control_variable` on `device_id` (default device if `None`).
    pub fn new(
        core: SyncCore,
        control_variable: &str,
        device_id: Option<&str>,
        mode: SwitchMode,
    ) -> Self {
        let control = core.resolve_key(control_variable, device_id);
        let (state, _) = watch::channel(ToggleState::Idle);
        Self {
            core,
            control,
            feedback: None,
            mode,
            state,
        }
    }

    /// Read the displayed state from `feedback_variable` on the same device.
    pub fn with_feedback(mut self, feedback_variable: &str) -> Self {
        self.feedback = Some(VariableKey::new(
            self.control.device_id.clone(),
            feedback_variable,
        ));
        self
    }

    pub fn control(&self) -> &VariableKey {
        &self.control
    }

    pub fn feedback(&self) -> Option<&VariableKey> {
        self.feedback.as_ref()
    }

    pub fn mode(&self) -> SwitchMode {
        self.mode
    }

    pub fn state(&self) -> ToggleState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ToggleState> {
        self.state.subscribe()
    }

    /// Toggle or pulse, depending on the mode.
    pub async fn activate(&self, view: &dyn SwitchView) -> ActivateOutcome {
        match self.mode {
            SwitchMode::Toggle => ActivateOutcome::Toggle(self.toggle(view).await),
            SwitchMode::Pulse { duration } => ActivateOutcome::Pulse(self.pulse(duration).await),
        }
    }

    /// Flip the control variable with optimistic UI.
    ///
    /// The view shows the new value before the write is sent and is put
    /// back if the write is not confirmed.
    pub async fn toggle(&self, view: &dyn SwitchView) -> ToggleOutcome {
        let previous = self.current_value(view).await;
        let next = !previous;

        self.state.send_replace(ToggleState::OptimisticApplied);
        view.apply(next);

        let confirmed = self
            .core
            .write_variable(
                &self.control.variable,
                TagValue::Bool(next),
                Some(&self.control.device_id),
            )
            .await;

        let outcome = if confirmed {
            self.state.send_replace(ToggleState::Confirmed);
            debug!(control = %self.control, value = next, "toggle confirmed");
            ToggleOutcome::Confirmed(next)
        } else {
            view.apply(previous);
            self.state.send_replace(ToggleState::Reverted);
            warn!(control = %self.control, value = previous, "toggle reverted");
            ToggleOutcome::Reverted(previous)
        };

        self.state.send_replace(ToggleState::Idle);
        outcome
    }

    /// Write true, hold for `duration`, write false.
    ///
    /// The release is attempted even when the engage write failed.
    pub async fn pulse(&self, duration: Duration) -> PulseOutcome {
        let lock = self.core.actuation_lock(&self.control);
        let _guard = lock.lock().await;

        let device = Some(self.control.device_id.as_str());
        let variable = self.control.variable.as_str();

        let engaged_ok = self
            .core
            .write_variable(variable, TagValue::Bool(true), device)
            .await;
        if !engaged_ok {
            warn!(control = %self.control, "pulse engage was not confirmed");
        }

        tokio::time::sleep(duration).await;

        let released_ok = self
            .core
            .write_variable(variable, TagValue::Bool(false), device)
            .await;
        if !released_ok {
            error!(control = %self.control, "pulse release failed, actuator may still be engaged");
        }

        PulseOutcome {
            engaged_ok,
            released_ok,
        }
    }

    /// Current logical value from the preferred variable (feedback when
    /// configured, otherwise control): its cached value, then a gateway
    /// read, then what the view shows, then `false`.
    async fn current_value(&self, view: &dyn SwitchView) -> bool {
        let source = self.feedback.as_ref().unwrap_or(&self.control);

        if let Some(entry) = self
            .core
            .cached_value(&source.variable, Some(&source.device_id))
        {
            return entry.value.as_bool();
        }

        if let Some(read) = self
            .core
            .read_variable(&source.variable, true, Some(&source.device_id))
            .await
        {
            return read.value.as_bool();
        }

        view.current().unwrap_or(false)
    }
}
