// ── Session lifecycle ──
//
// Wires a `SyncCore` to real transports: the HTTP gateway client and,
// unless disabled, the auto-reconnecting update stream with a pump task
// that feeds its events into the core.

use std::sync::Arc;
use std::time::Duration;

use tagsync_api::{
    GatewayClient, ReconnectConfig, StreamHandle, TlsMode, TransportConfig, TransportEvent,
};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::{SyncConfig, TlsVerification};
use crate::error::CoreError;
use crate::sink::{DiscardSink, IntentSink};
use crate::sync::SyncCore;

/// A running connection to one gateway. Cheaply cloneable.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    config: SyncConfig,
    core: SyncCore,
    stream: Option<StreamHandle>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Session {
    /// Build the transports and, if enabled, start the update stream.
    ///
    /// Must be called from within a Tokio runtime. Returns before the
    /// stream connects; watch [`SyncCore::connection_state`] for that.
    pub fn start(config: SyncConfig) -> Result<Self, CoreError> {
        let transport = build_transport(&config);
        let gateway = GatewayClient::new(config.server_url.clone(), &transport)?;
        let cancel = CancellationToken::new();

        let (stream, events) = if config.stream_enabled {
            let url = config.resolved_stream_url()?;
            let reconnect = ReconnectConfig {
                initial_delay: config.reconnect.initial_delay,
                max_delay: config.reconnect.max_delay,
                max_retries: config.reconnect.max_retries,
            };
            debug!(%url, "starting update stream");
            let (handle, events) = StreamHandle::connect(
                url,
                reconnect,
                cancel.child_token(),
                config.auth_token.clone(),
            )?;
            (Some(handle), Some(events))
        } else {
            (None, None)
        };

        let sink: Arc<dyn IntentSink> = match &stream {
            Some(handle) => Arc::new(handle.outbound()),
            None => Arc::new(DiscardSink),
        };
        let core = SyncCore::new(config.default_device_id.clone(), sink, Arc::new(gateway));

        let mut handles = Vec::new();
        if let Some(events) = events {
            handles.push(tokio::spawn(pump_task(core.clone(), events, cancel.clone())));
        }

        info!(server = %config.server_url, stream = config.stream_enabled, "session started");

        Ok(Self {
            inner: Arc::new(SessionInner {
                config,
                core,
                stream,
                cancel,
                task_handles: Mutex::new(handles),
            }),
        })
    }

    pub fn core(&self) -> &SyncCore {
        &self.inner.core
    }

    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    /// Wait until the stream reports connected, up to `timeout`.
    pub async fn wait_connected(&self, timeout: Duration) -> Result<(), CoreError> {
        if self.inner.stream.is_none() {
            return Err(CoreError::Disconnected);
        }

        let mut state = self.inner.core.connection_state();
        match tokio::time::timeout(timeout, state.wait_for(|connected| *connected)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(_)) => Err(CoreError::Disconnected),
            Err(_) => Err(CoreError::Timeout {
                timeout_secs: timeout.as_secs(),
            }),
        }
    }

    /// Stop the stream and join background tasks.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        if let Some(stream) = &self.inner.stream {
            stream.shutdown();
        }

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }

        self.inner.core.set_connected(false);
        debug!("session shut down");
    }
}

async fn pump_task(
    core: SyncCore,
    mut events: mpsc::Receiver<TransportEvent>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            event = events.recv() => {
                let Some(event) = event else {
                    debug!("update stream ended");
                    break;
                };
                core.handle_event(event);
            }
        }
    }
}

fn build_transport(config: &SyncConfig) -> TransportConfig {
    TransportConfig {
        tls: tls_to_transport(&config.tls),
        timeout: config.timeout,
        auth_token: config.auth_token.clone(),
    }
}

fn tls_to_transport(tls: &TlsVerification) -> TlsMode {
    match tls {
        TlsVerification::SystemDefaults => TlsMode::System,
        TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
        TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
    }
}
