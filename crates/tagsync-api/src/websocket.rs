//! WebSocket update stream with auto-reconnect.
//!
//! Connects to the gateway's variable stream and delivers lifecycle signals
//! and parsed frames, in order, through a [`tokio::sync::mpsc`] channel.
//! Outbound subscription intents are queued on an unbounded channel and
//! written whenever a connection is up. Reconnection uses exponential
//! backoff + jitter.
//!
//! # Example
//!
//! ```rust,ignore
//! use tagsync_api::websocket::{ReconnectConfig, StreamHandle, TransportEvent};
//! use tokio_util::sync::CancellationToken;
//! use url::Url;
//!
//! let url = Url::parse("ws://10.0.0.5:8080/ws/variables")?;
//! let (handle, mut events) =
//!     StreamHandle::connect(url, ReconnectConfig::default(), CancellationToken::new(), None)?;
//!
//! while let Some(event) = events.recv().await {
//!     if let TransportEvent::Message(frame) = event {
//!         println!("{frame:?}");
//!     }
//! }
//!
//! handle.shutdown();
//! ```

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;
use crate::protocol::{ClientIntent, InboundFrame};

// ── Channel capacity ─────────────────────────────────────────────────

const EVENT_CHANNEL_CAPACITY: usize = 1024;

// ── TransportEvent ───────────────────────────────────────────────────

/// Everything the stream reports to its consumer, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// A connection was established (first connect or any reconnect).
    Connected,
    /// An established connection was lost or closed.
    Disconnected,
    /// A recognised frame arrived.
    Message(InboundFrame),
}

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Exponential backoff configuration for WebSocket reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Maximum consecutive failed attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

// ── StreamHandle ─────────────────────────────────────────────────────

/// Handle to a running update stream.
///
/// Dropping the handle does not stop the background task; call
/// [`shutdown`](Self::shutdown) or cancel the token passed to
/// [`connect`](Self::connect).
pub struct StreamHandle {
    outbound: mpsc::UnboundedSender<ClientIntent>,
    cancel: CancellationToken,
}

impl StreamHandle {
    /// Spawn the reconnection loop for `ws_url`.
    ///
    /// Returns immediately with the handle and the event receiver. The
    /// first connection attempt happens asynchronously and is reported as
    /// [`TransportEvent::Connected`].
    pub fn connect(
        ws_url: Url,
        reconnect: ReconnectConfig,
        cancel: CancellationToken,
        auth_token: Option<SecretString>,
    ) -> Result<(Self, mpsc::Receiver<TransportEvent>), Error> {
        if !matches!(ws_url.scheme(), "ws" | "wss") {
            return Err(Error::WebSocketConnect(format!(
                "unsupported scheme '{}' (expected ws or wss)",
                ws_url.scheme()
            )));
        }

        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        let authorization = auth_token.map(|t| format!("Bearer {}", t.expose_secret()));
        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            ws_loop(
                ws_url,
                event_tx,
                outbound_rx,
                reconnect,
                task_cancel,
                authorization,
            )
            .await;
        });

        Ok((
            Self {
                outbound: outbound_tx,
                cancel,
            },
            event_rx,
        ))
    }

    /// Queue an intent for the server. Returns `false` once the background
    /// task has exited.
    pub fn send(&self, intent: ClientIntent) -> bool {
        self.outbound.send(intent).is_ok()
    }

    /// A clone of the outbound queue, for handing to other owners.
    pub fn outbound(&self) -> mpsc::UnboundedSender<ClientIntent> {
        self.outbound.clone()
    }

    /// Signal the background task to shut down gracefully.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

// ── Background reconnection loop ─────────────────────────────────────

/// How a single connection attempt ended.
enum SessionEnd {
    /// Cancellation token fired.
    Cancelled,
    /// The event receiver was dropped; nobody is listening anymore.
    ConsumerGone,
    /// A connection was up and then went away.
    Dropped,
    /// The connection could not be established.
    Failed(Error),
}

/// Main loop: connect → pump → on drop, backoff → reconnect.
async fn ws_loop(
    ws_url: Url,
    event_tx: mpsc::Sender<TransportEvent>,
    mut outbound_rx: mpsc::UnboundedReceiver<ClientIntent>,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,
    authorization: Option<String>,
) {
    let mut attempt: u32 = 0;

    loop {
        let end = connect_and_run(
            &ws_url,
            &event_tx,
            &mut outbound_rx,
            &cancel,
            authorization.as_deref(),
        )
        .await;

        match end {
            SessionEnd::Cancelled | SessionEnd::ConsumerGone => break,
            SessionEnd::Dropped => {
                tracing::info!("stream disconnected, reconnecting");
                attempt = 0;
            }
            SessionEnd::Failed(e) => {
                tracing::warn!(error = %e, attempt, "stream connection failed");

                if let Some(max) = reconnect.max_retries {
                    if attempt >= max {
                        tracing::error!(
                            max_retries = max,
                            "stream reconnection limit reached, giving up"
                        );
                        break;
                    }
                }

                let delay = calculate_backoff(attempt, &reconnect);
                tracing::info!(
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    attempt,
                    "waiting before reconnect"
                );

                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(delay) => {}
                }

                attempt += 1;
            }
        }
    }

    tracing::debug!("stream loop exiting");
}

// ── Single connection lifecycle ──────────────────────────────────────

/// Establish one connection and pump it until it drops.
///
/// Emits `Connected` once the upgrade succeeds and `Disconnected` when an
/// established connection ends for any reason other than shutdown.
async fn connect_and_run(
    url: &Url,
    event_tx: &mpsc::Sender<TransportEvent>,
    outbound_rx: &mut mpsc::UnboundedReceiver<ClientIntent>,
    cancel: &CancellationToken,
    authorization: Option<&str>,
) -> SessionEnd {
    tracing::info!(url = %url, "connecting to variable stream");

    let uri = match url.as_str().parse::<tungstenite::http::Uri>() {
        Ok(uri) => uri,
        Err(e) => return SessionEnd::Failed(Error::WebSocketConnect(e.to_string())),
    };

    let mut request = ClientRequestBuilder::new(uri);
    if let Some(value) = authorization {
        request = request.with_header("Authorization", value);
    }

    let ws_stream = tokio::select! {
        biased;
        () = cancel.cancelled() => return SessionEnd::Cancelled,
        result = tokio_tungstenite::connect_async(request) => match result {
            Ok((stream, _response)) => stream,
            Err(e) => return SessionEnd::Failed(Error::WebSocketConnect(e.to_string())),
        },
    };

    tracing::info!("variable stream connected");
    if event_tx.send(TransportEvent::Connected).await.is_err() {
        return SessionEnd::ConsumerGone;
    }

    let (mut write, mut read) = ws_stream.split();
    let mut outbound_open = true;

    let end = loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                let _ = write.send(tungstenite::Message::Close(None)).await;
                return SessionEnd::Cancelled;
            }
            intent = outbound_rx.recv(), if outbound_open => {
                let Some(intent) = intent else {
                    outbound_open = false;
                    continue;
                };
                let text = match serde_json::to_string(&intent) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to encode intent");
                        continue;
                    }
                };
                tracing::trace!(subscriber = intent.subscriber_id(), "sending intent");
                if let Err(e) = write.send(tungstenite::Message::Text(text.into())).await {
                    tracing::warn!(error = %e, "failed to send intent");
                    break SessionEnd::Dropped;
                }
            }
            frame = read.next() => {
                match frame {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        if let Some(frame) = parse_frame(&text) {
                            if event_tx.send(TransportEvent::Message(frame)).await.is_err() {
                                return SessionEnd::ConsumerGone;
                            }
                        }
                    }
                    Some(Ok(tungstenite::Message::Ping(_))) => {
                        // tungstenite handles pong replies automatically
                        tracing::trace!("stream ping");
                    }
                    Some(Ok(tungstenite::Message::Close(frame))) => {
                        if let Some(ref cf) = frame {
                            tracing::info!(
                                code = %cf.code,
                                reason = %cf.reason,
                                "stream close frame received"
                            );
                        } else {
                            tracing::info!("stream close frame received (no payload)");
                        }
                        break SessionEnd::Dropped;
                    }
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "stream read error");
                        break SessionEnd::Dropped;
                    }
                    None => {
                        tracing::info!("stream ended");
                        break SessionEnd::Dropped;
                    }
                    _ => {
                        // Binary, Pong, Frame -- ignore
                    }
                }
            }
        }
    };

    if event_tx.send(TransportEvent::Disconnected).await.is_err() {
        return SessionEnd::ConsumerGone;
    }
    end
}

// ── Message parsing ──────────────────────────────────────────────────

/// Parse a text frame, logging and dropping anything malformed.
fn parse_frame(text: &str) -> Option<InboundFrame> {
    match InboundFrame::parse(text) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::debug!(error = %e, "failed to parse stream frame");
            None
        }
    }
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) + jitter`
///
/// Jitter is +-25% to spread out reconnection storms from many clients.
#[allow(clippy::cast_precision_loss, clippy::as_conversions, clippy::cast_possible_wrap)]
fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let exponent = attempt.min(30) as i32;
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(exponent);
    let capped = base.min(config.max_delay.as_secs_f64());

    // Deterministic "jitter" seeded from the attempt number.
    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    let with_jitter = (capped * jitter_factor).max(0.0);

    Duration::from_secs_f64(with_jitter)
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tokio::net::TcpListener;

    use super::*;

    #[test]
    fn default_reconnect_config() {
        let config = ReconnectConfig::default();
        assert_eq!(config.initial_delay, Duration::from_secs(1));
        assert_eq!(config.max_delay, Duration::from_secs(30));
        assert!(config.max_retries.is_none());
    }

    #[test]
    fn backoff_increases_exponentially() {
        let config = ReconnectConfig::default();

        let d0 = calculate_backoff(0, &config);
        let d1 = calculate_backoff(1, &config);
        let d2 = calculate_backoff(2, &config);

        assert!(d1 > d0, "d1 ({d1:?}) should be greater than d0 ({d0:?})");
        assert!(d2 > d1, "d2 ({d2:?}) should be greater than d1 ({d1:?})");
    }

    #[test]
    fn backoff_caps_at_max_delay() {
        let config = ReconnectConfig {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            max_retries: None,
        };

        let d10 = calculate_backoff(10, &config);
        // With jitter factor up to 1.25, max effective is 12.5s
        assert!(
            d10 <= Duration::from_secs(13),
            "delay at attempt 10 ({d10:?}) should be capped near max_delay"
        );
    }

    #[test]
    fn parse_frame_drops_malformed_text() {
        assert!(parse_frame("not json at all").is_none());
        assert!(parse_frame(r#"{"event":"variable_updates","data":[1,2]}"#).is_none());
    }

    #[test]
    fn parse_frame_accepts_updates() {
        let text = r#"{"event":"variable_updates","data":{"plc_001":{"A":{"value":1,"timestamp":5,"type":"INT"}}}}"#;
        assert!(matches!(
            parse_frame(text),
            Some(InboundFrame::VariableUpdates(_))
        ));
    }

    #[tokio::test]
    async fn rejects_non_websocket_scheme() {
        let url = Url::parse("http://localhost/ws").unwrap();
        let result =
            StreamHandle::connect(url, ReconnectConfig::default(), CancellationToken::new(), None);
        assert!(matches!(result, Err(Error::WebSocketConnect(_))));
    }

    #[tokio::test]
    async fn stream_reports_lifecycle_and_flushes_queued_intents() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();

            let first = ws.next().await.unwrap().unwrap().into_text().unwrap();

            let update = r#"{"event":"variable_updates","data":{"plc_001":{"Light.Kitchen.bOn":{"value":true,"timestamp":100,"type":"BOOL"}}}}"#;
            ws.send(tungstenite::Message::Text(update.into())).await.unwrap();
            ws.close(None).await.unwrap();
            first.as_str().to_owned()
        });

        let url = Url::parse(&format!("ws://{addr}/ws/variables")).unwrap();
        let cancel = CancellationToken::new();
        let (handle, mut events) =
            StreamHandle::connect(url, ReconnectConfig::default(), cancel, None).unwrap();

        // Queued before the connection exists; must flush once it does.
        assert!(handle.send(ClientIntent::subscribe("w1", "Light.Kitchen.bOn", "plc_001")));

        assert_eq!(events.recv().await, Some(TransportEvent::Connected));
        let Some(TransportEvent::Message(InboundFrame::VariableUpdates(batch))) =
            events.recv().await
        else {
            panic!("expected a batched update");
        };
        assert!(batch["plc_001"].contains_key("Light.Kitchen.bOn"));
        assert_eq!(events.recv().await, Some(TransportEvent::Disconnected));

        let sent = server.await.unwrap();
        let intent: ClientIntent = serde_json::from_str(&sent).unwrap();
        assert_eq!(
            intent,
            ClientIntent::subscribe("w1", "Light.Kitchen.bOn", "plc_001")
        );

        handle.shutdown();
    }
}
