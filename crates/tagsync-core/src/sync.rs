// ── SyncCore ──
//
// The object the UI holds. Owns the subscription registry, the value
// cache, event observers and statistics; talks to the server through an
// `IntentSink` for the stream and a `VariableGateway` for request/response.
// Stream event handling lives in `dispatch.rs`.

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use tagsync_api::{ClientIntent, ReadRequest, WriteRequest, now_secs};
use tokio::sync::{Mutex, watch};
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, info, warn};

use crate::cache::{CacheEntry, ValueCache};
use crate::events::{CoreEvent, EventBus, EventKind, ObserverId};
use crate::gateway::{ReadResult, VariableGateway};
use crate::registry::{ActiveSubscription, DeliveryError, Subscription, SubscriptionRegistry};
use crate::sink::IntentSink;
use crate::stats::{Counters, Statistics};
use crate::value::{TagValue, VariableKey, VariableUpdate};

/// Synchronization core, cheaply cloneable via `Arc<CoreInner>`.
#[derive(Clone)]
pub struct SyncCore {
    pub(crate) inner: Arc<CoreInner>,
}

pub(crate) struct CoreInner {
    pub(crate) default_device_id: String,
    pub(crate) registry: SubscriptionRegistry,
    pub(crate) cache: ValueCache,
    pub(crate) events: EventBus,
    pub(crate) counters: Counters,
    pub(crate) connected: watch::Sender<bool>,
    pub(crate) sink: Arc<dyn IntentSink>,
    gateway: Arc<dyn VariableGateway>,
    /// Serializes momentary actuations per control variable.
    actuation_locks: DashMap<VariableKey, Arc<Mutex<()>>>,
}

impl SyncCore {
    pub fn new(
        default_device_id: impl Into<String>,
        sink: Arc<dyn IntentSink>,
        gateway: Arc<dyn VariableGateway>,
    ) -> Self {
        let (connected, _) = watch::channel(false);
        Self {
            inner: Arc::new(CoreInner {
                default_device_id: default_device_id.into(),
                registry: SubscriptionRegistry::new(),
                cache: ValueCache::new(),
                events: EventBus::new(),
                counters: Counters::default(),
                connected,
                sink,
                gateway,
                actuation_locks: DashMap::new(),
            }),
        }
    }

    pub fn default_device_id(&self) -> &str {
        &self.inner.default_device_id
    }

    /// Key for `variable` on `device_id`, or on the default device when
    /// `device_id` is absent or empty.
    pub fn resolve_key(&self, variable: &str, device_id: Option<&str>) -> VariableKey {
        let device = device_id
            .filter(|d| !d.is_empty())
            .unwrap_or(&self.inner.default_device_id);
        VariableKey::new(device, variable)
    }

    // ── Subscriptions ────────────────────────────────────────────────

    /// Register `callback` for updates of `variable` under `subscriber_id`.
    ///
    /// An existing subscription with the same id is replaced. The intent
    /// is sent whether or not the stream is currently connected. Returns
    /// `false` only when the ids are empty.
    pub fn subscribe<F>(
        &self,
        subscriber_id: &str,
        variable: &str,
        device_id: Option<&str>,
        callback: F,
    ) -> bool
    where
        F: Fn(&VariableUpdate) -> Result<(), DeliveryError> + Send + Sync + 'static,
    {
        if subscriber_id.trim().is_empty() || variable.trim().is_empty() {
            self.report_error("subscribe requires a subscriber id and a variable".into());
            return false;
        }

        let key = self.resolve_key(variable, device_id);
        let intent = ClientIntent::subscribe(subscriber_id, &key.variable, &key.device_id);

        let is_new = self.inner.registry.insert(Subscription {
            subscriber_id: subscriber_id.to_owned(),
            key: key.clone(),
            callback: Arc::new(callback),
        });

        if is_new {
            debug!(subscriber_id, %key, "subscribed");
        } else {
            debug!(subscriber_id, %key, "subscription replaced");
        }

        self.inner.sink.emit(intent);
        true
    }

    /// Drop the subscription for `subscriber_id`.
    ///
    /// The unsubscribe intent goes out even when nothing was registered
    /// locally, so a server that missed an earlier unsubscribe converges.
    /// Returns whether a local subscription existed.
    pub fn unsubscribe(&self, subscriber_id: &str) -> bool {
        if subscriber_id.trim().is_empty() {
            self.report_error("unsubscribe requires a subscriber id".into());
            return false;
        }

        let removed = self.inner.registry.remove(subscriber_id);
        match &removed {
            Some(sub) => debug!(subscriber_id, key = %sub.key, "unsubscribed"),
            None => warn!(subscriber_id, "unsubscribe for unknown subscriber"),
        }

        self.inner.sink.emit(ClientIntent::unsubscribe(subscriber_id));
        removed.is_some()
    }

    pub fn active_subscriptions(&self) -> Vec<ActiveSubscription> {
        self.inner.registry.list_active()
    }

    // ── Gateway operations ───────────────────────────────────────────

    /// Write `value` and report whether the gateway confirmed it.
    ///
    /// Never fails loudly: network and application errors are logged,
    /// emitted as `Error` events and returned as `false`.
    pub async fn write_variable(
        &self,
        variable: &str,
        value: TagValue,
        device_id: Option<&str>,
    ) -> bool {
        if variable.trim().is_empty() {
            self.report_error("write requires a variable".into());
            return false;
        }

        let key = self.resolve_key(variable, device_id);
        let request = WriteRequest {
            device_id: key.device_id.clone(),
            variable: key.variable.clone(),
            value: value.to_json(),
        };

        match self.inner.gateway.write(request).await {
            Ok(resp) if resp.is_success() => {
                self.inner.counters.record_write();
                debug!(%key, %value, "write confirmed");
                true
            }
            Ok(resp) => {
                let reason = resp.message.unwrap_or_else(|| "no reason given".into());
                self.report_error(format!("write {key} rejected: {reason}"));
                false
            }
            Err(e) => {
                self.report_error(format!("write {key} failed: {e}"));
                false
            }
        }
    }

    /// Read `variable` through the gateway and refresh the cache with the
    /// result. `None` means the read failed; the reason has been logged.
    pub async fn read_variable(
        &self,
        variable: &str,
        use_cache: bool,
        device_id: Option<&str>,
    ) -> Option<ReadResult> {
        if variable.trim().is_empty() {
            self.report_error("read requires a variable".into());
            return None;
        }

        let key = self.resolve_key(variable, device_id);
        let request = ReadRequest {
            device_id: key.device_id.clone(),
            variable: key.variable.clone(),
            use_cache,
        };

        let resp = match self.inner.gateway.read(request).await {
            Ok(resp) if resp.is_success() => resp,
            Ok(resp) => {
                let reason = resp.message.unwrap_or_else(|| "no reason given".into());
                self.report_error(format!("read {key} rejected: {reason}"));
                return None;
            }
            Err(e) => {
                self.report_error(format!("read {key} failed: {e}"));
                return None;
            }
        };

        let declared_type = resp.declared_type.unwrap_or_default();
        let Some(value) = resp
            .value
            .as_ref()
            .and_then(|v| TagValue::from_json(v, &declared_type))
        else {
            self.report_error(format!("read {key} returned no scalar value"));
            return None;
        };
        let timestamp = resp.timestamp.unwrap_or_else(now_secs);

        self.inner.cache.upsert(
            key,
            CacheEntry {
                value: value.clone(),
                timestamp,
                declared_type: declared_type.clone(),
            },
        );

        Some(ReadResult {
            value,
            timestamp,
            declared_type,
            source: resp.source.unwrap_or_else(|| "unknown".into()),
        })
    }

    /// Server-side statistics, passed through as JSON.
    pub async fn server_statistics(&self) -> Option<Value> {
        match self.inner.gateway.statistics().await {
            Ok(resp) if resp.is_success() => Some(resp.statistics.unwrap_or(Value::Null)),
            Ok(resp) => {
                let reason = resp.message.unwrap_or_else(|| "no reason given".into());
                self.report_error(format!("statistics rejected: {reason}"));
                None
            }
            Err(e) => {
                self.report_error(format!("statistics failed: {e}"));
                None
            }
        }
    }

    // ── Cache and statistics ─────────────────────────────────────────

    /// Last known value, never touching the network.
    pub fn cached_value(&self, variable: &str, device_id: Option<&str>) -> Option<CacheEntry> {
        self.inner.cache.get(&self.resolve_key(variable, device_id))
    }

    pub fn cached_values(&self) -> Vec<(VariableKey, CacheEntry)> {
        self.inner.cache.snapshot()
    }

    pub fn statistics(&self) -> Statistics {
        let counters = &self.inner.counters;
        Statistics {
            subscription_count: self.inner.registry.len(),
            updates_received: counters.updates_received(),
            writes_sent: counters.writes_sent(),
            delivery_errors: counters.delivery_errors(),
            cached_variables: self.inner.cache.len(),
            connected: self.is_connected(),
            last_update: self.inner.cache.last_updated(),
        }
    }

    // ── Connection state ─────────────────────────────────────────────

    pub fn is_connected(&self) -> bool {
        *self.inner.connected.borrow()
    }

    pub fn connection_state(&self) -> watch::Receiver<bool> {
        self.inner.connected.subscribe()
    }

    /// Connection state as a stream, starting with the current value.
    pub fn connection_changes(&self) -> WatchStream<bool> {
        WatchStream::new(self.connection_state())
    }

    pub(crate) fn set_connected(&self, connected: bool) {
        let changed = self.inner.connected.send_if_modified(|state| {
            let changed = *state != connected;
            *state = connected;
            changed
        });
        if changed {
            if connected {
                info!("update stream connected");
            } else {
                warn!("update stream disconnected");
            }
        }
    }

    // ── Events ───────────────────────────────────────────────────────

    /// Register an observer for `kind`.
    pub fn on<F>(&self, kind: EventKind, callback: F) -> ObserverId
    where
        F: Fn(&CoreEvent) + Send + Sync + 'static,
    {
        self.inner.events.on(kind, Arc::new(callback))
    }

    /// Remove an observer. Returns `false` if it was not registered.
    pub fn off(&self, kind: EventKind, id: ObserverId) -> bool {
        self.inner.events.off(kind, id)
    }

    pub(crate) fn report_error(&self, message: String) {
        warn!("{message}");
        self.inner.events.emit(&CoreEvent::Error { message });
    }

    // ── Internals ────────────────────────────────────────────────────

    pub(crate) fn actuation_lock(&self, key: &VariableKey) -> Arc<Mutex<()>> {
        Arc::clone(
            self.inner
                .actuation_locks
                .entry(key.clone())
                .or_default()
                .value(),
        )
    }
}
