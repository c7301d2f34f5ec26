// ── Stream event handling ──
//
// Applies transport events to a `SyncCore`: connection state, update
// fan-out to subscribers, server acknowledgements, and re-emitting every
// subscription after a (re)connect.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};

use tagsync_api::{ClientIntent, InboundFrame, SingleUpdate, TransportEvent, UpdateBatch, now_secs};
use tracing::{debug, info, warn};

use crate::cache::CacheEntry;
use crate::events::CoreEvent;
use crate::registry::Subscription;
use crate::sync::SyncCore;
use crate::value::{TagValue, VariableKey, VariableUpdate};

impl SyncCore {
    /// Feed one transport event into the core.
    pub fn handle_event(&self, event: TransportEvent) {
        match event {
            TransportEvent::Connected => {
                self.set_connected(true);
                self.resubscribe_all();
            }
            TransportEvent::Disconnected => self.set_connected(false),
            TransportEvent::Message(frame) => self.handle_frame(frame),
        }
    }

    fn handle_frame(&self, frame: InboundFrame) {
        match frame {
            InboundFrame::VariableUpdates(batch) => {
                self.apply_batch(batch);
            }
            InboundFrame::VariableUpdate(single) => {
                self.apply_single(single);
            }
            InboundFrame::SubscribeSuccess(ack) => {
                debug!(subscriber_id = %ack.subscriber_id, "server confirmed subscription");
                self.inner.events.emit(&CoreEvent::SubscribeSuccess {
                    subscriber_id: ack.subscriber_id,
                    device_id: ack.device_id,
                    variable: ack.variable,
                });
            }
            InboundFrame::UnsubscribeSuccess(ack) => {
                debug!(subscriber_id = %ack.subscriber_id, "server confirmed unsubscribe");
                self.inner.events.emit(&CoreEvent::UnsubscribeSuccess {
                    subscriber_id: ack.subscriber_id,
                });
            }
            InboundFrame::Error(err) => {
                warn!(message = %err.message, "server reported an error");
                self.inner.events.emit(&CoreEvent::Error {
                    message: err.message,
                });
            }
        }
    }

    /// Apply a batch of `device -> variable -> update` triples in order.
    ///
    /// Each triple refreshes the cache before any callback for it runs.
    /// Triples whose value is not a scalar are skipped. Returns the number
    /// of triples processed.
    pub fn apply_batch(&self, batch: UpdateBatch) -> usize {
        let mut processed = 0;

        for (device_id, variables) in batch {
            for (variable, raw) in variables {
                let declared_type = raw.declared_type.unwrap_or_default();
                let Some(value) = TagValue::from_json(&raw.value, &declared_type) else {
                    warn!(%device_id, %variable, "skipping update without a scalar value");
                    continue;
                };

                let update = VariableUpdate {
                    device_id: device_id.clone(),
                    variable,
                    value,
                    timestamp: raw.timestamp.unwrap_or_else(now_secs),
                    declared_type,
                };
                self.apply_update(&update);
                processed += 1;
            }
        }

        processed
    }

    /// Apply a single-update frame, filling defaults first.
    pub fn apply_single(&self, update: SingleUpdate) -> usize {
        self.apply_batch(update.into_batch(&self.inner.default_device_id))
    }

    fn apply_update(&self, update: &VariableUpdate) {
        let key = update.key();
        self.inner.counters.record_update();
        self.inner.cache.upsert(
            key.clone(),
            CacheEntry {
                value: update.value.clone(),
                timestamp: update.timestamp,
                declared_type: update.declared_type.clone(),
            },
        );
        self.deliver(&key, update);
    }

    /// Invoke every subscriber on `key`, isolating failures.
    fn deliver(&self, key: &VariableKey, update: &VariableUpdate) {
        for sub in self.inner.registry.matching(key) {
            let outcome = catch_unwind(AssertUnwindSafe(|| (sub.callback)(update)));
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => self.delivery_failed(&sub, &e.to_string()),
                Err(panic) => self.delivery_failed(&sub, &panic_message(panic.as_ref())),
            }
        }
    }

    fn delivery_failed(&self, sub: &Subscription, reason: &str) {
        self.inner.counters.record_delivery_error();
        warn!(
            subscriber_id = %sub.subscriber_id,
            key = %sub.key,
            reason,
            "subscriber callback failed"
        );
        self.inner.events.emit(&CoreEvent::Error {
            message: format!("subscriber {} failed: {reason}", sub.subscriber_id),
        });
    }

    /// Re-send a subscribe intent for every registered subscription.
    ///
    /// Runs on every connect. The registry and counters are unchanged.
    /// Returns the number of intents emitted.
    pub fn resubscribe_all(&self) -> usize {
        let subs = self.inner.registry.snapshot();
        if subs.is_empty() {
            debug!("no subscriptions to restore");
            return 0;
        }

        for sub in &subs {
            self.inner.sink.emit(ClientIntent::subscribe(
                &sub.subscriber_id,
                &sub.key.variable,
                &sub.key.device_id,
            ));
        }

        info!(count = subs.len(), "restored subscriptions");
        subs.len()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "callback panicked".into()
    }
}
