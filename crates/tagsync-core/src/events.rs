// ── Named lifecycle events ──
//
// Observers register per event kind and receive server acknowledgements
// and errors. Emission iterates a snapshot, so `on`/`off` from inside an
// observer takes effect from the next emission.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde::Serialize;
use strum::{Display, EnumString};
use tracing::warn;

/// Event names observers can register for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    SubscribeSuccess,
    UnsubscribeSuccess,
    Error,
}

/// Payload delivered to observers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CoreEvent {
    SubscribeSuccess {
        subscriber_id: String,
        device_id: String,
        variable: String,
    },
    UnsubscribeSuccess {
        subscriber_id: String,
    },
    /// Server-reported or local failure.
    Error { message: String },
}

impl CoreEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::SubscribeSuccess { .. } => EventKind::SubscribeSuccess,
            Self::UnsubscribeSuccess { .. } => EventKind::UnsubscribeSuccess,
            Self::Error { .. } => EventKind::Error,
        }
    }
}

pub type EventCallback = Arc<dyn Fn(&CoreEvent) + Send + Sync>;

/// Handle returned by `on`, used to remove the observer again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

pub(crate) struct EventBus {
    observers: DashMap<EventKind, Vec<(ObserverId, EventCallback)>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub(crate) fn new() -> Self {
        Self {
            observers: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    pub(crate) fn on(&self, kind: EventKind, callback: EventCallback) -> ObserverId {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.observers.entry(kind).or_default().push((id, callback));
        id
    }

    /// Returns `false` if `id` was not registered for `kind`.
    pub(crate) fn off(&self, kind: EventKind, id: ObserverId) -> bool {
        let Some(mut list) = self.observers.get_mut(&kind) else {
            return false;
        };
        let before = list.len();
        list.retain(|(existing, _)| *existing != id);
        list.len() != before
    }

    pub(crate) fn emit(&self, event: &CoreEvent) {
        let kind = event.kind();
        let targets: Vec<EventCallback> = self
            .observers
            .get(&kind)
            .map(|list| list.iter().map(|(_, cb)| Arc::clone(cb)).collect())
            .unwrap_or_default();

        for callback in targets {
            if catch_unwind(AssertUnwindSafe(|| callback(event))).is_err() {
                warn!(event = %kind, "event observer panicked");
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<CoreEvent>>>, EventCallback) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let cb: EventCallback = Arc::new(move |e: &CoreEvent| {
            sink.lock().unwrap().push(e.clone());
        });
        (seen, cb)
    }

    #[test]
    fn observers_only_see_their_kind() {
        let bus = EventBus::new();
        let (seen, cb) = recorder();
        bus.on(EventKind::Error, cb);

        bus.emit(&CoreEvent::UnsubscribeSuccess {
            subscriber_id: "w1".into(),
        });
        bus.emit(&CoreEvent::Error {
            message: "boom".into(),
        });

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].kind(), EventKind::Error);
    }

    #[test]
    fn off_removes_only_that_observer() {
        let bus = EventBus::new();
        let (first, cb1) = recorder();
        let (second, cb2) = recorder();
        let id1 = bus.on(EventKind::Error, cb1);
        bus.on(EventKind::Error, cb2);

        assert!(bus.off(EventKind::Error, id1));
        assert!(!bus.off(EventKind::Error, id1));
        assert!(!bus.off(EventKind::SubscribeSuccess, id1));

        bus.emit(&CoreEvent::Error {
            message: "x".into(),
        });
        assert!(first.lock().unwrap().is_empty());
        assert_eq!(second.lock().unwrap().len(), 1);
    }

    #[test]
    fn panicking_observer_does_not_block_others() {
        let bus = EventBus::new();
        bus.on(EventKind::Error, Arc::new(|_| panic!("observer bug")));
        let (seen, cb) = recorder();
        bus.on(EventKind::Error, cb);

        bus.emit(&CoreEvent::Error {
            message: "x".into(),
        });
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn kind_names_match_wire_events() {
        assert_eq!(EventKind::SubscribeSuccess.to_string(), "subscribe_success");
        assert_eq!("error".parse::<EventKind>().ok(), Some(EventKind::Error));
    }
}
