// ── Subscription registry ──
//
// Subscriber id -> (variable key, delivery callback). At most one entry
// per subscriber id; re-subscribing replaces the entry in place.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;

use crate::value::{VariableKey, VariableUpdate};

/// Error a delivery callback may return. Logged and counted, never
/// propagated to other subscribers.
pub type DeliveryError = Box<dyn std::error::Error + Send + Sync>;

/// Callback invoked once per matching update.
pub type DeliveryCallback =
    Arc<dyn Fn(&VariableUpdate) -> Result<(), DeliveryError> + Send + Sync>;

/// One registered interest.
pub struct Subscription {
    pub subscriber_id: String,
    pub key: VariableKey,
    pub(crate) callback: DeliveryCallback,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("subscriber_id", &self.subscriber_id)
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

/// Public view of a subscription, without its callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveSubscription {
    pub subscriber_id: String,
    pub device_id: String,
    pub variable: String,
}

impl From<&Subscription> for ActiveSubscription {
    fn from(sub: &Subscription) -> Self {
        Self {
            subscriber_id: sub.subscriber_id.clone(),
            device_id: sub.key.device_id.clone(),
            variable: sub.key.variable.clone(),
        }
    }
}

pub(crate) struct SubscriptionRegistry {
    entries: DashMap<String, Arc<Subscription>>,
}

impl SubscriptionRegistry {
    pub(crate) fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Insert or replace. Returns `true` if the subscriber id was new.
    pub(crate) fn insert(&self, subscription: Subscription) -> bool {
        let id = subscription.subscriber_id.clone();
        self.entries.insert(id, Arc::new(subscription)).is_none()
    }

    pub(crate) fn remove(&self, subscriber_id: &str) -> Option<Arc<Subscription>> {
        self.entries.remove(subscriber_id).map(|(_, sub)| sub)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Point-in-time copy, ordered by subscriber id. No map guard is held
    /// once this returns, so callers may invoke callbacks freely.
    pub(crate) fn snapshot(&self) -> Vec<Arc<Subscription>> {
        let mut subs: Vec<_> = self.entries.iter().map(|e| Arc::clone(e.value())).collect();
        subs.sort_by(|a, b| a.subscriber_id.cmp(&b.subscriber_id));
        subs
    }

    /// Snapshot restricted to subscriptions on `key`.
    pub(crate) fn matching(&self, key: &VariableKey) -> Vec<Arc<Subscription>> {
        let mut subs: Vec<_> = self
            .entries
            .iter()
            .filter(|e| e.value().key == *key)
            .map(|e| Arc::clone(e.value()))
            .collect();
        subs.sort_by(|a, b| a.subscriber_id.cmp(&b.subscriber_id));
        subs
    }

    pub(crate) fn list_active(&self) -> Vec<ActiveSubscription> {
        self.snapshot()
            .iter()
            .map(|sub| ActiveSubscription::from(sub.as_ref()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sub(id: &str, device: &str, variable: &str) -> Subscription {
        Subscription {
            subscriber_id: id.into(),
            key: VariableKey::new(device, variable),
            callback: Arc::new(|_| Ok(())),
        }
    }

    #[test]
    fn resubscribe_replaces_in_place() {
        let registry = SubscriptionRegistry::new();
        assert!(registry.insert(sub("w1", "plc_001", "M0.0")));
        assert!(!registry.insert(sub("w1", "plc_001", "M0.1")));

        assert_eq!(registry.len(), 1);
        let active = registry.list_active();
        assert_eq!(active[0].variable, "M0.1");
    }

    #[test]
    fn matching_filters_by_device_and_variable() {
        let registry = SubscriptionRegistry::new();
        registry.insert(sub("b", "plc_001", "M0.0"));
        registry.insert(sub("a", "plc_001", "M0.0"));
        registry.insert(sub("c", "plc_002", "M0.0"));

        let ids: Vec<_> = registry
            .matching(&VariableKey::new("plc_001", "M0.0"))
            .iter()
            .map(|s| s.subscriber_id.clone())
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn remove_reports_absence() {
        let registry = SubscriptionRegistry::new();
        registry.insert(sub("w1", "plc_001", "M0.0"));
        assert!(registry.remove("w1").is_some());
        assert!(registry.remove("w1").is_none());
        assert_eq!(registry.len(), 0);
    }
}
