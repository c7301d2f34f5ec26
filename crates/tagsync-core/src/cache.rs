// ── Value cache ──
//
// Last known value per (device, variable), fed by every update and every
// successful read. Lock-free via `DashMap`; the time of the latest write
// is published on a `watch` channel.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::watch;

use crate::value::{TagValue, VariableKey};

/// A cached value with its source timestamp and declared type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheEntry {
    pub value: TagValue,
    /// Seconds since the Unix epoch, as reported by the gateway.
    pub timestamp: f64,
    pub declared_type: String,
}

pub(crate) struct ValueCache {
    entries: DashMap<VariableKey, CacheEntry>,
    last_updated: watch::Sender<Option<DateTime<Utc>>>,
}

impl ValueCache {
    pub(crate) fn new() -> Self {
        let (last_updated, _) = watch::channel(None);
        Self {
            entries: DashMap::new(),
            last_updated,
        }
    }

    /// Replace the entry for `key`. Returns `true` if the key was new.
    pub(crate) fn upsert(&self, key: VariableKey, entry: CacheEntry) -> bool {
        let is_new = self.entries.insert(key, entry).is_none();
        self.last_updated.send_replace(Some(Utc::now()));
        is_new
    }

    pub(crate) fn get(&self, key: &VariableKey) -> Option<CacheEntry> {
        self.entries.get(key).map(|e| e.value().clone())
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// All cached entries, ordered by key.
    pub(crate) fn snapshot(&self) -> Vec<(VariableKey, CacheEntry)> {
        let mut all: Vec<_> = self
            .entries
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    pub(crate) fn last_updated(&self) -> Option<DateTime<Utc>> {
        *self.last_updated.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(value: TagValue, timestamp: f64) -> CacheEntry {
        CacheEntry {
            value,
            timestamp,
            declared_type: String::new(),
        }
    }

    #[test]
    fn latest_write_wins() {
        let cache = ValueCache::new();
        let key = VariableKey::new("plc_001", "DB1.speed");

        assert!(cache.upsert(key.clone(), entry(TagValue::Int(10), 1.0)));
        assert!(!cache.upsert(key.clone(), entry(TagValue::Int(12), 2.0)));

        assert_eq!(cache.get(&key), Some(entry(TagValue::Int(12), 2.0)));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn devices_are_separate_keys() {
        let cache = ValueCache::new();
        cache.upsert(VariableKey::new("plc_001", "M0.0"), entry(TagValue::Bool(true), 1.0));
        cache.upsert(VariableKey::new("plc_002", "M0.0"), entry(TagValue::Bool(false), 1.0));

        let keys: Vec<_> = cache.snapshot().into_iter().map(|(k, _)| k.to_string()).collect();
        assert_eq!(keys, vec!["plc_001/M0.0", "plc_002/M0.0"]);
    }

    #[test]
    fn tracks_last_update_time() {
        let cache = ValueCache::new();
        assert_eq!(cache.len(), 0);
        assert!(cache.last_updated().is_none());

        cache.upsert(VariableKey::new("plc_001", "x"), entry(TagValue::Int(1), 1.0));
        assert!(cache.last_updated().is_some());
    }
}
