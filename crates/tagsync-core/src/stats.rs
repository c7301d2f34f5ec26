// ── Statistics ──

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Point-in-time counters for one core instance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statistics {
    /// Number of distinct subscriber ids currently registered.
    pub subscription_count: usize,
    /// Update triples processed since start.
    pub updates_received: u64,
    /// Writes the gateway confirmed.
    pub writes_sent: u64,
    /// Callback invocations that failed or panicked.
    pub delivery_errors: u64,
    pub cached_variables: usize,
    pub connected: bool,
    pub last_update: Option<DateTime<Utc>>,
}

#[derive(Default)]
pub(crate) struct Counters {
    updates_received: AtomicU64,
    writes_sent: AtomicU64,
    delivery_errors: AtomicU64,
}

impl Counters {
    pub(crate) fn record_update(&self) {
        self.updates_received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_write(&self) {
        self.writes_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_delivery_error(&self) {
        self.delivery_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn updates_received(&self) -> u64 {
        self.updates_received.load(Ordering::Relaxed)
    }

    pub(crate) fn writes_sent(&self) -> u64 {
        self.writes_sent.load(Ordering::Relaxed)
    }

    pub(crate) fn delivery_errors(&self) -> u64 {
        self.delivery_errors.load(Ordering::Relaxed)
    }
}
