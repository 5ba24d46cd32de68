//! Streaming statistics
//!
//! Lock-free counters updated on every provider and cursor transition.
//! Gauges (`open_providers`, `open_cursors`) go up and down; totals only
//! ever grow.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// Shared, mutable streaming statistics
#[derive(Debug, Default)]
pub struct StreamingStatistics {
    open_providers: AtomicI64,
    open_cursors: AtomicI64,
    opened_providers: AtomicU64,
    opened_cursors: AtomicU64,
    leaked_providers: AtomicU64,
}

/// Point-in-time copy of [`StreamingStatistics`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatisticsSnapshot {
    /// Managed providers whose resources are still held
    pub open_providers: i64,
    /// Cursors opened through managed providers and not yet released
    pub open_cursors: i64,
    /// Managed providers ever created
    pub opened_providers_total: u64,
    /// Cursors ever opened through managed providers
    pub opened_cursors_total: u64,
    /// Providers reclaimed without having been closed
    pub leaked_providers: u64,
}

impl StreamingStatistics {
    /// Create zeroed statistics
    pub fn new() -> Self {
        Self::default()
    }

    /// A managed provider was created
    pub fn increment_open_providers(&self) {
        self.open_providers.fetch_add(1, Ordering::Relaxed);
        self.opened_providers.fetch_add(1, Ordering::Relaxed);
    }

    /// A managed provider's resources were released
    pub fn decrement_open_providers(&self) {
        self.open_providers.fetch_sub(1, Ordering::Relaxed);
    }

    /// A managed cursor was released
    pub fn decrement_open_cursors(&self) {
        self.open_cursors.fetch_sub(1, Ordering::Relaxed);
    }

    /// Move the open-cursor gauge without touching the total
    ///
    /// Used for cursors open before management began and for cursors
    /// counted ahead of being opened.
    pub fn add_open_cursors(&self, count: i64) {
        self.open_cursors.fetch_add(count, Ordering::Relaxed);
    }

    /// Count a cursor handed out, without moving the gauge
    pub fn record_cursor_opened(&self) {
        self.opened_cursors.fetch_add(1, Ordering::Relaxed);
    }

    /// A provider was reclaimed without having been closed
    pub fn record_leak(&self) {
        self.leaked_providers.fetch_add(1, Ordering::Relaxed);
    }

    /// Managed providers whose resources are still held
    pub fn open_providers(&self) -> i64 {
        self.open_providers.load(Ordering::Relaxed)
    }

    /// Cursors not yet released
    pub fn open_cursors(&self) -> i64 {
        self.open_cursors.load(Ordering::Relaxed)
    }

    /// Providers reclaimed without having been closed
    pub fn leaked_providers(&self) -> u64 {
        self.leaked_providers.load(Ordering::Relaxed)
    }

    /// Copy every counter
    pub fn snapshot(&self) -> StatisticsSnapshot {
        StatisticsSnapshot {
            open_providers: self.open_providers(),
            open_cursors: self.open_cursors(),
            opened_providers_total: self.opened_providers.load(Ordering::Relaxed),
            opened_cursors_total: self.opened_cursors.load(Ordering::Relaxed),
            leaked_providers: self.leaked_providers(),
        }
    }
}
