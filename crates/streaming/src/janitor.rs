//! Cursor reference counting and resource release
//!
//! A `CursorProviderJanitor` counts the open cursors of one managed
//! provider and releases the provider's resources exactly once.
//!
//! # State Machine
//!
//! ```text
//! Active (provider = Some) ──release_resources()──► Released (provider = None)
//! ```
//!
//! The transition is a `take()` on the provider slot, so only one caller
//! ever observes `Some` and performs the physical release. Any later call,
//! from any path, finds `None` and returns.
//!
//! # Triggers
//!
//! - the last cursor is released while the provider is closed
//! - the provider is closed while no cursor is open
//! - an explicit `release_resources()` (caller, ghost buster, teardown)
//!
//! The first two race against each other; both use `SeqCst` so at least
//! one side observes the other and the release is never lost.
//!
//! Reaching Released by any route sets the shared "disposed" flag, so the
//! ghost buster never reports a provider whose resources are already gone.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use streamkeeper_core::{Cursor, ProviderId, StreamingStatistics};
use tracing::debug;

use crate::provider::Provider;

/// Reference counter for the cursors of one managed provider
pub struct CursorProviderJanitor {
    id: ProviderId,
    provider: Mutex<Option<Provider>>,
    open_cursors: AtomicI64,
    closed: AtomicBool,
    disposed: Arc<AtomicBool>,
    statistics: Arc<StreamingStatistics>,
}

impl CursorProviderJanitor {
    /// Create a janitor for `provider`
    ///
    /// `open_cursors` is the number of cursors already open on the
    /// provider when the janitor takes over.
    pub fn new(
        id: ProviderId,
        provider: Provider,
        open_cursors: i64,
        statistics: Arc<StreamingStatistics>,
    ) -> Self {
        if open_cursors > 0 {
            statistics.add_open_cursors(open_cursors);
        }
        Self {
            id,
            provider: Mutex::new(Some(provider)),
            open_cursors: AtomicI64::new(open_cursors),
            closed: AtomicBool::new(false),
            disposed: Arc::new(AtomicBool::new(false)),
            statistics,
        }
    }

    /// Identity of the provider this janitor cleans up after
    pub fn id(&self) -> ProviderId {
        self.id
    }

    /// Count a cursor about to be opened
    ///
    /// Followed by either `cursor_delivered` or `cursor_abandoned`.
    pub fn cursor_opened(&self) {
        self.open_cursors.fetch_add(1, Ordering::SeqCst);
        self.statistics.add_open_cursors(1);
    }

    /// The counted cursor reached its caller
    pub fn cursor_delivered(&self) {
        self.statistics.record_cursor_opened();
    }

    /// Release `cursor` and drop its count
    ///
    /// `cursor.release()` runs first and without any lock held: it may
    /// release cursors belonging to other janitors.
    pub fn release_cursor(&self, cursor: &dyn Cursor) {
        cursor.release();
        self.cursor_abandoned();
    }

    /// Drop the count of a cursor that never reached its caller
    ///
    /// Same bookkeeping as `release_cursor` without a cursor to release.
    pub fn cursor_abandoned(&self) {
        let remaining = self.open_cursors.fetch_sub(1, Ordering::SeqCst) - 1;
        self.statistics.decrement_open_cursors();

        if remaining == 0 && self.provider_is_closed() {
            self.release_resources();
        }
    }

    /// Record that the provider was closed
    ///
    /// Releases right away when no cursor is open.
    pub fn provider_closed(&self) {
        self.closed.store(true, Ordering::SeqCst);
        if self.open_cursors.load(Ordering::SeqCst) <= 0 {
            self.release_resources();
        }
    }

    /// Release the provider's resources
    ///
    /// Returns `true` for the single call that performed the release.
    pub fn release_resources(&self) -> bool {
        let provider = self.provider.lock().take();
        match provider {
            Some(provider) => {
                self.disposed.store(true, Ordering::SeqCst);
                provider.release_resources();
                self.statistics.decrement_open_providers();
                debug!(provider_id = %self.id, "released cursor provider resources");
                true
            }
            None => false,
        }
    }

    /// Cursors currently open
    pub fn open_cursors(&self) -> i64 {
        self.open_cursors.load(Ordering::SeqCst)
    }

    /// Whether the Released state was reached
    pub fn is_released(&self) -> bool {
        self.provider.lock().is_none()
    }

    pub(crate) fn disposed_flag(&self) -> &Arc<AtomicBool> {
        &self.disposed
    }

    fn provider_is_closed(&self) -> bool {
        if self.closed.load(Ordering::SeqCst) {
            return true;
        }
        let provider = self.provider.lock().clone();
        provider.map(|p| p.is_closed()).unwrap_or(false)
    }
}

impl std::fmt::Debug for CursorProviderJanitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CursorProviderJanitor")
            .field("id", &self.id)
            .field("open_cursors", &self.open_cursors())
            .field("released", &self.is_released())
            .finish()
    }
}
