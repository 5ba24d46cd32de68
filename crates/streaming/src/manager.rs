//! Cursor manager
//!
//! The single entry point used by message-processing code:
//! `manage(provider, context)` returns the one managed provider for the
//! provider's identity in that context, creating it on first sight.
//!
//! ## Manage Sequence
//!
//! ```text
//! 1. identity.of(provider)         - stable id, no double wrapping
//! 2. state.get_if_present(id)      - fast path, no slot lock
//! 3. lock slot(id)                 - per-key single flight
//! 4. IF slot holds a live provider: return it
//! 5. construct ManagedCursorProvider, store it in the slot
//! 6. track it with the ghost buster (still under the slot lock)
//! 7. return it
//! ```
//!
//! Concurrent callers for the same (id, context) serialize on step 3 and
//! all observe the instance created by the first one. Callers for other
//! ids or contexts never contend on that lock.

use std::sync::Arc;

use dashmap::DashMap;
use streamkeeper_core::{ContextId, StreamingStatistics};
use tracing::debug;

use crate::ghost_buster::StreamingGhostBuster;
use crate::identity::IdentityDecorator;
use crate::managed::ManagedCursorProvider;
use crate::provider::Provider;
use crate::state::{EventStreamingState, TeardownReport};

/// Creates and deduplicates managed providers per execution context
pub struct CursorManager {
    identity: Arc<IdentityDecorator>,
    ghost_buster: Arc<StreamingGhostBuster>,
    statistics: Arc<StreamingStatistics>,
    contexts: DashMap<ContextId, Arc<EventStreamingState>>,
    capture_close_site: bool,
}

impl CursorManager {
    /// Create a cursor manager
    pub fn new(
        identity: Arc<IdentityDecorator>,
        ghost_buster: Arc<StreamingGhostBuster>,
        statistics: Arc<StreamingStatistics>,
    ) -> Self {
        Self {
            identity,
            ghost_buster,
            statistics,
            contexts: DashMap::new(),
            capture_close_site: false,
        }
    }

    /// Capture close sites on every managed provider created from now on
    pub fn with_close_site_capture(mut self, capture: bool) -> Self {
        self.capture_close_site = capture;
        self
    }

    /// Manage `provider` in `context`
    ///
    /// Returns a `Provider::Managed` of the same stream kind.
    pub fn manage(&self, provider: &Provider, context: &ContextId) -> Provider {
        let state = self.open_context(*context);
        Provider::Managed(self.manage_in(provider, &state))
    }

    /// Manage `provider` in the given context state
    pub fn manage_in(
        &self,
        provider: &Provider,
        state: &EventStreamingState,
    ) -> Arc<ManagedCursorProvider> {
        let identified = self.identity.of(provider);
        let id = identified.id();

        if let Some(managed) = state.get_if_present(id) {
            return managed;
        }

        let slot = state.slot(id);
        let mut current = slot.lock();
        if let Some(managed) = current.upgrade() {
            return managed;
        }

        let managed = Arc::new(
            ManagedCursorProvider::new(identified, state.context(), Arc::clone(&self.statistics))
                .with_close_site_capture(self.capture_close_site),
        );
        *current = Arc::downgrade(&managed);
        state.track(&managed, &self.ghost_buster);
        drop(current);

        debug!(provider_id = %id, context = %state.context(), "created managed cursor provider");
        managed
    }

    /// State for `context`, created if missing
    pub fn open_context(&self, context: ContextId) -> Arc<EventStreamingState> {
        Arc::clone(
            self.contexts
                .entry(context)
                .or_insert_with(|| Arc::new(EventStreamingState::new(context)))
                .value(),
        )
    }

    /// State for `context`, if it is open
    pub fn context(&self, context: &ContextId) -> Option<Arc<EventStreamingState>> {
        self.contexts.get(context).map(|state| Arc::clone(state.value()))
    }

    /// End `context`, force-releasing whatever it still holds
    pub fn dispose_context(&self, context: &ContextId) -> TeardownReport {
        match self.contexts.remove(context) {
            Some((_, state)) => state.dispose(&self.ghost_buster),
            None => TeardownReport::default(),
        }
    }

    /// End every open context
    pub fn dispose_all(&self) -> TeardownReport {
        let contexts: Vec<ContextId> = self.contexts.iter().map(|entry| *entry.key()).collect();
        contexts
            .iter()
            .map(|context| self.dispose_context(context))
            .fold(TeardownReport::default(), |total, report| TeardownReport {
                providers: total.providers + report.providers,
                leaked: total.leaked + report.leaked,
            })
    }

    /// Number of open contexts
    pub fn context_count(&self) -> usize {
        self.contexts.len()
    }

    /// Shared statistics
    pub fn statistics(&self) -> &Arc<StreamingStatistics> {
        &self.statistics
    }

    /// The ghost buster tracking managed providers
    pub fn ghost_buster(&self) -> &Arc<StreamingGhostBuster> {
        &self.ghost_buster
    }
}

impl std::fmt::Debug for CursorManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CursorManager")
            .field("contexts", &self.context_count())
            .field("ids_issued", &self.identity.issued())
            .finish()
    }
}
