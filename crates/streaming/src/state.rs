//! Per-execution-context streaming state
//!
//! Maps provider ids to the managed provider created for them in one
//! execution context. Values are held weakly: once nothing outside the map
//! holds a managed provider, its entry is dead and is removed by whichever
//! comes first of
//!
//! - a lookup that finds it dead,
//! - the cleanup hook run by the ghost buster after the provider's
//!   reference is dequeued,
//! - an explicit `purge_collected()`.
//!
//! Each id maps to its own slot mutex. `CursorManager` holds that mutex
//! while it constructs a provider, so single-flight construction only ever
//! blocks callers asking for the same id.
//!
//! # Lock order
//!
//! Map shard lock, then slot mutex. Code holding a slot mutex never
//! touches the map, and removal only happens when the map is the slot's
//! sole owner.

use std::sync::{Arc, Weak};

use dashmap::DashMap;
use parking_lot::Mutex;
use streamkeeper_core::{ContextId, ProviderId};
use tracing::{debug, warn};

use crate::ghost_buster::{StreamingGhostBuster, StreamingWeakReference};
use crate::managed::ManagedCursorProvider;

pub(crate) type Slot = Arc<Mutex<Weak<ManagedCursorProvider>>>;
type SlotMap = DashMap<ProviderId, Slot>;

/// Outcome of tearing down one execution context
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TeardownReport {
    /// Live providers found at teardown
    pub providers: usize,
    /// Providers among them that were never closed
    pub leaked: usize,
}

/// Managed providers of one execution context
pub struct EventStreamingState {
    context: ContextId,
    providers: Arc<SlotMap>,
}

impl EventStreamingState {
    /// Create empty state for `context`
    pub fn new(context: ContextId) -> Self {
        Self {
            context,
            providers: Arc::new(DashMap::new()),
        }
    }

    /// The execution context this state belongs to
    pub fn context(&self) -> ContextId {
        self.context
    }

    /// Store `provider` under its id and track it with the ghost buster
    pub fn add_provider(
        &self,
        provider: &Arc<ManagedCursorProvider>,
        ghost_buster: &StreamingGhostBuster,
    ) -> Arc<StreamingWeakReference> {
        let slot = self.slot(provider.id());
        *slot.lock() = Arc::downgrade(provider);
        self.track(provider, ghost_buster)
    }

    /// The live managed provider for `id`, if any
    pub fn get_if_present(&self, id: ProviderId) -> Option<Arc<ManagedCursorProvider>> {
        let found = self.providers.get(&id).map(|slot| slot.lock().upgrade());
        match found {
            Some(Some(provider)) => Some(provider),
            Some(None) => {
                self.providers.remove_if(&id, |_, slot| is_dead(slot));
                None
            }
            None => None,
        }
    }

    /// Remove every dead entry, returning how many were removed
    pub fn purge_collected(&self) -> usize {
        let before = self.providers.len();
        self.providers.retain(|_, slot| !is_dead(slot));
        before.saturating_sub(self.providers.len())
    }

    /// Live managed providers
    pub fn providers(&self) -> Vec<Arc<ManagedCursorProvider>> {
        self.providers
            .iter()
            .filter_map(|entry| entry.value().lock().upgrade())
            .collect()
    }

    /// Number of live managed providers
    pub fn len(&self) -> usize {
        self.providers
            .iter()
            .filter(|entry| entry.value().lock().strong_count() > 0)
            .count()
    }

    /// Whether no managed provider is alive
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of map entries, dead or alive
    pub fn slot_count(&self) -> usize {
        self.providers.len()
    }

    /// End of the execution context
    ///
    /// Every provider still alive is force-released. Providers that were
    /// never closed by their caller are reported as leaks.
    pub fn dispose(&self, ghost_buster: &StreamingGhostBuster) -> TeardownReport {
        let live = self.providers();
        self.providers.clear();

        let mut report = TeardownReport {
            providers: live.len(),
            leaked: 0,
        };
        for provider in &live {
            if ghost_buster.reclaim(provider) {
                report.leaked += 1;
            }
        }

        if report.leaked > 0 {
            warn!(
                context = %self.context,
                providers = report.providers,
                leaked = report.leaked,
                "execution context ended with unclosed streams"
            );
        } else {
            debug!(
                context = %self.context,
                providers = report.providers,
                "execution context streaming state disposed"
            );
        }
        report
    }

    pub(crate) fn slot(&self, id: ProviderId) -> Slot {
        Arc::clone(
            self.providers
                .entry(id)
                .or_insert_with(|| Arc::new(Mutex::new(Weak::new())))
                .value(),
        )
    }

    pub(crate) fn track(
        &self,
        provider: &Arc<ManagedCursorProvider>,
        ghost_buster: &StreamingGhostBuster,
    ) -> Arc<StreamingWeakReference> {
        let reference = ghost_buster.track(provider);
        let providers = Arc::downgrade(&self.providers);
        let id = provider.id();
        reference.on_collected(Box::new(move || {
            if let Some(providers) = providers.upgrade() {
                providers.remove_if(&id, |_, slot| is_dead(slot));
            }
        }));
        reference
    }
}

impl std::fmt::Debug for EventStreamingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStreamingState")
            .field("context", &self.context)
            .field("slots", &self.slot_count())
            .finish()
    }
}

/// Dead: the map is the only owner of the slot and the provider is gone
fn is_dead(slot: &Slot) -> bool {
    Arc::strong_count(slot) == 1 && slot.lock().strong_count() == 0
}
