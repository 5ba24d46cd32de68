//! Leak detection for managed cursor providers
//!
//! The ghost buster keeps a [`StreamingWeakReference`] for every tracked
//! managed provider. The weak reference does not keep the provider alive,
//! but it holds strongly what is needed after the provider is gone: the
//! janitor (which owns the delegate), the shared "disposed" flag and the
//! originating location.
//!
//! When the last handle to a managed provider is dropped, the provider
//! pushes its reference ids onto the ghost buster's reference queue. A
//! background sweeper drains the queue:
//!
//! - disposed flag unset: the caller never closed the stream. Release the
//!   resources and raise exactly one alert naming the originating location.
//! - disposed flag set: closed by the caller, or released by the janitor
//!   through any route. Nothing to do.
//!
//! The disposed check is a `swap(true)`, the same single-transition rule
//! the janitor uses. An alert is raised only when the sweep's own release
//! call performed the release, so racing sweeps, teardowns, cursor
//! releases and explicit closes never double release or double alert.
//!
//! # Thread Lifecycle
//!
//! ```text
//! Created ──initialise()──► Initialised ──start()──► Started ◄──start()── Stopped
//!                                                      │                    ▲
//!                                                      └──────stop()────────┘
//! any ──dispose()──► Disposed
//! ```
//!
//! - `shutdown: AtomicBool` signals the sweeper to stop
//! - `sweeper: JoinHandle` lets `stop()` wait for it
//! - `dispose()` performs a final synchronous sweep

use std::collections::VecDeque;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};
use streamkeeper_core::{
    AlertSink, ComponentLocation, ContextId, ProviderId, StreamingError, StreamingResult,
    StreamingStatistics,
};
use tracing::{debug, error, warn};

use crate::config::GhostBusterConfig;
use crate::janitor::CursorProviderJanitor;
use crate::managed::{CollectionWatcher, ManagedCursorProvider};

/// Location reported for streams that carry no originating location
pub const UNKNOWN_LOCATION: &str = "<unknown location>";

/// Queue of reference ids whose referent was dropped
pub(crate) struct ReferenceQueue {
    pending: Mutex<VecDeque<u64>>,
    available: Condvar,
}

impl ReferenceQueue {
    pub(crate) fn new() -> Self {
        Self {
            pending: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
        }
    }

    pub(crate) fn enqueue(&self, reference: u64) {
        self.pending.lock().push_back(reference);
        self.available.notify_one();
    }

    /// Wait up to `timeout` for an entry, unless `shutdown` is set
    pub(crate) fn poll(&self, timeout: Duration, shutdown: &AtomicBool) -> Option<u64> {
        let mut pending = self.pending.lock();
        if pending.is_empty() && !shutdown.load(Ordering::SeqCst) {
            self.available.wait_for(&mut pending, timeout);
        }
        pending.pop_front()
    }

    pub(crate) fn drain(&self) -> Vec<u64> {
        self.pending.lock().drain(..).collect()
    }

    pub(crate) fn wake(&self) {
        let _pending = self.pending.lock();
        self.available.notify_all();
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.lock().len()
    }
}

type CollectedHook = Box<dyn FnOnce() + Send>;

/// Weak handle to a managed provider plus what is needed to reclaim it
pub struct StreamingWeakReference {
    reference: u64,
    provider_id: ProviderId,
    context: ContextId,
    referent: Weak<ManagedCursorProvider>,
    janitor: Arc<CursorProviderJanitor>,
    disposed: Arc<AtomicBool>,
    location: Option<ComponentLocation>,
    on_collected: Mutex<Vec<CollectedHook>>,
}

impl StreamingWeakReference {
    /// The managed provider, if it is still alive
    pub fn get(&self) -> Option<Arc<ManagedCursorProvider>> {
        self.referent.upgrade()
    }

    /// Whether the managed provider was dropped
    pub fn is_collected(&self) -> bool {
        self.referent.strong_count() == 0
    }

    /// Identity of the tracked provider
    pub fn provider_id(&self) -> ProviderId {
        self.provider_id
    }

    /// Context the tracked provider was managed in
    pub fn context(&self) -> ContextId {
        self.context
    }

    /// Originating location captured at tracking time
    pub fn location(&self) -> Option<&ComponentLocation> {
        self.location.as_ref()
    }

    /// Whether the provider was closed, released or reclaimed
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Run `hook` after the sweeper has processed this reference
    pub(crate) fn on_collected(&self, hook: CollectedHook) {
        self.on_collected.lock().push(hook);
    }

    fn take_hooks(&self) -> Vec<CollectedHook> {
        std::mem::take(&mut *self.on_collected.lock())
    }
}

impl fmt::Debug for StreamingWeakReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamingWeakReference")
            .field("reference", &self.reference)
            .field("provider_id", &self.provider_id)
            .field("context", &self.context)
            .field("collected", &self.is_collected())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Lifecycle of the ghost buster
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Constructed, not yet initialised
    Created,
    /// Ready to start
    Initialised,
    /// Background sweeper running
    Started,
    /// Background sweeper stopped, may be restarted
    Stopped,
    /// Final state
    Disposed,
}

/// Background leak detector for managed cursor providers
pub struct StreamingGhostBuster {
    config: GhostBusterConfig,
    alerts: Arc<dyn AlertSink>,
    statistics: Arc<StreamingStatistics>,
    references: DashMap<u64, Arc<StreamingWeakReference>>,
    queue: Arc<ReferenceQueue>,
    next_reference: AtomicU64,
    state: Mutex<LifecycleState>,
    shutdown: AtomicBool,
    sweeper: Mutex<Option<JoinHandle<()>>>,
    leaks: AtomicU64,
}

impl StreamingGhostBuster {
    /// Create a ghost buster in the `Created` state
    pub fn new(
        config: GhostBusterConfig,
        alerts: Arc<dyn AlertSink>,
        statistics: Arc<StreamingStatistics>,
    ) -> Self {
        Self {
            config,
            alerts,
            statistics,
            references: DashMap::new(),
            queue: Arc::new(ReferenceQueue::new()),
            next_reference: AtomicU64::new(1),
            state: Mutex::new(LifecycleState::Created),
            shutdown: AtomicBool::new(false),
            sweeper: Mutex::new(None),
            leaks: AtomicU64::new(0),
        }
    }

    /// Created -> Initialised
    pub fn initialise(&self) -> StreamingResult<()> {
        let mut state = self.state.lock();
        if *state != LifecycleState::Created {
            return Err(StreamingError::Lifecycle(format!(
                "cannot initialise ghost buster in state {:?}",
                *state
            )));
        }
        *state = LifecycleState::Initialised;
        Ok(())
    }

    /// Initialised | Stopped -> Started
    ///
    /// Spawns the background sweeper unless the ghost buster is disabled
    /// in configuration; `sweep()` still works either way.
    pub fn start(self: &Arc<Self>) -> StreamingResult<()> {
        let mut state = self.state.lock();
        match *state {
            LifecycleState::Initialised | LifecycleState::Stopped => {}
            other => {
                return Err(StreamingError::Lifecycle(format!(
                    "cannot start ghost buster in state {:?}",
                    other
                )))
            }
        }

        if self.config.enabled {
            self.shutdown.store(false, Ordering::SeqCst);
            let buster = Arc::clone(self);
            let handle = thread::Builder::new()
                .name("streaming-ghost-buster".to_string())
                .spawn(move || buster.sweep_loop())?;
            *self.sweeper.lock() = Some(handle);
            debug!(
                poll_interval_ms = self.config.poll_interval_ms,
                "streaming ghost buster started"
            );
        }

        *state = LifecycleState::Started;
        Ok(())
    }

    /// Started -> Stopped, waiting for the sweeper to exit
    pub fn stop(&self) -> StreamingResult<()> {
        let mut state = self.state.lock();
        if *state != LifecycleState::Started {
            return Err(StreamingError::Lifecycle(format!(
                "cannot stop ghost buster in state {:?}",
                *state
            )));
        }
        self.halt_sweeper();
        *state = LifecycleState::Stopped;
        Ok(())
    }

    /// Any -> Disposed, after a final sweep
    ///
    /// Providers still alive at this point are no longer tracked.
    pub fn dispose(&self) {
        {
            let mut state = self.state.lock();
            if *state == LifecycleState::Disposed {
                return;
            }
            if *state == LifecycleState::Started {
                self.halt_sweeper();
            }
            *state = LifecycleState::Disposed;
        }
        self.sweep();
        self.references.clear();
    }

    /// Current lifecycle state
    pub fn state(&self) -> LifecycleState {
        *self.state.lock()
    }

    /// Start watching `provider` for a drop without close
    pub fn track(&self, provider: &Arc<ManagedCursorProvider>) -> Arc<StreamingWeakReference> {
        let reference_id = self.next_reference.fetch_add(1, Ordering::Relaxed);
        let reference = Arc::new(StreamingWeakReference {
            reference: reference_id,
            provider_id: provider.id(),
            context: provider.context(),
            referent: Arc::downgrade(provider),
            janitor: Arc::clone(provider.janitor()),
            disposed: Arc::clone(provider.disposed_flag()),
            location: provider.originating_location().cloned(),
            on_collected: Mutex::new(Vec::new()),
        });

        self.references.insert(reference_id, Arc::clone(&reference));
        provider.watch(CollectionWatcher {
            reference: reference_id,
            queue: Arc::downgrade(&self.queue),
        });
        debug!(
            provider_id = %provider.id(),
            context = %provider.context(),
            reference = reference_id,
            "tracking managed cursor provider"
        );
        reference
    }

    /// Process every queued reference now
    ///
    /// Returns how many leaks were reclaimed.
    pub fn sweep(&self) -> usize {
        self.queue
            .drain()
            .into_iter()
            .filter(|reference| self.collect(*reference))
            .count()
    }

    /// Teardown path: force-release a provider that is still alive
    ///
    /// Returns `true` if the provider had never been closed, in which case
    /// it is reported as a leak.
    pub fn reclaim(&self, provider: &ManagedCursorProvider) -> bool {
        let leaked = self.bust(
            provider.disposed_flag(),
            provider.janitor(),
            provider.id(),
            provider.originating_location(),
        );
        if !leaked
            && catch_unwind(AssertUnwindSafe(|| provider.janitor().release_resources())).is_err()
        {
            error!(provider_id = %provider.id(), "panic while releasing closed stream");
        }
        leaked
    }

    /// References still registered
    pub fn tracked_count(&self) -> usize {
        self.references.len()
    }

    /// References queued but not yet swept
    pub fn pending_count(&self) -> usize {
        self.queue.len()
    }

    /// Leaks reclaimed since creation
    pub fn leaks_detected(&self) -> u64 {
        self.leaks.load(Ordering::Relaxed)
    }

    fn sweep_loop(&self) {
        let interval = self.config.poll_interval();
        while !self.shutdown.load(Ordering::SeqCst) {
            if let Some(reference) = self.queue.poll(interval, &self.shutdown) {
                self.collect(reference);
            }
        }
        debug!("streaming ghost buster sweeper exited");
    }

    fn halt_sweeper(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.queue.wake();
        if let Some(handle) = self.sweeper.lock().take() {
            if handle.join().is_err() {
                error!("streaming ghost buster sweeper panicked");
            }
        }
    }

    fn collect(&self, reference_id: u64) -> bool {
        let Some((_, reference)) = self.references.remove(&reference_id) else {
            return false;
        };

        let busted = self.bust(
            &reference.disposed,
            &reference.janitor,
            reference.provider_id,
            reference.location.as_ref(),
        );

        for hook in reference.take_hooks() {
            if catch_unwind(AssertUnwindSafe(hook)).is_err() {
                error!(
                    provider_id = %reference.provider_id,
                    "cleanup hook panicked while sweeping collected stream"
                );
            }
        }
        busted
    }

    fn bust(
        &self,
        disposed: &AtomicBool,
        janitor: &CursorProviderJanitor,
        provider_id: ProviderId,
        location: Option<&ComponentLocation>,
    ) -> bool {
        if disposed.swap(true, Ordering::SeqCst) {
            return false;
        }

        match catch_unwind(AssertUnwindSafe(|| janitor.release_resources())) {
            Ok(true) => {}
            // Released by another route between the flag check and here
            Ok(false) => return false,
            Err(_) => error!(provider_id = %provider_id, "panic while releasing leaked stream"),
        }

        let location = location.map(|l| l.as_str()).unwrap_or(UNKNOWN_LOCATION);
        self.statistics.record_leak();
        self.leaks.fetch_add(1, Ordering::Relaxed);
        warn!(
            provider_id = %provider_id,
            location = location,
            "cursor provider reclaimed without being closed"
        );

        let alerted = catch_unwind(AssertUnwindSafe(|| {
            self.alerts.trigger_alert(&self.config.alert_name, location)
        }));
        if alerted.is_err() {
            error!(provider_id = %provider_id, "alert sink panicked");
        }
        true
    }
}

impl fmt::Debug for StreamingGhostBuster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamingGhostBuster")
            .field("state", &self.state())
            .field("tracked", &self.tracked_count())
            .field("pending", &self.pending_count())
            .field("leaks", &self.leaks_detected())
            .finish()
    }
}
