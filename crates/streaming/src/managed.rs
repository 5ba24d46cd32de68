//! Managed cursor providers
//!
//! A `ManagedCursorProvider` decorates an identified provider for one
//! execution context. Every cursor it hands out is a [`ManagedCursor`]
//! wired back to the provider's [`CursorProviderJanitor`], so the janitor
//! knows when the last cursor goes away.
//!
//! Closing through the normal path marks the provider "disposed", which
//! tells the ghost buster that no leak reclamation is needed. Dropping the
//! last handle notifies every ghost buster tracking it.

use std::backtrace::{Backtrace, BacktraceStatus};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use streamkeeper_core::{
    ComponentLocation, ContextId, Cursor, ProviderId, StreamKind, StreamingError,
    StreamingResult, StreamingStatistics,
};
use tracing::debug;

use crate::ghost_buster::ReferenceQueue;
use crate::identity::IdentifiedProvider;
use crate::janitor::CursorProviderJanitor;
use crate::provider::Provider;

/// When and where a provider was closed
#[derive(Debug, Clone)]
pub struct CloseRecord {
    /// Time of the close call
    pub closed_at: DateTime<Utc>,
    /// Call stack of the close site, when capture is enabled
    pub close_site: Option<String>,
}

impl CloseRecord {
    fn capture(capture_site: bool) -> Self {
        let close_site = if capture_site {
            let backtrace = Backtrace::force_capture();
            match backtrace.status() {
                BacktraceStatus::Captured => Some(backtrace.to_string()),
                _ => None,
            }
        } else {
            None
        };
        Self {
            closed_at: Utc::now(),
            close_site,
        }
    }
}

/// A reference-queue registration made by a ghost buster
pub(crate) struct CollectionWatcher {
    pub(crate) reference: u64,
    pub(crate) queue: Weak<ReferenceQueue>,
}

/// An identified provider whose cursors are reference counted
pub struct ManagedCursorProvider {
    delegate: Arc<IdentifiedProvider>,
    context: ContextId,
    janitor: Arc<CursorProviderJanitor>,
    disposed: Arc<AtomicBool>,
    close_record: Mutex<Option<CloseRecord>>,
    capture_close_site: bool,
    watchers: Mutex<Vec<CollectionWatcher>>,
}

impl ManagedCursorProvider {
    /// Manage `delegate` within `context`
    pub fn new(
        delegate: Arc<IdentifiedProvider>,
        context: ContextId,
        statistics: Arc<StreamingStatistics>,
    ) -> Self {
        statistics.increment_open_providers();
        let janitor = CursorProviderJanitor::new(
            delegate.id(),
            Provider::Identified(Arc::clone(&delegate)),
            0,
            statistics,
        );
        debug!(provider_id = %delegate.id(), context = %context, "managing cursor provider");
        let disposed = Arc::clone(janitor.disposed_flag());
        Self {
            delegate,
            context,
            janitor: Arc::new(janitor),
            disposed,
            close_record: Mutex::new(None),
            capture_close_site: false,
            watchers: Mutex::new(Vec::new()),
        }
    }

    /// Record a call stack whenever this provider is closed
    pub fn with_close_site_capture(mut self, capture: bool) -> Self {
        self.capture_close_site = capture;
        self
    }

    /// Stable identity of the delegate
    pub fn id(&self) -> ProviderId {
        self.delegate.id()
    }

    /// Execution context this provider is managed in
    pub fn context(&self) -> ContextId {
        self.context
    }

    /// Stream capability of the delegate
    pub fn kind(&self) -> StreamKind {
        self.delegate.kind()
    }

    /// The wrapped identified provider
    pub fn delegate(&self) -> &Arc<IdentifiedProvider> {
        &self.delegate
    }

    /// The janitor counting this provider's cursors
    pub fn janitor(&self) -> &Arc<CursorProviderJanitor> {
        &self.janitor
    }

    /// Open a cursor whose release is reported to the janitor
    ///
    /// The cursor is counted before the delegate opens it, so a concurrent
    /// `close()` defers the release until this cursor is released.
    pub fn open_cursor(&self) -> StreamingResult<Box<dyn Cursor>> {
        self.janitor.cursor_opened();

        if let Some(error) = self.unavailable() {
            self.janitor.cursor_abandoned();
            return Err(error);
        }

        let cursor = match self.delegate.delegate().open_cursor() {
            Ok(cursor) => cursor,
            Err(error) => {
                self.janitor.cursor_abandoned();
                return Err(error);
            }
        };
        self.janitor.cursor_delivered();
        Ok(Box::new(ManagedCursor {
            inner: cursor,
            janitor: Arc::clone(&self.janitor),
            released: AtomicBool::new(false),
        }))
    }

    fn unavailable(&self) -> Option<StreamingError> {
        if let Some(record) = self.close_record.lock().as_ref() {
            return Some(StreamingError::ProviderClosed {
                provider: self.id().to_string(),
                closed_at: record.closed_at,
                close_site: record.close_site.clone(),
            });
        }
        if self.janitor.is_released() {
            return Some(StreamingError::ResourcesReleased { id: self.id() });
        }
        None
    }

    /// Close the provider
    ///
    /// Resources are released now if no cursor is open, otherwise when
    /// the last cursor is released.
    pub fn close(&self) {
        {
            let mut record = self.close_record.lock();
            if record.is_some() {
                return;
            }
            *record = Some(CloseRecord::capture(self.capture_close_site));
        }
        self.disposed.store(true, Ordering::SeqCst);
        self.delegate.delegate().close();
        self.janitor.provider_closed();
    }

    /// Whether the provider was closed
    pub fn is_closed(&self) -> bool {
        self.close_record.lock().is_some() || self.delegate.delegate().is_closed()
    }

    /// When and where the provider was closed
    pub fn close_record(&self) -> Option<CloseRecord> {
        self.close_record.lock().clone()
    }

    /// Release the underlying resources regardless of open cursors
    pub fn release_resources(&self) {
        self.disposed.store(true, Ordering::SeqCst);
        self.janitor.release_resources();
    }

    /// The component that produced the stream, if known
    pub fn originating_location(&self) -> Option<&ComponentLocation> {
        self.delegate.delegate().originating_location()
    }

    /// Whether the provider was closed or released through a normal path
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    pub(crate) fn disposed_flag(&self) -> &Arc<AtomicBool> {
        &self.disposed
    }

    pub(crate) fn watch(&self, watcher: CollectionWatcher) {
        self.watchers.lock().push(watcher);
    }
}

impl Drop for ManagedCursorProvider {
    fn drop(&mut self) {
        for watcher in self.watchers.get_mut().drain(..) {
            if let Some(queue) = watcher.queue.upgrade() {
                queue.enqueue(watcher.reference);
            }
        }
    }
}

impl fmt::Debug for ManagedCursorProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedCursorProvider")
            .field("id", &self.id())
            .field("context", &self.context)
            .field("kind", &self.kind())
            .field("open_cursors", &self.janitor.open_cursors())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// A cursor handed out by a managed provider
///
/// Releases through the janitor at most once, either explicitly or on drop.
pub struct ManagedCursor {
    inner: Box<dyn Cursor>,
    janitor: Arc<CursorProviderJanitor>,
    released: AtomicBool,
}

impl Cursor for ManagedCursor {
    fn release(&self) {
        if !self.released.swap(true, Ordering::AcqRel) {
            self.janitor.release_cursor(self.inner.as_ref());
        }
    }

    fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }
}

impl Drop for ManagedCursor {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::IdentityDecorator;
    use crate::testing::{TestCursor, TestProvider};
    use std::sync::Barrier;
    use streamkeeper_core::CursorProvider;

    fn managed(root: &Arc<TestProvider>) -> (ManagedCursorProvider, Arc<StreamingStatistics>) {
        let identity = IdentityDecorator::new();
        let stats = Arc::new(StreamingStatistics::new());
        let identified = identity.of(&Provider::Root(root.clone() as Arc<dyn CursorProvider>));
        (
            ManagedCursorProvider::new(identified, ContextId::new(), Arc::clone(&stats)),
            stats,
        )
    }

    #[test]
    fn test_open_cursor_counts_and_release_uncounts() {
        let root = Arc::new(TestProvider::bytes());
        let (provider, stats) = managed(&root);

        let a = provider.open_cursor().unwrap();
        let b = provider.open_cursor().unwrap();
        assert_eq!(provider.janitor().open_cursors(), 2);
        assert_eq!(stats.open_cursors(), 2);

        a.release();
        a.release();
        assert_eq!(provider.janitor().open_cursors(), 1);

        drop(b);
        assert_eq!(provider.janitor().open_cursors(), 0);
        assert_eq!(stats.open_cursors(), 0);
        assert_eq!(root.release_count(), 0);
    }

    #[test]
    fn test_close_then_last_cursor_releases_once() {
        let root = Arc::new(TestProvider::bytes());
        let (provider, stats) = managed(&root);

        let cursor = provider.open_cursor().unwrap();
        provider.close();
        assert!(provider.is_closed());
        assert!(root.is_closed());
        assert_eq!(root.release_count(), 0);

        cursor.release();
        assert_eq!(root.release_count(), 1);
        assert_eq!(stats.open_providers(), 0);

        provider.release_resources();
        assert_eq!(root.release_count(), 1);
    }

    #[test]
    fn test_close_without_cursors_releases() {
        let root = Arc::new(TestProvider::bytes());
        let (provider, _) = managed(&root);

        provider.close();
        provider.close();
        assert_eq!(root.release_count(), 1);
        assert!(provider.is_disposed());
    }

    #[test]
    fn test_open_after_close_reports_when() {
        let root = Arc::new(TestProvider::bytes());
        let (provider, _) = managed(&root);
        provider.close();

        match provider.open_cursor() {
            Err(StreamingError::ProviderClosed {
                provider: name,
                closed_at,
                close_site,
            }) => {
                assert_eq!(name, provider.id().to_string());
                assert!(closed_at <= Utc::now());
                assert!(close_site.is_none());
            }
            other => panic!("expected ProviderClosed, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_close_site_capture() {
        let root = Arc::new(TestProvider::bytes());
        let (provider, _) = managed(&root);
        let provider = provider.with_close_site_capture(true);
        provider.close();

        let record = provider.close_record().unwrap();
        if let Some(site) = record.close_site {
            assert!(!site.is_empty());
        }
    }

    #[test]
    fn test_open_after_release_fails() {
        let root = Arc::new(TestProvider::bytes());
        let (provider, _) = managed(&root);
        provider.release_resources();

        assert!(matches!(
            provider.open_cursor(),
            Err(StreamingError::ResourcesReleased { .. })
        ));
        assert!(provider.is_disposed());
    }

    /// Root whose `open_cursor` parks until the test lets it finish
    struct GatedProvider {
        inner: TestProvider,
        entered: Barrier,
        resume: Barrier,
    }

    impl CursorProvider for GatedProvider {
        fn kind(&self) -> StreamKind {
            self.inner.kind()
        }

        fn open_cursor(&self) -> StreamingResult<Box<dyn Cursor>> {
            self.entered.wait();
            self.resume.wait();
            Ok(Box::new(TestCursor::new()))
        }

        fn close(&self) {
            self.inner.close()
        }

        fn is_closed(&self) -> bool {
            self.inner.is_closed()
        }

        fn release_resources(&self) {
            self.inner.release_resources()
        }
    }

    #[test]
    fn test_close_during_delegate_open_defers_release() {
        let gated = Arc::new(GatedProvider {
            inner: TestProvider::bytes(),
            entered: Barrier::new(2),
            resume: Barrier::new(2),
        });
        let stats = Arc::new(StreamingStatistics::new());
        let identified = IdentityDecorator::new()
            .of(&Provider::Root(gated.clone() as Arc<dyn CursorProvider>));
        let provider = Arc::new(ManagedCursorProvider::new(
            identified,
            ContextId::new(),
            Arc::clone(&stats),
        ));

        let opener = {
            let provider = Arc::clone(&provider);
            std::thread::spawn(move || provider.open_cursor())
        };
        gated.entered.wait();
        provider.close();
        assert_eq!(gated.inner.release_count(), 0);
        gated.resume.wait();

        let cursor = opener.join().unwrap().unwrap();
        assert_eq!(gated.inner.release_count(), 0);
        assert_eq!(provider.janitor().open_cursors(), 1);

        cursor.release();
        assert_eq!(gated.inner.release_count(), 1);
        assert_eq!(stats.open_cursors(), 0);
        assert_eq!(stats.snapshot().opened_cursors_total, 1);
    }

    #[test]
    fn test_failed_delegate_open_rolls_back_count() {
        let root = Arc::new(TestProvider::bytes());
        let (provider, stats) = managed(&root);
        root.close();

        assert!(matches!(
            provider.open_cursor(),
            Err(StreamingError::ProviderClosed { .. })
        ));
        assert_eq!(provider.janitor().open_cursors(), 0);
        assert_eq!(stats.open_cursors(), 0);
        assert_eq!(stats.snapshot().opened_cursors_total, 0);
        // Closed through the raw handle and nothing open: released
        assert_eq!(root.release_count(), 1);
        assert!(provider.is_disposed());
    }

    #[test]
    fn test_delegate_and_kind() {
        let root = Arc::new(TestProvider::objects());
        let (provider, _) = managed(&root);
        assert_eq!(provider.kind(), StreamKind::Objects);
        assert_eq!(provider.delegate().id(), provider.id());
    }

    #[test]
    fn test_drop_enqueues_watchers() {
        let root = Arc::new(TestProvider::bytes());
        let (provider, _) = managed(&root);
        let queue = Arc::new(ReferenceQueue::new());
        provider.watch(CollectionWatcher {
            reference: 9,
            queue: Arc::downgrade(&queue),
        });

        drop(provider);
        assert_eq!(queue.drain(), vec![9]);
    }
}
