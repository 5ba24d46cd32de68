use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use streamkeeper_core::{
    ComponentLocation, Cursor, CursorProvider, StreamKind, StreamingError, StreamingResult,
};

use super::TestCursor;

/// Root provider double
///
/// Counts every `release_resources()` call instead of deduplicating, so a
/// count above one means something upstream released twice.
pub struct TestProvider {
    kind: StreamKind,
    location: Option<ComponentLocation>,
    closed_at: Mutex<Option<DateTime<Utc>>>,
    cursors_opened: AtomicUsize,
    releases: AtomicUsize,
    panic_on_release: bool,
}

impl TestProvider {
    fn new(kind: StreamKind) -> Self {
        Self {
            kind,
            location: None,
            closed_at: Mutex::new(None),
            cursors_opened: AtomicUsize::new(0),
            releases: AtomicUsize::new(0),
            panic_on_release: false,
        }
    }

    /// A byte-stream provider
    pub fn bytes() -> Self {
        Self::new(StreamKind::Bytes)
    }

    /// An object-iterator provider
    pub fn objects() -> Self {
        Self::new(StreamKind::Objects)
    }

    /// Attach an originating location
    pub fn with_location(mut self, location: &str) -> Self {
        self.location = Some(ComponentLocation::new(location));
        self
    }

    /// Panic from `release_resources()` after counting the call
    pub fn panicking_on_release(mut self) -> Self {
        self.panic_on_release = true;
        self
    }

    /// How many times `release_resources()` was called
    pub fn release_count(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    /// How many cursors were opened
    pub fn cursors_opened(&self) -> usize {
        self.cursors_opened.load(Ordering::SeqCst)
    }
}

impl CursorProvider for TestProvider {
    fn kind(&self) -> StreamKind {
        self.kind
    }

    fn open_cursor(&self) -> StreamingResult<Box<dyn Cursor>> {
        if let Some(closed_at) = *self.closed_at.lock() {
            return Err(StreamingError::ProviderClosed {
                provider: format!("test {} provider", self.kind),
                closed_at,
                close_site: None,
            });
        }
        self.cursors_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(TestCursor::new()))
    }

    fn close(&self) {
        let mut closed_at = self.closed_at.lock();
        if closed_at.is_none() {
            *closed_at = Some(Utc::now());
        }
    }

    fn is_closed(&self) -> bool {
        self.closed_at.lock().is_some()
    }

    fn release_resources(&self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
        if self.panic_on_release {
            panic!("test provider failed to release its buffer");
        }
    }

    fn originating_location(&self) -> Option<&ComponentLocation> {
        self.location.as_ref()
    }
}
