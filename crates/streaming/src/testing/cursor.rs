use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use streamkeeper_core::Cursor;

type ReleaseHook = Box<dyn FnOnce() + Send>;

/// Cursor double counting its releases
#[derive(Default)]
pub struct TestCursor {
    releases: AtomicUsize,
    on_release: Mutex<Option<ReleaseHook>>,
}

impl TestCursor {
    /// A cursor with no release side effect
    pub fn new() -> Self {
        Self::default()
    }

    /// A cursor running `hook` on its first release
    ///
    /// Models a derived cursor whose release also releases its parent.
    pub fn with_release_hook<F>(hook: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            releases: AtomicUsize::new(0),
            on_release: Mutex::new(Some(Box::new(hook))),
        }
    }

    /// How many times `release()` was called
    pub fn release_count(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

impl Cursor for TestCursor {
    fn release(&self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
        let hook = self.on_release.lock().take();
        if let Some(hook) = hook {
            hook();
        }
    }

    fn is_released(&self) -> bool {
        self.release_count() > 0
    }
}
