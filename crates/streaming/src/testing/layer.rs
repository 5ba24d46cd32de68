use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use streamkeeper_core::{Cursor, StreamingResult};

use crate::provider::{DecoratorLayer, Provider};

/// Calls observed by a [`TestLayer`]
#[derive(Debug, Default)]
pub struct LayerCounters {
    opens: AtomicUsize,
    closes: AtomicUsize,
    releases: AtomicUsize,
}

impl LayerCounters {
    /// Cursors opened through the layer
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Close calls through the layer
    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Release calls through the layer
    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

/// Forwarding decorator layer that counts calls
#[derive(Debug, Default)]
pub struct TestLayer {
    counters: Arc<LayerCounters>,
}

impl TestLayer {
    /// Shared handle to this layer's counters
    pub fn counters(&self) -> Arc<LayerCounters> {
        Arc::clone(&self.counters)
    }
}

impl DecoratorLayer for TestLayer {
    fn open_cursor(&self, delegate: &Provider) -> StreamingResult<Box<dyn Cursor>> {
        self.counters.opens.fetch_add(1, Ordering::SeqCst);
        delegate.open_cursor()
    }

    fn close(&self, delegate: &Provider) {
        self.counters.closes.fetch_add(1, Ordering::SeqCst);
        delegate.close()
    }

    fn release_resources(&self, delegate: &Provider) {
        self.counters.releases.fetch_add(1, Ordering::SeqCst);
        delegate.release_resources()
    }
}
