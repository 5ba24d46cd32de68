//! Shared helpers for the service test suite.

#![allow(dead_code)]

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

pub use streamkeeper::testing::{TestCursor, TestProvider};
pub use streamkeeper::{
    ContextId, GhostBusterConfig, LifecycleState, Provider, RecordingAlertSink, StreamingConfig,
    StreamingError, StreamingService, CONFIG_FILE_NAME,
};
use tempfile::TempDir;

/// Service opened from a fresh temporary directory
pub struct TestService {
    pub service: StreamingService,
    pub alerts: Arc<RecordingAlertSink>,
    pub dir: TempDir,
}

impl TestService {
    /// Open with whatever `streaming.toml` the directory ends up with
    pub fn open() -> Self {
        Self::open_with(None)
    }

    /// Write `toml` as `streaming.toml` first, then open
    pub fn open_with(toml: Option<&str>) -> Self {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();

        let dir = TempDir::new().unwrap();
        if let Some(toml) = toml {
            std::fs::write(dir.path().join(CONFIG_FILE_NAME), toml).unwrap();
        }
        let alerts = Arc::new(RecordingAlertSink::new());
        let service = StreamingService::open_with_alerts(dir.path(), alerts.clone()).unwrap();
        Self {
            service,
            alerts,
            dir,
        }
    }
}

/// Poll `condition` for up to five seconds
pub fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}
