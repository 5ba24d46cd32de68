//! Streaming service
//!
//! Wires statistics, identity, the ghost buster and the cursor manager
//! together from one [`StreamingConfig`]. Opening a service from a
//! directory reads `streaming.toml` there, writing the defaults first if
//! the file does not exist.
//!
//! Dropping the service disposes it: every open context is torn down and
//! the ghost buster runs a final sweep.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use streamkeeper_core::{
    AlertSink, ContextId, LoggingAlertSink, StreamingResult, StreamingStatistics,
};
use tracing::{info, warn};

use crate::config::{StreamingConfig, CONFIG_FILE_NAME};
use crate::ghost_buster::{LifecycleState, StreamingGhostBuster};
use crate::identity::IdentityDecorator;
use crate::manager::CursorManager;
use crate::provider::Provider;
use crate::state::TeardownReport;

/// Owner of the streaming lifecycle components
pub struct StreamingService {
    config: StreamingConfig,
    statistics: Arc<StreamingStatistics>,
    identity: Arc<IdentityDecorator>,
    ghost_buster: Arc<StreamingGhostBuster>,
    manager: CursorManager,
    disposed: AtomicBool,
}

impl StreamingService {
    /// Build a service from an explicit configuration
    pub fn new(config: StreamingConfig, alerts: Arc<dyn AlertSink>) -> StreamingResult<Self> {
        config.validate()?;

        let statistics = Arc::new(StreamingStatistics::new());
        let identity = Arc::new(IdentityDecorator::new());
        let ghost_buster = Arc::new(StreamingGhostBuster::new(
            config.ghost_buster.clone(),
            alerts,
            Arc::clone(&statistics),
        ));
        let manager = CursorManager::new(
            Arc::clone(&identity),
            Arc::clone(&ghost_buster),
            Arc::clone(&statistics),
        )
        .with_close_site_capture(config.capture_close_site);

        Ok(Self {
            config,
            statistics,
            identity,
            ghost_buster,
            manager,
            disposed: AtomicBool::new(false),
        })
    }

    /// Open a service configured by `streaming.toml` in `dir`
    ///
    /// Alerts go to the log.
    pub fn open<P: AsRef<Path>>(dir: P) -> StreamingResult<Self> {
        Self::open_with_alerts(dir, Arc::new(LoggingAlertSink))
    }

    /// Open a service configured by `streaming.toml` in `dir`, with a
    /// custom alert sink
    pub fn open_with_alerts<P: AsRef<Path>>(
        dir: P,
        alerts: Arc<dyn AlertSink>,
    ) -> StreamingResult<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;

        let config_path = dir.join(CONFIG_FILE_NAME);
        StreamingConfig::write_default_if_missing(&config_path)?;
        let config = StreamingConfig::from_file(&config_path)?;

        info!(path = %config_path.display(), "streaming service configured");
        Self::new(config, alerts)
    }

    /// Initialise the ghost buster
    pub fn initialise(&self) -> StreamingResult<()> {
        self.ghost_buster.initialise()
    }

    /// Start background leak detection
    pub fn start(&self) -> StreamingResult<()> {
        self.ghost_buster.start()
    }

    /// Stop background leak detection
    pub fn stop(&self) -> StreamingResult<()> {
        self.ghost_buster.stop()
    }

    /// Tear down every open context and dispose the ghost buster
    ///
    /// Idempotent; later calls return an empty report.
    pub fn dispose(&self) -> TeardownReport {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return TeardownReport::default();
        }

        let report = self.manager.dispose_all();
        self.ghost_buster.dispose();

        if report.leaked > 0 {
            warn!(
                providers = report.providers,
                leaked = report.leaked,
                "streaming service disposed with unclosed streams"
            );
        } else {
            info!(providers = report.providers, "streaming service disposed");
        }
        report
    }

    /// Whether `dispose()` has run
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Lifecycle state of the ghost buster
    pub fn state(&self) -> LifecycleState {
        self.ghost_buster.state()
    }

    /// Manage `provider` in `context`
    pub fn manage(&self, provider: &Provider, context: &ContextId) -> Provider {
        self.manager.manage(provider, context)
    }

    /// End `context`
    pub fn dispose_context(&self, context: &ContextId) -> TeardownReport {
        self.manager.dispose_context(context)
    }

    /// Run a sweep now
    pub fn sweep(&self) -> usize {
        self.ghost_buster.sweep()
    }

    /// Active configuration
    pub fn config(&self) -> &StreamingConfig {
        &self.config
    }

    /// Shared statistics
    pub fn statistics(&self) -> &Arc<StreamingStatistics> {
        &self.statistics
    }

    /// Identity decorator
    pub fn identity(&self) -> &Arc<IdentityDecorator> {
        &self.identity
    }

    /// Ghost buster
    pub fn ghost_buster(&self) -> &Arc<StreamingGhostBuster> {
        &self.ghost_buster
    }

    /// Cursor manager
    pub fn cursor_manager(&self) -> &CursorManager {
        &self.manager
    }
}

impl Drop for StreamingService {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for StreamingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingService")
            .field("config", &self.config)
            .field("manager", &self.manager)
            .field("ghost_buster", &self.ghost_buster)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
