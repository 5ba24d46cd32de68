//! Leak detection tests with the background sweeper running
//!
//! Managed providers are dropped without being closed and the test waits
//! for the sweeper thread to reclaim them.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use streamkeeper_core::{ContextId, RecordingAlertSink, StreamingStatistics, UNCLOSED_STREAM_ALERT};
use streamkeeper_streaming::testing::TestProvider;
use streamkeeper_streaming::{
    CursorManager, GhostBusterConfig, IdentityDecorator, LifecycleState, Provider,
    StreamingGhostBuster,
};

// ============================================================================
// Test Helpers
// ============================================================================

struct Harness {
    manager: CursorManager,
    buster: Arc<StreamingGhostBuster>,
    alerts: Arc<RecordingAlertSink>,
    stats: Arc<StreamingStatistics>,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

fn started_harness() -> Harness {
    init_tracing();
    let alerts = Arc::new(RecordingAlertSink::new());
    let stats = Arc::new(StreamingStatistics::new());
    let config = GhostBusterConfig {
        poll_interval_ms: 10,
        ..GhostBusterConfig::default()
    };
    let buster = Arc::new(StreamingGhostBuster::new(
        config,
        alerts.clone(),
        Arc::clone(&stats),
    ));
    buster.initialise().unwrap();
    buster.start().unwrap();

    let manager = CursorManager::new(
        Arc::new(IdentityDecorator::new()),
        Arc::clone(&buster),
        Arc::clone(&stats),
    );
    Harness {
        manager,
        buster,
        alerts,
        stats,
    }
}

fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

// ============================================================================
// Leak Detection
// ============================================================================

#[test]
fn test_sweeper_reclaims_dropped_provider() {
    let h = started_harness();
    let root = Arc::new(TestProvider::bytes().with_location("split-order/lines"));
    let managed = h
        .manager
        .manage(&Provider::Root(root.clone()), &ContextId::new());
    drop(managed.open_cursor().unwrap());
    drop(managed);

    assert!(wait_until(|| h.alerts.len() == 1));
    assert!(wait_until(|| h.buster.tracked_count() == 0));

    let alert = &h.alerts.alerts()[0];
    assert_eq!(alert.name, UNCLOSED_STREAM_ALERT);
    assert_eq!(alert.location, "split-order/lines");
    assert_eq!(root.release_count(), 1);
    assert_eq!(h.buster.leaks_detected(), 1);
    assert_eq!(h.stats.leaked_providers(), 1);
    assert_eq!(h.stats.open_providers(), 0);

    h.buster.stop().unwrap();
    assert_eq!(h.buster.state(), LifecycleState::Stopped);
}

#[test]
fn test_closed_provider_is_silent() {
    let h = started_harness();
    let root = Arc::new(TestProvider::objects());
    let managed = h
        .manager
        .manage(&Provider::Root(root.clone()), &ContextId::new());
    let cursor = managed.open_cursor().unwrap();
    managed.close();
    cursor.release();
    drop(cursor);
    drop(managed);

    assert!(wait_until(|| h.buster.tracked_count() == 0));
    assert!(h.alerts.is_empty());
    assert_eq!(root.release_count(), 1);
    assert_eq!(h.buster.leaks_detected(), 0);
}

#[test]
fn test_random_mix_of_closed_and_leaked() {
    let h = started_harness();
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let context = ContextId::new();

    let mut roots = Vec::new();
    let mut leaked = 0;
    for _ in 0..50 {
        let root = Arc::new(TestProvider::bytes());
        let managed = h.manager.manage(&Provider::Root(root.clone()), &context);
        if rng.gen_bool(0.5) {
            managed.close();
        } else {
            leaked += 1;
        }
        roots.push(root);
    }

    assert!(wait_until(|| h.buster.tracked_count() == 0));
    assert!(wait_until(|| h.alerts.len() == leaked));
    for root in &roots {
        assert_eq!(root.release_count(), 1);
    }
    assert_eq!(h.buster.leaks_detected(), leaked as u64);
    assert!(h.manager.context(&context).unwrap().is_empty());
}

#[test]
fn test_restart_resumes_detection() {
    let h = started_harness();
    h.buster.stop().unwrap();

    let root = Arc::new(TestProvider::bytes());
    drop(
        h.manager
            .manage(&Provider::Root(root.clone()), &ContextId::new()),
    );
    thread::sleep(Duration::from_millis(30));
    assert_eq!(h.buster.pending_count(), 1);
    assert_eq!(root.release_count(), 0);

    h.buster.start().unwrap();
    assert!(wait_until(|| root.release_count() == 1));
    assert_eq!(h.alerts.len(), 1);
}

#[test]
fn test_dispose_runs_final_sweep() {
    let h = started_harness();
    h.buster.stop().unwrap();

    let root = Arc::new(TestProvider::bytes());
    drop(
        h.manager
            .manage(&Provider::Root(root.clone()), &ContextId::new()),
    );

    h.buster.dispose();
    assert_eq!(h.buster.state(), LifecycleState::Disposed);
    assert_eq!(root.release_count(), 1);
    assert_eq!(h.alerts.len(), 1);
    assert!(h.buster.start().is_err());
}
