//! Service lifecycle and teardown.

use std::sync::Arc;

use crate::common::*;

#[test]
fn full_lifecycle() {
    let t = TestService::open();
    let service = &t.service;

    assert_eq!(service.state(), LifecycleState::Created);
    service.initialise().unwrap();
    assert_eq!(service.state(), LifecycleState::Initialised);
    service.start().unwrap();
    assert_eq!(service.state(), LifecycleState::Started);
    service.stop().unwrap();
    service.start().unwrap();
    service.stop().unwrap();
    assert_eq!(service.state(), LifecycleState::Stopped);

    service.dispose();
    assert_eq!(service.state(), LifecycleState::Disposed);
    assert!(service.initialise().is_err());
}

#[test]
fn double_initialise_fails() {
    let t = TestService::open();
    t.service.initialise().unwrap();
    assert!(matches!(
        t.service.initialise(),
        Err(StreamingError::Lifecycle(_))
    ));
}

#[test]
fn stop_without_start_fails() {
    let t = TestService::open();
    t.service.initialise().unwrap();
    assert!(t.service.stop().is_err());
}

#[test]
fn closed_streams_release_through_service() {
    let t = TestService::open();
    t.service.initialise().unwrap();
    t.service.start().unwrap();

    let context = ContextId::new();
    let root = Arc::new(TestProvider::bytes());
    let managed = t.service.manage(&Provider::Root(root.clone()), &context);
    let again = t.service.manage(&managed, &context);
    assert!(managed.same_instance(&again));

    let first = managed.open_cursor().unwrap();
    let second = managed.open_cursor().unwrap();
    managed.close();
    assert!(managed.open_cursor().is_err());
    first.release();
    assert_eq!(root.release_count(), 0);
    drop(second);
    assert_eq!(root.release_count(), 1);

    let snapshot = t.service.statistics().snapshot();
    assert_eq!(snapshot.open_cursors, 0);
    assert_eq!(snapshot.open_providers, 0);
    assert_eq!(snapshot.leaked_providers, 0);

    let report = t.service.dispose_context(&context);
    assert_eq!(report.leaked, 0);
    assert!(t.alerts.is_empty());
}

#[test]
fn dispose_tears_down_every_context() {
    let t = TestService::open();
    let roots: Vec<Arc<TestProvider>> = (0..4).map(|_| Arc::new(TestProvider::bytes())).collect();
    let held: Vec<Provider> = roots
        .iter()
        .map(|root| t.service.manage(&Provider::Root(root.clone()), &ContextId::new()))
        .collect();
    held[0].close();

    let report = t.service.dispose();
    assert_eq!(report.providers, 4);
    assert_eq!(report.leaked, 3);
    assert_eq!(t.alerts.len(), 3);
    for root in &roots {
        assert_eq!(root.release_count(), 1);
    }
    assert_eq!(t.service.cursor_manager().context_count(), 0);
}

#[test]
fn close_site_reported_when_enabled() {
    let t = TestService::open_with(Some("capture_close_site = true\n"));
    let managed = t
        .service
        .manage(&Provider::root(TestProvider::bytes()), &ContextId::new());
    managed.close();

    match managed.open_cursor() {
        Err(StreamingError::ProviderClosed { close_site, .. }) => assert!(close_site.is_some()),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("cursor opened on closed provider"),
    }
}
