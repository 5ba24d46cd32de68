//! Leaks detected by a running service.

use std::sync::Arc;

use crate::common::*;

#[test]
fn running_service_alerts_on_dropped_stream() {
    let t = TestService::open_with(Some("[ghost_buster]\npoll_interval_ms = 10\n"));
    t.service.initialise().unwrap();
    t.service.start().unwrap();

    let root = Arc::new(TestProvider::objects().with_location("aggregate/group-by"));
    drop(
        t.service
            .manage(&Provider::Root(root.clone()), &ContextId::new()),
    );

    assert!(wait_until(|| t.alerts.len() == 1));
    assert_eq!(t.alerts.alerts()[0].location, "aggregate/group-by");
    assert_eq!(root.release_count(), 1);
    assert_eq!(t.service.statistics().leaked_providers(), 1);
}

#[test]
fn disabled_sweeper_still_reclaims_on_sweep() {
    let t = TestService::open_with(Some("[ghost_buster]\nenabled = false\n"));
    t.service.initialise().unwrap();
    t.service.start().unwrap();

    let root = Arc::new(TestProvider::bytes());
    drop(
        t.service
            .manage(&Provider::Root(root.clone()), &ContextId::new()),
    );
    assert_eq!(root.release_count(), 0);
    assert_eq!(t.service.ghost_buster().pending_count(), 1);

    assert_eq!(t.service.sweep(), 1);
    assert_eq!(root.release_count(), 1);
    assert_eq!(t.alerts.len(), 1);
}

#[test]
fn custom_alert_name_is_used() {
    let t = TestService::open_with(Some("[ghost_buster]\nenabled = false\nalert_name = \"LEAKED\"\n"));
    drop(
        t.service
            .manage(&Provider::root(TestProvider::bytes()), &ContextId::new()),
    );
    t.service.sweep();

    let alerts = t.alerts.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].name, "LEAKED");
    assert_eq!(alerts[0].location, streamkeeper::ghost_buster::UNKNOWN_LOCATION);
}

#[test]
fn dropping_service_reclaims_held_streams() {
    let t = TestService::open();
    let root = Arc::new(TestProvider::bytes());
    let held = t
        .service
        .manage(&Provider::Root(root.clone()), &ContextId::new());

    let TestService { service, alerts, dir } = t;
    drop(service);
    assert_eq!(root.release_count(), 1);
    assert_eq!(alerts.len(), 1);
    drop(held);
    drop(dir);
}
