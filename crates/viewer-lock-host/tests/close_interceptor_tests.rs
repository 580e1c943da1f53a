//! Integration tests for close interception and notifications.

mod common;

use std::cell::Cell;
use std::rc::Rc;

use viewer_lock_core::HostBoundary;
use viewer_lock_host::{CloseDecision, LifecycleAction, LockState};

#[test]
fn close_interceptor_tests_reports_each_rejected_close_once() {
    let (host, _) = common::fixture_host();
    let bridge = host.bridge().expect("bridge should be created");
    let seen = Rc::new(Cell::new(0_u32));
    let counter = Rc::clone(&seen);
    bridge.on_close_attempt(Box::new(move || counter.set(counter.get() + 1)));

    for _ in 0..5 {
        let decision = host
            .with_host(|host| host.handle_close_request())
            .expect("host should be available");
        assert_eq!(decision, CloseDecision::Suppress);
    }

    assert_eq!(bridge.dispatch_events(), 5);
    assert_eq!(seen.get(), 5);
    assert_eq!(bridge.dispatch_events(), 0);
    assert_eq!(
        host.with_host(|host| host.rejected_closes()).expect("host"),
        5
    );
}

#[test]
fn close_interceptor_tests_allows_close_after_unlock_without_event() {
    let (host, close_requests) = common::fixture_host();
    let bridge = host.bridge().expect("bridge should be created");

    assert!(bridge.unlock("password"));
    assert_eq!(close_requests.get(), 1);

    let decision = host
        .with_host(|host| host.handle_close_request())
        .expect("host should be available");
    assert_eq!(decision, CloseDecision::Proceed);
    assert_eq!(bridge.dispatch_events(), 0);

    let action = host
        .with_host(|host| host.window_destroyed())
        .expect("host should be available");
    assert_eq!(action, LifecycleAction::Quit);
}

#[test]
fn close_interceptor_tests_notifies_every_bridge_and_listener() {
    let (host, _) = common::fixture_host();
    let first = host.bridge().expect("bridge should be created");
    let second = host.bridge().expect("bridge should be created");
    let hits = Rc::new(Cell::new(0_u32));
    for bridge in [&first, &second] {
        let hits = Rc::clone(&hits);
        bridge.on_close_attempt(Box::new(move || hits.set(hits.get() + 1)));
    }
    let extra = Rc::clone(&hits);
    first.on_close_attempt(Box::new(move || extra.set(extra.get() + 10)));

    host.with_host(|host| host.handle_close_request())
        .expect("host should be available");

    assert_eq!(first.dispatch_events(), 1);
    assert_eq!(second.dispatch_events(), 1);
    assert_eq!(hits.get(), 12);
}

#[test]
fn close_interceptor_tests_dropped_bridge_does_not_block_events() {
    let (host, _) = common::fixture_host();
    drop(host.bridge().expect("bridge should be created"));
    let live = host.bridge().expect("bridge should be created");

    host.with_host(|host| host.handle_close_request())
        .expect("host should be available");
    assert_eq!(live.dispatch_events(), 1);
    assert_eq!(
        host.with_host(|host| host.lock_state()).expect("host"),
        LockState::Locked
    );
}

#[test]
fn close_interceptor_tests_activate_recreates_only_missing_window() {
    let (host, close_requests) = common::fixture_host();
    let factory_calls = Rc::new(Cell::new(0_u32));

    let calls = Rc::clone(&factory_calls);
    let requests = Rc::clone(&close_requests);
    let created = host
        .with_host(|host| {
            host.activate(|_| {
                calls.set(calls.get() + 1);
                Ok(common::RecordingWindow {
                    close_requests: requests,
                })
            })
        })
        .expect("host should be available")
        .expect("activate should succeed");
    assert!(!created);
    assert_eq!(factory_calls.get(), 0);

    let action = host
        .with_host(|host| host.window_destroyed())
        .expect("host should be available");
    assert_eq!(action, LifecycleAction::Quit);
    assert!(!host.with_host(|host| host.has_window()).expect("host"));

    let calls = Rc::clone(&factory_calls);
    let requests = Rc::clone(&close_requests);
    let created = host
        .with_host(|host| {
            host.activate(|spec| {
                assert_eq!((spec.width, spec.height), (800, 600));
                calls.set(calls.get() + 1);
                Ok(common::RecordingWindow {
                    close_requests: requests,
                })
            })
        })
        .expect("host should be available")
        .expect("activate should succeed");
    assert!(created);
    assert_eq!(factory_calls.get(), 1);
    assert!(host.with_host(|host| host.has_window()).expect("host"));
    assert_eq!(
        host.with_host(|host| host.lock_state()).expect("host"),
        LockState::Locked
    );
    assert_eq!(
        host.with_host(|host| host.handle_close_request()).expect("host"),
        CloseDecision::Suppress
    );
}
