//! Event subsystem: queue waits, handler dispatch, SRQ helper.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use common::TestBackend;
use visa::constants::{AttrId, EventMechanism, EventType, StatusCode};
use visa::{AnyResource, AttrValue, Error, OpenOptions, Resource, ResourceManager};

fn open(backend: &Arc<TestBackend>, name: &str) -> (ResourceManager, AnyResource) {
    let rm = ResourceManager::new(backend.clone()).unwrap();
    let resource = rm.open_resource(name, OpenOptions::default()).unwrap();
    (rm, resource)
}

#[test]
fn wait_timeout_is_a_response_not_an_error() {
    let backend = TestBackend::new();
    let (_rm, resource) = open(&backend, "GPIB0::14::INSTR");

    resource
        .enable_event(EventType::ServiceRequest, EventMechanism::QUEUE)
        .unwrap();
    let response = resource
        .wait_on_event(EventType::ServiceRequest, 10)
        .unwrap();
    assert!(response.timed_out);
    assert_eq!(response.event.event_type, EventType::ServiceRequest);
    assert!(response.event.status().is_none());
}

#[test]
fn queued_event_is_delivered_with_snapshot() {
    let backend = TestBackend::new();
    let (_rm, resource) = open(&backend, "GPIB0::14::INSTR");

    resource
        .enable_event(EventType::IoCompletion, EventMechanism::QUEUE)
        .unwrap();
    backend.post_event(
        "GPIB0::14::INSTR",
        EventType::IoCompletion,
        vec![
            (AttrId::STATUS, AttrValue::U32(0)),
            (AttrId::RET_COUNT, AttrValue::U64(512)),
        ],
    );

    let response = resource.wait_on_event(EventType::IoCompletion, 10).unwrap();
    assert!(!response.timed_out);
    assert_eq!(response.event.return_count(), Some(512));
    assert_eq!(response.event.status(), Some(StatusCode::SUCCESS));
    // The snapshot outlives the backend context, which was closed already.
    assert_eq!(response.event.resource_name, "GPIB0::14::INSTR");
}

#[test]
fn waiting_without_enabling_fails() {
    let backend = TestBackend::new();
    let (_rm, resource) = open(&backend, "GPIB0::14::INSTR");

    let err = resource
        .wait_on_event(EventType::ServiceRequest, 10)
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Io {
            status: StatusCode::ERROR_NENABLED,
            ..
        }
    ));
}

#[test]
fn enable_disable_discard_state_machine() {
    let backend = TestBackend::new();
    let (_rm, resource) = open(&backend, "GPIB0::14::INSTR");
    let srq = EventType::ServiceRequest;

    // Enabling twice is a no-op.
    resource.enable_event(srq, EventMechanism::QUEUE).unwrap();
    resource.enable_event(srq, EventMechanism::QUEUE).unwrap();

    // Discarding empties the queue without touching enablement.
    backend.post_event("GPIB0::14::INSTR", srq, vec![]);
    backend.post_event("GPIB0::14::INSTR", srq, vec![]);
    resource.discard_events(srq, EventMechanism::QUEUE).unwrap();
    assert!(resource.wait_on_event(srq, 0).unwrap().timed_out);

    backend.post_event("GPIB0::14::INSTR", srq, vec![]);
    assert!(!resource.wait_on_event(srq, 0).unwrap().timed_out);

    // Disabling returns to the pre-enable state.
    resource.disable_event(srq, EventMechanism::QUEUE).unwrap();
    let err = resource.wait_on_event(srq, 0).unwrap_err();
    assert!(matches!(
        err,
        Error::Io {
            status: StatusCode::ERROR_NENABLED,
            ..
        }
    ));
    // A second disable is a no-op as the state already matches.
    resource.disable_event(srq, EventMechanism::QUEUE).unwrap();
}

#[test]
fn handlers_receive_events_and_user_handles() {
    let backend = TestBackend::new();
    let (_rm, resource) = open(&backend, "GPIB0::15::INSTR");
    let srq = EventType::ServiceRequest;

    resource.enable_event(srq, EventMechanism::HANDLER).unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let seen_handle = Arc::new(AtomicUsize::new(0));
    let handler = {
        let calls = calls.clone();
        let seen_handle = seen_handle.clone();
        Arc::new(move |event: &visa::Event, user: Option<u64>| {
            assert_eq!(event.event_type, EventType::ServiceRequest);
            seen_handle.store(user.unwrap_or(0) as usize, Ordering::SeqCst);
            calls.fetch_add(1, Ordering::SeqCst);
        })
    };

    let id = resource
        .install_handler(srq, handler.clone(), Some(7))
        .unwrap();
    backend.dispatch_handlers("GPIB0::15::INSTR", srq, vec![]);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(seen_handle.load(Ordering::SeqCst), 7);

    // The same callable installs again under a distinct id.
    let second = resource.install_handler(srq, handler, Some(9)).unwrap();
    assert_ne!(id, second);
    backend.dispatch_handlers("GPIB0::15::INSTR", srq, vec![]);
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    // Uninstalling one registration leaves the other active.
    resource.uninstall_handler(srq, id).unwrap();
    backend.dispatch_handlers("GPIB0::15::INSTR", srq, vec![]);
    assert_eq!(calls.load(Ordering::SeqCst), 4);

    // The opaque id is required; a stale one is rejected.
    let err = resource.uninstall_handler(srq, id).unwrap_err();
    assert!(matches!(err, Error::Io { .. }));
}

#[test]
fn handler_panic_stays_at_the_dispatch_boundary() {
    let backend = TestBackend::new();
    let (_rm, resource) = open(&backend, "GPIB0::16::INSTR");
    let srq = EventType::ServiceRequest;
    resource.enable_event(srq, EventMechanism::HANDLER).unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    resource
        .install_handler(
            srq,
            Arc::new(|_: &visa::Event, _: Option<u64>| panic!("handler bug")),
            None,
        )
        .unwrap();
    let counting = {
        let calls = calls.clone();
        Arc::new(move |_: &visa::Event, _: Option<u64>| {
            calls.fetch_add(1, Ordering::SeqCst);
        })
    };
    resource.install_handler(srq, counting, None).unwrap();

    // The panicking handler must not take down dispatch or the backend.
    backend.dispatch_handlers("GPIB0::16::INSTR", srq, vec![]);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn wait_for_srq_checks_this_device() {
    let backend = TestBackend::new();
    let rm = ResourceManager::new(backend.clone()).unwrap();
    let instr = rm
        .open_resource("GPIB0::17::INSTR", OpenOptions::default())
        .unwrap()
        .into_gpib_instrument()
        .ok()
        .unwrap();

    backend.set_stb("GPIB0::17::INSTR", 0x40);
    backend.post_event("GPIB0::17::INSTR", EventType::ServiceRequest, vec![]);
    instr.wait_for_srq(Some(100)).unwrap();

    // Without a pending SRQ the wait times out as an error.
    let err = instr.wait_for_srq(Some(10)).unwrap_err();
    assert!(matches!(
        err,
        Error::Timeout {
            op: "wait_for_srq",
            ..
        }
    ));
}

#[test]
fn close_disables_all_events() {
    let backend = TestBackend::new();
    let (_rm, resource) = open(&backend, "GPIB0::18::INSTR");
    let srq = EventType::ServiceRequest;

    resource.enable_event(srq, EventMechanism::QUEUE).unwrap();
    resource
        .install_handler(srq, Arc::new(|_: &visa::Event, _: Option<u64>| {}), None)
        .unwrap();
    resource.close().unwrap();

    let err = resource.wait_on_event(srq, 0).unwrap_err();
    assert!(matches!(err, Error::InvalidSession));
}
