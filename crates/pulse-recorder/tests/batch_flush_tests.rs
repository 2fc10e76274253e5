//! Integration tests for grouped flushing, size triggers and requeue order.

mod common;

use std::sync::Arc;

use pulse_core::host::SyntheticHost;
use pulse_transport::{IDEMPOTENCY_HEADER, SyntheticFailure, SyntheticTransport};

#[test]
fn batch_flush_tests_size_trigger_flushes_without_timer() {
    let transport = Arc::new(SyntheticTransport::new());
    let mut options = common::options();
    options.batch_size = Some(3);
    let mut recorder = common::recorder(&options, Arc::new(SyntheticHost::new()), transport.clone());
    let (document, _, _, _, submit) = common::checkout_form();

    recorder.handle_click(&document, 1.0, 1.0, submit, 1_010);
    assert!(common::batches(&transport).is_empty());
    assert_eq!(recorder.buffered_events(), 2);

    recorder.handle_click(&document, 2.0, 2.0, submit, 1_020);
    let batches = common::batches(&transport);
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0]["events"].as_array().map(Vec::len), Some(3));
    assert_eq!(recorder.buffered_events(), 0);
}

#[test]
fn batch_flush_tests_failed_batch_is_delivered_before_newer_events() {
    let transport = Arc::new(SyntheticTransport::new());
    let mut options = common::options();
    options.batch_size = Some(5);
    let mut recorder = common::recorder(&options, Arc::new(SyntheticHost::new()), transport.clone());
    let (document, _, _, _, submit) = common::checkout_form();

    transport.fail_next(SyntheticFailure::Status(502));
    for offset in 1..=4_u64 {
        recorder.handle_click(&document, offset as f64, 0.0, submit, 1_000 + offset * 10);
    }
    assert_eq!(recorder.buffered_events(), 5);
    assert_eq!(recorder.buffer_stats().requeued, 5);

    for offset in 5..=6_u64 {
        recorder.handle_click(&document, offset as f64, 0.0, submit, 1_000 + offset * 10);
    }
    assert_eq!(transport.requests_to(common::EVENTS_URL).len(), 1);
    assert_eq!(recorder.buffered_events(), 7);

    recorder.tick(&document, 10_000);
    let requests = transport.requests_to(common::EVENTS_URL);
    assert_eq!(requests.len(), 2);
    assert_eq!(
        requests[0].header(IDEMPOTENCY_HEADER),
        requests[1].header(IDEMPOTENCY_HEADER)
    );
    assert_eq!(recorder.buffered_events(), 2);

    recorder.handle_click(&document, 7.0, 0.0, submit, 10_010);
    recorder.tick(&document, 12_000);
    assert_eq!(transport.requests_to(common::EVENTS_URL).len(), 3);

    let delivered: Vec<u64> = common::sent_events(&transport)
        .iter()
        .skip(5)
        .filter_map(|event| event["timestamp"].as_u64())
        .collect();
    assert_eq!(delivered, vec![0, 10, 20, 30, 40, 50, 60, 9_010]);
    assert_eq!(recorder.buffered_events(), 0);
}

#[test]
fn batch_flush_tests_outage_waits_for_tick_instead_of_resending_per_event() {
    let transport = Arc::new(SyntheticTransport::new());
    let mut options = common::options();
    options.batch_size = Some(5);
    let mut recorder = common::recorder(&options, Arc::new(SyntheticHost::new()), transport.clone());
    let (document, _, _, _, submit) = common::checkout_form();

    for _ in 0..20 {
        transport.fail_next(SyntheticFailure::Status(503));
    }
    for offset in 1..=14_u64 {
        recorder.handle_click(&document, offset as f64, 0.0, submit, 1_000 + offset * 10);
    }
    assert_eq!(transport.requests_to(common::EVENTS_URL).len(), 1);
    assert_eq!(recorder.buffered_events(), 15);

    recorder.tick(&document, 3_000);
    assert_eq!(transport.requests_to(common::EVENTS_URL).len(), 2);
    assert_eq!(recorder.buffered_events(), 15);
}

#[test]
fn batch_flush_tests_failing_registration_is_retried_only_by_tick() {
    let transport = Arc::new(SyntheticTransport::new());
    for _ in 0..20 {
        transport.fail_next(SyntheticFailure::Status(503));
    }
    let mut options = common::options();
    options.batch_size = Some(5);
    let mut recorder = common::recorder(&options, Arc::new(SyntheticHost::new()), transport.clone());
    let (document, _, _, _, submit) = common::checkout_form();

    for offset in 1..=14_u64 {
        recorder.handle_click(&document, offset as f64, 0.0, submit, 1_000 + offset * 10);
    }
    assert_eq!(transport.requests_to(common::SESSIONS_URL).len(), 2);
    assert!(common::batches(&transport).is_empty());

    recorder.tick(&document, 3_000);
    assert_eq!(transport.requests_to(common::SESSIONS_URL).len(), 3);
    assert_eq!(recorder.buffered_events(), 15);
}

#[test]
fn batch_flush_tests_idle_recorder_makes_no_requests() {
    let transport = Arc::new(SyntheticTransport::new());
    let mut recorder = common::recorder(&common::options(), Arc::new(SyntheticHost::new()), transport.clone());
    let (document, _, _, _, _) = common::checkout_form();

    recorder.tick(&document, 3_000);
    assert_eq!(common::batches(&transport).len(), 1);
    recorder.tick(&document, 5_000);
    recorder.tick(&document, 7_000);
    assert_eq!(common::batches(&transport).len(), 1);
}
