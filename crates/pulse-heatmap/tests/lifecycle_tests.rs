//! Integration tests for tracker enablement, unload delivery and teardown.

mod common;

use std::sync::Arc;

use pulse_core::host::SyntheticHost;
use pulse_core::lifecycle::CollectorState;
use pulse_detect::ScrollMetrics;
use pulse_transport::SyntheticTransport;

fn metrics() -> ScrollMetrics {
    ScrollMetrics {
        scroll_y: 500.0,
        scroll_height: 2_000.0,
        viewport_height: 1_000.0,
        viewport_width: 1_440.0,
    }
}

#[test]
fn lifecycle_tests_disabled_tracker_stays_dormant() {
    let host = Arc::new(SyntheticHost::new());
    let transport = Arc::new(SyntheticTransport::new());
    let mut options = common::options();
    options.enabled = Some(false);
    let mut tracker = common::tracker(&options, host.clone(), transport.clone());
    let (document, button) = common::document_with_button();

    tracker.handle_click(&document, 1.0, 1.0, button, 10);
    assert_eq!(tracker.state(), CollectorState::Uninitialized);
    assert!(host.attached().is_empty());
    assert!(transport.requests().is_empty());
    assert_eq!(tracker.buffered_events(), 0);
}

#[test]
fn lifecycle_tests_repeated_scroll_triples_send_one_event() {
    let transport = Arc::new(SyntheticTransport::new());
    let mut options = common::options();
    options.scroll_throttle = Some(0);
    options.batch_size = Some(50);
    let mut tracker = common::tracker(&options, Arc::new(SyntheticHost::new()), transport.clone());

    for at in 1..=25 {
        tracker.handle_scroll(metrics(), at);
    }
    assert_eq!(tracker.buffered_scrolls(), 25);
    tracker.tick(1_000);

    let grouped: Vec<_> = common::bodies(&transport, common::INGEST_URL)
        .into_iter()
        .filter(|body| body.get("events").is_some())
        .collect();
    assert_eq!(grouped.len(), 1);
    let events = grouped[0]["events"].as_array().expect("events array");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["payload"]["depth"], 50);
    assert_eq!(events[0]["payload"]["viewport_width"], 1440);
}

#[test]
fn lifecycle_tests_disable_buffers_until_enabled() {
    let transport = Arc::new(SyntheticTransport::new());
    let mut tracker = common::tracker(&common::options(), Arc::new(SyntheticHost::new()), transport.clone());
    let (document, button) = common::document_with_button();

    tracker.disable();
    tracker.handle_click(&document, 1.0, 1.0, button, 10);
    tracker.tick(1_000);
    assert_eq!(tracker.buffered_events(), 1);
    assert!(common::events_of_type(&transport, common::INGEST_URL, "click").is_empty());

    tracker.enable(1_500).expect("enable should succeed");
    tracker.tick(2_000);
    assert_eq!(tracker.buffered_events(), 0);
    assert_eq!(common::events_of_type(&transport, common::INGEST_URL, "click").len(), 1);
}

#[test]
fn lifecycle_tests_hidden_page_beacons_without_session_end() {
    let transport = Arc::new(SyntheticTransport::new());
    let mut tracker = common::tracker(&common::options(), Arc::new(SyntheticHost::new()), transport.clone());
    let (document, button) = common::document_with_button();
    tracker.handle_click(&document, 1.0, 1.0, button, 10);

    tracker.on_visibility_change(true);

    let beacons = transport.beacons();
    assert_eq!(beacons.len(), 1);
    assert_eq!(beacons[0].url, common::INGEST_URL);
    assert_eq!(tracker.buffered_events(), 0);
}

#[test]
fn lifecycle_tests_page_hide_sends_session_end_once_after_flush() {
    let transport = Arc::new(SyntheticTransport::new());
    let mut tracker = common::tracker(&common::options(), Arc::new(SyntheticHost::new()), transport.clone());
    let (document, button) = common::document_with_button();
    tracker.handle_click(&document, 1.0, 1.0, button, 10);

    tracker.on_page_hide(5_000);
    tracker.on_page_hide(5_001);

    let beacons = transport.beacons();
    assert_eq!(beacons.len(), 2);
    assert_eq!(beacons[0].url, common::INGEST_URL);
    assert_eq!(beacons[1].url, "https://api.test/api/sessions?key=pk_test");
    let end: serde_json::Value = serde_json::from_slice(&beacons[1].body).expect("json");
    assert_eq!(end["session_id"], tracker.session_id());
    assert_eq!(end["metadata"]["events_count"], 1);
    assert_eq!(end["metadata"]["ended_at"], 5_000);
}

#[test]
fn lifecycle_tests_destroy_is_idempotent() {
    let host = Arc::new(SyntheticHost::new());
    let transport = Arc::new(SyntheticTransport::new());
    let mut tracker = common::tracker(&common::options(), host.clone(), transport.clone());
    let (document, button) = common::document_with_button();
    tracker.handle_click(&document, 1.0, 1.0, button, 10);
    assert_eq!(host.attached().len(), 4);

    let first = tracker.destroy();
    let second = tracker.destroy();

    assert_eq!(first.delivered, 1);
    assert!(second.is_idle());
    assert_eq!(tracker.state(), CollectorState::Destroyed);
    assert!(host.attached().is_empty());

    tracker.handle_click(&document, 1.0, 1.0, button, 20);
    assert_eq!(tracker.buffered_events(), 0);
}
