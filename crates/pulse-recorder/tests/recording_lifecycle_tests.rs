//! Integration tests for recorder markers, mutation coalescing and teardown.

mod common;

use std::sync::Arc;

use pulse_core::host::{BrowserEventKind, Capabilities, SyntheticHost};
use pulse_core::lifecycle::CollectorState;
use pulse_recorder::SessionRecorder;
use pulse_transport::SyntheticTransport;
use serde_json::Value;

fn pending(recorder: &SessionRecorder) -> Vec<Value> {
    recorder
        .pending_events()
        .map(|event| serde_json::to_value(event).expect("event should encode"))
        .collect()
}

fn timeline(events: &[Value]) -> Vec<String> {
    events
        .iter()
        .map(|event| match event["payload"]["action"].as_str() {
            Some(action) => action.to_string(),
            None => event["event_type"].as_str().unwrap_or_default().to_string(),
        })
        .collect()
}

#[test]
fn recording_lifecycle_tests_pause_discards_events_between_markers() {
    let mut recorder = common::recorder(
        &common::options(),
        Arc::new(SyntheticHost::new()),
        Arc::new(SyntheticTransport::new()),
    );
    let (document, _, _, _, submit) = common::checkout_form();

    recorder.handle_click(&document, 1.0, 1.0, submit, 1_010);
    recorder.pause_recording(1_020).expect("pause should succeed");
    recorder.handle_click(&document, 2.0, 2.0, submit, 1_030);
    recorder.handle_resize(800, 600, 1_035);
    assert!(recorder.pause_recording(1_036).is_err());
    recorder.resume_recording(1_040).expect("resume should succeed");
    recorder.handle_click(&document, 3.0, 3.0, submit, 1_050);

    let events = pending(&recorder);
    assert_eq!(
        timeline(&events),
        vec!["started", "click", "paused", "resumed", "click"]
    );
    let stamps: Vec<u64> = events
        .iter()
        .filter_map(|event| event["timestamp"].as_u64())
        .collect();
    assert_eq!(stamps, vec![0, 10, 20, 40, 50]);
}

#[test]
fn recording_lifecycle_tests_mutations_are_emitted_after_quiet_period() {
    let mut recorder = common::recorder(
        &common::options(),
        Arc::new(SyntheticHost::new()),
        Arc::new(SyntheticTransport::new()),
    );
    let (mut document, email, _, _, _) = common::checkout_form();
    document.observe();

    document
        .append_element(document.body(), "aside", &[("class", "toast")])
        .expect("toast should append");
    recorder.handle_mutations(document.take_records(), 1_010);

    document
        .set_attribute(email, "class", "invalid")
        .expect("attribute should set");
    recorder.handle_mutations(document.take_records(), 1_060);

    recorder.tick(&document, 1_100);
    assert_eq!(recorder.buffered_events(), 1);

    recorder.tick(&document, 1_160);
    let events = pending(&recorder);
    assert_eq!(events.len(), 2);
    let mutation = &events[1];
    assert_eq!(mutation["event_type"], "mutation");
    assert_eq!(mutation["timestamp"], 160);
    assert_eq!(mutation["payload"]["mutations"][0]["type"], "attributes");
    assert_eq!(mutation["payload"]["mutations"][0]["attribute_name"], "class");
    let snapshot = mutation["payload"]["html_snapshot"]
        .as_str()
        .expect("snapshot string");
    assert!(snapshot.contains("toast"));
}

#[test]
fn recording_lifecycle_tests_stop_keeps_mutations_still_in_quiet_period() {
    let transport = Arc::new(SyntheticTransport::new());
    let mut recorder = common::recorder(
        &common::options(),
        Arc::new(SyntheticHost::new()),
        transport.clone(),
    );
    let (mut document, _, _, _, _) = common::checkout_form();
    document.observe();

    document
        .append_element(document.body(), "aside", &[("class", "toast")])
        .expect("toast should append");
    recorder.handle_mutations(document.take_records(), 1_100);
    recorder.stop_recording(&document, 1_150);

    let sent = common::sent_events(&transport);
    assert_eq!(timeline(&sent), vec!["started", "mutation", "stopped"]);
    assert_eq!(sent[1]["timestamp"], 100);
    assert_eq!(sent[2]["timestamp"], 150);
}

#[test]
fn recording_lifecycle_tests_missing_capabilities_skip_features() {
    let host = Arc::new(SyntheticHost::with_capabilities(Capabilities {
        mutation_observer: false,
        network_observer: false,
        ..Capabilities::all()
    }));
    let mut recorder = common::recorder(
        &common::options(),
        host.clone(),
        Arc::new(SyntheticTransport::new()),
    );
    let (mut document, _, _, _, _) = common::checkout_form();
    document.observe();
    document
        .append_element(document.body(), "p", &[])
        .expect("paragraph should append");

    recorder.handle_mutations(document.take_records(), 1_010);
    recorder.handle_network("GET", "https://cdn.test/a.js", 200, 5, 1_020);
    recorder.tick(&document, 1_500);

    assert!(!recorder.listeners().handles(BrowserEventKind::Mutation));
    assert!(recorder.listeners().handles(BrowserEventKind::Click));
    assert_eq!(host.attached().len(), 10);
    assert_eq!(recorder.buffered_events(), 1);
}

#[test]
fn recording_lifecycle_tests_stop_flushes_marker_and_detaches() {
    let host = Arc::new(SyntheticHost::new());
    let transport = Arc::new(SyntheticTransport::new());
    let mut recorder = common::recorder(&common::options(), host.clone(), transport.clone());
    let (document, _, _, _, submit) = common::checkout_form();

    recorder.handle_click(&document, 1.0, 1.0, submit, 1_100);
    let report = recorder.stop_recording(&document, 1_200);

    assert_eq!(report.delivered, 3);
    assert_eq!(recorder.state(), CollectorState::Destroyed);
    assert!(host.attached().is_empty());
    assert_eq!(
        timeline(&common::sent_events(&transport)),
        vec!["started", "click", "stopped"]
    );

    assert!(recorder.destroy(&document).is_idle());
    recorder.handle_click(&document, 1.0, 1.0, submit, 1_300);
    assert_eq!(recorder.buffered_events(), 0);
    assert_eq!(common::batches(&transport).len(), 1);
}

#[test]
fn recording_lifecycle_tests_page_hide_beacons_events_then_session_end() {
    let transport = Arc::new(SyntheticTransport::new());
    let mut recorder = common::recorder(
        &common::options(),
        Arc::new(SyntheticHost::new()),
        transport.clone(),
    );
    let (document, _, _, _, submit) = common::checkout_form();

    recorder.handle_click(&document, 4.0, 4.0, submit, 1_100);
    recorder.on_page_hide(9_000);
    recorder.on_page_hide(9_100);

    let beacons = transport.beacons();
    assert_eq!(beacons.len(), 2);
    assert_eq!(beacons[0].url, common::EVENTS_URL);
    let batch: Value = serde_json::from_slice(&beacons[0].body).expect("batch json");
    assert_eq!(batch["apiKey"], "pk_test");
    assert_eq!(batch["recording_id"], "rec-synthetic");
    assert_eq!(batch["events"].as_array().map(Vec::len), Some(2));

    assert_eq!(beacons[1].url, "https://api.test/api/sessions?key=pk_test");
    let end: Value = serde_json::from_slice(&beacons[1].body).expect("end json");
    assert_eq!(end["session_id"], recorder.session_id());
    assert_eq!(end["metadata"]["events_count"], 2);
    assert_eq!(end["metadata"]["ended_at"], 9_000);
    assert_eq!(recorder.buffered_events(), 0);
}

#[test]
fn recording_lifecycle_tests_hidden_page_without_beacon_uses_keepalive() {
    let transport = Arc::new(SyntheticTransport::new());
    let host = Arc::new(SyntheticHost::with_capabilities(Capabilities {
        beacon: false,
        ..Capabilities::all()
    }));
    let mut recorder = common::recorder(&common::options(), host, transport.clone());

    recorder.on_visibility_change(true, 1_400);

    assert!(transport.beacons().is_empty());
    let sent = transport.requests_to(common::EVENTS_URL);
    assert_eq!(sent.len(), 1);
    assert!(sent[0].keepalive);
    let batch: Value = serde_json::from_slice(&sent[0].body).expect("batch json");
    assert_eq!(batch["events"][1]["event_type"], "visibility");
    assert_eq!(batch["events"][1]["payload"]["hidden"], true);
}
