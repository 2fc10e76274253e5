//! Integration tests for delivery headers, registration and the unload path.

use std::sync::Arc;

use pulse_buffer::DeliveryOutcome;
use pulse_core::wire::RegistrationRequest;
use pulse_transport::{
    DeliveryClient, DeliveryError, IDEMPOTENCY_HEADER, SyntheticFailure, SyntheticTransport,
    idempotency_key_for_body,
};
use serde_json::json;

fn registration() -> RegistrationRequest {
    RegistrationRequest {
        session_id: "rec_abc".to_string(),
        user_id: None,
        browser: "Chrome".to_string(),
        os: "Linux".to_string(),
        device_type: "desktop".to_string(),
        screen_width: 1920,
        screen_height: 1080,
        url: "https://shop.test/".to_string(),
        referrer: String::new(),
        metadata: json!({}),
    }
}

#[test]
fn delivery_client_tests_grouped_requests_carry_stable_idempotency_key() {
    let transport = Arc::new(SyntheticTransport::new());
    let client = DeliveryClient::new("pk_1", transport.clone(), true);
    let body = json!({"events": [1, 2, 3]});

    transport.fail_next(SyntheticFailure::Status(503));
    assert_eq!(
        client.deliver("https://api.test/events", &body, true),
        DeliveryOutcome::Retry
    );
    assert_eq!(
        client.deliver("https://api.test/events", &body, true),
        DeliveryOutcome::Delivered
    );

    let requests = transport.requests();
    assert_eq!(requests.len(), 2);
    let first_key = requests[0].header(IDEMPOTENCY_HEADER).expect("key header");
    assert_eq!(Some(first_key), requests[1].header(IDEMPOTENCY_HEADER));
    assert_eq!(first_key, idempotency_key_for_body(&requests[0].body));
    assert_eq!(requests[0].header("X-API-KEY"), Some("pk_1"));
    assert!(requests[0].keepalive);
}

#[test]
fn delivery_client_tests_permanent_failures_discard() {
    let transport = Arc::new(SyntheticTransport::new());
    let client = DeliveryClient::new("pk_1", transport.clone(), true);
    transport.fail_next(SyntheticFailure::Status(400));

    assert_eq!(
        client.deliver("https://api.test/events", &json!({}), false),
        DeliveryOutcome::Discard
    );
}

#[test]
fn delivery_client_tests_registration_returns_recording_id() {
    let transport = Arc::new(SyntheticTransport::with_response_body(
        r#"{"recording_id":"r-42","extra":true}"#,
    ));
    let client = DeliveryClient::new("pk_1", transport, true);

    let recording_id = client
        .register_session("https://api.test/sessions", &registration())
        .expect("registration should succeed");
    assert_eq!(recording_id, "r-42");
}

#[test]
fn delivery_client_tests_registration_without_id_is_invalid() {
    let transport = Arc::new(SyntheticTransport::with_response_body("{}"));
    let client = DeliveryClient::new("pk_1", transport, true);

    let error = client
        .register_session("https://api.test/sessions", &registration())
        .expect_err("missing id should fail");
    assert!(matches!(error, DeliveryError::InvalidResponse(_)));
}

#[test]
fn delivery_client_tests_final_path_falls_back_to_keepalive() {
    let transport = Arc::new(SyntheticTransport::new());
    let client = DeliveryClient::new("pk_1", transport.clone(), false);
    transport.fail_next(SyntheticFailure::Timeout);

    assert!(!client.send_final("https://api.test/sessions?key=pk_1", &json!({"a": 1})));
    assert!(transport.beacons().is_empty());
    assert_eq!(transport.requests().len(), 1);
}

#[test]
fn delivery_client_tests_final_path_prefers_beacon() {
    let transport = Arc::new(SyntheticTransport::new());
    let client = DeliveryClient::new("pk_1", transport.clone(), true);

    assert!(client.send_final("https://api.test/sessions?key=pk_1", &json!({"a": 1})));
    assert_eq!(transport.beacons().len(), 1);
    assert!(transport.requests().is_empty());
}
