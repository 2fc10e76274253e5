//! Shared fixtures for session recorder integration tests.

use std::sync::Arc;

use pulse_core::config::{CollectorOptions, RecorderConfig};
use pulse_core::host::SyntheticHost;
use pulse_core::session::SessionIdGenerator;
use pulse_dom::{Document, NodeId};
use pulse_env::PageEnvironment;
use pulse_recorder::SessionRecorder;
use pulse_transport::SyntheticTransport;
use serde_json::Value;

/// Grouped event endpoint derived from [`options`].
#[allow(dead_code)]
pub const EVENTS_URL: &str = "https://api.test/api/events";
/// Registration endpoint derived from [`options`].
#[allow(dead_code)]
pub const SESSIONS_URL: &str = "https://api.test/api/sessions";

/// Options pointing at a test backend.
#[allow(dead_code)]
pub fn options() -> CollectorOptions {
    CollectorOptions {
        api_url: Some("https://api.test/api".to_string()),
        user_id: Some("u-1".to_string()),
        ..CollectorOptions::new("pk_test")
    }
}

/// Mobile page fixture.
#[allow(dead_code)]
pub fn page() -> PageEnvironment {
    PageEnvironment {
        user_agent: "Mozilla/5.0 (Linux; Android 14; Pixel 8) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Mobile Safari/537.36".to_string(),
        url: "https://shop.test/checkout".to_string(),
        referrer: String::new(),
        language: "en-GB".to_string(),
        screen_width: 412,
        screen_height: 915,
        viewport_width: 412,
        viewport_height: 800,
    }
}

/// Checkout form: `(document, email, password, masked card, submit)`.
#[allow(dead_code)]
pub fn checkout_form() -> (Document, NodeId, NodeId, NodeId, NodeId) {
    let mut document = Document::new();
    let form = document
        .append_element(document.body(), "form", &[("id", "checkout")])
        .expect("form should append");
    let email = document
        .append_element(form, "input", &[("type", "email"), ("name", "email")])
        .expect("email should append");
    let password = document
        .append_element(form, "input", &[("type", "password")])
        .expect("password should append");
    let card = document
        .append_element(form, "input", &[("type", "text"), ("data-pulse-mask", "")])
        .expect("card should append");
    let submit = document
        .append_element(form, "button", &[("class", "btn btn-primary")])
        .expect("submit should append");
    document.append_text(submit, "Pay").expect("label should append");
    (document, email, password, card, submit)
}

/// Starts a recorder at `t = 1_000` on the given host and transport.
#[allow(dead_code)]
pub fn recorder(
    options: &CollectorOptions,
    host: Arc<SyntheticHost>,
    transport: Arc<SyntheticTransport>,
) -> SessionRecorder {
    let config = RecorderConfig::from_options(options).expect("config should validate");
    SessionRecorder::new(
        config,
        page(),
        host,
        transport,
        &mut SessionIdGenerator::with_seed(3),
        1_000,
    )
    .expect("recorder should build")
}

/// Grouped batch bodies sent to the events endpoint.
#[allow(dead_code)]
pub fn batches(transport: &SyntheticTransport) -> Vec<Value> {
    transport
        .requests_to(EVENTS_URL)
        .iter()
        .map(|request| serde_json::from_slice(&request.body).expect("body should be json"))
        .collect()
}

/// Events of every successful-or-not batch, flattened in send order.
#[allow(dead_code)]
pub fn sent_events(transport: &SyntheticTransport) -> Vec<Value> {
    batches(transport)
        .into_iter()
        .flat_map(|batch| batch["events"].as_array().cloned().unwrap_or_default())
        .collect()
}
