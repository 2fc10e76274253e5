//! Shared fixtures for app integration tests.

use std::sync::Arc;

use pulse_app::PageSession;
use pulse_core::config::CollectorOptions;
use pulse_core::host::SyntheticHost;
use pulse_core::session::SessionIdGenerator;
use pulse_dom::{Document, NodeId};
use pulse_env::PageEnvironment;
use pulse_transport::SyntheticTransport;

/// Session-end URL both collectors beacon to.
#[allow(dead_code)]
pub const SESSION_END_URL: &str = "https://api.test/api/sessions?key=pk_test";

/// Options pointing at a test backend.
#[allow(dead_code)]
pub fn options() -> CollectorOptions {
    CollectorOptions {
        api_url: Some("https://api.test/api".to_string()),
        ..CollectorOptions::new("pk_test")
    }
}

/// Desktop page fixture.
#[allow(dead_code)]
pub fn page() -> PageEnvironment {
    PageEnvironment {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36".to_string(),
        url: "https://shop.test/".to_string(),
        language: "en-US".to_string(),
        screen_width: 1920,
        screen_height: 1080,
        viewport_width: 1280,
        viewport_height: 720,
        ..PageEnvironment::default()
    }
}

/// Document with one labelled button; returns `(document, button)`.
#[allow(dead_code)]
pub fn document_with_button() -> (Document, NodeId) {
    let mut document = Document::new();
    let button = document
        .append_element(document.body(), "button", &[("class", "cta")])
        .expect("button should append");
    document.append_text(button, "Buy").expect("label should append");
    (document, button)
}

/// Starts a page session at `t = 1_000`.
#[allow(dead_code)]
pub fn session(
    document: Document,
    host: Arc<SyntheticHost>,
    transport: Arc<SyntheticTransport>,
) -> PageSession {
    PageSession::new(
        &options(),
        page(),
        document,
        host,
        transport,
        &mut SessionIdGenerator::with_seed(21),
        1_000,
    )
    .expect("page session should build")
}
