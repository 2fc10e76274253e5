//! Shared fixtures for heatmap tracker integration tests.

use std::sync::Arc;

use pulse_core::config::{CollectorOptions, HeatmapConfig};
use pulse_core::host::SyntheticHost;
use pulse_core::session::SessionIdGenerator;
use pulse_dom::{Document, NodeId};
use pulse_env::PageEnvironment;
use pulse_heatmap::HeatmapTracker;
use pulse_transport::SyntheticTransport;
use serde_json::Value;

/// Ingest endpoint derived from [`options`].
#[allow(dead_code)]
pub const INGEST_URL: &str = "https://api.test/api/heatmap/events";

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
        user_agent: "Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0"
            .to_string(),
        url: "https://shop.test/product/1".to_string(),
        referrer: "https://search.test/".to_string(),
        language: "en-US".to_string(),
        screen_width: 1920,
        screen_height: 1080,
        viewport_width: 1440,
        viewport_height: 900,
    }
}

/// Document with one labelled buy button.
#[allow(dead_code)]
pub fn document_with_button() -> (Document, NodeId) {
    let mut document = Document::new();
    let button = document
        .append_element(document.body(), "button", &[("class", "buy primary")])
        .expect("button should append");
    document
        .append_text(button, "  Add to cart  ")
        .expect("label should append");
    (document, button)
}

/// Starts a tracker at `t = 0` on the given host and transport.
#[allow(dead_code)]
pub fn tracker(
    options: &CollectorOptions,
    host: Arc<SyntheticHost>,
    transport: Arc<SyntheticTransport>,
) -> HeatmapTracker {
    let config = HeatmapConfig::from_options(options).expect("config should validate");
    HeatmapTracker::new(
        config,
        page(),
        host,
        transport,
        &mut SessionIdGenerator::with_seed(11),
        0,
    )
    .expect("tracker should build")
}

/// JSON bodies of regular requests sent to `url`.
#[allow(dead_code)]
pub fn bodies(transport: &SyntheticTransport, url: &str) -> Vec<Value> {
    transport
        .requests_to(url)
        .iter()
        .map(|request| serde_json::from_slice(&request.body).expect("body should be json"))
        .collect()
}

/// Bodies of a given `event_type` among item requests to `url`.
#[allow(dead_code)]
pub fn events_of_type(transport: &SyntheticTransport, url: &str, event_type: &str) -> Vec<Value> {
    bodies(transport, url)
        .into_iter()
        .filter(|body| body["event_type"] == event_type)
        .collect()
}
