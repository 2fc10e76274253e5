//! JSON bodies exchanged with the ingestion backend.

use serde::{Deserialize, Serialize};

use crate::CapturedEvent;

/// Session registration body (`POST <sessionsUrl>`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegistrationRequest {
    /// Client-generated session id.
    pub session_id: String,
    /// External user identity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Browser family.
    pub browser: String,
    /// Operating system family.
    pub os: String,
    /// Device class.
    pub device_type: String,
    /// Screen width in pixels.
    pub screen_width: u32,
    /// Screen height in pixels.
    pub screen_height: u32,
    /// Page URL.
    pub url: String,
    /// Referrer URL.
    pub referrer: String,
    /// Free-form client metadata.
    pub metadata: serde_json::Value,
}

/// Registration response; only `recording_id` is required.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RegistrationResponse {
    /// Server-assigned recording id.
    #[serde(default)]
    pub recording_id: Option<String>,
}

/// Recorder grouped event body (`POST <eventsUrl>`).
#[derive(Debug, Clone, Serialize)]
pub struct RecorderBatch<'a> {
    /// Server-assigned recording id.
    pub recording_id: &'a str,
    /// Client session id.
    pub session_id: &'a str,
    /// Events in capture order.
    pub events: &'a [CapturedEvent],
}

/// Heatmap event as buffered: the event plus the identity it was captured
/// under.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatmapEventBody {
    /// Captured event fields, flattened into the body.
    #[serde(flatten)]
    pub event: CapturedEvent,
    /// Heatmap session id.
    pub session_id: String,
    /// User id at capture time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Page URL at capture time.
    pub url: String,
}

/// Heatmap grouped body used for deduplicated scroll samples.
#[derive(Debug, Clone, Serialize)]
pub struct HeatmapBatchBody<'a> {
    /// Heatmap session id.
    pub session_id: &'a str,
    /// Current user id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<&'a str>,
    /// Page URL.
    pub url: &'a str,
    /// Events in capture order.
    pub events: Vec<CapturedEvent>,
}

/// Adds the `apiKey` field to any body; beacons cannot carry headers.
#[derive(Debug, Clone, Serialize)]
pub struct WithApiKey<'a, T: Serialize> {
    /// Wrapped body, flattened.
    #[serde(flatten)]
    pub body: &'a T,
    /// Project API key.
    #[serde(rename = "apiKey")]
    pub api_key: &'a str,
}

/// Aggregate counters carried by the session-end notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionEndMetadata {
    /// Events captured during the session.
    pub events_count: u64,
    /// Epoch milliseconds at which the session ended.
    pub ended_at: u64,
}

/// Unload-time notification sent through the beacon path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionEndNotification {
    /// Client session id.
    pub session_id: String,
    /// Aggregate counters.
    pub metadata: SessionEndMetadata,
}
