#![warn(missing_docs)]
//! # pulse-core
//!
//! ## Purpose
//! Defines the pure data model shared by the `pulse` collectors.
//!
//! ## Responsibilities
//! - Represent captured events and their per-type payloads.
//! - Enforce payload size caps through truncating constructors.
//! - Own session identity, collector configuration, lifecycle state, host
//!   listener bindings, and wire bodies sent to the backend.
//!
//! ## Data flow
//! Browser callbacks are classified by collectors into [`EventPayload`]
//! values, wrapped in [`CapturedEvent`], buffered, and finally serialized into
//! the wire bodies of [`wire`].
//!
//! ## Ownership and lifetimes
//! Events own their strings so buffers can hold them across flush cycles and
//! requeue them after failed deliveries without borrowing page state.
//!
//! ## Error model
//! Encoding failures return [`CoreError`]. Configuration, lifecycle, and host
//! failures have their own error types in the corresponding modules.
//!
//! ## Security and privacy notes
//! Text captured from the page is truncated before it enters an event. Values
//! typed into sensitive inputs are replaced by [`MASK`] by the collectors, and
//! [`redact_sensitive`] strips credential markers from free text.
//!
//! ## Example
//! ```rust
//! use pulse_core::{CapturedEvent, EventPayload, EventType, PointerPayload};
//!
//! let payload = PointerPayload::new(10.0, 20.0, "#buy", "button", "Buy now");
//! let event = CapturedEvent::new(1_000, EventPayload::Click(payload));
//! assert_eq!(event.event_type(), EventType::Click);
//! ```

pub mod config;
pub mod host;
pub mod lifecycle;
pub mod session;
pub mod wire;

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;
use url::Url;

/// Maximum characters of element text attached to pointer events.
pub const CLICK_TEXT_MAX_CHARS: usize = 100;
/// Maximum characters of an input value attached to input events.
pub const INPUT_VALUE_MAX_CHARS: usize = 500;
/// Maximum characters of a mutation's previous attribute/text value.
pub const OLD_VALUE_MAX_CHARS: usize = 200;
/// Maximum characters of the HTML snapshot attached to mutation events.
pub const HTML_SNAPSHOT_MAX_CHARS: usize = 5_000;
/// Maximum mutation records summarized into one mutation event.
pub const MUTATION_BATCH_MAX: usize = 20;
/// Maximum characters of a URL attached to network events.
pub const URL_MAX_CHARS: usize = 500;
/// Maximum characters of an error message attached to error events.
pub const ERROR_MESSAGE_MAX_CHARS: usize = 500;
/// Replacement for values captured from sensitive inputs.
pub const MASK: &str = "*";

/// Fixed event-type vocabulary used on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// Pointer click.
    Click,
    /// Burst of clicks at one location.
    RageClick,
    /// Scroll depth sample.
    Scroll,
    /// Heatmap session start marker.
    SessionStart,
    /// Key pressed.
    Keydown,
    /// Key released.
    Keyup,
    /// Form field value changed.
    Input,
    /// Coalesced DOM mutations.
    Mutation,
    /// Completed network request.
    Network,
    /// Largest contentful paint measurement.
    PerformanceLcp,
    /// Recorder lifecycle marker.
    Lifecycle,
    /// Viewport resized.
    Resize,
    /// Page visibility changed.
    Visibility,
    /// Uncaught page error.
    Error,
}

impl EventType {
    /// Returns the wire name of this event type.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Click => "click",
            EventType::RageClick => "rage_click",
            EventType::Scroll => "scroll",
            EventType::SessionStart => "session_start",
            EventType::Keydown => "keydown",
            EventType::Keyup => "keyup",
            EventType::Input => "input",
            EventType::Mutation => "mutation",
            EventType::Network => "network",
            EventType::PerformanceLcp => "performance_lcp",
            EventType::Lifecycle => "lifecycle",
            EventType::Resize => "resize",
            EventType::Visibility => "visibility",
            EventType::Error => "error",
        }
    }
}

/// Pointer event payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointerPayload {
    /// Client x coordinate.
    pub x: f64,
    /// Client y coordinate.
    pub y: f64,
    /// Selector of the clicked element.
    pub selector: String,
    /// Lowercase tag of the clicked element.
    pub tag: String,
    /// Element text content, truncated to [`CLICK_TEXT_MAX_CHARS`].
    pub text: String,
}

impl PointerPayload {
    /// Builds a pointer payload, truncating element text.
    pub fn new(
        x: f64,
        y: f64,
        selector: impl Into<String>,
        tag: impl Into<String>,
        text: &str,
    ) -> Self {
        Self {
            x,
            y,
            selector: selector.into(),
            tag: tag.into(),
            text: truncate_chars(text.trim(), CLICK_TEXT_MAX_CHARS),
        }
    }
}

/// Rage-click payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RageClickPayload {
    /// Client x coordinate of the final click.
    pub x: f64,
    /// Client y coordinate of the final click.
    pub y: f64,
    /// Clicks counted in the burst.
    pub click_count: usize,
    /// Selector of the clicked element.
    pub selector: String,
}

/// Scroll depth payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScrollPayload {
    /// Depth percentage in `[0, 100]`.
    pub depth: u8,
    /// Viewport height in CSS pixels.
    pub viewport_height: u32,
    /// Viewport width in CSS pixels.
    pub viewport_width: u32,
    /// Deepest depth reached so far in the session.
    pub max_depth: u8,
}

/// Heatmap session start payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionStartPayload {
    /// Page URL.
    pub url: String,
    /// Referrer URL, empty when absent.
    pub referrer: String,
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
}

/// Keyboard payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyPayload {
    /// Key value, masked for sensitive targets.
    pub key: String,
    /// Physical key code, masked for sensitive targets.
    pub code: String,
    /// Selector of the focused element.
    pub selector: String,
}

/// Input payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InputPayload {
    /// Selector of the edited element.
    pub selector: String,
    /// Field value, truncated to [`INPUT_VALUE_MAX_CHARS`].
    pub value: String,
}

impl InputPayload {
    /// Builds an input payload, masking or truncating the value.
    pub fn new(selector: impl Into<String>, value: &str, sensitive: bool) -> Self {
        let value = if sensitive {
            MASK.repeat(value.chars().count().min(INPUT_VALUE_MAX_CHARS))
        } else {
            truncate_chars(value, INPUT_VALUE_MAX_CHARS)
        };
        Self {
            selector: selector.into(),
            value,
        }
    }
}

/// Kind of DOM mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    /// Children added or removed.
    ChildList,
    /// Attribute changed.
    Attributes,
    /// Text node data changed.
    CharacterData,
}

/// Summary of one DOM mutation record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MutationSummary {
    /// Mutation kind.
    #[serde(rename = "type")]
    pub kind: MutationKind,
    /// Selector of the mutation target.
    pub target: String,
    /// Number of added nodes.
    pub added_nodes: usize,
    /// Number of removed nodes.
    pub removed_nodes: usize,
    /// Changed attribute name for attribute mutations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute_name: Option<String>,
    /// Previous value, truncated to [`OLD_VALUE_MAX_CHARS`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_value: Option<String>,
}

/// Coalesced mutation payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MutationPayload {
    /// At most [`MUTATION_BATCH_MAX`] summaries.
    pub mutations: Vec<MutationSummary>,
    /// Document HTML at emission time, at most [`HTML_SNAPSHOT_MAX_CHARS`].
    pub html_snapshot: String,
}

impl MutationPayload {
    /// Builds a mutation payload, capping summary count and snapshot length.
    pub fn new(mut mutations: Vec<MutationSummary>, html_snapshot: &str) -> Self {
        mutations.truncate(MUTATION_BATCH_MAX);
        Self {
            mutations,
            html_snapshot: truncate_chars(html_snapshot, HTML_SNAPSHOT_MAX_CHARS),
        }
    }
}

/// Completed network request payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkPayload {
    /// HTTP method.
    pub method: String,
    /// Request URL with sensitive query values redacted.
    pub url: String,
    /// Response status, `0` when the request failed before a response.
    pub status: u16,
    /// Request duration in milliseconds.
    pub duration_ms: u64,
}

impl NetworkPayload {
    /// Builds a network payload, redacting and truncating the URL.
    pub fn new(method: &str, url: &str, status: u16, duration_ms: u64) -> Self {
        Self {
            method: method.to_ascii_uppercase(),
            url: truncate_chars(&redact_url_query(url), URL_MAX_CHARS),
            status,
            duration_ms,
        }
    }
}

/// Largest contentful paint payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LcpPayload {
    /// Render time in milliseconds.
    pub value_ms: f64,
    /// Selector of the largest element when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
}

/// Recorder lifecycle transitions recorded into the replay timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleAction {
    /// Recording started.
    Started,
    /// Recording paused.
    Paused,
    /// Recording resumed.
    Resumed,
    /// Recording stopped.
    Stopped,
}

/// Lifecycle marker payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LifecyclePayload {
    /// Transition that happened.
    pub action: LifecycleAction,
}

/// Viewport size payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewportPayload {
    /// Viewport width in CSS pixels.
    pub viewport_width: u32,
    /// Viewport height in CSS pixels.
    pub viewport_height: u32,
}

/// Visibility payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VisibilityPayload {
    /// `true` when the page became hidden.
    pub hidden: bool,
}

/// Uncaught error payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorPayload {
    /// Redacted, truncated error message.
    pub message: String,
    /// Script URL when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Line number when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

impl ErrorPayload {
    /// Builds an error payload, redacting secrets and truncating text.
    pub fn new(message: &str, source: Option<&str>, line: Option<u32>) -> Self {
        Self {
            message: truncate_chars(&redact_sensitive(message), ERROR_MESSAGE_MAX_CHARS),
            source: source.map(|value| truncate_chars(&redact_url_query(value), URL_MAX_CHARS)),
            line,
        }
    }
}

/// Event payload; the variant determines the event type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EventPayload {
    /// Pointer click.
    Click(PointerPayload),
    /// Rage click burst.
    RageClick(RageClickPayload),
    /// Scroll depth sample.
    Scroll(ScrollPayload),
    /// Heatmap session start.
    SessionStart(SessionStartPayload),
    /// Key pressed.
    Keydown(KeyPayload),
    /// Key released.
    Keyup(KeyPayload),
    /// Field edited.
    Input(InputPayload),
    /// Coalesced DOM mutations.
    Mutation(MutationPayload),
    /// Completed network request.
    Network(NetworkPayload),
    /// Largest contentful paint.
    PerformanceLcp(LcpPayload),
    /// Recorder lifecycle marker.
    Lifecycle(LifecyclePayload),
    /// Viewport resize.
    Resize(ViewportPayload),
    /// Visibility change.
    Visibility(VisibilityPayload),
    /// Uncaught error.
    Error(ErrorPayload),
}

impl EventPayload {
    /// Returns the event type implied by the payload variant.
    pub fn event_type(&self) -> EventType {
        match self {
            EventPayload::Click(_) => EventType::Click,
            EventPayload::RageClick(_) => EventType::RageClick,
            EventPayload::Scroll(_) => EventType::Scroll,
            EventPayload::SessionStart(_) => EventType::SessionStart,
            EventPayload::Keydown(_) => EventType::Keydown,
            EventPayload::Keyup(_) => EventType::Keyup,
            EventPayload::Input(_) => EventType::Input,
            EventPayload::Mutation(_) => EventType::Mutation,
            EventPayload::Network(_) => EventType::Network,
            EventPayload::PerformanceLcp(_) => EventType::PerformanceLcp,
            EventPayload::Lifecycle(_) => EventType::Lifecycle,
            EventPayload::Resize(_) => EventType::Resize,
            EventPayload::Visibility(_) => EventType::Visibility,
            EventPayload::Error(_) => EventType::Error,
        }
    }
}

/// Atomic unit moving through the capture pipeline.
///
/// `timestamp` is a session-relative offset for the recorder and a wall-clock
/// epoch value for the heatmap tracker.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedEvent {
    /// Timestamp in milliseconds.
    pub timestamp: u64,
    /// Type-specific payload.
    pub payload: EventPayload,
}

impl CapturedEvent {
    /// Creates an event from a timestamp and payload.
    pub fn new(timestamp: u64, payload: EventPayload) -> Self {
        Self { timestamp, payload }
    }

    /// Returns the event type derived from the payload.
    pub fn event_type(&self) -> EventType {
        self.payload.event_type()
    }

    /// Serializes the event to compact JSON bytes.
    ///
    /// # Errors
    /// Returns [`CoreError::Codec`] when JSON serialization fails.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, CoreError> {
        serde_json::to_vec(self).map_err(CoreError::Codec)
    }
}

impl Serialize for CapturedEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("CapturedEvent", 3)?;
        state.serialize_field("event_type", &self.event_type())?;
        state.serialize_field("timestamp", &self.timestamp)?;
        state.serialize_field("payload", &self.payload)?;
        state.end()
    }
}

/// Truncates `value` to at most `max_chars` characters.
///
/// Truncation happens on a char boundary, so multi-byte text never splits.
pub fn truncate_chars(value: &str, max_chars: usize) -> String {
    match value.char_indices().nth(max_chars) {
        Some((byte_index, _)) => value[..byte_index].to_string(),
        None => value.to_string(),
    }
}

const SENSITIVE_MARKERS: [&str; 6] = [
    "password",
    "token",
    "authorization",
    "bearer",
    "secret",
    "api_key",
];

/// Redacts common secret markers in free text.
///
/// Everything after the first marker is replaced, since the secret value
/// usually follows it.
pub fn redact_sensitive(input: &str) -> String {
    let lower = input.to_ascii_lowercase();
    let first = SENSITIVE_MARKERS
        .iter()
        .filter_map(|marker| lower.find(marker).map(|position| (position, *marker)))
        .min_by_key(|(position, _)| *position);

    match first {
        Some((position, marker)) => format!("{}{marker}=<redacted>", &input[..position]),
        None => input.to_string(),
    }
}

/// Redacts values of query parameters whose names look like credentials.
///
/// Unparseable URLs are returned without their query string.
pub fn redact_url_query(raw: &str) -> String {
    let Ok(mut url) = Url::parse(raw) else {
        return raw.split('?').next().unwrap_or_default().to_string();
    };
    if url.query().is_none() {
        return url.to_string();
    }

    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(key, value)| {
            let lower = key.to_ascii_lowercase();
            let sensitive = SENSITIVE_MARKERS
                .iter()
                .chain(["key", "auth", "session"].iter())
                .any(|marker| lower.contains(marker));
            let value = if sensitive {
                "<redacted>".to_string()
            } else {
                value.into_owned()
            };
            (key.into_owned(), value)
        })
        .collect();

    url.query_pairs_mut().clear().extend_pairs(pairs);
    url.to_string()
}

/// Error type for core model encoding failures.
#[derive(Debug, Error)]
pub enum CoreError {
    /// JSON encoding failure.
    #[error("payload codec failure: {0}")]
    Codec(#[from] serde_json::Error),
}
