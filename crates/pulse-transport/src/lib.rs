#![warn(missing_docs)]
//! # pulse-transport
//!
//! ## Purpose
//! Delivers collector batches to the ingestion backend over an injectable
//! transport.
//!
//! ## Responsibilities
//! - Build JSON requests with API-key and idempotency headers.
//! - Map HTTP status codes into [`DeliveryError`] and classify them.
//! - Perform the session registration handshake.
//! - Provide the fire-and-forget unload path (beacon, keepalive fallback).
//!
//! ## Data flow
//! Collector flush -> [`DeliveryClient::deliver`] -> [`DeliveryTransport::send`]
//! -> status -> [`DeliveryOutcome`] for the buffer driver. Unload ->
//! [`DeliveryClient::send_final`] -> [`DeliveryTransport::send_beacon`].
//!
//! ## Ownership and lifetimes
//! The transport is shared as `Arc<dyn DeliveryTransport>` so both collectors
//! of a page can use the same network stack.
//!
//! ## Error model
//! Regular sends return [`DeliveryError`]; [`classify_delivery_error`] turns
//! it into retriable or permanent. The unload path never reports errors.
//!
//! ## Security and privacy notes
//! The API key travels in the `x-api-key` header for regular requests and in
//! the query string only for the session-end beacon, which cannot carry
//! headers. It is never logged.

mod synthetic;

pub use synthetic::{BeaconRecord, SyntheticFailure, SyntheticTransport};

use std::sync::Arc;

use pulse_buffer::DeliveryOutcome;
use pulse_core::wire::{RegistrationRequest, RegistrationResponse};
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

/// Header carrying the project API key.
pub const API_KEY_HEADER: &str = "x-api-key";
/// Header carrying the body hash for grouped requests.
pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// One outgoing HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryRequest {
    /// Absolute target URL.
    pub url: String,
    /// Request headers in insertion order.
    pub headers: Vec<(String, String)>,
    /// JSON body.
    pub body: Vec<u8>,
    /// Ask the platform to keep the request alive across page teardown.
    pub keepalive: bool,
}

impl DeliveryRequest {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Raw response as observed by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body bytes.
    pub body: Vec<u8>,
}

/// Network primitive implemented by the host.
pub trait DeliveryTransport: Send + Sync {
    /// Sends one request and returns the response, whatever its status.
    ///
    /// # Errors
    /// Returns [`DeliveryError::Timeout`] or [`DeliveryError::Network`] when
    /// no response was received.
    fn send(&self, request: &DeliveryRequest) -> Result<DeliveryResponse, DeliveryError>;

    /// Queues a best-effort beacon. The return value only says whether the
    /// platform accepted it for delivery.
    fn send_beacon(&self, url: &str, body: &[u8]) -> bool;
}

/// Failure class used by flush drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Worth retrying on the next tick.
    Retriable,
    /// Retrying the same body cannot succeed.
    Permanent,
}

/// Classifies a delivery error.
pub fn classify_delivery_error(error: &DeliveryError) -> FailureClass {
    match error {
        DeliveryError::Timeout | DeliveryError::Network(_) | DeliveryError::Server(_) => {
            FailureClass::Retriable
        }
        DeliveryError::Client(408 | 429) => FailureClass::Retriable,
        DeliveryError::Client(_)
        | DeliveryError::Encode(_)
        | DeliveryError::InvalidResponse(_) => FailureClass::Permanent,
    }
}

/// Hex SHA-256 of a request body; identical retries share a key.
pub fn idempotency_key_for_body(body: &[u8]) -> String {
    hex::encode(Sha256::digest(body))
}

/// Regular and unload-path delivery for one collector.
#[derive(Clone)]
pub struct DeliveryClient {
    api_key: String,
    transport: Arc<dyn DeliveryTransport>,
    beacon_supported: bool,
}

impl DeliveryClient {
    /// Creates a client; `beacon_supported` comes from the host's probed
    /// capabilities.
    pub fn new(
        api_key: impl Into<String>,
        transport: Arc<dyn DeliveryTransport>,
        beacon_supported: bool,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            transport,
            beacon_supported,
        }
    }

    /// Posts a JSON body and checks the status.
    ///
    /// # Errors
    /// Returns [`DeliveryError::Encode`] when the body cannot be serialized,
    /// transport errors as-is, and [`DeliveryError::Server`] /
    /// [`DeliveryError::Client`] for non-2xx statuses.
    pub fn post_json<T: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &T,
        idempotent: bool,
    ) -> Result<DeliveryResponse, DeliveryError> {
        let body = serde_json::to_vec(body)?;
        let mut headers = vec![
            ("Content-Type".to_string(), "application/json".to_string()),
            (API_KEY_HEADER.to_string(), self.api_key.clone()),
        ];
        if idempotent {
            headers.push((IDEMPOTENCY_HEADER.to_string(), idempotency_key_for_body(&body)));
        }

        let response = self.transport.send(&DeliveryRequest {
            url: url.to_string(),
            headers,
            body,
            keepalive: true,
        })?;
        check_status(response)
    }

    /// Posts a body and maps the result for a buffer flush driver.
    pub fn deliver<T: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &T,
        idempotent: bool,
    ) -> DeliveryOutcome {
        match self.post_json(url, body, idempotent) {
            Ok(_) => DeliveryOutcome::Delivered,
            Err(error) => match classify_delivery_error(&error) {
                FailureClass::Retriable => {
                    warn!(%error, url, "delivery failed, will retry");
                    DeliveryOutcome::Retry
                }
                FailureClass::Permanent => {
                    warn!(%error, url, "delivery rejected");
                    DeliveryOutcome::Discard
                }
            },
        }
    }

    /// Registers a session and returns the server-assigned recording id.
    ///
    /// # Errors
    /// Propagates [`DeliveryClient::post_json`] errors and returns
    /// [`DeliveryError::InvalidResponse`] when no usable `recording_id` came
    /// back.
    pub fn register_session(
        &self,
        sessions_url: &str,
        request: &RegistrationRequest,
    ) -> Result<String, DeliveryError> {
        let response = self.post_json(sessions_url, request, false)?;
        let parsed: RegistrationResponse = serde_json::from_slice(&response.body)
            .map_err(|error| DeliveryError::InvalidResponse(error.to_string()))?;

        parsed
            .recording_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| DeliveryError::InvalidResponse("missing recording_id".to_string()))
    }

    /// Fire-and-forget unload delivery.
    ///
    /// Uses the beacon when the host has one, otherwise a keepalive request
    /// whose outcome is ignored. Returns whether the platform accepted the
    /// body; callers never retry.
    pub fn send_final<T: Serialize + ?Sized>(&self, url: &str, body: &T) -> bool {
        let bytes = match serde_json::to_vec(body) {
            Ok(bytes) => bytes,
            Err(error) => {
                warn!(%error, "final payload could not be encoded");
                return false;
            }
        };

        if self.beacon_supported {
            let queued = self.transport.send_beacon(url, &bytes);
            if !queued {
                debug!(url, "beacon refused by platform");
            }
            return queued;
        }

        let request = DeliveryRequest {
            url: url.to_string(),
            headers: vec![
                ("Content-Type".to_string(), "application/json".to_string()),
                (API_KEY_HEADER.to_string(), self.api_key.clone()),
            ],
            body: bytes,
            keepalive: true,
        };
        self.transport.send(&request).is_ok()
    }

    /// Session-end notification URL: `<sessions_url>?key=<api_key>`.
    pub fn session_end_url(&self, sessions_url: &str) -> String {
        match Url::parse(sessions_url) {
            Ok(mut url) => {
                url.query_pairs_mut().append_pair("key", &self.api_key);
                url.to_string()
            }
            Err(_) => format!("{sessions_url}?key={}", self.api_key),
        }
    }

    /// Project API key.
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Returns `true` when the unload path uses the beacon primitive.
    pub fn beacon_supported(&self) -> bool {
        self.beacon_supported
    }
}

impl std::fmt::Debug for DeliveryClient {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("DeliveryClient")
            .field("api_key", &"<redacted>")
            .field("beacon_supported", &self.beacon_supported)
            .finish_non_exhaustive()
    }
}

fn check_status(response: DeliveryResponse) -> Result<DeliveryResponse, DeliveryError> {
    match response.status {
        200..=299 => Ok(response),
        status @ 400..=499 => Err(DeliveryError::Client(status)),
        status @ 500..=599 => Err(DeliveryError::Server(status)),
        status => Err(DeliveryError::InvalidResponse(format!(
            "unexpected status {status}"
        ))),
    }
}

/// Delivery failures.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// No response before the transport deadline.
    #[error("request timed out")]
    Timeout,
    /// Connection-level failure.
    #[error("network failure: {0}")]
    Network(String),
    /// Backend returned 5xx.
    #[error("server error status {0}")]
    Server(u16),
    /// Backend returned 4xx.
    #[error("client error status {0}")]
    Client(u16),
    /// Body serialization failed.
    #[error("body encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
    /// Response violated the backend contract.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}
