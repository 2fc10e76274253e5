//! Transport that prints outgoing traffic as JSON lines.

use std::io::Write;
use std::sync::Mutex;

use pulse_core::redact_url_query;
use pulse_transport::{
    API_KEY_HEADER, DeliveryError, DeliveryRequest, DeliveryResponse, DeliveryTransport,
};
use serde_json::{Map, Value, json};

/// Recording id answered to every registration.
pub const REPLAY_RECORDING_ID: &str = "rec-replay";

/// Loopback transport: every request and beacon becomes one JSON line on
/// the wrapped writer, and every request is answered `200`.
#[derive(Debug)]
pub struct LineTransport<W: Write + Send> {
    out: Mutex<W>,
}

impl<W: Write + Send> LineTransport<W> {
    /// Wraps `out`.
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    /// Returns the writer.
    pub fn into_inner(self) -> W {
        self.out
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_line(&self, line: &Value) -> Result<(), DeliveryError> {
        let mut out = self
            .out
            .lock()
            .map_err(|_| DeliveryError::Network("output lock poisoned".to_string()))?;
        writeln!(out, "{line}").map_err(|error| DeliveryError::Network(error.to_string()))
    }
}

impl<W: Write + Send> DeliveryTransport for LineTransport<W> {
    fn send(&self, request: &DeliveryRequest) -> Result<DeliveryResponse, DeliveryError> {
        let headers: Map<String, Value> = request
            .headers
            .iter()
            .map(|(name, value)| {
                let value = if name.eq_ignore_ascii_case(API_KEY_HEADER) {
                    "<redacted>".to_string()
                } else {
                    value.clone()
                };
                (name.clone(), Value::String(value))
            })
            .collect();
        self.write_line(&json!({
            "channel": "request",
            "url": redact_url_query(&request.url),
            "keepalive": request.keepalive,
            "headers": headers,
            "body": redacted_body(&request.body),
        }))?;
        Ok(DeliveryResponse {
            status: 200,
            body: json!({ "recording_id": REPLAY_RECORDING_ID })
                .to_string()
                .into_bytes(),
        })
    }

    fn send_beacon(&self, url: &str, body: &[u8]) -> bool {
        self.write_line(&json!({
            "channel": "beacon",
            "url": redact_url_query(url),
            "body": redacted_body(body),
        }))
        .is_ok()
    }
}

fn redacted_body(body: &[u8]) -> Value {
    let mut value = serde_json::from_slice(body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned()));
    if let Some(fields) = value.as_object_mut()
        && fields.contains_key("apiKey")
    {
        fields.insert("apiKey".to_string(), Value::String("<redacted>".to_string()));
    }
    value
}
