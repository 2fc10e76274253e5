//! In-memory transport for tests, replays and headless runs.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::{DeliveryError, DeliveryRequest, DeliveryResponse, DeliveryTransport};

const DEFAULT_RESPONSE_BODY: &str = r#"{"recording_id":"rec-synthetic"}"#;

/// Scripted failure for the next regular request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntheticFailure {
    /// Transport deadline exceeded.
    Timeout,
    /// Backend answers with this status code.
    Status(u16),
}

/// Beacon accepted by the synthetic transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeaconRecord {
    /// Beacon URL.
    pub url: String,
    /// Beacon body.
    pub body: Vec<u8>,
}

/// Deterministic transport that records every request and beacon.
///
/// Successful requests answer `200` with a fixed body; failures are
/// consumed in FIFO order from the script.
#[derive(Debug)]
pub struct SyntheticTransport {
    response_body: Vec<u8>,
    requests: Mutex<Vec<DeliveryRequest>>,
    beacons: Mutex<Vec<BeaconRecord>>,
    script: Mutex<VecDeque<SyntheticFailure>>,
}

impl SyntheticTransport {
    /// Transport answering with a recording id.
    pub fn new() -> Self {
        Self::with_response_body(DEFAULT_RESPONSE_BODY)
    }

    /// Transport answering with a caller-provided body.
    pub fn with_response_body(body: &str) -> Self {
        Self {
            response_body: body.as_bytes().to_vec(),
            requests: Mutex::new(Vec::new()),
            beacons: Mutex::new(Vec::new()),
            script: Mutex::new(VecDeque::new()),
        }
    }

    /// Makes the next unscripted request fail.
    pub fn fail_next(&self, failure: SyntheticFailure) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(failure);
        }
    }

    /// Every regular request attempted, failed ones included.
    pub fn requests(&self) -> Vec<DeliveryRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    /// Regular requests sent to `url`.
    pub fn requests_to(&self, url: &str) -> Vec<DeliveryRequest> {
        self.requests()
            .into_iter()
            .filter(|request| request.url == url)
            .collect()
    }

    /// Every beacon queued.
    pub fn beacons(&self) -> Vec<BeaconRecord> {
        self.beacons
            .lock()
            .map(|beacons| beacons.clone())
            .unwrap_or_default()
    }
}

impl Default for SyntheticTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl DeliveryTransport for SyntheticTransport {
    fn send(&self, request: &DeliveryRequest) -> Result<DeliveryResponse, DeliveryError> {
        self.requests
            .lock()
            .map_err(|_| DeliveryError::Network("request log lock poisoned".to_string()))?
            .push(request.clone());

        let scripted = self
            .script
            .lock()
            .map_err(|_| DeliveryError::Network("script lock poisoned".to_string()))?
            .pop_front();
        match scripted {
            Some(SyntheticFailure::Timeout) => Err(DeliveryError::Timeout),
            Some(SyntheticFailure::Status(status)) => Ok(DeliveryResponse {
                status,
                body: Vec::new(),
            }),
            None => Ok(DeliveryResponse {
                status: 200,
                body: self.response_body.clone(),
            }),
        }
    }

    fn send_beacon(&self, url: &str, body: &[u8]) -> bool {
        match self.beacons.lock() {
            Ok(mut beacons) => {
                beacons.push(BeaconRecord {
                    url: url.to_string(),
                    body: body.to_vec(),
                });
                true
            }
            Err(_) => false,
        }
    }
}
