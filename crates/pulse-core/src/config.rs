//! Collector options and validated per-collector configuration.
//!
//! [`CollectorOptions`] mirrors the constructor options accepted by both
//! collectors (camelCase keys). [`HeatmapConfig::from_options`] and
//! [`RecorderConfig::from_options`] apply per-collector defaults and reject
//! values that would make the pipeline misbehave.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// API base used when `apiUrl` is not configured.
pub const DEFAULT_API_URL: &str = "http://localhost:3000/api";
/// Heatmap tracker batch size default.
pub const HEATMAP_DEFAULT_BATCH_SIZE: usize = 10;
/// Heatmap tracker flush interval default.
pub const HEATMAP_DEFAULT_BATCH_TIMEOUT_MS: u64 = 1_000;
/// Session recorder batch size default.
pub const RECORDER_DEFAULT_BATCH_SIZE: usize = 50;
/// Session recorder flush interval default.
pub const RECORDER_DEFAULT_BATCH_TIMEOUT_MS: u64 = 2_000;
/// Clicks needed for a rage click.
pub const DEFAULT_RAGE_CLICK_THRESHOLD: usize = 3;
/// Window in which rage clicks are counted.
pub const DEFAULT_RAGE_CLICK_WINDOW_MS: u64 = 1_000;
/// Minimum spacing between processed scroll callbacks.
pub const DEFAULT_SCROLL_THROTTLE_MS: u64 = 500;
/// Quiet period before buffered mutations are emitted.
pub const DEFAULT_MUTATION_DEBOUNCE_MS: u64 = 100;
/// Buffer capacity as a multiple of the batch size when not configured.
pub const BUFFER_CAPACITY_FACTOR: usize = 100;

/// Raw constructor options shared by both collectors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectorOptions {
    /// Project API key; the only required option.
    pub api_key: String,
    /// API base URL.
    #[serde(default)]
    pub api_url: Option<String>,
    /// Separate base URL for recorder event ingestion.
    #[serde(default)]
    pub events_api_url: Option<String>,
    /// External user identity.
    #[serde(default)]
    pub user_id: Option<String>,
    /// Whether the collector starts at all.
    #[serde(default)]
    pub enabled: Option<bool>,
    /// Events per flush.
    #[serde(default)]
    pub batch_size: Option<usize>,
    /// Periodic flush interval in milliseconds.
    #[serde(default)]
    pub batch_timeout: Option<u64>,
    /// Clicks needed for a rage click.
    #[serde(default)]
    pub rage_click_threshold: Option<usize>,
    /// Rage-click window in milliseconds.
    #[serde(default)]
    pub rage_click_time_window: Option<u64>,
    /// Scroll throttle in milliseconds.
    #[serde(default)]
    pub scroll_throttle: Option<u64>,
    /// Hard cap on buffered events per buffer.
    #[serde(default)]
    pub max_buffered_events: Option<usize>,
    /// Mutation debounce in milliseconds.
    #[serde(default)]
    pub mutation_debounce: Option<u64>,
}

impl CollectorOptions {
    /// Creates options with only the API key set.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    /// Parses options from a JSON document.
    ///
    /// # Errors
    /// Returns [`ConfigError::Decode`] for malformed JSON.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(raw).map_err(ConfigError::Decode)
    }
}

/// Buffer sizing and flush cadence for one collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSettings {
    /// Items removed per flush; reaching it triggers an immediate flush.
    pub batch_size: usize,
    /// Periodic flush interval in milliseconds.
    pub batch_timeout_ms: u64,
    /// Hard cap on buffered items.
    pub max_buffered: usize,
}

impl BatchSettings {
    fn resolve(
        options: &CollectorOptions,
        default_size: usize,
        default_timeout_ms: u64,
    ) -> Result<Self, ConfigError> {
        let batch_size = options.batch_size.unwrap_or(default_size);
        if batch_size == 0 {
            return Err(ConfigError::InvalidBatchSize);
        }

        let batch_timeout_ms = options.batch_timeout.unwrap_or(default_timeout_ms);
        if batch_timeout_ms == 0 {
            return Err(ConfigError::InvalidInterval("batchTimeout"));
        }

        let max_buffered = options
            .max_buffered_events
            .unwrap_or_else(|| batch_size.saturating_mul(BUFFER_CAPACITY_FACTOR));
        if max_buffered < batch_size {
            return Err(ConfigError::InvalidBufferCapacity {
                capacity: max_buffered,
                batch_size,
            });
        }

        Ok(Self {
            batch_size,
            batch_timeout_ms,
            max_buffered,
        })
    }
}

/// Backend endpoints derived from the configured API bases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// Normalized API base without trailing slash.
    pub api_url: String,
    /// Session registration and session-end endpoint.
    pub sessions_url: String,
    /// Heatmap event ingestion endpoint.
    pub ingest_url: String,
    /// Recorder grouped event endpoint.
    pub events_url: String,
}

impl Endpoints {
    /// Derives endpoints from API base URLs.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidEndpoint`] when a base is not an
    /// absolute `http`/`https` URL.
    pub fn derive(api_url: &str, events_api_url: Option<&str>) -> Result<Self, ConfigError> {
        let api_url = api_url.trim().trim_end_matches('/').to_string();
        validate_endpoint(&api_url)?;

        let events_base = match events_api_url {
            Some(raw) => {
                let base = raw.trim().trim_end_matches('/').to_string();
                validate_endpoint(&base)?;
                base
            }
            None => api_url.clone(),
        };

        Ok(Self {
            sessions_url: format!("{api_url}/sessions"),
            ingest_url: format!("{api_url}/heatmap/events"),
            events_url: format!("{events_base}/events"),
            api_url,
        })
    }

    /// Returns `true` when `url` targets this collector's own backend.
    pub fn is_own_request(&self, url: &str) -> bool {
        url.starts_with(&self.api_url) || url.starts_with(&self.events_url)
    }
}

/// Validates that an endpoint is an absolute `http` or `https` URL.
///
/// # Errors
/// Returns [`ConfigError::InvalidEndpoint`] otherwise.
pub fn validate_endpoint(endpoint: &str) -> Result<Url, ConfigError> {
    let parsed = Url::parse(endpoint)
        .map_err(|error| ConfigError::InvalidEndpoint(format!("{endpoint}: {error}")))?;

    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(ConfigError::InvalidEndpoint(format!(
            "{endpoint}: unsupported scheme {other}"
        ))),
    }
}

fn require_api_key(options: &CollectorOptions) -> Result<String, ConfigError> {
    let api_key = options.api_key.trim();
    if api_key.is_empty() {
        return Err(ConfigError::EmptyApiKey);
    }
    Ok(api_key.to_string())
}

fn normalized_user_id(options: &CollectorOptions) -> Option<String> {
    options
        .user_id
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Validated heatmap tracker configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeatmapConfig {
    /// Project API key.
    pub api_key: String,
    /// Backend endpoints.
    pub endpoints: Endpoints,
    /// Initial user identity.
    pub user_id: Option<String>,
    /// Whether the tracker starts.
    pub enabled: bool,
    /// Buffer sizing and cadence.
    pub batch: BatchSettings,
    /// Clicks needed for a rage click.
    pub rage_click_threshold: usize,
    /// Rage-click window in milliseconds.
    pub rage_click_window_ms: u64,
    /// Scroll throttle in milliseconds.
    pub scroll_throttle_ms: u64,
}

impl HeatmapConfig {
    /// Applies heatmap defaults and validates options.
    ///
    /// # Errors
    /// Returns [`ConfigError`] for a blank API key, zero batch size, zero
    /// rage-click threshold or window, or invalid endpoints.
    pub fn from_options(options: &CollectorOptions) -> Result<Self, ConfigError> {
        let api_key = require_api_key(options)?;
        let endpoints = Endpoints::derive(
            options.api_url.as_deref().unwrap_or(DEFAULT_API_URL),
            options.events_api_url.as_deref(),
        )?;
        let batch = BatchSettings::resolve(
            options,
            HEATMAP_DEFAULT_BATCH_SIZE,
            HEATMAP_DEFAULT_BATCH_TIMEOUT_MS,
        )?;

        let rage_click_threshold = options
            .rage_click_threshold
            .unwrap_or(DEFAULT_RAGE_CLICK_THRESHOLD);
        if rage_click_threshold == 0 {
            return Err(ConfigError::InvalidRageClickThreshold);
        }
        let rage_click_window_ms = options
            .rage_click_time_window
            .unwrap_or(DEFAULT_RAGE_CLICK_WINDOW_MS);
        if rage_click_window_ms == 0 {
            return Err(ConfigError::InvalidInterval("rageClickTimeWindow"));
        }

        Ok(Self {
            api_key,
            endpoints,
            user_id: normalized_user_id(options),
            enabled: options.enabled.unwrap_or(true),
            batch,
            rage_click_threshold,
            rage_click_window_ms,
            scroll_throttle_ms: options.scroll_throttle.unwrap_or(DEFAULT_SCROLL_THROTTLE_MS),
        })
    }
}

/// Validated session recorder configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecorderConfig {
    /// Project API key.
    pub api_key: String,
    /// Backend endpoints.
    pub endpoints: Endpoints,
    /// Initial user identity.
    pub user_id: Option<String>,
    /// Whether the recorder starts.
    pub enabled: bool,
    /// Buffer sizing and cadence.
    pub batch: BatchSettings,
    /// Scroll throttle in milliseconds.
    pub scroll_throttle_ms: u64,
    /// Mutation debounce in milliseconds.
    pub mutation_debounce_ms: u64,
}

impl RecorderConfig {
    /// Applies recorder defaults and validates options.
    ///
    /// # Errors
    /// Returns [`ConfigError`] for a blank API key, zero batch size, or
    /// invalid endpoints.
    pub fn from_options(options: &CollectorOptions) -> Result<Self, ConfigError> {
        let api_key = require_api_key(options)?;
        let endpoints = Endpoints::derive(
            options.api_url.as_deref().unwrap_or(DEFAULT_API_URL),
            options.events_api_url.as_deref(),
        )?;
        let batch = BatchSettings::resolve(
            options,
            RECORDER_DEFAULT_BATCH_SIZE,
            RECORDER_DEFAULT_BATCH_TIMEOUT_MS,
        )?;

        Ok(Self {
            api_key,
            endpoints,
            user_id: normalized_user_id(options),
            enabled: options.enabled.unwrap_or(true),
            batch,
            scroll_throttle_ms: options.scroll_throttle.unwrap_or(DEFAULT_SCROLL_THROTTLE_MS),
            mutation_debounce_ms: options
                .mutation_debounce
                .unwrap_or(DEFAULT_MUTATION_DEBOUNCE_MS),
        })
    }
}

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// API key is missing or blank.
    #[error("apiKey must be non-empty")]
    EmptyApiKey,
    /// Batch size must be positive.
    #[error("batchSize must be greater than zero")]
    InvalidBatchSize,
    /// Interval option must be positive.
    #[error("{0} must be greater than zero")]
    InvalidInterval(&'static str),
    /// Rage-click threshold must be positive.
    #[error("rageClickThreshold must be greater than zero")]
    InvalidRageClickThreshold,
    /// Buffer capacity cannot hold one batch.
    #[error("maxBufferedEvents ({capacity}) is smaller than batchSize ({batch_size})")]
    InvalidBufferCapacity {
        /// Configured capacity.
        capacity: usize,
        /// Configured batch size.
        batch_size: usize,
    },
    /// Endpoint is not a usable URL.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
    /// Options document is not valid JSON.
    #[error("options decode failure: {0}")]
    Decode(#[from] serde_json::Error),
}
