#![warn(missing_docs)]
//! # pulse-app
//!
//! ## Purpose
//! Wires the heatmap tracker and the session recorder into one page-level
//! session and replays scripted page activity through it.
//!
//! ## Responsibilities
//! - Route host browser events to whichever collector consumes them.
//! - Tick both collectors and forward unload signals to both.
//! - Honour the `PULSE_CAPTURE_ENABLED` kill switch.
//! - Load collector options from JSON documents.
//!
//! ## Data flow
//! JSON script -> [`ReplayScript`] -> [`BrowserEvent`] -> [`PageSession`] ->
//! collectors -> [`pulse_transport::DeliveryTransport`].
//!
//! ## Ownership and lifetimes
//! [`PageSession`] owns the page document and both collectors. Host and
//! transport handles are shared between the two collectors.
//!
//! ## Error model
//! Setup and script failures are wrapped in [`AppError`]. Once a session
//! runs, capture and delivery failures stay inside the collectors.
//!
//! ## Security and privacy notes
//! - The kill switch disables both collectors before any listener attaches.
//! - [`LineTransport`] redacts the API key from printed headers, URLs and bodies.
//!
//! ## Example
//! ```
//! assert!(pulse_app::kill_switch_allows(None));
//! assert!(!pulse_app::kill_switch_allows(Some("off")));
//! ```

mod console;
mod page;
mod replay;

pub use console::{LineTransport, REPLAY_RECORDING_ID};
pub use page::{BrowserEvent, PageSession};
pub use replay::{ElementSpec, ReplayScript, ReplaySummary, ScriptEvent, TimedEvent};

use pulse_core::config::{CollectorOptions, ConfigError};
use pulse_dom::DomError;
use pulse_heatmap::HeatmapError;
use pulse_recorder::RecorderError;
use thiserror::Error;
use tracing::warn;
use url::Url;

/// Build-time application version loaded from the root `VERSION` file.
pub const APP_VERSION: &str = env!("PULSE_VERSION");

/// Environment variable acting as the runtime kill switch.
pub const KILL_SWITCH_ENV: &str = "PULSE_CAPTURE_ENABLED";

/// Returns the app version sourced from root `VERSION`.
pub fn app_version() -> &'static str {
    APP_VERSION
}

/// Returns `true` when endpoint URL is HTTPS.
pub fn is_https_endpoint(endpoint: &str) -> bool {
    Url::parse(endpoint)
        .map(|url| url.scheme() == "https")
        .unwrap_or(false)
}

/// Interprets a kill-switch value.
///
/// Semantics:
/// - Unset => capture enabled.
/// - `0`, `false`, `off` (case-insensitive) => capture disabled.
/// - Any other value => capture enabled.
pub fn kill_switch_allows(value: Option<&str>) -> bool {
    match value {
        Some(value) => {
            let normalized = value.trim().to_ascii_lowercase();
            !(normalized == "0" || normalized == "false" || normalized == "off")
        }
        None => true,
    }
}

/// Checks the runtime kill-switch env var.
pub fn capture_enabled_from_env() -> bool {
    kill_switch_allows(std::env::var(KILL_SWITCH_ENV).ok().as_deref())
}

/// Forces both collectors dormant when capture is switched off.
pub fn apply_kill_switch(options: &mut CollectorOptions, capture_enabled: bool) {
    if !capture_enabled {
        options.enabled = Some(false);
    }
}

/// Parses collector options and applies the environment kill switch.
///
/// # Errors
/// Returns [`AppError::Config`] for malformed JSON.
pub fn load_options(raw: &str) -> Result<CollectorOptions, AppError> {
    let mut options = CollectorOptions::from_json_str(raw)?;
    apply_kill_switch(&mut options, capture_enabled_from_env());
    if let Some(api_url) = options.api_url.as_deref()
        && !is_https_endpoint(api_url)
    {
        warn!(api_url, "collector endpoint is not https");
    }
    Ok(options)
}

/// App integration error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Options rejected.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    /// Heatmap tracker setup failed.
    #[error("heatmap error: {0}")]
    Heatmap(#[from] HeatmapError),
    /// Session recorder setup failed.
    #[error("recorder error: {0}")]
    Recorder(#[from] RecorderError),
    /// Page document could not be built.
    #[error("document error: {0}")]
    Dom(#[from] DomError),
    /// Script could not be read.
    #[error("script read failure: {0}")]
    Io(#[from] std::io::Error),
    /// Script is not valid JSON.
    #[error("script decode failure: {0}")]
    Decode(#[from] serde_json::Error),
    /// Script is well-formed JSON but inconsistent.
    #[error("invalid script: {0}")]
    Script(String),
}
