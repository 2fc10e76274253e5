#![warn(missing_docs)]
//! # pulse-app binary
//!
//! Replays a page-activity script through both collectors and prints every
//! outgoing request as one JSON line on stdout. Logs go to stderr.

use std::io::Read;
use std::process::ExitCode;
use std::sync::Arc;

use pulse_app::{
    AppError, KILL_SWITCH_ENV, LineTransport, ReplayScript, ReplaySummary, app_version,
    capture_enabled_from_env,
};
use pulse_core::host::SyntheticHost;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// CLI entry point.
fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let Some(source) = std::env::args().nth(1) else {
        eprintln!("usage: pulse-app <script.json | ->");
        return ExitCode::from(2);
    };
    if source == "--version" {
        println!("pulse-app {}", app_version());
        return ExitCode::SUCCESS;
    }

    match replay(&source) {
        Ok(summary) => {
            info!(
                heatmap_session = %summary.heatmap_session_id,
                recorder_session = %summary.recorder_session_id,
                steps = summary.steps,
                requests = summary.report.requests,
                delivered = summary.report.delivered,
                "replay finished"
            );
            ExitCode::SUCCESS
        }
        Err(failure) => {
            error!(%failure, "replay failed");
            eprintln!("pulse-app: {failure}");
            ExitCode::FAILURE
        }
    }
}

fn replay(source: &str) -> Result<ReplaySummary, AppError> {
    let raw = if source == "-" {
        let mut raw = String::new();
        std::io::stdin().read_to_string(&mut raw)?;
        raw
    } else {
        std::fs::read_to_string(source)?
    };
    let script = ReplayScript::from_json_str(&raw)?;

    let capture_enabled = capture_enabled_from_env();
    if !capture_enabled {
        info!(env = KILL_SWITCH_ENV, "capture disabled by kill switch");
    }
    let host = Arc::new(SyntheticHost::with_capabilities(script.host_capabilities()));
    let transport = Arc::new(LineTransport::new(std::io::stdout()));
    script.run(host, transport, capture_enabled)
}
