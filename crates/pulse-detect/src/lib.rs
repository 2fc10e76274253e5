#![warn(missing_docs)]
//! # pulse-detect
//!
//! ## Purpose
//! Turns high-frequency browser signals into a small number of meaningful
//! captured events.
//!
//! ## Responsibilities
//! - Detect rage-click bursts per rounded screen coordinate.
//! - Throttle scroll callbacks and compute clamped scroll depth.
//! - Deduplicate scroll samples per flush cycle.
//! - Debounce DOM mutation bursts and summarize them.
//!
//! ## Data flow
//! Host callbacks -> detectors (`now_ms` driven) -> payloads for the
//! collector buffers.
//!
//! ## Ownership and lifetimes
//! Every detector is owned by exactly one collector instance and mutated
//! through `&mut self`; no state is shared across collectors.
//!
//! ## Error model
//! Only construction can fail ([`DetectError`]); detection itself is pure
//! in-memory computation.
//!
//! ## Example
//! ```rust
//! use pulse_detect::RageClickDetector;
//!
//! let mut detector = RageClickDetector::new(3, 1_000).unwrap();
//! detector.on_click(50.0, 50.0, 0);
//! detector.on_click(50.0, 50.0, 100);
//! let outcome = detector.on_click(50.0, 50.0, 200);
//! assert!(outcome.fired);
//! assert_eq!(outcome.burst_size, 3);
//! ```

mod mutation;
mod rage;
mod scroll;

pub use mutation::{MutationCoalescer, build_mutation_payload, summarize_mutations};
pub use rage::{RageClickDetector, RageClickOutcome, coordinate_key};
pub use scroll::{
    ScrollDepthRecord, ScrollMetrics, ScrollSample, ScrollSampler, dedup_scroll_samples,
    scroll_depth_percent,
};

use thiserror::Error;

/// Detector construction errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DetectError {
    /// Rage-click threshold must be at least one click.
    #[error("rage click threshold must be greater than zero")]
    InvalidThreshold,
    /// Time windows must be positive.
    #[error("{0} must be greater than zero")]
    InvalidWindow(&'static str),
}
