//! Leading-edge scroll throttling, depth computation and dedup.

use std::collections::HashSet;

use pulse_core::ScrollPayload;

/// Raw scroll geometry reported by the host.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollMetrics {
    /// Vertical scroll offset.
    pub scroll_y: f64,
    /// Full document height.
    pub scroll_height: f64,
    /// Viewport height.
    pub viewport_height: f64,
    /// Viewport width.
    pub viewport_width: f64,
}

/// Scroll depth as a percentage clamped to `[0, 100]`.
///
/// A document no taller than the viewport (or non-finite input) yields 0.
pub fn scroll_depth_percent(scroll_y: f64, scroll_height: f64, viewport_height: f64) -> u8 {
    let scrollable = scroll_height - viewport_height;
    if !scrollable.is_finite() || scrollable <= 0.0 || !scroll_y.is_finite() {
        return 0;
    }
    (scroll_y / scrollable * 100.0).round().clamp(0.0, 100.0) as u8
}

/// Deduplication key of a scroll sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScrollDepthRecord {
    /// Depth percentage.
    pub depth: u8,
    /// Viewport height in CSS pixels.
    pub viewport_height: u32,
    /// Viewport width in CSS pixels.
    pub viewport_width: u32,
}

/// One processed scroll callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollSample {
    /// Depth and viewport.
    pub record: ScrollDepthRecord,
    /// Session maximum at sampling time.
    pub max_depth: u8,
    /// Sampling time in epoch milliseconds.
    pub captured_at_ms: u64,
}

impl ScrollSample {
    /// Converts the sample into a wire payload.
    pub fn to_payload(&self) -> ScrollPayload {
        ScrollPayload {
            depth: self.record.depth,
            viewport_height: self.record.viewport_height,
            viewport_width: self.record.viewport_width,
            max_depth: self.max_depth,
        }
    }
}

/// Leading-edge scroll throttle with running maximum depth.
#[derive(Debug, Clone)]
pub struct ScrollSampler {
    throttle_ms: u64,
    last_processed_ms: Option<u64>,
    max_depth: u8,
}

impl ScrollSampler {
    /// Creates a sampler processing at most one callback per `throttle_ms`.
    pub fn new(throttle_ms: u64) -> Self {
        Self {
            throttle_ms,
            last_processed_ms: None,
            max_depth: 0,
        }
    }

    /// Processes a scroll callback unless it falls inside the throttle
    /// interval opened by the previous processed callback.
    pub fn sample(&mut self, metrics: ScrollMetrics, now_ms: u64) -> Option<ScrollSample> {
        if let Some(last) = self.last_processed_ms
            && now_ms.saturating_sub(last) < self.throttle_ms
        {
            return None;
        }
        self.last_processed_ms = Some(now_ms);

        let depth = scroll_depth_percent(
            metrics.scroll_y,
            metrics.scroll_height,
            metrics.viewport_height,
        );
        self.max_depth = self.max_depth.max(depth);
        Some(ScrollSample {
            record: ScrollDepthRecord {
                depth,
                viewport_height: to_pixels(metrics.viewport_height),
                viewport_width: to_pixels(metrics.viewport_width),
            },
            max_depth: self.max_depth,
            captured_at_ms: now_ms,
        })
    }

    /// Deepest depth processed so far; never decreases.
    pub fn max_depth(&self) -> u8 {
        self.max_depth
    }
}

fn to_pixels(value: f64) -> u32 {
    if value.is_finite() && value > 0.0 {
        value.round().min(f64::from(u32::MAX)) as u32
    } else {
        0
    }
}

/// Keeps the first sample per `(depth, viewport_height, viewport_width)`.
pub fn dedup_scroll_samples(samples: &[ScrollSample]) -> Vec<ScrollSample> {
    let mut seen = HashSet::new();
    samples
        .iter()
        .filter(|sample| seen.insert(sample.record))
        .copied()
        .collect()
}
