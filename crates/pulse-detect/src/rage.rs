//! Sliding-window rage-click detection.

use std::collections::HashMap;

use tracing::debug;

use crate::DetectError;

/// Result of feeding one click to the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RageClickOutcome {
    /// A rage click fired on this click.
    pub fired: bool,
    /// Clicks in the current window for this coordinate, including this one.
    pub burst_size: usize,
}

/// Key grouping clicks by rounded coordinate.
pub fn coordinate_key(x: f64, y: f64) -> String {
    format!("{},{}", x.round() as i64, y.round() as i64)
}

/// Per-coordinate click counter over a sliding time window.
#[derive(Debug, Clone)]
pub struct RageClickDetector {
    threshold: usize,
    window_ms: u64,
    windows: HashMap<String, Vec<u64>>,
}

impl RageClickDetector {
    /// Creates a detector firing at `threshold` clicks within `window_ms`.
    ///
    /// # Errors
    /// Returns [`DetectError`] when either value is zero.
    pub fn new(threshold: usize, window_ms: u64) -> Result<Self, DetectError> {
        if threshold == 0 {
            return Err(DetectError::InvalidThreshold);
        }
        if window_ms == 0 {
            return Err(DetectError::InvalidWindow("rage click window"));
        }
        Ok(Self {
            threshold,
            window_ms,
            windows: HashMap::new(),
        })
    }

    /// Records a click and reports whether it completed a burst.
    ///
    /// Entries at least `window_ms` old are pruned before the click is
    /// counted. A firing burst deletes the key, so the next click at the same
    /// coordinate starts again from one.
    pub fn on_click(&mut self, x: f64, y: f64, now_ms: u64) -> RageClickOutcome {
        let key = coordinate_key(x, y);
        let window_ms = self.window_ms;
        let entries = self.windows.entry(key.clone()).or_default();
        entries.retain(|clicked_at| now_ms.saturating_sub(*clicked_at) < window_ms);
        entries.push(now_ms);

        let burst_size = entries.len();
        let fired = burst_size >= self.threshold;
        if fired {
            self.windows.remove(&key);
            debug!(burst_size, "rage click burst detected");
        }
        RageClickOutcome { fired, burst_size }
    }

    /// Drops coordinates whose newest click has left the window.
    pub fn sweep(&mut self, now_ms: u64) {
        let window_ms = self.window_ms;
        self.windows.retain(|_, entries| {
            entries
                .last()
                .is_some_and(|newest| now_ms.saturating_sub(*newest) < window_ms)
        });
    }

    /// Number of coordinates with live click history.
    pub fn tracked_coordinates(&self) -> usize {
        self.windows.len()
    }
}
