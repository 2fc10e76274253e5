//! Host callback handlers and the periodic tick.

use pulse_buffer::FlushReport;
use pulse_core::host::BrowserEventKind;
use pulse_core::{
    ErrorPayload, EventPayload, InputPayload, KeyPayload, LcpPayload, MASK, NetworkPayload,
    PointerPayload, ViewportPayload, VisibilityPayload,
};
use pulse_detect::{ScrollMetrics, build_mutation_payload};
use pulse_dom::{Document, MutationRecord, NodeId, SelectorStyle, resolve_selector};
use tracing::debug;

use crate::SessionRecorder;

/// Keyboard event phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPhase {
    /// `keydown`.
    Down,
    /// `keyup`.
    Up,
}

impl KeyPhase {
    fn listener(self) -> BrowserEventKind {
        match self {
            KeyPhase::Down => BrowserEventKind::KeyDown,
            KeyPhase::Up => BrowserEventKind::KeyUp,
        }
    }
}

impl SessionRecorder {
    /// Records a click on `target`.
    pub fn handle_click(
        &mut self,
        document: &Document,
        x: f64,
        y: f64,
        target: NodeId,
        now_ms: u64,
    ) {
        if !self.accepts(BrowserEventKind::Click) {
            return;
        }
        let element = document.nearest_element(target);
        let tag = element
            .and_then(|node| document.tag(node))
            .unwrap_or_default()
            .to_string();
        let text = element
            .map(|node| document.text_content(node))
            .unwrap_or_default();
        let selector = resolve_selector(document, target, SelectorStyle::Recorder);
        self.record(
            EventPayload::Click(PointerPayload::new(x, y, selector, tag, &text)),
            now_ms,
        );
    }

    /// Records a key press or release; keys typed into sensitive fields are
    /// masked.
    pub fn handle_key(
        &mut self,
        document: &Document,
        target: NodeId,
        phase: KeyPhase,
        key: &str,
        code: &str,
        now_ms: u64,
    ) {
        if !self.accepts(phase.listener()) {
            return;
        }
        let (key, code) = if is_sensitive(document, target) {
            (MASK.to_string(), MASK.to_string())
        } else {
            (key.to_string(), code.to_string())
        };
        let payload = KeyPayload {
            key,
            code,
            selector: resolve_selector(document, target, SelectorStyle::Recorder),
        };
        let payload = match phase {
            KeyPhase::Down => EventPayload::Keydown(payload),
            KeyPhase::Up => EventPayload::Keyup(payload),
        };
        self.record(payload, now_ms);
    }

    /// Records a field edit with masking for sensitive fields.
    pub fn handle_input(&mut self, document: &Document, target: NodeId, value: &str, now_ms: u64) {
        if !self.accepts(BrowserEventKind::Input) {
            return;
        }
        let selector = resolve_selector(document, target, SelectorStyle::Recorder);
        let sensitive = is_sensitive(document, target);
        self.record(
            EventPayload::Input(InputPayload::new(selector, value, sensitive)),
            now_ms,
        );
    }

    /// Records a throttled scroll sample.
    pub fn handle_scroll(&mut self, metrics: ScrollMetrics, now_ms: u64) {
        if !self.accepts(BrowserEventKind::Scroll) {
            return;
        }
        if let Some(sample) = self.scroll_sampler.sample(metrics, now_ms) {
            self.record(EventPayload::Scroll(sample.to_payload()), now_ms);
        }
    }

    /// Records a viewport resize.
    pub fn handle_resize(&mut self, viewport_width: u32, viewport_height: u32, now_ms: u64) {
        if !self.accepts(BrowserEventKind::Resize) {
            return;
        }
        self.record(
            EventPayload::Resize(ViewportPayload {
                viewport_width,
                viewport_height,
            }),
            now_ms,
        );
    }

    /// Feeds a mutation observer callback into the debounce window.
    pub fn handle_mutations(&mut self, records: Vec<MutationRecord>, now_ms: u64) {
        if !self.accepts(BrowserEventKind::Mutation) {
            return;
        }
        self.mutations.observe(records, now_ms);
    }

    /// Records a completed request unless it targets the collector backend.
    pub fn handle_network(
        &mut self,
        method: &str,
        url: &str,
        status: u16,
        duration_ms: u64,
        now_ms: u64,
    ) {
        if !self.accepts(BrowserEventKind::Network) {
            return;
        }
        if self.config.endpoints.is_own_request(url) {
            return;
        }
        self.record(
            EventPayload::Network(NetworkPayload::new(method, url, status, duration_ms)),
            now_ms,
        );
    }

    /// Records a largest-contentful-paint entry.
    pub fn handle_lcp(
        &mut self,
        document: &Document,
        value_ms: f64,
        element: Option<NodeId>,
        now_ms: u64,
    ) {
        if !self.accepts(BrowserEventKind::LargestContentfulPaint) {
            return;
        }
        let selector = element.map(|node| resolve_selector(document, node, SelectorStyle::Recorder));
        self.record(
            EventPayload::PerformanceLcp(LcpPayload { value_ms, selector }),
            now_ms,
        );
    }

    /// Records an uncaught page error.
    pub fn handle_error(
        &mut self,
        message: &str,
        source: Option<&str>,
        line: Option<u32>,
        now_ms: u64,
    ) {
        if !self.accepts(BrowserEventKind::Error) {
            return;
        }
        self.record(
            EventPayload::Error(ErrorPayload::new(message, source, line)),
            now_ms,
        );
    }

    /// Records the visibility change; a hidden page also drains the buffer
    /// through the beacon.
    pub fn on_visibility_change(&mut self, hidden: bool, now_ms: u64) {
        if !self.lifecycle.is_running()
            || !self.listeners.handles(BrowserEventKind::VisibilityChange)
        {
            return;
        }
        self.record(EventPayload::Visibility(VisibilityPayload { hidden }), now_ms);
        if hidden {
            self.beacon_flush();
        }
    }

    /// Drains the buffer through the beacon, then sends the session-end
    /// notification once.
    pub fn on_page_hide(&mut self, now_ms: u64) {
        if !self.lifecycle.is_running() || !self.listeners.handles(BrowserEventKind::PageHide) {
            return;
        }
        self.beacon_flush();
        self.send_session_end(now_ms);
    }

    /// Emits a due mutation batch and runs the periodic flush.
    pub fn tick(&mut self, document: &Document, now_ms: u64) -> FlushReport {
        if !self.lifecycle.is_running() {
            return FlushReport::default();
        }
        if let Some(records) = self.mutations.poll(now_ms) {
            match build_mutation_payload(document, &records) {
                Some(payload) => self.record(EventPayload::Mutation(payload), now_ms),
                None => debug!(records = records.len(), "mutation batch had no live targets"),
            }
        }
        if !self.scheduler.is_due(now_ms) {
            return FlushReport::default();
        }
        self.scheduler.mark_flushed(now_ms);
        self.flush()
    }
}

fn is_sensitive(document: &Document, target: NodeId) -> bool {
    document
        .nearest_element(target)
        .and_then(|node| document.element(node))
        .is_some_and(|element| element.is_sensitive_field())
}
