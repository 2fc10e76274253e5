#![warn(missing_docs)]
//! # pulse-heatmap
//!
//! ## Purpose
//! Heatmap tracker: captures clicks, rage clicks and scroll depth for
//! aggregate interaction maps.
//!
//! ## Responsibilities
//! - Attach click, scroll, visibility and page-hide listeners once.
//! - Send `session_start` and rage clicks directly, buffer everything else.
//! - Flush clicks one request per item and scrolls as one deduplicated group.
//! - Drain buffers through the beacon path when the page hides or unloads.
//!
//! ## Data flow
//! Host callback -> [`HeatmapTracker`] handler -> detectors -> buffers ->
//! [`HeatmapTracker::tick`] / size trigger -> `pulse-transport`.
//!
//! ## Ownership and lifetimes
//! The tracker owns its buffers, detectors and session; the host and the
//! transport are shared `Arc` handles. All mutation goes through `&mut self`.
//!
//! ## Error model
//! Only construction and illegal lifecycle requests return
//! [`HeatmapError`]. Capture and delivery failures are contained and logged.
//!
//! ## Security and privacy notes
//! Click text is trimmed and capped; the API key is never logged.

use std::sync::Arc;

use pulse_buffer::{
    BufferError, BufferStats, DeliveryOutcome, EventBuffer, FlushReport, FlushScheduler,
    PushOutcome, flush_grouped_all, flush_item_wise,
};
use pulse_core::config::HeatmapConfig;
use pulse_core::host::{
    BrowserEventKind, Capabilities, HostBindings, ListenerBinding, ListenerTable, ListenerTarget,
};
use pulse_core::lifecycle::{CollectorState, Lifecycle, LifecycleError};
use pulse_core::session::{SessionIdGenerator, SessionIdentity, SessionPrefix};
use pulse_core::wire::{
    HeatmapBatchBody, HeatmapEventBody, SessionEndMetadata, SessionEndNotification, WithApiKey,
};
use pulse_core::{CapturedEvent, EventPayload, PointerPayload, RageClickPayload};
use pulse_detect::{
    DetectError, RageClickDetector, ScrollMetrics, ScrollSample, ScrollSampler,
    dedup_scroll_samples,
};
use pulse_dom::{Document, NodeId, SelectorStyle, resolve_selector};
use pulse_env::PageEnvironment;
use pulse_transport::{DeliveryClient, DeliveryTransport};
use thiserror::Error;
use tracing::{debug, info};

/// Listeners the tracker wants.
pub const HEATMAP_LISTENERS: [ListenerBinding; 4] = [
    ListenerBinding::new(ListenerTarget::Document, BrowserEventKind::Click),
    ListenerBinding::new(ListenerTarget::Window, BrowserEventKind::Scroll),
    ListenerBinding::new(ListenerTarget::Document, BrowserEventKind::VisibilityChange),
    ListenerBinding::new(ListenerTarget::Window, BrowserEventKind::PageHide),
];

/// Click, rage-click and scroll tracker for one page.
pub struct HeatmapTracker {
    config: HeatmapConfig,
    page: PageEnvironment,
    session: SessionIdentity,
    lifecycle: Lifecycle,
    host: Arc<dyn HostBindings>,
    capabilities: Capabilities,
    listeners: ListenerTable,
    client: DeliveryClient,
    events: EventBuffer<HeatmapEventBody>,
    scrolls: EventBuffer<ScrollSample>,
    rage: RageClickDetector,
    scroll_sampler: ScrollSampler,
    scheduler: FlushScheduler,
    sending_enabled: bool,
    retry_pending: bool,
    events_captured: u64,
    session_ended: bool,
}

impl HeatmapTracker {
    /// Creates the tracker and, when enabled, starts it.
    ///
    /// A disabled configuration leaves the tracker dormant: no listeners,
    /// no `session_start`.
    ///
    /// # Errors
    /// Returns [`HeatmapError`] when buffer or detector settings are invalid.
    pub fn new(
        config: HeatmapConfig,
        page: PageEnvironment,
        host: Arc<dyn HostBindings>,
        transport: Arc<dyn DeliveryTransport>,
        ids: &mut SessionIdGenerator,
        now_ms: u64,
    ) -> Result<Self, HeatmapError> {
        let capabilities = host.capabilities();
        let session = SessionIdentity::new(
            ids.generate(SessionPrefix::Heatmap, now_ms),
            config.user_id.clone(),
            now_ms,
        );
        let batch = config.batch;
        let mut tracker = Self {
            client: DeliveryClient::new(config.api_key.clone(), transport, capabilities.beacon),
            events: EventBuffer::new(batch.batch_size, batch.max_buffered)?,
            scrolls: EventBuffer::new(batch.batch_size, batch.max_buffered)?,
            rage: RageClickDetector::new(config.rage_click_threshold, config.rage_click_window_ms)?,
            scroll_sampler: ScrollSampler::new(config.scroll_throttle_ms),
            scheduler: FlushScheduler::new(batch.batch_timeout_ms, now_ms),
            sending_enabled: config.enabled,
            retry_pending: false,
            config,
            page,
            session,
            lifecycle: Lifecycle::new(),
            host,
            capabilities,
            listeners: ListenerTable::empty(),
            events_captured: 0,
            session_ended: false,
        };

        if tracker.config.enabled {
            tracker.start(now_ms)?;
        } else {
            debug!("heatmap tracker disabled by configuration");
        }
        Ok(tracker)
    }

    fn start(&mut self, now_ms: u64) -> Result<(), HeatmapError> {
        self.lifecycle.begin_initialization()?;
        self.listeners = ListenerTable::attach(
            self.host.as_ref(),
            &self.capabilities,
            &HEATMAP_LISTENERS,
        );
        self.scheduler = FlushScheduler::new(self.config.batch.batch_timeout_ms, now_ms);

        let start = self.event_body(CapturedEvent::new(
            now_ms,
            EventPayload::SessionStart(self.page.session_start_payload()),
        ));
        self.send_direct(start);
        self.lifecycle.activate()?;
        info!(session_id = self.session.session_id(), "heatmap tracker active");
        Ok(())
    }

    /// Records a click on `target` and checks it for a rage burst.
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
        let selector = resolve_selector(document, target, SelectorStyle::Heatmap);
        let element = document.nearest_element(target);
        let tag = element
            .and_then(|node| document.tag(node))
            .unwrap_or_default()
            .to_string();
        let text = element
            .map(|node| document.text_content(node))
            .unwrap_or_default();

        let click = self.event_body(CapturedEvent::new(
            now_ms,
            EventPayload::Click(PointerPayload::new(x, y, selector.clone(), tag, &text)),
        ));
        self.buffer_event(click);

        let outcome = self.rage.on_click(x, y, now_ms);
        if outcome.fired {
            let rage = self.event_body(CapturedEvent::new(
                now_ms,
                EventPayload::RageClick(RageClickPayload {
                    x,
                    y,
                    click_count: outcome.burst_size,
                    selector,
                }),
            ));
            self.events_captured += 1;
            self.send_direct(rage);
        }
    }

    /// Samples a scroll callback through the leading-edge throttle.
    pub fn handle_scroll(&mut self, metrics: ScrollMetrics, now_ms: u64) {
        if !self.accepts(BrowserEventKind::Scroll) {
            return;
        }
        let Some(sample) = self.scroll_sampler.sample(metrics, now_ms) else {
            return;
        };
        self.events_captured += 1;
        let outcome = self.scrolls.push(sample);
        if outcome == PushOutcome::FlushDue && self.size_trigger_armed() {
            self.flush_scrolls();
        }
    }

    /// Drives the periodic flush and sweeps stale rage-click windows.
    pub fn tick(&mut self, now_ms: u64) -> FlushReport {
        if !self.lifecycle.is_running() {
            return FlushReport::default();
        }
        self.rage.sweep(now_ms);
        if !self.scheduler.is_due(now_ms) {
            return FlushReport::default();
        }
        self.scheduler.mark_flushed(now_ms);
        if !self.sending_enabled {
            return FlushReport::default();
        }
        self.flush()
    }

    /// Flushes one click batch item-wise and all scroll samples grouped.
    ///
    /// A requeue holds the size trigger and direct sends until the next
    /// periodic flush in [`HeatmapTracker::tick`].
    pub fn flush(&mut self) -> FlushReport {
        self.retry_pending = false;
        let mut report = self.flush_events();
        report += self.flush_scrolls();
        report
    }

    fn flush_events(&mut self) -> FlushReport {
        let client = &self.client;
        let url = self.config.endpoints.ingest_url.as_str();
        let report = flush_item_wise(&mut self.events, |body| {
            client.deliver(
                url,
                &WithApiKey {
                    body,
                    api_key: client.api_key(),
                },
                false,
            )
        });
        self.retry_pending |= report.requeued > 0;
        report
    }

    fn flush_scrolls(&mut self) -> FlushReport {
        let client = &self.client;
        let url = self.config.endpoints.ingest_url.as_str();
        let session = &self.session;
        let page_url = self.page.url.as_str();
        let report = flush_grouped_all(&mut self.scrolls, |samples| {
            let body = scroll_batch_body(session, page_url, samples);
            client.deliver(
                url,
                &WithApiKey {
                    body: &body,
                    api_key: client.api_key(),
                },
                true,
            )
        });
        self.retry_pending |= report.requeued > 0;
        report
    }

    /// Resumes delivery; starts a dormant tracker.
    ///
    /// # Errors
    /// Returns [`HeatmapError::Lifecycle`] when a dormant start fails.
    pub fn enable(&mut self, now_ms: u64) -> Result<(), HeatmapError> {
        self.sending_enabled = true;
        if self.lifecycle.state() == CollectorState::Uninitialized {
            self.start(now_ms)?;
        }
        Ok(())
    }

    /// Suppresses delivery; listeners stay attached and events keep
    /// buffering up to capacity.
    pub fn disable(&mut self) {
        self.sending_enabled = false;
    }

    /// Stops recording events until [`HeatmapTracker::resume`].
    ///
    /// # Errors
    /// Returns [`HeatmapError::Lifecycle`] unless active.
    pub fn pause(&mut self) -> Result<(), HeatmapError> {
        Ok(self.lifecycle.pause()?)
    }

    /// Resumes recording after [`HeatmapTracker::pause`].
    ///
    /// # Errors
    /// Returns [`HeatmapError::Lifecycle`] unless paused.
    pub fn resume(&mut self) -> Result<(), HeatmapError> {
        Ok(self.lifecycle.resume()?)
    }

    /// Tags events created from now on with `user_id`.
    pub fn update_user_id(&mut self, user_id: Option<String>) {
        self.session.update_user_id(user_id);
    }

    /// Visibility change: a hidden page drains buffers through the beacon.
    pub fn on_visibility_change(&mut self, hidden: bool) {
        if hidden
            && self.lifecycle.is_running()
            && self.listeners.handles(BrowserEventKind::VisibilityChange)
        {
            self.beacon_flush();
        }
    }

    /// Page hide: drain buffers through the beacon, then send the
    /// session-end notification once.
    pub fn on_page_hide(&mut self, now_ms: u64) {
        if !self.lifecycle.is_running() || !self.listeners.handles(BrowserEventKind::PageHide) {
            return;
        }
        self.beacon_flush();
        self.send_session_end(now_ms);
    }

    /// Stops the schedule, detaches listeners and flushes everything.
    ///
    /// A second call is a no-op returning an idle report.
    pub fn destroy(&mut self) -> FlushReport {
        if !self.lifecycle.destroy() {
            return FlushReport::default();
        }
        self.scheduler.stop();
        self.listeners.detach_all(self.host.as_ref());

        let mut report = FlushReport::default();
        loop {
            let pass = self.flush();
            report += pass;
            if pass.is_idle() || pass.requeued > 0 {
                break;
            }
        }
        info!(session_id = self.session.session_id(), "heatmap tracker destroyed");
        report
    }

    /// Heatmap session id.
    pub fn session_id(&self) -> &str {
        self.session.session_id()
    }

    /// Current user id.
    pub fn user_id(&self) -> Option<&str> {
        self.session.user_id()
    }

    /// Lifecycle state.
    pub fn state(&self) -> CollectorState {
        self.lifecycle.state()
    }

    /// Returns `true` unless delivery is suppressed by [`HeatmapTracker::disable`].
    pub fn is_sending_enabled(&self) -> bool {
        self.sending_enabled
    }

    /// Attached listeners.
    pub fn listeners(&self) -> &ListenerTable {
        &self.listeners
    }

    /// Buffered click-type events.
    pub fn buffered_events(&self) -> usize {
        self.events.len()
    }

    /// Buffered scroll samples.
    pub fn buffered_scrolls(&self) -> usize {
        self.scrolls.len()
    }

    /// Click buffer counters.
    pub fn event_stats(&self) -> BufferStats {
        self.events.stats()
    }

    /// Scroll buffer counters.
    pub fn scroll_stats(&self) -> BufferStats {
        self.scrolls.stats()
    }

    /// Events captured since start.
    pub fn events_captured(&self) -> u64 {
        self.events_captured
    }

    /// Deepest scroll depth seen.
    pub fn max_scroll_depth(&self) -> u8 {
        self.scroll_sampler.max_depth()
    }

    fn accepts(&self, kind: BrowserEventKind) -> bool {
        self.lifecycle.is_capturing() && self.listeners.handles(kind)
    }

    fn event_body(&self, event: CapturedEvent) -> HeatmapEventBody {
        HeatmapEventBody {
            event,
            session_id: self.session.session_id().to_string(),
            user_id: self.session.user_id().map(str::to_string),
            url: self.page.url.clone(),
        }
    }

    fn buffer_event(&mut self, body: HeatmapEventBody) {
        self.events_captured += 1;
        if self.events.push(body) == PushOutcome::FlushDue && self.size_trigger_armed() {
            self.flush_events();
        }
    }

    fn size_trigger_armed(&self) -> bool {
        self.sending_enabled && !self.retry_pending
    }

    /// Sends one event outside the buffer; a retriable failure (or
    /// suppressed delivery) falls back to the buffer.
    fn send_direct(&mut self, body: HeatmapEventBody) {
        let outcome = if self.size_trigger_armed() {
            self.client.deliver(
                &self.config.endpoints.ingest_url,
                &WithApiKey {
                    body: &body,
                    api_key: self.client.api_key(),
                },
                false,
            )
        } else {
            DeliveryOutcome::Retry
        };
        if outcome == DeliveryOutcome::Retry {
            self.retry_pending |= self.sending_enabled;
            self.events.push(body);
        }
    }

    fn beacon_flush(&mut self) {
        if !self.sending_enabled {
            return;
        }
        let url = self.config.endpoints.ingest_url.clone();
        for body in self.events.take_all() {
            self.client.send_final(
                &url,
                &WithApiKey {
                    body: &body,
                    api_key: self.client.api_key(),
                },
            );
        }

        let samples = self.scrolls.take_all();
        if !samples.is_empty() {
            let body = scroll_batch_body(&self.session, &self.page.url, &samples);
            self.client.send_final(
                &url,
                &WithApiKey {
                    body: &body,
                    api_key: self.client.api_key(),
                },
            );
        }
    }

    fn send_session_end(&mut self, now_ms: u64) {
        if self.session_ended {
            return;
        }
        self.session_ended = true;
        let url = self.client.session_end_url(&self.config.endpoints.sessions_url);
        self.client.send_final(
            &url,
            &SessionEndNotification {
                session_id: self.session.session_id().to_string(),
                metadata: SessionEndMetadata {
                    events_count: self.events_captured,
                    ended_at: now_ms,
                },
            },
        );
    }
}

impl std::fmt::Debug for HeatmapTracker {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("HeatmapTracker")
            .field("session_id", &self.session.session_id())
            .field("state", &self.lifecycle.state())
            .field("buffered_events", &self.events.len())
            .field("buffered_scrolls", &self.scrolls.len())
            .finish_non_exhaustive()
    }
}

fn scroll_batch_body<'a>(
    session: &'a SessionIdentity,
    page_url: &'a str,
    samples: &[ScrollSample],
) -> HeatmapBatchBody<'a> {
    HeatmapBatchBody {
        session_id: session.session_id(),
        user_id: session.user_id(),
        url: page_url,
        events: dedup_scroll_samples(samples)
            .iter()
            .map(|sample| {
                CapturedEvent::new(sample.captured_at_ms, EventPayload::Scroll(sample.to_payload()))
            })
            .collect(),
    }
}

/// Heatmap tracker errors.
#[derive(Debug, Error)]
pub enum HeatmapError {
    /// Buffer settings rejected.
    #[error("buffer error: {0}")]
    Buffer(#[from] BufferError),
    /// Detector settings rejected.
    #[error("detector error: {0}")]
    Detect(#[from] DetectError),
    /// Lifecycle request not legal in the current state.
    #[error("lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),
}
