#![warn(missing_docs)]
//! # pulse-recorder
//!
//! ## Purpose
//! Session recorder: captures a replayable timeline of one visit and
//! delivers it in grouped batches tied to a server-assigned recording id.
//!
//! ## Responsibilities
//! - Register the session and keep the `recording_id` once assigned.
//! - Capture pointer, keyboard, input, scroll, resize, visibility, error,
//!   network, paint and coalesced mutation events.
//! - Flush grouped batches, requeueing failures at the buffer head and
//!   holding events while registration is pending.
//! - Append lifecycle markers on start, pause, resume and stop.
//!
//! ## Data flow
//! Host callback -> handler -> session-relative [`CapturedEvent`] -> buffer
//! -> [`SessionRecorder::flush`] -> `POST <eventsUrl>`.
//!
//! ## Ownership and lifetimes
//! The recorder owns its buffer, coalescer, sampler and session. Host and
//! transport are shared `Arc` handles.
//!
//! ## Error model
//! Construction and illegal lifecycle requests return [`RecorderError`].
//! Registration and delivery failures are logged and retried on later
//! flushes; nothing reaches the host page.
//!
//! ## Security and privacy notes
//! Values typed into password fields or elements marked `data-pulse-mask`
//! are masked before they enter the buffer. Requests to the collector's own
//! backend are never recorded as network events.

mod handlers;

pub use handlers::KeyPhase;

use std::sync::Arc;

use pulse_buffer::{
    BufferError, BufferStats, EventBuffer, FlushReport, FlushScheduler, PushOutcome,
    flush_grouped,
};
use pulse_core::config::RecorderConfig;
use pulse_core::host::{
    BrowserEventKind, Capabilities, HostBindings, ListenerBinding, ListenerTable, ListenerTarget,
};
use pulse_core::lifecycle::{CollectorState, Lifecycle, LifecycleError};
use pulse_core::session::{SessionIdGenerator, SessionIdentity, SessionPrefix};
use pulse_core::wire::{RecorderBatch, SessionEndMetadata, SessionEndNotification, WithApiKey};
use pulse_core::{CapturedEvent, EventPayload, LifecycleAction, LifecyclePayload};
use pulse_detect::{MutationCoalescer, ScrollSampler, build_mutation_payload};
use pulse_dom::Document;
use pulse_env::PageEnvironment;
use pulse_transport::{DeliveryClient, DeliveryTransport};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Listeners the recorder wants; observer-backed ones depend on
/// capabilities.
pub const RECORDER_LISTENERS: [ListenerBinding; 12] = [
    ListenerBinding::new(ListenerTarget::Document, BrowserEventKind::Click),
    ListenerBinding::new(ListenerTarget::Document, BrowserEventKind::KeyDown),
    ListenerBinding::new(ListenerTarget::Document, BrowserEventKind::KeyUp),
    ListenerBinding::new(ListenerTarget::Document, BrowserEventKind::Input),
    ListenerBinding::new(ListenerTarget::Window, BrowserEventKind::Scroll),
    ListenerBinding::new(ListenerTarget::Window, BrowserEventKind::Resize),
    ListenerBinding::new(ListenerTarget::Document, BrowserEventKind::VisibilityChange),
    ListenerBinding::new(ListenerTarget::Window, BrowserEventKind::PageHide),
    ListenerBinding::new(ListenerTarget::Window, BrowserEventKind::Error),
    ListenerBinding::new(ListenerTarget::Document, BrowserEventKind::Mutation),
    ListenerBinding::new(ListenerTarget::Window, BrowserEventKind::LargestContentfulPaint),
    ListenerBinding::new(ListenerTarget::Window, BrowserEventKind::Network),
];

/// Full-session recorder for one page.
pub struct SessionRecorder {
    config: RecorderConfig,
    page: PageEnvironment,
    session: SessionIdentity,
    lifecycle: Lifecycle,
    host: Arc<dyn HostBindings>,
    capabilities: Capabilities,
    listeners: ListenerTable,
    client: DeliveryClient,
    buffer: EventBuffer<CapturedEvent>,
    scheduler: FlushScheduler,
    scroll_sampler: ScrollSampler,
    mutations: MutationCoalescer,
    events_captured: u64,
    session_ended: bool,
    retry_pending: bool,
}

impl SessionRecorder {
    /// Creates the recorder and, when enabled, starts recording.
    ///
    /// Starting attaches listeners, attempts registration and appends a
    /// `started` marker. A failed registration does not stop capture; events
    /// are held until a later flush registers successfully.
    ///
    /// # Errors
    /// Returns [`RecorderError`] when buffer settings are invalid.
    pub fn new(
        config: RecorderConfig,
        page: PageEnvironment,
        host: Arc<dyn HostBindings>,
        transport: Arc<dyn DeliveryTransport>,
        ids: &mut SessionIdGenerator,
        now_ms: u64,
    ) -> Result<Self, RecorderError> {
        let capabilities = host.capabilities();
        let session = SessionIdentity::new(
            ids.generate(SessionPrefix::Recorder, now_ms),
            config.user_id.clone(),
            now_ms,
        );
        let batch = config.batch;
        let mut recorder = Self {
            client: DeliveryClient::new(config.api_key.clone(), transport, capabilities.beacon),
            buffer: EventBuffer::new(batch.batch_size, batch.max_buffered)?,
            scheduler: FlushScheduler::new(batch.batch_timeout_ms, now_ms),
            scroll_sampler: ScrollSampler::new(config.scroll_throttle_ms),
            mutations: MutationCoalescer::new(config.mutation_debounce_ms),
            config,
            page,
            session,
            lifecycle: Lifecycle::new(),
            host,
            capabilities,
            listeners: ListenerTable::empty(),
            events_captured: 0,
            session_ended: false,
            retry_pending: false,
        };

        if recorder.config.enabled {
            recorder.start(now_ms)?;
        } else {
            debug!("session recorder disabled by configuration");
        }
        Ok(recorder)
    }

    fn start(&mut self, now_ms: u64) -> Result<(), RecorderError> {
        self.lifecycle.begin_initialization()?;
        self.listeners = ListenerTable::attach(
            self.host.as_ref(),
            &self.capabilities,
            &RECORDER_LISTENERS,
        );
        self.ensure_registered();
        self.lifecycle.activate()?;
        self.push_marker(LifecycleAction::Started, now_ms);
        info!(session_id = self.session.session_id(), "session recorder active");
        Ok(())
    }

    /// Stops recording; events are discarded until resumed.
    ///
    /// # Errors
    /// Returns [`RecorderError::Lifecycle`] unless recording.
    pub fn pause_recording(&mut self, now_ms: u64) -> Result<(), RecorderError> {
        self.lifecycle.pause()?;
        self.mutations.cancel();
        self.push_marker(LifecycleAction::Paused, now_ms);
        info!(session_id = self.session.session_id(), "recording paused");
        Ok(())
    }

    /// Resumes recording after [`SessionRecorder::pause_recording`].
    ///
    /// # Errors
    /// Returns [`RecorderError::Lifecycle`] unless paused.
    pub fn resume_recording(&mut self, now_ms: u64) -> Result<(), RecorderError> {
        self.lifecycle.resume()?;
        self.push_marker(LifecycleAction::Resumed, now_ms);
        info!(session_id = self.session.session_id(), "recording resumed");
        Ok(())
    }

    /// Appends a `stopped` marker, then tears down like
    /// [`SessionRecorder::destroy`].
    pub fn stop_recording(&mut self, document: &Document, now_ms: u64) -> FlushReport {
        self.emit_pending_mutations(document);
        if self.lifecycle.is_running() {
            self.push_marker(LifecycleAction::Stopped, now_ms);
        }
        self.destroy(document)
    }

    /// Stops the schedule, detaches listeners and flushes everything,
    /// including a mutation batch still inside its quiet period.
    ///
    /// A second call is a no-op returning an idle report.
    pub fn destroy(&mut self, document: &Document) -> FlushReport {
        self.emit_pending_mutations(document);
        if !self.lifecycle.destroy() {
            return FlushReport::default();
        }
        self.scheduler.stop();
        self.mutations.cancel();
        self.listeners.detach_all(self.host.as_ref());

        let mut report = FlushReport::default();
        loop {
            let pass = self.flush();
            report += pass;
            if pass.is_idle() || pass.requeued > 0 {
                break;
            }
        }
        info!(session_id = self.session.session_id(), "session recorder destroyed");
        report
    }

    /// Tags registration retries and later events with `user_id`.
    pub fn update_user_id(&mut self, user_id: Option<String>) {
        self.session.update_user_id(user_id);
    }

    /// Sends one grouped batch.
    ///
    /// Registers first when no recording id is known; while registration
    /// keeps failing the buffer is held untouched. A requeued batch or a
    /// failed registration holds the size trigger until the next periodic
    /// flush in [`SessionRecorder::tick`].
    pub fn flush(&mut self) -> FlushReport {
        self.retry_pending = false;
        if self.buffer.is_empty() {
            return FlushReport::default();
        }
        if !self.ensure_registered() {
            self.retry_pending = true;
            return FlushReport::default();
        }
        let Some(recording_id) = self.session.recording_id() else {
            return FlushReport::default();
        };

        let client = &self.client;
        let url = self.config.endpoints.events_url.as_str();
        let session_id = self.session.session_id();
        let report = flush_grouped(&mut self.buffer, |events| {
            client.deliver(
                url,
                &RecorderBatch {
                    recording_id,
                    session_id,
                    events,
                },
                true,
            )
        });
        self.retry_pending = report.requeued > 0;
        report
    }

    /// Client session id.
    pub fn session_id(&self) -> &str {
        self.session.session_id()
    }

    /// Server-assigned recording id, once registered.
    pub fn recording_id(&self) -> Option<&str> {
        self.session.recording_id()
    }

    /// Current user id.
    pub fn user_id(&self) -> Option<&str> {
        self.session.user_id()
    }

    /// Lifecycle state.
    pub fn state(&self) -> CollectorState {
        self.lifecycle.state()
    }

    /// Attached listeners.
    pub fn listeners(&self) -> &ListenerTable {
        &self.listeners
    }

    /// Buffered events.
    pub fn buffered_events(&self) -> usize {
        self.buffer.len()
    }

    /// Buffered events, oldest first.
    pub fn pending_events(&self) -> impl Iterator<Item = &CapturedEvent> {
        self.buffer.iter()
    }

    /// Buffer counters.
    pub fn buffer_stats(&self) -> BufferStats {
        self.buffer.stats()
    }

    /// Events captured since start.
    pub fn events_captured(&self) -> u64 {
        self.events_captured
    }

    /// Returns `true` while a recording id is known.
    fn ensure_registered(&mut self) -> bool {
        if self.session.recording_id().is_some() {
            return true;
        }
        let request = self
            .page
            .registration_request(self.session.session_id(), self.session.user_id());
        match self
            .client
            .register_session(&self.config.endpoints.sessions_url, &request)
        {
            Ok(recording_id) => {
                self.session.set_recording_id(recording_id);
                info!(session_id = self.session.session_id(), "session registered");
                true
            }
            Err(error) => {
                warn!(%error, "session registration failed, holding events");
                false
            }
        }
    }

    fn record(&mut self, payload: EventPayload, now_ms: u64) {
        if !self.lifecycle.is_capturing() {
            return;
        }
        self.push_event(CapturedEvent::new(self.session.elapsed_ms(now_ms), payload));
    }

    /// Markers are appended regardless of the paused flag.
    fn push_marker(&mut self, action: LifecycleAction, now_ms: u64) {
        self.push_event(CapturedEvent::new(
            self.session.elapsed_ms(now_ms),
            EventPayload::Lifecycle(LifecyclePayload { action }),
        ));
    }

    fn push_event(&mut self, event: CapturedEvent) {
        self.events_captured += 1;
        if self.buffer.push(event) == PushOutcome::FlushDue && !self.retry_pending {
            self.flush();
        }
    }

    /// Records a batch still inside its quiet period, stamped when its last
    /// callback arrived.
    fn emit_pending_mutations(&mut self, document: &Document) {
        if !self.lifecycle.is_capturing() {
            return;
        }
        let Some((records, observed_at_ms)) = self.mutations.drain() else {
            return;
        };
        match build_mutation_payload(document, &records) {
            Some(payload) => self.record(EventPayload::Mutation(payload), observed_at_ms),
            None => debug!(records = records.len(), "pending mutations had no live targets"),
        }
    }

    fn accepts(&self, kind: BrowserEventKind) -> bool {
        self.lifecycle.is_capturing() && self.listeners.handles(kind)
    }

    fn beacon_flush(&mut self) {
        let Some(recording_id) = self.session.recording_id() else {
            debug!(
                pending = self.buffer.len(),
                "unregistered session, unload flush skipped"
            );
            return;
        };
        let url = self.config.endpoints.events_url.as_str();
        loop {
            let events = self.buffer.take_batch();
            if events.is_empty() {
                break;
            }
            self.client.send_final(
                url,
                &WithApiKey {
                    body: &RecorderBatch {
                        recording_id,
                        session_id: self.session.session_id(),
                        events: &events,
                    },
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

impl std::fmt::Debug for SessionRecorder {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("SessionRecorder")
            .field("session_id", &self.session.session_id())
            .field("recording_id", &self.session.recording_id())
            .field("state", &self.lifecycle.state())
            .field("buffered_events", &self.buffer.len())
            .finish_non_exhaustive()
    }
}

/// Session recorder errors.
#[derive(Debug, Error)]
pub enum RecorderError {
    /// Buffer settings rejected.
    #[error("buffer error: {0}")]
    Buffer(#[from] BufferError),
    /// Lifecycle request not legal in the current state.
    #[error("lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),
}
