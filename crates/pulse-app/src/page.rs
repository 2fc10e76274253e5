//! Page-level orchestration of both collectors.

use std::sync::Arc;

use pulse_buffer::FlushReport;
use pulse_core::config::{CollectorOptions, HeatmapConfig, RecorderConfig};
use pulse_core::host::HostBindings;
use pulse_core::session::SessionIdGenerator;
use pulse_detect::ScrollMetrics;
use pulse_dom::{Document, DomError, NodeId};
use pulse_env::PageEnvironment;
use pulse_heatmap::HeatmapTracker;
use pulse_recorder::{KeyPhase, SessionRecorder};
use pulse_transport::DeliveryTransport;
use tracing::{debug, info};

use crate::AppError;

/// Host event delivered to a [`PageSession`].
///
/// DOM edits are applied to the session's document; the resulting mutation
/// records reach the recorder as one observer callback.
#[derive(Debug, Clone, PartialEq)]
pub enum BrowserEvent {
    /// Pointer click.
    Click {
        /// Client x coordinate.
        x: f64,
        /// Client y coordinate.
        y: f64,
        /// Event target.
        target: NodeId,
    },
    /// Window scroll.
    Scroll(ScrollMetrics),
    /// Key press or release.
    Key {
        /// Press or release.
        phase: KeyPhase,
        /// Focused node.
        target: NodeId,
        /// Key value.
        key: String,
        /// Physical key code.
        code: String,
    },
    /// Field edit.
    Input {
        /// Edited node.
        target: NodeId,
        /// New value.
        value: String,
    },
    /// Viewport resize.
    Resize {
        /// Viewport width in CSS pixels.
        viewport_width: u32,
        /// Viewport height in CSS pixels.
        viewport_height: u32,
    },
    /// Completed network request.
    Network {
        /// HTTP method.
        method: String,
        /// Request URL.
        url: String,
        /// Response status.
        status: u16,
        /// Duration in milliseconds.
        duration_ms: u64,
    },
    /// Largest-contentful-paint entry.
    LargestContentfulPaint {
        /// Render time in milliseconds.
        value_ms: f64,
        /// Largest element, when reported.
        element: Option<NodeId>,
    },
    /// Uncaught page error.
    Error {
        /// Error message.
        message: String,
        /// Script URL.
        source: Option<String>,
        /// Line number.
        line: Option<u32>,
    },
    /// Visibility change.
    Visibility {
        /// `true` when the page became hidden.
        hidden: bool,
    },
    /// Page unload.
    PageHide,
    /// Attribute edit.
    SetAttribute {
        /// Edited element.
        target: NodeId,
        /// Attribute name.
        name: String,
        /// New value.
        value: String,
    },
    /// Replaces the first text child of an element, or appends one.
    SetText {
        /// Edited element.
        target: NodeId,
        /// New text.
        text: String,
    },
    /// Detaches a node from its parent.
    Remove {
        /// Removed node.
        target: NodeId,
    },
}

/// One page with both collectors attached.
pub struct PageSession {
    document: Document,
    heatmap: HeatmapTracker,
    recorder: SessionRecorder,
}

impl PageSession {
    /// Builds both collectors from one set of options.
    ///
    /// # Errors
    /// Returns [`AppError`] when options or collector settings are invalid.
    pub fn new(
        options: &CollectorOptions,
        page: PageEnvironment,
        mut document: Document,
        host: Arc<dyn HostBindings>,
        transport: Arc<dyn DeliveryTransport>,
        ids: &mut SessionIdGenerator,
        now_ms: u64,
    ) -> Result<Self, AppError> {
        let heatmap_config = HeatmapConfig::from_options(options)?;
        let recorder_config = RecorderConfig::from_options(options)?;
        document.observe();

        let heatmap = HeatmapTracker::new(
            heatmap_config,
            page.clone(),
            Arc::clone(&host),
            Arc::clone(&transport),
            ids,
            now_ms,
        )?;
        let recorder = SessionRecorder::new(recorder_config, page, host, transport, ids, now_ms)?;
        info!(
            heatmap_session = heatmap.session_id(),
            recorder_session = recorder.session_id(),
            "page session started"
        );
        Ok(Self {
            document,
            heatmap,
            recorder,
        })
    }

    /// Routes one host event to the collectors that consume it.
    pub fn dispatch(&mut self, event: BrowserEvent, now_ms: u64) {
        let document = &self.document;
        match event {
            BrowserEvent::Click { x, y, target } => {
                self.heatmap.handle_click(document, x, y, target, now_ms);
                self.recorder.handle_click(document, x, y, target, now_ms);
            }
            BrowserEvent::Scroll(metrics) => {
                self.heatmap.handle_scroll(metrics, now_ms);
                self.recorder.handle_scroll(metrics, now_ms);
            }
            BrowserEvent::Key {
                phase,
                target,
                key,
                code,
            } => self
                .recorder
                .handle_key(document, target, phase, &key, &code, now_ms),
            BrowserEvent::Input { target, value } => {
                self.recorder.handle_input(document, target, &value, now_ms);
            }
            BrowserEvent::Resize {
                viewport_width,
                viewport_height,
            } => self
                .recorder
                .handle_resize(viewport_width, viewport_height, now_ms),
            BrowserEvent::Network {
                method,
                url,
                status,
                duration_ms,
            } => self
                .recorder
                .handle_network(&method, &url, status, duration_ms, now_ms),
            BrowserEvent::LargestContentfulPaint { value_ms, element } => {
                self.recorder.handle_lcp(document, value_ms, element, now_ms);
            }
            BrowserEvent::Error {
                message,
                source,
                line,
            } => self
                .recorder
                .handle_error(&message, source.as_deref(), line, now_ms),
            BrowserEvent::Visibility { hidden } => {
                self.heatmap.on_visibility_change(hidden);
                self.recorder.on_visibility_change(hidden, now_ms);
            }
            BrowserEvent::PageHide => {
                self.heatmap.on_page_hide(now_ms);
                self.recorder.on_page_hide(now_ms);
            }
            BrowserEvent::SetAttribute {
                target,
                name,
                value,
            } => {
                let edit = self.document.set_attribute(target, &name, &value);
                self.after_edit(edit, now_ms);
            }
            BrowserEvent::SetText { target, text } => {
                let edit = self.replace_text(target, &text);
                self.after_edit(edit, now_ms);
            }
            BrowserEvent::Remove { target } => {
                let edit = match self.document.parent(target) {
                    Some(parent) => self.document.remove_child(parent, target),
                    None => Err(DomError::NotAChild(target.index())),
                };
                self.after_edit(edit, now_ms);
            }
        }
    }

    /// Runs both collectors' periodic work.
    pub fn tick(&mut self, now_ms: u64) -> FlushReport {
        let mut report = self.heatmap.tick(now_ms);
        report += self.recorder.tick(&self.document, now_ms);
        report
    }

    /// Updates the user id on both collectors.
    pub fn update_user_id(&mut self, user_id: Option<String>) {
        self.heatmap.update_user_id(user_id.clone());
        self.recorder.update_user_id(user_id);
    }

    /// Tears down both collectors.
    pub fn destroy(&mut self) -> FlushReport {
        let mut report = self.heatmap.destroy();
        report += self.recorder.destroy(&self.document);
        report
    }

    /// Page document.
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Heatmap tracker.
    pub fn heatmap(&self) -> &HeatmapTracker {
        &self.heatmap
    }

    /// Session recorder.
    pub fn recorder(&self) -> &SessionRecorder {
        &self.recorder
    }

    fn replace_text(&mut self, target: NodeId, text: &str) -> Result<(), DomError> {
        let existing = self
            .document
            .children(target)
            .iter()
            .copied()
            .find(|child| self.document.element(*child).is_none());
        match existing {
            Some(node) => self.document.set_text(node, text),
            None => self.document.append_text(target, text).map(|_| ()),
        }
    }

    fn after_edit(&mut self, edit: Result<(), DomError>, now_ms: u64) {
        match edit {
            Ok(()) => {
                let records = self.document.take_records();
                self.recorder.handle_mutations(records, now_ms);
            }
            Err(error) => debug!(%error, "dom edit skipped"),
        }
    }
}

impl std::fmt::Debug for PageSession {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("PageSession")
            .field("heatmap", &self.heatmap)
            .field("recorder", &self.recorder)
            .finish_non_exhaustive()
    }
}
