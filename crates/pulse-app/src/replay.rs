//! Scripted page activity replayed through a [`PageSession`].

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use pulse_buffer::FlushReport;
use pulse_core::config::CollectorOptions;
use pulse_core::host::{Capabilities, HostBindings};
use pulse_core::session::SessionIdGenerator;
use pulse_detect::ScrollMetrics;
use pulse_dom::{Document, NodeId};
use pulse_env::PageEnvironment;
use pulse_recorder::KeyPhase;
use pulse_transport::DeliveryTransport;
use serde::Deserialize;

use crate::page::{BrowserEvent, PageSession};
use crate::{AppError, apply_kill_switch};

/// Element created in the page body before replay starts.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ElementSpec {
    /// Script-local name used by events to refer to this element.
    pub handle: String,
    /// Tag name.
    pub tag: String,
    /// Handle of the parent element; `<body>` when absent.
    #[serde(default)]
    pub parent: Option<String>,
    /// Attributes.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// Text child.
    #[serde(default)]
    pub text: Option<String>,
}

/// One scripted step.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScriptEvent {
    /// Click on an element.
    Click {
        /// Client x coordinate.
        x: f64,
        /// Client y coordinate.
        y: f64,
        /// Target handle.
        target: String,
    },
    /// Window scroll.
    Scroll {
        /// Scroll offset.
        scroll_y: f64,
        /// Document height.
        scroll_height: f64,
        /// Viewport height.
        viewport_height: f64,
        /// Viewport width.
        viewport_width: f64,
    },
    /// Key press.
    KeyDown {
        /// Target handle.
        target: String,
        /// Key value.
        key: String,
        /// Key code.
        #[serde(default)]
        code: String,
    },
    /// Key release.
    KeyUp {
        /// Target handle.
        target: String,
        /// Key value.
        key: String,
        /// Key code.
        #[serde(default)]
        code: String,
    },
    /// Field edit.
    Input {
        /// Target handle.
        target: String,
        /// New value.
        value: String,
    },
    /// Viewport resize.
    Resize {
        /// Viewport width.
        width: u32,
        /// Viewport height.
        height: u32,
    },
    /// Completed request.
    Network {
        /// HTTP method.
        method: String,
        /// Request URL.
        url: String,
        /// Response status.
        status: u16,
        /// Duration in milliseconds.
        #[serde(default)]
        duration_ms: u64,
    },
    /// Largest-contentful-paint entry.
    Lcp {
        /// Render time.
        value_ms: f64,
        /// Element handle.
        #[serde(default)]
        target: Option<String>,
    },
    /// Uncaught error.
    Error {
        /// Message.
        message: String,
        /// Script URL.
        #[serde(default)]
        source: Option<String>,
        /// Line number.
        #[serde(default)]
        line: Option<u32>,
    },
    /// Visibility change.
    Visibility {
        /// `true` when hidden.
        hidden: bool,
    },
    /// Page unload.
    PageHide,
    /// Periodic work only.
    Tick,
    /// Identity change.
    UpdateUser {
        /// New user id.
        #[serde(default)]
        user_id: Option<String>,
    },
    /// Attribute edit.
    SetAttribute {
        /// Target handle.
        target: String,
        /// Attribute name.
        name: String,
        /// New value.
        value: String,
    },
    /// Text edit.
    SetText {
        /// Target handle.
        target: String,
        /// New text.
        text: String,
    },
    /// Node removal.
    Remove {
        /// Target handle.
        target: String,
    },
}

/// Script step with its timestamp.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TimedEvent {
    /// Epoch milliseconds.
    pub at: u64,
    /// Step.
    pub event: ScriptEvent,
}

/// Replay document: options, page facts, elements and timed steps.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayScript {
    /// Collector options shared by both collectors.
    pub options: CollectorOptions,
    /// Page facts.
    #[serde(default)]
    pub page: PageEnvironment,
    /// Host capabilities; every capability when absent.
    #[serde(default)]
    pub capabilities: Option<Capabilities>,
    /// Page load time.
    #[serde(default)]
    pub start_ms: u64,
    /// Session id seed for reproducible output.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Elements appended before replay.
    #[serde(default)]
    pub elements: Vec<ElementSpec>,
    /// Steps in time order.
    #[serde(default)]
    pub events: Vec<TimedEvent>,
    /// Destroy both collectors after the last step.
    #[serde(default = "default_destroy_at_end")]
    pub destroy_at_end: bool,
}

fn default_destroy_at_end() -> bool {
    true
}

/// Outcome of one replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaySummary {
    /// Heatmap session id.
    pub heatmap_session_id: String,
    /// Recorder session id.
    pub recorder_session_id: String,
    /// Steps replayed.
    pub steps: usize,
    /// Accumulated flush counters.
    pub report: FlushReport,
}

enum Step {
    Dispatch(BrowserEvent),
    Tick,
    UpdateUser(Option<String>),
}

impl ReplayScript {
    /// Parses a script.
    ///
    /// # Errors
    /// Returns [`AppError::Decode`] for malformed JSON.
    pub fn from_json_str(raw: &str) -> Result<Self, AppError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Host capabilities the replay runs with.
    pub fn host_capabilities(&self) -> Capabilities {
        self.capabilities.unwrap_or_else(Capabilities::all)
    }

    /// Builds the page document and the handle table.
    ///
    /// # Errors
    /// Returns [`AppError::Script`] for duplicate or unknown handles.
    pub fn build_document(&self) -> Result<(Document, HashMap<String, NodeId>), AppError> {
        let mut document = Document::new();
        let mut handles = HashMap::with_capacity(self.elements.len());
        for spec in &self.elements {
            if handles.contains_key(&spec.handle) {
                return Err(AppError::Script(format!("duplicate handle `{}`", spec.handle)));
            }
            let parent = match &spec.parent {
                Some(handle) => lookup(&handles, handle)?,
                None => document.body(),
            };
            let attributes: Vec<(&str, &str)> = spec
                .attributes
                .iter()
                .map(|(name, value)| (name.as_str(), value.as_str()))
                .collect();
            let node = document.append_element(parent, &spec.tag, &attributes)?;
            if let Some(text) = &spec.text {
                document.append_text(node, text)?;
            }
            handles.insert(spec.handle.clone(), node);
        }
        Ok((document, handles))
    }

    /// Replays every step and returns the accumulated flush counters.
    ///
    /// The whole script is validated before the session starts, so a bad
    /// script sends nothing.
    ///
    /// # Errors
    /// Returns [`AppError`] for inconsistent scripts or invalid options.
    pub fn run(
        &self,
        host: Arc<dyn HostBindings>,
        transport: Arc<dyn DeliveryTransport>,
        capture_enabled: bool,
    ) -> Result<ReplaySummary, AppError> {
        let mut options = self.options.clone();
        apply_kill_switch(&mut options, capture_enabled);
        let (document, handles) = self.build_document()?;
        let steps = self.resolve_steps(&handles)?;

        let mut ids = match self.seed {
            Some(seed) => SessionIdGenerator::with_seed(seed),
            None => SessionIdGenerator::from_os_rng(),
        };
        let mut session = PageSession::new(
            &options,
            self.page.clone(),
            document,
            host,
            transport,
            &mut ids,
            self.start_ms,
        )?;

        let mut report = FlushReport::default();
        for (at, step) in steps {
            match step {
                Step::Dispatch(event) => session.dispatch(event, at),
                Step::UpdateUser(user_id) => session.update_user_id(user_id),
                Step::Tick => {}
            }
            report += session.tick(at);
        }
        if self.destroy_at_end {
            report += session.destroy();
        }

        Ok(ReplaySummary {
            heatmap_session_id: session.heatmap().session_id().to_string(),
            recorder_session_id: session.recorder().session_id().to_string(),
            steps: self.events.len(),
            report,
        })
    }

    fn resolve_steps(&self, handles: &HashMap<String, NodeId>) -> Result<Vec<(u64, Step)>, AppError> {
        let mut last = self.start_ms;
        let mut steps = Vec::with_capacity(self.events.len());
        for timed in &self.events {
            if timed.at < last {
                return Err(AppError::Script(format!(
                    "step at {} precedes the previous step at {last}",
                    timed.at
                )));
            }
            last = timed.at;
            steps.push((timed.at, resolve(handles, &timed.event)?));
        }
        Ok(steps)
    }
}

fn lookup(handles: &HashMap<String, NodeId>, handle: &str) -> Result<NodeId, AppError> {
    handles
        .get(handle)
        .copied()
        .ok_or_else(|| AppError::Script(format!("unknown handle `{handle}`")))
}

fn resolve(handles: &HashMap<String, NodeId>, event: &ScriptEvent) -> Result<Step, AppError> {
    let event = match event {
        ScriptEvent::Tick => return Ok(Step::Tick),
        ScriptEvent::UpdateUser { user_id } => return Ok(Step::UpdateUser(user_id.clone())),
        ScriptEvent::Click { x, y, target } => BrowserEvent::Click {
            x: *x,
            y: *y,
            target: lookup(handles, target)?,
        },
        ScriptEvent::Scroll {
            scroll_y,
            scroll_height,
            viewport_height,
            viewport_width,
        } => BrowserEvent::Scroll(ScrollMetrics {
            scroll_y: *scroll_y,
            scroll_height: *scroll_height,
            viewport_height: *viewport_height,
            viewport_width: *viewport_width,
        }),
        ScriptEvent::KeyDown { target, key, code } => BrowserEvent::Key {
            phase: KeyPhase::Down,
            target: lookup(handles, target)?,
            key: key.clone(),
            code: code.clone(),
        },
        ScriptEvent::KeyUp { target, key, code } => BrowserEvent::Key {
            phase: KeyPhase::Up,
            target: lookup(handles, target)?,
            key: key.clone(),
            code: code.clone(),
        },
        ScriptEvent::Input { target, value } => BrowserEvent::Input {
            target: lookup(handles, target)?,
            value: value.clone(),
        },
        ScriptEvent::Resize { width, height } => BrowserEvent::Resize {
            viewport_width: *width,
            viewport_height: *height,
        },
        ScriptEvent::Network {
            method,
            url,
            status,
            duration_ms,
        } => BrowserEvent::Network {
            method: method.clone(),
            url: url.clone(),
            status: *status,
            duration_ms: *duration_ms,
        },
        ScriptEvent::Lcp { value_ms, target } => BrowserEvent::LargestContentfulPaint {
            value_ms: *value_ms,
            element: target
                .as_deref()
                .map(|handle| lookup(handles, handle))
                .transpose()?,
        },
        ScriptEvent::Error {
            message,
            source,
            line,
        } => BrowserEvent::Error {
            message: message.clone(),
            source: source.clone(),
            line: *line,
        },
        ScriptEvent::Visibility { hidden } => BrowserEvent::Visibility { hidden: *hidden },
        ScriptEvent::PageHide => BrowserEvent::PageHide,
        ScriptEvent::SetAttribute {
            target,
            name,
            value,
        } => BrowserEvent::SetAttribute {
            target: lookup(handles, target)?,
            name: name.clone(),
            value: value.clone(),
        },
        ScriptEvent::SetText { target, text } => BrowserEvent::SetText {
            target: lookup(handles, target)?,
            text: text.clone(),
        },
        ScriptEvent::Remove { target } => BrowserEvent::Remove {
            target: lookup(handles, target)?,
        },
    };
    Ok(Step::Dispatch(event))
}
