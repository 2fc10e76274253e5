//! Host environment seam: capability probing and listener registration.
//!
//! Collectors never reach into the page directly. They describe which
//! listeners they want as [`ListenerBinding`] values, attach them through
//! [`HostBindings`], and keep the successful ones in a [`ListenerTable`] that
//! is iterated again on teardown.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Optional platform capabilities, probed once at initialization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// DOM mutation observation is available.
    #[serde(default)]
    pub mutation_observer: bool,
    /// Paint timing observation is available.
    #[serde(default)]
    pub performance_observer: bool,
    /// Unload-safe beacon delivery is available.
    #[serde(default)]
    pub beacon: bool,
    /// Completed network requests can be observed.
    #[serde(default)]
    pub network_observer: bool,
}

impl Capabilities {
    /// Every capability present.
    pub fn all() -> Self {
        Self {
            mutation_observer: true,
            performance_observer: true,
            beacon: true,
            network_observer: true,
        }
    }
}

/// Object a listener is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerTarget {
    /// The window object.
    Window,
    /// The document object.
    Document,
}

/// Browser events the collectors subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BrowserEventKind {
    /// `click`.
    Click,
    /// `scroll`.
    Scroll,
    /// `keydown`.
    KeyDown,
    /// `keyup`.
    KeyUp,
    /// `input`.
    Input,
    /// `resize`.
    Resize,
    /// `visibilitychange`.
    VisibilityChange,
    /// `pagehide` (unload).
    PageHide,
    /// `error`.
    Error,
    /// Mutation observer callbacks.
    Mutation,
    /// Largest-contentful-paint performance entries.
    LargestContentfulPaint,
    /// Completed network requests.
    Network,
}

impl BrowserEventKind {
    /// Platform name of the event.
    pub fn as_str(&self) -> &'static str {
        match self {
            BrowserEventKind::Click => "click",
            BrowserEventKind::Scroll => "scroll",
            BrowserEventKind::KeyDown => "keydown",
            BrowserEventKind::KeyUp => "keyup",
            BrowserEventKind::Input => "input",
            BrowserEventKind::Resize => "resize",
            BrowserEventKind::VisibilityChange => "visibilitychange",
            BrowserEventKind::PageHide => "pagehide",
            BrowserEventKind::Error => "error",
            BrowserEventKind::Mutation => "mutation",
            BrowserEventKind::LargestContentfulPaint => "largest-contentful-paint",
            BrowserEventKind::Network => "network",
        }
    }

    /// Returns `true` when `capabilities` allow subscribing to this event.
    pub fn is_supported_by(&self, capabilities: &Capabilities) -> bool {
        match self {
            BrowserEventKind::Mutation => capabilities.mutation_observer,
            BrowserEventKind::LargestContentfulPaint => capabilities.performance_observer,
            BrowserEventKind::Network => capabilities.network_observer,
            _ => true,
        }
    }
}

/// One `(target, event)` subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerBinding {
    /// Object listened on.
    pub target: ListenerTarget,
    /// Event listened for.
    pub kind: BrowserEventKind,
}

impl ListenerBinding {
    /// Creates a binding.
    pub const fn new(target: ListenerTarget, kind: BrowserEventKind) -> Self {
        Self { target, kind }
    }
}

/// Host-side listener registration, implemented by the embedding page shim.
pub trait HostBindings: Send + Sync {
    /// Reports available optional capabilities.
    fn capabilities(&self) -> Capabilities;

    /// Attaches one listener.
    ///
    /// # Errors
    /// Returns [`HostError`] when the platform refuses the subscription.
    fn attach(&self, binding: ListenerBinding) -> Result<(), HostError>;

    /// Detaches one previously attached listener.
    fn detach(&self, binding: ListenerBinding);
}

/// Registration table of successfully attached listeners.
#[derive(Debug, Clone, Default)]
pub struct ListenerTable {
    bindings: Vec<ListenerBinding>,
}

impl ListenerTable {
    /// Table with no listeners (dormant collectors).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Attaches every wanted binding the capabilities allow.
    ///
    /// Unsupported or failing bindings are skipped; the feature behind them
    /// is simply not recorded.
    pub fn attach(
        host: &dyn HostBindings,
        capabilities: &Capabilities,
        wanted: &[ListenerBinding],
    ) -> Self {
        let mut bindings = Vec::with_capacity(wanted.len());
        for binding in wanted {
            if !binding.kind.is_supported_by(capabilities) {
                debug!(event = binding.kind.as_str(), "capability missing, listener skipped");
                continue;
            }
            match host.attach(*binding) {
                Ok(()) => bindings.push(*binding),
                Err(error) => {
                    debug!(event = binding.kind.as_str(), %error, "listener setup failed");
                }
            }
        }
        Self { bindings }
    }

    /// Returns `true` when a listener for `kind` is attached.
    pub fn handles(&self, kind: BrowserEventKind) -> bool {
        self.bindings.iter().any(|binding| binding.kind == kind)
    }

    /// Detaches every binding and empties the table.
    pub fn detach_all(&mut self, host: &dyn HostBindings) {
        for binding in self.bindings.drain(..) {
            host.detach(binding);
        }
    }

    /// Attached bindings.
    pub fn bindings(&self) -> &[ListenerBinding] {
        &self.bindings
    }

    /// Number of attached bindings.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Returns `true` when nothing is attached.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// Deterministic in-memory host for tests, replays, and headless use.
#[derive(Debug)]
pub struct SyntheticHost {
    capabilities: Capabilities,
    refused: Vec<BrowserEventKind>,
    attached: Mutex<Vec<ListenerBinding>>,
}

impl SyntheticHost {
    /// Host with every capability present.
    pub fn new() -> Self {
        Self::with_capabilities(Capabilities::all())
    }

    /// Host with caller-provided capabilities.
    pub fn with_capabilities(capabilities: Capabilities) -> Self {
        Self {
            capabilities,
            refused: Vec::new(),
            attached: Mutex::new(Vec::new()),
        }
    }

    /// Makes attaching `kind` fail, simulating a broken platform API.
    pub fn refusing(mut self, kind: BrowserEventKind) -> Self {
        self.refused.push(kind);
        self
    }

    /// Currently attached bindings.
    pub fn attached(&self) -> Vec<ListenerBinding> {
        self.attached
            .lock()
            .map(|attached| attached.clone())
            .unwrap_or_default()
    }
}

impl Default for SyntheticHost {
    fn default() -> Self {
        Self::new()
    }
}

impl HostBindings for SyntheticHost {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn attach(&self, binding: ListenerBinding) -> Result<(), HostError> {
        if self.refused.contains(&binding.kind) {
            return Err(HostError::Attach(binding.kind.as_str().to_string()));
        }
        let mut attached = self
            .attached
            .lock()
            .map_err(|_| HostError::Attach("listener registry lock poisoned".to_string()))?;
        attached.push(binding);
        Ok(())
    }

    fn detach(&self, binding: ListenerBinding) {
        if let Ok(mut attached) = self.attached.lock() {
            attached.retain(|existing| *existing != binding);
        }
    }
}

/// Host binding errors.
#[derive(Debug, Error)]
pub enum HostError {
    /// Listener could not be attached.
    #[error("listener attach failed: {0}")]
    Attach(String),
}
