//! Collector lifecycle state machine shared by both collectors.

use thiserror::Error;

/// Collector lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorState {
    /// Constructed but dormant (or disabled by configuration).
    Uninitialized,
    /// Attaching listeners and dispatching registration.
    Initializing,
    /// Capturing events.
    Active,
    /// Listeners attached but captured events are discarded.
    Paused,
    /// Terminal state; capture is permanently off.
    Destroyed,
}

/// Lifecycle with explicit legal transitions.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    state: CollectorState,
}

impl Lifecycle {
    /// Creates a lifecycle in [`CollectorState::Uninitialized`].
    pub fn new() -> Self {
        Self {
            state: CollectorState::Uninitialized,
        }
    }

    /// Current state snapshot.
    pub fn state(&self) -> CollectorState {
        self.state
    }

    /// `Uninitialized -> Initializing`.
    ///
    /// # Errors
    /// Returns [`LifecycleError::IllegalTransition`] from any other state.
    pub fn begin_initialization(&mut self) -> Result<(), LifecycleError> {
        self.transition(CollectorState::Uninitialized, CollectorState::Initializing, "initialize")
    }

    /// `Initializing -> Active`.
    ///
    /// # Errors
    /// Returns [`LifecycleError::IllegalTransition`] from any other state.
    pub fn activate(&mut self) -> Result<(), LifecycleError> {
        self.transition(CollectorState::Initializing, CollectorState::Active, "activate")
    }

    /// `Active -> Paused`.
    ///
    /// # Errors
    /// Returns [`LifecycleError::IllegalTransition`] from any other state.
    pub fn pause(&mut self) -> Result<(), LifecycleError> {
        self.transition(CollectorState::Active, CollectorState::Paused, "pause")
    }

    /// `Paused -> Active`.
    ///
    /// # Errors
    /// Returns [`LifecycleError::IllegalTransition`] from any other state.
    pub fn resume(&mut self) -> Result<(), LifecycleError> {
        self.transition(CollectorState::Paused, CollectorState::Active, "resume")
    }

    /// `* -> Destroyed`. Returns `false` when already destroyed.
    pub fn destroy(&mut self) -> bool {
        if self.state == CollectorState::Destroyed {
            return false;
        }
        self.state = CollectorState::Destroyed;
        true
    }

    /// Returns `true` when captured events should be recorded.
    pub fn is_capturing(&self) -> bool {
        self.state == CollectorState::Active
    }

    /// Returns `true` when listeners are attached (active or paused).
    pub fn is_running(&self) -> bool {
        matches!(self.state, CollectorState::Active | CollectorState::Paused)
    }

    fn transition(
        &mut self,
        from: CollectorState,
        to: CollectorState,
        action: &'static str,
    ) -> Result<(), LifecycleError> {
        if self.state != from {
            return Err(LifecycleError::IllegalTransition {
                from: self.state,
                action,
            });
        }
        self.state = to;
        Ok(())
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

/// Lifecycle transition errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LifecycleError {
    /// Requested transition is not legal from the current state.
    #[error("cannot {action} a collector in state {from:?}")]
    IllegalTransition {
        /// State at the time of the request.
        from: CollectorState,
        /// Requested action.
        action: &'static str,
    },
}
