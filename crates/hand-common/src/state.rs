//! Controller lifecycle state machine.
//!
//! BOOT → INIT → RUN → STOPPED, with FAULT reachable while starting up.
//! The cycle scheduler itself has no lifecycle; this tracks the program
//! around it (configuration, collaborator initialization, polling loop).

use crate::error::{HandError, HandResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle states of the controller program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControllerState {
    /// Configuration loading.
    #[default]
    Boot,
    /// Collaborator initialization and registry composition.
    Init,
    /// Busy-polling the cycle scheduler.
    Run,
    /// Startup failed; scheduling never began.
    Fault,
    /// Polling stopped.
    Stopped,
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boot => write!(f, "BOOT"),
            Self::Init => write!(f, "INIT"),
            Self::Run => write!(f, "RUN"),
            Self::Fault => write!(f, "FAULT"),
            Self::Stopped => write!(f, "STOPPED"),
        }
    }
}

impl ControllerState {
    /// Check if a transition to `target` is valid from the current state.
    #[must_use]
    pub fn can_transition_to(&self, target: ControllerState) -> bool {
        use ControllerState::{Boot, Fault, Init, Run, Stopped};

        matches!(
            (self, target),
            (Boot, Init)
                | (Init, Run)
                | (Boot, Fault)
                | (Init, Fault)
                | (Run, Stopped)
                | (Fault, Stopped)
        )
    }
}

/// State machine wrapper enforcing the transition table.
#[derive(Debug, Clone, Default)]
pub struct StateMachine {
    current: ControllerState,
}

impl StateMachine {
    /// Create a new state machine starting in BOOT.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the current state.
    #[must_use]
    pub fn state(&self) -> ControllerState {
        self.current
    }

    /// Attempt a state transition.
    ///
    /// # Errors
    ///
    /// Returns [`HandError::InvalidStateTransition`] if `target` is not
    /// reachable from the current state.
    pub fn transition(&mut self, target: ControllerState) -> HandResult<()> {
        if self.current.can_transition_to(target) {
            self.current = target;
            Ok(())
        } else {
            Err(HandError::InvalidStateTransition {
                from: self.current.to_string(),
                to: target.to_string(),
            })
        }
    }

    /// Enter FAULT if reachable from the current state.
    pub fn enter_fault(&mut self) {
        if self.current.can_transition_to(ControllerState::Fault) {
            self.current = ControllerState::Fault;
        }
    }
}
