//! Add-in session phase machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LifecycleError;

/// Transition history is capped so long-lived hosts don't grow it unbounded.
const MAX_TRANSITIONS: usize = 64;

/// Phase of the add-in session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// Not loaded yet, or the last load attempt failed.
    Uninitialized,
    /// Components are being constructed.
    Initializing,
    /// Fully constructed; commands and notifications are live.
    Ready,
    /// Teardown in progress.
    Disposing,
    /// Torn down. Absorbing.
    Disposed,
}

impl SessionPhase {
    /// Check if this phase allows transitioning to another phase.
    pub fn can_transition_to(&self, target: SessionPhase) -> bool {
        use SessionPhase::*;

        matches!(
            (self, target),
            (Uninitialized, Initializing)
                | (Uninitialized, Disposing)
                | (Initializing, Ready)
                | (Initializing, Uninitialized)
                | (Ready, Disposing)
                | (Disposing, Disposed)
        )
    }

    /// Once teardown begins nothing but teardown may run.
    pub fn is_shutting_down(&self) -> bool {
        matches!(self, Self::Disposing | Self::Disposed)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Disposed)
    }
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Uninitialized => "uninitialized",
            Self::Initializing => "initializing",
            Self::Ready => "ready",
            Self::Disposing => "disposing",
            Self::Disposed => "disposed",
        };
        write!(f, "{s}")
    }
}

/// A recorded phase change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseTransition {
    pub from: SessionPhase,
    pub to: SessionPhase,
    pub timestamp: DateTime<Utc>,
    pub reason: Option<String>,
}

/// The add-in's own lifecycle, owned by the lifecycle manager.
#[derive(Debug, Clone, Serialize)]
pub struct AddInSession {
    /// Unique session id, regenerated per process load.
    pub session_id: Uuid,
    /// Current phase.
    pub phase: SessionPhase,
    /// Number of load attempts that failed during initialization.
    pub failed_loads: u32,
    /// When the session first reached `Ready`.
    pub ready_at: Option<DateTime<Utc>>,
    /// Phase history, oldest first.
    pub transitions: Vec<PhaseTransition>,
}

impl AddInSession {
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            phase: SessionPhase::Uninitialized,
            failed_loads: 0,
            ready_at: None,
            transitions: Vec::new(),
        }
    }

    /// Move to `new_phase`, rejecting anything the phase table does not allow.
    pub fn transition_to(
        &mut self,
        new_phase: SessionPhase,
        reason: Option<String>,
    ) -> Result<(), LifecycleError> {
        if !self.phase.can_transition_to(new_phase) {
            return Err(LifecycleError::InvalidTransition {
                from: self.phase,
                to: new_phase,
            });
        }

        tracing::debug!(from = %self.phase, to = %new_phase, "Session phase transition");

        self.transitions.push(PhaseTransition {
            from: self.phase,
            to: new_phase,
            timestamp: Utc::now(),
            reason,
        });
        if self.transitions.len() > MAX_TRANSITIONS {
            let drain_count = self.transitions.len() - MAX_TRANSITIONS;
            self.transitions.drain(..drain_count);
        }

        if self.phase == SessionPhase::Initializing && new_phase == SessionPhase::Uninitialized {
            self.failed_loads += 1;
        }
        if new_phase == SessionPhase::Ready && self.ready_at.is_none() {
            self.ready_at = Some(Utc::now());
        }

        self.phase = new_phase;
        Ok(())
    }
}

impl Default for AddInSession {
    fn default() -> Self {
        Self::new()
    }
}
