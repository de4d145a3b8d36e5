//! Sandbox run state machine.
//!
//! ```text
//! created → building → running → observing → draining → finalized
//!                   ↘ failed (build)        ↘ timeout
//!                                            ↘ canceled
//! ```

use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Phase of one sandbox run. Each variant carries context-specific data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(tag = "state", content = "data", rename_all = "lowercase")]
pub enum SandboxState {
    /// Container requested but not yet created
    #[display("created")]
    Created,
    /// Build command in flight
    #[display("building")]
    Building,
    /// Entry command in flight, monitors live
    #[display("running")]
    Running,
    /// Entry command in flight, a sample has been observed
    #[display("observing")]
    Observing,
    /// Entry process exited, collecting remaining metrics
    #[display("draining")]
    Draining,
    /// Result written
    #[display("finalized")]
    Finalized,
    /// Build or start failed
    #[display("failed")]
    Failed {
        /// Which phase failed
        phase: String,
    },
    /// Deadline elapsed
    #[display("timeout")]
    TimedOut,
    /// External cancellation
    #[display("canceled")]
    Canceled,
}

impl SandboxState {
    /// Human-readable phase name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Building => "building",
            Self::Running => "running",
            Self::Observing => "observing",
            Self::Draining => "draining",
            Self::Finalized => "finalized",
            Self::Failed { .. } => "failed",
            Self::TimedOut => "timeout",
            Self::Canceled => "canceled",
        }
    }

    /// Whether the run is over.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Finalized | Self::Failed { .. } | Self::TimedOut | Self::Canceled
        )
    }

    /// Transition guard for the sandbox phase diagram.
    #[must_use]
    pub fn can_transition_to(&self, next: &Self) -> bool {
        match (self, next) {
            (Self::Created, Self::Building | Self::Canceled) => true,
            (Self::Building, Self::Running | Self::Failed { .. }) => true,
            // A deadline or cancellation can land in any live phase,
            // including while remaining metrics are being drained.
            (
                Self::Building | Self::Running | Self::Observing | Self::Draining,
                Self::TimedOut | Self::Canceled,
            ) => true,
            (Self::Running, Self::Observing | Self::Draining) => true,
            (Self::Observing, Self::Draining) => true,
            (Self::Draining, Self::Finalized) => true,
            _ => false,
        }
    }
}

/// Tracks the current phase, rejecting illegal moves.
#[derive(Debug)]
pub struct SandboxStateMachine {
    state: SandboxState,
}

impl SandboxStateMachine {
    /// Start in `created`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: SandboxState::Created,
        }
    }

    /// Current phase.
    pub fn state(&self) -> &SandboxState {
        &self.state
    }

    /// Advance to `next` when the diagram allows it.
    pub fn advance(&mut self, next: SandboxState) -> bool {
        if self.state.can_transition_to(&next) {
            self.state = next;
            true
        } else {
            false
        }
    }
}

impl Default for SandboxStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_walks_the_diagram() {
        let mut fsm = SandboxStateMachine::new();
        for next in [
            SandboxState::Building,
            SandboxState::Running,
            SandboxState::Observing,
            SandboxState::Draining,
            SandboxState::Finalized,
        ] {
            assert!(fsm.advance(next), "transition should be legal");
        }
        assert!(fsm.state().is_terminal());
    }

    #[test]
    fn build_failure_is_terminal() {
        let mut fsm = SandboxStateMachine::new();
        assert!(fsm.advance(SandboxState::Building));
        assert!(fsm.advance(SandboxState::Failed {
            phase: "build".to_owned()
        }));
        assert!(!fsm.advance(SandboxState::Running));
    }

    #[test]
    fn running_can_time_out_or_cancel() {
        let mut fsm = SandboxStateMachine::new();
        fsm.advance(SandboxState::Building);
        fsm.advance(SandboxState::Running);
        assert!(fsm.state().can_transition_to(&SandboxState::TimedOut));
        assert!(fsm.state().can_transition_to(&SandboxState::Canceled));
    }

    #[test]
    fn finalized_accepts_nothing() {
        let mut fsm = SandboxStateMachine::new();
        for next in [
            SandboxState::Building,
            SandboxState::Running,
            SandboxState::Draining,
            SandboxState::Finalized,
        ] {
            fsm.advance(next);
        }
        assert!(!fsm.advance(SandboxState::Running));
        assert!(!fsm.advance(SandboxState::Canceled));
    }
}
