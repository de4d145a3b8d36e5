//! Job lifecycle entities.
//!
//! A job is one admitted validation of one submission. Its state machine is
//! monotonic: the only transition out of order is `pending → canceled`, and
//! terminal states never change again.

use chrono::Utc;
use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::entities::request::ValidationRequest;
use crate::entities::workspace::Workspace;
use crate::value_objects::JobId;

/// Lifecycle state of a validation job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Admitted, waiting in the queue
    #[display("pending")]
    Pending,
    /// Claimed by a worker, pipeline in flight
    #[display("running")]
    Running,
    /// At least one engine returned ok
    #[display("completed")]
    Completed,
    /// Materialization failed or every engine failed
    #[display("failed")]
    Failed,
    /// The job deadline elapsed
    #[display("timeout")]
    Timeout,
    /// Canceled by the caller or during shutdown
    #[display("canceled")]
    Canceled,
}

impl JobState {
    /// Returns the human-readable name of the state.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Timeout => "timeout",
            Self::Canceled => "canceled",
        }
    }

    /// Checks if the state is terminal.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Timeout | Self::Canceled
        )
    }

    /// Monotonic transition guard.
    ///
    /// Legal moves: `pending → running`, `pending → canceled`, and
    /// `running → {completed, failed, timeout, canceled}`. Everything else,
    /// including any move out of a terminal state, is rejected.
    #[must_use]
    pub fn can_transition_to(&self, next: &Self) -> bool {
        match (self, next) {
            (Self::Pending, Self::Running | Self::Canceled) => true,
            (
                Self::Running,
                Self::Completed | Self::Failed | Self::Timeout | Self::Canceled,
            ) => true,
            _ => false,
        }
    }
}

/// One admitted validation job.
///
/// The job owns its request and, once materialized, its workspace. The
/// aggregated [`Report`](crate::entities::report::Report) is held by the
/// result store, not by the job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Unique identifier
    pub id: JobId,
    /// The immutable submission this job validates
    pub request: ValidationRequest,
    /// Current lifecycle state
    pub state: JobState,
    /// Materialized workspace, present after materialization
    pub workspace: Option<Workspace>,
    /// When the job was admitted (Unix epoch seconds)
    pub submitted_at: i64,
    /// When a worker claimed the job
    pub started_at: Option<i64>,
    /// When the job reached a terminal state
    pub completed_at: Option<i64>,
}

impl Job {
    /// Create a new job in `Pending` state.
    pub fn new(request: ValidationRequest) -> Self {
        Self {
            id: JobId::new(),
            request,
            state: JobState::Pending,
            workspace: None,
            submitted_at: Utc::now().timestamp(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Attempt a state transition, enforcing monotonicity.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyTerminal`](crate::error::Error::AlreadyTerminal)
    /// when the job is terminal, or `Internal` for any other illegal move.
    pub fn transition_to(&mut self, next: JobState) -> crate::error::Result<()> {
        if !self.state.can_transition_to(&next) {
            if self.state.is_terminal() {
                return Err(crate::error::Error::AlreadyTerminal {
                    job_id: self.id.as_str(),
                });
            }
            return Err(crate::error::Error::internal(format!(
                "illegal job transition {} -> {}",
                self.state, next
            )));
        }
        match next {
            JobState::Running => self.started_at = Some(Utc::now().timestamp()),
            JobState::Completed | JobState::Failed | JobState::Timeout | JobState::Canceled => {
                self.completed_at = Some(Utc::now().timestamp());
            }
            JobState::Pending => {}
        }
        self.state = next;
        Ok(())
    }
}
