//! The engine contract.
//!
//! Every analysis engine implements [`Engine`]. Engines are pure with
//! respect to the workspace: they may read it and use their private scratch
//! directory, but must never mutate the workspace root.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::entities::{EngineResult, Workspace};
use crate::error::Result;
use crate::value_objects::{JobId, Language, ResourceLimits};

/// Per-run context handed to an engine.
///
/// Carries the cancellation token and deadline the engine must honor: past
/// `deadline` plus the worker's grace period, the orchestrator records the
/// engine as timed out regardless of what it eventually returns.
#[derive(Debug, Clone)]
pub struct EngineContext {
    /// Job this run belongs to
    pub job_id: JobId,
    /// Read-only materialized submission
    pub workspace: Arc<Workspace>,
    /// Private writable scratch directory for this engine
    pub scratch_dir: PathBuf,
    /// Cancellation token; child of the job token
    pub cancel: CancellationToken,
    /// Absolute deadline for this engine run
    pub deadline: Instant,
    /// Resource envelope for this engine run
    pub limits: ResourceLimits,
}

impl EngineContext {
    /// Wall-clock budget remaining before the deadline.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Whether cancellation has been requested.
    pub fn is_canceled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Uniform interface every analysis engine implements.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Registry name of the engine, e.g. `runtime` or `static`.
    fn name(&self) -> &'static str;

    /// Languages the engine can analyze. An empty slice means all.
    fn languages_supported(&self) -> &[Language];

    /// Share of the job's total timeout this engine may claim for its
    /// deadline. The execution plan takes
    /// `min(per_engine_override, total_timeout × budget_share)`.
    fn budget_share(&self) -> f64 {
        1.0
    }

    /// Run the engine over the workspace.
    ///
    /// # Errors
    ///
    /// Engine-level failures (`EngineFailed`, `BuildFailed`, sandbox errors)
    /// are isolated per engine by the worker; they never abort sibling
    /// engines.
    async fn run(&self, ctx: &EngineContext) -> Result<EngineResult>;
}
