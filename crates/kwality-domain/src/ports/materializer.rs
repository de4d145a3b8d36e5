//! Workspace materializer port.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::entities::{ValidationRequest, Workspace};
use crate::error::Result;
use crate::value_objects::JobId;

/// Turns a submission into a read-only on-disk tree.
///
/// Materialization errors are fatal to the job; the worker maps them to a
/// `failed` terminal state.
#[async_trait]
pub trait WorkspaceMaterializer: Send + Sync {
    /// Materialize the request under the job's workspace root and compute
    /// its content fingerprint. The returned tree is already read-only.
    async fn materialize(&self, job_id: JobId, request: &ValidationRequest) -> Result<Workspace>;

    /// Remove the workspace from disk. Honors `workspace.retain`.
    async fn destroy(&self, workspace: &Workspace) -> Result<()>;

    /// Private scratch directory for one engine of one job. Created on
    /// demand, removed together with the workspace.
    fn scratch_dir(&self, job_id: JobId, engine: &str) -> PathBuf;
}
