//! Engine results and the aggregated job report.

use std::collections::BTreeMap;

use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::entities::finding::Finding;
use crate::entities::job::JobState;
use crate::value_objects::JobId;

/// Outcome class of a single engine execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
pub enum EngineStatus {
    /// The engine ran to completion
    #[display("ok")]
    Ok,
    /// The engine failed or panicked
    #[display("error")]
    Error,
    /// The engine exceeded its deadline plus grace
    #[display("timeout")]
    Timeout,
    /// The engine did not apply to this submission
    #[display("skipped")]
    Skipped,
}

/// Result of one engine over one workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineResult {
    /// Registry name of the engine
    pub engine: String,
    /// Outcome class
    pub status: EngineStatus,
    /// Score in `[0, 100]`
    pub score: f64,
    /// Observations made by the engine
    pub findings: Vec<Finding>,
    /// Numeric metrics keyed by name (e.g. `peak_rss_mb`)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metrics: BTreeMap<String, f64>,
    /// Wall time the engine consumed, in milliseconds
    pub duration_ms: u64,
}

impl EngineResult {
    /// A skipped result with a single explanatory finding-free record.
    pub fn skipped<S: Into<String>>(engine: S) -> Self {
        Self {
            engine: engine.into(),
            status: EngineStatus::Skipped,
            score: 0.0,
            findings: Vec::new(),
            metrics: BTreeMap::new(),
            duration_ms: 0,
        }
    }

    /// An error result carrying one finding that explains the failure.
    pub fn errored<S: Into<String>>(engine: S, finding: Finding, duration_ms: u64) -> Self {
        Self {
            engine: engine.into(),
            status: EngineStatus::Error,
            score: 0.0,
            findings: vec![finding],
            metrics: BTreeMap::new(),
            duration_ms,
        }
    }

    /// Whether this result participates in the weighted overall score.
    pub fn is_scorable(&self) -> bool {
        matches!(self.status, EngineStatus::Ok | EngineStatus::Timeout)
    }
}

/// Aggregated, wire-visible result of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    /// Identifier of the job this report belongs to
    pub job_id: JobId,
    /// Submission name, echoed back for listings
    pub name: String,
    /// Current job state
    pub status: JobState,
    /// Weighted mean of engine scores, capped by finding severity rules
    pub overall_score: f64,
    /// Per-engine results keyed by engine name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub engine_results: BTreeMap<String, EngineResult>,
    /// Merged, deduplicated findings sorted by severity descending
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub findings: Vec<Finding>,
    /// Templated advice derived from finding categories
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recommendations: Vec<String>,
    /// Free-form metadata (workspace fingerprint, timings, ...)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
    /// When the job was admitted (Unix epoch seconds)
    pub submitted_at: i64,
    /// When the job started running, if it did
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<i64>,
    /// When the job reached a terminal state, if it has
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<i64>,
}

impl Report {
    /// A report for a job that has not produced results yet.
    pub fn pending(job_id: JobId, name: impl Into<String>, submitted_at: i64) -> Self {
        Self {
            job_id,
            name: name.into(),
            status: JobState::Pending,
            overall_score: 0.0,
            engine_results: BTreeMap::new(),
            findings: Vec::new(),
            recommendations: Vec::new(),
            metadata: BTreeMap::new(),
            submitted_at,
            started_at: None,
            completed_at: None,
        }
    }

    /// Condensed view for list endpoints.
    pub fn summary(&self) -> ReportSummary {
        ReportSummary {
            job_id: self.job_id,
            name: self.name.clone(),
            status: self.status.clone(),
            overall_score: self.overall_score,
            submitted_at: self.submitted_at,
            completed_at: self.completed_at,
        }
    }
}

/// Condensed report row returned by `List`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    /// Identifier of the job
    pub job_id: JobId,
    /// Submission name
    pub name: String,
    /// Current job state
    pub status: JobState,
    /// Overall score so far
    pub overall_score: f64,
    /// When the job was admitted (Unix epoch seconds)
    pub submitted_at: i64,
    /// When the job reached a terminal state, if it has
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<i64>,
}
