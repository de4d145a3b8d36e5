//! Transport-agnostic submission operations (C9).
//!
//! Admission checks run synchronously: schema-level problems, size caps,
//! unknown engines and queue capacity are all reported to the caller with
//! no job created.

use std::sync::Arc;

use chrono::Utc;

use kwality_domain::constants::MAX_PATH_LENGTH;
use kwality_domain::entities::{
    JobState, Report, ReportSummary, SourceSpec, ValidationRequest,
};
use kwality_domain::error::{Error, Result};
use kwality_domain::ports::ReportFilter;
use kwality_domain::value_objects::JobId;

use crate::orchestration::orchestrator::Orchestrator;

/// Size caps applied at admission.
#[derive(Debug, Clone)]
pub struct AdmissionLimits {
    /// Cap on total submitted bytes
    pub max_codebase_bytes: u64,
    /// Cap on submitted file count
    pub max_files: usize,
    /// Cap on a single file's bytes
    pub max_file_bytes: u64,
}

impl Default for AdmissionLimits {
    fn default() -> Self {
        Self {
            max_codebase_bytes: kwality_domain::constants::DEFAULT_MAX_CODEBASE_BYTES,
            max_files: kwality_domain::constants::DEFAULT_MAX_FILES,
            max_file_bytes: kwality_domain::constants::DEFAULT_MAX_FILE_BYTES,
        }
    }
}

/// Receipt returned to the caller on successful admission.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReceipt {
    /// Identifier of the created job
    #[serde(rename = "taskId")]
    pub job_id: JobId,
    /// Always `pending` at admission
    pub status: JobState,
    /// Unix epoch seconds of admission
    pub submitted_at: i64,
}

/// Submission, retrieval and cancellation operations.
pub struct SubmissionService {
    orchestrator: Arc<Orchestrator>,
    limits: AdmissionLimits,
}

impl SubmissionService {
    /// Wire the service to a started orchestrator.
    pub fn new(orchestrator: Arc<Orchestrator>, limits: AdmissionLimits) -> Self {
        Self {
            orchestrator,
            limits,
        }
    }

    /// Validate and admit a request.
    ///
    /// # Errors
    ///
    /// `InvalidRequest` / `SizeLimit` / `InvalidSource` on validation
    /// failure, `QueueFull` at capacity, `Degraded` while the runtime
    /// breaker is open. None of these create a job.
    pub fn submit(&self, request: ValidationRequest) -> Result<SubmitReceipt> {
        self.validate(&request)?;
        let job = self.orchestrator.admit(request)?;
        Ok(SubmitReceipt {
            job_id: job.id,
            status: JobState::Pending,
            submitted_at: job.submitted_at,
        })
    }

    /// Current report for a job.
    ///
    /// # Errors
    ///
    /// `NotFound` when the id is unknown or already evicted.
    pub fn get(&self, id: &JobId) -> Result<Report> {
        self.orchestrator
            .store()
            .get(id)
            .ok_or_else(|| Error::not_found(format!("job {id}")))
    }

    /// Cancel a job.
    ///
    /// # Errors
    ///
    /// `NotFound` for unknown ids, `AlreadyTerminal` when the job already
    /// finished.
    pub fn cancel(&self, id: &JobId) -> Result<()> {
        let report = self.get(id)?;
        if report.status.is_terminal() {
            return Err(Error::AlreadyTerminal {
                job_id: id.as_str(),
            });
        }

        self.orchestrator.cancel(id);

        // A job that never reached a worker is finalized here; running jobs
        // are finalized by their owning worker when the token is observed.
        if report.status == JobState::Pending {
            let mut canceled = report;
            canceled.status = JobState::Canceled;
            canceled.completed_at = Some(Utc::now().timestamp());
            self.orchestrator.store().put(canceled);
        }
        Ok(())
    }

    /// Summaries of known reports.
    pub fn list(&self, filter: &ReportFilter) -> Vec<ReportSummary> {
        self.orchestrator.store().list(filter)
    }

    /// Whether submissions are currently accepted (started and not degraded).
    pub fn is_accepting(&self) -> bool {
        self.orchestrator.is_admitting()
    }

    fn validate(&self, request: &ValidationRequest) -> Result<()> {
        if request.name.trim().is_empty() {
            return Err(Error::invalid_request("name must not be empty"));
        }
        if request.name.len() > 256 {
            return Err(Error::invalid_request("name exceeds 256 characters"));
        }
        if request.config.enabled_engines.is_empty() {
            return Err(Error::invalid_request("enabledEngines must not be empty"));
        }
        for engine in &request.config.enabled_engines {
            if !self.orchestrator.has_engine(engine) {
                return Err(Error::invalid_request(format!(
                    "unknown engine '{engine}', available: {:?}",
                    self.orchestrator.engine_names()
                )));
            }
        }
        if request.config.total_timeout.is_zero() {
            return Err(Error::invalid_request("totalTimeout must be positive"));
        }

        match &request.source {
            SourceSpec::Inline { files } => {
                if files.len() > self.limits.max_files {
                    return Err(Error::size_limit(format!(
                        "{} files exceed the cap of {}",
                        files.len(),
                        self.limits.max_files
                    )));
                }
                let mut total: u64 = 0;
                for file in files {
                    if file.path.is_empty() || file.path.len() > MAX_PATH_LENGTH {
                        return Err(Error::invalid_request(format!(
                            "invalid path length for '{}'",
                            &file.path.chars().take(64).collect::<String>()
                        )));
                    }
                    let bytes = file.content.len() as u64;
                    if bytes > self.limits.max_file_bytes {
                        return Err(Error::size_limit(format!(
                            "file '{}' exceeds the per-file cap of {} bytes",
                            file.path, self.limits.max_file_bytes
                        )));
                    }
                    total += bytes;
                }
                if total > self.limits.max_codebase_bytes {
                    return Err(Error::size_limit(format!(
                        "submission of {total} bytes exceeds the cap of {} bytes",
                        self.limits.max_codebase_bytes
                    )));
                }
            }
            SourceSpec::Git { url, reference, .. } => {
                if url.trim().is_empty() {
                    return Err(Error::invalid_source("git url must not be empty"));
                }
                if reference.len() != 40 || !reference.chars().all(|c| c.is_ascii_hexdigit()) {
                    return Err(Error::invalid_source(
                        "git ref must be a full 40-hex commit SHA",
                    ));
                }
            }
            SourceSpec::Archive { data, .. } => {
                if data.is_empty() {
                    return Err(Error::invalid_source("archive data must not be empty"));
                }
                // base64 expands by 4/3; reject obviously oversized payloads
                // before decoding anything.
                let estimated = (data.len() as u64 / 4) * 3;
                if estimated > self.limits.max_codebase_bytes {
                    return Err(Error::size_limit(format!(
                        "archive of ~{estimated} bytes exceeds the cap of {} bytes",
                        self.limits.max_codebase_bytes
                    )));
                }
            }
        }
        Ok(())
    }
}
