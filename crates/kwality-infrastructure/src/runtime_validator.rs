//! Request/result facade for the `runtime-validator` binary.
//!
//! The binary is handed an already-materialized workspace directory plus an
//! envelope, runs the sandbox engine over it once, and writes the
//! `EngineResult` as JSON. Exit codes follow the binary contract:
//! 0 success, 2 invalid input, 3 sandbox failure, 4 timeout, 5 internal.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use kwality_domain::entities::{EngineResult, Workspace};
use kwality_domain::error::{Error, Result};
use kwality_domain::ports::Engine;
use kwality_domain::registry::EngineSettings;
use kwality_domain::value_objects::{
    FuzzConfig, JobId, Language, PerformanceThresholds, ResourceLimits, SecurityPolicy,
};

use crate::sandbox::container::DockerCli;
use crate::sandbox::engine::RuntimeEngine;

/// Input file for one standalone validation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatorRequest {
    /// Path to a materialized workspace directory
    pub workspace: PathBuf,
    /// Resource envelope
    #[serde(default)]
    pub limits: ResourceLimits,
    /// Performance thresholds
    #[serde(default)]
    pub performance: PerformanceThresholds,
    /// Security policy
    #[serde(default)]
    pub security: SecurityPolicy,
    /// Fuzzing configuration
    #[serde(default)]
    pub fuzz: FuzzConfig,
    /// Base image override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_image: Option<String>,
}

/// Quick extension census over an existing directory.
fn detect_languages(root: &std::path::Path) -> Vec<Language> {
    let mut census: HashMap<Language, usize> = HashMap::new();
    for entry in walkdir::WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_file())
    {
        if let Some(ext) = entry.path().extension().and_then(|x| x.to_str()) {
            let language = Language::from_extension(ext);
            if language != Language::Unknown {
                *census.entry(language).or_insert(0) += 1;
            }
        }
    }
    let mut ranked: Vec<(Language, usize)> = census.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.to_string().cmp(&b.0.to_string())));
    ranked.into_iter().map(|(l, _)| l).collect()
}

/// Run the sandbox engine once over the request's workspace.
///
/// # Errors
///
/// `InvalidRequest` when the workspace directory does not exist, otherwise
/// whatever the sandbox surfaces.
pub async fn run(request: &ValidatorRequest) -> Result<EngineResult> {
    if !request.workspace.is_dir() {
        return Err(Error::invalid_request(format!(
            "workspace '{}' is not a directory",
            request.workspace.display()
        )));
    }
    let root = request
        .workspace
        .canonicalize()
        .map_err(|e| Error::invalid_request(format!("workspace not resolvable: {e}")))?;

    let languages = detect_languages(&root);
    let job_id = JobId::new();
    let scratch_dir = std::env::temp_dir()
        .join("kwality-validator")
        .join(job_id.as_str());
    std::fs::create_dir_all(&scratch_dir)?;

    let workspace = Workspace {
        root,
        fingerprint: String::new(),
        file_count: 0,
        total_bytes: 0,
        languages,
        retain: true,
    };

    let settings = EngineSettings {
        limits: request.limits.clone(),
        performance: request.performance.clone(),
        security: request.security.clone(),
        security_scanners: Vec::new(),
        fuzz: request.fuzz.clone(),
        container_image: request.container_image.clone(),
        work_dir: scratch_dir.clone(),
    };
    let engine = RuntimeEngine::new(settings);

    let ctx = kwality_domain::ports::EngineContext {
        job_id,
        workspace: Arc::new(workspace),
        scratch_dir: scratch_dir.clone(),
        cancel: CancellationToken::new(),
        deadline: Instant::now() + Duration::from_secs(request.limits.timeout_secs),
        limits: request.limits.clone(),
    };

    let result = engine.run(&ctx).await;
    let _ = std::fs::remove_dir_all(&scratch_dir);
    result
}

/// Probe the container runtime.
///
/// # Errors
///
/// `RuntimeUnavailable` when the daemon cannot be reached.
pub async fn health_check() -> Result<()> {
    use kwality_domain::ports::ContainerRuntime;
    DockerCli::default().ping().await
}

/// Map an error onto the binary's exit code contract.
pub fn exit_code_for(err: &Error) -> i32 {
    match err {
        Error::InvalidRequest { .. }
        | Error::InvalidSource { .. }
        | Error::Json { .. }
        | Error::SizeLimit { .. }
        | Error::PathEscape { .. } => 2,
        Error::ContainerStart { .. }
        | Error::RuntimeUnavailable { .. }
        | Error::ResourceLimit { .. }
        | Error::BuildFailed { .. } => 3,
        Error::DeadlineExceeded | Error::EngineTimeout { .. } => 4,
        Error::IoSimple { .. }
        | Error::Io { .. }
        | Error::Materialization { .. }
        | Error::EngineFailed { .. }
        | Error::EnginePanic { .. }
        | Error::Canceled
        | Error::NotFound { .. }
        | Error::AlreadyTerminal { .. }
        | Error::Degraded { .. }
        | Error::QueueFull
        | Error::Configuration { .. }
        | Error::ConfigMissing(_)
        | Error::ConfigInvalid { .. }
        | Error::Internal { .. } => 5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_parses_with_defaults() {
        let request: ValidatorRequest =
            serde_json::from_str(r#"{"workspace": "/tmp/ws"}"#).expect("parses");
        assert_eq!(request.limits.memory_mb, 1024);
        assert!(request.security.blocked_syscalls.iter().any(|s| s == "ptrace"));
        assert!(!request.fuzz.enabled);
    }

    #[test]
    fn exit_codes_follow_the_contract() {
        assert_eq!(exit_code_for(&Error::invalid_request("x")), 2);
        assert_eq!(exit_code_for(&Error::runtime_unavailable("x")), 3);
        assert_eq!(exit_code_for(&Error::DeadlineExceeded), 4);
        assert_eq!(exit_code_for(&Error::internal("x")), 5);
    }

    #[tokio::test]
    async fn missing_workspace_is_invalid_input() {
        let request = ValidatorRequest {
            workspace: PathBuf::from("/definitely/not/here"),
            limits: ResourceLimits::default(),
            performance: PerformanceThresholds::default(),
            security: SecurityPolicy::default(),
            fuzz: FuzzConfig::default(),
            container_image: None,
        };
        let err = run(&request).await.expect_err("rejected");
        assert_eq!(exit_code_for(&err), 2);
    }
}
