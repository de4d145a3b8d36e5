//! Typed configuration sections.
//!
//! Every value has a serde default so a missing file still yields a
//! complete config; the environment variables documented in the external
//! contract override file values in [`super::loader`].

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use kwality_domain::constants::{
    DEFAULT_GRACE_MS, DEFAULT_MAX_CODEBASE_BYTES, DEFAULT_MAX_FILE_BYTES, DEFAULT_MAX_FILES,
    DEFAULT_MAX_WORKERS, DEFAULT_QUEUE_SIZE, DEFAULT_RETENTION_SECS,
};
use kwality_domain::value_objects::{FuzzConfig, PerformanceThresholds};

/// HTTP façade settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen port (`KWALITY_PORT`); 0 lets the OS pick
    pub port: u16,
    /// Deployment environment name (`KWALITY_ENV`)
    pub env: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            env: "development".to_owned(),
        }
    }
}

/// Worker pool and queue sizing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Worker pool size (`ORCHESTRATOR_MAX_WORKERS`)
    pub max_workers: usize,
    /// Bounded queue capacity (`ORCHESTRATOR_QUEUE_SIZE`)
    pub queue_size: usize,
    /// Default per-job timeout in minutes (`ORCHESTRATOR_TIMEOUT_MINUTES`)
    pub timeout_minutes: u64,
    /// Grace an engine gets past its deadline, in milliseconds
    pub grace_ms: u64,
    /// Shutdown budget in seconds when none is supplied by the caller
    pub shutdown_budget_secs: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
            queue_size: DEFAULT_QUEUE_SIZE,
            timeout_minutes: kwality_domain::constants::DEFAULT_JOB_TIMEOUT_MINUTES,
            grace_ms: DEFAULT_GRACE_MS,
            shutdown_budget_secs: 30,
        }
    }
}

/// Runtime sandbox settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Base image override (`RUNTIME_CONTAINER_IMAGE`); empty keeps the
    /// per-language profile image
    pub container_image: Option<String>,
    /// Memory cap in MB (`RUNTIME_MEMORY_LIMIT_MB`)
    pub memory_limit_mb: u64,
    /// CPU cap in cores (`RUNTIME_CPU_LIMIT_CORES`)
    pub cpu_limit_cores: f64,
    /// Wall-clock cap in seconds (`RUNTIME_TIMEOUT_SECONDS`)
    pub timeout_seconds: u64,
    /// Whether sandbox runs get no network at all (`RUNTIME_NETWORK_ISOLATION`)
    pub network_isolation: bool,
    /// Pids cap inside the sandbox
    pub pids_limit: u32,
    /// Writable tmpfs scratch size in MB
    pub tmpfs_mb: u64,
    /// Container runtime binary
    pub docker_binary: String,
    /// Fuzzing pass defaults
    pub fuzz: FuzzConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            container_image: None,
            memory_limit_mb: 1024,
            cpu_limit_cores: 1.0,
            timeout_seconds: 300,
            network_isolation: true,
            pids_limit: 256,
            tmpfs_mb: 256,
            docker_binary: "docker".to_owned(),
            fuzz: FuzzConfig::default(),
        }
    }
}

/// Security scanner and observation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Scanner set for the security engine (`SECURITY_ENABLED_SCANNERS`)
    pub enabled_scanners: Vec<String>,
    /// Whether source is scanned for secrets (`SECURITY_SECRETS_DETECTION`)
    pub secrets_detection: bool,
    /// Syscalls denied inside the sandbox
    pub blocked_syscalls: Vec<String>,
    /// Paths whose access inside the sandbox is a finding
    pub sensitive_files: Vec<String>,
    /// Endpoints the network monitor treats as expected
    pub allowed_hosts: Vec<String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        let policy = kwality_domain::value_objects::SecurityPolicy::default();
        Self {
            enabled_scanners: vec![
                "secrets".to_owned(),
                "dangerous_calls".to_owned(),
                "sensitive_paths".to_owned(),
            ],
            secrets_detection: policy.secrets_detection,
            blocked_syscalls: policy.blocked_syscalls,
            sensitive_files: policy.sensitive_files,
            allowed_hosts: policy.allowed_hosts,
        }
    }
}

impl SecurityConfig {
    /// Collapse into the domain security policy.
    pub fn to_policy(&self) -> kwality_domain::value_objects::SecurityPolicy {
        kwality_domain::value_objects::SecurityPolicy {
            blocked_syscalls: self.blocked_syscalls.clone(),
            sensitive_files: self.sensitive_files.clone(),
            allowed_hosts: self.allowed_hosts.clone(),
            secrets_detection: self.secrets_detection,
        }
    }
}

/// Submission size caps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Cap on total materialized bytes
    pub max_codebase_bytes: u64,
    /// Cap on materialized file count
    pub max_files: usize,
    /// Cap on a single file's bytes
    pub max_file_bytes: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_codebase_bytes: DEFAULT_MAX_CODEBASE_BYTES,
            max_files: DEFAULT_MAX_FILES,
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Minimum level (`LOG_LEVEL`): trace, debug, info, warn, error
    pub level: String,
    /// Output format (`LOG_FORMAT`): `json` or `pretty`
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "json".to_owned(),
        }
    }
}

/// Workspace layout on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Root under which `ws/<jobId>` and `scratch/<jobId>/<engine>` live
    pub work_dir: PathBuf,
    /// Seconds a terminal report (and retained workspace) is kept
    pub retention_secs: u64,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            work_dir: std::env::temp_dir().join("kwality"),
            retention_secs: DEFAULT_RETENTION_SECS,
        }
    }
}

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP façade
    pub server: ServerConfig,
    /// Pool and queue sizing
    pub orchestrator: OrchestratorConfig,
    /// Runtime sandbox
    pub runtime: RuntimeConfig,
    /// Security scanners and observation policy
    pub security: SecurityConfig,
    /// Submission size caps
    pub limits: LimitsConfig,
    /// Performance observation thresholds
    pub performance: PerformanceThresholds,
    /// Logging
    pub logging: LoggingConfig,
    /// Workspace layout
    pub workspace: WorkspaceConfig,
}
