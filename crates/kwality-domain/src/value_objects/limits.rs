//! Resource envelope, observation thresholds and security policy for
//! sandboxed execution.

use serde::{Deserialize, Serialize};

/// Network mode applied to a sandbox run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum NetworkPolicy {
    /// No network interface at all (the default).
    None,
    /// Egress limited to a pinned set of `host:port` entries.
    Allowlist {
        /// Permitted remote endpoints
        hosts: Vec<String>,
    },
}

impl Default for NetworkPolicy {
    fn default() -> Self {
        Self::None
    }
}

impl NetworkPolicy {
    /// Whether the given remote endpoint is permitted under this policy.
    pub fn permits(&self, endpoint: &str) -> bool {
        match self {
            Self::None => false,
            Self::Allowlist { hosts } => hosts.iter().any(|h| h == endpoint),
        }
    }

    /// Whether the run gets a network interface at all.
    pub fn is_isolated(&self) -> bool {
        matches!(self, Self::None)
    }
}

/// Resource envelope for one sandbox run or engine execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// Maximum memory in MB (default: 1024).
    #[serde(default = "default_memory_mb")]
    pub memory_mb: u64,
    /// Maximum CPU cores, 1.0 = one core (default: 1.0).
    #[serde(default = "default_cpu_cores")]
    pub cpu_cores: f64,
    /// Wall-clock timeout in seconds (default: 300).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Maximum number of pids inside the sandbox (default: 256).
    #[serde(default = "default_pids_limit")]
    pub pids_limit: u32,
    /// Size of the writable tmpfs scratch mount in MB (default: 256).
    #[serde(default = "default_tmpfs_mb")]
    pub tmpfs_mb: u64,
    /// Network mode (default: none).
    #[serde(default)]
    pub network: NetworkPolicy,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            memory_mb: default_memory_mb(),
            cpu_cores: default_cpu_cores(),
            timeout_secs: default_timeout_secs(),
            pids_limit: default_pids_limit(),
            tmpfs_mb: default_tmpfs_mb(),
            network: NetworkPolicy::None,
        }
    }
}

fn default_memory_mb() -> u64 {
    1024
}

fn default_cpu_cores() -> f64 {
    1.0
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_pids_limit() -> u32 {
    256
}

fn default_tmpfs_mb() -> u64 {
    256
}

/// Thresholds above which the performance monitor emits findings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceThresholds {
    /// Maximum resident set size in MB.
    #[serde(default = "default_max_rss_mb")]
    pub max_rss_mb: u64,
    /// Maximum CPU utilisation as a percentage of one core.
    #[serde(default = "default_max_cpu_percent")]
    pub max_cpu_percent: f64,
    /// Maximum IO operations per second.
    #[serde(default = "default_max_io_ops")]
    pub max_io_ops_per_sec: u64,
    /// Maximum build wall time in seconds.
    #[serde(default = "default_max_build_secs")]
    pub max_build_secs: u64,
    /// Maximum run wall time in seconds.
    #[serde(default = "default_max_run_secs")]
    pub max_run_secs: u64,
}

impl Default for PerformanceThresholds {
    fn default() -> Self {
        Self {
            max_rss_mb: default_max_rss_mb(),
            max_cpu_percent: default_max_cpu_percent(),
            max_io_ops_per_sec: default_max_io_ops(),
            max_build_secs: default_max_build_secs(),
            max_run_secs: default_max_run_secs(),
        }
    }
}

fn default_max_rss_mb() -> u64 {
    768
}

fn default_max_cpu_percent() -> f64 {
    95.0
}

fn default_max_io_ops() -> u64 {
    10_000
}

fn default_max_build_secs() -> u64 {
    180
}

fn default_max_run_secs() -> u64 {
    120
}

/// Security observation policy for a sandbox run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityPolicy {
    /// Syscalls denied by the generated seccomp profile; attempts are findings.
    #[serde(default = "default_blocked_syscalls")]
    pub blocked_syscalls: Vec<String>,
    /// Paths whose access inside the sandbox is a finding.
    #[serde(default = "default_sensitive_files")]
    pub sensitive_files: Vec<String>,
    /// Endpoints the network monitor treats as expected.
    #[serde(default)]
    pub allowed_hosts: Vec<String>,
    /// Whether the security engine scans sources for embedded secrets.
    #[serde(default = "default_true")]
    pub secrets_detection: bool,
}

impl Default for SecurityPolicy {
    fn default() -> Self {
        Self {
            blocked_syscalls: default_blocked_syscalls(),
            sensitive_files: default_sensitive_files(),
            allowed_hosts: Vec::new(),
            secrets_detection: true,
        }
    }
}

fn default_blocked_syscalls() -> Vec<String> {
    ["ptrace", "mount", "umount2", "reboot", "init_module", "kexec_load"]
        .iter()
        .map(|s| (*s).to_owned())
        .collect()
}

fn default_sensitive_files() -> Vec<String> {
    [
        "/etc/passwd",
        "/etc/shadow",
        "/etc/sudoers",
        "/root/.ssh",
        "/proc/self/environ",
    ]
    .iter()
    .map(|s| (*s).to_owned())
    .collect()
}

fn default_true() -> bool {
    true
}

impl SecurityPolicy {
    /// Whether a remote endpoint is on the expected-hosts list.
    pub fn permits_endpoint(&self, endpoint: &str) -> bool {
        self.allowed_hosts.iter().any(|h| h == endpoint)
    }
}

/// Optional fuzzing pass configuration for the runtime sandbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuzzConfig {
    /// Whether fuzzing runs at all (default: off).
    #[serde(default)]
    pub enabled: bool,
    /// Wall-clock budget for the fuzzing pass, in seconds.
    #[serde(default = "default_fuzz_duration")]
    pub duration_secs: u64,
    /// Maximum iterations across all entry points.
    #[serde(default = "default_fuzz_iterations")]
    pub iterations: u32,
    /// Cap on saved crashing inputs, in KB.
    #[serde(default = "default_evidence_cap")]
    pub evidence_cap_kb: usize,
}

impl Default for FuzzConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            duration_secs: default_fuzz_duration(),
            iterations: default_fuzz_iterations(),
            evidence_cap_kb: default_evidence_cap(),
        }
    }
}

fn default_fuzz_duration() -> u64 {
    30
}

fn default_fuzz_iterations() -> u32 {
    200
}

fn default_evidence_cap() -> usize {
    crate::constants::DEFAULT_EVIDENCE_CAP_KB
}
