//! Container runtime port.
//!
//! The runtime sandbox talks to the container runtime only through this
//! trait, so production can drive `docker` while tests script the runtime.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::value_objects::ResourceLimits;

/// Everything needed to create one sandbox container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerSpec {
    /// Stable name, also used as the cleanup label
    pub name: String,
    /// Base image from the language profile
    pub image: String,
    /// PID-1 command; the sandbox phases run through `exec`
    pub command: Vec<String>,
    /// Working directory inside the container
    pub workdir: String,
    /// Host path of the read-only workspace mount
    pub workspace_mount: PathBuf,
    /// Environment forwarded into the container; never inherited from the host
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Resource envelope enforced by the runtime
    pub limits: ResourceLimits,
    /// Host path of a generated seccomp profile, when syscall blocking is on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seccomp_profile: Option<PathBuf>,
    /// Labels for orphan cleanup, keyed by label name
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

/// One point-in-time resource sample of a running container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerStats {
    /// Resident set size in bytes
    pub rss_bytes: u64,
    /// CPU utilisation as a percentage of one core
    pub cpu_percent: f64,
    /// Cumulative read operations
    pub io_read_ops: u64,
    /// Cumulative write operations
    pub io_write_ops: u64,
}

/// Captured output of a command executed inside a container.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecOutput {
    /// Exit code of the command
    pub exit_code: i64,
    /// Captured stdout
    pub stdout: String,
    /// Captured stderr
    pub stderr: String,
}

impl ExecOutput {
    /// Whether the command exited zero.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Interface to the container runtime.
///
/// Exactly one container exists per sandbox run; `remove` must be safe to
/// call in every exit path, including after a failed start.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Create and start a container, returning its runtime id.
    async fn create_and_start(&self, spec: &ContainerSpec) -> Result<String>;

    /// Block until the container's main process exits; returns the exit code.
    async fn wait(&self, id: &str) -> Result<i64>;

    /// Sample current resource usage.
    async fn stats(&self, id: &str) -> Result<ContainerStats>;

    /// Run a command inside the container and capture its output.
    async fn exec(&self, id: &str, command: &[String]) -> Result<ExecOutput>;

    /// Combined stdout/stderr of the container's PID 1 so far.
    async fn logs(&self, id: &str) -> Result<String>;

    /// SIGTERM the container, escalating to SIGKILL after `grace`.
    async fn stop(&self, id: &str, grace: Duration) -> Result<()>;

    /// Force-remove the container and its writable layer.
    async fn remove(&self, id: &str) -> Result<()>;

    /// Probe that the runtime daemon is reachable.
    async fn ping(&self) -> Result<()>;
}
