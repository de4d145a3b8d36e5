//! Docker CLI container runtime.
//!
//! Drives the `docker` binary through `tokio::process`. The resource
//! envelope maps directly onto run flags; `docker stop -t` gives the
//! SIGTERM-then-SIGKILL escalation the cancellation contract requires.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use kwality_domain::error::{Error, Result};
use kwality_domain::ports::{ContainerRuntime, ContainerSpec, ContainerStats, ExecOutput};

/// Container runtime backed by the `docker` CLI.
pub struct DockerCli {
    binary: String,
}

/// One line of `docker stats --no-stream --format json`.
#[derive(Debug, Deserialize)]
struct DockerStatsLine {
    #[serde(rename = "MemUsage", default)]
    mem_usage: String,
    #[serde(rename = "CPUPerc", default)]
    cpu_perc: String,
}

impl DockerCli {
    /// Use the given docker binary (usually just `docker`).
    #[must_use]
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    async fn run_docker(&self, args: &[String]) -> Result<ExecOutput> {
        let output = tokio::process::Command::new(&self.binary)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                Error::runtime_unavailable(format!("cannot execute {}: {e}", self.binary))
            })?;
        Ok(ExecOutput {
            exit_code: i64::from(output.status.code().unwrap_or(-1)),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    fn map_failure(action: &str, output: &ExecOutput) -> Error {
        if output.stderr.contains("Cannot connect to the Docker daemon")
            || output.stderr.contains("docker daemon is not running")
        {
            Error::runtime_unavailable(output.stderr.trim().to_owned())
        } else {
            Error::container_start(format!("docker {action} failed: {}", output.stderr.trim()))
        }
    }

    fn run_args(spec: &ContainerSpec) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "run".into(),
            "-d".into(),
            "--name".into(),
            spec.name.clone(),
            "--memory".into(),
            format!("{}m", spec.limits.memory_mb),
            "--cpus".into(),
            format!("{}", spec.limits.cpu_cores),
            "--pids-limit".into(),
            spec.limits.pids_limit.to_string(),
            "--read-only".into(),
            "--tmpfs".into(),
            format!("/scratch:rw,size={}m", spec.limits.tmpfs_mb),
            "--cap-drop".into(),
            "ALL".into(),
            "--security-opt".into(),
            "no-new-privileges".into(),
            "--workdir".into(),
            spec.workdir.clone(),
            "-v".into(),
            format!("{}:/workspace:ro", spec.workspace_mount.display()),
        ];
        if spec.limits.network.is_isolated() {
            args.push("--network".into());
            args.push("none".into());
        }
        if let Some(profile) = &spec.seccomp_profile {
            args.push("--security-opt".into());
            args.push(format!("seccomp={}", profile.display()));
        }
        for (key, value) in &spec.labels {
            args.push("--label".into());
            args.push(format!("{key}={value}"));
        }
        // Only the profile's pinned environment crosses the boundary.
        for (key, value) in &spec.env {
            args.push("--env".into());
            args.push(format!("{key}={value}"));
        }
        args.push(spec.image.clone());
        args.extend(spec.command.iter().cloned());
        args
    }
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new("docker")
    }
}

/// Parse docker's human sizes ("12.34MiB", "1.2GiB", "512KiB", "90B").
fn parse_mem_bytes(raw: &str) -> u64 {
    let value = raw.trim();
    let (number, multiplier) = if let Some(n) = value.strip_suffix("GiB") {
        (n, 1024.0 * 1024.0 * 1024.0)
    } else if let Some(n) = value.strip_suffix("MiB") {
        (n, 1024.0 * 1024.0)
    } else if let Some(n) = value.strip_suffix("KiB") {
        (n, 1024.0)
    } else if let Some(n) = value.strip_suffix('B') {
        (n, 1.0)
    } else {
        (value, 1.0)
    };
    (number.trim().parse::<f64>().unwrap_or(0.0) * multiplier) as u64
}

/// Parse "12.34%" into 12.34.
fn parse_percent(raw: &str) -> f64 {
    raw.trim()
        .trim_end_matches('%')
        .parse::<f64>()
        .unwrap_or(0.0)
}

/// Parse a cgroup v2 `io.stat` dump into cumulative (read, write) ops.
fn parse_io_stat(raw: &str) -> (u64, u64) {
    let mut rios = 0;
    let mut wios = 0;
    for line in raw.lines() {
        for field in line.split_whitespace() {
            if let Some(v) = field.strip_prefix("rios=") {
                rios += v.parse::<u64>().unwrap_or(0);
            } else if let Some(v) = field.strip_prefix("wios=") {
                wios += v.parse::<u64>().unwrap_or(0);
            }
        }
    }
    (rios, wios)
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    async fn create_and_start(&self, spec: &ContainerSpec) -> Result<String> {
        let args = Self::run_args(spec);
        let output = self.run_docker(&args).await?;
        if !output.success() {
            return Err(Self::map_failure("run", &output));
        }
        let id = output.stdout.trim().to_owned();
        if id.is_empty() {
            return Err(Error::container_start("docker run returned no container id"));
        }
        Ok(id)
    }

    async fn wait(&self, id: &str) -> Result<i64> {
        let output = self
            .run_docker(&["wait".to_owned(), id.to_owned()])
            .await?;
        if !output.success() {
            return Err(Self::map_failure("wait", &output));
        }
        output
            .stdout
            .trim()
            .parse::<i64>()
            .map_err(|e| Error::internal(format!("unparseable docker wait output: {e}")))
    }

    async fn stats(&self, id: &str) -> Result<ContainerStats> {
        let output = self
            .run_docker(&[
                "stats".to_owned(),
                "--no-stream".to_owned(),
                "--format".to_owned(),
                "{{json .}}".to_owned(),
                id.to_owned(),
            ])
            .await?;
        if !output.success() {
            return Err(Self::map_failure("stats", &output));
        }
        let line: DockerStatsLine = serde_json::from_str(output.stdout.trim())
            .map_err(|e| Error::internal(format!("unparseable docker stats: {e}")))?;

        let rss_bytes = line
            .mem_usage
            .split('/')
            .next()
            .map(parse_mem_bytes)
            .unwrap_or(0);

        // Block io counters come from the container's cgroup; absent on
        // cgroup v1 hosts, in which case they stay zero.
        let (io_read_ops, io_write_ops) = {
            let path = format!("/sys/fs/cgroup/system.slice/docker-{id}.scope/io.stat");
            match tokio::fs::read_to_string(&path).await {
                Ok(content) => parse_io_stat(&content),
                Err(_) => (0, 0),
            }
        };

        Ok(ContainerStats {
            rss_bytes,
            cpu_percent: parse_percent(&line.cpu_perc),
            io_read_ops,
            io_write_ops,
        })
    }

    async fn exec(&self, id: &str, command: &[String]) -> Result<ExecOutput> {
        let mut args = vec!["exec".to_owned(), id.to_owned()];
        args.extend(command.iter().cloned());
        self.run_docker(&args).await
    }

    async fn logs(&self, id: &str) -> Result<String> {
        let output = self
            .run_docker(&["logs".to_owned(), id.to_owned()])
            .await?;
        Ok(format!("{}{}", output.stdout, output.stderr))
    }

    async fn stop(&self, id: &str, grace: Duration) -> Result<()> {
        let output = self
            .run_docker(&[
                "stop".to_owned(),
                "-t".to_owned(),
                grace.as_secs().max(1).to_string(),
                id.to_owned(),
            ])
            .await?;
        if output.success() || output.stderr.contains("No such container") {
            Ok(())
        } else {
            Err(Self::map_failure("stop", &output))
        }
    }

    async fn remove(&self, id: &str) -> Result<()> {
        let output = self
            .run_docker(&["rm".to_owned(), "-f".to_owned(), id.to_owned()])
            .await?;
        if output.success() || output.stderr.contains("No such container") {
            Ok(())
        } else {
            Err(Self::map_failure("rm", &output))
        }
    }

    async fn ping(&self) -> Result<()> {
        let output = self
            .run_docker(&[
                "info".to_owned(),
                "--format".to_owned(),
                "{{.ServerVersion}}".to_owned(),
            ])
            .await?;
        if output.success() {
            Ok(())
        } else {
            Err(Error::runtime_unavailable(output.stderr.trim().to_owned()))
        }
    }
}
