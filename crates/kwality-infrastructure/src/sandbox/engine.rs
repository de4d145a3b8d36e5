//! Runtime sandbox engine (C3).
//!
//! Executes the submission inside one resource-capped container per run.
//! The container's PID 1 is a bounded keepalive; the build and entry
//! commands run through `exec` so their exit codes are observable
//! independently. Monitors consume observation events while the entry runs;
//! the container is removed in every exit path.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use kwality_domain::constants::{
    BASELINE_SCORE, BUILD_FAILURE_SCORE_CAP, RUNTIME_ENGINE_NAME, TIMEOUT_SCORE_CAP,
};
use kwality_domain::entities::{EngineResult, EngineStatus, Finding, Severity};
use kwality_domain::error::{Error, Result};
use kwality_domain::mask_id;
use kwality_domain::ports::{
    ContainerRuntime, ContainerSpec, Engine, EngineContext, ExecOutput,
};
use kwality_domain::registry::{ENGINE_PROVIDERS, EngineProviderEntry, EngineSettings};
use kwality_domain::value_objects::Language;

use crate::sandbox::container::DockerCli;
use crate::sandbox::fuzz;
use crate::sandbox::monitor::{ObservationEvent, PerformanceMonitor, SecurityMonitor, sources};
use crate::sandbox::profile::LanguageProfile;
use crate::sandbox::seccomp;
use crate::sandbox::state::{SandboxState, SandboxStateMachine};

/// Extra lifetime the keepalive PID 1 gets beyond the run deadline.
const KEEPALIVE_SLACK_SECS: u64 = 30;

/// Grace between SIGTERM and SIGKILL when tearing the container down.
const STOP_GRACE: Duration = Duration::from_secs(5);

/// Outcome of one exec phase inside the container.
enum PhaseOutcome {
    Completed(ExecOutput),
    TimedOut,
    Canceled,
}

/// Removes the container unless the run already did.
struct ContainerGuard {
    runtime: Arc<dyn ContainerRuntime>,
    id: String,
    armed: bool,
}

impl ContainerGuard {
    fn new(runtime: Arc<dyn ContainerRuntime>, id: String) -> Self {
        Self {
            runtime,
            id,
            armed: true,
        }
    }

    async fn teardown(mut self) {
        self.armed = false;
        let _ = self.runtime.stop(&self.id, STOP_GRACE).await;
        let _ = self.runtime.remove(&self.id).await;
    }
}

impl Drop for ContainerGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        // Last line of defense if the run path unwound; normal exits go
        // through `teardown`.
        let runtime = Arc::clone(&self.runtime);
        let id = self.id.clone();
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                let _ = runtime.remove(&id).await;
            });
        }
    }
}

/// Containerized runtime validator.
pub struct RuntimeEngine {
    runtime: Arc<dyn ContainerRuntime>,
    settings: EngineSettings,
}

impl RuntimeEngine {
    /// Engine driving the local docker daemon.
    #[must_use]
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            runtime: Arc::new(DockerCli::default()),
            settings,
        }
    }

    /// Engine over an explicit container runtime (tests script this).
    #[must_use]
    pub fn with_runtime(runtime: Arc<dyn ContainerRuntime>, settings: EngineSettings) -> Self {
        Self { runtime, settings }
    }

    async fn exec_phase(
        &self,
        container_id: &str,
        command: &[String],
        deadline: Instant,
        cancel: &CancellationToken,
    ) -> Result<PhaseOutcome> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Ok(PhaseOutcome::TimedOut);
        }
        tokio::select! {
            biased;
            () = cancel.cancelled() => Ok(PhaseOutcome::Canceled),
            result = tokio::time::timeout(remaining, self.runtime.exec(container_id, command)) => {
                match result {
                    Err(_elapsed) => Ok(PhaseOutcome::TimedOut),
                    Ok(Ok(output)) => Ok(PhaseOutcome::Completed(output)),
                    Ok(Err(err)) => Err(err),
                }
            }
        }
    }

    fn metadata_only_result(ctx: &EngineContext, started: Instant) -> EngineResult {
        let mut result = EngineResult::skipped(RUNTIME_ENGINE_NAME);
        result
            .metrics
            .insert("file_count".to_owned(), ctx.workspace.file_count as f64);
        result
            .metrics
            .insert("total_bytes".to_owned(), ctx.workspace.total_bytes as f64);
        result.duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        result
    }
}

fn score_from(findings: &[Finding], build_failed: bool, timed_out: bool) -> f64 {
    let penalty: f64 = findings.iter().map(|f| f64::from(f.severity.weight())).sum();
    let mut score = (BASELINE_SCORE - penalty).max(0.0);
    if build_failed {
        score = score.min(BUILD_FAILURE_SCORE_CAP);
    }
    if timed_out {
        score = score.min(TIMEOUT_SCORE_CAP);
    }
    score
}

#[async_trait]
impl Engine for RuntimeEngine {
    fn name(&self) -> &'static str {
        RUNTIME_ENGINE_NAME
    }

    fn languages_supported(&self) -> &[Language] {
        // Language handling happens through profiles; unknown languages
        // downgrade to a metadata-only pass instead of being skipped by the
        // planner.
        &[]
    }

    async fn run(&self, ctx: &EngineContext) -> Result<EngineResult> {
        let started = Instant::now();

        let language = ctx
            .workspace
            .languages
            .first()
            .copied()
            .unwrap_or(Language::Unknown);
        let Some(profile) = LanguageProfile::for_language(language) else {
            kwality_domain::info!(
                "sandbox",
                "No profile for language, metadata-only pass",
                &language
            );
            return Ok(Self::metadata_only_result(ctx, started));
        };

        self.runtime.ping().await?;

        let mut fsm = SandboxStateMachine::new();
        let mut limits = ctx.limits.clone();
        limits.timeout_secs = limits
            .timeout_secs
            .min(ctx.remaining().as_secs().max(1));
        let run_deadline = (started + Duration::from_secs(limits.timeout_secs)).min(ctx.deadline);

        let seccomp_profile = if self.settings.security.blocked_syscalls.is_empty() {
            None
        } else {
            Some(seccomp::write_profile(
                &ctx.scratch_dir,
                &self.settings.security.blocked_syscalls,
            )?)
        };

        let image = self
            .settings
            .container_image
            .clone()
            .unwrap_or_else(|| profile.image.to_owned());
        let spec = ContainerSpec {
            name: format!("kwality-run-{}", ctx.job_id),
            image,
            command: vec![
                "sh".to_owned(),
                "-c".to_owned(),
                format!("sleep {}", limits.timeout_secs + KEEPALIVE_SLACK_SECS),
            ],
            workdir: "/workspace".to_owned(),
            workspace_mount: ctx.workspace.root.clone(),
            env: profile.container_env(),
            limits: limits.clone(),
            seccomp_profile,
            labels: BTreeMap::from([("kwality.job".to_owned(), ctx.job_id.as_str())]),
        };

        fsm.advance(SandboxState::Building);
        let container_id = self.runtime.create_and_start(&spec).await?;
        let guard = ContainerGuard::new(Arc::clone(&self.runtime), container_id.clone());
        kwality_domain::debug!(
            "sandbox",
            "Container started",
            &format!("job = {}, container = {}", mask_id(&ctx.job_id.as_str()), mask_id(&container_id))
        );

        let mut findings: Vec<Finding> = Vec::new();
        let mut metrics: BTreeMap<String, f64> = BTreeMap::new();
        let mut build_failed = false;
        let mut timed_out = false;

        // Build phase.
        let build_started = Instant::now();
        if let Some(build_command) = profile.build_command() {
            match self
                .exec_phase(&container_id, &build_command, run_deadline, &ctx.cancel)
                .await
            {
                Err(err) => {
                    guard.teardown().await;
                    return Err(err);
                }
                Ok(PhaseOutcome::Canceled) => {
                    fsm.advance(SandboxState::Canceled);
                    guard.teardown().await;
                    return Err(Error::Canceled);
                }
                Ok(PhaseOutcome::TimedOut) => {
                    fsm.advance(SandboxState::TimedOut);
                    timed_out = true;
                    findings.push(Finding::new(
                        Severity::High,
                        "runtime.timeout",
                        "build did not finish before the sandbox deadline",
                    ));
                }
                Ok(PhaseOutcome::Completed(output)) => {
                    if !output.success() {
                        fsm.advance(SandboxState::Failed {
                            phase: "build".to_owned(),
                        });
                        build_failed = true;
                        let stderr: String = output.stderr.chars().take(2000).collect();
                        findings.push(Finding::new(
                            Severity::High,
                            "build",
                            format!("build failed with exit code {}: {stderr}", output.exit_code),
                        ));
                        metrics.insert("build_exit_code".to_owned(), output.exit_code as f64);
                    }
                }
            }
        }
        let build_secs = build_started.elapsed().as_secs_f64();
        metrics.insert("build_secs".to_owned(), build_secs);

        let mut run_secs = 0.0;
        let mut exit_code: Option<i64> = None;

        if !build_failed && !timed_out {
            fsm.advance(SandboxState::Running);

            // Observation channels: samplers push, the fold task consumes.
            let (tx, mut rx) = mpsc::unbounded_channel::<ObservationEvent>();
            let sampler_cancel = CancellationToken::new();
            let samplers = vec![
                sources::spawn_stats_poller(
                    Arc::clone(&self.runtime),
                    container_id.clone(),
                    tx.clone(),
                    sampler_cancel.clone(),
                ),
                sources::spawn_net_sampler(
                    Arc::clone(&self.runtime),
                    container_id.clone(),
                    tx.clone(),
                    sampler_cancel.clone(),
                ),
                sources::spawn_fd_sampler(
                    Arc::clone(&self.runtime),
                    container_id.clone(),
                    tx.clone(),
                    sampler_cancel.clone(),
                ),
                sources::spawn_audit_scanner(tx.clone(), sampler_cancel.clone()),
            ];

            let thresholds = self.settings.performance.clone();
            let policy = self.settings.security.clone();
            let fold = tokio::spawn(async move {
                let mut performance = PerformanceMonitor::new(thresholds);
                let mut security = SecurityMonitor::new(policy);
                while let Some(event) = rx.recv().await {
                    match event {
                        ObservationEvent::Sample(stats) => performance.observe(stats),
                        other => security.observe(&other),
                    }
                }
                (performance, security)
            });

            // Entry phase.
            let entry = profile
                .resolve_entry(&ctx.workspace.root)
                .unwrap_or_default();
            let run_command = profile.run_command(&entry);
            let run_started = Instant::now();
            let run_outcome = self
                .exec_phase(&container_id, &run_command, run_deadline, &ctx.cancel)
                .await;
            run_secs = run_started.elapsed().as_secs_f64();

            fsm.advance(SandboxState::Observing);
            fsm.advance(SandboxState::Draining);

            // Draining: one final sample, then stop the samplers and fold.
            if let Ok(stats) = self.runtime.stats(&container_id).await {
                let _ = tx.send(ObservationEvent::Sample(stats));
            }
            sampler_cancel.cancel();
            for sampler in samplers {
                let _ = sampler.await;
            }
            drop(tx);
            let (performance, security) = fold
                .await
                .map_err(|e| Error::internal(format!("observer task: {e}")))?;

            match run_outcome {
                Err(err) => {
                    guard.teardown().await;
                    return Err(err);
                }
                Ok(PhaseOutcome::Canceled) => {
                    guard.teardown().await;
                    return Err(Error::Canceled);
                }
                Ok(PhaseOutcome::TimedOut) => {
                    timed_out = true;
                    findings.push(Finding::new(
                        Severity::High,
                        "runtime.timeout",
                        "entry process did not finish before the sandbox deadline",
                    ));
                }
                Ok(PhaseOutcome::Completed(output)) => {
                    exit_code = Some(output.exit_code);
                    if !output.success() {
                        let stderr: String = output.stderr.chars().take(2000).collect();
                        findings.push(Finding::new(
                            Severity::Medium,
                            "runtime.exit",
                            format!("entry process exited {}: {stderr}", output.exit_code),
                        ));
                    }
                }
            }

            let (perf_findings, perf_metrics) =
                performance.finalize(build_secs, run_secs, exit_code);
            findings.extend(perf_findings);
            metrics.extend(perf_metrics);
            findings.extend(security.finalize());

            // Optional fuzzing pass, only when the entry ran to completion.
            if self.settings.fuzz.enabled && !timed_out {
                let targets = fuzz::discover_targets(&ctx.workspace.root, language);
                let outcome = fuzz::run_fuzz(
                    &self.runtime,
                    &container_id,
                    &targets,
                    &self.settings.fuzz,
                    &ctx.cancel,
                )
                .await;
                findings.extend(outcome.findings);
                metrics.extend(outcome.metrics);
            }
        }

        guard.teardown().await;

        let status = if timed_out {
            fsm.advance(SandboxState::TimedOut);
            EngineStatus::Timeout
        } else {
            fsm.advance(SandboxState::Finalized);
            EngineStatus::Ok
        };
        kwality_domain::debug!(
            "sandbox",
            "Run finished",
            &format!(
                "job = {}, state = {}, findings = {}",
                mask_id(&ctx.job_id.as_str()),
                fsm.state(),
                findings.len()
            )
        );
        let score = score_from(&findings, build_failed, timed_out);
        metrics.insert("run_secs".to_owned(), run_secs);

        Ok(EngineResult {
            engine: RUNTIME_ENGINE_NAME.to_owned(),
            status,
            score,
            findings,
            metrics,
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        })
    }
}

#[linkme::distributed_slice(ENGINE_PROVIDERS)]
static RUNTIME_ENGINE_PROVIDER_ENTRY: EngineProviderEntry = EngineProviderEntry {
    name: RUNTIME_ENGINE_NAME,
    description: "Containerized runtime execution with performance and security observation",
    build: |settings| Ok(Arc::new(RuntimeEngine::new(settings.clone()))),
};
