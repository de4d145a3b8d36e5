//! Worker pool: fixed-size set of tasks draining the job queue.
//!
//! Each worker runs one job at a time. Within a job, engines fan out
//! concurrently iff the job's config says so, each under a child
//! cancellation token and a deadline from the execution plan. Engine
//! failures are isolated: a panicking or failing engine becomes an `error`
//! result with a high-severity finding while its siblings continue.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use kwality_domain::constants::RUNTIME_ENGINE_NAME;
use kwality_domain::entities::{
    EngineResult, EngineStatus, Finding, Job, JobState, Report, Severity,
};
use kwality_domain::error::Error;
use kwality_domain::mask_id;
use kwality_domain::ports::{
    Engine, EngineContext, JobEvent, JobEventSink, ReportStore, WorkspaceMaterializer,
};
use kwality_domain::value_objects::ResourceLimits;

use crate::orchestration::health::RuntimeHealth;
use crate::orchestration::orchestrator::JobRegistry;
use crate::orchestration::plan::{ExecutionPlan, PlannedEngine, build_plan};
use crate::orchestration::queue::{JobQueue, QueuedJob};
use crate::use_cases::aggregation::aggregate;

/// Everything a worker needs to run the per-job pipeline.
pub struct WorkerDeps {
    /// Workspace materializer (C1)
    pub materializer: Arc<dyn WorkspaceMaterializer>,
    /// Resolved engines keyed by registry name
    pub engines: BTreeMap<String, Arc<dyn Engine>>,
    /// Report store (C7)
    pub store: Arc<dyn ReportStore>,
    /// Job state change sink
    pub events: Arc<dyn JobEventSink>,
    /// Runtime health breaker
    pub health: Arc<RuntimeHealth>,
    /// Job token registry, shared with the orchestrator
    pub registry: Arc<JobRegistry>,
    /// Default engine resource envelope
    pub default_limits: ResourceLimits,
    /// Grace an engine gets past its deadline before it counts as timed out
    pub grace: Duration,
}

/// Fixed-size pool of workers.
pub struct WorkerPool {
    shutdown: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `size` workers draining `queue`.
    pub fn spawn(size: usize, queue: Arc<JobQueue>, deps: Arc<WorkerDeps>) -> Self {
        let shutdown = CancellationToken::new();
        let handles = (0..size.max(1))
            .map(|index| {
                let queue = Arc::clone(&queue);
                let deps = Arc::clone(&deps);
                let shutdown = shutdown.clone();
                tokio::spawn(worker_loop(index, queue, deps, shutdown))
            })
            .collect();
        Self { shutdown, handles }
    }

    /// Signal workers to stop taking new jobs.
    pub fn trigger_shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Wait for every worker to exit.
    pub async fn join(self) {
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}

async fn worker_loop(
    index: usize,
    queue: Arc<JobQueue>,
    deps: Arc<WorkerDeps>,
    shutdown: CancellationToken,
) {
    kwality_domain::debug!("worker", "Worker started", &index);
    while let Some(queued) = queue.dequeue(&shutdown).await {
        let job_id = queued.job.id;
        let job_name = queued.job.request.name.clone();
        let submitted_at = queued.job.submitted_at;

        // The pipeline runs in its own task: if it faults, the worker
        // survives, marks the job failed and keeps draining the queue.
        let deps_for_job = Arc::clone(&deps);
        let outcome = tokio::spawn(run_job(queued, deps_for_job)).await;
        if let Err(join_error) = outcome {
            kwality_domain::error!(
                "worker",
                "Job pipeline faulted, marking job failed",
                &format!("job = {}, error = {join_error}", mask_id(&job_id.as_str()))
            );
            let mut report = Report::pending(job_id, job_name, submitted_at);
            report.status = JobState::Failed;
            report.completed_at = Some(chrono::Utc::now().timestamp());
            report.findings.push(Finding::new(
                Severity::High,
                "engine.panic",
                format!("job pipeline faulted: {join_error}"),
            ));
            publish(&deps, report);
            deps.registry.remove(&job_id);
        }
    }
    kwality_domain::debug!("worker", "Worker stopped", &index);
}

/// Store a report unless the job already reached a terminal state.
///
/// Terminal reports are immutable; every later `Get` must observe the same
/// bytes.
fn publish(deps: &WorkerDeps, report: Report) {
    if let Some(existing) = deps.store.get(&report.job_id) {
        if existing.status.is_terminal() {
            return;
        }
    }
    let event = JobEvent {
        job_id: report.job_id,
        state: report.status.clone(),
    };
    deps.store.put(report);
    deps.events.publish(event);
}

fn report_for(job: &Job) -> Report {
    let mut report = Report::pending(job.id, job.request.name.clone(), job.submitted_at);
    report.status = job.state.clone();
    report.started_at = job.started_at;
    report.completed_at = job.completed_at;
    report
}

async fn run_job(mut queued: QueuedJob, deps: Arc<WorkerDeps>) {
    let cancel = queued.cancel.clone();
    let job = &mut queued.job;

    if cancel.is_cancelled() {
        // Canceled while still pending: never ran.
        if job.transition_to(JobState::Canceled).is_ok() {
            publish(&deps, report_for(job));
        }
        deps.registry.remove(&job.id);
        return;
    }

    if job.transition_to(JobState::Running).is_err() {
        deps.registry.remove(&job.id);
        return;
    }
    publish(&deps, report_for(job));
    kwality_domain::info!(
        "worker",
        "Job running",
        &mask_id(&job.id.as_str())
    );

    // C1: materialization errors are fatal to the job.
    let workspace = match deps.materializer.materialize(job.id, &job.request).await {
        Ok(ws) => ws,
        Err(err) => {
            fail_job(&deps, job, "materialization", &err);
            return;
        }
    };
    job.workspace = Some(workspace.clone());

    let plan = match build_plan(
        &deps.engines,
        &job.request.config,
        &workspace,
        &deps.default_limits,
    ) {
        Ok(plan) => plan,
        Err(err) => {
            let _ = deps.materializer.destroy(&workspace).await;
            fail_job(&deps, job, "plan", &err);
            return;
        }
    };

    let results = run_engines(&deps, job, &cancel, plan).await;

    let terminal = terminal_state(&cancel, &results);
    if job.transition_to(terminal).is_ok() {
        let report = aggregate(job, results);
        publish(&deps, report);
    }

    if let Err(err) = deps.materializer.destroy(&workspace).await {
        kwality_domain::warn!(
            "worker",
            "Workspace cleanup failed",
            &format!("job = {}, error = {err}", mask_id(&job.id.as_str()))
        );
    }
    deps.registry.remove(&job.id);
}

fn fail_job(deps: &WorkerDeps, job: &mut Job, category: &str, err: &Error) {
    if matches!(err, Error::RuntimeUnavailable { .. }) {
        deps.health.record_failure();
    }
    if job.transition_to(JobState::Failed).is_ok() {
        let mut report = report_for(job);
        report
            .findings
            .push(Finding::new(Severity::High, category, err.to_string()));
        publish(deps, report);
    }
    deps.registry.remove(&job.id);
}

/// Run all planned engines, parallel or sequential per the plan, and key the
/// results by engine name.
async fn run_engines(
    deps: &Arc<WorkerDeps>,
    job: &Job,
    cancel: &CancellationToken,
    plan: ExecutionPlan,
) -> BTreeMap<String, EngineResult> {
    let mut results: BTreeMap<String, EngineResult> = plan
        .skipped
        .into_iter()
        .map(|r| (r.engine.clone(), r))
        .collect();

    let job_deadline = Instant::now() + plan.total_timeout;
    if plan.parallel {
        let futures = plan
            .engines
            .iter()
            .map(|planned| run_engine(deps, job, cancel, planned, job_deadline));
        for result in futures::future::join_all(futures).await {
            results.insert(result.engine.clone(), result);
        }
    } else {
        for planned in &plan.engines {
            if cancel.is_cancelled() || Instant::now() >= job_deadline {
                results.insert(
                    planned.engine.name().to_owned(),
                    EngineResult::skipped(planned.engine.name()),
                );
                continue;
            }
            let result = run_engine(deps, job, cancel, planned, job_deadline).await;
            results.insert(result.engine.clone(), result);
        }
    }
    results
}

/// Run one engine under its deadline and a child cancellation token.
async fn run_engine(
    deps: &Arc<WorkerDeps>,
    job: &Job,
    cancel: &CancellationToken,
    planned: &PlannedEngine,
    job_deadline: Instant,
) -> EngineResult {
    let name = planned.engine.name().to_owned();
    let child = cancel.child_token();
    let started = Instant::now();

    // An engine never outlives the job budget, whatever its own share says.
    let engine_deadline = (started + planned.deadline).min(job_deadline);
    let allowed = engine_deadline
        .saturating_duration_since(started)
        .saturating_add(deps.grace);

    let Some(workspace) = job.workspace.clone() else {
        return EngineResult::errored(
            name.clone(),
            Finding::new(Severity::High, "engine.error", "workspace missing"),
            0,
        );
    };

    let ctx = EngineContext {
        job_id: job.id,
        workspace: Arc::new(workspace),
        scratch_dir: deps.materializer.scratch_dir(job.id, &name),
        cancel: child.clone(),
        deadline: engine_deadline,
        limits: planned.limits.clone(),
    };

    // Spawned so an engine panic is contained as a JoinError.
    let engine = Arc::clone(&planned.engine);
    let handle = tokio::spawn(async move { engine.run(&ctx).await });
    let abort = handle.abort_handle();

    let outcome = tokio::time::timeout(allowed, handle).await;
    let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    match outcome {
        Err(_elapsed) => {
            // Past deadline + grace nothing the engine still does counts.
            child.cancel();
            abort.abort();
            EngineResult {
                engine: name.clone(),
                status: EngineStatus::Timeout,
                score: 0.0,
                findings: vec![Finding::new(
                    Severity::High,
                    "engine.timeout",
                    format!("engine '{name}' exceeded its deadline plus grace"),
                )],
                metrics: BTreeMap::new(),
                duration_ms,
            }
        }
        Ok(Err(join_error)) => EngineResult::errored(
            name.clone(),
            Finding::new(
                Severity::High,
                "engine.panic",
                format!("engine '{name}' panicked: {join_error}"),
            ),
            duration_ms,
        ),
        Ok(Ok(Ok(mut result))) => {
            result.engine = name.clone();
            result.score = result.score.clamp(0.0, 100.0);
            result.duration_ms = duration_ms;
            if name == RUNTIME_ENGINE_NAME && result.status == EngineStatus::Ok {
                deps.health.record_success();
            }
            result
        }
        Ok(Ok(Err(err))) => {
            if matches!(err, Error::RuntimeUnavailable { .. }) {
                deps.health.record_failure();
            }
            match err {
                Error::Canceled => EngineResult::errored(
                    name.clone(),
                    Finding::new(Severity::Info, "engine.canceled", "engine run canceled"),
                    duration_ms,
                ),
                Error::DeadlineExceeded | Error::EngineTimeout { .. } => EngineResult {
                    engine: name.clone(),
                    status: EngineStatus::Timeout,
                    score: 0.0,
                    findings: vec![Finding::new(
                        Severity::High,
                        "engine.timeout",
                        format!("engine '{name}' hit its deadline"),
                    )],
                    metrics: BTreeMap::new(),
                    duration_ms,
                },
                other => EngineResult::errored(
                    name.clone(),
                    Finding::new(
                        Severity::High,
                        "engine.error",
                        format!("engine '{name}' failed: {other}"),
                    ),
                    duration_ms,
                ),
            }
        }
    }
}

/// Derive the terminal job state from cancellation and the engine results.
///
/// The job completes if at least one engine returned ok; if everything
/// failed the job fails, preferring `timeout` when a deadline was the cause.
fn terminal_state(cancel: &CancellationToken, results: &BTreeMap<String, EngineResult>) -> JobState {
    if cancel.is_cancelled() {
        return JobState::Canceled;
    }
    if results.is_empty() {
        return JobState::Failed;
    }
    let any_ok = results
        .values()
        .any(|r| matches!(r.status, EngineStatus::Ok | EngineStatus::Skipped));
    if any_ok {
        return JobState::Completed;
    }
    let any_timeout = results
        .values()
        .any(|r| matches!(r.status, EngineStatus::Timeout));
    if any_timeout {
        JobState::Timeout
    } else {
        JobState::Failed
    }
}
