//! Orchestrator lifecycle (C8).
//!
//! Owns the resolved engine set, the queue, the worker pool and the job
//! token registry. Startup order is registry → store → queue → pool;
//! shutdown tears down in reverse, bounded by a caller-supplied budget.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use kwality_domain::entities::{Job, JobState, Report, ValidationRequest};
use kwality_domain::error::{Error, Result};
use kwality_domain::mask_id;
use kwality_domain::ports::{
    Engine, JobEvent, JobEventSink, ReportFilter, ReportStore, WorkspaceMaterializer,
};
use kwality_domain::value_objects::{JobId, ResourceLimits};

use crate::orchestration::health::RuntimeHealth;
use crate::orchestration::queue::{JobQueue, QueuedJob};
use crate::orchestration::worker_pool::{WorkerDeps, WorkerPool};

/// Cancellation handle for one in-flight job.
#[derive(Debug, Clone)]
pub struct JobHandle {
    /// Job-scoped cancellation token
    pub cancel: CancellationToken,
    /// Latest instant by which the job can still finish on its own
    pub not_after: Instant,
}

/// Tokens of all jobs that are pending or running.
///
/// Registered at admission, removed by the owning worker when the job
/// reaches a terminal state.
#[derive(Default)]
pub struct JobRegistry {
    inner: Mutex<HashMap<JobId, JobHandle>>,
}

impl JobRegistry {
    /// Register a job's handle at admission time.
    pub fn register(&self, id: JobId, handle: JobHandle) {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, handle);
    }

    /// Cancel one job's token. Returns whether the job was known.
    pub fn cancel(&self, id: &JobId) -> bool {
        let guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        match guard.get(id) {
            Some(handle) => {
                handle.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Drop a job's handle once it is terminal.
    pub fn remove(&self, id: &JobId) {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(id);
    }

    /// Cancel every job that cannot finish by `deadline`. Returns how many
    /// were canceled.
    pub fn cancel_not_completable_by(&self, deadline: Instant) -> usize {
        let guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let mut canceled = 0;
        for handle in guard.values() {
            if handle.not_after > deadline {
                handle.cancel.cancel();
                canceled += 1;
            }
        }
        canceled
    }

    /// Cancel every registered job.
    pub fn cancel_all(&self) {
        let guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        for handle in guard.values() {
            handle.cancel.cancel();
        }
    }

    /// Number of non-terminal jobs.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether no job is in flight.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Sizing and timing knobs for the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Worker pool size
    pub max_workers: usize,
    /// Bounded queue capacity
    pub queue_size: usize,
    /// Engine grace past its deadline
    pub grace: Duration,
    /// Default engine resource envelope
    pub default_limits: ResourceLimits,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            max_workers: kwality_domain::constants::DEFAULT_MAX_WORKERS,
            queue_size: kwality_domain::constants::DEFAULT_QUEUE_SIZE,
            grace: Duration::from_millis(kwality_domain::constants::DEFAULT_GRACE_MS),
            default_limits: ResourceLimits::default(),
        }
    }
}

/// Lifecycle owner for queue, pool, engines and store.
pub struct Orchestrator {
    settings: OrchestratorSettings,
    engines: BTreeMap<String, Arc<dyn Engine>>,
    materializer: Arc<dyn WorkspaceMaterializer>,
    store: Arc<dyn ReportStore>,
    events: Arc<dyn JobEventSink>,
    health: Arc<RuntimeHealth>,
    registry: Arc<JobRegistry>,
    queue: Arc<JobQueue>,
    pool: Mutex<Option<WorkerPool>>,
    admitting: AtomicBool,
}

impl Orchestrator {
    /// Assemble an orchestrator. Engines are fixed from here on.
    pub fn new(
        settings: OrchestratorSettings,
        engines: BTreeMap<String, Arc<dyn Engine>>,
        materializer: Arc<dyn WorkspaceMaterializer>,
        store: Arc<dyn ReportStore>,
        events: Arc<dyn JobEventSink>,
    ) -> Self {
        let queue = Arc::new(JobQueue::new(settings.queue_size));
        Self {
            settings,
            engines,
            materializer,
            store,
            events,
            health: Arc::new(RuntimeHealth::new()),
            registry: Arc::new(JobRegistry::default()),
            queue,
            pool: Mutex::new(None),
            admitting: AtomicBool::new(false),
        }
    }

    /// Spawn the worker pool and open admissions.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if called twice without an intervening `stop`.
    pub fn start(&self) -> Result<()> {
        let mut pool = self.pool.lock().unwrap_or_else(|e| e.into_inner());
        if pool.is_some() {
            return Err(Error::internal("orchestrator already started"));
        }
        let deps = Arc::new(WorkerDeps {
            materializer: Arc::clone(&self.materializer),
            engines: self.engines.clone(),
            store: Arc::clone(&self.store),
            events: Arc::clone(&self.events),
            health: Arc::clone(&self.health),
            registry: Arc::clone(&self.registry),
            default_limits: self.settings.default_limits.clone(),
            grace: self.settings.grace,
        });
        *pool = Some(WorkerPool::spawn(
            self.settings.max_workers,
            Arc::clone(&self.queue),
            deps,
        ));
        self.admitting.store(true, Ordering::SeqCst);
        kwality_domain::info!(
            "orchestrator",
            "Started",
            &format!(
                "workers = {}, queue = {}",
                self.settings.max_workers, self.settings.queue_size
            )
        );
        Ok(())
    }

    /// Graceful drain bounded by `budget`.
    ///
    /// Stops admitting, cancels jobs whose own deadline would overrun the
    /// budget, waits for the rest, then force-cancels whatever is left and
    /// tears the pool down.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the orchestrator was never started.
    pub async fn stop(&self, budget: Duration) -> Result<()> {
        self.admitting.store(false, Ordering::SeqCst);
        let deadline = Instant::now() + budget;

        let preempted = self.registry.cancel_not_completable_by(deadline);
        if preempted > 0 {
            kwality_domain::info!(
                "orchestrator",
                "Preemptively canceled jobs for shutdown",
                &preempted
            );
        }

        // Wait for in-flight and queued jobs to drain, bounded by the budget.
        while !self.registry.is_empty() && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        if !self.registry.is_empty() {
            kwality_domain::warn!(
                "orchestrator",
                "Shutdown budget expired, force-canceling remaining jobs",
                &self.registry.len()
            );
            self.registry.cancel_all();
        }

        let pool = {
            let mut guard = self.pool.lock().unwrap_or_else(|e| e.into_inner());
            guard.take()
        };
        let Some(pool) = pool else {
            return Err(Error::internal("orchestrator not started"));
        };
        pool.trigger_shutdown();

        // Workers exit after finishing their current (possibly just-canceled)
        // job; engines honor their tokens within the grace period.
        let join_budget = deadline
            .saturating_duration_since(Instant::now())
            .max(self.settings.grace)
            .saturating_add(self.settings.grace);
        let _ = tokio::time::timeout(join_budget, pool.join()).await;

        // Jobs the drain never reached still need a terminal record.
        for summary in self.store.list(&ReportFilter::default()) {
            if summary.status.is_terminal() {
                continue;
            }
            if let Some(mut report) = self.store.get(&summary.job_id) {
                if !report.status.is_terminal() {
                    report.status = JobState::Canceled;
                    report.completed_at = Some(chrono::Utc::now().timestamp());
                    self.store.put(report);
                }
            }
        }

        kwality_domain::info!("orchestrator", "Stopped");
        Ok(())
    }

    /// Admit a validated request: create the job, store its pending report,
    /// and enqueue it.
    ///
    /// # Errors
    ///
    /// `Degraded` while the runtime breaker is open, `QueueFull` at
    /// capacity, `Internal` when not started.
    pub fn admit(&self, request: ValidationRequest) -> Result<Job> {
        if !self.admitting.load(Ordering::SeqCst) {
            return Err(Error::internal("orchestrator is not accepting jobs"));
        }
        if self.health.is_degraded() {
            return Err(Error::Degraded {
                message: "container runtime unavailable, admissions paused".to_owned(),
            });
        }

        let total_timeout = request.config.total_timeout;
        let job = Job::new(request);
        let cancel = CancellationToken::new();

        self.store.put(Report::pending(
            job.id,
            job.request.name.clone(),
            job.submitted_at,
        ));
        self.registry.register(
            job.id,
            JobHandle {
                cancel: cancel.clone(),
                not_after: Instant::now() + total_timeout,
            },
        );

        match self.queue.try_enqueue(QueuedJob {
            job: job.clone(),
            cancel,
        }) {
            Ok(()) => {
                self.events.publish(JobEvent {
                    job_id: job.id,
                    state: JobState::Pending,
                });
                kwality_domain::info!("orchestrator", "Job admitted", &mask_id(&job.id.as_str()));
                Ok(job)
            }
            Err(err) => {
                self.registry.remove(&job.id);
                self.store.remove(&job.id);
                Err(err)
            }
        }
    }

    /// Cancel a job's token. The owning worker performs the state change.
    pub fn cancel(&self, id: &JobId) -> bool {
        self.registry.cancel(id)
    }

    /// Names of all registered engines.
    pub fn engine_names(&self) -> Vec<String> {
        self.engines.keys().cloned().collect()
    }

    /// Whether an engine name is registered.
    pub fn has_engine(&self, name: &str) -> bool {
        self.engines.contains_key(name)
    }

    /// The report store.
    pub fn store(&self) -> &Arc<dyn ReportStore> {
        &self.store
    }

    /// The runtime health breaker.
    pub fn health(&self) -> &Arc<RuntimeHealth> {
        &self.health
    }

    /// Whether admissions are currently open.
    pub fn is_admitting(&self) -> bool {
        self.admitting.load(Ordering::SeqCst) && !self.health.is_degraded()
    }
}
