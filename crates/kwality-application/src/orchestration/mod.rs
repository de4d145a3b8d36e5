//! Orchestration: queue, plan, workers, runtime health and lifecycle.

/// Runtime health breaker (degraded mode)
pub mod health;
/// Orchestrator lifecycle
pub mod orchestrator;
/// Execution plan construction
pub mod plan;
/// Bounded job queue
pub mod queue;
/// Worker pool and per-job pipeline
pub mod worker_pool;

pub use health::RuntimeHealth;
pub use orchestrator::{Orchestrator, OrchestratorSettings};
pub use plan::{ExecutionPlan, PlannedEngine, build_plan};
pub use queue::{JobQueue, QueuedJob};
pub use worker_pool::{WorkerDeps, WorkerPool};
