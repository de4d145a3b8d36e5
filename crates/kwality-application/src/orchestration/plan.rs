//! Execution plan construction.
//!
//! On job start the enabled engine set is intersected with language support
//! and each engine gets a deadline of
//! `min(per_engine_override, total_timeout × budget_share)`.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use kwality_domain::entities::{EngineResult, Workspace};
use kwality_domain::error::{Error, Result};
use kwality_domain::ports::Engine;
use kwality_domain::value_objects::{EngineConfig, ResourceLimits};

/// One engine scheduled for a job.
pub struct PlannedEngine {
    /// The engine to run
    pub engine: Arc<dyn Engine>,
    /// Deadline for this engine, relative to job start
    pub deadline: Duration,
    /// Resource envelope for this engine
    pub limits: ResourceLimits,
}

impl std::fmt::Debug for PlannedEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlannedEngine")
            .field("engine", &self.engine.name())
            .field("deadline", &self.deadline)
            .field("limits", &self.limits)
            .finish()
    }
}

/// Ordered engine schedule for one job.
#[derive(Debug)]
pub struct ExecutionPlan {
    /// Engines in plan order
    pub engines: Vec<PlannedEngine>,
    /// Engines that do not support any detected language, pre-resolved as
    /// skipped results
    pub skipped: Vec<EngineResult>,
    /// Run engines concurrently instead of in order
    pub parallel: bool,
    /// Wall-clock bound across all engines
    pub total_timeout: Duration,
}

/// Build the execution plan for a job.
///
/// # Errors
///
/// Returns `InvalidRequest` when an enabled engine is not registered. This
/// is normally caught at admission; it recurs here to keep the worker safe
/// against registry drift.
pub fn build_plan(
    engines: &BTreeMap<String, Arc<dyn Engine>>,
    config: &EngineConfig,
    workspace: &Workspace,
    default_limits: &ResourceLimits,
) -> Result<ExecutionPlan> {
    let mut planned = Vec::new();
    let mut skipped = Vec::new();

    for name in &config.enabled_engines {
        let engine = engines
            .get(name)
            .ok_or_else(|| Error::invalid_request(format!("unknown engine '{name}'")))?;

        let supported = engine.languages_supported();
        let applies = supported.is_empty()
            || workspace
                .languages
                .iter()
                .any(|lang| supported.contains(lang));
        if !applies {
            skipped.push(EngineResult::skipped(name.clone()));
            continue;
        }

        let share_deadline = config.total_timeout.mul_f64(engine.budget_share().clamp(0.0, 1.0));
        let deadline = config
            .timeout_override(name)
            .map_or(share_deadline, |o| o.min(share_deadline));

        let limits = config
            .per_engine
            .get(name)
            .and_then(|o| o.limits.clone())
            .unwrap_or_else(|| default_limits.clone());

        planned.push(PlannedEngine {
            engine: Arc::clone(engine),
            deadline,
            limits,
        });
    }

    Ok(ExecutionPlan {
        engines: planned,
        skipped,
        parallel: config.parallel_engines,
        total_timeout: config.total_timeout,
    })
}
