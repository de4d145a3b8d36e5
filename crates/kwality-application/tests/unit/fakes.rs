//! Fake ports for pipeline tests: materializer, engines and report store.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use kwality_domain::entities::{
    EngineResult, EngineStatus, Report, ReportSummary, ValidationRequest, Workspace,
};
use kwality_domain::error::{Error, Result};
use kwality_domain::ports::{
    Engine, EngineContext, JobEvent, JobEventSink, ReportFilter, ReportStore,
    WorkspaceMaterializer,
};
use kwality_domain::value_objects::{JobId, Language};

/// Materializer that fabricates an empty Go workspace without touching disk
/// beyond a shared temp root.
pub struct FakeMaterializer {
    root: PathBuf,
}

impl FakeMaterializer {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl WorkspaceMaterializer for FakeMaterializer {
    async fn materialize(&self, job_id: JobId, request: &ValidationRequest) -> Result<Workspace> {
        let root = self.root.join(job_id.as_str());
        tokio::fs::create_dir_all(&root).await?;
        Ok(Workspace {
            root,
            fingerprint: "ab".repeat(32),
            file_count: 1,
            total_bytes: 64,
            languages: vec![Language::Go],
            retain: request.config.retain_workspace,
        })
    }

    async fn destroy(&self, workspace: &Workspace) -> Result<()> {
        if !workspace.retain && workspace.root.exists() {
            tokio::fs::remove_dir_all(&workspace.root).await?;
        }
        Ok(())
    }

    fn scratch_dir(&self, job_id: JobId, engine: &str) -> PathBuf {
        self.root.join("scratch").join(job_id.as_str()).join(engine)
    }
}

/// What a fake engine does when run.
#[derive(Clone)]
pub enum EngineBehavior {
    /// Return ok with the given score after the delay
    Ok { score: f64, delay: Duration },
    /// Return an engine failure
    Fail,
    /// Panic inside the engine task
    Panic,
    /// Sleep until canceled, then return `Err(Canceled)`
    BlockUntilCanceled,
}

/// Scriptable engine.
pub struct FakeEngine {
    name: &'static str,
    behavior: EngineBehavior,
}

impl FakeEngine {
    pub fn new(name: &'static str, behavior: EngineBehavior) -> Arc<Self> {
        Arc::new(Self { name, behavior })
    }
}

#[async_trait]
impl Engine for FakeEngine {
    fn name(&self) -> &'static str {
        self.name
    }

    fn languages_supported(&self) -> &[Language] {
        &[]
    }

    async fn run(&self, ctx: &EngineContext) -> Result<EngineResult> {
        match &self.behavior {
            EngineBehavior::Ok { score, delay } => {
                if !delay.is_zero() {
                    tokio::select! {
                        () = ctx.cancel.cancelled() => return Err(Error::Canceled),
                        () = tokio::time::sleep(*delay) => {}
                    }
                }
                Ok(EngineResult {
                    engine: self.name.to_owned(),
                    status: EngineStatus::Ok,
                    score: *score,
                    findings: Vec::new(),
                    metrics: BTreeMap::new(),
                    duration_ms: delay.as_millis() as u64,
                })
            }
            EngineBehavior::Fail => Err(Error::engine_failed(self.name, "scripted failure")),
            EngineBehavior::Panic => panic!("scripted engine panic"),
            EngineBehavior::BlockUntilCanceled => {
                ctx.cancel.cancelled().await;
                Err(Error::Canceled)
            }
        }
    }
}

/// Plain mutex-map store with an event log.
#[derive(Default)]
pub struct RecordingStore {
    reports: Mutex<HashMap<JobId, Report>>,
    pub events: Mutex<Vec<JobEvent>>,
}

impl ReportStore for RecordingStore {
    fn put(&self, report: Report) {
        self.reports
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(report.job_id, report);
    }

    fn get(&self, id: &JobId) -> Option<Report> {
        self.reports
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned()
    }

    fn list(&self, filter: &ReportFilter) -> Vec<ReportSummary> {
        self.reports
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .filter(|r| filter.status.as_ref().is_none_or(|s| &r.status == s))
            .map(Report::summary)
            .collect()
    }

    fn remove(&self, id: &JobId) -> Option<Report> {
        self.reports
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(id)
    }

    fn len(&self) -> usize {
        self.reports.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl JobEventSink for RecordingStore {
    fn publish(&self, event: JobEvent) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
    }
}
