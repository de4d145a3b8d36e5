//! Sandbox engine tests against a scripted container runtime.
//!
//! No docker daemon is involved: the fake runtime routes sampler commands
//! to empty output and feeds the build/entry phases from a script.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use kwality_domain::entities::{EngineStatus, Workspace};
use kwality_domain::error::{Error, Result};
use kwality_domain::ports::{
    ContainerRuntime, ContainerSpec, ContainerStats, Engine, EngineContext, ExecOutput,
};
use kwality_domain::registry::EngineSettings;
use kwality_domain::value_objects::{JobId, Language, ResourceLimits};
use kwality_infrastructure::sandbox::RuntimeEngine;

/// Scripted container runtime.
///
/// Build/entry execs pop from the script; sampler commands (`cat`,
/// `readlink` loops) return empty success so the monitors stay quiet.
struct FakeRuntime {
    script: Mutex<VecDeque<ExecOutput>>,
    exec_delay: Duration,
    started: AtomicBool,
    stopped: AtomicBool,
    removed: AtomicBool,
}

impl FakeRuntime {
    fn with_script(outputs: Vec<ExecOutput>, exec_delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(outputs.into()),
            exec_delay,
            started: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            removed: AtomicBool::new(false),
        })
    }

    fn removed(&self) -> bool {
        self.removed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn create_and_start(&self, _spec: &ContainerSpec) -> Result<String> {
        self.started.store(true, Ordering::SeqCst);
        Ok("fake-container".to_owned())
    }

    async fn wait(&self, _id: &str) -> Result<i64> {
        Ok(0)
    }

    async fn stats(&self, _id: &str) -> Result<ContainerStats> {
        Ok(ContainerStats::default())
    }

    async fn exec(&self, _id: &str, command: &[String]) -> Result<ExecOutput> {
        // sampler traffic
        if command.first().is_some_and(|c| c == "cat")
            || command.iter().any(|c| c.contains("readlink"))
        {
            return Ok(ExecOutput::default());
        }
        tokio::time::sleep(self.exec_delay).await;
        let output = self
            .script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        output.ok_or_else(|| Error::internal("fake runtime script exhausted"))
    }

    async fn logs(&self, _id: &str) -> Result<String> {
        Ok(String::new())
    }

    async fn stop(&self, _id: &str, _grace: Duration) -> Result<()> {
        self.stopped.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn remove(&self, _id: &str) -> Result<()> {
        self.removed.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

fn workspace_with(files: &[(&str, &str)], languages: Vec<Language>) -> (tempfile::TempDir, Workspace) {
    let dir = tempfile::tempdir().expect("tempdir");
    for (path, content) in files {
        let target = dir.path().join(path);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).expect("dirs");
        }
        std::fs::write(target, content).expect("write");
    }
    let workspace = Workspace {
        root: dir.path().to_path_buf(),
        fingerprint: "00".repeat(32),
        file_count: files.len(),
        total_bytes: files.iter().map(|(_, c)| c.len() as u64).sum(),
        languages,
        retain: false,
    };
    (dir, workspace)
}

fn context(workspace: Workspace, scratch: &tempfile::TempDir, deadline_in: Duration) -> EngineContext {
    EngineContext {
        job_id: JobId::new(),
        workspace: Arc::new(workspace),
        scratch_dir: scratch.path().to_path_buf(),
        cancel: CancellationToken::new(),
        deadline: Instant::now() + deadline_in,
        limits: ResourceLimits {
            timeout_secs: deadline_in.as_secs().max(1),
            ..ResourceLimits::default()
        },
    }
}

fn ok_output(stdout: &str) -> ExecOutput {
    ExecOutput {
        exit_code: 0,
        stdout: stdout.to_owned(),
        stderr: String::new(),
    }
}

#[tokio::test]
async fn python_run_completes_with_baseline_score() {
    let runtime = FakeRuntime::with_script(vec![ok_output("hello\n")], Duration::ZERO);
    let engine = RuntimeEngine::with_runtime(
        Arc::clone(&runtime) as Arc<dyn ContainerRuntime>,
        EngineSettings::default(),
    );

    let (_dir, workspace) = workspace_with(&[("main.py", "print('hello')\n")], vec![Language::Python]);
    let scratch = tempfile::tempdir().expect("scratch");
    let ctx = context(workspace, &scratch, Duration::from_secs(10));

    let result = engine.run(&ctx).await.expect("run succeeds");
    assert_eq!(result.status, EngineStatus::Ok);
    assert!((result.score - 100.0).abs() < f64::EPSILON, "no findings expected");
    assert!(runtime.removed(), "container must be removed");
    assert!(result.metrics.contains_key("run_secs"));
}

#[tokio::test]
async fn go_build_failure_caps_score_and_reports_build_finding() {
    let build_failure = ExecOutput {
        exit_code: 2,
        stdout: String::new(),
        stderr: "main.go:3: syntax error".to_owned(),
    };
    let runtime = FakeRuntime::with_script(vec![build_failure], Duration::ZERO);
    let engine = RuntimeEngine::with_runtime(
        Arc::clone(&runtime) as Arc<dyn ContainerRuntime>,
        EngineSettings::default(),
    );

    let (_dir, workspace) = workspace_with(
        &[("main.go", "package main\nfunc main() {\n"), ("go.mod", "module demo\n")],
        vec![Language::Go],
    );
    let scratch = tempfile::tempdir().expect("scratch");
    let ctx = context(workspace, &scratch, Duration::from_secs(10));

    let result = engine.run(&ctx).await.expect("run returns a result");
    assert_eq!(result.status, EngineStatus::Ok);
    assert!(result.score <= 20.0, "build failure caps the score at 20");
    assert!(result.findings.iter().any(|f| f.category == "build"));
    assert!(runtime.removed());
}

#[tokio::test]
async fn slow_entry_times_out_with_capped_score() {
    // The entry exec sleeps past the deadline.
    let runtime = FakeRuntime::with_script(vec![ok_output("")], Duration::from_secs(5));
    let engine = RuntimeEngine::with_runtime(
        Arc::clone(&runtime) as Arc<dyn ContainerRuntime>,
        EngineSettings::default(),
    );

    let (_dir, workspace) = workspace_with(
        &[("main.py", "while True: pass\n")],
        vec![Language::Python],
    );
    let scratch = tempfile::tempdir().expect("scratch");
    let ctx = context(workspace, &scratch, Duration::from_secs(1));

    let result = engine.run(&ctx).await.expect("run returns a result");
    assert_eq!(result.status, EngineStatus::Timeout);
    assert!(result.score <= 40.0, "timeout caps the score at 40");
    assert!(
        result.findings.iter().any(|f| f.category == "runtime.timeout"),
        "timeout must be recorded as a finding"
    );
    assert!(runtime.removed(), "no lingering container after timeout");
}

#[tokio::test]
async fn cancellation_tears_the_container_down() {
    let runtime = FakeRuntime::with_script(vec![ok_output("")], Duration::from_secs(5));
    let engine = RuntimeEngine::with_runtime(
        Arc::clone(&runtime) as Arc<dyn ContainerRuntime>,
        EngineSettings::default(),
    );

    let (_dir, workspace) =
        workspace_with(&[("main.py", "print('x')\n")], vec![Language::Python]);
    let scratch = tempfile::tempdir().expect("scratch");
    let ctx = context(workspace, &scratch, Duration::from_secs(30));

    let cancel = ctx.cancel.clone();
    let run = tokio::spawn({
        let ctx = ctx.clone();
        async move { engine.run(&ctx).await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel.cancel();

    let result = run.await.expect("task joins");
    assert!(matches!(result, Err(Error::Canceled)));
    assert!(runtime.removed(), "canceled runs must not leak containers");
}

#[tokio::test]
async fn unknown_language_is_a_metadata_only_pass() {
    let runtime = FakeRuntime::with_script(Vec::new(), Duration::ZERO);
    let engine = RuntimeEngine::with_runtime(
        Arc::clone(&runtime) as Arc<dyn ContainerRuntime>,
        EngineSettings::default(),
    );

    let (_dir, workspace) = workspace_with(&[("README.txt", "hello\n")], Vec::new());
    let scratch = tempfile::tempdir().expect("scratch");
    let ctx = context(workspace, &scratch, Duration::from_secs(5));

    let result = engine.run(&ctx).await.expect("run succeeds");
    assert_eq!(result.status, EngineStatus::Skipped);
    assert!(!runtime.started.load(Ordering::SeqCst), "no container for unknown languages");
}
