//! End-to-end pipeline tests over fake ports: admission, fan-out,
//! isolation, backpressure, cancellation and graceful shutdown.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use kwality_application::orchestration::orchestrator::{Orchestrator, OrchestratorSettings};
use kwality_application::use_cases::submission_service::{AdmissionLimits, SubmissionService};
use kwality_domain::entities::{JobState, SourceFile, SourceSpec, ValidationRequest};
use kwality_domain::error::Error;
use kwality_domain::ports::{Engine, ReportFilter, ReportStore};
use kwality_domain::value_objects::{EngineConfig, JobId};

use crate::fakes::{EngineBehavior, FakeEngine, FakeMaterializer, RecordingStore};

struct Harness {
    orchestrator: Arc<Orchestrator>,
    service: SubmissionService,
    store: Arc<RecordingStore>,
    _tempdir: tempfile::TempDir,
}

fn harness(
    max_workers: usize,
    queue_size: usize,
    engines: Vec<Arc<FakeEngine>>,
) -> Harness {
    let tempdir = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(RecordingStore::default());
    let engine_map: BTreeMap<String, Arc<dyn Engine>> = engines
        .into_iter()
        .map(|e| (e.name().to_owned(), e as Arc<dyn Engine>))
        .collect();

    let orchestrator = Arc::new(Orchestrator::new(
        OrchestratorSettings {
            max_workers,
            queue_size,
            grace: Duration::from_millis(200),
            ..OrchestratorSettings::default()
        },
        engine_map,
        Arc::new(FakeMaterializer::new(tempdir.path().to_path_buf())),
        Arc::clone(&store) as Arc<dyn ReportStore>,
        Arc::clone(&store) as _,
    ));
    orchestrator.start().expect("starts");
    let service = SubmissionService::new(Arc::clone(&orchestrator), AdmissionLimits::default());
    Harness {
        orchestrator,
        service,
        store,
        _tempdir: tempdir,
    }
}

fn request(engines: &[&str], timeout: Duration) -> ValidationRequest {
    ValidationRequest {
        name: "pipeline".to_owned(),
        source: SourceSpec::Inline {
            files: vec![SourceFile {
                path: "main.go".to_owned(),
                content: "package main\nfunc main() {}\n".to_owned(),
                language: None,
            }],
        },
        config: EngineConfig {
            enabled_engines: engines.iter().map(|e| (*e).to_owned()).collect(),
            total_timeout: timeout,
            ..EngineConfig::default()
        },
    }
}

async fn await_terminal(store: &RecordingStore, id: JobId, budget: Duration) -> JobState {
    let deadline = Instant::now() + budget;
    loop {
        if let Some(report) = store.get(&id) {
            if report.status.is_terminal() {
                return report.status;
            }
        }
        assert!(Instant::now() < deadline, "job did not reach a terminal state in time");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn single_engine_job_completes_with_its_score() {
    let h = harness(
        2,
        8,
        vec![FakeEngine::new(
            "static",
            EngineBehavior::Ok {
                score: 88.0,
                delay: Duration::ZERO,
            },
        )],
    );

    let receipt = h
        .service
        .submit(request(&["static"], Duration::from_secs(30)))
        .expect("admitted");
    assert_eq!(receipt.status, JobState::Pending);

    let state = await_terminal(&h.store, receipt.job_id, Duration::from_secs(5)).await;
    assert_eq!(state, JobState::Completed);

    let report = h.service.get(&receipt.job_id).expect("report exists");
    assert!((report.overall_score - 88.0).abs() < f64::EPSILON);
    assert!(report.engine_results.contains_key("static"));
    h.orchestrator.stop(Duration::from_secs(2)).await.expect("stops");
}

#[tokio::test(flavor = "multi_thread")]
async fn engine_failures_are_isolated_per_engine() {
    let h = harness(
        2,
        8,
        vec![
            FakeEngine::new(
                "good",
                EngineBehavior::Ok {
                    score: 70.0,
                    delay: Duration::ZERO,
                },
            ),
            FakeEngine::new("bad", EngineBehavior::Fail),
            FakeEngine::new("explosive", EngineBehavior::Panic),
        ],
    );

    let receipt = h
        .service
        .submit(request(&["good", "bad", "explosive"], Duration::from_secs(30)))
        .expect("admitted");
    let state = await_terminal(&h.store, receipt.job_id, Duration::from_secs(5)).await;
    assert_eq!(state, JobState::Completed, "one ok engine completes the job");

    let report = h.service.get(&receipt.job_id).expect("report");
    assert_eq!(report.engine_results.len(), 3);
    assert!(
        report
            .findings
            .iter()
            .any(|f| f.category == "engine.panic"),
        "panics surface as high engine findings"
    );
    h.orchestrator.stop(Duration::from_secs(2)).await.expect("stops");
}

#[tokio::test(flavor = "multi_thread")]
async fn all_engines_failing_fails_the_job() {
    let h = harness(1, 4, vec![FakeEngine::new("bad", EngineBehavior::Fail)]);
    let receipt = h
        .service
        .submit(request(&["bad"], Duration::from_secs(10)))
        .expect("admitted");
    let state = await_terminal(&h.store, receipt.job_id, Duration::from_secs(5)).await;
    assert_eq!(state, JobState::Failed);
    h.orchestrator.stop(Duration::from_secs(2)).await.expect("stops");
}

#[tokio::test(flavor = "multi_thread")]
async fn third_rapid_submission_is_rejected_queue_full() {
    // one worker, queue of one, long-running first job
    let h = harness(
        1,
        1,
        vec![FakeEngine::new(
            "slow",
            EngineBehavior::Ok {
                score: 50.0,
                delay: Duration::from_secs(3),
            },
        )],
    );

    let first = h
        .service
        .submit(request(&["slow"], Duration::from_secs(30)))
        .expect("first admitted");
    // give the worker a moment to claim the first job
    tokio::time::sleep(Duration::from_millis(100)).await;
    let second = h
        .service
        .submit(request(&["slow"], Duration::from_secs(30)))
        .expect("second admitted");
    let third = h.service.submit(request(&["slow"], Duration::from_secs(30)));

    assert!(matches!(third, Err(Error::QueueFull)));
    let first_report = h.service.get(&first.job_id).expect("first report");
    assert!(matches!(
        first_report.status,
        JobState::Running | JobState::Pending
    ));
    let second_report = h.service.get(&second.job_id).expect("second report");
    assert_eq!(second_report.status, JobState::Pending);

    h.orchestrator.stop(Duration::from_secs(1)).await.expect("stops");
}

#[tokio::test(flavor = "multi_thread")]
async fn cancel_reaches_terminal_within_grace() {
    let h = harness(
        1,
        4,
        vec![FakeEngine::new("hang", EngineBehavior::BlockUntilCanceled)],
    );

    let receipt = h
        .service
        .submit(request(&["hang"], Duration::from_secs(300)))
        .expect("admitted");
    tokio::time::sleep(Duration::from_millis(100)).await;
    h.service.cancel(&receipt.job_id).expect("cancel accepted");

    let state = await_terminal(&h.store, receipt.job_id, Duration::from_secs(3)).await;
    assert_eq!(state, JobState::Canceled);

    // terminal reports are immutable: canceling again conflicts
    let err = h.service.cancel(&receipt.job_id).expect_err("already terminal");
    assert!(matches!(err, Error::AlreadyTerminal { .. }));
    h.orchestrator.stop(Duration::from_secs(2)).await.expect("stops");
}

#[tokio::test(flavor = "multi_thread")]
async fn canceling_a_pending_job_finalizes_it_immediately() {
    let h = harness(
        1,
        4,
        vec![FakeEngine::new("hang", EngineBehavior::BlockUntilCanceled)],
    );

    // first job occupies the only worker, second stays pending
    let _first = h
        .service
        .submit(request(&["hang"], Duration::from_secs(300)))
        .expect("first admitted");
    tokio::time::sleep(Duration::from_millis(100)).await;
    let second = h
        .service
        .submit(request(&["hang"], Duration::from_secs(300)))
        .expect("second admitted");

    h.service.cancel(&second.job_id).expect("cancel pending job");
    let report = h.service.get(&second.job_id).expect("report");
    assert_eq!(report.status, JobState::Canceled);

    h.orchestrator.stop(Duration::from_secs(1)).await.expect("stops");
}

#[tokio::test(flavor = "multi_thread")]
async fn running_jobs_never_exceed_the_worker_pool() {
    let h = harness(
        2,
        16,
        vec![FakeEngine::new(
            "slow",
            EngineBehavior::Ok {
                score: 60.0,
                delay: Duration::from_millis(400),
            },
        )],
    );

    let receipts: Vec<_> = (0..6)
        .map(|_| {
            h.service
                .submit(request(&["slow"], Duration::from_secs(30)))
                .expect("admitted")
        })
        .collect();

    let deadline = Instant::now() + Duration::from_secs(10);
    let mut max_running = 0;
    loop {
        let running = h
            .store
            .list(&ReportFilter {
                status: Some(JobState::Running),
            })
            .len();
        max_running = max_running.max(running);
        let terminal = receipts
            .iter()
            .filter(|r| {
                h.store
                    .get(&r.job_id)
                    .is_some_and(|rep| rep.status.is_terminal())
            })
            .count();
        if terminal == receipts.len() {
            break;
        }
        assert!(Instant::now() < deadline, "jobs did not drain");
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    assert!(max_running <= 2, "running jobs exceeded maxWorkers: {max_running}");
    h.orchestrator.stop(Duration::from_secs(2)).await.expect("stops");
}

#[tokio::test(flavor = "multi_thread")]
async fn graceful_shutdown_cancels_overbudget_jobs() {
    let h = harness(
        1,
        4,
        vec![FakeEngine::new("hang", EngineBehavior::BlockUntilCanceled)],
    );

    let receipt = h
        .service
        .submit(request(&["hang"], Duration::from_secs(600)))
        .expect("admitted");
    tokio::time::sleep(Duration::from_millis(100)).await;

    let stop_started = Instant::now();
    h.orchestrator
        .stop(Duration::from_secs(2))
        .await
        .expect("stops");
    assert!(
        stop_started.elapsed() < Duration::from_secs(10),
        "shutdown must respect its budget"
    );

    let report = h.service.get(&receipt.job_id).expect("terminal report");
    assert!(report.status.is_terminal());
    assert_eq!(report.status, JobState::Canceled);
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_engine_is_rejected_at_admission() {
    let h = harness(
        1,
        4,
        vec![FakeEngine::new(
            "static",
            EngineBehavior::Ok {
                score: 100.0,
                delay: Duration::ZERO,
            },
        )],
    );
    let err = h
        .service
        .submit(request(&["nonexistent"], Duration::from_secs(10)))
        .expect_err("rejected");
    assert!(matches!(err, Error::InvalidRequest { .. }));
    assert_eq!(h.store.len(), 0, "no job is created for rejected submissions");
    h.orchestrator.stop(Duration::from_secs(1)).await.expect("stops");
}

#[tokio::test(flavor = "multi_thread")]
async fn terminal_reports_are_stable_across_reads() {
    let h = harness(
        1,
        4,
        vec![FakeEngine::new(
            "static",
            EngineBehavior::Ok {
                score: 42.0,
                delay: Duration::ZERO,
            },
        )],
    );
    let receipt = h
        .service
        .submit(request(&["static"], Duration::from_secs(10)))
        .expect("admitted");
    await_terminal(&h.store, receipt.job_id, Duration::from_secs(5)).await;

    let first = h.service.get(&receipt.job_id).expect("report");
    let second = h.service.get(&receipt.job_id).expect("report again");
    assert_eq!(
        serde_json::to_vec(&first).expect("serializes"),
        serde_json::to_vec(&second).expect("serializes"),
        "terminal reports must be byte-identical on every read"
    );
    h.orchestrator.stop(Duration::from_secs(1)).await.expect("stops");
}
