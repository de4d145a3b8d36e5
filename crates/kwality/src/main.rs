//! Kwality server binary.
//!
//! `kwality serve` (the default) loads configuration, resolves the engine
//! registry, starts the orchestrator and serves the HTTP API until SIGINT
//! or SIGTERM, then drains within the configured shutdown budget.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};

use kwality_application::orchestration::orchestrator::{Orchestrator, OrchestratorSettings};
use kwality_application::use_cases::submission_service::{AdmissionLimits, SubmissionService};
use kwality_domain::ports::{Engine, ReportStore};
use kwality_domain::registry::{EngineSettings, list_engines, resolve_engine};
use kwality_domain::value_objects::{NetworkPolicy, ResourceLimits};
use kwality_infrastructure::config::{AppConfig, ConfigLoader};
use kwality_infrastructure::logging::init_logging;
use kwality_infrastructure::store::MemoryReportStore;
use kwality_infrastructure::workspace::LocalMaterializer;
use kwality_server::{AppState, router};

/// Validation orchestrator and runtime sandbox.
#[derive(Parser)]
#[command(name = "kwality", version, about)]
struct Cli {
    /// Explicit configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// List registered engines and exit
    Engines,
}

fn engine_settings(config: &AppConfig) -> EngineSettings {
    EngineSettings {
        limits: ResourceLimits {
            memory_mb: config.runtime.memory_limit_mb,
            cpu_cores: config.runtime.cpu_limit_cores,
            timeout_secs: config.runtime.timeout_seconds,
            pids_limit: config.runtime.pids_limit,
            tmpfs_mb: config.runtime.tmpfs_mb,
            network: if config.runtime.network_isolation {
                NetworkPolicy::None
            } else {
                NetworkPolicy::Allowlist {
                    hosts: config.security.allowed_hosts.clone(),
                }
            },
        },
        performance: config.performance.clone(),
        security: config.security.to_policy(),
        security_scanners: config.security.enabled_scanners.clone(),
        fuzz: config.runtime.fuzz.clone(),
        container_image: config.runtime.container_image.clone(),
        work_dir: config.workspace.work_dir.clone(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    let settings = engine_settings(&config);
    let mut engines: BTreeMap<String, Arc<dyn Engine>> = BTreeMap::new();
    for (name, _description) in list_engines() {
        let engine = resolve_engine(name, &settings)
            .map_err(|e| anyhow::anyhow!("engine '{name}': {e}"))?;
        engines.insert(name.to_owned(), engine);
    }

    let store = Arc::new(MemoryReportStore::new());
    let _sweeper = store.spawn_retention_sweeper(
        Duration::from_secs(config.workspace.retention_secs),
        Duration::from_secs(60),
    );

    let materializer = Arc::new(LocalMaterializer::new(
        config.workspace.work_dir.clone(),
        config.limits.clone(),
    ));

    let orchestrator = Arc::new(Orchestrator::new(
        OrchestratorSettings {
            max_workers: config.orchestrator.max_workers,
            queue_size: config.orchestrator.queue_size,
            grace: Duration::from_millis(config.orchestrator.grace_ms),
            default_limits: settings.limits.clone(),
        },
        engines,
        materializer,
        Arc::clone(&store) as Arc<dyn ReportStore>,
        Arc::clone(&store) as _,
    ));
    orchestrator.start().context("orchestrator start")?;

    let service = Arc::new(SubmissionService::new(
        Arc::clone(&orchestrator),
        AdmissionLimits {
            max_codebase_bytes: config.limits.max_codebase_bytes,
            max_files: config.limits.max_files,
            max_file_bytes: config.limits.max_file_bytes,
        },
    ));
    let app = router(AppState::new(service));

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.server.port))
        .await
        .with_context(|| format!("bind port {}", config.server.port))?;
    tracing::info!(port = config.server.port, env = %config.server.env, "kwality listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server")?;

    tracing::info!("signal received, draining");
    orchestrator
        .stop(Duration::from_secs(config.orchestrator.shutdown_budget_secs))
        .await
        .context("orchestrator stop")?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut loader = ConfigLoader::new();
    if let Some(path) = &cli.config {
        loader = loader.with_config_path(path);
    }
    let config = loader.load().context("configuration")?;
    init_logging(&config.logging);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Engines => {
            for (name, description) in list_engines() {
                tracing::info!(engine = name, "{description}");
            }
            Ok(())
        }
    }
}
