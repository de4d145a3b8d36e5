//! Standalone runtime validator binary.
//!
//! ```text
//! runtime-validator --input <request.json> --output <result.json>
//! runtime-validator --health-check
//! ```
//!
//! Exit codes: 0 success, 2 invalid input, 3 sandbox failure, 4 timeout,
//! 5 internal.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use kwality_infrastructure::logging::init_logging;
use kwality_infrastructure::runtime_validator::{
    ValidatorRequest, exit_code_for, health_check, run,
};

/// Containerized runtime validation over a materialized workspace.
#[derive(Parser)]
#[command(name = "runtime-validator", version, about)]
struct Cli {
    /// Request JSON file
    #[arg(long)]
    input: Option<PathBuf>,

    /// Result JSON file to write
    #[arg(long)]
    output: Option<PathBuf>,

    /// Probe the container runtime and exit
    #[arg(long)]
    health_check: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&kwality_infrastructure::config::LoggingConfig::default());

    if cli.health_check {
        return match health_check().await {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                tracing::error!(error = %err, "container runtime unreachable");
                ExitCode::from(3)
            }
        };
    }

    let (Some(input), Some(output)) = (cli.input, cli.output) else {
        tracing::error!("--input and --output are required");
        return ExitCode::from(2);
    };

    let request: ValidatorRequest = match std::fs::read_to_string(&input)
        .map_err(|e| e.to_string())
        .and_then(|content| serde_json::from_str(&content).map_err(|e| e.to_string()))
    {
        Ok(request) => request,
        Err(err) => {
            tracing::error!(error = %err, input = %input.display(), "invalid request file");
            return ExitCode::from(2);
        }
    };

    match run(&request).await {
        Ok(result) => {
            let serialized = match serde_json::to_vec_pretty(&result) {
                Ok(bytes) => bytes,
                Err(err) => {
                    tracing::error!(error = %err, "result serialization failed");
                    return ExitCode::from(5);
                }
            };
            if let Err(err) = std::fs::write(&output, serialized) {
                tracing::error!(error = %err, output = %output.display(), "result write failed");
                return ExitCode::from(5);
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(error = %err, "validation failed");
            ExitCode::from(u8::try_from(exit_code_for(&err)).unwrap_or(5))
        }
    }
}
