//! Optional fuzzing pass.
//!
//! Discovers fuzz entry points per language, drives them inside the already
//! running sandbox container for a bounded number of iterations or seconds,
//! and records crashes, hangs and divergence. Crashing inputs are attached
//! as evidence, truncated to the configured cap.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::LazyLock;
use std::time::{Duration, Instant};

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use regex::Regex;
use tokio_util::sync::CancellationToken;

use kwality_domain::entities::{Finding, Severity};
use kwality_domain::ports::ContainerRuntime;
use kwality_domain::value_objects::{FuzzConfig, Language};

/// Per-iteration execution budget before an input counts as a hang.
const ITERATION_TIMEOUT: Duration = Duration::from_secs(2);

static GO_FUZZ_FN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^func (Fuzz[A-Z]\w*)\s*\(").expect("static regex"));
static PY_FUZZ_FN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^def (fuzz_\w+)\s*\(").expect("static regex"));
static JS_FUZZ_FN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^(?:export\s+)?function (fuzz_\w+)\s*\(").expect("static regex")
});

/// One discovered fuzz entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuzzTarget {
    /// Workspace-relative source file
    pub file: String,
    /// Function name
    pub function: String,
    /// Language of the target
    pub language: Language,
}

/// Outcome of the fuzzing pass.
#[derive(Debug, Default)]
pub struct FuzzOutcome {
    /// Crash, hang and divergence findings
    pub findings: Vec<Finding>,
    /// Iteration counters
    pub metrics: BTreeMap<String, f64>,
}

/// Scan workspace sources for fuzzable entry points.
pub fn discover_targets(root: &Path, language: Language) -> Vec<FuzzTarget> {
    let (pattern, extensions): (&Regex, &[&str]) = match language {
        Language::Go => (&GO_FUZZ_FN, &["go"]),
        Language::Python => (&PY_FUZZ_FN, &["py"]),
        Language::JavaScript | Language::TypeScript => (&JS_FUZZ_FN, &["js", "mjs"]),
        Language::Rust | Language::Java | Language::Unknown => return Vec::new(),
    };

    let mut targets = Vec::new();
    for entry in walkdir::WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
    {
        let Some(ext) = entry.path().extension().and_then(|x| x.to_str()) else {
            continue;
        };
        if !extensions.contains(&ext) {
            continue;
        }
        let Ok(content) = std::fs::read_to_string(entry.path()) else {
            continue;
        };
        let Ok(rel) = entry.path().strip_prefix(root) else {
            continue;
        };
        for capture in pattern.captures_iter(&content) {
            targets.push(FuzzTarget {
                file: rel.to_string_lossy().into_owned(),
                function: capture[1].to_owned(),
                language,
            });
        }
    }
    targets
}

/// Command invoking one target with one input inside the container.
///
/// Go targets use the toolchain's native fuzzer (which generates its own
/// inputs); interpreted targets get the input as an argument.
fn target_command(target: &FuzzTarget, input: &str, budget_secs: u64) -> Vec<String> {
    match target.language {
        Language::Go => vec![
            "go".to_owned(),
            "test".to_owned(),
            "-run".to_owned(),
            "^$".to_owned(),
            format!("-fuzz=^{}$", target.function),
            format!("-fuzztime={budget_secs}s"),
            "./...".to_owned(),
        ],
        Language::Python => {
            let module = target.file.trim_end_matches(".py").replace('/', ".");
            vec![
                "python".to_owned(),
                "-c".to_owned(),
                format!(
                    "import sys; sys.path.insert(0, '.'); import {module} as m; m.{}(sys.argv[1])",
                    target.function
                ),
                input.to_owned(),
            ]
        }
        Language::JavaScript | Language::TypeScript => vec![
            "node".to_owned(),
            "-e".to_owned(),
            format!(
                "const m = require('./{}'); m.{}(process.argv[1])",
                target.file, target.function
            ),
            input.to_owned(),
        ],
        Language::Rust | Language::Java | Language::Unknown => Vec::new(),
    }
}

fn random_input<R: Rng>(rng: &mut R) -> String {
    let len = rng.gen_range(0..64);
    (0..len)
        .map(|_| {
            // mostly printable, occasionally hostile
            if rng.gen_bool(0.9) {
                char::from(rng.gen_range(0x20u8..0x7f))
            } else {
                char::from(rng.gen_range(0x01u8..0x20))
            }
        })
        .collect()
}

/// Drive the discovered targets inside the running container.
pub async fn run_fuzz(
    runtime: &Arc<dyn ContainerRuntime>,
    container_id: &str,
    targets: &[FuzzTarget],
    config: &FuzzConfig,
    cancel: &CancellationToken,
) -> FuzzOutcome {
    let mut outcome = FuzzOutcome::default();
    if targets.is_empty() {
        outcome.metrics.insert("fuzz_targets".to_owned(), 0.0);
        return outcome;
    }

    let deadline = Instant::now() + Duration::from_secs(config.duration_secs);
    let evidence_cap = config.evidence_cap_kb * 1024;
    let mut rng = StdRng::from_entropy();
    let mut iterations: u64 = 0;
    let per_target_budget = (config.duration_secs / targets.len().max(1) as u64).max(1);

    'outer: for target in targets {
        // The Go fuzzer manages its own corpus; one invocation per target.
        if target.language == Language::Go {
            if cancel.is_cancelled() || Instant::now() >= deadline {
                break;
            }
            let command = target_command(target, "", per_target_budget);
            let budget = Duration::from_secs(per_target_budget + 5);
            iterations += 1;
            match tokio::time::timeout(budget, runtime.exec(container_id, &command)).await {
                Ok(Ok(output)) if !output.success() => {
                    outcome.findings.push(
                        Finding::new(
                            Severity::High,
                            "fuzz.crash",
                            format!("go fuzzer found a failing input in {}", target.function),
                        )
                        .with_evidence(output.stdout.into_bytes(), evidence_cap),
                    );
                }
                Err(_) => {
                    outcome.findings.push(Finding::new(
                        Severity::Medium,
                        "fuzz.hang",
                        format!("{} did not finish within its budget", target.function),
                    ));
                }
                Ok(Ok(_)) | Ok(Err(_)) => {}
            }
            continue;
        }

        while iterations < u64::from(config.iterations) {
            if cancel.is_cancelled() || Instant::now() >= deadline {
                break 'outer;
            }
            iterations += 1;
            let input = random_input(&mut rng);
            let command = target_command(target, &input, per_target_budget);

            let first =
                tokio::time::timeout(ITERATION_TIMEOUT, runtime.exec(container_id, &command)).await;
            match first {
                Err(_) => {
                    outcome.findings.push(
                        Finding::new(
                            Severity::Medium,
                            "fuzz.hang",
                            format!("{} hung on a generated input", target.function),
                        )
                        .with_evidence(input.into_bytes(), evidence_cap),
                    );
                    break;
                }
                Ok(Err(_)) => break,
                Ok(Ok(output)) if !output.success() => {
                    outcome.findings.push(
                        Finding::new(
                            Severity::High,
                            "fuzz.crash",
                            format!(
                                "{} crashed on a generated input (exit {})",
                                target.function, output.exit_code
                            ),
                        )
                        .with_evidence(input.into_bytes(), evidence_cap),
                    );
                    break;
                }
                Ok(Ok(first_output)) => {
                    // replay: identical input must produce identical output
                    let second = tokio::time::timeout(
                        ITERATION_TIMEOUT,
                        runtime.exec(container_id, &command),
                    )
                    .await;
                    if let Ok(Ok(second_output)) = second {
                        if second_output.stdout != first_output.stdout {
                            outcome.findings.push(
                                Finding::new(
                                    Severity::Medium,
                                    "fuzz.divergence",
                                    format!(
                                        "{} produced different output for the same input",
                                        target.function
                                    ),
                                )
                                .with_evidence(input.into_bytes(), evidence_cap),
                            );
                            break;
                        }
                    }
                }
            }
        }
    }

    outcome
        .metrics
        .insert("fuzz_targets".to_owned(), targets.len() as f64);
    outcome
        .metrics
        .insert("fuzz_iterations".to_owned(), iterations as f64);
    outcome
}
