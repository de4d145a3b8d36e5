//! Report aggregation (C10).
//!
//! Combines per-engine results into one report: weighted mean of engine
//! scores, merged deduplicated findings sorted by severity descending, and
//! templated recommendations keyed by finding category.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, HashSet};

use kwality_domain::constants::CRITICAL_FINDING_SCORE_CAP;
use kwality_domain::entities::{EngineResult, Finding, Job, Report, Severity};

/// Fixed map from finding category to templated advice.
fn recommendation_for(category: &str) -> Option<&'static str> {
    if category.starts_with("security.network") {
        return Some(
            "Remove unexpected network egress or declare the endpoint in the network allow-list.",
        );
    }
    if category.starts_with("security.file_access") {
        return Some("Do not touch sensitive host paths; read only from the workspace.");
    }
    if category.starts_with("security.exec") {
        return Some("Avoid spawning external processes from validated code.");
    }
    if category.starts_with("security.syscall") {
        return Some("Remove code relying on blocked syscalls; they are denied in the sandbox.");
    }
    if category.starts_with("security.secrets") {
        return Some("Move embedded credentials out of the codebase into a secret manager.");
    }
    if category.starts_with("security") {
        return Some("Review the flagged code paths for unauthorized system access.");
    }
    if category.starts_with("performance") {
        return Some(
            "Profile the flagged path and bring resource usage below the configured thresholds.",
        );
    }
    if category.starts_with("fuzz") {
        return Some("Harden input handling; the attached evidence reproduces the failure.");
    }
    if category == "build" {
        return Some("Fix the build: the submission must compile with its declared toolchain.");
    }
    if category == "syntax" {
        return Some("Fix the syntax errors reported by static analysis.");
    }
    if category.ends_with("timeout") {
        return Some("Reduce run time or raise the configured timeout for this submission.");
    }
    None
}

/// Weighted mean of scorable engine results, before severity caps.
fn weighted_mean(job: &Job, results: &BTreeMap<String, EngineResult>) -> f64 {
    let mut weight_sum = 0.0;
    let mut acc = 0.0;
    for result in results.values().filter(|r| r.is_scorable()) {
        let weight = job.request.config.weight_for(&result.engine).max(0.0);
        weight_sum += weight;
        acc += weight * result.score;
    }
    if weight_sum > 0.0 { acc / weight_sum } else { 0.0 }
}

/// Merge findings across engines, deduplicated by
/// `(engine, category, location)` and sorted by severity descending. The
/// sort is stable, so within a severity the engine/emission order holds.
fn merge_findings(results: &BTreeMap<String, EngineResult>) -> Vec<Finding> {
    let mut seen = HashSet::new();
    let mut merged = Vec::new();
    for result in results.values() {
        for finding in &result.findings {
            let (category, path, line) = finding.dedup_key();
            if seen.insert((result.engine.clone(), category, path, line)) {
                merged.push(finding.clone());
            }
        }
    }
    merged.sort_by_key(|f| Reverse(f.severity));
    merged
}

/// Build the aggregated report for a job whose engines have finished.
///
/// The job must already be in its terminal state; its timestamps and state
/// are copied into the report.
pub fn aggregate(job: &Job, results: BTreeMap<String, EngineResult>) -> Report {
    let mut score = weighted_mean(job, &results);

    let findings = merge_findings(&results);
    if findings.iter().any(|f| f.severity == Severity::Critical) {
        score = score.min(CRITICAL_FINDING_SCORE_CAP);
    }

    let recommendations: Vec<String> = findings
        .iter()
        .filter_map(|f| recommendation_for(&f.category))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_owned)
        .collect();

    let mut metadata = BTreeMap::new();
    metadata.insert(
        "sourceKind".to_owned(),
        serde_json::Value::from(job.request.source.kind()),
    );
    metadata.insert(
        "engineCount".to_owned(),
        serde_json::Value::from(results.len()),
    );
    if let Some(workspace) = &job.workspace {
        metadata.insert(
            "fingerprint".to_owned(),
            serde_json::Value::from(workspace.fingerprint.clone()),
        );
        metadata.insert(
            "fileCount".to_owned(),
            serde_json::Value::from(workspace.file_count),
        );
    }

    Report {
        job_id: job.id,
        name: job.request.name.clone(),
        status: job.state.clone(),
        overall_score: score.clamp(0.0, 100.0),
        engine_results: results,
        findings,
        recommendations,
        metadata,
        submitted_at: job.submitted_at,
        started_at: job.started_at,
        completed_at: job.completed_at,
    }
}
