//! Static analysis engine.
//!
//! Line-oriented heuristics over the workspace sources: delimiter balance,
//! oversized lines and leftover work markers. A submission whose sources
//! cannot even balance their delimiters is treated like a failed build for
//! scoring purposes.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use kwality_domain::constants::{BASELINE_SCORE, BUILD_FAILURE_SCORE_CAP, STATIC_ENGINE_NAME};
use kwality_domain::entities::{EngineResult, EngineStatus, Finding, Severity};
use kwality_domain::error::{Error, Result};
use kwality_domain::ports::{Engine, EngineContext};
use kwality_domain::registry::{ENGINE_PROVIDERS, EngineProviderEntry};
use kwality_domain::value_objects::Language;

use crate::engines::source_files;

/// Maximum line length before a style finding fires.
const MAX_LINE_LENGTH: usize = 500;

/// Work-marker findings reported per file before the rest are folded.
const MAX_MARKERS_PER_FILE: usize = 5;

/// Line-oriented static analysis over workspace sources.
pub struct StaticAnalysisEngine;

impl StaticAnalysisEngine {
    /// Create the engine.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for StaticAnalysisEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Strip line comments for the file's language family before balancing.
fn strip_comment(line: &str, hash_comments: bool) -> &str {
    let cut = if hash_comments {
        line.find('#')
    } else {
        line.find("//")
    };
    match cut {
        Some(idx) => &line[..idx],
        None => line,
    }
}

/// Delimiter balance over one file, ignoring string literals.
///
/// Returns the 1-based line of the first imbalance, or of the end of file
/// when something stays open.
fn check_balance(content: &str, hash_comments: bool) -> Option<(u32, String)> {
    let mut stack: Vec<(char, u32)> = Vec::new();
    let mut last_line = 1;
    for (idx, raw_line) in content.lines().enumerate() {
        let line_no = u32::try_from(idx + 1).unwrap_or(u32::MAX);
        last_line = line_no;
        let line = strip_comment(raw_line, hash_comments);
        let mut in_string: Option<char> = None;
        let mut previous = '\0';
        for c in line.chars() {
            if let Some(quote) = in_string {
                if c == quote && previous != '\\' {
                    in_string = None;
                }
                previous = c;
                continue;
            }
            match c {
                '"' | '\'' | '`' => in_string = Some(c),
                '(' | '[' | '{' => stack.push((c, line_no)),
                ')' | ']' | '}' => {
                    let expected = match c {
                        ')' => '(',
                        ']' => '[',
                        _ => '{',
                    };
                    match stack.pop() {
                        Some((open, _)) if open == expected => {}
                        _ => {
                            return Some((line_no, format!("unmatched '{c}'")));
                        }
                    }
                }
                _ => {}
            }
            previous = c;
        }
    }
    stack
        .first()
        .map(|(open, line)| (last_line.max(*line), format!("'{open}' is never closed")))
}

fn uses_hash_comments(path: &str) -> bool {
    std::path::Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| ext == "py")
}

#[async_trait]
impl Engine for StaticAnalysisEngine {
    fn name(&self) -> &'static str {
        STATIC_ENGINE_NAME
    }

    fn languages_supported(&self) -> &[Language] {
        // Line-oriented checks apply to every language.
        &[]
    }

    fn budget_share(&self) -> f64 {
        0.25
    }

    async fn run(&self, ctx: &EngineContext) -> Result<EngineResult> {
        let root = ctx.workspace.root.clone();
        let cancel = ctx.cancel.clone();
        let started = std::time::Instant::now();

        let scan = tokio::task::spawn_blocking(move || {
            let mut findings = Vec::new();
            let mut files_scanned: u64 = 0;
            let mut lines_scanned: u64 = 0;

            for (path, content) in source_files(&root) {
                if cancel.is_cancelled() {
                    return Err(Error::Canceled);
                }
                files_scanned += 1;
                lines_scanned += content.lines().count() as u64;

                if let Some((line, detail)) = check_balance(&content, uses_hash_comments(&path)) {
                    findings.push(
                        Finding::new(
                            Severity::High,
                            "syntax",
                            format!("unbalanced delimiters: {detail}"),
                        )
                        .with_location(path.clone(), Some(line)),
                    );
                }

                let mut markers = 0;
                for (idx, line) in content.lines().enumerate() {
                    let line_no = u32::try_from(idx + 1).unwrap_or(u32::MAX);
                    if line.len() > MAX_LINE_LENGTH {
                        findings.push(
                            Finding::new(
                                Severity::Low,
                                "style.line_length",
                                format!("line exceeds {MAX_LINE_LENGTH} characters"),
                            )
                            .with_location(path.clone(), Some(line_no)),
                        );
                    }
                    if (line.contains("TODO") || line.contains("FIXME"))
                        && markers < MAX_MARKERS_PER_FILE
                    {
                        markers += 1;
                        findings.push(
                            Finding::new(Severity::Info, "style.todo", "leftover work marker")
                                .with_location(path.clone(), Some(line_no)),
                        );
                    }
                }
            }
            Ok((findings, files_scanned, lines_scanned))
        })
        .await
        .map_err(|e| Error::engine_panic(STATIC_ENGINE_NAME, e.to_string()))?;

        let (findings, files_scanned, lines_scanned) = scan?;

        let penalty: f64 = findings.iter().map(|f| f64::from(f.severity.weight())).sum();
        let mut score = (BASELINE_SCORE - penalty).max(0.0);
        // Sources that cannot balance their delimiters would never build.
        if findings.iter().any(|f| f.category == "syntax") {
            score = score.min(BUILD_FAILURE_SCORE_CAP);
        }

        let mut metrics = BTreeMap::new();
        metrics.insert("files_scanned".to_owned(), files_scanned as f64);
        metrics.insert("lines_scanned".to_owned(), lines_scanned as f64);

        Ok(EngineResult {
            engine: STATIC_ENGINE_NAME.to_owned(),
            status: EngineStatus::Ok,
            score,
            findings,
            metrics,
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        })
    }
}

#[linkme::distributed_slice(ENGINE_PROVIDERS)]
static STATIC_ANALYSIS_ENGINE_PROVIDER_ENTRY: EngineProviderEntry = EngineProviderEntry {
    name: STATIC_ENGINE_NAME,
    description: "Line-oriented static source checks",
    build: |_settings| Ok(Arc::new(StaticAnalysisEngine::new())),
};
