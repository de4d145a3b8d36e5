//! Bundled analysis engines.
//!
//! Lightweight wrapper-grade engines that run alongside the runtime
//! sandbox: line-oriented static checks and a pattern-based security
//! scanner. Both register themselves into the domain engine registry.

/// Pattern-based security scanner
pub mod security_scan;
/// Line-oriented static analysis
pub mod static_analysis;

pub use security_scan::SecurityScanEngine;
pub use static_analysis::StaticAnalysisEngine;

/// Extensions scanned by the source-reading engines.
pub(crate) const SOURCE_EXTENSIONS: &[&str] = &[
    "go", "rs", "py", "js", "mjs", "cjs", "ts", "tsx", "java",
];

/// Iterate workspace source files as `(relative path, content)`.
pub(crate) fn source_files(
    root: &std::path::Path,
) -> impl Iterator<Item = (String, String)> + '_ {
    walkdir::WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|x| x.to_str())
                .is_some_and(|ext| SOURCE_EXTENSIONS.contains(&ext))
        })
        .filter_map(move |e| {
            let rel = e.path().strip_prefix(root).ok()?.to_string_lossy().into_owned();
            let content = std::fs::read_to_string(e.path()).ok()?;
            Some((rel, content))
        })
}
