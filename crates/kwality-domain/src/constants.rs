//! Domain constants shared across layers.

/// Registry name of the runtime sandbox engine.
pub const RUNTIME_ENGINE_NAME: &str = "runtime";

/// Registry name of the static analysis engine.
pub const STATIC_ENGINE_NAME: &str = "static";

/// Registry name of the security scanner engine.
pub const SECURITY_ENGINE_NAME: &str = "security";

/// Baseline score a sandbox run or engine starts from.
pub const BASELINE_SCORE: f64 = 100.0;

/// Score ceiling when the sandbox build phase fails.
pub const BUILD_FAILURE_SCORE_CAP: f64 = 20.0;

/// Score ceiling when a sandbox run times out.
pub const TIMEOUT_SCORE_CAP: f64 = 40.0;

/// Overall score ceiling when any engine reports a critical finding.
pub const CRITICAL_FINDING_SCORE_CAP: f64 = 30.0;

/// Maximum accepted length of a submitted file path, in bytes.
pub const MAX_PATH_LENGTH: usize = 4096;

/// Default cap on total materialized bytes per submission.
pub const DEFAULT_MAX_CODEBASE_BYTES: u64 = 100 * 1024 * 1024;

/// Default cap on the number of files per submission.
pub const DEFAULT_MAX_FILES: usize = 10_000;

/// Default cap on a single file's size, in bytes.
pub const DEFAULT_MAX_FILE_BYTES: u64 = 10 * 1024 * 1024;

/// Default grace period an engine gets past its deadline before it is
/// recorded as timed out, in milliseconds.
pub const DEFAULT_GRACE_MS: u64 = 5_000;

/// Default worker pool size.
pub const DEFAULT_MAX_WORKERS: usize = 4;

/// Default bounded queue capacity.
pub const DEFAULT_QUEUE_SIZE: usize = 100;

/// Default per-job wall-clock timeout, in minutes.
pub const DEFAULT_JOB_TIMEOUT_MINUTES: u64 = 10;

/// Default retention of terminal reports before eviction, in seconds.
pub const DEFAULT_RETENTION_SECS: u64 = 3_600;

/// Default cap on saved fuzz evidence, in kilobytes.
pub const DEFAULT_EVIDENCE_CAP_KB: usize = 64;

/// Consecutive `RuntimeUnavailable` failures that trip degraded mode.
pub const DEGRADED_MODE_THRESHOLD: u32 = 3;

/// Window within which consecutive runtime failures are counted, in seconds.
pub const DEGRADED_MODE_WINDOW_SECS: u64 = 120;
