//! Immutable value objects.

/// Engine configuration carried by a submission
pub mod engine_config;
/// Strong-typed identifiers
pub mod ids;
/// Supported languages
pub mod language;
/// Resource limits, thresholds and security policy
pub mod limits;

pub use engine_config::{EngineConfig, EngineOverride, duration, opt_duration};
pub use ids::JobId;
pub use language::Language;
pub use limits::{
    FuzzConfig, NetworkPolicy, PerformanceThresholds, ResourceLimits, SecurityPolicy,
};
