//! Engine provider registry.

use std::path::PathBuf;

use crate::impl_registry;
use crate::value_objects::{
    FuzzConfig, PerformanceThresholds, ResourceLimits, SecurityPolicy,
};

/// Configuration handed to engine factories at resolution time.
///
/// Carries everything an engine may need to construct itself; individual
/// engines ignore the parts that do not apply to them.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Default resource envelope for engine runs
    pub limits: ResourceLimits,
    /// Performance observation thresholds
    pub performance: PerformanceThresholds,
    /// Security observation policy
    pub security: SecurityPolicy,
    /// Scanner set for the security engine
    pub security_scanners: Vec<String>,
    /// Fuzzing pass configuration
    pub fuzz: FuzzConfig,
    /// Base image override for the runtime sandbox
    pub container_image: Option<String>,
    /// Root under which scratch directories are created
    pub work_dir: PathBuf,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            limits: ResourceLimits::default(),
            performance: PerformanceThresholds::default(),
            security: SecurityPolicy::default(),
            security_scanners: vec![
                "secrets".to_owned(),
                "dangerous_calls".to_owned(),
                "sensitive_paths".to_owned(),
            ],
            fuzz: FuzzConfig::default(),
            container_image: None,
            work_dir: std::env::temp_dir().join("kwality"),
        }
    }
}

impl_registry!(
    provider_trait: crate::ports::engine::Engine,
    config_type: EngineSettings,
    entry_type: EngineProviderEntry,
    slice_name: ENGINE_PROVIDERS,
    resolve_fn: resolve_engine,
    list_fn: list_engines
);
