//! Configuration: typed sections, file loading and environment overrides.

/// Loader and validation
pub mod loader;
/// Typed configuration sections
pub mod types;

pub use loader::ConfigLoader;
pub use types::{
    AppConfig, LimitsConfig, LoggingConfig, OrchestratorConfig, RuntimeConfig, SecurityConfig,
    ServerConfig, WorkspaceConfig,
};
