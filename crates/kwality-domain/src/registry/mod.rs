//! Engine auto-registration registry.
//!
//! Engine implementations register themselves at link time via `linkme`
//! distributed slices; the orchestrator resolves the enabled set by name at
//! startup. Registration is immutable after that point.

/// Engine provider registry
pub mod engine;

pub use engine::{
    ENGINE_PROVIDERS, EngineProviderEntry, EngineSettings, list_engines, resolve_engine,
};
