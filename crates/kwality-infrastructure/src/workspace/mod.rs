//! Workspace materialization (C1).

/// Materializer implementation
pub mod materializer;
/// Path confinement and permission helpers
pub mod paths;

pub use materializer::LocalMaterializer;
pub use paths::normalize_rel_path;
