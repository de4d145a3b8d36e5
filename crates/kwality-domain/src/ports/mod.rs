//! Port interfaces implemented by the outer layers.

/// Container runtime port
pub mod container;
/// Engine contract
pub mod engine;
/// Log level for the domain log facade
pub mod logging;
/// Workspace materializer port
pub mod materializer;
/// Report store and job event ports
pub mod store;

pub use container::{ContainerRuntime, ContainerSpec, ContainerStats, ExecOutput};
pub use engine::{Engine, EngineContext};
pub use logging::LogLevel;
pub use materializer::WorkspaceMaterializer;
pub use store::{JobEvent, JobEventSink, ReportFilter, ReportStore};
