//! # Infrastructure Layer
//!
//! Adapters behind the domain ports: configuration loading, structured
//! logging, workspace materialization, the in-memory report store, the
//! bundled analysis engines and the containerized runtime sandbox.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`config`] | Typed configuration, file loading and env overrides |
//! | [`logging`] | Tracing setup and the domain log facade shim |
//! | [`workspace`] | Workspace materializer (inline, git, archive) |
//! | [`store`] | In-memory report store with retention |
//! | [`engines`] | Static analysis and security scanner engines |
//! | [`sandbox`] | Containerized runtime validator |
//! | [`runtime_validator`] | Request/result facade for the standalone binary |

/// Typed configuration and loader
pub mod config;
/// Bundled analysis engines
pub mod engines;
/// Tracing setup and log facade shim
pub mod logging;
/// Request/result facade for the `runtime-validator` binary
pub mod runtime_validator;
/// Containerized runtime sandbox
pub mod sandbox;
/// In-memory report store
pub mod store;
/// Workspace materializer
pub mod workspace;

pub use config::{AppConfig, ConfigLoader};
pub use logging::init_logging;
pub use store::MemoryReportStore;
pub use workspace::LocalMaterializer;
