//! Structured logging with tracing.
//!
//! Configures the global subscriber from [`LoggingConfig`] and registers the
//! shim that forwards the domain log facade into `tracing`.

mod setup;

pub use setup::{init_logging, install_log_facade, log_facade_shim};
