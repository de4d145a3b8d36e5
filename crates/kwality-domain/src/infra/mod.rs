//! Hook points the infrastructure layer plugs into at startup.

/// Log facade registration and dispatch
pub mod logging;
