//! Request handlers.

/// Health endpoint
pub mod health;
/// Submission endpoints
pub mod validate;
