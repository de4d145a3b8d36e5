//! Shared handler state.

use std::sync::Arc;

use kwality_application::SubmissionService;

/// State cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    /// Transport-agnostic submission operations
    pub service: Arc<SubmissionService>,
    /// Version reported by `/health`
    pub version: &'static str,
}

impl AppState {
    /// Wrap a submission service.
    pub fn new(service: Arc<SubmissionService>) -> Self {
        Self {
            service,
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}
