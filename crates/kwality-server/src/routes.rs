//! Router assembly.

use axum::Router;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use crate::handlers::{health, validate};
use crate::state::AppState;

/// Build the full API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/validate/codebase", post(validate::submit))
        .route("/api/v1/validate", get(validate::list))
        .route(
            "/api/v1/validate/{id}",
            get(validate::get).delete(validate::cancel),
        )
        .route("/health", get(health::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
