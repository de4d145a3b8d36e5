//! Health endpoint.

use axum::Json;
use axum::extract::State;
use axum::response::IntoResponse;

use crate::dto::HealthBody;
use crate::state::AppState;

/// `GET /health` — liveness plus admission status.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let status = if state.service.is_accepting() {
        "healthy"
    } else {
        "degraded"
    };
    Json(HealthBody {
        status,
        version: state.version,
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}
