//! Domain error to HTTP response mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use kwality_domain::error::Error;

/// Wrapper giving domain errors an HTTP shape.
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

/// Status mapping: 400/404/409/429/500/503.
fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::InvalidRequest { .. }
        | Error::InvalidSource { .. }
        | Error::PathEscape { .. }
        | Error::SizeLimit { .. }
        | Error::Json { .. } => StatusCode::BAD_REQUEST,
        Error::NotFound { .. } => StatusCode::NOT_FOUND,
        Error::AlreadyTerminal { .. } => StatusCode::CONFLICT,
        Error::QueueFull => StatusCode::TOO_MANY_REQUESTS,
        Error::Degraded { .. } | Error::RuntimeUnavailable { .. } => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        Error::IoSimple { .. }
        | Error::Io { .. }
        | Error::Materialization { .. }
        | Error::BuildFailed { .. }
        | Error::EngineFailed { .. }
        | Error::EngineTimeout { .. }
        | Error::EnginePanic { .. }
        | Error::ContainerStart { .. }
        | Error::ResourceLimit { .. }
        | Error::Canceled
        | Error::DeadlineExceeded
        | Error::Configuration { .. }
        | Error::ConfigMissing(_)
        | Error::ConfigInvalid { .. }
        | Error::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        let body = Json(json!({
            "error": self.0.to_string(),
            "status": status.as_u16(),
        }));
        (status, body).into_response()
    }
}
