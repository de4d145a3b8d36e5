//! Submission, retrieval, cancellation and listing handlers.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use validator::Validate;

use kwality_domain::error::Error;
use kwality_domain::ports::ReportFilter;
use kwality_domain::value_objects::JobId;

use crate::dto::{ListQuery, ValidateCodebaseBody};
use crate::error::ApiError;
use crate::state::AppState;

fn parse_job_id(raw: &str) -> Result<JobId, ApiError> {
    JobId::parse(raw).map_err(|_| ApiError(Error::not_found(format!("job {raw}"))))
}

/// `POST /api/v1/validate/codebase` — admit a submission.
pub async fn submit(
    State(state): State<AppState>,
    Json(body): Json<ValidateCodebaseBody>,
) -> Result<impl IntoResponse, ApiError> {
    body.validate()
        .map_err(|e| ApiError(Error::invalid_request(e.to_string())))?;
    let receipt = state.service.submit(body.into())?;
    Ok((StatusCode::ACCEPTED, Json(receipt)))
}

/// `GET /api/v1/validate/{id}` — poll a report.
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let job_id = parse_job_id(&id)?;
    let report = state.service.get(&job_id)?;
    Ok(Json(report))
}

/// `DELETE /api/v1/validate/{id}` — cancel a job.
pub async fn cancel(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let job_id = parse_job_id(&id)?;
    state.service.cancel(&job_id)?;
    Ok(Json(serde_json::json!({ "canceled": true })))
}

/// `GET /api/v1/validate` — list report summaries.
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> impl IntoResponse {
    let summaries = state.service.list(&ReportFilter {
        status: query.status,
    });
    Json(summaries)
}
