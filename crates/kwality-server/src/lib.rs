//! # HTTP Facade
//!
//! Axum router exposing the submission API:
//!
//! | Route | Operation |
//! |-------|-----------|
//! | `POST /api/v1/validate/codebase` | Submit a codebase (202) |
//! | `GET /api/v1/validate/{id}` | Poll a report |
//! | `DELETE /api/v1/validate/{id}` | Cancel a job |
//! | `GET /api/v1/validate` | List report summaries |
//! | `GET /health` | Service health |
//!
//! Retrieval is poll-based only.

/// Wire DTOs
pub mod dto;
/// Error to HTTP status mapping
pub mod error;
/// Request handlers
pub mod handlers;
/// Router assembly
pub mod routes;
/// Shared handler state
pub mod state;

pub use routes::router;
pub use state::AppState;
