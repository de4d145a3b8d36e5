//! Wire DTOs for the submission endpoints.

use serde::{Deserialize, Serialize};
use validator::Validate;

use kwality_domain::entities::{JobState, SourceSpec, ValidationRequest};
use kwality_domain::value_objects::EngineConfig;

/// Body of `POST /api/v1/validate/codebase`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ValidateCodebaseBody {
    /// Submission name
    #[validate(length(min = 1, max = 256))]
    pub name: String,
    /// Where the code comes from
    pub source: SourceSpec,
    /// Engine selection and budgets
    #[serde(default)]
    pub config: EngineConfig,
}

impl From<ValidateCodebaseBody> for ValidationRequest {
    fn from(body: ValidateCodebaseBody) -> Self {
        Self {
            name: body.name,
            source: body.source,
            config: body.config,
        }
    }
}

/// Query parameters of `GET /api/v1/validate`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    /// Only jobs in this state
    pub status: Option<JobState>,
}

/// Body of `GET /health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthBody {
    /// `healthy` or `degraded`
    pub status: &'static str,
    /// Crate version
    pub version: &'static str,
    /// RFC 3339 timestamp
    pub timestamp: String,
}
