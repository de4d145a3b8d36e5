//! Use cases: aggregation and the submission service.

/// Report aggregation (C10)
pub mod aggregation;
/// Transport-agnostic submission operations (C9)
pub mod submission_service;

pub use aggregation::aggregate;
pub use submission_service::{AdmissionLimits, SubmissionService, SubmitReceipt};
