//! # Application Layer
//!
//! Use cases and orchestration for the validation pipeline: the bounded job
//! queue, the worker pool with engine fan-out, the orchestrator lifecycle,
//! result aggregation and the transport-agnostic submission service.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`orchestration`] | Queue, worker pool, execution plan, orchestrator |
//! | [`use_cases`] | Submission service and report aggregation |

/// Queue, worker pool, execution plan and orchestrator
pub mod orchestration;
/// Submission service and aggregation
pub mod use_cases;

pub use orchestration::orchestrator::{Orchestrator, OrchestratorSettings};
pub use use_cases::submission_service::{AdmissionLimits, SubmissionService, SubmitReceipt};
