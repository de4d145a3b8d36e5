//! Error handling types

use thiserror::Error;

/// Result type alias for operations that can fail
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the validation pipeline
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (simple form)
    #[error("I/O error: {source}")]
    IoSimple {
        /// The underlying I/O error
        #[from]
        source: std::io::Error,
    },

    /// I/O operation error (with context)
    #[error("I/O error: {message}")]
    Io {
        /// Description of the I/O error
        message: String,
        /// Optional source error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// JSON parsing or serialization error
    #[error("JSON parsing error: {source}")]
    Json {
        /// The underlying JSON error
        #[from]
        source: serde_json::Error,
    },

    /// Submission failed schema or semantic validation
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// Description of what is wrong with the request
        message: String,
    },

    /// Submission rejected because the job queue is at capacity
    #[error("Admission rejected: queue full")]
    QueueFull,

    /// Submission rejected because it exceeds a configured size cap
    #[error("Admission rejected: {message}")]
    SizeLimit {
        /// Which cap was exceeded and by how much
        message: String,
    },

    /// Submission source is malformed (bad git ref, undecodable archive, ...)
    #[error("Invalid source: {message}")]
    InvalidSource {
        /// Description of the source problem
        message: String,
    },

    /// A materialized path would escape the workspace root
    #[error("Path escapes workspace root: {path}")]
    PathEscape {
        /// The offending path as submitted
        path: String,
    },

    /// Workspace materialization failed for an I/O or extraction reason
    #[error("Materialization failed: {message}")]
    Materialization {
        /// Description of the materialization failure
        message: String,
        /// Optional source error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The sandbox build phase exited non-zero
    #[error("Build failed with exit code {exit_code}")]
    BuildFailed {
        /// Exit code of the build command
        exit_code: i64,
    },

    /// An engine returned an error for this job
    #[error("Engine '{engine}' failed: {message}")]
    EngineFailed {
        /// Name of the failing engine
        engine: String,
        /// Description of the failure
        message: String,
    },

    /// An engine exceeded its deadline plus grace period
    #[error("Engine '{engine}' timed out")]
    EngineTimeout {
        /// Name of the engine that timed out
        engine: String,
    },

    /// An engine panicked while running
    #[error("Engine '{engine}' panicked: {message}")]
    EnginePanic {
        /// Name of the engine that panicked
        engine: String,
        /// Panic payload, when recoverable
        message: String,
    },

    /// The container for a sandbox run could not be started
    #[error("Container start failed: {message}")]
    ContainerStart {
        /// Description of the start failure
        message: String,
        /// Optional source error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A sandbox resource limit was breached in a way that aborted the run
    #[error("Sandbox resource limit: {message}")]
    ResourceLimit {
        /// Which limit was breached
        message: String,
    },

    /// The container runtime itself is unreachable or unhealthy
    #[error("Container runtime unavailable: {message}")]
    RuntimeUnavailable {
        /// Description of the runtime problem
        message: String,
    },

    /// The operation was canceled via its cancellation token
    #[error("Canceled")]
    Canceled,

    /// The job deadline elapsed before the pipeline finished
    #[error("Deadline exceeded")]
    DeadlineExceeded,

    /// Resource not found error
    #[error("Not found: {resource}")]
    NotFound {
        /// The resource that was not found
        resource: String,
    },

    /// The job is already in a terminal state and cannot change
    #[error("Job {job_id} is already terminal")]
    AlreadyTerminal {
        /// Identifier of the terminal job
        job_id: String,
    },

    /// Admissions are paused because the orchestrator is degraded
    #[error("Orchestrator degraded: {message}")]
    Degraded {
        /// Why the orchestrator entered degraded mode
        message: String,
    },

    /// Configuration-related error
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error
        message: String,
        /// Optional source error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Missing configuration field
    #[error("Missing configuration: {0}")]
    ConfigMissing(String),

    /// Invalid configuration value
    #[error("Invalid configuration for '{key}': {message}")]
    ConfigInvalid {
        /// The configuration key that is invalid
        key: String,
        /// Reason why it is invalid
        message: String,
    },

    /// Internal system error
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error
        message: String,
    },
}

// Admission and request error creation methods
impl Error {
    /// Create an invalid request error
    pub fn invalid_request<S: Into<String>>(message: S) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Create a size limit rejection
    pub fn size_limit<S: Into<String>>(message: S) -> Self {
        Self::SizeLimit {
            message: message.into(),
        }
    }

    /// Create an invalid source error
    pub fn invalid_source<S: Into<String>>(message: S) -> Self {
        Self::InvalidSource {
            message: message.into(),
        }
    }

    /// Create a path escape error
    pub fn path_escape<S: Into<String>>(path: S) -> Self {
        Self::PathEscape { path: path.into() }
    }

    /// Create a not found error
    pub fn not_found<S: Into<String>>(resource: S) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }
}

// Materialization error creation methods
impl Error {
    /// Create a materialization error
    pub fn materialization<S: Into<String>>(message: S) -> Self {
        Self::Materialization {
            message: message.into(),
            source: None,
        }
    }

    /// Create a materialization error with source
    pub fn materialization_with_source<
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    >(
        message: S,
        source: E,
    ) -> Self {
        Self::Materialization {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

// Engine error creation methods
impl Error {
    /// Create an engine failure error
    pub fn engine_failed<S: Into<String>, M: Into<String>>(engine: S, message: M) -> Self {
        Self::EngineFailed {
            engine: engine.into(),
            message: message.into(),
        }
    }

    /// Create an engine timeout error
    pub fn engine_timeout<S: Into<String>>(engine: S) -> Self {
        Self::EngineTimeout {
            engine: engine.into(),
        }
    }

    /// Create an engine panic error
    pub fn engine_panic<S: Into<String>, M: Into<String>>(engine: S, message: M) -> Self {
        Self::EnginePanic {
            engine: engine.into(),
            message: message.into(),
        }
    }
}

// Sandbox error creation methods
impl Error {
    /// Create a container start error
    pub fn container_start<S: Into<String>>(message: S) -> Self {
        Self::ContainerStart {
            message: message.into(),
            source: None,
        }
    }

    /// Create a container start error with source
    pub fn container_start_with_source<
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    >(
        message: S,
        source: E,
    ) -> Self {
        Self::ContainerStart {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a resource limit error
    pub fn resource_limit<S: Into<String>>(message: S) -> Self {
        Self::ResourceLimit {
            message: message.into(),
        }
    }

    /// Create a runtime unavailable error
    pub fn runtime_unavailable<S: Into<String>>(message: S) -> Self {
        Self::RuntimeUnavailable {
            message: message.into(),
        }
    }
}

// Configuration and internal error creation methods
impl Error {
    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
            source: None,
        }
    }

    /// Create a configuration error with source
    pub fn configuration_with_source<
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    >(
        message: S,
        source: E,
    ) -> Self {
        Self::Configuration {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an I/O error with context
    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io {
            message: message.into(),
            source: None,
        }
    }

    /// Create an I/O error with source
    pub fn io_with_source<S: Into<String>, E: std::error::Error + Send + Sync + 'static>(
        message: S,
        source: E,
    ) -> Self {
        Self::Io {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl Error {
    /// Whether this error should reject admission synchronously
    /// (no job is created for these).
    pub fn is_admission_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidRequest { .. }
                | Self::QueueFull
                | Self::SizeLimit { .. }
                | Self::InvalidSource { .. }
                | Self::Degraded { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admission_errors_are_flagged() {
        assert!(Error::QueueFull.is_admission_error());
        assert!(Error::invalid_request("bad").is_admission_error());
        assert!(Error::size_limit("too big").is_admission_error());
        assert!(!Error::Canceled.is_admission_error());
        assert!(!Error::engine_timeout("runtime").is_admission_error());
    }

    #[test]
    fn constructor_helpers_carry_their_messages() {
        assert_eq!(
            Error::engine_failed("runtime", "boom").to_string(),
            "Engine 'runtime' failed: boom"
        );
        assert_eq!(
            Error::path_escape("../x").to_string(),
            "Path escapes workspace root: ../x"
        );
        assert_eq!(
            Error::runtime_unavailable("daemon down").to_string(),
            "Container runtime unavailable: daemon down"
        );
    }

    #[test]
    fn io_errors_convert_via_from() {
        let err: Error = std::io::Error::other("disk").into();
        assert!(matches!(err, Error::IoSimple { .. }));
    }
}
