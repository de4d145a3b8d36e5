//! Log level carried through the domain log facade.

use derive_more::Display;

/// Severity of a log event dispatched through the facade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display)]
pub enum LogLevel {
    /// Finest-grained events
    #[display("trace")]
    Trace,
    /// Diagnostic events
    #[display("debug")]
    Debug,
    /// Notable lifecycle events
    #[display("info")]
    Info,
    /// Recoverable problems
    #[display("warn")]
    Warn,
    /// Failures
    #[display("error")]
    Error,
}

impl_from_str!(LogLevel, "Unknown log level: {}", {
    "trace" => LogLevel::Trace,
    "debug" => LogLevel::Debug,
    "info" => LogLevel::Info,
    "warn" => LogLevel::Warn,
    "error" => LogLevel::Error,
});
