//! Containerized runtime sandbox (C3).
//!
//! One sandbox run = one container. The workspace is mounted read-only, a
//! tmpfs scratch mount is the only writable surface, the resource envelope
//! is enforced by the container runtime, and the sandbox re-enforces
//! wall-clock itself as defense in depth. Monitors observe performance and
//! security events while the entry command runs.

/// Docker CLI container runtime
pub mod container;
/// Runtime engine implementing the engine contract
pub mod engine;
/// Optional fuzzing pass
pub mod fuzz;
/// Performance and security monitors
pub mod monitor;
/// Language profiles
pub mod profile;
/// Seccomp profile generation
pub mod seccomp;
/// Sandbox run state machine
pub mod state;

pub use container::DockerCli;
pub use engine::RuntimeEngine;
pub use profile::LanguageProfile;
pub use state::SandboxState;
