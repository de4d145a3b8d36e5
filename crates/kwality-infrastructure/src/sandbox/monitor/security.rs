//! Security monitors.
//!
//! Folds syscall, network and file observations into findings under the
//! configured policy. Every violation is `high`; repeated critical-class
//! behavior (an exec attempt combined with network egress, or three or
//! more violations of one class) escalates to `critical`.

use std::collections::BTreeMap;

use kwality_domain::entities::{Finding, Severity};
use kwality_domain::value_objects::SecurityPolicy;

use crate::sandbox::monitor::ObservationEvent;

/// Syscalls whose attempted use marks an execution primitive.
const EXEC_CLASS_SYSCALLS: &[&str] = &["execve", "execveat", "fork", "vfork", "clone"];

/// Violations of one class before the class escalates to critical.
const ESCALATION_THRESHOLD: usize = 3;

/// Folds security observations into findings.
#[derive(Debug)]
pub struct SecurityMonitor {
    policy: SecurityPolicy,
    syscalls: BTreeMap<String, usize>,
    network: BTreeMap<String, usize>,
    files: BTreeMap<String, usize>,
}

impl SecurityMonitor {
    /// Monitor with the given policy.
    #[must_use]
    pub fn new(policy: SecurityPolicy) -> Self {
        Self {
            policy,
            syscalls: BTreeMap::new(),
            network: BTreeMap::new(),
            files: BTreeMap::new(),
        }
    }

    /// Fold one observation. Non-security events are ignored.
    pub fn observe(&mut self, event: &ObservationEvent) {
        match event {
            ObservationEvent::SyscallBlocked { syscall } => {
                if self
                    .policy
                    .blocked_syscalls
                    .iter()
                    .any(|blocked| blocked == syscall)
                {
                    *self.syscalls.entry(syscall.clone()).or_insert(0) += 1;
                }
            }
            ObservationEvent::NetworkConnection { endpoint } => {
                if !self.policy.permits_endpoint(endpoint) {
                    *self.network.entry(endpoint.clone()).or_insert(0) += 1;
                }
            }
            ObservationEvent::FileAccess { path } => {
                if self
                    .policy
                    .sensitive_files
                    .iter()
                    .any(|sensitive| path.starts_with(sensitive.as_str()))
                {
                    *self.files.entry(path.clone()).or_insert(0) += 1;
                }
            }
            ObservationEvent::Sample(_) => {}
        }
    }

    /// Produce the final findings.
    pub fn finalize(self) -> Vec<Finding> {
        let mut findings = Vec::new();

        let syscall_total: usize = self.syscalls.values().sum();
        for (syscall, count) in &self.syscalls {
            let severity = if syscall_total >= ESCALATION_THRESHOLD {
                Severity::Critical
            } else {
                Severity::High
            };
            findings.push(Finding::new(
                severity,
                "security.syscall",
                format!("blocked syscall '{syscall}' attempted {count} time(s)"),
            ));
        }

        let network_total: usize = self.network.values().sum();
        for (endpoint, count) in &self.network {
            let severity = if network_total >= ESCALATION_THRESHOLD {
                Severity::Critical
            } else {
                Severity::High
            };
            findings.push(Finding::new(
                severity,
                "security.network",
                format!("connection to {endpoint} outside the allow-list ({count} attempt(s))"),
            ));
        }

        let file_total: usize = self.files.values().sum();
        for (path, count) in &self.files {
            let severity = if file_total >= ESCALATION_THRESHOLD {
                Severity::Critical
            } else {
                Severity::High
            };
            findings.push(Finding::new(
                severity,
                "security.file_access",
                format!("sensitive path {path} opened {count} time(s)"),
            ));
        }

        // An execution primitive together with network egress is an
        // exfiltration path.
        let exec_attempted = self
            .syscalls
            .keys()
            .any(|s| EXEC_CLASS_SYSCALLS.contains(&s.as_str()));
        if exec_attempted && !self.network.is_empty() {
            findings.push(Finding::new(
                Severity::Critical,
                "security.exec",
                "process execution attempted alongside network egress",
            ));
        }

        findings
    }
}
