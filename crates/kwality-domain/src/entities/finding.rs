//! Findings: single observations emitted by engines, with severity,
//! optional source location and optional raw evidence.

use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Severity of a finding. Variant order defines `Ord`, lowest first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational, does not affect the score
    #[display("info")]
    Info,
    /// Minor issue
    #[display("low")]
    Low,
    /// Issue worth fixing
    #[display("medium")]
    Medium,
    /// Serious issue
    #[display("high")]
    High,
    /// Must-fix issue; caps the overall score
    #[display("critical")]
    Critical,
}

impl Severity {
    /// Numeric weight used by scoring: `{info:0, low:1, medium:3, high:7, critical:15}`.
    pub fn weight(&self) -> u32 {
        match self {
            Self::Info => 0,
            Self::Low => 1,
            Self::Medium => 3,
            Self::High => 7,
            Self::Critical => 15,
        }
    }
}

impl_from_str!(Severity, "Unknown severity: {}", {
    "info" => Severity::Info,
    "low" => Severity::Low,
    "medium" => Severity::Medium,
    "high" => Severity::High,
    "critical" => Severity::Critical,
});

/// Source position a finding refers to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FindingLocation {
    /// Workspace-relative file path
    pub path: String,
    /// 1-based line, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    /// 1-based column, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
}

/// Serde adapter encoding evidence bytes as base64 on the wire.
mod evidence_base64 {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

    pub fn serialize<S: Serializer>(
        value: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(bytes) => serializer.serialize_str(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        let text = Option::<String>::deserialize(deserializer)?;
        text.map(|t| STANDARD.decode(t).map_err(D::Error::custom))
            .transpose()
    }
}

/// One observation produced by an engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    /// How serious the observation is
    pub severity: Severity,
    /// Machine-readable category, e.g. `security.network` or `performance.memory`
    pub category: String,
    /// Human-readable message
    pub message: String,
    /// Source position, when the finding refers to one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<FindingLocation>,
    /// Raw evidence bytes (base64 on the wire), e.g. a crashing fuzz input
    #[serde(default, with = "evidence_base64", skip_serializing_if = "Option::is_none")]
    pub evidence: Option<Vec<u8>>,
}

impl Finding {
    /// Create a finding without location or evidence.
    pub fn new<C: Into<String>, M: Into<String>>(
        severity: Severity,
        category: C,
        message: M,
    ) -> Self {
        Self {
            severity,
            category: category.into(),
            message: message.into(),
            location: None,
            evidence: None,
        }
    }

    /// Attach a source location.
    #[must_use]
    pub fn with_location<P: Into<String>>(mut self, path: P, line: Option<u32>) -> Self {
        self.location = Some(FindingLocation {
            path: path.into(),
            line,
            column: None,
        });
        self
    }

    /// Attach raw evidence, truncated to `cap_bytes`.
    #[must_use]
    pub fn with_evidence(mut self, mut evidence: Vec<u8>, cap_bytes: usize) -> Self {
        evidence.truncate(cap_bytes);
        self.evidence = Some(evidence);
        self
    }

    /// Dedup key per the aggregation contract: `(category, location)` within
    /// an engine.
    pub fn dedup_key(&self) -> (String, Option<String>, Option<u32>) {
        (
            self.category.clone(),
            self.location.as_ref().map(|l| l.path.clone()),
            self.location.as_ref().and_then(|l| l.line),
        )
    }
}
