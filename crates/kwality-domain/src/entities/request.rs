//! Submission shapes accepted by the pipeline.
//!
//! A [`ValidationRequest`] is immutable once admitted: workers and engines
//! only ever read it.

use serde::{Deserialize, Serialize};

use crate::value_objects::{EngineConfig, Language};

/// One inline-submitted file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceFile {
    /// Workspace-relative path; validated against escapes at materialization
    pub path: String,
    /// Full file content
    pub content: String,
    /// Declared language, when the submitter knows it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<Language>,
}

/// Archive container formats accepted for `archive` submissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveFormat {
    /// Gzip-compressed tarball
    #[default]
    #[serde(rename = "tar.gz")]
    TarGz,
}

/// Where the code to validate comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceSpec {
    /// Files carried in the request body
    Inline {
        /// Submitted files
        files: Vec<SourceFile>,
    },
    /// Shallow clone of a git repository at a pinned commit
    Git {
        /// Clone URL
        url: String,
        /// Full 40-hex commit SHA; branch names are rejected
        #[serde(rename = "ref")]
        reference: String,
        /// Clone depth; anything submitted is clamped to 1
        #[serde(default = "default_depth")]
        depth: u32,
    },
    /// Uploaded archive, base64 on the wire
    Archive {
        /// Base64-encoded archive bytes
        data: String,
        /// Container format
        #[serde(default)]
        format: ArchiveFormat,
    },
}

fn default_depth() -> u32 {
    1
}

impl SourceSpec {
    /// Short label used in logs and metadata.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Inline { .. } => "inline",
            Self::Git { .. } => "git",
            Self::Archive { .. } => "archive",
        }
    }
}

/// A submission: name, source and engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRequest {
    /// Human-readable submission name
    pub name: String,
    /// Where the code comes from
    pub source: SourceSpec,
    /// Engine selection and budgets
    #[serde(default)]
    pub config: EngineConfig,
}
