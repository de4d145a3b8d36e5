//! Materialized workspace handle.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::value_objects::Language;

/// A materialized, read-only on-disk copy of a submission.
///
/// Created by the workspace materializer, owned by exactly one job, and
/// destroyed when the job reaches a terminal state unless retention was
/// requested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    /// Absolute root of the materialized tree
    pub root: PathBuf,
    /// 64-hex sha256 content fingerprint over the canonical file list
    pub fingerprint: String,
    /// Number of materialized files
    pub file_count: usize,
    /// Total materialized bytes
    pub total_bytes: u64,
    /// Languages detected during materialization, most common first
    pub languages: Vec<Language>,
    /// Keep the tree on disk past the job's terminal state
    pub retain: bool,
}

impl Workspace {
    /// Root path of the tree.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Short 32-hex form of the fingerprint, used in identifiers and labels.
    pub fn short_fingerprint(&self) -> &str {
        &self.fingerprint[..self.fingerprint.len().min(32)]
    }
}
