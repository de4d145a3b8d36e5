//! Languages the pipeline can detect and sandbox.

use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Programming language of a submission or file.
///
/// `Unknown` downgrades the runtime sandbox to a metadata-only pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// Go
    #[display("go")]
    Go,
    /// Rust
    #[display("rust")]
    Rust,
    /// Python
    #[display("python")]
    Python,
    /// JavaScript
    #[display("javascript")]
    JavaScript,
    /// TypeScript
    #[display("typescript")]
    TypeScript,
    /// Java
    #[display("java")]
    Java,
    /// Not recognized
    #[display("unknown")]
    Unknown,
}

impl_from_str!(Language, "Unknown language: {}", {
    "go" => Language::Go,
    "rust" => Language::Rust,
    "python" => Language::Python,
    "javascript" => Language::JavaScript,
    "js" => Language::JavaScript,
    "typescript" => Language::TypeScript,
    "ts" => Language::TypeScript,
    "java" => Language::Java,
    "unknown" => Language::Unknown,
});

impl Language {
    /// File extensions conventionally carrying this language.
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Self::Go => &["go"],
            Self::Rust => &["rs"],
            Self::Python => &["py"],
            Self::JavaScript => &["js", "mjs", "cjs"],
            Self::TypeScript => &["ts", "tsx"],
            Self::Java => &["java"],
            Self::Unknown => &[],
        }
    }

    /// Guess a language from a file extension.
    pub fn from_extension(ext: &str) -> Self {
        match ext {
            "go" => Self::Go,
            "rs" => Self::Rust,
            "py" => Self::Python,
            "js" | "mjs" | "cjs" => Self::JavaScript,
            "ts" | "tsx" => Self::TypeScript,
            "java" => Self::Java,
            _ => Self::Unknown,
        }
    }
}
