//! Language profiles for sandbox runs.
//!
//! A profile selects the base image, the build command and the entry
//! command for a detected language. Unknown languages downgrade the run to
//! a metadata-only pass.

use std::path::Path;

use kwality_domain::value_objects::Language;

/// How to build and run one language inside the sandbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageProfile {
    /// Language this profile covers
    pub language: Language,
    /// Base image
    pub image: &'static str,
    /// Build command, when the language has a build phase
    pub build: Option<&'static [&'static str]>,
    /// Entry command template; `{entry}` is replaced by the entry file
    pub run: &'static [&'static str],
    /// Candidate entry files, most specific first
    pub entry_candidates: &'static [&'static str],
    /// Toolchain environment pinned into the container; everything writable
    /// points at the tmpfs scratch mount
    pub env: &'static [(&'static str, &'static str)],
}

const GO_BUILD: &[&str] = &["go", "build", "./..."];
const GO_RUN: &[&str] = &["go", "run", "."];
const RUST_BUILD: &[&str] = &["cargo", "build", "--quiet"];
const RUST_RUN: &[&str] = &["cargo", "run", "--quiet"];
const PYTHON_RUN: &[&str] = &["python", "{entry}"];
const NODE_RUN: &[&str] = &["node", "{entry}"];
const JAVA_BUILD: &[&str] = &["sh", "-c", "javac $(find . -name '*.java')"];
const JAVA_RUN: &[&str] = &["java", "Main"];

const COMMON_ENV: [(&str, &str); 2] = [("HOME", "/scratch"), ("TMPDIR", "/scratch")];

static PROFILES: &[LanguageProfile] = &[
    LanguageProfile {
        language: Language::Go,
        image: "golang:1.22-alpine",
        build: Some(GO_BUILD),
        run: GO_RUN,
        entry_candidates: &["main.go"],
        env: &[
            ("GOCACHE", "/scratch/gocache"),
            ("GOPATH", "/scratch/go"),
            ("GOFLAGS", "-mod=mod"),
        ],
    },
    LanguageProfile {
        language: Language::Rust,
        image: "rust:1.79-slim",
        build: Some(RUST_BUILD),
        run: RUST_RUN,
        entry_candidates: &["src/main.rs", "main.rs"],
        env: &[
            ("CARGO_HOME", "/scratch/cargo"),
            ("CARGO_TARGET_DIR", "/scratch/target"),
        ],
    },
    LanguageProfile {
        language: Language::Python,
        image: "python:3.12-alpine",
        build: None,
        run: PYTHON_RUN,
        entry_candidates: &["main.py", "app.py", "__main__.py"],
        env: &[("PYTHONDONTWRITEBYTECODE", "1")],
    },
    LanguageProfile {
        language: Language::JavaScript,
        image: "node:20-alpine",
        build: None,
        run: NODE_RUN,
        entry_candidates: &["index.js", "main.js", "app.js"],
        env: &[("NPM_CONFIG_CACHE", "/scratch/npm")],
    },
    LanguageProfile {
        language: Language::TypeScript,
        image: "node:20-alpine",
        build: None,
        run: NODE_RUN,
        entry_candidates: &["index.js", "main.js"],
        env: &[("NPM_CONFIG_CACHE", "/scratch/npm")],
    },
    LanguageProfile {
        language: Language::Java,
        image: "eclipse-temurin:21",
        build: Some(JAVA_BUILD),
        run: JAVA_RUN,
        entry_candidates: &["Main.java"],
        env: &[],
    },
];

impl LanguageProfile {
    /// Profile for a language, if one exists.
    pub fn for_language(language: Language) -> Option<&'static Self> {
        PROFILES.iter().find(|p| p.language == language)
    }

    /// Build command, already split.
    pub fn build_command(&self) -> Option<Vec<String>> {
        self.build
            .map(|parts| parts.iter().map(|s| (*s).to_owned()).collect())
    }

    /// Environment pinned into the container: the common scratch-backed
    /// variables plus the language's toolchain settings.
    pub fn container_env(&self) -> std::collections::BTreeMap<String, String> {
        COMMON_ENV
            .iter()
            .chain(self.env.iter())
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    /// Entry command with the entry file substituted.
    pub fn run_command(&self, entry: &str) -> Vec<String> {
        self.run
            .iter()
            .map(|part| {
                if *part == "{entry}" {
                    entry.to_owned()
                } else {
                    (*part).to_owned()
                }
            })
            .collect()
    }

    /// Pick the entry file from the workspace: first candidate that exists,
    /// falling back to the lexicographically first source of the language.
    pub fn resolve_entry(&self, workspace_root: &Path) -> Option<String> {
        for candidate in self.entry_candidates {
            if workspace_root.join(candidate).is_file() {
                return Some((*candidate).to_owned());
            }
        }
        let mut sources: Vec<String> = walkdir::WalkDir::new(workspace_root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .filter(|e| {
                e.path()
                    .extension()
                    .and_then(|x| x.to_str())
                    .is_some_and(|ext| self.language.extensions().contains(&ext))
            })
            .filter_map(|e| {
                e.path()
                    .strip_prefix(workspace_root)
                    .ok()
                    .map(|p| p.to_string_lossy().into_owned())
            })
            .collect();
        sources.sort();
        sources.into_iter().next()
    }
}
