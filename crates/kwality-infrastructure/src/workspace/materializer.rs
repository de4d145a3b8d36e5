//! Local workspace materializer.
//!
//! Turns a submission into a read-only tree under `${workDir}/ws/<jobId>/`
//! and computes its content fingerprint. All materialization errors are
//! fatal to the job.

use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use flate2::read::GzDecoder;
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use kwality_domain::entities::{
    ArchiveFormat, SourceFile, SourceSpec, ValidationRequest, Workspace,
};
use kwality_domain::error::{Error, Result};
use kwality_domain::mask_id;
use kwality_domain::ports::WorkspaceMaterializer;
use kwality_domain::value_objects::{JobId, Language};

use crate::config::LimitsConfig;
use crate::workspace::paths::{normalize_rel_path, set_tree_readonly, set_tree_writable};

/// Result of scanning a materialized tree.
struct TreeScan {
    fingerprint: String,
    file_count: usize,
    total_bytes: u64,
    languages: Vec<Language>,
}

/// Materializer writing under a configured work directory.
pub struct LocalMaterializer {
    work_dir: PathBuf,
    limits: LimitsConfig,
}

impl LocalMaterializer {
    /// Create a materializer rooted at `work_dir`.
    pub fn new(work_dir: PathBuf, limits: LimitsConfig) -> Self {
        Self { work_dir, limits }
    }

    fn ws_root(&self, job_id: JobId) -> PathBuf {
        self.work_dir.join("ws").join(job_id.as_str())
    }

    fn job_scratch_root(&self, job_id: JobId) -> PathBuf {
        self.work_dir.join("scratch").join(job_id.as_str())
    }

    async fn write_inline(&self, root: &Path, files: &[SourceFile]) -> Result<()> {
        if files.is_empty() {
            return Err(Error::invalid_source("inline submission has no files"));
        }
        if files.len() > self.limits.max_files {
            return Err(Error::size_limit(format!(
                "{} files exceed the cap of {}",
                files.len(),
                self.limits.max_files
            )));
        }
        let mut total: u64 = 0;
        for file in files {
            let rel = normalize_rel_path(&file.path)?;
            let bytes = file.content.len() as u64;
            if bytes > self.limits.max_file_bytes {
                return Err(Error::size_limit(format!(
                    "file '{}' exceeds the per-file cap",
                    file.path
                )));
            }
            total += bytes;
            if total > self.limits.max_codebase_bytes {
                return Err(Error::size_limit("submission exceeds the total size cap"));
            }

            let target = root.join(&rel);
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&target, &file.content).await?;
        }
        Ok(())
    }

    /// Shallow-fetch a pinned commit with the git CLI.
    ///
    /// `git clone --depth 1` only reaches refs, so a pinned SHA is fetched
    /// into a fresh repository instead.
    async fn clone_git(&self, root: &Path, url: &str, reference: &str) -> Result<()> {
        if reference.len() != 40 || !reference.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::invalid_source(
                "git ref must be a full 40-hex commit SHA",
            ));
        }
        tokio::fs::create_dir_all(root).await?;
        run_git(root, &["init", "--quiet"]).await?;
        run_git(root, &["remote", "add", "origin", url]).await?;
        run_git(root, &["fetch", "--quiet", "--depth", "1", "origin", reference]).await?;
        run_git(root, &["checkout", "--quiet", "FETCH_HEAD"]).await?;
        // Submodules are never initialized; the .git directory is not part
        // of the materialized view.
        let git_dir = root.join(".git");
        if git_dir.exists() {
            tokio::fs::remove_dir_all(&git_dir).await?;
        }
        Ok(())
    }

    fn extract_archive(
        root: &Path,
        data: &str,
        format: ArchiveFormat,
        limits: &LimitsConfig,
    ) -> Result<()> {
        let ArchiveFormat::TarGz = format;
        let bytes = BASE64
            .decode(data)
            .map_err(|e| Error::invalid_source(format!("archive is not valid base64: {e}")))?;

        let decoder = GzDecoder::new(bytes.as_slice());
        let mut archive = tar::Archive::new(decoder);
        let mut total: u64 = 0;
        let mut count: usize = 0;

        let entries = archive
            .entries()
            .map_err(|e| Error::materialization_with_source("unreadable archive", e))?;
        for entry in entries {
            let mut entry =
                entry.map_err(|e| Error::materialization_with_source("corrupt archive entry", e))?;

            let entry_type = entry.header().entry_type();
            let raw_path = entry
                .path()
                .map_err(|e| Error::materialization_with_source("bad entry path", e))?
                .to_string_lossy()
                .into_owned();
            let rel = normalize_rel_path(&raw_path)?;
            let target = root.join(&rel);

            match entry_type {
                tar::EntryType::Directory => {
                    std::fs::create_dir_all(&target)?;
                    continue;
                }
                tar::EntryType::Regular => {}
                // Links could point anywhere on the host.
                _ => {
                    return Err(Error::path_escape(format!(
                        "{raw_path} (unsupported entry type)"
                    )));
                }
            }

            let size = entry.header().size().unwrap_or(0);
            if size > limits.max_file_bytes {
                return Err(Error::size_limit(format!(
                    "archive entry '{raw_path}' exceeds the per-file cap"
                )));
            }
            count += 1;
            if count > limits.max_files {
                return Err(Error::size_limit("archive exceeds the file count cap"));
            }
            total += size;
            if total > limits.max_codebase_bytes {
                return Err(Error::size_limit("archive exceeds the total size cap"));
            }

            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut out = std::fs::File::create(&target)?;
            // Cap the copy at the declared size so a lying header cannot
            // balloon past the limit.
            let mut limited = entry.by_ref().take(size);
            std::io::copy(&mut limited, &mut out)?;
        }
        Ok(())
    }

    /// Walk the tree: fingerprint, counts, language census, symlink checks.
    fn scan_tree(root: &Path, limits: &LimitsConfig) -> Result<TreeScan> {
        let canonical_root = root
            .canonicalize()
            .map_err(|e| Error::materialization_with_source("workspace root missing", e))?;

        let mut files: Vec<(String, PathBuf)> = Vec::new();
        for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                Error::materialization_with_source("workspace walk failed", e)
            })?;
            let rel = entry
                .path()
                .strip_prefix(root)
                .map_err(|e| Error::materialization_with_source("path outside root", e))?;
            if rel.as_os_str().is_empty() {
                continue;
            }

            if entry.path_is_symlink() {
                let resolved = entry.path().canonicalize().map_err(|e| {
                    Error::materialization_with_source("dangling symlink", e)
                })?;
                if !resolved.starts_with(&canonical_root) {
                    return Err(Error::path_escape(rel.display().to_string()));
                }
                continue;
            }
            if entry.file_type().is_file() {
                files.push((
                    rel.to_string_lossy().replace('\\', "/"),
                    entry.path().to_path_buf(),
                ));
            }
        }

        if files.len() > limits.max_files {
            return Err(Error::size_limit("materialized tree exceeds the file cap"));
        }

        let mut hasher = Sha256::new();
        let mut total_bytes: u64 = 0;
        let mut census: HashMap<Language, usize> = HashMap::new();
        for (rel, path) in &files {
            let content = std::fs::read(path)?;
            total_bytes += content.len() as u64;
            if total_bytes > limits.max_codebase_bytes {
                return Err(Error::size_limit("materialized tree exceeds the size cap"));
            }
            let file_hash = kwality_domain::compute_bytes_hash(&content);
            hasher.update(rel.as_bytes());
            hasher.update(b"\n");
            hasher.update(file_hash.as_bytes());
            hasher.update(b"\n");

            if let Some(ext) = Path::new(rel).extension().and_then(|e| e.to_str()) {
                let language = Language::from_extension(ext);
                if language != Language::Unknown {
                    *census.entry(language).or_insert(0) += 1;
                }
            }
        }

        let mut ranked: Vec<(Language, usize)> = census.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.to_string().cmp(&b.0.to_string())));

        Ok(TreeScan {
            fingerprint: hex::encode(hasher.finalize()),
            file_count: files.len(),
            total_bytes,
            languages: ranked.into_iter().map(|(l, _)| l).collect(),
        })
    }

    async fn cleanup_partial(&self, root: &Path) {
        let _ = set_tree_writable(root);
        let _ = tokio::fs::remove_dir_all(root).await;
    }
}

async fn run_git(dir: &Path, args: &[&str]) -> Result<()> {
    let output = tokio::process::Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_TERMINAL_PROMPT", "0")
        .output()
        .await
        .map_err(|e| Error::materialization_with_source("git not available", e))?;
    if output.status.success() {
        Ok(())
    } else {
        Err(Error::invalid_source(format!(
            "git {} failed: {}",
            args.first().copied().unwrap_or_default(),
            String::from_utf8_lossy(&output.stderr).trim()
        )))
    }
}

#[async_trait]
impl WorkspaceMaterializer for LocalMaterializer {
    async fn materialize(&self, job_id: JobId, request: &ValidationRequest) -> Result<Workspace> {
        let root = self.ws_root(job_id);
        tokio::fs::create_dir_all(&root).await?;

        let write_result = match &request.source {
            SourceSpec::Inline { files } => self.write_inline(&root, files).await,
            SourceSpec::Git { url, reference, .. } => {
                self.clone_git(&root, url, reference).await
            }
            SourceSpec::Archive { data, format } => {
                let root = root.clone();
                let data = data.clone();
                let format = *format;
                let limits = self.limits.clone();
                tokio::task::spawn_blocking(move || {
                    Self::extract_archive(&root, &data, format, &limits)
                })
                .await
                .map_err(|e| Error::internal(format!("archive extraction task: {e}")))?
            }
        };
        if let Err(err) = write_result {
            self.cleanup_partial(&root).await;
            return Err(err);
        }

        let scan = {
            let root = root.clone();
            let limits = self.limits.clone();
            tokio::task::spawn_blocking(move || Self::scan_tree(&root, &limits))
                .await
                .map_err(|e| Error::internal(format!("workspace scan task: {e}")))?
        };
        let scan = match scan {
            Ok(scan) => scan,
            Err(err) => {
                self.cleanup_partial(&root).await;
                return Err(err);
            }
        };

        // Hand-off is read-only; engines get scratch space elsewhere.
        if let Err(err) = set_tree_readonly(&root) {
            self.cleanup_partial(&root).await;
            return Err(Error::materialization_with_source(
                "could not make workspace read-only",
                err,
            ));
        }

        kwality_domain::info!(
            "materializer",
            "Workspace materialized",
            &format!(
                "job = {}, files = {}, bytes = {}, fingerprint = {}",
                mask_id(&job_id.as_str()),
                scan.file_count,
                scan.total_bytes,
                &scan.fingerprint[..16]
            )
        );

        Ok(Workspace {
            root,
            fingerprint: scan.fingerprint,
            file_count: scan.file_count,
            total_bytes: scan.total_bytes,
            languages: scan.languages,
            retain: request.config.retain_workspace,
        })
    }

    async fn destroy(&self, workspace: &Workspace) -> Result<()> {
        // Scratch is never retained.
        if let Some(job_dir) = workspace
            .root
            .file_name()
            .map(|n| self.work_dir.join("scratch").join(n))
        {
            let _ = tokio::fs::remove_dir_all(&job_dir).await;
        }

        if workspace.retain {
            return Ok(());
        }
        if workspace.root.exists() {
            set_tree_writable(&workspace.root)
                .map_err(|e| Error::io_with_source("restoring write permission", e))?;
            tokio::fs::remove_dir_all(&workspace.root).await?;
        }
        Ok(())
    }

    fn scratch_dir(&self, job_id: JobId, engine: &str) -> PathBuf {
        let dir = self.job_scratch_root(job_id).join(engine);
        let _ = std::fs::create_dir_all(&dir);
        dir
    }
}
