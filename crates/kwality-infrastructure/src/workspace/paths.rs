//! Path confinement and tree permission helpers.

use std::path::{Component, Path, PathBuf};

use kwality_domain::constants::MAX_PATH_LENGTH;
use kwality_domain::error::{Error, Result};

/// Normalize a submitted relative path.
///
/// # Errors
///
/// Rejects empty paths, paths longer than the cap, absolute paths, drive
/// prefixes and any `..` component with [`Error::PathEscape`] or
/// [`Error::InvalidRequest`].
pub fn normalize_rel_path(raw: &str) -> Result<PathBuf> {
    if raw.is_empty() {
        return Err(Error::invalid_request("empty path"));
    }
    if raw.len() > MAX_PATH_LENGTH {
        return Err(Error::invalid_request(format!(
            "path longer than {MAX_PATH_LENGTH} bytes"
        )));
    }

    let path = Path::new(raw);
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => normalized.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(Error::path_escape(raw));
            }
        }
    }
    if normalized.as_os_str().is_empty() {
        return Err(Error::invalid_request(format!("path '{raw}' is empty")));
    }
    Ok(normalized)
}

/// Verify that an on-disk path resolves below `root` after following links.
///
/// # Errors
///
/// [`Error::PathEscape`] when the resolved path leaves the root.
pub fn ensure_descendant(root: &Path, candidate: &Path) -> Result<()> {
    let root = root
        .canonicalize()
        .map_err(|e| Error::materialization_with_source("workspace root missing", e))?;
    let resolved = candidate
        .canonicalize()
        .map_err(|e| Error::materialization_with_source("path does not resolve", e))?;
    if resolved.starts_with(&root) {
        Ok(())
    } else {
        Err(Error::path_escape(candidate.display().to_string()))
    }
}

#[cfg(unix)]
fn apply_mode(path: &Path, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
}

/// Make the whole tree read-only (files 0444, directories 0555).
///
/// Directories are flipped after their contents so the walk itself is not
/// blocked.
pub fn set_tree_readonly(root: &Path) -> std::io::Result<()> {
    for entry in walkdir::WalkDir::new(root).contents_first(true) {
        let entry = entry.map_err(std::io::Error::other)?;
        let mode = if entry.file_type().is_dir() { 0o555 } else { 0o444 };
        apply_mode(entry.path(), mode)?;
    }
    Ok(())
}

/// Restore write permission (files 0644, directories 0755) so the tree can
/// be removed.
pub fn set_tree_writable(root: &Path) -> std::io::Result<()> {
    for entry in walkdir::WalkDir::new(root).contents_first(false) {
        let entry = entry.map_err(std::io::Error::other)?;
        let mode = if entry.file_type().is_dir() { 0o755 } else { 0o644 };
        apply_mode(entry.path(), mode)?;
    }
    Ok(())
}
