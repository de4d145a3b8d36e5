//! Seccomp profile generation.
//!
//! The block list from the security policy becomes a docker seccomp profile
//! with `SCMP_ACT_ERRNO` for the listed syscalls; attempts surface in the
//! kernel audit stream where the syscall monitor picks them up.

use std::path::{Path, PathBuf};

use serde_json::json;

use kwality_domain::error::Result;

/// Render the seccomp profile JSON for a block list.
pub fn render_profile(blocked_syscalls: &[String]) -> serde_json::Value {
    json!({
        "defaultAction": "SCMP_ACT_ALLOW",
        "architectures": ["SCMP_ARCH_X86_64", "SCMP_ARCH_AARCH64"],
        "syscalls": [
            {
                "names": blocked_syscalls,
                "action": "SCMP_ACT_ERRNO",
                "errnoRet": 1
            }
        ]
    })
}

/// Write the profile into `dir` and return its path.
///
/// # Errors
///
/// I/O errors while writing the profile file.
pub fn write_profile(dir: &Path, blocked_syscalls: &[String]) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join("seccomp.json");
    let profile = render_profile(blocked_syscalls);
    std::fs::write(&path, serde_json::to_vec_pretty(&profile)?)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_lists_blocked_syscalls_with_errno() {
        let blocked = vec!["ptrace".to_owned(), "mount".to_owned()];
        let profile = render_profile(&blocked);
        assert_eq!(profile["defaultAction"], "SCMP_ACT_ALLOW");
        assert_eq!(profile["syscalls"][0]["action"], "SCMP_ACT_ERRNO");
        assert_eq!(profile["syscalls"][0]["names"][0], "ptrace");
        assert_eq!(profile["syscalls"][0]["names"][1], "mount");
    }

    #[test]
    fn write_profile_creates_the_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_profile(dir.path(), &["ptrace".to_owned()]).expect("written");
        let content = std::fs::read_to_string(path).expect("readable");
        assert!(content.contains("SCMP_ACT_ERRNO"));
    }
}
