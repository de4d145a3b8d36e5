//! Production observation sources.
//!
//! Each source is a spawned task pushing [`ObservationEvent`]s into the
//! run's channel until the sandbox cancels it:
//!
//! - stats poller: container runtime stats at 1 Hz
//! - net sampler: `/proc/net/tcp` inside the container at 1 Hz
//! - fd sampler: open file descriptors inside the container at 1 Hz
//! - audit scanner: kernel audit lines (`type=1326`) for seccomp denials

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use kwality_domain::ports::ContainerRuntime;

use crate::sandbox::monitor::ObservationEvent;

/// Sampling interval for all pollers.
pub const SAMPLE_INTERVAL: Duration = Duration::from_secs(1);

/// Poll container stats until canceled.
pub fn spawn_stats_poller(
    runtime: Arc<dyn ContainerRuntime>,
    container_id: String,
    tx: mpsc::UnboundedSender<ObservationEvent>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(SAMPLE_INTERVAL) => {
                    if let Ok(stats) = runtime.stats(&container_id).await {
                        if tx.send(ObservationEvent::Sample(stats)).is_err() {
                            break;
                        }
                    }
                }
            }
        }
    })
}

/// Sample `/proc/net/tcp` inside the container until canceled.
pub fn spawn_net_sampler(
    runtime: Arc<dyn ContainerRuntime>,
    container_id: String,
    tx: mpsc::UnboundedSender<ObservationEvent>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let command: Vec<String> = ["cat", "/proc/net/tcp", "/proc/net/tcp6"]
        .iter()
        .map(|s| (*s).to_owned())
        .collect();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(SAMPLE_INTERVAL) => {
                    if let Ok(output) = runtime.exec(&container_id, &command).await {
                        for endpoint in parse_proc_net_tcp(&output.stdout) {
                            if tx
                                .send(ObservationEvent::NetworkConnection { endpoint })
                                .is_err()
                            {
                                return;
                            }
                        }
                    }
                }
            }
        }
    })
}

/// Sample open file descriptors inside the container until canceled.
pub fn spawn_fd_sampler(
    runtime: Arc<dyn ContainerRuntime>,
    container_id: String,
    tx: mpsc::UnboundedSender<ObservationEvent>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let command: Vec<String> = [
        "sh",
        "-c",
        "for fd in /proc/[0-9]*/fd/*; do readlink \"$fd\"; done 2>/dev/null",
    ]
    .iter()
    .map(|s| (*s).to_owned())
    .collect();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(SAMPLE_INTERVAL) => {
                    if let Ok(output) = runtime.exec(&container_id, &command).await {
                        for line in output.stdout.lines() {
                            let path = line.trim();
                            if path.starts_with('/')
                                && tx
                                    .send(ObservationEvent::FileAccess {
                                        path: path.to_owned(),
                                    })
                                    .is_err()
                            {
                                return;
                            }
                        }
                    }
                }
            }
        }
    })
}

/// Follow the kernel log for seccomp audit records until canceled.
///
/// Seccomp denials surface as `type=1326` audit lines carrying the syscall
/// number; unreadable kernel logs (unprivileged hosts) silently produce no
/// events.
pub fn spawn_audit_scanner(
    tx: mpsc::UnboundedSender<ObservationEvent>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        use tokio::io::{AsyncBufReadExt, BufReader};

        let child = tokio::process::Command::new("dmesg")
            .args(["--follow", "--notime"])
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn();
        let Ok(mut child) = child else { return };
        let Some(stdout) = child.stdout.take() else {
            return;
        };
        let mut lines = BufReader::new(stdout).lines();
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                line = lines.next_line() => {
                    match line {
                        Ok(Some(line)) => {
                            if let Some(syscall) = parse_audit_line(&line) {
                                if tx
                                    .send(ObservationEvent::SyscallBlocked { syscall })
                                    .is_err()
                                {
                                    break;
                                }
                            }
                        }
                        Ok(None) | Err(_) => break,
                    }
                }
            }
        }
        let _ = child.kill().await;
    })
}

/// Extract the syscall name from a seccomp audit line, if it is one.
pub fn parse_audit_line(line: &str) -> Option<String> {
    if !line.contains("type=1326") && !line.contains("SECCOMP") {
        return None;
    }
    let number = line
        .split_whitespace()
        .find_map(|field| field.strip_prefix("syscall="))?
        .parse::<u64>()
        .ok()?;
    syscall_name(number).map(str::to_owned)
}

/// x86_64 numbers for the syscalls a block list typically names.
fn syscall_name(number: u64) -> Option<&'static str> {
    match number {
        41 => Some("socket"),
        42 => Some("connect"),
        57 => Some("fork"),
        58 => Some("vfork"),
        59 => Some("execve"),
        62 => Some("kill"),
        101 => Some("ptrace"),
        165 => Some("mount"),
        166 => Some("umount2"),
        169 => Some("reboot"),
        175 => Some("init_module"),
        246 => Some("kexec_load"),
        322 => Some("execveat"),
        _ => None,
    }
}

/// Parse `/proc/net/tcp` content into remote `ip:port` endpoints.
///
/// Keeps sockets in `ESTABLISHED` (01) or `SYN_SENT` (02) state with a
/// non-zero remote address.
pub fn parse_proc_net_tcp(content: &str) -> Vec<String> {
    let mut endpoints = Vec::new();
    for line in content.lines().skip(1) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 4 || fields[0] == "sl" {
            continue;
        }
        let remote = fields[2];
        let state = fields[3];
        if !matches!(state, "01" | "02") {
            continue;
        }
        let Some((addr_hex, port_hex)) = remote.split_once(':') else {
            continue;
        };
        if addr_hex.chars().all(|c| c == '0') {
            continue;
        }
        let Ok(port) = u16::from_str_radix(port_hex, 16) else {
            continue;
        };
        if addr_hex.len() == 8 {
            // little-endian IPv4
            if let Ok(packed) = u32::from_str_radix(addr_hex, 16) {
                let bytes = packed.to_le_bytes();
                endpoints.push(format!(
                    "{}.{}.{}.{}:{port}",
                    bytes[0], bytes[1], bytes[2], bytes[3]
                ));
            }
        } else {
            endpoints.push(format!("[{addr_hex}]:{port}"));
        }
    }
    endpoints
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proc_net_tcp_parses_established_remotes() {
        let content = "\
  sl  local_address rem_address   st tx_queue rx_queue tr tm->when retrnsmt   uid\n\
   0: 0100007F:1F90 00000000:0000 0A 00000000:00000000 00:00000000 00000000  1000\n\
   1: 0100007F:A0F2 2234D85D:0050 01 00000000:00000000 00:00000000 00000000  1000\n";
        let endpoints = parse_proc_net_tcp(content);
        assert_eq!(endpoints, vec!["93.216.52.34:80".to_owned()]);
    }

    #[test]
    fn listening_sockets_are_ignored() {
        let content = "\
  sl  local_address rem_address   st\n\
   0: 0100007F:1F90 00000000:0000 0A\n";
        assert!(parse_proc_net_tcp(content).is_empty());
    }

    #[test]
    fn audit_lines_map_syscall_numbers() {
        let line = "audit: type=1326 audit(1700000000.123:45): auid=0 uid=0 \
                    pid=1234 comm=\"python\" exe=\"/usr/bin/python\" sig=0 \
                    arch=c000003e syscall=59 compat=0 ip=0x7f code=0x50000";
        assert_eq!(parse_audit_line(line), Some("execve".to_owned()));
    }

    #[test]
    fn non_seccomp_lines_are_ignored() {
        assert_eq!(parse_audit_line("usb 1-1: new device"), None);
        assert_eq!(
            parse_audit_line("audit: type=1326 audit(...): syscall=99999"),
            None
        );
    }
}
