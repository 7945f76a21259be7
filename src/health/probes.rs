//! Individual health probes.
//!
//! Each probe returns `Ok(detail)` when the check passes and `Err(detail)`
//! when it does not. Time limits are applied by the caller.

use super::Probe;
use crate::detection::{run_probe, ProbeError};
use crate::CommandSpec;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::process::Command;

pub(crate) async fn run(probe: &Probe, limit: Duration) -> Result<String, String> {
    match probe {
        Probe::ProcessRunning { name } => process_running(name, limit).await,
        Probe::ServiceActive { unit } => service_active(unit, limit).await,
        Probe::ContainerHealthy { container } => container_healthy(container, limit).await,
        Probe::TcpReachable { address } => tcp_reachable(address).await,
        Probe::FileExists { path } => file_exists(path).await,
        Probe::CommandSucceeds { command } => command_succeeds(command).await,
    }
}

async fn process_running(name: &str, limit: Duration) -> Result<String, String> {
    match scan_proc(name).await {
        Some(Some(pid)) => return Ok(format!("`{name}` running as pid {pid}")),
        Some(None) => return Err(format!("no process named `{name}`")),
        None => {}
    }

    // No readable /proc (macOS, hardened hosts).
    match run_probe("pgrep", &["-x", name], limit).await {
        Ok(out) => {
            let pid = out.lines().next().unwrap_or("").trim();
            Ok(format!("`{name}` running as pid {pid}"))
        }
        Err(ProbeError::NonZeroExit(_)) => Err(format!("no process named `{name}`")),
        Err(e) => Err(format!("cannot list processes: {e}")),
    }
}

/// The kernel truncates `comm` to this many bytes.
const COMM_LEN: usize = 15;

/// `None` when /proc cannot be listed; otherwise the pid of the first
/// matching process.
///
/// Names that fit in `comm` are compared against it. Longer names are
/// compared against the basename of `argv[0]` from `cmdline`, since `comm`
/// only holds their first 15 bytes.
async fn scan_proc(name: &str) -> Option<Option<u32>> {
    let mut entries = tokio::fs::read_dir("/proc").await.ok()?;
    let mut found = None;
    let mut any = false;

    while let Ok(Some(entry)) = entries.next_entry().await {
        let Some(pid) = entry
            .file_name()
            .to_str()
            .and_then(|s| s.parse::<u32>().ok())
        else {
            continue;
        };
        any = true;
        let matches = if name.len() <= COMM_LEN {
            tokio::fs::read_to_string(entry.path().join("comm"))
                .await
                .is_ok_and(|comm| comm.trim_end() == name)
        } else {
            tokio::fs::read(entry.path().join("cmdline"))
                .await
                .is_ok_and(|cmdline| argv0_matches(&cmdline, name))
        };
        if matches {
            found = Some(pid);
            break;
        }
    }

    // A /proc without pid directories is not procfs.
    if !any && found.is_none() {
        return None;
    }
    Some(found)
}

/// Whether the first NUL-separated field of `cmdline` names `name`.
pub(crate) fn argv0_matches(cmdline: &[u8], name: &str) -> bool {
    let argv0 = cmdline.split(|b| *b == 0).next().unwrap_or_default();
    let argv0 = String::from_utf8_lossy(argv0);
    argv0.rsplit('/').next() == Some(name)
}

async fn service_active(unit: &str, limit: Duration) -> Result<String, String> {
    match run_probe("systemctl", &["is-active", unit], limit).await {
        Ok(out) if out.trim() == "active" => Ok(format!("`{unit}` is active")),
        Ok(out) => Err(format!("`{unit}` is {}", out.trim())),
        // is-active exits non-zero for every state except active.
        Err(ProbeError::NonZeroExit(_)) => Err(format!("`{unit}` is not active")),
        Err(e) => Err(format!("cannot query `{unit}`: {e}")),
    }
}

const CONTAINER_FORMAT: &str =
    "{{.State.Status}} {{if .State.Health}}{{.State.Health.Status}}{{end}}";

async fn container_healthy(container: &str, limit: Duration) -> Result<String, String> {
    match run_probe(
        "docker",
        &["inspect", "--format", CONTAINER_FORMAT, container],
        limit,
    )
    .await
    {
        Ok(out) => classify_container(container, &out),
        Err(ProbeError::NonZeroExit(_)) => Err(format!("container `{container}` not found")),
        Err(e) => Err(format!("cannot inspect `{container}`: {e}")),
    }
}

/// Interpret `<status> [<health>]` from `docker inspect`.
pub(crate) fn classify_container(container: &str, inspect: &str) -> Result<String, String> {
    let mut fields = inspect.split_whitespace();
    let status = fields.next().unwrap_or("unknown");
    match fields.next() {
        Some("healthy") => Ok(format!("`{container}` is healthy")),
        Some(health) => Err(format!("`{container}` is {status} ({health})")),
        None if status == "running" => Ok(format!("`{container}` is running")),
        None => Err(format!("`{container}` is {status}")),
    }
}

async fn tcp_reachable(address: &str) -> Result<String, String> {
    match TcpStream::connect(address).await {
        Ok(_) => Ok(format!("connected to {address}")),
        Err(e) => Err(format!("cannot connect to {address}: {e}")),
    }
}

async fn file_exists(path: &Path) -> Result<String, String> {
    match tokio::fs::metadata(path).await {
        Ok(_) => Ok(format!("{} exists", path.display())),
        Err(e) => Err(format!("{}: {e}", path.display())),
    }
}

async fn command_succeeds(command: &CommandSpec) -> Result<String, String> {
    let output = Command::new(&command.program)
        .args(&command.args)
        .envs(command.env_vars.iter().cloned())
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| format!("cannot run `{command}`: {e}"))?;

    if output.status.success() {
        Ok(format!("`{command}` succeeded"))
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = stderr.trim();
        match output.status.code() {
            Some(code) if stderr.is_empty() => Err(format!("`{command}` exited with status {code}")),
            Some(code) => Err(format!("`{command}` exited with status {code}: {stderr}")),
            None => Err(format!("`{command}` terminated by signal")),
        }
    }
}
