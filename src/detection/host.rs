//! Host probes: identity, sandbox, devices, network and resources.
//!
//! Each probe is independent and returns its own `Result`. Where a probe has
//! both a file-based source and a utility fallback, the file is tried first
//! and the utility only when the file is unavailable or unparseable.

use super::command::{read_probe_file, run_probe};
use super::parser::{
    parse_address_list, parse_df_available_gb, parse_fib_trie, parse_meminfo_total_gb,
    parse_memsize_gb, parse_os_release,
};
use super::ProbeError;
use crate::{ContainerContext, OsKind};
use std::ffi::OsStr;
use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

const TUN_DEVICE: &str = "/dev/net/tun";
/// Files an OCI engine drops into its containers: Docker, then Podman.
const ENGINE_MARKERS: [&str; 2] = ["/.dockerenv", "/run/.containerenv"];
const NO_ARGS: [&str; 0] = [];

pub(crate) async fn hostname(limit: Duration) -> Result<String, ProbeError> {
    let from_file = read_probe_file("/proc/sys/kernel/hostname", limit)
        .await
        .map(|s| s.trim().to_string());
    match from_file {
        Ok(name) if !name.is_empty() => Ok(name),
        _ => non_empty(run_probe("hostname", &NO_ARGS, limit).await?),
    }
}

pub(crate) async fn username(limit: Duration) -> Result<String, ProbeError> {
    for var in ["USER", "LOGNAME", "USERNAME"] {
        if let Ok(name) = std::env::var(var) {
            if !name.is_empty() {
                return Ok(name);
            }
        }
    }
    non_empty(run_probe("id", &["-un"], limit).await?)
}

/// Distribution id and version.
pub(crate) async fn distribution(
    os: OsKind,
    limit: Duration,
) -> Result<(String, Option<String>), ProbeError> {
    if os == OsKind::MacOs {
        let version = non_empty(run_probe("sw_vers", &["-productVersion"], limit).await?)?;
        return Ok(("macos".to_string(), Some(version)));
    }

    let mut last_err = ProbeError::NotFound("os-release".to_string());
    for path in ["/etc/os-release", "/usr/lib/os-release"] {
        match read_probe_file(path, limit).await {
            Ok(content) => {
                let mut fields = parse_os_release(&content);
                return match fields.remove("ID") {
                    Some(id) => Ok((id, fields.remove("VERSION_ID"))),
                    None => Err(ProbeError::InvalidOutput),
                };
            }
            Err(e) => last_err = e,
        }
    }
    Err(last_err)
}

pub(crate) async fn container_context(limit: Duration) -> ContainerContext {
    let engine_marker = ENGINE_MARKERS.iter().any(|m| Path::new(m).exists());
    let cgroup = read_probe_file("/proc/1/cgroup", limit).await.ok();
    let environ = read_probe_file("/proc/1/environ", limit).await.ok();
    let proc_version = read_probe_file("/proc/version", limit).await.ok();
    classify_container(
        engine_marker,
        cgroup.as_deref(),
        environ.as_deref(),
        proc_version.as_deref(),
    )
}

/// Decide the sandbox from the individual markers.
///
/// Order matters: a Docker container on a WSL2 kernel reports `microsoft` in
/// `/proc/version`, so the container markers are checked first. Podman
/// containers count as [`ContainerContext::Docker`]: both are OCI
/// application containers.
pub(crate) fn classify_container(
    engine_marker: bool,
    cgroup: Option<&str>,
    environ: Option<&str>,
    proc_version: Option<&str>,
) -> ContainerContext {
    let cgroup = cgroup.unwrap_or_default();
    let environ = environ.unwrap_or_default();

    let engine_env = environ
        .split('\0')
        .any(|kv| matches!(kv, "container=docker" | "container=podman" | "container=oci"));
    if engine_marker
        || engine_env
        || cgroup.contains("docker")
        || cgroup.contains("containerd")
        || cgroup.contains("libpod")
    {
        return ContainerContext::Docker;
    }
    if environ.split('\0').any(|kv| kv == "container=lxc") || cgroup.contains("lxc") {
        return ContainerContext::Lxc;
    }
    if proc_version.is_some_and(|v| v.to_lowercase().contains("microsoft")) {
        return ContainerContext::Wsl;
    }
    ContainerContext::None
}

pub(crate) fn tunnel_device() -> bool {
    Path::new(TUN_DEVICE).exists()
}

pub(crate) async fn network_addresses(limit: Duration) -> Result<Vec<IpAddr>, ProbeError> {
    if let Ok(content) = read_probe_file("/proc/net/fib_trie", limit).await {
        let addresses = parse_fib_trie(&content);
        if !addresses.is_empty() {
            return Ok(addresses);
        }
    }

    match run_probe("hostname", &["-I"], limit).await {
        Ok(output) if !parse_address_list(&output).is_empty() => Ok(parse_address_list(&output)),
        _ => {
            let output = run_probe("ip", &["-o", "-4", "addr", "show"], limit).await?;
            Ok(parse_address_list(&output))
        }
    }
}

pub(crate) async fn total_memory_gb(limit: Duration) -> Result<f64, ProbeError> {
    match read_probe_file("/proc/meminfo", limit).await {
        Ok(content) => parse_meminfo_total_gb(&content),
        Err(_) => parse_memsize_gb(&run_probe("sysctl", &["-n", "hw.memsize"], limit).await?),
    }
}

/// There is no file-based source for free space, so this always shells out.
pub(crate) async fn free_disk_gb(path: &Path, limit: Duration) -> Result<f64, ProbeError> {
    let output = run_probe("df", &[OsStr::new("-Pk"), path.as_os_str()], limit).await?;
    parse_df_available_gb(&output)
}

fn non_empty(s: String) -> Result<String, ProbeError> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        Err(ProbeError::InvalidOutput)
    } else {
        Ok(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_bare_metal() {
        let ctx = classify_container(false, Some("0::/init.scope\n"), Some("PATH=/bin\0"), None);
        assert_eq!(ctx, ContainerContext::None);
    }

    #[test]
    fn test_classify_docker() {
        assert_eq!(classify_container(true, None, None, None), ContainerContext::Docker);
        let cgroup = "12:cpuset:/docker/3f9a2b\n";
        assert_eq!(
            classify_container(false, Some(cgroup), None, None),
            ContainerContext::Docker
        );
    }

    #[test]
    fn test_classify_podman() {
        // Marker file only: cgroup v2 shows a bare root.
        assert_eq!(
            classify_container(true, Some("0::/\n"), None, None),
            ContainerContext::Docker
        );
        let environ = "PATH=/usr/bin\0container=podman\0";
        assert_eq!(
            classify_container(false, Some("0::/\n"), Some(environ), None),
            ContainerContext::Docker
        );
        let cgroup = "0::/machine.slice/libpod-3f9a2b.scope\n";
        assert_eq!(
            classify_container(false, Some(cgroup), None, None),
            ContainerContext::Docker
        );
    }

    #[test]
    fn test_classify_lxc() {
        let environ = "container=lxc\0HOME=/root\0";
        assert_eq!(
            classify_container(false, None, Some(environ), None),
            ContainerContext::Lxc
        );
    }

    #[test]
    fn test_classify_wsl() {
        let version = "Linux version 5.15.90.1-microsoft-standard-WSL2";
        assert_eq!(
            classify_container(false, None, None, Some(version)),
            ContainerContext::Wsl
        );
    }

    #[test]
    fn test_docker_wins_over_wsl() {
        let version = "Linux version 5.15.90.1-microsoft-standard-WSL2";
        assert_eq!(
            classify_container(true, None, None, Some(version)),
            ContainerContext::Docker
        );
    }

    #[tokio::test]
    async fn test_username_resolves() {
        // Either an env var or `id -un` answers on any Unix test host.
        assert!(username(Duration::from_secs(2)).await.is_ok());
    }

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty("  host\n".to_string()), Ok("host".to_string()));
        assert_eq!(non_empty("\n".to_string()), Err(ProbeError::InvalidOutput));
    }
}
