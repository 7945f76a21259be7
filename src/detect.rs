//! Host capability detection.

use crate::detection::{
    find_executable, host, parse_version, run_probe, tailscale_connected, ProbeError,
};
use crate::{
    CapabilitySnapshot, ContainerContext, DetectOptions, OsKind, ProbeDegraded, ProbeKind,
    ToolKind, ToolState,
};
use futures::future::join_all;
use std::collections::BTreeMap;
use std::time::SystemTime;
use thiserror::Error;
use tracing::{debug, info};

/// Detection could not establish the minimal host identity.
///
/// This is the only way [`detect`] fails; every other probe degrades to a
/// default instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum DetectError {
    /// The operating system is not one the installer supports.
    #[error("unsupported operating system: {0}")]
    UnsupportedOs(String),

    /// The CPU architecture could not be determined.
    #[error("CPU architecture could not be determined")]
    UnknownArch,
}

/// Detect the current host with default options.
///
/// # Example
///
/// ```rust,no_run
/// use hostprep::{detect, recommend_mode, warnings};
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() {
///     let snapshot = detect().await.expect("supported host");
///     println!("{:?} on {}", snapshot.os, snapshot.arch);
///     println!("recommended mode: {}", recommend_mode(&snapshot));
///     for warning in warnings(&snapshot) {
///         println!("warning: {warning}");
///     }
/// }
/// ```
pub async fn detect() -> Result<CapabilitySnapshot, DetectError> {
    detect_with(&DetectOptions::default()).await
}

/// Detect the current host.
///
/// Host identity (OS, architecture) comes from the build target and is the
/// only thing that can fail. All other probes run concurrently; each one
/// that fails leaves its field at the safe default and adds a
/// [`ProbeDegraded`] entry to the snapshot.
pub async fn detect_with(options: &DetectOptions) -> Result<CapabilitySnapshot, DetectError> {
    let os = OsKind::from_target_os(std::env::consts::OS)
        .ok_or_else(|| DetectError::UnsupportedOs(std::env::consts::OS.to_string()))?;
    let arch = std::env::consts::ARCH;
    if arch.is_empty() {
        return Err(DetectError::UnknownArch);
    }

    let limit = options.timeout;
    let (hostname, username, distro, container, addresses, memory, disk, tools) = tokio::join!(
        host::hostname(limit),
        host::username(limit),
        host::distribution(os, limit),
        host::container_context(limit),
        host::network_addresses(limit),
        host::total_memory_gb(limit),
        host::free_disk_gb(&options.disk_path, limit),
        detect_tools_with(options),
    );

    let mut degraded = Vec::new();
    let hostname = recover(ProbeKind::Hostname, hostname, &mut degraded);
    let username = recover(ProbeKind::Username, username, &mut degraded);
    let (distro_id, distro_version) =
        match recover(ProbeKind::Distribution, distro, &mut degraded) {
            Some((id, version)) => (Some(id), version),
            None => (None, None),
        };
    let addresses =
        recover(ProbeKind::NetworkAddresses, addresses, &mut degraded).unwrap_or_default();
    let total_memory_gb = recover(ProbeKind::TotalMemory, memory, &mut degraded);
    let free_disk_gb = recover(ProbeKind::FreeDisk, disk, &mut degraded);

    let mut tool_states = BTreeMap::new();
    for (kind, result) in tools {
        let state = recover(ProbeKind::Tool(kind), result, &mut degraded).unwrap_or_default();
        tool_states.insert(kind, state);
    }

    let snapshot = CapabilitySnapshot {
        hostname,
        username,
        os,
        arch: arch.to_string(),
        distro_id,
        distro_version,
        container,
        tunnel_device: host::tunnel_device(),
        tools: tool_states,
        addresses,
        free_disk_gb,
        total_memory_gb,
        degraded,
        detected_at: SystemTime::now(),
    };

    info!(
        os = %snapshot.os,
        arch = %snapshot.arch,
        container = %snapshot.container,
        tunnel_device = snapshot.tunnel_device,
        degraded = snapshot.degraded.len(),
        "host detected"
    );
    if snapshot.container != ContainerContext::None {
        debug!(container = %snapshot.container, "running sandboxed");
    }

    Ok(snapshot)
}

/// Turn a probe result into its value, recording a degraded probe on error.
fn recover<T>(
    probe: ProbeKind,
    result: Result<T, ProbeError>,
    degraded: &mut Vec<ProbeDegraded>,
) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            debug!(%probe, error = %e, "probe degraded");
            degraded.push(ProbeDegraded {
                probe,
                reason: e.to_string(),
            });
            None
        }
    }
}

/// Detect a single tool with default options.
///
/// A tool that is missing, or that was found but could not be interrogated,
/// reads as absent. [`detect`] additionally records the latter as degraded.
pub async fn detect_tool(kind: ToolKind) -> ToolState {
    probe_tool(kind, &DetectOptions::default())
        .await
        .unwrap_or_else(|_| ToolState::absent())
}

/// Detect all known tools in parallel.
///
/// Total time is roughly the slowest single tool probe, not the sum.
pub async fn detect_tools() -> BTreeMap<ToolKind, ToolState> {
    detect_tools_with(&DetectOptions::default())
        .await
        .into_iter()
        .map(|(kind, result)| (kind, result.unwrap_or_default()))
        .collect()
}

async fn detect_tools_with(
    options: &DetectOptions,
) -> Vec<(ToolKind, Result<ToolState, ProbeError>)> {
    let futures: Vec<_> = ToolKind::all()
        .map(|kind| async move { (kind, probe_tool(kind, options).await) })
        .collect();

    join_all(futures).await
}

async fn probe_tool(kind: ToolKind, options: &DetectOptions) -> Result<ToolState, ProbeError> {
    let path = match find_executable(kind.executable_name()) {
        Some(p) => p,
        None => return Ok(ToolState::absent()),
    };

    let version = if options.skip_version {
        None
    } else {
        match run_probe(&path, kind.version_args(), options.timeout).await {
            Ok(output) => parse_version(&output).ok(),
            // `docker compose` is a plugin; the docker binary exists without it.
            Err(ProbeError::NonZeroExit(_)) if kind == ToolKind::DockerCompose => {
                return Ok(ToolState::absent());
            }
            Err(e) => return Err(e),
        }
    };

    let running = match kind.liveness_args() {
        None => true,
        Some(args) => match run_probe(&path, args, options.timeout).await {
            Ok(output) if kind == ToolKind::Tailscale => tailscale_connected(&output)?,
            Ok(_) => true,
            // Daemon down or not logged in: installed but not running.
            Err(ProbeError::NonZeroExit(_)) | Err(ProbeError::Timeout(_)) => false,
            Err(e) => return Err(e),
        },
    };

    debug!(tool = kind.display_name(), ?version, running, "tool probed");
    Ok(ToolState {
        installed: true,
        running,
        version,
        path: Some(path),
    })
}
