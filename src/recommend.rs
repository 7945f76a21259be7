//! Recommendations and warnings derived from a capability snapshot.
//!
//! Everything here is a pure function of the snapshot.

use crate::{CapabilitySnapshot, ToolKind};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Minimum free disk before a warning is raised.
pub const MIN_FREE_DISK_GB: f64 = 10.0;

/// Minimum total memory before a warning is raised.
pub const MIN_MEMORY_GB: f64 = 2.0;

/// How the installed services are reached.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Mode {
    /// Services are reached over the Tailscale mesh.
    VpnMesh,
    /// Services are reached on the local network only.
    LocalNetwork,
}

/// Pick a deployment mode for the host.
///
/// Precedence, first match wins:
/// 1. sandboxed without a tunnel device: local network (a VPN cannot come up)
/// 2. Tailscale already connected: VPN mesh
/// 3. tunnel device present: VPN mesh
/// 4. otherwise: local network
///
/// # Example
///
/// ```rust
/// use hostprep::{recommend_mode, CapabilitySnapshot, ContainerContext, Mode, OsKind};
///
/// let mut snapshot = CapabilitySnapshot::minimal(OsKind::Linux, "x86_64");
/// snapshot.container = ContainerContext::Lxc;
/// assert_eq!(recommend_mode(&snapshot), Mode::LocalNetwork);
///
/// snapshot.tunnel_device = true;
/// assert_eq!(recommend_mode(&snapshot), Mode::VpnMesh);
/// ```
pub fn recommend_mode(snapshot: &CapabilitySnapshot) -> Mode {
    if snapshot.is_sandboxed() && !snapshot.tunnel_device {
        return Mode::LocalNetwork;
    }
    if snapshot.is_running(ToolKind::Tailscale) {
        return Mode::VpnMesh;
    }
    if snapshot.tunnel_device {
        return Mode::VpnMesh;
    }
    Mode::LocalNetwork
}

/// A host condition the user should know about before installing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Warning {
    LowDisk { free_gb: f64 },
    LowMemory { total_gb: f64 },
    RuntimeNotRunning,
    NoTunnelDevice,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LowDisk { free_gb } => write!(
                f,
                "only {free_gb:.1} GB free disk (at least {MIN_FREE_DISK_GB:.0} GB recommended)"
            ),
            Self::LowMemory { total_gb } => write!(
                f,
                "only {total_gb:.1} GB memory (at least {MIN_MEMORY_GB:.0} GB recommended)"
            ),
            Self::RuntimeNotRunning => {
                write!(f, "Docker is installed but the daemon is not running")
            }
            Self::NoTunnelDevice => write!(
                f,
                "running in a container without /dev/net/tun; VPN mesh mode is unavailable"
            ),
        }
    }
}

/// Evaluate every warning check independently.
///
/// Values the detector could not determine produce no warning.
pub fn warnings(snapshot: &CapabilitySnapshot) -> Vec<Warning> {
    let mut out = Vec::new();

    if let Some(free_gb) = snapshot.free_disk_gb.filter(|gb| *gb < MIN_FREE_DISK_GB) {
        out.push(Warning::LowDisk { free_gb });
    }
    if let Some(total_gb) = snapshot.total_memory_gb.filter(|gb| *gb < MIN_MEMORY_GB) {
        out.push(Warning::LowMemory { total_gb });
    }
    if snapshot.tool(ToolKind::Docker).is_stopped() {
        out.push(Warning::RuntimeNotRunning);
    }
    if snapshot.is_sandboxed() && !snapshot.tunnel_device {
        out.push(Warning::NoTunnelDevice);
    }

    out
}
