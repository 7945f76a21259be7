//! Capability snapshot types representing detection results.

use crate::ToolKind;
use semver::Version;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Operating system family of the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum OsKind {
    Linux,
    MacOs,
    Windows,
    FreeBsd,
}

impl OsKind {
    /// Map a `std::env::consts::OS` value to an `OsKind`.
    ///
    /// Returns `None` for platforms the installer has no story for.
    pub fn from_target_os(os: &str) -> Option<Self> {
        match os {
            "linux" => Some(Self::Linux),
            "macos" => Some(Self::MacOs),
            "windows" => Some(Self::Windows),
            "freebsd" => Some(Self::FreeBsd),
            _ => None,
        }
    }
}

/// The sandbox the installer process is running inside, if any.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ContainerContext {
    /// Bare metal or a full virtual machine.
    #[default]
    None,
    /// LXC / LXD system container.
    Lxc,
    /// Inside a Docker container (docker-in-docker when installing a runtime).
    Docker,
    /// Windows Subsystem for Linux.
    Wsl,
}

/// Detected state of one tool.
///
/// `running` is only meaningful for tools with a daemon or a connection
/// (Docker, Tailscale); for the rest it mirrors `installed`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolState {
    /// The executable was found.
    pub installed: bool,

    /// The daemon answered, or the VPN client reports a connected backend.
    pub running: bool,

    /// Parsed version, `None` if it could not be determined.
    pub version: Option<Version>,

    /// Where the executable was found.
    pub path: Option<PathBuf>,
}

impl ToolState {
    /// A tool that was not found.
    pub fn absent() -> Self {
        Self::default()
    }

    /// Installed, but the daemon or connection is down.
    pub fn is_stopped(&self) -> bool {
        self.installed && !self.running
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

/// Identifies a single detector probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ProbeKind {
    Hostname,
    Username,
    Distribution,
    ContainerContext,
    TunnelDevice,
    NetworkAddresses,
    FreeDisk,
    TotalMemory,
    Tool(ToolKind),
}

/// A probe that failed and whose field was left at its safe default.
///
/// Degraded probes are a normal part of detection on restricted hosts
/// (containers without `/proc`, minimal images without `df`); they are
/// recorded here instead of failing [`detect`](crate::detect).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeDegraded {
    pub probe: ProbeKind,
    pub reason: String,
}

/// Immutable record of detected host facts.
///
/// A snapshot is produced once per run by [`detect`](crate::detect).
/// Re-detection yields a new snapshot; the plan builder and recommendation
/// functions only ever borrow one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilitySnapshot {
    pub hostname: Option<String>,
    pub username: Option<String>,
    pub os: OsKind,
    /// CPU architecture as reported by the toolchain (`x86_64`, `aarch64`, ...).
    pub arch: String,
    /// Distribution id from os-release (`ubuntu`, `debian`, ...) or `macos`.
    pub distro_id: Option<String>,
    pub distro_version: Option<String>,
    pub container: ContainerContext,
    /// `/dev/net/tun` is available to this process.
    pub tunnel_device: bool,
    pub tools: BTreeMap<ToolKind, ToolState>,
    /// Non-loopback local addresses.
    pub addresses: Vec<IpAddr>,
    pub free_disk_gb: Option<f64>,
    pub total_memory_gb: Option<f64>,
    pub degraded: Vec<ProbeDegraded>,
    pub detected_at: SystemTime,
}

impl CapabilitySnapshot {
    /// A snapshot with only host identity filled in; every probe at its default.
    pub fn minimal(os: OsKind, arch: impl Into<String>) -> Self {
        Self {
            hostname: None,
            username: None,
            os,
            arch: arch.into(),
            distro_id: None,
            distro_version: None,
            container: ContainerContext::None,
            tunnel_device: false,
            tools: BTreeMap::new(),
            addresses: Vec::new(),
            free_disk_gb: None,
            total_memory_gb: None,
            degraded: Vec::new(),
            detected_at: SystemTime::UNIX_EPOCH,
        }
    }

    /// Running inside a container or WSL.
    pub fn is_sandboxed(&self) -> bool {
        self.container != ContainerContext::None
    }

    /// State of a tool; tools that were never probed read as absent.
    pub fn tool(&self, kind: ToolKind) -> ToolState {
        self.tools.get(&kind).cloned().unwrap_or_default()
    }

    /// Whether `kind` was found on this host.
    pub fn is_installed(&self, kind: ToolKind) -> bool {
        self.tools.get(&kind).is_some_and(|t| t.installed)
    }

    pub fn is_running(&self, kind: ToolKind) -> bool {
        self.tools.get(&kind).is_some_and(|t| t.running)
    }

    /// Whether a particular probe fell back to its default.
    pub fn is_degraded(&self, probe: ProbeKind) -> bool {
        self.degraded.iter().any(|d| d.probe == probe)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_snapshot() -> CapabilitySnapshot {
        let mut snapshot = CapabilitySnapshot::minimal(OsKind::Linux, "x86_64");
        snapshot.tools.insert(
            ToolKind::Docker,
            ToolState {
                installed: true,
                running: false,
                version: Some(Version::new(24, 0, 7)),
                path: Some(PathBuf::from("/usr/bin/docker")),
            },
        );
        snapshot
    }

    #[test]
    fn test_os_kind_from_target() {
        assert_eq!(OsKind::from_target_os("linux"), Some(OsKind::Linux));
        assert_eq!(OsKind::from_target_os("macos"), Some(OsKind::MacOs));
        assert_eq!(OsKind::from_target_os("haiku"), None);
    }

    #[test]
    fn test_sandboxed() {
        let mut snapshot = make_snapshot();
        assert!(!snapshot.is_sandboxed());
        snapshot.container = ContainerContext::Lxc;
        assert!(snapshot.is_sandboxed());
    }

    #[test]
    fn test_tool_lookup_defaults_to_absent() {
        let snapshot = make_snapshot();
        assert!(snapshot.is_installed(ToolKind::Docker));
        assert!(!snapshot.is_running(ToolKind::Docker));
        assert!(snapshot.tool(ToolKind::Docker).is_stopped());
        assert_eq!(snapshot.tool(ToolKind::Tailscale), ToolState::absent());
        assert_eq!(
            snapshot.tool(ToolKind::Docker).path(),
            Some(Path::new("/usr/bin/docker"))
        );
    }

    #[test]
    fn test_degraded_lookup() {
        let mut snapshot = make_snapshot();
        snapshot.degraded.push(ProbeDegraded {
            probe: ProbeKind::FreeDisk,
            reason: "df not found".to_string(),
        });
        assert!(snapshot.is_degraded(ProbeKind::FreeDisk));
        assert!(!snapshot.is_degraded(ProbeKind::TotalMemory));
    }

    #[test]
    fn test_display_names() {
        assert_eq!(ContainerContext::Docker.to_string(), "docker");
        assert_eq!(OsKind::MacOs.to_string(), "mac-os");
        assert_eq!(ProbeKind::FreeDisk.to_string(), "free-disk");
    }
}
