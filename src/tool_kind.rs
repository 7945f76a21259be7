//! Tool kind enum identifying the host tools the detector knows about.

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

/// A host tool whose presence and state affect the install plan.
///
/// # Example
///
/// ```rust
/// use hostprep::ToolKind;
///
/// for kind in ToolKind::all() {
///     println!("{}: {}", kind.display_name(), kind.executable_name());
/// }
/// ```
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::EnumIter,
)]
#[serde(rename_all = "kebab-case")]
pub enum ToolKind {
    /// Docker engine CLI (container runtime)
    Docker,
    /// Docker Compose v2 plugin
    DockerCompose,
    /// Tailscale VPN mesh client
    Tailscale,
    /// Git
    Git,
}

impl ToolKind {
    /// The executable name to search for in PATH.
    ///
    /// ```rust
    /// use hostprep::ToolKind;
    ///
    /// assert_eq!(ToolKind::Docker.executable_name(), "docker");
    /// assert_eq!(ToolKind::DockerCompose.executable_name(), "docker");
    /// ```
    pub fn executable_name(&self) -> &'static str {
        match self {
            Self::Docker | Self::DockerCompose => "docker",
            Self::Tailscale => "tailscale",
            Self::Git => "git",
        }
    }

    /// Human-readable display name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Docker => "Docker",
            Self::DockerCompose => "Docker Compose",
            Self::Tailscale => "Tailscale",
            Self::Git => "Git",
        }
    }

    /// Arguments that make the tool print its version.
    pub(crate) fn version_args(&self) -> &'static [&'static str] {
        match self {
            Self::Docker | Self::Tailscale | Self::Git => &["--version"],
            Self::DockerCompose => &["compose", "version"],
        }
    }

    /// Arguments for the liveness probe, if the tool has a running state.
    ///
    /// Docker is running when `docker info` succeeds (the daemon answered).
    /// Tailscale is running when `tailscale status --json` reports
    /// `BackendState: "Running"`, i.e. the node is connected to the mesh.
    pub(crate) fn liveness_args(&self) -> Option<&'static [&'static str]> {
        match self {
            Self::Docker => Some(&["info", "--format", "{{.ServerVersion}}"]),
            Self::Tailscale => Some(&["status", "--json"]),
            Self::DockerCompose | Self::Git => None,
        }
    }

    /// Iterator over all known tool kinds.
    ///
    /// ```rust
    /// use hostprep::ToolKind;
    ///
    /// assert_eq!(ToolKind::all().count(), 4);
    /// ```
    pub fn all() -> impl Iterator<Item = Self> {
        <Self as IntoEnumIterator>::iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_executable_names() {
        assert_eq!(ToolKind::Docker.executable_name(), "docker");
        assert_eq!(ToolKind::DockerCompose.executable_name(), "docker");
        assert_eq!(ToolKind::Tailscale.executable_name(), "tailscale");
        assert_eq!(ToolKind::Git.executable_name(), "git");
    }

    #[test]
    fn test_compose_uses_plugin_subcommand() {
        assert_eq!(ToolKind::DockerCompose.version_args(), &["compose", "version"]);
    }

    #[test]
    fn test_liveness_only_for_daemons() {
        assert!(ToolKind::Docker.liveness_args().is_some());
        assert!(ToolKind::Tailscale.liveness_args().is_some());
        assert!(ToolKind::Git.liveness_args().is_none());
        assert!(ToolKind::DockerCompose.liveness_args().is_none());
    }

    #[test]
    fn test_all_iterator() {
        let all: Vec<_> = ToolKind::all().collect();
        assert_eq!(all.len(), 4);
        assert_eq!(all[0], ToolKind::Docker);
    }

    #[test]
    fn test_serde_kebab_case() {
        let json = serde_json::to_string(&ToolKind::DockerCompose).unwrap();
        assert_eq!(json, "\"docker-compose\"");
        let back: ToolKind = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ToolKind::DockerCompose);
    }
}
