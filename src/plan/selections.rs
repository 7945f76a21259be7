//! User component selections.

use crate::Mode;
use serde::{Deserialize, Serialize};

/// What the user asked to install, as collected by the presentation layer.
///
/// # Example
///
/// ```rust
/// use hostprep::{Mode, UserSelections};
///
/// let selections = UserSelections {
///     mode: Some(Mode::LocalNetwork),
///     tooling: true,
///     ..Default::default()
/// };
/// assert!(selections.runtime);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserSelections {
    /// Deployment mode; `None` defers to [`recommend_mode`](crate::recommend_mode).
    pub mode: Option<Mode>,

    /// Install the container runtime.
    ///
    /// Default: `true`
    pub runtime: bool,

    /// Join the VPN mesh (only applies in [`Mode::VpnMesh`]).
    ///
    /// Default: `true`
    pub vpn: bool,

    /// Install optional tooling.
    ///
    /// Default: `false`
    pub tooling: bool,

    /// Apply host hardening.
    ///
    /// Default: `false`
    pub hardening: bool,

    /// Generate secrets.
    ///
    /// Default: `true`
    pub secrets: bool,

    /// Start services and verify them.
    ///
    /// Default: `true`
    pub services: bool,
}

impl Default for UserSelections {
    fn default() -> Self {
        Self {
            mode: None,
            runtime: true,
            vpn: true,
            tooling: false,
            hardening: false,
            secrets: true,
            services: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let s = UserSelections::default();
        assert!(s.mode.is_none());
        assert!(s.runtime && s.vpn && s.secrets && s.services);
        assert!(!s.tooling && !s.hardening);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let s: UserSelections =
            serde_json::from_str(r#"{"mode":"vpn-mesh","hardening":true}"#).unwrap();
        assert_eq!(s.mode, Some(Mode::VpnMesh));
        assert!(s.hardening);
        assert!(s.runtime);
    }
}
