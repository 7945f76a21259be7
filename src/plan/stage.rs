//! The fixed install stages, in dependency order.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use strum::IntoEnumIterator;

/// One position in the install order.
///
/// Declaration order is execution order; [`StageId::all`] yields the stages
/// in that order and the plan builder never reorders them.
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
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum StageId {
    SystemCheck,
    PackageBaseline,
    RuntimeInstall,
    NetworkConfig,
    OptionalTooling,
    Hardening,
    Secrets,
    EnvMaterialization,
    ServiceStart,
    HealthCheck,
}

impl StageId {
    /// All stages in execution order.
    ///
    /// # Example
    ///
    /// ```rust
    /// use hostprep::StageId;
    ///
    /// let first = StageId::all().next();
    /// assert_eq!(first, Some(StageId::SystemCheck));
    /// assert_eq!(StageId::all().count(), 10);
    /// ```
    pub fn all() -> impl Iterator<Item = Self> {
        <Self as IntoEnumIterator>::iter()
    }

    /// Stable identifier used for step names and script file names.
    pub fn id(&self) -> String {
        self.to_string()
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::SystemCheck => "Check host prerequisites",
            Self::PackageBaseline => "Install baseline packages",
            Self::RuntimeInstall => "Install the container runtime",
            Self::NetworkConfig => "Join the VPN mesh",
            Self::OptionalTooling => "Install optional tooling",
            Self::Hardening => "Harden the host",
            Self::Secrets => "Generate secrets",
            Self::EnvMaterialization => "Write the environment file",
            Self::ServiceStart => "Start services",
            Self::HealthCheck => "Verify service health",
        }
    }

    /// Stages that must not have been skipped for this one to run.
    ///
    /// A requirement skipped because it was already satisfied still counts
    /// as met.
    pub fn requires(&self) -> &'static [StageId] {
        match self {
            Self::ServiceStart => &[Self::RuntimeInstall, Self::EnvMaterialization],
            Self::HealthCheck => &[Self::ServiceStart],
            _ => &[],
        }
    }

    /// Whether a failure of this stage should let the run continue.
    pub fn optional_by_default(&self) -> bool {
        matches!(self, Self::OptionalTooling | Self::Hardening)
    }

    /// Step deadline used when the catalog does not set one. Download-heavy
    /// stages get ten minutes.
    pub fn default_timeout(&self) -> Duration {
        match self {
            Self::PackageBaseline | Self::RuntimeInstall => Duration::from_secs(600),
            Self::NetworkConfig | Self::OptionalTooling | Self::ServiceStart => {
                Duration::from_secs(300)
            }
            _ => Duration::from_secs(120),
        }
    }
}
