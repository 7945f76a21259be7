//! Health check configuration.

use crate::CommandSpec;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// What a check looks at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Probe {
    /// A process with this exact name is running.
    ProcessRunning { name: String },
    /// `systemctl is-active <unit>` reports `active`.
    ServiceActive { unit: String },
    /// The container is `healthy`, or `running` when it defines no
    /// healthcheck.
    ContainerHealthy { container: String },
    /// A TCP connection to `host:port` succeeds.
    TcpReachable { address: String },
    FileExists { path: PathBuf },
    /// The command exits with status 0.
    CommandSucceeds { command: CommandSpec },
}

/// One named check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckSpec {
    pub name: String,
    #[serde(flatten)]
    pub probe: Probe,
    /// Overrides [`HealthConfig::check_timeout`].
    #[serde(
        default,
        rename = "timeout_ms",
        with = "duration_ms::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub timeout: Option<Duration>,
}

/// The checks to run and their time limits.
///
/// Names are unique: registering a check under an existing name replaces
/// the earlier one.
///
/// # Example
///
/// ```rust
/// use hostprep::{HealthConfig, Probe};
/// use std::time::Duration;
///
/// let config = HealthConfig::from_json(r#"{
///     "check_timeout_ms": 2000,
///     "checks": [
///         { "name": "docker", "kind": "service-active", "unit": "docker" },
///         { "name": "web", "kind": "tcp-reachable", "address": "127.0.0.1:8080", "timeout_ms": 500 }
///     ]
/// }"#).unwrap();
///
/// assert_eq!(config.check_timeout, Duration::from_secs(2));
/// assert_eq!(config.checks().len(), 2);
/// assert_eq!(config.timeout_for("web"), Some(Duration::from_millis(500)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    checks: Vec<CheckSpec>,

    /// Time limit for each check.
    ///
    /// Default: 5 seconds
    #[serde(rename = "check_timeout_ms", with = "duration_ms")]
    pub check_timeout: Duration,

    /// Time limit for the whole verification.
    ///
    /// Default: 30 seconds
    #[serde(rename = "overall_deadline_ms", with = "duration_ms")]
    pub overall_deadline: Duration,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            checks: Vec::new(),
            check_timeout: Duration::from_secs(5),
            overall_deadline: Duration::from_secs(30),
        }
    }
}

impl HealthConfig {
    /// An empty configuration with a 5 second per-check timeout and a
    /// 30 second overall deadline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON configuration. Duplicate names keep the last entry.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let raw: Self = serde_json::from_str(json)?;
        let mut config = Self {
            checks: Vec::new(),
            ..raw.clone()
        };
        for check in raw.checks {
            config.register(check);
        }
        Ok(config)
    }

    /// Add a check, replacing any check with the same name in place.
    pub fn register(&mut self, check: CheckSpec) {
        match self.checks.iter_mut().find(|c| c.name == check.name) {
            Some(existing) => *existing = check,
            None => self.checks.push(check),
        }
    }

    /// Add a check that uses the configuration's default timeout.
    ///
    /// # Arguments
    ///
    /// - `name`: Key of the check in the [`HealthReport`](crate::HealthReport);
    ///   a name that already exists is replaced in place
    /// - `probe`: What to check
    pub fn with_check(mut self, name: impl Into<String>, probe: Probe) -> Self {
        self.register(CheckSpec {
            name: name.into(),
            probe,
            timeout: None,
        });
        self
    }

    /// Default time limit for checks that do not set their own.
    pub fn with_check_timeout(mut self, timeout: Duration) -> Self {
        self.check_timeout = timeout;
        self
    }

    /// Upper bound for the whole verification; no check runs past it.
    pub fn with_overall_deadline(mut self, deadline: Duration) -> Self {
        self.overall_deadline = deadline;
        self
    }

    /// Registered checks in registration order. Names are unique.
    pub fn checks(&self) -> &[CheckSpec] {
        &self.checks
    }

    /// Effective limit for the named check: its own timeout or the default,
    /// capped by the overall deadline.
    pub fn timeout_for(&self, name: &str) -> Option<Duration> {
        let check = self.checks.iter().find(|c| c.name == name)?;
        Some(self.effective_timeout(check))
    }

    pub(crate) fn effective_timeout(&self, check: &CheckSpec) -> Duration {
        check
            .timeout
            .unwrap_or(self.check_timeout)
            .min(self.overall_deadline)
    }
}

/// Durations as integer milliseconds.
mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }

    pub mod option {
        use serde::{Deserialize, Deserializer, Serializer};
        use std::time::Duration;

        pub fn serialize<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
            match d {
                Some(d) => s.serialize_some(&(d.as_millis() as u64)),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
            Option::<u64>::deserialize(d).map(|ms| ms.map(Duration::from_millis))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HealthConfig::default();
        assert!(config.checks().is_empty());
        assert_eq!(config.check_timeout, Duration::from_secs(5));
        assert_eq!(config.overall_deadline, Duration::from_secs(30));
    }

    #[test]
    fn test_register_replaces_same_name() {
        let config = HealthConfig::new()
            .with_check("web", Probe::TcpReachable {
                address: "127.0.0.1:80".to_string(),
            })
            .with_check("db", Probe::ProcessRunning {
                name: "postgres".to_string(),
            })
            .with_check("web", Probe::TcpReachable {
                address: "127.0.0.1:8080".to_string(),
            });
        let names: Vec<&str> = config.checks().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["web", "db"]);
        assert_eq!(
            config.checks()[0].probe,
            Probe::TcpReachable {
                address: "127.0.0.1:8080".to_string()
            }
        );
    }

    #[test]
    fn test_json_duplicates_keep_last() {
        let config = HealthConfig::from_json(
            r#"{"checks":[
                {"name":"a","kind":"file-exists","path":"/etc/one"},
                {"name":"a","kind":"file-exists","path":"/etc/two"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(config.checks().len(), 1);
        assert_eq!(
            config.checks()[0].probe,
            Probe::FileExists {
                path: PathBuf::from("/etc/two")
            }
        );
    }

    #[test]
    fn test_timeout_capped_by_deadline() {
        let config = HealthConfig::new()
            .with_overall_deadline(Duration::from_secs(1))
            .with_check("slow", Probe::FileExists {
                path: PathBuf::from("/"),
            });
        assert_eq!(config.timeout_for("slow"), Some(Duration::from_secs(1)));
        assert_eq!(config.timeout_for("missing"), None);
    }

    #[test]
    fn test_command_probe_from_json() {
        let config = HealthConfig::from_json(
            r#"{"checks":[{"name":"compose","kind":"command-succeeds",
                "command":{"program":"docker","args":["compose","ps"]}}]}"#,
        )
        .unwrap();
        match &config.checks()[0].probe {
            Probe::CommandSucceeds { command } => assert_eq!(command.to_string(), "docker compose ps"),
            other => panic!("unexpected probe: {other:?}"),
        }
    }
}
