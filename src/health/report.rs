use serde::Serialize;
use std::collections::BTreeMap;
use std::time::{Duration, SystemTime};

/// Result of one check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckResult {
    pub passed: bool,
    pub detail: String,
    pub elapsed: Duration,
}

/// Outcome of a verification pass, keyed by check name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub checks: BTreeMap<String, CheckResult>,
    pub generated_at: SystemTime,
}

impl HealthReport {
    /// `true` when every check passed. An empty report passes.
    pub fn passed(&self) -> bool {
        self.checks.values().all(|c| c.passed)
    }

    /// Names of failed checks, in name order.
    pub fn failed(&self) -> Vec<&str> {
        self.checks
            .iter()
            .filter(|(_, c)| !c.passed)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<&CheckResult> {
        self.checks.get(name)
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }
}
