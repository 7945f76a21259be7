//! Post-install health verification.
//!
//! [`verify`] runs every configured check concurrently and always returns a
//! report with one entry per check. A check that errors or runs out of time
//! is a failed entry, never an error of `verify` itself.

mod config;
mod probes;
mod report;

pub use config::{CheckSpec, HealthConfig, Probe};
pub use report::{CheckResult, HealthReport};

use futures::future::join_all;
use std::collections::BTreeMap;
use std::time::{Instant, SystemTime};
use tokio::time::timeout;
use tracing::{debug, info};

/// Run all checks in `config`.
///
/// Each check is bounded by the smaller of its own timeout and the overall
/// deadline; all checks start together, so the whole pass is bounded by the
/// overall deadline too. Running it again has no side effects beyond the
/// probes themselves.
///
/// # Example
///
/// ```rust
/// use hostprep::{verify, HealthConfig, Probe};
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() {
///     let config = HealthConfig::new()
///         .with_check("root", Probe::FileExists { path: "/".into() })
///         .with_check("missing", Probe::FileExists { path: "/nonexistent/file".into() });
///
///     let report = verify(&config).await;
///     assert_eq!(report.len(), 2);
///     assert!(!report.passed());
///     assert_eq!(report.failed(), vec!["missing"]);
/// }
/// ```
pub async fn verify(config: &HealthConfig) -> HealthReport {
    let futures = config.checks().iter().map(|check| async move {
        let limit = config.effective_timeout(check);
        let started = Instant::now();
        let outcome = timeout(limit, probes::run(&check.probe, limit)).await;
        let elapsed = started.elapsed();

        let result = match outcome {
            Ok(Ok(detail)) => CheckResult {
                passed: true,
                detail,
                elapsed,
            },
            Ok(Err(detail)) => CheckResult {
                passed: false,
                detail,
                elapsed,
            },
            Err(_) => CheckResult {
                passed: false,
                detail: format!("timed out after {limit:?}"),
                elapsed,
            },
        };
        debug!(check = %check.name, passed = result.passed, detail = %result.detail, "health check");
        (check.name.clone(), result)
    });

    let checks: BTreeMap<String, CheckResult> = join_all(futures).await.into_iter().collect();
    let report = HealthReport {
        checks,
        generated_at: SystemTime::now(),
    };
    info!(
        checks = report.len(),
        failed = report.failed().len(),
        "health verification finished"
    );
    report
}
