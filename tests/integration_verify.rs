//! Integration tests for health verification.

mod common;

use hostprep::{verify, CommandSpec, HealthConfig, Probe};
use std::time::{Duration, Instant};

#[tokio::test]
async fn test_mixed_checks_from_json() {
    common::init_tracing();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(".env"), "KEY=value\n").unwrap();

    let json = format!(
        r#"{{
            "check_timeout_ms": 1000,
            "overall_deadline_ms": 3000,
            "checks": [
                {{ "name": "env-file", "kind": "file-exists", "path": {env:?} }},
                {{ "name": "api", "kind": "tcp-reachable", "address": "{address}" }},
                {{ "name": "secrets", "kind": "file-exists", "path": {missing:?} }},
                {{ "name": "hang", "kind": "command-succeeds", "timeout_ms": 100,
                   "command": {{ "program": "sleep", "args": ["30"] }} }}
            ]
        }}"#,
        env = dir.path().join(".env").display().to_string(),
        missing = dir.path().join("secrets.env").display().to_string(),
    );
    let config = HealthConfig::from_json(&json).unwrap();

    let started = Instant::now();
    let report = verify(&config).await;
    assert!(started.elapsed() < Duration::from_secs(3));

    assert_eq!(report.len(), config.checks().len());
    assert!(report.get("env-file").unwrap().passed);
    assert!(report.get("api").unwrap().passed);
    assert!(!report.get("secrets").unwrap().passed);
    let hang = report.get("hang").unwrap();
    assert!(!hang.passed);
    assert!(hang.elapsed < Duration::from_secs(1));
    assert_eq!(report.failed(), vec!["hang", "secrets"]);
}

#[tokio::test]
async fn test_verify_is_rerunnable() {
    let config = HealthConfig::new()
        .with_check("shell", Probe::CommandSucceeds {
            command: CommandSpec::shell("exit 0"),
        })
        .with_check("nothing", Probe::FileExists {
            path: "/nonexistent/marker".into(),
        });

    let first = verify(&config).await;
    let second = verify(&config).await;
    assert_eq!(first.len(), 2);
    assert_eq!(first.failed(), second.failed());
    assert!(second.generated_at >= first.generated_at);
}

#[tokio::test]
async fn test_unreachable_port_fails_within_deadline() {
    // Bind then drop to get a port with nothing listening.
    let address = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().to_string()
    };
    let config = HealthConfig::new()
        .with_overall_deadline(Duration::from_millis(500))
        .with_check("closed", Probe::TcpReachable { address });

    let report = verify(&config).await;
    assert_eq!(report.len(), 1);
    assert!(!report.passed());
}
