//! Shared helpers for integration tests.

use std::path::Path;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Route library tracing to the test harness.
///
/// Reads `RUST_LOG`. Defaults to `warn` if unset. Safe to call from every
/// test; only the first call installs the subscriber.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_test_writer().compact())
        .try_init();
}

/// Write an executable stage script into `dir`.
#[allow(dead_code)]
pub fn write_script(dir: &Path, file: &str, body: &str) {
    std::fs::write(dir.join(file), format!("#!/bin/sh\n{body}\n")).unwrap();
}
