//! Short-lived probe commands with a timeout.

use std::ffi::OsStr;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tokio::time::timeout;

/// Why a single probe could not produce a value.
///
/// These never escape detection: the detector turns them into
/// [`ProbeDegraded`](crate::ProbeDegraded) records.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub(crate) enum ProbeError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("permission denied")]
    PermissionDenied,

    #[error("`{0}` not found")]
    NotFound(String),

    #[error("exited with status {0:?}")]
    NonZeroExit(Option<i32>),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("unrecognised output")]
    InvalidOutput,
}

impl From<std::io::Error> for ProbeError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied,
            _ => Self::Io(e.to_string()),
        }
    }
}

/// Run `program args...` and return its output.
///
/// The child is killed if it outlives `limit`. Output is stdout, or stderr
/// when stdout is empty (some tools print their version to stderr).
pub(crate) async fn run_probe<S: AsRef<OsStr>>(
    program: impl AsRef<OsStr>,
    args: &[S],
    limit: Duration,
) -> Result<String, ProbeError> {
    let program = program.as_ref();
    let output = timeout(
        limit,
        Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .output(),
    )
    .await
    .map_err(|_| ProbeError::Timeout(limit))?
    .map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ProbeError::NotFound(program.to_string_lossy().into_owned())
        } else {
            ProbeError::from(e)
        }
    })?;

    if !output.status.success() {
        return Err(ProbeError::NonZeroExit(output.status.code()));
    }

    let out = if !output.stdout.is_empty() {
        output.stdout
    } else {
        output.stderr
    };

    String::from_utf8(out).map_err(|_| ProbeError::InvalidOutput)
}

/// Read a small system file under the probe timeout.
pub(crate) async fn read_probe_file(
    path: impl AsRef<std::path::Path>,
    limit: Duration,
) -> Result<String, ProbeError> {
    let path = path.as_ref();
    timeout(limit, tokio::fs::read_to_string(path))
        .await
        .map_err(|_| ProbeError::Timeout(limit))?
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ProbeError::NotFound(path.display().to_string())
            } else {
                ProbeError::from(e)
            }
        })
}
