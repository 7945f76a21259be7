//! Action invocation: how the executor starts the external work of a step.
//!
//! The executor only knows [`Launcher`] and [`RunningAction`]. What a
//! command actually does (install packages, write an env file, start a
//! compose stack) is opaque to it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::Path;
use std::process::Stdio;
use tokio::io::AsyncRead;
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// A structured command for programmatic execution.
///
/// # Example
///
/// ```rust
/// use hostprep::CommandSpec;
///
/// let cmd = CommandSpec::new("docker").arg("compose").arg("up").arg("-d");
/// assert_eq!(cmd.to_string(), "docker compose up -d");
///
/// let script = CommandSpec::shell("echo ready");
/// assert_eq!(script.program, "sh");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    /// The program to execute.
    pub program: String,

    /// Arguments to pass to the program.
    pub args: Vec<String>,

    /// Environment variables set for the child (key, value pairs).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env_vars: Vec<(String, String)>,
}

impl CommandSpec {
    /// A command with no arguments or extra environment. `program` is
    /// resolved on PATH at launch.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env_vars: Vec::new(),
        }
    }

    /// `sh -c <script>`.
    pub fn shell(script: impl Into<String>) -> Self {
        Self::new("sh").arg("-c").arg(script)
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Add an environment variable on top of the inherited environment.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.push((key.into(), value.into()));
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            if arg.contains(char::is_whitespace) {
                write!(f, " {arg:?}")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

/// One of an action's output streams.
pub type OutputReader = Box<dyn AsyncRead + Send + Unpin>;

/// How an action ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionExit {
    /// Exit code; `None` when the action was ended by a signal.
    pub code: Option<i32>,
}

impl ActionExit {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// A started action.
#[async_trait]
pub trait RunningAction: Send {
    /// Take the primary output stream. Returns `None` once taken, or if the
    /// action has no such stream.
    fn take_stdout(&mut self) -> Option<OutputReader>;

    /// Take the secondary output stream.
    fn take_stderr(&mut self) -> Option<OutputReader>;

    /// Wait for the action to exit.
    ///
    /// Must be cancel-safe: the executor polls it inside `select!` and may
    /// drop the future and call it again.
    async fn wait(&mut self) -> io::Result<ActionExit>;

    /// Ask the action to stop and wait until it has. Calling it on an action
    /// that already exited is a no-op.
    async fn terminate(&mut self);
}

/// Starts actions.
pub trait Launcher: Send + Sync {
    /// Start `spec` in `work_dir`.
    ///
    /// `cancel` fires when the run is cancelled. Launchers whose actions can
    /// observe it (in-process work, remote jobs) should; the executor itself
    /// only checks it at step boundaries unless configured otherwise.
    fn launch(
        &self,
        spec: &CommandSpec,
        work_dir: &Path,
        cancel: CancellationToken,
    ) -> io::Result<Box<dyn RunningAction>>;
}

/// Launches actions as OS processes via `tokio::process`.
///
/// Children are killed when their handle is dropped, so an abandoned step can
/// never outlive the run. OS processes cannot observe the cancellation
/// token; use [`CancelMode::TerminateRunning`](crate::CancelMode) to stop a
/// running process on cancel.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessLauncher;

impl Launcher for ProcessLauncher {
    fn launch(
        &self,
        spec: &CommandSpec,
        work_dir: &Path,
        _cancel: CancellationToken,
    ) -> io::Result<Box<dyn RunningAction>> {
        let child = Command::new(&spec.program)
            .args(&spec.args)
            .envs(spec.env_vars.iter().cloned())
            .current_dir(work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        debug!(command = %spec, pid = ?child.id(), "action spawned");
        Ok(Box::new(ProcessAction { child }))
    }
}

struct ProcessAction {
    child: Child,
}

#[async_trait]
impl RunningAction for ProcessAction {
    fn take_stdout(&mut self) -> Option<OutputReader> {
        self.child.stdout.take().map(|s| Box::new(s) as OutputReader)
    }

    fn take_stderr(&mut self) -> Option<OutputReader> {
        self.child.stderr.take().map(|s| Box::new(s) as OutputReader)
    }

    async fn wait(&mut self) -> io::Result<ActionExit> {
        let status = self.child.wait().await?;
        Ok(ActionExit {
            code: status.code(),
        })
    }

    async fn terminate(&mut self) {
        if let Err(e) = self.child.start_kill() {
            // Already reaped.
            debug!(error = %e, "terminate: kill not delivered");
            return;
        }
        let _ = self.child.wait().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[test]
    fn test_display_quotes_whitespace() {
        let cmd = CommandSpec::shell("echo hello");
        assert_eq!(cmd.to_string(), "sh -c \"echo hello\"");
    }

    #[test]
    fn test_builder() {
        let cmd = CommandSpec::new("tailscale")
            .args(["up", "--ssh"])
            .env("TS_AUTHKEY", "tskey-123");
        assert_eq!(cmd.args, vec!["up", "--ssh"]);
        assert_eq!(cmd.env_vars, vec![("TS_AUTHKEY".to_string(), "tskey-123".to_string())]);
    }

    #[test]
    fn test_exit_success() {
        assert!(ActionExit { code: Some(0) }.success());
        assert!(!ActionExit { code: Some(1) }.success());
        assert!(!ActionExit { code: None }.success());
    }

    #[tokio::test]
    async fn test_process_launcher_streams_and_exit() {
        let spec = CommandSpec::shell("echo out; echo err 1>&2; exit 4");
        let mut action = ProcessLauncher
            .launch(&spec, &std::env::temp_dir(), CancellationToken::new())
            .unwrap();

        let mut out = String::new();
        action.take_stdout().unwrap().read_to_string(&mut out).await.unwrap();
        let mut err = String::new();
        action.take_stderr().unwrap().read_to_string(&mut err).await.unwrap();
        assert!(action.take_stdout().is_none());

        let exit = action.wait().await.unwrap();
        assert_eq!(out.trim(), "out");
        assert_eq!(err.trim(), "err");
        assert_eq!(exit.code, Some(4));
    }

    #[tokio::test]
    async fn test_process_launcher_env_and_work_dir() {
        let dir = tempfile::tempdir().unwrap();
        let spec = CommandSpec::shell("echo $GREETING; pwd").env("GREETING", "hi");
        let mut action = ProcessLauncher
            .launch(&spec, dir.path(), CancellationToken::new())
            .unwrap();

        let mut out = String::new();
        action.take_stdout().unwrap().read_to_string(&mut out).await.unwrap();
        action.wait().await.unwrap();

        let mut lines = out.lines();
        assert_eq!(lines.next(), Some("hi"));
        let pwd = std::path::PathBuf::from(lines.next().unwrap());
        assert_eq!(pwd.canonicalize().unwrap(), dir.path().canonicalize().unwrap());
    }

    #[tokio::test]
    async fn test_terminate_stops_long_action() {
        let spec = CommandSpec::shell("sleep 30");
        let mut action = ProcessLauncher
            .launch(&spec, &std::env::temp_dir(), CancellationToken::new())
            .unwrap();
        let started = std::time::Instant::now();
        action.terminate().await;
        let exit = action.wait().await.unwrap();
        assert!(!exit.success());
        assert!(started.elapsed() < std::time::Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_missing_program_fails_to_launch() {
        let spec = CommandSpec::new("/nonexistent/installer");
        let result = ProcessLauncher.launch(&spec, &std::env::temp_dir(), CancellationToken::new());
        assert!(result.is_err());
    }
}
