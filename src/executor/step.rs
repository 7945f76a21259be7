//! Running one action to a terminal outcome.

use super::drain::{Drain, OutputLog};
use super::{StepOutcome, Stream};
use crate::action::{ActionExit, Launcher};
use crate::{CancelMode, CommandSpec, ExecutorOptions};
use std::io;
use std::path::Path;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Everything the executor records about one action run.
#[derive(Debug)]
pub(crate) struct ActionRun {
    pub(crate) outcome: StepOutcome,
    pub(crate) output: String,
    pub(crate) error: Option<String>,
    pub(crate) exit_code: Option<i32>,
    pub(crate) dropped_lines: usize,
}

impl ActionRun {
    fn failed(error: String) -> Self {
        Self {
            outcome: StepOutcome::Failed,
            output: String::new(),
            error: Some(error),
            exit_code: None,
            dropped_lines: 0,
        }
    }
}

enum Interrupt {
    Deadline,
    Cancel,
}

/// Launch `spec` and drive it until it exits, its deadline passes, or (with
/// [`CancelMode::TerminateRunning`]) the run is cancelled.
///
/// After the action exits, output is read until both pipes close or no line
/// arrives for [`ExecutorOptions::output_grace`]. Both output pipes are
/// released before this returns.
pub(crate) async fn execute_action<F>(
    launcher: &dyn Launcher,
    spec: &CommandSpec,
    work_dir: &Path,
    limit: Duration,
    cancel: &CancellationToken,
    options: &ExecutorOptions,
    mut on_line: F,
) -> ActionRun
where
    F: FnMut(Stream, &str),
{
    let mut action = match launcher.launch(spec, work_dir, cancel.child_token()) {
        Ok(action) => action,
        Err(e) => return ActionRun::failed(format!("failed to start `{spec}`: {e}")),
    };

    let (stdout, stderr) = match (action.take_stdout(), action.take_stderr()) {
        (Some(stdout), Some(stderr)) => (stdout, stderr),
        (stdout, stderr) => {
            drop(stdout);
            drop(stderr);
            action.terminate().await;
            return ActionRun::failed(format!("`{spec}` did not expose both output streams"));
        }
    };

    let mut drain = Drain::spawn(
        stdout,
        stderr,
        options.queue_capacity,
        options.max_line_bytes,
        options.overflow,
    );
    let mut log = OutputLog::new(options.max_captured_lines);
    let watch_cancel = options.cancel_mode == CancelMode::TerminateRunning;

    let deadline = tokio::time::sleep(limit);
    tokio::pin!(deadline);
    // Armed once the action exits; every line after that re-arms it.
    let grace = tokio::time::sleep(limit);
    tokio::pin!(grace);

    let mut exit: Option<io::Result<ActionExit>> = None;
    let mut streams_open = true;
    let mut interrupt = None;

    while exit.is_none() || streams_open {
        tokio::select! {
            biased;
            _ = &mut deadline => {
                // Past exit, the deadline only cuts off pipes held open by
                // a background child.
                if exit.is_none() {
                    interrupt = Some(Interrupt::Deadline);
                }
                break;
            }
            _ = cancel.cancelled(), if watch_cancel && exit.is_none() => {
                interrupt = Some(Interrupt::Cancel);
                break;
            }
            _ = &mut grace, if exit.is_some() => {
                debug!(command = %spec, "output still open after exit, closing");
                break;
            }
            line = drain.recv(), if streams_open => match line {
                Some(line) => {
                    on_line(line.stream, &line.line);
                    log.push(line.line);
                    if exit.is_some() {
                        grace.as_mut().reset(Instant::now() + options.output_grace);
                    }
                }
                None => streams_open = false,
            },
            status = action.wait(), if exit.is_none() => {
                exit = Some(status);
                grace.as_mut().reset(Instant::now() + options.output_grace);
            }
        }
    }

    if interrupt.is_some() {
        action.terminate().await;
    } else {
        // Lines the readers queued before the cut-off.
        while let Some(line) = drain.try_recv() {
            on_line(line.stream, &line.line);
            log.push(line.line);
        }
    }
    let dropped_lines = drain.close().await;
    let output = log.into_string();

    let (outcome, error, exit_code) = match (interrupt, exit) {
        (Some(Interrupt::Deadline), _) => {
            warn!(command = %spec, timeout = ?limit, "action timed out");
            (
                StepOutcome::TimedOut,
                Some(format!("timed out after {limit:?}")),
                None,
            )
        }
        (Some(Interrupt::Cancel), _) => (
            StepOutcome::Cancelled,
            Some("cancelled while running".to_string()),
            None,
        ),
        (None, Some(Ok(status))) if status.success() => {
            (StepOutcome::Succeeded, None, status.code)
        }
        (None, Some(Ok(ActionExit { code: Some(code) }))) => (
            StepOutcome::Failed,
            Some(format!("exited with status {code}")),
            Some(code),
        ),
        (None, Some(Ok(ActionExit { code: None }))) => (
            StepOutcome::Failed,
            Some("terminated by signal".to_string()),
            None,
        ),
        (None, Some(Err(e))) => (
            StepOutcome::Failed,
            Some(format!("failed waiting for action: {e}")),
            None,
        ),
        (None, None) => (
            StepOutcome::Failed,
            Some("action ended without an exit status".to_string()),
            None,
        ),
    };

    if dropped_lines > 0 {
        debug!(command = %spec, dropped_lines, "output lines dropped");
    }

    ActionRun {
        outcome,
        output,
        error,
        exit_code,
        dropped_lines,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{OutputReader, RunningAction};
    use crate::{OverflowPolicy, ProcessLauncher};
    use async_trait::async_trait;
    use std::time::Instant;

    async fn run_shell(script: &str, limit: Duration, options: &ExecutorOptions) -> ActionRun {
        execute_action(
            &ProcessLauncher,
            &CommandSpec::shell(script),
            &std::env::temp_dir(),
            limit,
            &CancellationToken::new(),
            options,
            |_, _| {},
        )
        .await
    }

    #[tokio::test]
    async fn test_success_captures_both_streams() {
        let run = run_shell(
            "echo one; echo two 1>&2",
            Duration::from_secs(10),
            &ExecutorOptions::default(),
        )
        .await;
        assert_eq!(run.outcome, StepOutcome::Succeeded);
        assert_eq!(run.exit_code, Some(0));
        assert!(run.output.contains("one"));
        assert!(run.output.contains("two"));
    }

    #[tokio::test]
    async fn test_non_zero_exit_fails() {
        let run = run_shell("exit 3", Duration::from_secs(10), &ExecutorOptions::default()).await;
        assert_eq!(run.outcome, StepOutcome::Failed);
        assert_eq!(run.exit_code, Some(3));
        assert_eq!(run.error.as_deref(), Some("exited with status 3"));
    }

    #[tokio::test]
    async fn test_deadline_terminates() {
        let started = Instant::now();
        let run = run_shell(
            "sleep 30",
            Duration::from_millis(100),
            &ExecutorOptions::default(),
        )
        .await;
        assert_eq!(run.outcome, StepOutcome::TimedOut);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_spawn_failure_is_failed() {
        let run = execute_action(
            &ProcessLauncher,
            &CommandSpec::new("/nonexistent/setup"),
            &std::env::temp_dir(),
            Duration::from_secs(1),
            &CancellationToken::new(),
            &ExecutorOptions::default(),
            |_, _| {},
        )
        .await;
        assert_eq!(run.outcome, StepOutcome::Failed);
        assert!(run.error.unwrap().starts_with("failed to start"));
    }

    #[tokio::test]
    async fn test_captured_output_is_bounded() {
        let options = ExecutorOptions {
            max_captured_lines: 3,
            ..Default::default()
        };
        let run = run_shell(
            "for i in 1 2 3 4 5 6; do echo $i; done",
            Duration::from_secs(10),
            &options,
        )
        .await;
        assert_eq!(run.output, "4\n5\n6");
    }

    #[tokio::test]
    async fn test_terminate_running_on_cancel() {
        let options = ExecutorOptions {
            cancel_mode: CancelMode::TerminateRunning,
            ..Default::default()
        };
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let run = execute_action(
            &ProcessLauncher,
            &CommandSpec::shell("sleep 30"),
            &std::env::temp_dir(),
            Duration::from_secs(60),
            &cancel,
            &options,
            |_, _| {},
        )
        .await;
        assert_eq!(run.outcome, StepOutcome::Cancelled);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_drop_newest_with_tiny_queue() {
        let options = ExecutorOptions {
            queue_capacity: 1,
            overflow: OverflowPolicy::DropNewest,
            ..Default::default()
        };
        let run = execute_action(
            &ProcessLauncher,
            &CommandSpec::shell("i=0; while [ $i -lt 2000 ]; do echo line $i; i=$((i+1)); done"),
            &std::env::temp_dir(),
            Duration::from_secs(30),
            &CancellationToken::new(),
            &options,
            |_, _| std::thread::sleep(Duration::from_millis(1)),
        )
        .await;
        assert_eq!(run.outcome, StepOutcome::Succeeded);
        assert!(run.dropped_lines > 0);
        assert_eq!(run.output.lines().count() + run.dropped_lines, 2000);
    }

    #[tokio::test]
    async fn test_background_child_released_after_grace() {
        let options = ExecutorOptions {
            output_grace: Duration::from_millis(200),
            ..Default::default()
        };
        let started = Instant::now();
        let run = run_shell("sleep 5 & echo started", Duration::from_secs(60), &options).await;
        assert!(started.elapsed() < Duration::from_secs(3));
        assert_eq!(run.outcome, StepOutcome::Succeeded);
        assert_eq!(run.output, "started");
    }

    #[tokio::test]
    async fn test_output_after_exit_is_kept() {
        // The background writer keeps printing within the grace window.
        let run = run_shell(
            "(sleep 0.1; echo late) & echo early",
            Duration::from_secs(10),
            &ExecutorOptions::default(),
        )
        .await;
        assert_eq!(run.outcome, StepOutcome::Succeeded);
        assert_eq!(run.output, "early\nlate");
    }

    #[tokio::test]
    async fn test_unterminated_output_is_bounded() {
        let options = ExecutorOptions {
            max_captured_lines: 1,
            max_line_bytes: 1024,
            ..Default::default()
        };
        let mut longest = 0;
        let run = execute_action(
            &ProcessLauncher,
            &CommandSpec::shell("head -c 2000000 /dev/zero | tr '\\0' a"),
            &std::env::temp_dir(),
            Duration::from_secs(30),
            &CancellationToken::new(),
            &options,
            |_, line| longest = longest.max(line.len()),
        )
        .await;
        assert_eq!(run.outcome, StepOutcome::Succeeded);
        assert_eq!(longest, 1024);
        assert!(!run.output.is_empty() && run.output.len() <= 1024);
    }

    #[tokio::test]
    async fn test_progress_redraws_arrive_as_lines() {
        let mut lines = Vec::new();
        let run = execute_action(
            &ProcessLauncher,
            &CommandSpec::shell("printf '10%%\\r50%%\\r100%%\\n'"),
            &std::env::temp_dir(),
            Duration::from_secs(10),
            &CancellationToken::new(),
            &ExecutorOptions::default(),
            |_, line| lines.push(line.to_string()),
        )
        .await;
        assert_eq!(run.outcome, StepOutcome::Succeeded);
        assert_eq!(lines, vec!["10%", "50%", "100%"]);
    }

    /// An action that exposes only stdout.
    struct HalfOpen {
        terminated: std::sync::Arc<std::sync::atomic::AtomicBool>,
    }

    #[async_trait]
    impl RunningAction for HalfOpen {
        fn take_stdout(&mut self) -> Option<OutputReader> {
            Some(Box::new(&b"partial\n"[..]))
        }

        fn take_stderr(&mut self) -> Option<OutputReader> {
            None
        }

        async fn wait(&mut self) -> io::Result<ActionExit> {
            Ok(ActionExit { code: Some(0) })
        }

        async fn terminate(&mut self) {
            self.terminated.store(true, std::sync::atomic::Ordering::SeqCst);
        }
    }

    struct HalfOpenLauncher {
        terminated: std::sync::Arc<std::sync::atomic::AtomicBool>,
    }

    impl Launcher for HalfOpenLauncher {
        fn launch(
            &self,
            _spec: &CommandSpec,
            _work_dir: &Path,
            _cancel: CancellationToken,
        ) -> io::Result<Box<dyn RunningAction>> {
            Ok(Box::new(HalfOpen {
                terminated: self.terminated.clone(),
            }))
        }
    }

    #[tokio::test]
    async fn test_missing_stream_fails_and_terminates() {
        let terminated = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let launcher = HalfOpenLauncher {
            terminated: terminated.clone(),
        };
        let run = execute_action(
            &launcher,
            &CommandSpec::new("half"),
            Path::new("."),
            Duration::from_secs(1),
            &CancellationToken::new(),
            &ExecutorOptions::default(),
            |_, _| {},
        )
        .await;
        assert_eq!(run.outcome, StepOutcome::Failed);
        assert!(terminated.load(std::sync::atomic::Ordering::SeqCst));
    }
}
