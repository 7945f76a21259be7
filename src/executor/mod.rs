//! Step execution.
//!
//! [`Executor::run`] walks a [`StepPlan`] strictly in order, one step at a
//! time. Each runnable step is launched through a [`Launcher`] under its own
//! deadline; its stdout and stderr are drained line by line into one bounded
//! queue and forwarded to the progress callback.
//!
//! Observers on other tasks use an [`ExecutorHandle`]: every read copies the
//! state out, and [`ExecutorHandle::cancel`] requests cooperative
//! cancellation.

mod drain;
mod errors;
mod outcome;
mod progress;
mod rollback;
mod state;
mod step;

pub use errors::RunError;
pub use outcome::{StepOutcome, StepResult};
pub use progress::{ProgressEvent, Stream};
pub use rollback::RollbackEntry;
pub use state::{CurrentStep, ExecutionState, RunState};

use crate::action::{Launcher, ProcessLauncher};
use crate::{ExecutorOptions, Step, StepPlan};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

struct Shared {
    state: Mutex<ExecutionState>,
    cancel: CancellationToken,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, ExecutionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn cancel(&self) {
        self.lock().cancel_requested = true;
        self.cancel.cancel();
        info!("cancellation requested");
    }

    fn push_result(&self, result: StepResult) {
        let mut state = self.lock();
        state.current = None;
        state.results.push(result);
    }

    /// Enter a terminal run state and return a copy of the results.
    fn finish(&self, run_state: RunState) -> Vec<StepResult> {
        let mut state = self.lock();
        state.run_state = run_state;
        state.current = None;
        info!(state = %run_state, results = state.results.len(), "run finished");
        state.results.clone()
    }
}

/// A clonable view of an [`Executor`] for other tasks.
#[derive(Clone)]
pub struct ExecutorHandle {
    shared: Arc<Shared>,
}

impl ExecutorHandle {
    /// Request cancellation. Idempotent; the run stops at the next step
    /// boundary.
    pub fn cancel(&self) {
        self.shared.cancel();
    }

    /// Copy of the results recorded so far, in plan order.
    pub fn results(&self) -> Vec<StepResult> {
        self.shared.lock().results.clone()
    }

    /// The step that is running right now, or `None` between steps and
    /// while skipped steps are recorded.
    pub fn current_step(&self) -> Option<CurrentStep> {
        self.shared.lock().current.clone()
    }

    /// Lifecycle state: idle, running, or the terminal state of the run.
    pub fn run_state(&self) -> RunState {
        self.shared.lock().run_state
    }

    /// Copy of the whole execution state.
    pub fn state(&self) -> ExecutionState {
        self.shared.lock().clone()
    }
}

impl std::fmt::Debug for ExecutorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutorHandle")
            .field("run_state", &self.run_state())
            .finish()
    }
}

/// Runs one [`StepPlan`].
///
/// An executor runs at most one plan; a second [`run`](Self::run) call is
/// rejected with [`RunError::AlreadyStarted`].
///
/// # Example
///
/// ```rust,no_run
/// use hostprep::{CommandSpec, Executor, ExecutorOptions, Mode, Step, StepPlan};
///
/// #[tokio::main]
/// async fn main() {
///     let plan = StepPlan::new(
///         Mode::LocalNetwork,
///         vec![
///             Step::new("pull", CommandSpec::new("docker").args(["compose", "pull"])),
///             Step::new("up", CommandSpec::new("docker").args(["compose", "up", "-d"])),
///         ],
///     )
///     .unwrap();
///
///     let executor = Executor::new(ExecutorOptions::default());
///     let handle = executor.handle();
///     tokio::spawn(async move {
///         tokio::time::sleep(std::time::Duration::from_secs(900)).await;
///         handle.cancel();
///     });
///
///     match executor.run(&plan, |event| println!("{:?}", event)).await {
///         Ok(results) => println!("{} steps done", results.len()),
///         Err(e) => println!("Failed: {}. Fix: {}", e, e.fix_suggestion()),
///     }
/// }
/// ```
pub struct Executor {
    launcher: Arc<dyn Launcher>,
    options: ExecutorOptions,
    shared: Arc<Shared>,
}

impl Default for Executor {
    fn default() -> Self {
        Self::new(ExecutorOptions::default())
    }
}

impl Executor {
    /// An executor that runs actions as OS processes.
    pub fn new(options: ExecutorOptions) -> Self {
        Self::with_launcher(ProcessLauncher, options)
    }

    /// An executor that starts actions through `launcher`.
    ///
    /// # Arguments
    ///
    /// - `launcher`: Starts each step's [`CommandSpec`](crate::CommandSpec);
    ///   tests use it to substitute scripted actions
    /// - `options`: Queueing, capture, cancellation and rollback behaviour
    pub fn with_launcher(launcher: impl Launcher + 'static, options: ExecutorOptions) -> Self {
        Self {
            launcher: Arc::new(launcher),
            options,
            shared: Arc::new(Shared {
                state: Mutex::new(ExecutionState::default()),
                cancel: CancellationToken::new(),
            }),
        }
    }

    /// A clonable handle for observing or cancelling the run from another
    /// task.
    pub fn handle(&self) -> ExecutorHandle {
        ExecutorHandle {
            shared: self.shared.clone(),
        }
    }

    /// See [`ExecutorHandle::cancel`].
    pub fn cancel(&self) {
        self.shared.cancel();
    }

    /// See [`ExecutorHandle::results`].
    pub fn results(&self) -> Vec<StepResult> {
        self.handle().results()
    }

    /// See [`ExecutorHandle::current_step`].
    pub fn current_step(&self) -> Option<CurrentStep> {
        self.handle().current_step()
    }

    /// See [`ExecutorHandle::run_state`].
    pub fn run_state(&self) -> RunState {
        self.handle().run_state()
    }

    pub fn state(&self) -> ExecutionState {
        self.handle().state()
    }

    /// Run `plan` to completion, failure or cancellation.
    ///
    /// This function:
    /// 1. Moves the executor from idle to running (only once)
    /// 2. Records skipped steps without launching anything
    /// 3. Runs each runnable step under its own timeout, forwarding output
    /// 4. On a required failure, unwinds committed steps in reverse
    ///
    /// Cancellation is checked before the first step and at every step
    /// boundary.
    ///
    /// # Arguments
    ///
    /// - `plan`: The steps to run, in order
    /// - `on_progress`: Called on the running task for every event
    ///
    /// # Returns
    ///
    /// - `Ok(results)` with one result per step when the plan completes;
    ///   optional failures are included
    /// - `Err(RunError::PlanAborted)` when a required step fails or times out
    /// - `Err(RunError::Cancelled)` when a cancel request stopped the run
    /// - `Err(RunError::AlreadyStarted)` on a second call
    pub async fn run<F>(
        &self,
        plan: &StepPlan,
        mut on_progress: F,
    ) -> Result<Vec<StepResult>, RunError>
    where
        F: FnMut(ProgressEvent) + Send,
    {
        // Step 1: Claim the executor
        {
            let mut state = self.shared.lock();
            if state.run_state != RunState::Idle {
                return Err(RunError::AlreadyStarted);
            }
            state.run_state = RunState::Running;
        }
        info!(mode = %plan.mode(), steps = plan.len(), "run started");

        // Step 2: Honour a cancel made before the run, even for an empty plan
        if self.shared.cancel.is_cancelled() {
            return Err(self.cancelled());
        }

        // Step 3: Walk the steps in order
        let total = plan.len();
        let mut committed: Vec<&Step> = Vec::new();

        for (index, step) in plan.steps().iter().enumerate() {
            if self.shared.cancel.is_cancelled() {
                return Err(self.cancelled());
            }

            if let Some(reason) = &step.skip {
                info!(step = %step.name, reason = %reason.description(), "step skipped");
                on_progress(ProgressEvent::StepSkipped {
                    index,
                    total,
                    name: step.name.clone(),
                    reason: reason.clone(),
                });
                self.shared.push_result(StepResult::skipped(step, reason.clone()));
                continue;
            }

            self.shared.lock().current = Some(CurrentStep {
                index,
                total,
                name: step.name.clone(),
            });
            info!(step = %step.name, index, total, command = %step.action, "step started");
            on_progress(ProgressEvent::StepStarted {
                index,
                total,
                name: step.name.clone(),
            });

            let started_at = SystemTime::now();
            let run = step::execute_action(
                self.launcher.as_ref(),
                &step.action,
                &step.work_dir,
                step.timeout,
                &self.shared.cancel,
                &self.options,
                |stream, line| {
                    on_progress(ProgressEvent::Output {
                        index,
                        total,
                        name: step.name.clone(),
                        stream,
                        line: line.to_string(),
                    })
                },
            )
            .await;

            let result = StepResult {
                name: step.name.clone(),
                outcome: run.outcome,
                output: run.output,
                error: run.error,
                exit_code: run.exit_code,
                dropped_lines: run.dropped_lines,
                started_at: Some(started_at),
                finished_at: Some(SystemTime::now()),
                skip_reason: None,
            };
            info!(step = %step.name, outcome = %result.outcome, "step finished");
            on_progress(ProgressEvent::StepFinished {
                index,
                total,
                name: step.name.clone(),
                outcome: result.outcome,
            });
            self.shared.push_result(result.clone());

            match result.outcome {
                StepOutcome::Succeeded => {
                    if step.undo.is_some() {
                        committed.push(step);
                    }
                }
                StepOutcome::Cancelled => return Err(self.cancelled()),
                StepOutcome::Failed | StepOutcome::TimedOut if step.optional => {
                    warn!(
                        step = %step.name,
                        outcome = %result.outcome,
                        error = result.error.as_deref().unwrap_or(""),
                        "optional step failed, continuing"
                    );
                }
                StepOutcome::Failed | StepOutcome::TimedOut => {
                    warn!(
                        step = %step.name,
                        outcome = %result.outcome,
                        error = result.error.as_deref().unwrap_or(""),
                        "required step failed, aborting plan"
                    );
                    // Step 4: Unwind committed steps, newest first
                    let rollback = if self.options.rollback {
                        rollback::unwind(
                            &committed,
                            self.launcher.as_ref(),
                            &self.options,
                            &mut on_progress,
                        )
                        .await
                    } else {
                        Vec::new()
                    };
                    let results = self.shared.finish(RunState::Aborted);
                    return Err(RunError::PlanAborted {
                        step: result.name,
                        outcome: result.outcome,
                        detail: result.error.unwrap_or_default(),
                        output: result.output,
                        results,
                        rollback,
                    });
                }
                StepOutcome::Skipped => {}
            }
        }

        Ok(self.shared.finish(RunState::Completed))
    }

    fn cancelled(&self) -> RunError {
        RunError::Cancelled {
            results: self.shared.finish(RunState::Cancelled),
        }
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("options", &self.options)
            .field("run_state", &self.run_state())
            .finish()
    }
}
