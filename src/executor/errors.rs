//! Error types for plan runs.

use super::{RollbackEntry, StepOutcome, StepResult};
use thiserror::Error;

/// Why [`Executor::run`](crate::Executor::run) did not complete the plan.
///
/// Both run-ending variants carry every result recorded before the stop.
///
/// # Example
///
/// ```rust
/// use hostprep::RunError;
///
/// fn handle_error(error: RunError) {
///     eprintln!("Run failed: {}", error);
///     if let Some(step) = error.failed_step() {
///         eprintln!("Failing step: {}", step);
///     }
///     eprintln!("To fix: {}", error.fix_suggestion());
/// }
/// ```
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RunError {
    /// A required step failed or timed out and the plan stopped there.
    #[error("step `{step}` {outcome}: {detail}")]
    PlanAborted {
        /// Name of the failing step.
        step: String,
        /// `Failed` or `TimedOut`.
        outcome: StepOutcome,
        /// Error detail of the failing step.
        detail: String,
        /// Captured output of the failing step.
        output: String,
        /// Results up to and including the failing step.
        results: Vec<StepResult>,
        /// Inverse actions run after the failure, most recent step first.
        rollback: Vec<RollbackEntry>,
    },

    /// The run was cancelled. No further step was started.
    #[error("run cancelled")]
    Cancelled {
        /// Results recorded before the cancellation was observed.
        results: Vec<StepResult>,
    },

    /// This executor has already run a plan.
    #[error("executor has already been started")]
    AlreadyStarted,
}

impl RunError {
    /// Name of the step that aborted the plan, if any.
    pub fn failed_step(&self) -> Option<&str> {
        match self {
            Self::PlanAborted { step, .. } => Some(step),
            _ => None,
        }
    }

    /// Results recorded before the run stopped.
    pub fn results(&self) -> &[StepResult] {
        match self {
            Self::PlanAborted { results, .. } | Self::Cancelled { results } => results,
            Self::AlreadyStarted => &[],
        }
    }

    /// Get an actionable suggestion for resolving the error.
    pub fn fix_suggestion(&self) -> String {
        match self {
            Self::PlanAborted { step, outcome, .. } if *outcome == StepOutcome::TimedOut => {
                format!("Raise the timeout of `{step}` or check why it hangs, then re-run")
            }
            Self::PlanAborted { step, .. } => {
                format!("Check the output of `{step}`, fix the cause and re-run the plan")
            }
            Self::Cancelled { .. } => "Re-run the plan to continue".to_string(),
            Self::AlreadyStarted => "Create a new executor for each run".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aborted_names_step() {
        let err = RunError::PlanAborted {
            step: "runtime-install".to_string(),
            outcome: StepOutcome::Failed,
            detail: "exited with status 2".to_string(),
            output: String::new(),
            results: Vec::new(),
            rollback: Vec::new(),
        };
        assert_eq!(err.failed_step(), Some("runtime-install"));
        assert_eq!(
            err.to_string(),
            "step `runtime-install` failed: exited with status 2"
        );
        assert!(err.fix_suggestion().contains("runtime-install"));
    }

    #[test]
    fn test_cancelled_names_no_step() {
        let err = RunError::Cancelled {
            results: Vec::new(),
        };
        assert!(err.failed_step().is_none());
        assert!(err.results().is_empty());
        assert_eq!(err.to_string(), "run cancelled");
    }
}
