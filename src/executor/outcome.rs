use crate::{SkipReason, Step};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};

/// Terminal state of one step.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum StepOutcome {
    Succeeded,
    Failed,
    TimedOut,
    Cancelled,
    Skipped,
}

impl StepOutcome {
    /// `Failed` or `TimedOut`: the outcomes that abort a plan when the step
    /// is required.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed | Self::TimedOut)
    }
}

/// What happened to one step of a run.
///
/// Skipped steps carry their skip reason and no timestamps.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepResult {
    pub name: String,
    pub outcome: StepOutcome,
    /// Captured stdout and stderr lines in arrival order, newline-joined.
    /// Only the most recent lines are kept.
    pub output: String,
    pub error: Option<String>,
    pub exit_code: Option<i32>,
    /// Lines discarded by a full output queue.
    pub dropped_lines: usize,
    pub started_at: Option<SystemTime>,
    pub finished_at: Option<SystemTime>,
    pub skip_reason: Option<SkipReason>,
}

impl StepResult {
    pub(crate) fn skipped(step: &Step, reason: SkipReason) -> Self {
        Self {
            name: step.name.clone(),
            outcome: StepOutcome::Skipped,
            output: String::new(),
            error: None,
            exit_code: None,
            dropped_lines: 0,
            started_at: None,
            finished_at: None,
            skip_reason: Some(reason),
        }
    }

    /// Whether the step's action was launched (or launch was attempted).
    pub fn was_attempted(&self) -> bool {
        self.outcome != StepOutcome::Skipped
    }

    pub fn duration(&self) -> Option<Duration> {
        let (start, end) = (self.started_at?, self.finished_at?);
        end.duration_since(start).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CommandSpec;

    #[test]
    fn test_skipped_result_has_no_timestamps() {
        let step = Step::new("hardening", CommandSpec::new("true"));
        let result = StepResult::skipped(&step, SkipReason::NotApplicable);
        assert_eq!(result.outcome, StepOutcome::Skipped);
        assert!(!result.was_attempted());
        assert!(result.started_at.is_none() && result.finished_at.is_none());
        assert!(result.duration().is_none());
    }

    #[test]
    fn test_outcome_display_and_failure() {
        assert_eq!(StepOutcome::TimedOut.to_string(), "timed-out");
        assert!(StepOutcome::TimedOut.is_failure());
        assert!(StepOutcome::Failed.is_failure());
        assert!(!StepOutcome::Cancelled.is_failure());
        assert!(!StepOutcome::Skipped.is_failure());
    }
}
