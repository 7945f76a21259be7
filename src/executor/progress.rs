//! Progress reporting for plan runs.
//!
//! The executor calls the `on_progress` callback passed to
//! [`Executor::run`](crate::Executor::run) with one [`ProgressEvent`] per
//! observable change: a step starting, each output line, a step finishing or
//! being skipped, and each inverse action run during rollback.

use super::StepOutcome;
use crate::SkipReason;

/// Which output stream a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Stream {
    Stdout,
    Stderr,
}

/// A progress notification from a running plan.
///
/// `index` is the zero-based position of the step in the plan and `total`
/// the plan length.
///
/// # Example
///
/// ```rust
/// use hostprep::ProgressEvent;
///
/// fn on_progress(event: ProgressEvent) {
///     match &event {
///         ProgressEvent::StepStarted { index, total, name } => {
///             println!("[{}/{}] {}", index + 1, total, name);
///         }
///         ProgressEvent::Output { stream, line, .. } => {
///             println!("  {stream}: {line}");
///         }
///         ProgressEvent::StepFinished { name, outcome, .. } => {
///             println!("{name}: {outcome}");
///         }
///         ProgressEvent::StepSkipped { name, reason, .. } => {
///             println!("{name}: skipped ({})", reason.description());
///         }
///         ProgressEvent::RollingBack { name } => {
///             println!("undoing {name}");
///         }
///     }
/// }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// A step's action was launched.
    StepStarted {
        index: usize,
        total: usize,
        name: String,
    },

    /// One line of action output, without its line terminator.
    Output {
        index: usize,
        total: usize,
        name: String,
        stream: Stream,
        line: String,
    },

    /// A launched step reached a terminal outcome.
    StepFinished {
        index: usize,
        total: usize,
        name: String,
        outcome: StepOutcome,
    },

    /// A step was skipped at plan-build time.
    StepSkipped {
        index: usize,
        total: usize,
        name: String,
        reason: SkipReason,
    },

    /// The inverse action of a committed step is about to run.
    RollingBack {
        name: String,
    },
}

impl ProgressEvent {
    /// Name of the step the event is about.
    pub fn step_name(&self) -> &str {
        match self {
            Self::StepStarted { name, .. }
            | Self::Output { name, .. }
            | Self::StepFinished { name, .. }
            | Self::StepSkipped { name, .. }
            | Self::RollingBack { name } => name,
        }
    }

    /// Get a human-readable description of the event kind.
    ///
    /// ```rust
    /// use hostprep::ProgressEvent;
    ///
    /// let event = ProgressEvent::RollingBack { name: "secrets".into() };
    /// assert_eq!(event.description(), "Rolling back");
    /// ```
    pub fn description(&self) -> &'static str {
        match self {
            Self::StepStarted { .. } => "Step started",
            Self::Output { .. } => "Output",
            Self::StepFinished { .. } => "Step finished",
            Self::StepSkipped { .. } => "Step skipped",
            Self::RollingBack { .. } => "Rolling back",
        }
    }
}
