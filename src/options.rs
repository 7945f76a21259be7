//! Detection and execution options.
//!
//! This module provides [`DetectOptions`] for configuring host probes and
//! [`ExecutorOptions`] for configuring how a plan is run.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration options for host detection.
///
/// # Example
///
/// ```rust
/// use hostprep::DetectOptions;
/// use std::time::Duration;
///
/// let opts = DetectOptions {
///     timeout: Duration::from_secs(10),
///     ..Default::default()
/// };
/// assert!(!opts.skip_version);
/// ```
#[derive(Debug, Clone)]
pub struct DetectOptions {
    /// Upper bound for each individual probe (a command invocation or a
    /// file read). A probe that exceeds it is recorded as degraded.
    ///
    /// Default: 5 seconds
    pub timeout: Duration,

    /// Skip running `--version` for each tool.
    ///
    /// Tools are still located on PATH and probed for liveness; their
    /// `version` is left as `None`.
    ///
    /// Default: `false`
    pub skip_version: bool,

    /// Filesystem whose free space is reported.
    ///
    /// Default: `/`
    pub disk_path: PathBuf,
}

impl Default for DetectOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            skip_version: false,
            disk_path: PathBuf::from("/"),
        }
    }
}

/// What the output queue does when the progress consumer falls behind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverflowPolicy {
    /// Readers wait for space. The action may block on a full pipe, which
    /// the step deadline still bounds.
    #[default]
    Backpressure,
    /// Lines arriving at a full queue are discarded and counted.
    DropNewest,
}

/// How a cancel request affects the step that is currently running.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CancelMode {
    /// The running step finishes; no further step starts. The cancellation
    /// token is still handed to the launcher for actions that observe it.
    #[default]
    AtStepBoundary,
    /// The running action is asked to terminate and its step is recorded
    /// as cancelled.
    TerminateRunning,
}

/// Options for running a [`StepPlan`](crate::StepPlan).
///
/// # Example
///
/// ```rust
/// use hostprep::{CancelMode, ExecutorOptions};
///
/// let opts = ExecutorOptions {
///     cancel_mode: CancelMode::TerminateRunning,
///     ..Default::default()
/// };
/// assert_eq!(opts.queue_capacity, 256);
/// ```
#[derive(Debug, Clone)]
pub struct ExecutorOptions {
    /// Capacity of the queue shared by a step's stdout and stderr readers.
    ///
    /// Default: 256 lines
    pub queue_capacity: usize,

    /// Behaviour when the queue is full.
    ///
    /// Default: [`OverflowPolicy::Backpressure`]
    pub overflow: OverflowPolicy,

    /// Number of trailing output lines kept in each [`StepResult`](crate::StepResult).
    ///
    /// Default: 2000
    pub max_captured_lines: usize,

    /// Longest line forwarded or kept, in bytes. Longer runs without a line
    /// break are split. `\r` also ends a line, so redrawn progress bars
    /// arrive one frame at a time.
    ///
    /// Default: 8 KiB
    pub max_line_bytes: usize,

    /// How long output is still read after the action exits while no new
    /// line arrives. A background child that inherited the pipes cannot
    /// hold the step open past this.
    ///
    /// Default: 500 milliseconds
    pub output_grace: Duration,

    /// Default: [`CancelMode::AtStepBoundary`]
    pub cancel_mode: CancelMode,

    /// Run inverse actions of committed steps when a required step fails.
    ///
    /// Default: `true`
    pub rollback: bool,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            overflow: OverflowPolicy::Backpressure,
            max_captured_lines: 2000,
            max_line_bytes: 8 * 1024,
            output_grace: Duration::from_millis(500),
            cancel_mode: CancelMode::AtStepBoundary,
            rollback: true,
        }
    }
}
