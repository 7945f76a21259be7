use super::StepResult;
use serde::Serialize;

/// Lifecycle of an executor's single run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum RunState {
    #[default]
    Idle,
    Running,
    /// Every step reached a terminal outcome and no required step failed.
    Completed,
    /// A required step failed or timed out.
    Aborted,
    Cancelled,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Aborted | Self::Cancelled)
    }
}

/// The step being executed right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CurrentStep {
    /// Zero-based position in the plan.
    pub index: usize,
    pub total: usize,
    pub name: String,
}

/// A copy of the executor's state.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExecutionState {
    pub run_state: RunState,
    pub current: Option<CurrentStep>,
    /// Results in plan order.
    pub results: Vec<StepResult>,
    pub cancel_requested: bool,
}
