use super::step::execute_action;
use super::{ProgressEvent, StepOutcome};
use crate::action::Launcher;
use crate::{ExecutorOptions, Step};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Outcome of one inverse action.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RollbackEntry {
    /// The step whose inverse action ran.
    pub step: String,
    pub outcome: StepOutcome,
    pub error: Option<String>,
}

/// Run the inverse action of every committed step, most recent first.
///
/// Best-effort: failures are logged and recorded, and the next undo still
/// runs. Undo actions get a fresh cancellation token so a cancelled run can
/// still unwind.
pub(crate) async fn unwind<F>(
    committed: &[&Step],
    launcher: &dyn Launcher,
    options: &ExecutorOptions,
    on_progress: &mut F,
) -> Vec<RollbackEntry>
where
    F: FnMut(ProgressEvent),
{
    let mut entries = Vec::new();

    for step in committed.iter().rev() {
        let Some(undo) = &step.undo else {
            continue;
        };

        on_progress(ProgressEvent::RollingBack {
            name: step.name.clone(),
        });
        info!(step = %step.name, command = %undo, "rolling back step");

        let run = execute_action(
            launcher,
            undo,
            &step.work_dir,
            step.timeout,
            &CancellationToken::new(),
            options,
            |_, _| {},
        )
        .await;

        if run.outcome != StepOutcome::Succeeded {
            warn!(
                step = %step.name,
                outcome = %run.outcome,
                error = run.error.as_deref().unwrap_or(""),
                "rollback action failed"
            );
        }

        entries.push(RollbackEntry {
            step: step.name.clone(),
            outcome: run.outcome,
            error: run.error,
        });
    }

    entries
}
