//! Step plans.
//!
//! A [`StepPlan`] is an ordered, immutable list of [`Step`]s whose run/skip
//! decisions were resolved when the plan was built. The executor never
//! re-evaluates a condition; it only reads [`Step::skip`].

mod builder;
mod catalog;
mod selections;
mod stage;

pub use builder::build_plan;
pub use catalog::{ActionCatalog, StageAction};
pub use selections::UserSelections;
pub use stage::StageId;

use crate::{CommandSpec, Mode};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::Write as _;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Why a step will not run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "kebab-case")]
pub enum SkipReason {
    /// The user did not select the component.
    NotSelected,
    /// The step makes no sense on this host or in this mode.
    NotApplicable,
    /// The host is already in the state the step would produce.
    AlreadySatisfied,
    /// A stage this one requires will not run.
    UpstreamSkipped { upstream: String },
    /// No action is configured for the stage.
    NoAction,
}

impl SkipReason {
    pub fn description(&self) -> String {
        match self {
            Self::NotSelected => "not selected".to_string(),
            Self::NotApplicable => "not applicable".to_string(),
            Self::AlreadySatisfied => "already satisfied".to_string(),
            Self::UpstreamSkipped { upstream } => format!("requires skipped step `{upstream}`"),
            Self::NoAction => "no action configured".to_string(),
        }
    }
}

/// A named, idempotent unit of work.
///
/// # Example
///
/// ```rust
/// use hostprep::{CommandSpec, Step};
/// use std::time::Duration;
///
/// let step = Step::new("pull-images", CommandSpec::new("docker").args(["compose", "pull"]))
///     .with_timeout(Duration::from_secs(600))
///     .optional();
/// assert!(step.optional);
/// assert!(step.is_runnable());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Unique within a plan.
    pub name: String,
    pub description: String,
    /// The stage this step was built from, if it came from the plan builder.
    pub stage: Option<StageId>,
    pub action: CommandSpec,
    pub undo: Option<CommandSpec>,
    pub work_dir: PathBuf,
    pub timeout: Duration,
    /// A failure is recorded but does not abort the plan.
    pub optional: bool,
    /// Resolved at build time; `Some` means the step never runs.
    pub skip: Option<SkipReason>,
}

impl Step {
    /// A required step with a two minute timeout, running in the current
    /// directory.
    pub fn new(name: impl Into<String>, action: CommandSpec) -> Self {
        let name = name.into();
        Self {
            description: name.clone(),
            name,
            stage: None,
            action,
            undo: None,
            work_dir: PathBuf::from("."),
            timeout: Duration::from_secs(120),
            optional: false,
            skip: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_work_dir(mut self, work_dir: impl Into<PathBuf>) -> Self {
        self.work_dir = work_dir.into();
        self
    }

    pub fn with_undo(mut self, undo: CommandSpec) -> Self {
        self.undo = Some(undo);
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn skipped(mut self, reason: SkipReason) -> Self {
        self.skip = Some(reason);
        self
    }

    pub fn is_runnable(&self) -> bool {
        self.skip.is_none()
    }
}

/// A plan could not be assembled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("duplicate step name `{0}`")]
    DuplicateStep(String),
}

/// An ordered sequence of steps with resolved skip flags.
///
/// Immutable once built: there is no way to add, remove or re-flag a step
/// of an existing plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepPlan {
    mode: Mode,
    steps: Vec<Step>,
}

impl StepPlan {
    /// Assemble a plan from explicit steps. Step names must be unique.
    pub fn new(mode: Mode, steps: Vec<Step>) -> Result<Self, PlanError> {
        let mut seen = HashSet::new();
        for step in &steps {
            if !seen.insert(step.name.as_str()) {
                return Err(PlanError::DuplicateStep(step.name.clone()));
            }
        }
        Ok(Self { mode, steps })
    }

    /// Deployment mode the plan was built for.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Every step in execution order, skipped ones included.
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Look up a step by its unique name.
    pub fn get(&self, name: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// Number of steps that will actually run.
    pub fn runnable_count(&self) -> usize {
        self.steps.iter().filter(|s| s.is_runnable()).count()
    }

    /// Dry-run listing of the plan, one line per step.
    ///
    /// ```text
    /// mode: vpn-mesh
    ///  1. [run ] system-check: Check host prerequisites (sh system-check.sh)
    ///  3. [skip] runtime-install: Install the container runtime (already satisfied)
    /// ```
    pub fn preview(&self) -> String {
        let mut out = format!("mode: {}\n", self.mode);
        for (i, step) in self.steps.iter().enumerate() {
            let _ = match &step.skip {
                None => writeln!(
                    out,
                    "{:>2}. [run ] {}: {} ({}){}",
                    i + 1,
                    step.name,
                    step.description,
                    step.action,
                    if step.optional { " [optional]" } else { "" },
                ),
                Some(reason) => writeln!(
                    out,
                    "{:>2}. [skip] {}: {} ({})",
                    i + 1,
                    step.name,
                    step.description,
                    reason.description(),
                ),
            };
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_names_rejected() {
        let steps = vec![
            Step::new("a", CommandSpec::new("true")),
            Step::new("a", CommandSpec::new("false")),
        ];
        assert_eq!(
            StepPlan::new(Mode::LocalNetwork, steps),
            Err(PlanError::DuplicateStep("a".to_string()))
        );
    }

    #[test]
    fn test_runnable_count_and_lookup() {
        let plan = StepPlan::new(
            Mode::LocalNetwork,
            vec![
                Step::new("a", CommandSpec::new("true")),
                Step::new("b", CommandSpec::new("true")).skipped(SkipReason::NotSelected),
            ],
        )
        .unwrap();
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.runnable_count(), 1);
        assert!(!plan.get("b").unwrap().is_runnable());
        assert!(plan.get("c").is_none());
    }

    #[test]
    fn test_preview_lists_every_step() {
        let plan = StepPlan::new(
            Mode::VpnMesh,
            vec![
                Step::new("check", CommandSpec::new("true")).optional(),
                Step::new("vpn", CommandSpec::new("tailscale").arg("up"))
                    .skipped(SkipReason::AlreadySatisfied),
            ],
        )
        .unwrap();
        let preview = plan.preview();
        let lines: Vec<&str> = preview.lines().collect();
        assert_eq!(lines[0], "mode: vpn-mesh");
        assert_eq!(lines[1], " 1. [run ] check: check (true) [optional]");
        assert_eq!(lines[2], " 2. [skip] vpn: vpn (already satisfied)");
    }

    #[test]
    fn test_skip_reason_description() {
        let reason = SkipReason::UpstreamSkipped {
            upstream: "runtime-install".to_string(),
        };
        assert_eq!(reason.description(), "requires skipped step `runtime-install`");
    }
}
