use super::{ActionCatalog, SkipReason, StageId, Step, StepPlan, UserSelections};
use crate::{recommend_mode, CapabilitySnapshot, Mode, ToolKind};
use std::collections::BTreeMap;
use tracing::debug;

/// Build the install plan for a host.
///
/// Every stage yields exactly one step, in [`StageId`] order. Selections and
/// host state only decide whether a step is skipped, never where it sits.
/// The result depends only on the arguments: identical inputs give
/// identical plans.
///
/// # Example
///
/// ```rust
/// use hostprep::{
///     build_plan, ActionCatalog, CapabilitySnapshot, CommandSpec, Mode, OsKind,
///     StageAction, StageId, UserSelections,
/// };
///
/// let snapshot = CapabilitySnapshot::minimal(OsKind::Linux, "x86_64");
/// let catalog = ActionCatalog::new("/opt/stack").with(
///     StageId::SystemCheck,
///     StageAction::for_stage(StageId::SystemCheck, CommandSpec::shell("true")),
/// );
/// let selections = UserSelections {
///     mode: Some(Mode::LocalNetwork),
///     ..Default::default()
/// };
///
/// let plan = build_plan(&snapshot, &selections, &catalog);
/// assert_eq!(plan.len(), 10);
/// assert!(plan.get("system-check").unwrap().is_runnable());
/// assert!(!plan.get("network-config").unwrap().is_runnable());
/// ```
pub fn build_plan(
    snapshot: &CapabilitySnapshot,
    selections: &UserSelections,
    catalog: &ActionCatalog,
) -> StepPlan {
    let mode = selections.mode.unwrap_or_else(|| recommend_mode(snapshot));
    let mut decided: BTreeMap<StageId, Option<SkipReason>> = BTreeMap::new();
    let mut steps = Vec::new();

    for stage in StageId::all() {
        let skip = skip_reason(stage, mode, snapshot, selections, catalog, &decided);
        decided.insert(stage, skip.clone());
        steps.push(stage_step(stage, catalog, skip));
    }

    let plan = StepPlan { mode, steps };
    debug!(
        mode = %mode,
        runnable = plan.runnable_count(),
        total = plan.len(),
        "plan built"
    );
    plan
}

fn skip_reason(
    stage: StageId,
    mode: Mode,
    snapshot: &CapabilitySnapshot,
    selections: &UserSelections,
    catalog: &ActionCatalog,
    decided: &BTreeMap<StageId, Option<SkipReason>>,
) -> Option<SkipReason> {
    if !is_selected(stage, selections) {
        return Some(SkipReason::NotSelected);
    }

    // Already-satisfied upstream stages leave the host in the required state.
    let unmet = stage.requires().iter().find(|req| {
        matches!(
            decided.get(*req),
            Some(Some(reason)) if *reason != SkipReason::AlreadySatisfied
        )
    });
    if let Some(upstream) = unmet {
        return Some(SkipReason::UpstreamSkipped {
            upstream: upstream.id(),
        });
    }

    if !is_applicable(stage, mode, snapshot) {
        return Some(SkipReason::NotApplicable);
    }
    if is_satisfied(stage, snapshot) {
        return Some(SkipReason::AlreadySatisfied);
    }
    if catalog.get(stage).is_none() {
        return Some(SkipReason::NoAction);
    }
    None
}

fn is_selected(stage: StageId, selections: &UserSelections) -> bool {
    match stage {
        StageId::RuntimeInstall => selections.runtime,
        StageId::NetworkConfig => selections.vpn,
        StageId::OptionalTooling => selections.tooling,
        StageId::Hardening => selections.hardening,
        StageId::Secrets => selections.secrets,
        StageId::ServiceStart | StageId::HealthCheck => selections.services,
        StageId::SystemCheck | StageId::PackageBaseline | StageId::EnvMaterialization => true,
    }
}

fn is_applicable(stage: StageId, mode: Mode, snapshot: &CapabilitySnapshot) -> bool {
    match stage {
        StageId::NetworkConfig => mode == Mode::VpnMesh,
        StageId::Hardening => !snapshot.is_sandboxed(),
        _ => true,
    }
}

fn is_satisfied(stage: StageId, snapshot: &CapabilitySnapshot) -> bool {
    match stage {
        StageId::RuntimeInstall => snapshot.is_installed(ToolKind::Docker),
        StageId::NetworkConfig => snapshot.is_running(ToolKind::Tailscale),
        _ => false,
    }
}

fn stage_step(stage: StageId, catalog: &ActionCatalog, skip: Option<SkipReason>) -> Step {
    let mut step = match catalog.get(stage) {
        Some(entry) => {
            let mut step = Step::new(stage.id(), entry.action.clone())
                .with_timeout(entry.timeout)
                .with_work_dir(
                    entry
                        .work_dir
                        .clone()
                        .unwrap_or_else(|| catalog.work_dir().to_path_buf()),
                );
            step.undo = entry.undo.clone();
            step.optional = entry.optional;
            step
        }
        // Placeholder action; the step is always skipped with `NoAction`
        // or an earlier reason.
        None => Step::new(stage.id(), crate::CommandSpec::new("true"))
            .with_timeout(stage.default_timeout())
            .with_work_dir(catalog.work_dir()),
    };
    step.description = stage.description().to_string();
    step.stage = Some(stage);
    step.skip = skip;
    step
}
