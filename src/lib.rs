//! # hostprep
//!
//! Installation orchestration for self-hosted stacks: detect what a host
//! already has, plan the install stages it still needs, run them with
//! progress reporting, and verify the result.
//!
//! The crate is built around four pieces:
//!
//! - [`detect()`] probes the host concurrently and returns an immutable
//!   [`CapabilitySnapshot`]
//! - [`build_plan()`] turns a snapshot, the user's [`UserSelections`] and an
//!   [`ActionCatalog`] into a deterministic [`StepPlan`]
//! - [`Executor`] runs a plan step by step under per-step deadlines, with
//!   cooperative cancellation and rollback of committed steps
//! - [`verify()`] runs health checks concurrently into a [`HealthReport`]
//!
//! What each step actually does is opaque: actions are [`CommandSpec`]s
//! started through a [`Launcher`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use hostprep::{
//!     build_plan, detect, verify, warnings, ActionCatalog, Executor, ExecutorOptions,
//!     HealthConfig, Probe, UserSelections,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let snapshot = detect().await.expect("host identity");
//!     for warning in warnings(&snapshot) {
//!         println!("warning: {warning}");
//!     }
//!
//!     let catalog = ActionCatalog::scripts("/opt/stack/stages");
//!     let plan = build_plan(&snapshot, &UserSelections::default(), &catalog);
//!     print!("{}", plan.preview());
//!
//!     let executor = Executor::new(ExecutorOptions::default());
//!     if let Err(e) = executor.run(&plan, |event| println!("{event:?}")).await {
//!         println!("install failed: {e}. {}", e.fix_suggestion());
//!         return;
//!     }
//!
//!     let health = HealthConfig::new()
//!         .with_check("docker", Probe::ServiceActive { unit: "docker".into() });
//!     let report = verify(&health).await;
//!     println!("healthy: {}", report.passed());
//! }
//! ```

mod action;
mod detect;
mod detection;
mod executor;
mod health;
mod options;
mod plan;
mod recommend;
mod snapshot;
mod tool_kind;

pub use action::{ActionExit, CommandSpec, Launcher, OutputReader, ProcessLauncher, RunningAction};
pub use detect::{detect, detect_tool, detect_tools, detect_with, DetectError};
pub use executor::{
    CurrentStep, ExecutionState, Executor, ExecutorHandle, ProgressEvent, RollbackEntry,
    RunError, RunState, StepOutcome, StepResult, Stream,
};
pub use health::{verify, CheckResult, CheckSpec, HealthConfig, HealthReport, Probe};
pub use options::{CancelMode, DetectOptions, ExecutorOptions, OverflowPolicy};
pub use plan::{
    build_plan, ActionCatalog, PlanError, SkipReason, StageAction, StageId, Step, StepPlan,
    UserSelections,
};
pub use recommend::{recommend_mode, warnings, Mode, Warning, MIN_FREE_DISK_GB, MIN_MEMORY_GB};
pub use snapshot::{
    CapabilitySnapshot, ContainerContext, OsKind, ProbeDegraded, ProbeKind, ToolState,
};
pub use tool_kind::ToolKind;
