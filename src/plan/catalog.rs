//! Mapping from install stages to the concrete actions that perform them.

use super::StageId;
use crate::CommandSpec;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The action behind one stage.
#[derive(Debug, Clone, PartialEq)]
pub struct StageAction {
    pub action: CommandSpec,
    /// Inverse action run during rollback after this stage succeeded.
    pub undo: Option<CommandSpec>,
    pub timeout: Duration,
    pub optional: bool,
    /// Overrides the catalog's working directory.
    pub work_dir: Option<PathBuf>,
}

impl StageAction {
    /// An action with the stage's default timeout and optional flag.
    pub fn for_stage(stage: StageId, action: CommandSpec) -> Self {
        Self {
            action,
            undo: None,
            timeout: stage.default_timeout(),
            optional: stage.optional_by_default(),
            work_dir: None,
        }
    }

    pub fn with_undo(mut self, undo: CommandSpec) -> Self {
        self.undo = Some(undo);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }
}

/// The actions available to the plan builder.
///
/// Stages without an entry are planned as skipped.
///
/// # Example
///
/// ```rust
/// use hostprep::{ActionCatalog, CommandSpec, StageAction, StageId};
///
/// let catalog = ActionCatalog::new("/opt/stack")
///     .with(StageId::SystemCheck, StageAction::for_stage(
///         StageId::SystemCheck,
///         CommandSpec::shell("test -w /opt/stack"),
///     ));
/// assert!(catalog.get(StageId::SystemCheck).is_some());
/// assert!(catalog.get(StageId::Hardening).is_none());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ActionCatalog {
    work_dir: PathBuf,
    stages: BTreeMap<StageId, StageAction>,
}

impl ActionCatalog {
    /// An empty catalog whose actions run in `work_dir`.
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            stages: BTreeMap::new(),
        }
    }

    /// One shell script per stage: `<dir>/<stage-id>.sh`, with
    /// `<dir>/<stage-id>.undo.sh` as its inverse when present.
    ///
    /// Stages whose script does not exist get no entry. Scripts run with
    /// `dir` as their working directory.
    pub fn scripts(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        let mut catalog = Self::new(dir);

        for stage in StageId::all() {
            let script = dir.join(format!("{}.sh", stage.id()));
            if !script.is_file() {
                continue;
            }
            let mut entry = StageAction::for_stage(stage, sh(&script));
            let undo = dir.join(format!("{}.undo.sh", stage.id()));
            if undo.is_file() {
                entry = entry.with_undo(sh(&undo));
            }
            catalog.stages.insert(stage, entry);
        }

        catalog
    }

    /// Set or replace the action for `stage`.
    pub fn with(mut self, stage: StageId, action: StageAction) -> Self {
        self.stages.insert(stage, action);
        self
    }

    pub fn get(&self, stage: StageId) -> Option<&StageAction> {
        self.stages.get(&stage)
    }

    /// Directory stage actions run in unless they set their own.
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }
}

fn sh(script: &Path) -> CommandSpec {
    CommandSpec::new("sh").arg(script.to_string_lossy())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_stage_uses_stage_defaults() {
        let entry = StageAction::for_stage(StageId::Hardening, CommandSpec::new("true"));
        assert!(entry.optional);
        assert_eq!(entry.timeout, StageId::Hardening.default_timeout());
        assert!(entry.undo.is_none());
    }

    #[test]
    fn test_scripts_catalog_picks_up_present_scripts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("system-check.sh"), "exit 0\n").unwrap();
        std::fs::write(dir.path().join("runtime-install.sh"), "exit 0\n").unwrap();
        std::fs::write(dir.path().join("runtime-install.undo.sh"), "exit 0\n").unwrap();

        let catalog = ActionCatalog::scripts(dir.path());
        assert_eq!(catalog.work_dir(), dir.path());

        let check = catalog.get(StageId::SystemCheck).unwrap();
        assert_eq!(check.action.program, "sh");
        assert!(check.action.args[0].ends_with("system-check.sh"));
        assert!(check.undo.is_none());

        let runtime = catalog.get(StageId::RuntimeInstall).unwrap();
        assert!(runtime.undo.as_ref().unwrap().args[0].ends_with("runtime-install.undo.sh"));

        assert!(catalog.get(StageId::ServiceStart).is_none());
    }
}
