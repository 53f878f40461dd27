//! Document locations and the persisted pieces of the two-phase
//! switch procedure. All paths are explicit; nothing is process-global.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::diff::{self, DiffNode};
use crate::error::{Result, SwitchError};
use crate::model::DirectoryNode;
use crate::state::{SyncState, Variant};

pub const STATE_FILE: &str = "sync_state.json";
pub const DIFF_FILE: &str = "structured_diff.json";
pub const BACKUP_PLAN_FILE: &str = "backup_plan.txt";
pub const CONVERSION_PLAN_FILE: &str = "conversion_plan.txt";

/// The directory holding snapshot, diff, and state documents.
#[derive(Debug, Clone)]
pub struct Workspace {
    dir: PathBuf,
}

impl Workspace {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn snapshot_path(&self, variant: Variant) -> PathBuf {
        self.dir.join(format!("{variant}.json"))
    }

    pub fn diff_path(&self) -> PathBuf {
        self.dir.join(DIFF_FILE)
    }

    pub fn state_path(&self) -> PathBuf {
        self.dir.join(STATE_FILE)
    }

    pub fn backup_plan_path(&self) -> PathBuf {
        self.dir.join(BACKUP_PLAN_FILE)
    }

    pub fn conversion_plan_path(&self) -> PathBuf {
        self.dir.join(CONVERSION_PLAN_FILE)
    }

    pub fn load_state(&self) -> Result<SyncState> {
        SyncState::load(&self.state_path())
    }

    pub fn store_state(&self, state: &SyncState) -> Result<()> {
        state.save(&self.state_path())
    }

    pub fn store_snapshot(&self, variant: Variant, tree: &DirectoryNode) -> Result<()> {
        let path = self.snapshot_path(variant);
        fs::write(&path, serde_json::to_string_pretty(tree)?)?;
        info!(variant = %variant, path = %path.display(), "snapshot written");
        Ok(())
    }

    /// A missing snapshot names the external step to run first.
    pub fn load_snapshot(&self, variant: Variant) -> Result<DirectoryNode> {
        let path = self.snapshot_path(variant);
        let raw = fs::read_to_string(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SwitchError::MissingSnapshot { variant, path }
            } else {
                e.into()
            }
        })?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn store_diff(&self, diff: &DiffNode) -> Result<()> {
        fs::write(self.diff_path(), serde_json::to_string_pretty(diff)?)?;
        Ok(())
    }

    pub fn load_diff(&self) -> Result<DiffNode> {
        let path = self.diff_path();
        let raw = fs::read_to_string(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SwitchError::MissingDiff(path)
            } else {
                e.into()
            }
        })?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Diff the other variant's snapshot (base) against the current
    /// one (target) and persist the result. `None` means the two
    /// snapshots compare equal; no diff document is written then.
    pub fn generate_diff(&self, current: Variant) -> Result<Option<DiffNode>> {
        let other = current.other();
        let base = self.load_snapshot(other)?;
        let target = self.load_snapshot(current)?;
        let result = diff::compare(&base, &target, other.as_str());
        if let Some(ref d) = result {
            self.store_diff(d)?;
            info!(base = %other, target = %current, "diff document written");
        }
        Ok(result)
    }
}
