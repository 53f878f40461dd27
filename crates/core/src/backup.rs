//! Backup planning, backup creation, and retention.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::Local;
use tracing::{debug, info};

use crate::diff::{join_relative, resolve, DiffNode, DirDiff};
use crate::error::{Result, SwitchError};
use crate::ignore::IgnoreSet;
use crate::state::{BackupRecord, Variant};

#[derive(Debug, Clone, PartialEq)]
pub struct BackupEntry {
    /// Absolute path inside the live tree.
    pub path: PathBuf,
    /// On-disk size at planning time, not the snapshot size.
    pub size: u64,
}

#[derive(Debug, Clone, Default)]
pub struct BackupPlan {
    pub entries: Vec<BackupEntry>,
    pub total_size: u64,
}

impl BackupPlan {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn file_count(&self) -> u64 {
        self.entries.len() as u64
    }
}

/// Select the files that must be preserved before the live tree is
/// overwritten: every modified or missing entry of the diff that still
/// exists on disk and is not ignored. Added files need no backup; they
/// do not exist on the other variant to protect. Each file is selected
/// at most once.
pub fn plan(diff: &DiffNode, live_root: &Path, ignore: &IgnoreSet) -> Result<BackupPlan> {
    let mut plan = BackupPlan::default();
    let mut seen = BTreeSet::new();
    walk(diff, live_root, ignore, &mut plan, &mut seen)?;
    Ok(plan)
}

fn walk(
    node: &DiffNode,
    live_root: &Path,
    ignore: &IgnoreSet,
    plan: &mut BackupPlan,
    seen: &mut BTreeSet<String>,
) -> Result<()> {
    let relative = node.relative_path();
    if ignore.matches(relative) {
        debug!(path = relative, "subtree ignored");
        return Ok(());
    }

    let candidates = node
        .modified_files
        .iter()
        .map(|m| &m.base)
        .chain(node.missing_files.iter());
    for entry in candidates {
        let file_relative = join_relative(relative, &entry.name);
        if ignore.matches(&file_relative) {
            continue;
        }
        let live_path = resolve(live_root, relative, &entry.name);
        if !live_path.exists() || !seen.insert(file_relative) {
            continue;
        }
        let size = fs::metadata(&live_path)?.len();
        plan.entries.push(BackupEntry {
            path: live_path,
            size,
        });
        plan.total_size += size;
    }

    for sub in node.subdirectories.values() {
        // New/Deleted directory entries carry no modified semantics
        if let DirDiff::Changed(child) = sub {
            walk(child, live_root, ignore, plan, seen)?;
        }
    }
    Ok(())
}

/// Copy `src` to `dst`, carrying the source modification time over
/// where the platform allows. Change detection compares metadata, so a
/// copy with a fresh mtime would read as modified on the next diff.
pub(crate) fn copy_with_mtime(src: &Path, dst: &Path) -> std::io::Result<u64> {
    let bytes = fs::copy(src, dst)?;
    if let Ok(modified) = fs::metadata(src).and_then(|m| m.modified()) {
        if let Ok(dst_file) = fs::OpenOptions::new().write(true).open(dst) {
            let _ = dst_file.set_modified(modified);
        }
    }
    Ok(bytes)
}

/// Creates timestamped backup sets under `backup_root/<variant>/` and
/// enforces the retention limit.
#[derive(Debug, Clone)]
pub struct BackupStore {
    backup_root: PathBuf,
    max_backups: usize,
}

impl BackupStore {
    pub fn new(backup_root: impl Into<PathBuf>, max_backups: usize) -> Self {
        Self {
            backup_root: backup_root.into(),
            max_backups,
        }
    }

    /// Copy every planned file into a new timestamped set, mirroring
    /// its path relative to `live_root`. Any copy failure aborts the
    /// whole backup; a partial set is never recorded as trustworthy.
    pub fn create(
        &self,
        variant: Variant,
        plan: &BackupPlan,
        live_root: &Path,
    ) -> Result<BackupRecord> {
        let timestamp = Local::now().format("%Y%m%d-%H%M%S").to_string();
        let backup_path = self.backup_root.join(variant.as_str()).join(&timestamp);
        fs::create_dir_all(&backup_path)?;

        for entry in &plan.entries {
            let relative = entry.path.strip_prefix(live_root).map_err(|_| {
                SwitchError::Config(format!(
                    "backup source {} is outside the live tree",
                    entry.path.display()
                ))
            })?;
            let dst = backup_path.join(relative);
            if let Some(parent) = dst.parent() {
                fs::create_dir_all(parent)?;
            }
            copy_with_mtime(&entry.path, &dst)?;
            info!(src = %entry.path.display(), dst = %dst.display(), "backed up");
        }

        let record = BackupRecord {
            timestamp,
            path: backup_path,
            file_count: plan.file_count(),
            total_size: plan.total_size,
        };
        self.prune(variant)?;
        Ok(record)
    }

    /// Remove all but the newest `max_backups` sets for `variant`,
    /// ordered by modification time ascending.
    pub fn prune(&self, variant: Variant) -> Result<()> {
        let dir = self.backup_root.join(variant.as_str());
        if !dir.exists() {
            return Ok(());
        }

        let mut sets: Vec<(SystemTime, PathBuf)> = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let meta = entry.metadata()?;
            if meta.is_dir() {
                sets.push((meta.modified()?, entry.path()));
            }
        }
        sets.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

        if sets.len() > self.max_backups {
            let excess = sets.len() - self.max_backups;
            for (_, old) in sets.drain(..excess) {
                fs::remove_dir_all(&old)?;
                info!(path = %old.display(), "pruned old backup");
            }
        }
        Ok(())
    }
}
