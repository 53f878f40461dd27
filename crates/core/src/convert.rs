//! Conversion planning and restore execution.
//!
//! Both walks select added plus modified entries of the diff: the
//! content the other variant needs placed or put back. Missing files
//! are deliberately not deleted; stale files stay in place.

use std::fs;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::backup::copy_with_mtime;
use crate::diff::{join_relative, resolve, DiffNode, DirDiff};
use crate::ignore::IgnoreSet;
use crate::model::FileEntry;
use crate::state::BackupRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreKind {
    New,
    Update,
}

impl RestoreKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RestoreKind::New => "new",
            RestoreKind::Update => "update",
        }
    }
}

/// One planned action. A missing backup file is tolerated and reported,
/// never an error.
#[derive(Debug, Clone, PartialEq)]
pub enum RestoreAction {
    Restore {
        kind: RestoreKind,
        /// Slash-relative path inside both the backup set and the live tree.
        path: String,
        size: u64,
    },
    Warning {
        path: String,
    },
}

#[derive(Debug, Clone, Default)]
pub struct RestorePlan {
    pub actions: Vec<RestoreAction>,
    /// Count of restore actions; warnings are not operations.
    pub total_ops: u64,
    pub total_size: u64,
}

impl RestorePlan {
    pub fn warning_count(&self) -> u64 {
        self.actions
            .iter()
            .filter(|a| matches!(a, RestoreAction::Warning { .. }))
            .count() as u64
    }
}

/// Compute the restore plan against the other variant's latest backup.
/// The caller must already hold a `BackupRecord`; its absence is the
/// fatal missing-backup condition and is raised before planning.
pub fn plan(diff: &DiffNode, backup: &BackupRecord, ignore: &IgnoreSet) -> RestorePlan {
    let mut plan = RestorePlan::default();
    plan_walk(diff, &backup.path, ignore, &mut plan);
    plan
}

fn restore_candidates(node: &DiffNode) -> impl Iterator<Item = (RestoreKind, &FileEntry)> {
    node.added_files
        .iter()
        .map(|f| (RestoreKind::New, f))
        .chain(
            node.modified_files
                .iter()
                .map(|m| (RestoreKind::Update, &m.base)),
        )
}

fn plan_walk(node: &DiffNode, backup_dir: &Path, ignore: &IgnoreSet, plan: &mut RestorePlan) {
    let relative = node.relative_path();
    if ignore.matches(relative) {
        debug!(path = relative, "subtree ignored");
        return;
    }

    for (kind, entry) in restore_candidates(node) {
        let file_relative = join_relative(relative, &entry.name);
        if ignore.matches(&file_relative) {
            continue;
        }
        let backup_file = resolve(backup_dir, relative, &entry.name);
        match fs::metadata(&backup_file) {
            Ok(meta) => {
                plan.total_ops += 1;
                plan.total_size += meta.len();
                plan.actions.push(RestoreAction::Restore {
                    kind,
                    path: file_relative,
                    size: meta.len(),
                });
            }
            Err(_) => {
                plan.actions.push(RestoreAction::Warning {
                    path: file_relative,
                });
            }
        }
    }

    for sub in node.subdirectories.values() {
        if let DirDiff::Changed(child) = sub {
            plan_walk(child, backup_dir, ignore, plan);
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreOutcome {
    pub restored: u64,
    pub missing: u64,
    pub failed: u64,
}

/// Copy backup files over the live tree, mirroring the planner's
/// traversal. Best effort: a missing backup file or a failed copy is
/// logged and the walk continues to completion. The caller flips
/// `SyncState::current_ver` only after this returns.
pub fn apply(
    diff: &DiffNode,
    backup_dir: &Path,
    live_root: &Path,
    ignore: &IgnoreSet,
) -> RestoreOutcome {
    let mut outcome = RestoreOutcome::default();
    apply_walk(diff, backup_dir, live_root, ignore, &mut outcome);
    outcome
}

fn apply_walk(
    node: &DiffNode,
    backup_dir: &Path,
    live_root: &Path,
    ignore: &IgnoreSet,
    outcome: &mut RestoreOutcome,
) {
    let relative = node.relative_path();
    if ignore.matches(relative) {
        return;
    }

    for (kind, entry) in restore_candidates(node) {
        let file_relative = join_relative(relative, &entry.name);
        if ignore.matches(&file_relative) {
            continue;
        }
        let backup_file = resolve(backup_dir, relative, &entry.name);
        if !backup_file.exists() {
            warn!(file = file_relative.as_str(), "backup file missing, skipped");
            outcome.missing += 1;
            continue;
        }
        let target_file = resolve(live_root, relative, &entry.name);
        match restore_one(&backup_file, &target_file) {
            Ok(()) => {
                info!(
                    kind = kind.as_str(),
                    file = file_relative.as_str(),
                    "restored from backup"
                );
                outcome.restored += 1;
            }
            Err(e) => {
                warn!(
                    file = file_relative.as_str(),
                    error = %e,
                    "restore failed, continuing"
                );
                outcome.failed += 1;
            }
        }
    }

    for sub in node.subdirectories.values() {
        if let DirDiff::Changed(child) = sub {
            apply_walk(child, backup_dir, live_root, ignore, outcome);
        }
    }
}

fn restore_one(src: &Path, dst: &Path) -> std::io::Result<()> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)?;
    }
    copy_with_mtime(src, dst)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::compare;
    use crate::model::DirectoryNode;
    use chrono::DateTime;
    use std::path::PathBuf;
    use std::time::{Duration, SystemTime};

    fn entry(name: &str, size: u64) -> FileEntry {
        let ts = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        FileEntry {
            name: name.to_string(),
            create_date: ts,
            modify_date: ts,
            size,
        }
    }

    fn dir(name: &str, files: Vec<FileEntry>, subs: Vec<DirectoryNode>) -> DirectoryNode {
        DirectoryNode {
            name: name.to_string(),
            files,
            subdirectories: subs,
        }
    }

    /// added: b.txt, sub/extra.txt; modified: a.txt
    fn sample_diff() -> DiffNode {
        let base = dir(
            "root",
            vec![entry("a.txt", 10)],
            vec![dir("sub", vec![entry("keep.txt", 1)], vec![])],
        );
        let target = dir(
            "root",
            vec![entry("a.txt", 20), entry("b.txt", 5)],
            vec![dir(
                "sub",
                vec![entry("keep.txt", 1), entry("extra.txt", 2)],
                vec![],
            )],
        );
        compare(&base, &target, "Official").unwrap()
    }

    fn touch(path: &Path, contents: &[u8]) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn record(path: PathBuf) -> BackupRecord {
        BackupRecord {
            timestamp: "20240101-000000".to_string(),
            path,
            file_count: 0,
            total_size: 0,
        }
    }

    #[test]
    fn plan_tags_new_and_update_and_warns_on_missing() {
        let backup = tempfile::tempdir().unwrap();
        touch(&backup.path().join("a.txt"), b"official a");
        touch(&backup.path().join("sub/extra.txt"), b"official extra");
        // b.txt deliberately absent from the backup

        let plan = plan(
            &sample_diff(),
            &record(backup.path().to_path_buf()),
            &IgnoreSet::default(),
        );
        assert_eq!(plan.total_ops, 2);
        assert_eq!(plan.warning_count(), 1);
        assert_eq!(plan.total_size, 10 + 14);
        assert!(plan.actions.contains(&RestoreAction::Restore {
            kind: RestoreKind::Update,
            path: "a.txt".to_string(),
            size: 10,
        }));
        assert!(plan.actions.contains(&RestoreAction::Restore {
            kind: RestoreKind::New,
            path: "sub/extra.txt".to_string(),
            size: 14,
        }));
        assert!(plan
            .actions
            .contains(&RestoreAction::Warning {
                path: "b.txt".to_string()
            }));
    }

    #[test]
    fn plan_skips_ignored_files_and_subtrees() {
        let backup = tempfile::tempdir().unwrap();
        touch(&backup.path().join("a.txt"), b"x");
        touch(&backup.path().join("b.txt"), b"y");
        touch(&backup.path().join("sub/extra.txt"), b"z");

        let plan = plan(
            &sample_diff(),
            &record(backup.path().to_path_buf()),
            &IgnoreSet::new(vec!["sub/".to_string(), "b.txt".to_string()]),
        );
        assert_eq!(plan.total_ops, 1);
        assert_eq!(plan.warning_count(), 0);
        assert!(matches!(
            &plan.actions[0],
            RestoreAction::Restore { path, .. } if path == "a.txt"
        ));
    }

    #[test]
    fn apply_restores_present_files_and_skips_missing() {
        let backup = tempfile::tempdir().unwrap();
        let live = tempfile::tempdir().unwrap();
        touch(&backup.path().join("a.txt"), b"official a");
        touch(&backup.path().join("sub/extra.txt"), b"official extra");
        touch(&live.path().join("a.txt"), b"bilibili a");

        let outcome = apply(
            &sample_diff(),
            backup.path(),
            live.path(),
            &IgnoreSet::default(),
        );
        assert_eq!(
            outcome,
            RestoreOutcome {
                restored: 2,
                missing: 1,
                failed: 0
            }
        );
        assert_eq!(fs::read(live.path().join("a.txt")).unwrap(), b"official a");
        assert_eq!(
            fs::read(live.path().join("sub/extra.txt")).unwrap(),
            b"official extra"
        );
        // the warned file was simply skipped
        assert!(!live.path().join("b.txt").exists());
    }

    #[test]
    fn apply_continues_past_a_failed_copy() {
        let backup = tempfile::tempdir().unwrap();
        let live = tempfile::tempdir().unwrap();
        touch(&backup.path().join("a.txt"), b"official a");
        touch(&backup.path().join("b.txt"), b"official b");
        touch(&backup.path().join("sub/extra.txt"), b"official extra");
        // a directory squatting on the target path makes this copy fail
        fs::create_dir(live.path().join("a.txt")).unwrap();

        let outcome = apply(
            &sample_diff(),
            backup.path(),
            live.path(),
            &IgnoreSet::default(),
        );
        assert_eq!(
            outcome,
            RestoreOutcome {
                restored: 2,
                missing: 0,
                failed: 1
            }
        );
        // the failure did not stop the rest of the walk
        assert_eq!(fs::read(live.path().join("b.txt")).unwrap(), b"official b");
        assert_eq!(
            fs::read(live.path().join("sub/extra.txt")).unwrap(),
            b"official extra"
        );
    }

    #[test]
    fn apply_carries_backup_mtimes_over() {
        let backup = tempfile::tempdir().unwrap();
        let live = tempfile::tempdir().unwrap();
        touch(&backup.path().join("a.txt"), b"official a");
        touch(&backup.path().join("b.txt"), b"official b");
        touch(&backup.path().join("sub/extra.txt"), b"official extra");
        let stamp = SystemTime::UNIX_EPOCH + Duration::from_secs(1_600_000_000);
        fs::OpenOptions::new()
            .write(true)
            .open(backup.path().join("a.txt"))
            .unwrap()
            .set_modified(stamp)
            .unwrap();

        apply(
            &sample_diff(),
            backup.path(),
            live.path(),
            &IgnoreSet::default(),
        );
        let restored = fs::metadata(live.path().join("a.txt"))
            .unwrap()
            .modified()
            .unwrap();
        assert_eq!(restored, stamp);
    }

    #[test]
    fn apply_never_deletes_missing_files() {
        let backup = tempfile::tempdir().unwrap();
        let live = tempfile::tempdir().unwrap();
        touch(&live.path().join("stale.txt"), b"left in place");

        let base = dir("root", vec![entry("stale.txt", 13)], vec![]);
        let target = dir("root", vec![], vec![]);
        let diff = compare(&base, &target, "Official").unwrap();

        let outcome = apply(&diff, backup.path(), live.path(), &IgnoreSet::default());
        assert_eq!(outcome, RestoreOutcome::default());
        assert!(live.path().join("stale.txt").exists());
    }
}
