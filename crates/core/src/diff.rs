//! Structural diff between two snapshots.
//!
//! The diff is pruned: a directory that compares equal contributes
//! nothing to its parent, so the output is proportional to the change
//! volume rather than to the tree size.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{DirectoryNode, FileEntry};

/// Base and target values of a metadata field that differs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDiff<T> {
    pub base: T,
    pub target: T,
}

/// Which of the three compared fields differ, and how.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Differences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<FieldDiff<u64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modify_date: Option<FieldDiff<DateTime<Utc>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_date: Option<FieldDiff<DateTime<Utc>>>,
}

impl Differences {
    fn between(base: &FileEntry, target: &FileEntry) -> Self {
        let mut d = Differences::default();
        if base.size != target.size {
            d.size = Some(FieldDiff {
                base: base.size,
                target: target.size,
            });
        }
        if base.modify_date != target.modify_date {
            d.modify_date = Some(FieldDiff {
                base: base.modify_date,
                target: target.modify_date,
            });
        }
        if base.create_date != target.create_date {
            d.create_date = Some(FieldDiff {
                base: base.create_date,
                target: target.create_date,
            });
        }
        d
    }

    pub fn is_empty(&self) -> bool {
        self.size.is_none() && self.modify_date.is_none() && self.create_date.is_none()
    }
}

/// A file present in both snapshots whose metadata differs. Carries the
/// base entry, the per-field changes, and the full target entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModifiedFile {
    #[serde(flatten)]
    pub base: FileEntry,
    pub differences: Differences,
    pub target_info: FileEntry,
}

/// A subdirectory's contribution to the diff. Consumers must handle all
/// three shapes explicitly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DirDiff {
    #[serde(rename = "new_directory")]
    New {
        path: String,
        target_files: Vec<FileEntry>,
    },
    #[serde(rename = "deleted_directory")]
    Deleted {
        path: String,
        base_files: Vec<FileEntry>,
    },
    #[serde(rename = "directory")]
    Changed(DiffNode),
}

/// One directory's diff. Invariant: at least one of the four field
/// groups is non-empty; a fully empty node is never emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffNode {
    /// Slash-separated, rooted at the base snapshot's label.
    pub path: String,
    pub added_files: Vec<FileEntry>,
    pub missing_files: Vec<FileEntry>,
    pub modified_files: Vec<ModifiedFile>,
    pub subdirectories: BTreeMap<String, DirDiff>,
}

impl DiffNode {
    pub fn is_empty(&self) -> bool {
        self.added_files.is_empty()
            && self.missing_files.is_empty()
            && self.modified_files.is_empty()
            && self.subdirectories.is_empty()
    }

    /// This node's path with the root label stripped. Empty for the
    /// diff root itself.
    pub fn relative_path(&self) -> &str {
        match self.path.split_once('/') {
            Some((_, rest)) => rest,
            None => "",
        }
    }
}

/// `<dir>/<name>` with no leading slash when `dir` is empty.
pub(crate) fn join_relative(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{dir}/{name}")
    }
}

/// Resolve a slash-relative path plus file name under `root`.
pub(crate) fn resolve(root: &Path, relative: &str, name: &str) -> PathBuf {
    let mut path = root.to_path_buf();
    if !relative.is_empty() {
        path.push(relative);
    }
    path.push(name);
    path
}

/// Compare `base` against `target`, labelling the root `path`.
///
/// Returns `None` when the subtrees compare equal; recursion propagates
/// "no diff" upward instead of an empty placeholder. Files and
/// subdirectories are independent namespaces: a name present as a file
/// on one side and a directory on the other shows up in both field
/// groups rather than being rejected.
pub fn compare(base: &DirectoryNode, target: &DirectoryNode, path: &str) -> Option<DiffNode> {
    let base_files = base.file_map();
    let target_files = target.file_map();

    let added_files: Vec<FileEntry> = target
        .files
        .iter()
        .filter(|f| !base_files.contains_key(f.name.as_str()))
        .cloned()
        .collect();

    let missing_files: Vec<FileEntry> = base
        .files
        .iter()
        .filter(|f| !target_files.contains_key(f.name.as_str()))
        .cloned()
        .collect();

    let mut modified_files = Vec::new();
    for bf in &base.files {
        if let Some(tf) = target_files.get(bf.name.as_str()) {
            let differences = Differences::between(bf, tf);
            if !differences.is_empty() {
                modified_files.push(ModifiedFile {
                    base: bf.clone(),
                    differences,
                    target_info: (*tf).clone(),
                });
            }
        }
    }

    let base_dirs = base.dir_map();
    let target_dirs = target.dir_map();
    let names: BTreeSet<&str> = base_dirs
        .keys()
        .chain(target_dirs.keys())
        .copied()
        .collect();

    let mut subdirectories = BTreeMap::new();
    for name in names {
        let dir_path = format!("{path}/{name}");
        match (base_dirs.get(name), target_dirs.get(name)) {
            (None, Some(t)) => {
                subdirectories.insert(
                    name.to_string(),
                    DirDiff::New {
                        path: dir_path,
                        target_files: t.files.clone(),
                    },
                );
            }
            (Some(b), None) => {
                subdirectories.insert(
                    name.to_string(),
                    DirDiff::Deleted {
                        path: dir_path,
                        base_files: b.files.clone(),
                    },
                );
            }
            (Some(b), Some(t)) => {
                if let Some(sub) = compare(b, t, &dir_path) {
                    subdirectories.insert(name.to_string(), DirDiff::Changed(sub));
                }
            }
            (None, None) => unreachable!("name came from one of the two maps"),
        }
    }

    let node = DiffNode {
        path: path.to_string(),
        added_files,
        missing_files,
        modified_files,
        subdirectories,
    };
    if node.is_empty() {
        None
    } else {
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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

    #[test]
    fn self_diff_is_fully_pruned() {
        let tree = dir(
            "root",
            vec![entry("a.txt", 10)],
            vec![
                dir("sub", vec![entry("b.txt", 5)], vec![]),
                dir("empty", vec![], vec![]),
            ],
        );
        assert!(compare(&tree, &tree, "Official").is_none());
    }

    #[test]
    fn size_change_and_addition() {
        let base = dir("root", vec![entry("a.txt", 10)], vec![]);
        let target = dir("root", vec![entry("a.txt", 20), entry("b.txt", 5)], vec![]);

        let d = compare(&base, &target, "Official").unwrap();
        assert_eq!(d.added_files.len(), 1);
        assert_eq!(d.added_files[0].name, "b.txt");
        assert!(d.missing_files.is_empty());
        assert_eq!(d.modified_files.len(), 1);
        let m = &d.modified_files[0];
        assert_eq!(m.base.name, "a.txt");
        assert_eq!(
            m.differences.size,
            Some(FieldDiff {
                base: 10,
                target: 20
            })
        );
        assert!(m.differences.modify_date.is_none());
        assert_eq!(m.target_info.size, 20);
    }

    #[test]
    fn added_and_missing_are_anti_symmetric() {
        let a = dir(
            "root",
            vec![entry("only_a.txt", 1), entry("shared.txt", 2)],
            vec![dir("sub", vec![entry("deep_a.txt", 3)], vec![])],
        );
        let b = dir(
            "root",
            vec![entry("only_b.txt", 4), entry("shared.txt", 2)],
            vec![dir("sub", vec![entry("deep_b.txt", 5)], vec![])],
        );

        let ab = compare(&a, &b, "x").unwrap();
        let ba = compare(&b, &a, "x").unwrap();

        let names = |files: &[FileEntry]| -> Vec<String> {
            files.iter().map(|f| f.name.clone()).collect()
        };
        assert_eq!(names(&ab.added_files), names(&ba.missing_files));
        assert_eq!(names(&ab.missing_files), names(&ba.added_files));

        let (DirDiff::Changed(ab_sub), DirDiff::Changed(ba_sub)) =
            (&ab.subdirectories["sub"], &ba.subdirectories["sub"])
        else {
            panic!("expected changed subdirectories");
        };
        assert_eq!(names(&ab_sub.added_files), names(&ba_sub.missing_files));
    }

    #[test]
    fn unchanged_sibling_subtree_is_omitted() {
        let unchanged = dir("same", vec![entry("keep.txt", 1)], vec![]);
        let base = dir(
            "root",
            vec![],
            vec![unchanged.clone(), dir("changed", vec![entry("x", 1)], vec![])],
        );
        let target = dir(
            "root",
            vec![],
            vec![unchanged, dir("changed", vec![entry("x", 2)], vec![])],
        );

        let d = compare(&base, &target, "Official").unwrap();
        assert!(!d.subdirectories.contains_key("same"));
        assert!(matches!(
            d.subdirectories.get("changed"),
            Some(DirDiff::Changed(sub)) if !sub.is_empty()
        ));
    }

    #[test]
    fn new_and_deleted_directories_are_tagged() {
        let base = dir(
            "root",
            vec![],
            vec![dir("gone", vec![entry("old.txt", 1)], vec![])],
        );
        let target = dir(
            "root",
            vec![],
            vec![dir("fresh", vec![entry("new.txt", 2)], vec![])],
        );

        let d = compare(&base, &target, "Official").unwrap();
        assert!(matches!(
            d.subdirectories.get("fresh"),
            Some(DirDiff::New { path, target_files })
                if path == "Official/fresh" && target_files.len() == 1
        ));
        assert!(matches!(
            d.subdirectories.get("gone"),
            Some(DirDiff::Deleted { path, base_files })
                if path == "Official/gone" && base_files.len() == 1
        ));
    }

    #[test]
    fn relative_path_strips_root_label() {
        let base = dir(
            "root",
            vec![],
            vec![dir("sub", vec![entry("x", 1)], vec![])],
        );
        let target = dir(
            "root",
            vec![],
            vec![dir("sub", vec![entry("x", 2)], vec![])],
        );
        let d = compare(&base, &target, "Official").unwrap();
        assert_eq!(d.relative_path(), "");
        let DirDiff::Changed(sub) = &d.subdirectories["sub"] else {
            panic!("expected changed subdirectory");
        };
        assert_eq!(sub.path, "Official/sub");
        assert_eq!(sub.relative_path(), "sub");
    }

    #[test]
    fn diff_document_roundtrip_keeps_tagged_shapes() {
        let base = dir(
            "root",
            vec![entry("a.txt", 10)],
            vec![dir("gone", vec![], vec![])],
        );
        let target = dir(
            "root",
            vec![entry("a.txt", 20)],
            vec![dir("fresh", vec![entry("n", 1)], vec![])],
        );

        let d = compare(&base, &target, "Official").unwrap();
        let raw = serde_json::to_string_pretty(&d).unwrap();
        assert!(raw.contains("\"new_directory\""));
        assert!(raw.contains("\"deleted_directory\""));

        let back: DiffNode = serde_json::from_str(&raw).unwrap();
        assert_eq!(back, d);
    }
}
