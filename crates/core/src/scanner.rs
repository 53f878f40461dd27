use crossbeam_channel::Sender;
use std::collections::BTreeMap;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use walkdir::WalkDir;

use crate::model::{DirectoryNode, FileEntry};

#[derive(Debug, Clone)]
pub enum ScanMsg {
    Progress { scanned: u64, bytes: u64 },
    Error(String),
    Done(DirectoryNode),
}

pub struct Scanner {
    cancel: Arc<AtomicBool>,
}

impl Scanner {
    pub fn new(cancel: Arc<AtomicBool>) -> Self {
        Self { cancel }
    }

    /// Walk `root` and stream progress to `tx`, finishing with
    /// `ScanMsg::Done` carrying the snapshot. Per-entry errors are
    /// reported and skipped; symlinks are never followed or recorded.
    pub fn scan(&self, root: PathBuf, tx: Sender<ScanMsg>) {
        let tree = walk_into(&self.cancel, &root, |msg| {
            let _ = tx.send(msg);
        });
        let _ = tx.send(ScanMsg::Done(tree));
    }
}

/// Synchronous scan without progress reporting.
pub fn scan_tree(root: &Path) -> DirectoryNode {
    walk_into(&AtomicBool::new(false), root, |_| {})
}

fn walk_into(
    cancel: &AtomicBool,
    root: &Path,
    mut report: impl FnMut(ScanMsg),
) -> DirectoryNode {
    let mut builder = TreeBuilder::default();
    let mut scanned = 0u64;
    let mut bytes = 0u64;

    for entry in WalkDir::new(root).follow_links(false).min_depth(1) {
        if cancel.load(Ordering::Relaxed) {
            break;
        }
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                report(ScanMsg::Error(e.to_string()));
                continue;
            }
        };
        if entry.path_is_symlink() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };

        if entry.file_type().is_dir() {
            // empty directories are part of the snapshot too
            builder.dir_mut(relative);
        } else if entry.file_type().is_file() {
            match entry.metadata() {
                Ok(md) => {
                    let file = file_entry(entry.file_name().to_string_lossy().into_owned(), &md);
                    scanned += 1;
                    bytes += file.size;
                    let parent = relative.parent().unwrap_or(Path::new(""));
                    builder.dir_mut(parent).files.push(file);
                    report(ScanMsg::Progress { scanned, bytes });
                }
                Err(e) => {
                    report(ScanMsg::Error(format!("{}: {e}", entry.path().display())));
                }
            }
        }
    }

    let name = root
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    builder.finish(name)
}

fn file_entry(name: String, md: &Metadata) -> FileEntry {
    FileEntry {
        name,
        create_date: timestamp(md.created().or_else(|_| md.modified())),
        modify_date: timestamp(md.modified()),
        size: md.len(),
    }
}

fn timestamp(t: std::io::Result<SystemTime>) -> DateTime<Utc> {
    t.map(DateTime::from).unwrap_or(DateTime::UNIX_EPOCH)
}

#[derive(Default)]
struct TreeBuilder {
    files: Vec<FileEntry>,
    dirs: BTreeMap<String, TreeBuilder>,
}

impl TreeBuilder {
    /// Descend to (creating as needed) the builder for `relative`.
    fn dir_mut(&mut self, relative: &Path) -> &mut TreeBuilder {
        let mut cur = self;
        for comp in relative.components() {
            let name = comp.as_os_str().to_string_lossy().into_owned();
            cur = cur.dirs.entry(name).or_default();
        }
        cur
    }

    fn finish(self, name: String) -> DirectoryNode {
        DirectoryNode {
            name,
            files: self.files,
            subdirectories: self
                .dirs
                .into_iter()
                .map(|(n, b)| b.finish(n))
                .collect(),
        }
    }
}
