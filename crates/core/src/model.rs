use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single file as captured by a scan. Identity within its parent
/// directory is the name alone; no content hash is recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    pub create_date: DateTime<Utc>,
    pub modify_date: DateTime<Utc>,
    pub size: u64,
}

/// One directory of a snapshot. A snapshot IS the root `DirectoryNode`,
/// immutable once the scan that produced it finishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectoryNode {
    pub name: String,
    #[serde(default)]
    pub files: Vec<FileEntry>,
    #[serde(default)]
    pub subdirectories: Vec<DirectoryNode>,
}

impl DirectoryNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            files: Vec::new(),
            subdirectories: Vec::new(),
        }
    }

    pub(crate) fn file_map(&self) -> HashMap<&str, &FileEntry> {
        self.files.iter().map(|f| (f.name.as_str(), f)).collect()
    }

    pub(crate) fn dir_map(&self) -> HashMap<&str, &DirectoryNode> {
        self.subdirectories
            .iter()
            .map(|d| (d.name.as_str(), d))
            .collect()
    }

    /// Total number of files in the subtree.
    pub fn file_count(&self) -> u64 {
        self.files.len() as u64
            + self
                .subdirectories
                .iter()
                .map(DirectoryNode::file_count)
                .sum::<u64>()
    }

    /// Total recorded size of the subtree in bytes.
    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum::<u64>()
            + self
                .subdirectories
                .iter()
                .map(DirectoryNode::total_size)
                .sum::<u64>()
    }
}
