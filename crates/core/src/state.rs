use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, SwitchError};

/// One of the two mutually exclusive installed configurations sharing
/// the live directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Variant {
    Official,
    Bilibili,
}

impl Variant {
    pub const ALL: [Variant; 2] = [Variant::Official, Variant::Bilibili];

    /// The opposite variant. Total by construction.
    pub fn other(self) -> Self {
        match self {
            Variant::Official => Variant::Bilibili,
            Variant::Bilibili => Variant::Official,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Variant::Official => "Official",
            Variant::Bilibili => "Bilibili",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Variant {
    type Err = SwitchError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Official" => Ok(Variant::Official),
            "Bilibili" => Ok(Variant::Bilibili),
            other => Err(SwitchError::Config(format!(
                "unknown variant {other:?}, expected Official or Bilibili"
            ))),
        }
    }
}

/// The latest backup taken for a variant. Older backup directories may
/// still exist on storage until retention removes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupRecord {
    /// Second-resolution, lexically sortable (`%Y%m%d-%H%M%S`).
    pub timestamp: String,
    pub path: PathBuf,
    pub file_count: u64,
    pub total_size: u64,
}

/// Durable record of the current variant and each variant's latest
/// backup. Rewritten after every mutating operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncState {
    pub current_ver: Option<Variant>,
    #[serde(default)]
    pub backups: HashMap<Variant, BackupRecord>,
}

impl SyncState {
    /// Load from `path`, or start fresh if the file does not exist yet.
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no state file, starting fresh");
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Write-temp-then-rename so an interrupted run never leaves a
    /// half-written state file behind.
    pub fn save(&self, path: &Path) -> Result<()> {
        let raw = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, raw)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// The current variant, or `Uninitialized` on first run.
    pub fn current(&self) -> Result<Variant> {
        self.current_ver.ok_or(SwitchError::Uninitialized)
    }

    pub fn set_current(&mut self, variant: Variant) {
        self.current_ver = Some(variant);
    }

    pub fn latest_backup(&self, variant: Variant) -> Option<&BackupRecord> {
        self.backups.get(&variant)
    }

    /// The backup required for converting to `variant`. Switching
    /// without one risks data loss, so its absence is fatal.
    pub fn require_backup(&self, variant: Variant) -> Result<&BackupRecord> {
        self.latest_backup(variant)
            .ok_or(SwitchError::MissingBackup(variant))
    }

    pub fn record_backup(&mut self, variant: Variant, record: BackupRecord) {
        self.backups.insert(variant, record);
    }
}
