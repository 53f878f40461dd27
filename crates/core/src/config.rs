use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SwitchError};
use crate::ignore::IgnoreSet;
use crate::state::Variant;

/// Typed view of `sync_config.json`. Key names follow the document
/// format, not Rust convention.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root of the live install tree.
    #[serde(rename = "gameFolderPath")]
    pub game_folder_path: PathBuf,

    /// Per-variant client executable. Outer surface only; the engine
    /// never reads it.
    #[serde(default)]
    pub client_launch_paths: HashMap<Variant, PathBuf>,

    /// Root for timestamped backup sets.
    pub backup_dir: PathBuf,

    /// Retained backups per variant.
    #[serde(default = "default_max_backups")]
    pub max_backups: usize,

    /// Substring patterns excluded from backup and restore.
    #[serde(default)]
    pub ignore_list: Vec<String>,
}

fn default_max_backups() -> usize {
    1
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| {
            SwitchError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        let config: Config = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_backups < 1 {
            return Err(SwitchError::Config(
                "max_backups must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn ignore_set(&self) -> IgnoreSet {
        IgnoreSet::new(self.ignore_list.clone())
    }

    pub fn launch_path(&self, variant: Variant) -> Option<&PathBuf> {
        self.client_launch_paths.get(&variant)
    }
}
