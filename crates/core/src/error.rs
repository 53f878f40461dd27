use std::path::PathBuf;

use thiserror::Error;

use crate::state::Variant;

/// Fatal conditions only. Tolerated conditions (a single backup file
/// missing during planning or restore) are carried as plan/outcome data,
/// never through this channel.
#[derive(Error, Debug)]
pub enum SwitchError {
    #[error("snapshot for {variant} not found at {}; switch to the {variant} client, run `syncswitch scan` there, set current_ver to {variant} in sync_state.json and re-run", .path.display())]
    MissingSnapshot { variant: Variant, path: PathBuf },

    #[error("diff document not found at {}; run `syncswitch diff` first", .0.display())]
    MissingDiff(PathBuf),

    #[error("no backup recorded for {0}; switch to that client manually and back it up before converting")]
    MissingBackup(Variant),

    #[error("no current variant recorded; run `syncswitch init <variant>` first")]
    Uninitialized,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, SwitchError>;
