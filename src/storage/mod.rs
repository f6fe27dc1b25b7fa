//! Filesystem data lake and the time-series store built on it.
//!
//! Handles reading and writing to the local data lake:
//! - Raw profile responses (archived by the fetcher)
//! - Normalized JSONL files (source of truth for players and history)
//! - The in-memory indexed store that owns the time axis

pub mod import;
pub mod jsonl;
pub mod maintenance;
pub mod store;

pub use import::{import_records, ImportSummary};
pub use jsonl::{Collection, JsonlReader, JsonlWriter};
pub use maintenance::{prune_duplicates, prune_orphan_timestamps, PruneReport};
pub use store::{SnapshotStore, TimeSeriesStore, Transaction, WriteOp};

use std::path::PathBuf;
use thiserror::Error;

use crate::models::{Metric, PlayerId, SnapshotTime};
use crate::ErrorKind;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    #[error("Duplicate {metric} record for player {player_id} at {recorded_at}")]
    DuplicateRecord {
        player_id: PlayerId,
        metric: Metric,
        recorded_at: SnapshotTime,
    },

    #[error("Timestamp {0} is not on the time axis")]
    UnknownTimestamp(SnapshotTime),

    #[error("Timestamp {0} still has records attached")]
    TimestampInUse(SnapshotTime),

    #[error("Player already registered: {0}")]
    DuplicatePlayer(String),

    #[error("Player not found: {0}")]
    PlayerNotFound(PlayerId),

    #[error("Record not found: {metric} for player {player_id} at {recorded_at}")]
    RecordNotFound {
        player_id: PlayerId,
        metric: Metric,
        recorded_at: SnapshotTime,
    },

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StorageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageError::DuplicateRecord { .. }
            | StorageError::UnknownTimestamp(_)
            | StorageError::TimestampInUse(_)
            | StorageError::DuplicatePlayer(_) => ErrorKind::StorageConflict,
            StorageError::PlayerNotFound(_)
            | StorageError::RecordNotFound { .. }
            | StorageError::PathNotFound(_) => ErrorKind::NotFound,
            StorageError::Io(_) | StorageError::Json(_) | StorageError::Unavailable(_) => {
                ErrorKind::StorageUnavailable
            }
        }
    }
}

/// Configuration for storage paths.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl StorageConfig {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    pub fn raw_dir(&self) -> PathBuf {
        self.data_dir.join("raw")
    }

    pub fn normalized_dir(&self) -> PathBuf {
        self.data_dir.join("normalized")
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::new(PathBuf::from("./data"))
    }
}
