//! Bulk backfill of historical records.

use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

use super::jsonl::JsonlReader;
use super::store::{TimeSeriesStore, Transaction};
use super::StorageError;
use crate::models::MetricRecord;

/// Counts from one import run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub read: usize,
    pub imported: usize,
    pub duplicates: usize,
    pub unknown_players: usize,
}

/// Import `MetricRecord`s from a JSONL file.
///
/// Each record is committed together with its timestamp, so a skipped
/// record never leaves a timestamp behind. Records already present are
/// counted as duplicates; records for unregistered players are skipped.
pub fn import_records(
    store: &dyn TimeSeriesStore,
    path: &Path,
) -> Result<ImportSummary, StorageError> {
    let reader = JsonlReader::<MetricRecord>::new(path.to_path_buf());
    if !reader.exists() {
        return Err(StorageError::PathNotFound(path.to_path_buf()));
    }

    let records = reader.read_all()?;
    let mut summary = ImportSummary {
        read: records.len(),
        ..Default::default()
    };

    for record in records {
        let mut tx = Transaction::new();
        tx.ensure_timestamp(record.recorded_at).append(record);

        match store.commit(tx) {
            Ok(_) => summary.imported += 1,
            Err(StorageError::DuplicateRecord { .. }) => summary.duplicates += 1,
            Err(StorageError::PlayerNotFound(id)) => {
                warn!("Skipping {} record for unregistered player {}", record.metric(), id);
                summary.unknown_players += 1;
            }
            Err(e) => return Err(e),
        }
    }

    info!(
        read = summary.read,
        imported = summary.imported,
        duplicates = summary.duplicates,
        "Imported records from {:?}",
        path
    );
    Ok(summary)
}
