//! History compaction.
//!
//! Both passes only delete; each player is pruned in its own transaction so
//! a failure part way leaves earlier players compacted.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use tracing::{debug, info};

use super::store::{TimeSeriesStore, Transaction};
use super::StorageError;
use crate::models::{CharacterId, Metric, MetricRecord, SnapshotTime};

/// Outcome of a pruning pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PruneReport {
    pub examined: usize,
    pub deleted: usize,
}

/// Delete records whose value repeats the previous kept record.
///
/// Elo compares within epsilon. Character usage compares whole per-timestamp
/// sets as mappings, so a set is either kept or deleted entirely.
pub fn prune_duplicates(
    store: &dyn TimeSeriesStore,
    metric: Metric,
) -> Result<PruneReport, StorageError> {
    let mut report = PruneReport::default();

    for player in store.players()? {
        let history = store.history(player.id, metric)?;
        report.examined += history.len();

        let redundant = if metric == Metric::CharacterUsage {
            redundant_character_sets(&history)
        } else {
            redundant_values(&history)
        };
        if redundant.is_empty() {
            continue;
        }

        let mut tx = Transaction::new();
        for record in &redundant {
            tx.delete(*record);
        }
        store.commit(tx)?;

        debug!(
            "Pruned {} redundant {} records for player {}",
            redundant.len(),
            metric,
            player.id
        );
        report.deleted += redundant.len();
    }

    info!(
        "Pruned {} of {} {} records",
        report.deleted, report.examined, metric
    );
    Ok(report)
}

fn redundant_values(history: &[MetricRecord]) -> Vec<MetricRecord> {
    let mut kept: Option<&MetricRecord> = None;
    let mut redundant = Vec::new();
    for record in history {
        match kept {
            Some(prev) if prev.value.same_as(&record.value) => redundant.push(*record),
            _ => kept = Some(record),
        }
    }
    redundant
}

fn redundant_character_sets(history: &[MetricRecord]) -> Vec<MetricRecord> {
    let mut sets: BTreeMap<SnapshotTime, Vec<MetricRecord>> = BTreeMap::new();
    for record in history {
        sets.entry(record.recorded_at).or_default().push(*record);
    }

    let as_map = |set: &[MetricRecord]| -> HashMap<CharacterId, u32> {
        set.iter().filter_map(|r| r.character_usage()).collect()
    };

    let mut kept: Option<HashMap<CharacterId, u32>> = None;
    let mut redundant = Vec::new();
    for set in sets.into_values() {
        let current = as_map(&set);
        if kept.as_ref() == Some(&current) {
            redundant.extend(set);
        } else {
            kept = Some(current);
        }
    }
    redundant
}

/// Remove timestamps that no record or cached leaderboard references.
pub fn prune_orphan_timestamps(store: &dyn TimeSeriesStore) -> Result<usize, StorageError> {
    let mut in_use = std::collections::HashSet::new();
    for metric in Metric::ALL {
        in_use.extend(store.records(metric)?.into_iter().map(|r| r.recorded_at));
    }

    let mut tx = Transaction::new();
    for at in store.timestamps()? {
        if !in_use.contains(&at) && store.cached_leaderboard(at)?.is_empty() {
            tx.delete_timestamp(at);
        }
    }

    let removed = tx.len();
    store.commit(tx)?;
    info!("Removed {} orphan timestamps", removed);
    Ok(removed)
}
