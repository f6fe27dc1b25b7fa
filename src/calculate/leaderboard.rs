//! Leaderboard assembly.
//!
//! A leaderboard is derived entirely from metric records: the latest Elo,
//! win/loss and regional placement per player inside a time window. Cached
//! copies in the store are snapshots of exactly this computation.

use std::cmp::Ordering;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use tracing::{debug, info};

use super::classify_rank;
use crate::models::{LeaderboardEntry, Metric, PlayerId, SnapshotTime, TimeWindow};
use crate::storage::{StorageError, TimeSeriesStore, Transaction};

/// Which slice of history to rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaderboardQuery {
    pub since: SnapshotTime,

    /// `None` ranks the latest data
    pub until: Option<SnapshotTime>,

    /// Drop players who have never played a ranked set
    pub hide_unplayed: bool,
}

impl Default for LeaderboardQuery {
    fn default() -> Self {
        Self {
            since: SnapshotTime::epoch(),
            until: None,
            hide_unplayed: true,
        }
    }
}

impl LeaderboardQuery {
    /// The leaderboard as it stood at `at`.
    pub fn as_of(at: SnapshotTime) -> Self {
        Self {
            until: Some(at),
            ..Default::default()
        }
    }

    pub fn since(mut self, since: SnapshotTime) -> Self {
        self.since = since;
        self
    }

    pub fn show_unplayed(mut self, show: bool) -> Self {
        self.hide_unplayed = !show;
        self
    }

    fn window(&self) -> TimeWindow {
        TimeWindow {
            since: self.since,
            until: self.until,
        }
    }
}

/// Builds ordered leaderboards from a [`TimeSeriesStore`].
#[derive(Clone)]
pub struct LeaderboardAssembler {
    store: Arc<dyn TimeSeriesStore>,
}

impl LeaderboardAssembler {
    pub fn new(store: Arc<dyn TimeSeriesStore>) -> Self {
        Self { store }
    }

    /// Rank every player with an Elo record in the window.
    ///
    /// Players without Elo in range are excluded; missing win/loss or
    /// placement default to zero. Ordered by Elo descending, then player id
    /// ascending. Positions are assigned after unplayed players are removed,
    /// so they are always `1..=n`.
    pub fn assemble(&self, query: &LeaderboardQuery) -> Result<Vec<LeaderboardEntry>, StorageError> {
        let window = query.window();
        let elo = self.store.latest_per_entity_in(Metric::Elo, window)?;
        let win_loss = self.store.latest_per_entity_in(Metric::WinLoss, window)?;
        let regional = self
            .store
            .latest_per_entity_in(Metric::RegionalPlacement, window)?;

        let as_of = match query.until {
            Some(until) => until,
            None => self
                .store
                .timestamps()?
                .last()
                .copied()
                .unwrap_or_else(SnapshotTime::now),
        };

        let mut rows: Vec<(PlayerId, f64)> = elo
            .iter()
            .filter_map(|(id, record)| record.elo().map(|e| (*id, e)))
            .collect();
        rows.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });

        let mut entries: Vec<LeaderboardEntry> = Vec::with_capacity(rows.len());
        for (id, elo) in rows {
            let Some(player) = self.store.player(id)? else {
                continue;
            };
            if query.hide_unplayed && player.snapshot.is_unplayed() {
                debug!("Hiding unplayed player {}", id);
                continue;
            }

            let (wins, losses) = win_loss
                .get(&id)
                .and_then(|r| r.win_loss())
                .unwrap_or((0, 0));
            let regional_placement = regional
                .get(&id)
                .and_then(|r| r.placement())
                .unwrap_or(0);

            let position = entries.len() as u32 + 1;
            entries.push(LeaderboardEntry {
                player_id: id,
                position,
                display_name: player.display_name,
                connect_code: player.connect_code,
                elo,
                wins,
                losses,
                regional_placement,
                rank: classify_rank(elo, regional_placement != 0),
                as_of,
            });
        }

        Ok(entries)
    }

    /// Assemble the leaderboard at `at` and cache it in the store.
    pub fn snapshot(&self, at: SnapshotTime) -> Result<Vec<LeaderboardEntry>, StorageError> {
        let entries = self.assemble(&LeaderboardQuery::as_of(at))?;

        let mut tx = Transaction::new();
        tx.ensure_timestamp(at).cache_leaderboard(at, entries.clone());
        self.store.commit(tx)?;

        info!("Cached leaderboard at {} with {} entries", at, entries.len());
        Ok(entries)
    }

    /// Cache one leaderboard per day at `time_of_day` (UTC) for every day in
    /// `[from, to]`. Returns the number of snapshots written.
    pub fn rebuild_daily(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        time_of_day: NaiveTime,
    ) -> Result<usize, StorageError> {
        let mut written = 0;
        for day in from.iter_days().take_while(|d| *d <= to) {
            self.snapshot(SnapshotTime::at(day, time_of_day))?;
            written += 1;
        }
        info!("Rebuilt {} daily leaderboards from {} to {}", written, from, to);
        Ok(written)
    }

    /// Position in the most recent cached leaderboard listing the player,
    /// or 0 when none does.
    pub fn latest_position(&self, player: PlayerId) -> Result<u32, StorageError> {
        Ok(self
            .store
            .latest_cached_position(player)?
            .map_or(0, |entry| entry.position))
    }
}
