//! The time-series store.
//!
//! Owns the shared time axis, the player registry, one append-only series
//! per (player, metric[, character]) and the cached leaderboards. Writes go
//! through [`Transaction`]s, which are validated as a whole before anything
//! is applied, so a failed commit leaves the store untouched.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info, warn};

use super::jsonl::{Collection, JsonlReader, JsonlWriter};
use super::{StorageConfig, StorageError};
use crate::models::{
    CharacterId, ConnectCode, LeaderboardEntry, Metric, MetricRecord, Player, PlayerId, SeriesKey,
    SnapshotTime, TimeWindow,
};

/// Read and write access to recorded history.
///
/// Implemented by [`SnapshotStore`]; the reconciliation engine and the
/// leaderboard assembler only ever see this trait.
pub trait TimeSeriesStore: Send + Sync {
    /// All registered players, ordered by id.
    fn players(&self) -> Result<Vec<Player>, StorageError>;

    fn player(&self, id: PlayerId) -> Result<Option<Player>, StorageError>;

    fn player_by_code(&self, code: &ConnectCode) -> Result<Option<Player>, StorageError>;

    /// Every point on the time axis, ascending.
    fn timestamps(&self) -> Result<Vec<SnapshotTime>, StorageError>;

    /// Every record of `metric`, ordered by player then time.
    fn records(&self, metric: Metric) -> Result<Vec<MetricRecord>, StorageError>;

    /// One player's records for `metric`, ascending by time.
    fn history(&self, player: PlayerId, metric: Metric) -> Result<Vec<MetricRecord>, StorageError>;

    /// The most recent record per player for `metric` inside `window`.
    ///
    /// For character usage this is the main character (highest game count)
    /// of the latest recorded character set.
    fn latest_per_entity_in(
        &self,
        metric: Metric,
        window: TimeWindow,
    ) -> Result<BTreeMap<PlayerId, MetricRecord>, StorageError>;

    /// The record in effect for `player` at `at`: the latest one at or
    /// before it.
    fn latest_as_of(
        &self,
        metric: Metric,
        player: PlayerId,
        at: SnapshotTime,
    ) -> Result<Option<MetricRecord>, StorageError>;

    /// The full character set recorded at the latest character timestamp at
    /// or before `at` (or ever, when `None`).
    fn latest_character_set(
        &self,
        player: PlayerId,
        at: Option<SnapshotTime>,
    ) -> Result<Vec<MetricRecord>, StorageError>;

    /// Cached leaderboard rows for a snapshot, by position. Empty if none.
    fn cached_leaderboard(&self, at: SnapshotTime) -> Result<Vec<LeaderboardEntry>, StorageError>;

    /// The player's row in the most recent cached leaderboard that lists
    /// them.
    fn latest_cached_position(
        &self,
        player: PlayerId,
    ) -> Result<Option<LeaderboardEntry>, StorageError>;

    /// Apply all operations or none. Returns the number of operations.
    fn commit(&self, tx: Transaction) -> Result<usize, StorageError>;

    /// The most recent record per player for `metric`.
    fn latest_per_entity(
        &self,
        metric: Metric,
    ) -> Result<BTreeMap<PlayerId, MetricRecord>, StorageError> {
        self.latest_per_entity_in(metric, TimeWindow::all())
    }

    /// Register `at` on the time axis. Idempotent.
    fn ensure_timestamp(&self, at: SnapshotTime) -> Result<(), StorageError> {
        let mut tx = Transaction::new();
        tx.ensure_timestamp(at);
        self.commit(tx).map(|_| ())
    }

    fn append(&self, record: MetricRecord) -> Result<(), StorageError> {
        let mut tx = Transaction::new();
        tx.append(record);
        self.commit(tx).map(|_| ())
    }

    fn register_player(&self, player: Player) -> Result<(), StorageError> {
        let mut tx = Transaction::new();
        tx.register_player(player);
        self.commit(tx).map(|_| ())
    }
}

/// A single staged write.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    EnsureTimestamp(SnapshotTime),
    RegisterPlayer(Player),
    UpsertPlayer(Player),
    Append(MetricRecord),
    Delete(MetricRecord),
    DeleteTimestamp(SnapshotTime),
    CacheLeaderboard {
        at: SnapshotTime,
        entries: Vec<LeaderboardEntry>,
    },
}

/// An ordered batch of writes committed atomically.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transaction {
    ops: Vec<WriteOp>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: WriteOp) -> &mut Self {
        self.ops.push(op);
        self
    }

    pub fn ensure_timestamp(&mut self, at: SnapshotTime) -> &mut Self {
        self.push(WriteOp::EnsureTimestamp(at))
    }

    pub fn register_player(&mut self, player: Player) -> &mut Self {
        self.push(WriteOp::RegisterPlayer(player))
    }

    pub fn upsert_player(&mut self, player: Player) -> &mut Self {
        self.push(WriteOp::UpsertPlayer(player))
    }

    pub fn append(&mut self, record: MetricRecord) -> &mut Self {
        self.push(WriteOp::Append(record))
    }

    pub fn delete(&mut self, record: MetricRecord) -> &mut Self {
        self.push(WriteOp::Delete(record))
    }

    pub fn delete_timestamp(&mut self, at: SnapshotTime) -> &mut Self {
        self.push(WriteOp::DeleteTimestamp(at))
    }

    pub fn cache_leaderboard(
        &mut self,
        at: SnapshotTime,
        entries: Vec<LeaderboardEntry>,
    ) -> &mut Self {
        self.push(WriteOp::CacheLeaderboard { at, entries })
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Records this transaction appends.
    pub fn appended(&self) -> impl Iterator<Item = &MetricRecord> {
        self.ops.iter().filter_map(|op| match op {
            WriteOp::Append(record) => Some(record),
            _ => None,
        })
    }
}

type RecordKey = (SeriesKey, SnapshotTime);

#[derive(Debug, Default)]
struct Index {
    timestamps: BTreeSet<SnapshotTime>,
    players: BTreeMap<PlayerId, Player>,
    series: BTreeMap<SeriesKey, BTreeMap<SnapshotTime, MetricRecord>>,
    leaderboards: BTreeMap<SnapshotTime, Vec<LeaderboardEntry>>,
}

impl Index {
    fn series_of(
        &self,
        player: PlayerId,
        metric: Metric,
    ) -> impl Iterator<Item = &BTreeMap<SnapshotTime, MetricRecord>> {
        let lo = SeriesKey {
            player_id: player,
            metric,
            character: None,
        };
        let hi = SeriesKey {
            player_id: player,
            metric,
            character: Some(CharacterId::new(u16::MAX)),
        };
        self.series.range(lo..=hi).map(|(_, series)| series)
    }

    fn contains_record(&self, key: &RecordKey) -> bool {
        self.series
            .get(&key.0)
            .map_or(false, |series| series.contains_key(&key.1))
    }

    fn timestamp_in_use(&self, at: SnapshotTime, deleted: &HashSet<RecordKey>) -> bool {
        if self.leaderboards.contains_key(&at) {
            return true;
        }
        self.series
            .iter()
            .any(|(key, series)| series.contains_key(&at) && !deleted.contains(&(*key, at)))
    }

    fn character_set(&self, player: PlayerId, window: TimeWindow) -> Vec<MetricRecord> {
        let latest: Vec<&MetricRecord> = self
            .series_of(player, Metric::CharacterUsage)
            .filter_map(|series| latest_in(series, window))
            .collect();
        let Some(at) = latest.iter().map(|r| r.recorded_at).max() else {
            return Vec::new();
        };
        latest
            .into_iter()
            .filter(|r| r.recorded_at == at)
            .copied()
            .collect()
    }

    fn insert_record(&mut self, record: MetricRecord) -> bool {
        self.series
            .entry(record.series_key())
            .or_default()
            .insert(record.recorded_at, record)
            .is_none()
    }

    fn remove_record(&mut self, record: &MetricRecord) {
        let key = record.series_key();
        if let Some(series) = self.series.get_mut(&key) {
            series.remove(&record.recorded_at);
            if series.is_empty() {
                self.series.remove(&key);
            }
        }
    }

    fn has_code(&self, code: &ConnectCode) -> bool {
        self.players.values().any(|p| &p.connect_code == code)
    }

    /// Check every op against the current state plus the ops before it.
    fn validate(&self, tx: &Transaction) -> Result<(), StorageError> {
        let mut added_ts: HashSet<SnapshotTime> = HashSet::new();
        let mut removed_ts: HashSet<SnapshotTime> = HashSet::new();
        let mut added_players: HashSet<PlayerId> = HashSet::new();
        let mut added_codes: HashSet<ConnectCode> = HashSet::new();
        let mut appended: HashSet<RecordKey> = HashSet::new();
        let mut deleted: HashSet<RecordKey> = HashSet::new();

        let ts_known = |at: &SnapshotTime,
                        added: &HashSet<SnapshotTime>,
                        removed: &HashSet<SnapshotTime>| {
            added.contains(at) || (self.timestamps.contains(at) && !removed.contains(at))
        };

        for op in tx.ops() {
            match op {
                WriteOp::EnsureTimestamp(at) => {
                    removed_ts.remove(at);
                    added_ts.insert(*at);
                }
                WriteOp::RegisterPlayer(player) => {
                    if self.players.contains_key(&player.id) || !added_players.insert(player.id) {
                        return Err(StorageError::DuplicatePlayer(player.id.to_string()));
                    }
                    if self.has_code(&player.connect_code)
                        || !added_codes.insert(player.connect_code.clone())
                    {
                        return Err(StorageError::DuplicatePlayer(
                            player.connect_code.to_string(),
                        ));
                    }
                }
                WriteOp::UpsertPlayer(player) => {
                    if !self.players.contains_key(&player.id) && !added_players.contains(&player.id)
                    {
                        return Err(StorageError::PlayerNotFound(player.id));
                    }
                }
                WriteOp::Append(record) => {
                    if !ts_known(&record.recorded_at, &added_ts, &removed_ts) {
                        return Err(StorageError::UnknownTimestamp(record.recorded_at));
                    }
                    if !self.players.contains_key(&record.player_id)
                        && !added_players.contains(&record.player_id)
                    {
                        return Err(StorageError::PlayerNotFound(record.player_id));
                    }
                    let key = (record.series_key(), record.recorded_at);
                    let stored = self.contains_record(&key) && !deleted.contains(&key);
                    if stored || !appended.insert(key) {
                        return Err(StorageError::DuplicateRecord {
                            player_id: record.player_id,
                            metric: record.metric(),
                            recorded_at: record.recorded_at,
                        });
                    }
                }
                WriteOp::Delete(record) => {
                    let key = (record.series_key(), record.recorded_at);
                    if !self.contains_record(&key) || !deleted.insert(key) {
                        return Err(StorageError::RecordNotFound {
                            player_id: record.player_id,
                            metric: record.metric(),
                            recorded_at: record.recorded_at,
                        });
                    }
                }
                WriteOp::DeleteTimestamp(at) => {
                    if !ts_known(at, &added_ts, &removed_ts) {
                        return Err(StorageError::UnknownTimestamp(*at));
                    }
                    if self.timestamp_in_use(*at, &deleted)
                        || appended.iter().any(|(_, t)| t == at)
                    {
                        return Err(StorageError::TimestampInUse(*at));
                    }
                    added_ts.remove(at);
                    removed_ts.insert(*at);
                }
                WriteOp::CacheLeaderboard { at, .. } => {
                    if !ts_known(at, &added_ts, &removed_ts) {
                        return Err(StorageError::UnknownTimestamp(*at));
                    }
                }
            }
        }
        Ok(())
    }

    fn apply(&mut self, tx: Transaction) {
        for op in tx.ops {
            match op {
                WriteOp::EnsureTimestamp(at) => {
                    self.timestamps.insert(at);
                }
                WriteOp::RegisterPlayer(player) | WriteOp::UpsertPlayer(player) => {
                    self.players.insert(player.id, player);
                }
                WriteOp::Append(record) => {
                    self.insert_record(record);
                }
                WriteOp::Delete(record) => self.remove_record(&record),
                WriteOp::DeleteTimestamp(at) => {
                    self.timestamps.remove(&at);
                }
                WriteOp::CacheLeaderboard { at, entries } => {
                    self.leaderboards.insert(at, entries);
                }
            }
        }
    }
}

fn latest_in(
    series: &BTreeMap<SnapshotTime, MetricRecord>,
    window: TimeWindow,
) -> Option<&MetricRecord> {
    match window.until {
        Some(until) if until < window.since => None,
        Some(until) => series.range(window.since..=until).next_back(),
        None => series.range(window.since..).next_back(),
    }
    .map(|(_, record)| record)
}

/// Highest game count wins; ties go to the lowest character id.
fn main_of(set: &[MetricRecord]) -> Option<MetricRecord> {
    let mut best: Option<(CharacterId, u32, &MetricRecord)> = None;
    for record in set {
        if let Some((character, games)) = record.character_usage() {
            let better = match best {
                None => true,
                Some((c, g, _)) => games > g || (games == g && character < c),
            };
            if better {
                best = Some((character, games, record));
            }
        }
    }
    best.map(|(_, _, record)| *record)
}

fn sort_records(records: &mut [MetricRecord]) {
    records.sort_by_key(|r| (r.player_id, r.recorded_at, r.series_key().character));
}

/// [`TimeSeriesStore`] backed by an in-memory index, optionally persisted to
/// JSONL files.
#[derive(Debug)]
pub struct SnapshotStore {
    index: RwLock<Index>,
    backing: Option<StorageConfig>,
}

impl SnapshotStore {
    /// A store that lives only as long as the process.
    pub fn in_memory() -> Self {
        Self {
            index: RwLock::new(Index::default()),
            backing: None,
        }
    }

    /// Open (or create) the store under `config.normalized_dir()`, replaying
    /// every collection into memory.
    pub fn open(config: StorageConfig) -> Result<Self, StorageError> {
        let mut index = Index::default();

        for at in JsonlReader::<SnapshotTime>::for_collection(&config, Collection::Timestamps)
            .read_all()?
        {
            index.timestamps.insert(at);
        }

        for player in
            JsonlReader::<Player>::for_collection(&config, Collection::Players).read_all()?
        {
            index.players.insert(player.id, player);
        }

        let mut records = 0usize;
        for metric in Metric::ALL {
            let reader =
                JsonlReader::<MetricRecord>::for_collection(&config, Collection::Metric(metric));
            for record in reader.read_all()? {
                if index.timestamps.insert(record.recorded_at) {
                    warn!(
                        "Record for player {} at {} had no timestamp; restoring it",
                        record.player_id, record.recorded_at
                    );
                }
                if index.insert_record(record) {
                    records += 1;
                } else {
                    warn!(
                        "Skipping duplicate {} record for player {} at {}",
                        metric, record.player_id, record.recorded_at
                    );
                }
            }
        }

        for entry in JsonlReader::<LeaderboardEntry>::for_collection(&config, Collection::Leaderboard)
            .read_all()?
        {
            index.leaderboards.entry(entry.as_of).or_default().push(entry);
        }
        for rows in index.leaderboards.values_mut() {
            rows.sort_by_key(|e| e.position);
        }

        info!(
            players = index.players.len(),
            timestamps = index.timestamps.len(),
            records,
            "Opened store at {:?}",
            config.normalized_dir()
        );

        Ok(Self {
            index: RwLock::new(index),
            backing: Some(config),
        })
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Index>, StorageError> {
        self.index
            .read()
            .map_err(|_| StorageError::Unavailable("store index lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Index>, StorageError> {
        self.index
            .write()
            .map_err(|_| StorageError::Unavailable("store index lock poisoned".to_string()))
    }

    /// Write the effects of a validated transaction to disk.
    ///
    /// New lines are appended; a collection is rewritten only when the
    /// transaction removes or replaces something in it. Timestamps are
    /// written first and players last.
    fn persist(
        &self,
        config: &StorageConfig,
        index: &Index,
        tx: &Transaction,
    ) -> Result<(), StorageError> {
        let mut timestamps = index.timestamps.clone();
        let mut new_timestamps = Vec::new();
        let mut timestamps_removed = false;
        let mut players_dirty = false;
        let mut appends: BTreeMap<Metric, Vec<MetricRecord>> = BTreeMap::new();
        let mut deletes: BTreeMap<Metric, HashSet<RecordKey>> = BTreeMap::new();
        let mut boards: BTreeMap<SnapshotTime, &Vec<LeaderboardEntry>> = BTreeMap::new();

        for op in tx.ops() {
            match op {
                WriteOp::EnsureTimestamp(at) => {
                    if timestamps.insert(*at) {
                        new_timestamps.push(*at);
                    }
                }
                WriteOp::DeleteTimestamp(at) => {
                    timestamps.remove(at);
                    timestamps_removed = true;
                }
                WriteOp::RegisterPlayer(_) | WriteOp::UpsertPlayer(_) => players_dirty = true,
                WriteOp::Append(record) => {
                    appends.entry(record.metric()).or_default().push(*record)
                }
                WriteOp::Delete(record) => {
                    deletes
                        .entry(record.metric())
                        .or_default()
                        .insert((record.series_key(), record.recorded_at));
                }
                WriteOp::CacheLeaderboard { at, entries } => {
                    boards.insert(*at, entries);
                }
            }
        }

        let ts_writer = JsonlWriter::<SnapshotTime>::for_collection(config, Collection::Timestamps);
        if timestamps_removed {
            ts_writer.write_all(&timestamps)?;
        } else {
            ts_writer.append_batch(&new_timestamps)?;
        }

        for metric in Metric::ALL {
            let writer = JsonlWriter::<MetricRecord>::for_collection(config, Collection::Metric(metric));
            let added = appends.remove(&metric).unwrap_or_default();
            match deletes.get(&metric) {
                Some(removed) => {
                    let mut kept: Vec<MetricRecord> = index
                        .series
                        .iter()
                        .filter(|(key, _)| key.metric == metric)
                        .flat_map(|(key, series)| {
                            series
                                .iter()
                                .filter(move |(at, _)| !removed.contains(&(*key, **at)))
                                .map(|(_, record)| *record)
                        })
                        .chain(added)
                        .collect();
                    sort_records(&mut kept);
                    writer.write_all(&kept)?;
                }
                None => {
                    writer.append_batch(&added)?;
                }
            }
        }

        if !boards.is_empty() {
            let writer =
                JsonlWriter::<LeaderboardEntry>::for_collection(config, Collection::Leaderboard);
            if boards.keys().any(|at| index.leaderboards.contains_key(at)) {
                let mut merged: BTreeMap<SnapshotTime, &Vec<LeaderboardEntry>> =
                    index.leaderboards.iter().map(|(at, rows)| (*at, rows)).collect();
                merged.extend(boards);
                writer.write_all(merged.values().flat_map(|rows| rows.iter()))?;
            } else {
                writer.append_batch(boards.values().flat_map(|rows| rows.iter()))?;
            }
        }

        // Snapshots summarize the records above; only write them once those
        // are on disk.
        if players_dirty {
            let mut players = index.players.clone();
            for op in tx.ops() {
                if let WriteOp::RegisterPlayer(p) | WriteOp::UpsertPlayer(p) = op {
                    players.insert(p.id, p.clone());
                }
            }
            JsonlWriter::<Player>::for_collection(config, Collection::Players)
                .write_all(players.values())?;
        }

        Ok(())
    }
}

impl TimeSeriesStore for SnapshotStore {
    fn players(&self) -> Result<Vec<Player>, StorageError> {
        Ok(self.read()?.players.values().cloned().collect())
    }

    fn player(&self, id: PlayerId) -> Result<Option<Player>, StorageError> {
        Ok(self.read()?.players.get(&id).cloned())
    }

    fn player_by_code(&self, code: &ConnectCode) -> Result<Option<Player>, StorageError> {
        Ok(self
            .read()?
            .players
            .values()
            .find(|p| &p.connect_code == code)
            .cloned())
    }

    fn timestamps(&self) -> Result<Vec<SnapshotTime>, StorageError> {
        Ok(self.read()?.timestamps.iter().copied().collect())
    }

    fn records(&self, metric: Metric) -> Result<Vec<MetricRecord>, StorageError> {
        let index = self.read()?;
        let mut records: Vec<MetricRecord> = index
            .series
            .iter()
            .filter(|(key, _)| key.metric == metric)
            .flat_map(|(_, series)| series.values().copied())
            .collect();
        sort_records(&mut records);
        Ok(records)
    }

    fn history(&self, player: PlayerId, metric: Metric) -> Result<Vec<MetricRecord>, StorageError> {
        let index = self.read()?;
        let mut records: Vec<MetricRecord> = index
            .series_of(player, metric)
            .flat_map(|series| series.values().copied())
            .collect();
        sort_records(&mut records);
        Ok(records)
    }

    fn latest_per_entity_in(
        &self,
        metric: Metric,
        window: TimeWindow,
    ) -> Result<BTreeMap<PlayerId, MetricRecord>, StorageError> {
        let index = self.read()?;
        let mut latest = BTreeMap::new();

        if metric == Metric::CharacterUsage {
            for &player in index.players.keys() {
                if let Some(main) = main_of(&index.character_set(player, window)) {
                    latest.insert(player, main);
                }
            }
            return Ok(latest);
        }

        for (key, series) in index.series.iter().filter(|(k, _)| k.metric == metric) {
            if let Some(record) = latest_in(series, window) {
                latest.insert(key.player_id, *record);
            }
        }
        Ok(latest)
    }

    fn latest_as_of(
        &self,
        metric: Metric,
        player: PlayerId,
        at: SnapshotTime,
    ) -> Result<Option<MetricRecord>, StorageError> {
        let index = self.read()?;
        let window = TimeWindow::through(Some(at));
        if metric == Metric::CharacterUsage {
            return Ok(main_of(&index.character_set(player, window)));
        }
        Ok(index
            .series_of(player, metric)
            .filter_map(|series| latest_in(series, window))
            .max_by_key(|r| r.recorded_at)
            .copied())
    }

    fn latest_character_set(
        &self,
        player: PlayerId,
        at: Option<SnapshotTime>,
    ) -> Result<Vec<MetricRecord>, StorageError> {
        Ok(self
            .read()?
            .character_set(player, TimeWindow::through(at)))
    }

    fn cached_leaderboard(&self, at: SnapshotTime) -> Result<Vec<LeaderboardEntry>, StorageError> {
        Ok(self
            .read()?
            .leaderboards
            .get(&at)
            .cloned()
            .unwrap_or_default())
    }

    fn latest_cached_position(
        &self,
        player: PlayerId,
    ) -> Result<Option<LeaderboardEntry>, StorageError> {
        Ok(self
            .read()?
            .leaderboards
            .values()
            .rev()
            .find_map(|rows| rows.iter().find(|e| e.player_id == player))
            .cloned())
    }

    fn commit(&self, tx: Transaction) -> Result<usize, StorageError> {
        if tx.is_empty() {
            return Ok(0);
        }

        let mut index = self.write()?;
        index.validate(&tx)?;
        if let Some(config) = &self.backing {
            self.persist(config, &index, &tx)?;
        }

        let applied = tx.len();
        index.apply(tx);
        debug!("Committed {} operations", applied);
        Ok(applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MetricValue, Rank};
    use crate::ErrorKind;
    use tempfile::TempDir;

    fn t(day: u32) -> SnapshotTime {
        SnapshotTime::parse(&format!("2024-05-{:02}", day)).unwrap()
    }

    fn player(id: u64, code: &str) -> Player {
        Player::new(PlayerId::new(id), ConnectCode::parse(code).unwrap(), code)
    }

    fn elo(id: u64, at: SnapshotTime, value: f64) -> MetricRecord {
        MetricRecord::new(PlayerId::new(id), at, MetricValue::Elo { elo: value })
    }

    fn chars(id: u64, at: SnapshotTime, character: u16, games: u32) -> MetricRecord {
        MetricRecord::new(
            PlayerId::new(id),
            at,
            MetricValue::CharacterUsage {
                character: CharacterId::new(character),
                game_count: games,
            },
        )
    }

    fn seeded() -> SnapshotStore {
        let store = SnapshotStore::in_memory();
        let mut tx = Transaction::new();
        tx.register_player(player(1, "FOX#1"))
            .register_player(player(2, "FALCO#2"))
            .ensure_timestamp(t(1))
            .ensure_timestamp(t(2))
            .ensure_timestamp(t(3));
        store.commit(tx).unwrap();
        store
    }

    #[test]
    fn test_append_requires_registered_timestamp() {
        let store = seeded();
        let err = store.append(elo(1, t(9), 1200.0)).unwrap_err();
        assert!(matches!(err, StorageError::UnknownTimestamp(_)));
        assert_eq!(err.kind(), ErrorKind::StorageConflict);
    }

    #[test]
    fn test_append_requires_known_player() {
        let store = seeded();
        let err = store.append(elo(42, t(1), 1200.0)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_duplicate_record_rejected() {
        let store = seeded();
        store.append(elo(1, t(1), 1200.0)).unwrap();
        let err = store.append(elo(1, t(1), 1300.0)).unwrap_err();
        assert!(matches!(err, StorageError::DuplicateRecord { .. }));
        assert_eq!(store.history(PlayerId::new(1), Metric::Elo).unwrap().len(), 1);
    }

    #[test]
    fn test_failed_commit_applies_nothing() {
        let store = seeded();
        store.append(elo(1, t(1), 1200.0)).unwrap();

        let mut tx = Transaction::new();
        tx.ensure_timestamp(t(20))
            .append(elo(2, t(20), 1500.0))
            .append(elo(1, t(1), 1250.0));
        assert!(store.commit(tx).is_err());

        assert!(!store.timestamps().unwrap().contains(&t(20)));
        assert!(store.history(PlayerId::new(2), Metric::Elo).unwrap().is_empty());
    }

    #[test]
    fn test_same_timestamp_across_metrics_and_characters() {
        let store = seeded();
        let mut tx = Transaction::new();
        tx.append(elo(1, t(1), 1200.0))
            .append(chars(1, t(1), 2, 10))
            .append(chars(1, t(1), 20, 4));
        assert_eq!(store.commit(tx).unwrap(), 3);
    }

    #[test]
    fn test_register_duplicate_code_rejected() {
        let store = seeded();
        let err = store.register_player(player(3, "fox#1")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StorageConflict);
        assert!(store.player(PlayerId::new(3)).unwrap().is_none());
    }

    #[test]
    fn test_player_by_code() {
        let store = seeded();
        let code = ConnectCode::parse("falco#2").unwrap();
        let found = store.player_by_code(&code).unwrap().unwrap();
        assert_eq!(found.id, PlayerId::new(2));

        let missing = ConnectCode::parse("MARTH#3").unwrap();
        assert!(store.player_by_code(&missing).unwrap().is_none());
    }

    #[test]
    fn test_upsert_unknown_player_rejected() {
        let store = seeded();
        let mut tx = Transaction::new();
        tx.upsert_player(player(9, "NOPE#9"));
        assert!(matches!(
            store.commit(tx).unwrap_err(),
            StorageError::PlayerNotFound(_)
        ));
    }

    #[test]
    fn test_history_ordered_by_time() {
        let store = seeded();
        store.append(elo(1, t(3), 1300.0)).unwrap();
        store.append(elo(1, t(1), 1100.0)).unwrap();
        store.append(elo(1, t(2), 1200.0)).unwrap();

        let history = store.history(PlayerId::new(1), Metric::Elo).unwrap();
        let values: Vec<f64> = history.iter().filter_map(|r| r.elo()).collect();
        assert_eq!(values, vec![1100.0, 1200.0, 1300.0]);
    }

    #[test]
    fn test_latest_per_entity_respects_window() {
        let store = seeded();
        store.append(elo(1, t(1), 1100.0)).unwrap();
        store.append(elo(1, t(3), 1300.0)).unwrap();
        store.append(elo(2, t(2), 1500.0)).unwrap();

        let all = store.latest_per_entity(Metric::Elo).unwrap();
        assert_eq!(all[&PlayerId::new(1)].elo(), Some(1300.0));
        assert_eq!(all[&PlayerId::new(2)].elo(), Some(1500.0));

        let until_two = store
            .latest_per_entity_in(Metric::Elo, TimeWindow::until(t(2)))
            .unwrap();
        assert_eq!(until_two[&PlayerId::new(1)].elo(), Some(1100.0));

        let late = store
            .latest_per_entity_in(Metric::Elo, TimeWindow::between(t(3), t(3)))
            .unwrap();
        assert_eq!(late.len(), 1);
        assert!(late.contains_key(&PlayerId::new(1)));
    }

    #[test]
    fn test_latest_per_entity_includes_pre_epoch_history() {
        let store = seeded();
        let old = SnapshotTime::parse("2020-06-01").unwrap();
        let mut tx = Transaction::new();
        tx.ensure_timestamp(old).append(elo(1, old, 1300.0));
        store.commit(tx).unwrap();

        let latest = store.latest_per_entity(Metric::Elo).unwrap();
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[&PlayerId::new(1)].elo(), Some(1300.0));

        let as_of = store.latest_as_of(Metric::Elo, PlayerId::new(1), t(1)).unwrap();
        assert_eq!(as_of, Some(latest[&PlayerId::new(1)]));
    }

    #[test]
    fn test_latest_as_of() {
        let store = seeded();
        store.append(elo(1, t(1), 1100.0)).unwrap();
        store.append(elo(1, t(3), 1300.0)).unwrap();

        let at_two = store.latest_as_of(Metric::Elo, PlayerId::new(1), t(2)).unwrap();
        assert_eq!(at_two.and_then(|r| r.elo()), Some(1100.0));

        let before = store
            .latest_as_of(Metric::Elo, PlayerId::new(1), SnapshotTime::epoch())
            .unwrap();
        assert!(before.is_none());
    }

    #[test]
    fn test_latest_character_set_and_main() {
        let store = seeded();
        let mut tx = Transaction::new();
        tx.append(chars(1, t(1), 2, 10))
            .append(chars(1, t(1), 9, 3))
            .append(chars(1, t(2), 20, 7))
            .append(chars(1, t(2), 2, 7));
        store.commit(tx).unwrap();

        let set = store.latest_character_set(PlayerId::new(1), None).unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.iter().all(|r| r.recorded_at == t(2)));

        let earlier = store
            .latest_character_set(PlayerId::new(1), Some(t(1)))
            .unwrap();
        assert_eq!(earlier.len(), 2);
        assert!(earlier.iter().all(|r| r.recorded_at == t(1)));

        let main = store.latest_per_entity(Metric::CharacterUsage).unwrap();
        assert_eq!(
            main[&PlayerId::new(1)].character_usage(),
            Some((CharacterId::new(2), 7))
        );
    }

    #[test]
    fn test_delete_timestamp_only_when_orphaned() {
        let store = seeded();
        store.append(elo(1, t(1), 1100.0)).unwrap();

        let mut tx = Transaction::new();
        tx.delete_timestamp(t(1));
        assert!(matches!(
            store.commit(tx).unwrap_err(),
            StorageError::TimestampInUse(_)
        ));

        let mut tx = Transaction::new();
        tx.delete(elo(1, t(1), 1100.0)).delete_timestamp(t(1));
        store.commit(tx).unwrap();
        assert!(!store.timestamps().unwrap().contains(&t(1)));
    }

    #[test]
    fn test_delete_missing_record() {
        let store = seeded();
        let mut tx = Transaction::new();
        tx.delete(elo(1, t(1), 1100.0));
        assert_eq!(store.commit(tx).unwrap_err().kind(), ErrorKind::NotFound);
    }

    fn entry(id: u64, position: u32, at: SnapshotTime) -> LeaderboardEntry {
        LeaderboardEntry {
            player_id: PlayerId::new(id),
            position,
            display_name: format!("P{}", id),
            connect_code: ConnectCode::parse(&format!("P#{}", id)).unwrap(),
            elo: 1200.0,
            wins: 1,
            losses: 1,
            regional_placement: 0,
            rank: Rank::Silver1,
            as_of: at,
        }
    }

    #[test]
    fn test_cached_leaderboard_replace_and_position() {
        let store = seeded();
        let mut tx = Transaction::new();
        tx.cache_leaderboard(t(1), vec![entry(1, 1, t(1)), entry(2, 2, t(1))]);
        store.commit(tx).unwrap();

        let mut tx = Transaction::new();
        tx.cache_leaderboard(t(2), vec![entry(2, 1, t(2))]);
        store.commit(tx).unwrap();

        assert_eq!(store.cached_leaderboard(t(1)).unwrap().len(), 2);
        assert!(store.cached_leaderboard(t(3)).unwrap().is_empty());

        let two = store.latest_cached_position(PlayerId::new(2)).unwrap().unwrap();
        assert_eq!((two.position, two.as_of), (1, t(2)));
        let one = store.latest_cached_position(PlayerId::new(1)).unwrap().unwrap();
        assert_eq!((one.position, one.as_of), (1, t(1)));

        let mut tx = Transaction::new();
        tx.cache_leaderboard(t(1), vec![entry(1, 1, t(1))]);
        store.commit(tx).unwrap();
        assert_eq!(store.cached_leaderboard(t(1)).unwrap().len(), 1);
    }

    #[test]
    fn test_persistent_store_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let config = StorageConfig::new(temp_dir.path().to_path_buf());

        {
            let store = SnapshotStore::open(config.clone()).unwrap();
            let mut tx = Transaction::new();
            tx.register_player(player(1, "FOX#1"))
                .ensure_timestamp(t(1))
                .ensure_timestamp(t(2))
                .append(elo(1, t(1), 1100.0))
                .append(elo(1, t(2), 1200.0))
                .append(chars(1, t(2), 2, 5))
                .cache_leaderboard(t(2), vec![entry(1, 1, t(2))]);
            store.commit(tx).unwrap();

            let mut updated = store.player(PlayerId::new(1)).unwrap().unwrap();
            updated.snapshot.elo = 1200.0;
            let mut tx = Transaction::new();
            tx.upsert_player(updated).delete(elo(1, t(1), 1100.0));
            store.commit(tx).unwrap();
        }

        let store = SnapshotStore::open(config).unwrap();
        assert_eq!(store.timestamps().unwrap(), vec![t(1), t(2)]);
        let reopened = store.player(PlayerId::new(1)).unwrap().unwrap();
        assert_eq!(reopened.snapshot.elo, 1200.0);
        assert_eq!(store.players().unwrap().len(), 1);

        let history = store.history(PlayerId::new(1), Metric::Elo).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].recorded_at, t(2));
        assert_eq!(
            store.latest_character_set(PlayerId::new(1), None).unwrap().len(),
            1
        );
        assert_eq!(store.cached_leaderboard(t(2)).unwrap().len(), 1);
    }

    #[test]
    fn test_failed_commit_writes_nothing_to_disk() {
        let temp_dir = TempDir::new().unwrap();
        let config = StorageConfig::new(temp_dir.path().to_path_buf());
        let store = SnapshotStore::open(config.clone()).unwrap();

        let mut tx = Transaction::new();
        tx.ensure_timestamp(t(1)).append(elo(7, t(1), 1.0));
        assert!(store.commit(tx).is_err());
        drop(store);

        let store = SnapshotStore::open(config).unwrap();
        assert!(store.timestamps().unwrap().is_empty());
    }
}
