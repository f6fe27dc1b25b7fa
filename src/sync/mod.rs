//! Sync orchestrator.
//!
//! Drives reconciliation passes:
//! 1. Resolve the target players
//! 2. Register the pass timestamp on the time axis
//! 3. Fetch each player's ranked profile, one throttled call at a time
//! 4. Diff against stored state and append what changed
//! 5. Optionally cache the resulting leaderboard

pub mod convert;
pub mod reconcile;
pub mod slippi;

pub use reconcile::{reconcile_player, PlayerOutcome, Step, StepFailure, StepPlan};
pub use slippi::{ProfileLookup, ProfileSource, SlippiClient};

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::calculate::LeaderboardAssembler;
use crate::fetch::FetchError;
use crate::models::{Metric, Player, PlayerId, SnapshotTime};
use crate::storage::{StorageError, TimeSeriesStore};
use crate::ErrorKind;

/// Errors that can occur during sync.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Player not found: {0}")]
    PlayerNotFound(PlayerId),

    #[error("A reconciliation pass is already running")]
    AlreadyRunning,
}

impl SyncError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::Fetch(FetchError::InvalidUrl(_)) => ErrorKind::InvalidInput,
            SyncError::Fetch(_) => ErrorKind::UpstreamUnavailable,
            SyncError::Storage(e) => e.kind(),
            SyncError::PlayerNotFound(_) => ErrorKind::NotFound,
            SyncError::AlreadyRunning => ErrorKind::StorageConflict,
        }
    }
}

/// Configuration for sync operations.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Spacing between periodic passes
    pub interval: Duration,

    /// Cache the assembled leaderboard at the end of each pass
    pub snapshot: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(6 * 3600),
            snapshot: false,
        }
    }
}

/// State of the most recent pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncState {
    pub last_run_id: Option<Uuid>,

    pub last_sync_started: Option<DateTime<Utc>>,

    pub last_sync_completed: Option<DateTime<Utc>>,

    pub last_sync_status: SyncStatus,

    /// Players reconciled in the last pass
    pub players_reconciled: u32,

    /// Records appended in the last pass
    pub records_appended: u32,

    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    #[default]
    Idle,
    Running,
    Completed,
    Failed,
}

/// Summary of one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PassReport {
    pub run_id: Uuid,

    /// Timestamp every record of this pass was written at
    pub at: SnapshotTime,

    pub targets: usize,

    /// Players whose profile was fetched and reconciled
    pub fetched: usize,

    /// Players left untouched: unknown upstream, bad code, no ranked
    /// account, or a failed fetch
    pub skipped: usize,

    pub appended: BTreeMap<Metric, usize>,

    /// One line per failed fetch or step
    pub failures: Vec<String>,

    /// Entries in the cached leaderboard, when one was written
    pub snapshot_entries: Option<usize>,

    pub cancelled: bool,
}

impl PassReport {
    fn new(run_id: Uuid, at: SnapshotTime, targets: usize) -> Self {
        Self {
            run_id,
            at,
            targets,
            fetched: 0,
            skipped: 0,
            appended: BTreeMap::new(),
            failures: Vec::new(),
            snapshot_entries: None,
            cancelled: false,
        }
    }

    pub fn records_appended(&self) -> usize {
        self.appended.values().sum()
    }

    fn absorb(&mut self, outcome: PlayerOutcome) {
        self.fetched += 1;
        for (metric, n) in outcome.appended {
            *self.appended.entry(metric).or_default() += n;
        }
        for failure in outcome.failures {
            self.failures.push(format!(
                "player {} {}: {}",
                failure.player_id, failure.step, failure.message
            ));
        }
    }
}

/// Sync orchestrator.
///
/// Holds the single-writer guard: at most one pass runs at a time, whether
/// started by the periodic runner, the CLI, or the API.
pub struct SyncOrchestrator {
    config: SyncConfig,
    store: Arc<dyn TimeSeriesStore>,
    source: Arc<dyn ProfileSource>,
    state: Arc<RwLock<SyncState>>,
    cancel_token: Arc<RwLock<bool>>,
    pass_lock: Arc<Mutex<()>>,
}

impl SyncOrchestrator {
    pub fn new(
        config: SyncConfig,
        store: Arc<dyn TimeSeriesStore>,
        source: Arc<dyn ProfileSource>,
    ) -> Self {
        Self {
            config,
            store,
            source,
            state: Arc::new(RwLock::new(SyncState::default())),
            cancel_token: Arc::new(RwLock::new(false)),
            pass_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Get current sync state.
    pub async fn state(&self) -> SyncState {
        self.state.read().await.clone()
    }

    /// Check if a pass is currently running.
    pub async fn is_running(&self) -> bool {
        self.state.read().await.last_sync_status == SyncStatus::Running
    }

    /// Stop the current pass after the player in flight, and any later ones.
    pub async fn cancel(&self) {
        *self.cancel_token.write().await = true;
    }

    async fn is_cancelled(&self) -> bool {
        *self.cancel_token.read().await
    }

    /// Run one pass over every registered player, or only `player`.
    pub async fn run_pass(&self, player: Option<PlayerId>) -> Result<PassReport, SyncError> {
        let _guard = self
            .pass_lock
            .clone()
            .try_lock_owned()
            .map_err(|_| SyncError::AlreadyRunning)?;
        self.execute(player).await
    }

    /// Start a pass in the background (for the API endpoint).
    ///
    /// Refuses to start while another pass holds the writer guard, and
    /// rejects an unknown player before anything is spawned.
    pub fn trigger(
        self: &Arc<Self>,
        player: Option<PlayerId>,
    ) -> Result<JoinHandle<Result<PassReport, SyncError>>, SyncError> {
        let guard = self.pass_lock.clone().try_lock_owned().map_err(|_| {
            warn!("Sync already in progress");
            SyncError::AlreadyRunning
        })?;

        if let Some(id) = player {
            if self.store.player(id)?.is_none() {
                return Err(SyncError::PlayerNotFound(id));
            }
        }

        let this = Arc::clone(self);
        Ok(tokio::spawn(async move {
            let _guard = guard;
            this.execute(player).await
        }))
    }

    async fn execute(&self, player: Option<PlayerId>) -> Result<PassReport, SyncError> {
        let run_id = Uuid::new_v4();
        let span = info_span!("reconcile", %run_id);
        async move {
            {
                let mut state = self.state.write().await;
                state.last_run_id = Some(run_id);
                state.last_sync_started = Some(Utc::now());
                state.last_sync_status = SyncStatus::Running;
                state.errors.clear();
            }

            let result = self.reconcile_all(run_id, player).await;

            let mut state = self.state.write().await;
            state.last_sync_completed = Some(Utc::now());
            match &result {
                Ok(report) => {
                    state.last_sync_status = SyncStatus::Completed;
                    state.players_reconciled = report.fetched as u32;
                    state.records_appended = report.records_appended() as u32;
                    state.errors = report.failures.clone();
                }
                Err(e) => {
                    error!("Reconciliation pass failed: {}", e);
                    state.last_sync_status = SyncStatus::Failed;
                    state.players_reconciled = 0;
                    state.records_appended = 0;
                    state.errors = vec![e.to_string()];
                }
            }
            result
        }
        .instrument(span)
        .await
    }

    /// Resolve the players a pass covers.
    fn targets(&self, only: Option<PlayerId>) -> Result<Vec<Player>, SyncError> {
        match only {
            Some(id) => match self.store.player(id)? {
                Some(player) => Ok(vec![player]),
                None => Err(SyncError::PlayerNotFound(id)),
            },
            None => Ok(self.store.players()?),
        }
    }

    async fn reconcile_all(
        &self,
        run_id: Uuid,
        only: Option<PlayerId>,
    ) -> Result<PassReport, SyncError> {
        // Resolved first so a rejected refresh leaves no orphan timestamp.
        let targets = self.targets(only)?;

        let at = SnapshotTime::now();
        self.store.ensure_timestamp(at)?;
        info!(
            source = self.source.name(),
            "Reconciling {} players at {}",
            targets.len(),
            at
        );

        let mut report = PassReport::new(run_id, at, targets.len());
        for player in targets {
            if self.is_cancelled().await {
                warn!("Pass cancelled");
                report.cancelled = true;
                break;
            }

            let code = player.connect_code.as_str().to_string();
            match self.source.fetch_profile(&code).await {
                Ok(ProfileLookup::Found(profile)) => {
                    if profile.slippi_id.is_none() {
                        info!("Skipping {}: no ranked account", code);
                        report.skipped += 1;
                        continue;
                    }
                    let outcome = reconcile_player(self.store.as_ref(), player, &profile, at);
                    report.absorb(outcome);
                }
                Ok(ProfileLookup::NotFound) => {
                    warn!("Skipping {}: no account upstream", code);
                    report.skipped += 1;
                }
                Ok(ProfileLookup::InvalidCode(code)) => {
                    warn!("Skipping {}: invalid connect code", code);
                    report.skipped += 1;
                }
                Err(e) => {
                    warn!("Skipping {}: {}", code, e);
                    report.skipped += 1;
                    report.failures.push(format!("player {} fetch: {}", player.id, e));
                }
            }
        }

        if self.config.snapshot && !report.cancelled {
            match LeaderboardAssembler::new(Arc::clone(&self.store)).snapshot(at) {
                Ok(entries) => report.snapshot_entries = Some(entries.len()),
                Err(e) => {
                    warn!("Failed to cache leaderboard: {}", e);
                    report.failures.push(format!("leaderboard snapshot: {}", e));
                }
            }
        }

        info!(
            "Pass complete: {} reconciled, {} skipped, {} records appended, {} failures",
            report.fetched,
            report.skipped,
            report.records_appended(),
            report.failures.len()
        );
        Ok(report)
    }

    /// Run periodic passes in the background until cancelled.
    pub async fn run_periodic(self: Arc<Self>) {
        let mut ticker = interval(self.config.interval);

        info!("Starting periodic sync every {:?}", self.config.interval);

        loop {
            ticker.tick().await;

            if self.is_cancelled().await {
                info!("Periodic sync stopped");
                break;
            }

            match self.run_pass(None).await {
                Ok(report) if report.cancelled => {
                    info!("Periodic sync cancelled");
                    break;
                }
                Ok(report) => {
                    info!(
                        "Periodic sync completed: {} players, {} records",
                        report.fetched,
                        report.records_appended()
                    );
                }
                Err(SyncError::AlreadyRunning) => {
                    warn!("Skipping periodic pass: another pass is running");
                }
                Err(e) => {
                    error!("Periodic sync failed: {}", e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::slippi::scripted::{Scripted, ScriptedProfiles};
    use super::*;
    use crate::models::{
        get_character_id, CharacterUsage, ConnectCode, LeaderboardEntry, MetricRecord,
        RankedProfile, TimeWindow,
    };
    use crate::storage::{SnapshotStore, Transaction, WriteOp};
    use std::sync::atomic::{AtomicBool, Ordering};

    fn player(id: u64, code: &str) -> Player {
        Player::new(PlayerId::new(id), ConnectCode::parse(code).unwrap(), code)
    }

    fn profile(rating: f64, wins: u32, losses: u32) -> RankedProfile {
        RankedProfile {
            slippi_id: Some("acct".to_string()),
            display_name: None,
            rating,
            wins,
            losses,
            regional_placement: 0,
            global_placement: None,
            characters: vec![],
        }
    }

    fn store_with(players: Vec<Player>) -> Arc<SnapshotStore> {
        let store = SnapshotStore::in_memory();
        for p in players {
            store.register_player(p).unwrap();
        }
        Arc::new(store)
    }

    fn orchestrator(
        store: Arc<dyn TimeSeriesStore>,
        source: Arc<ScriptedProfiles>,
    ) -> Arc<SyncOrchestrator> {
        Arc::new(SyncOrchestrator::new(SyncConfig::default(), store, source))
    }

    #[tokio::test]
    async fn test_reconcile_scenario() {
        let store = store_with(vec![player(1, "AAA#1")]);
        let source = Arc::new(ScriptedProfiles::new());
        let fox = get_character_id("FOX", true).unwrap();
        let mut fetched = profile(1150.3, 5, 2);
        fetched.characters = vec![CharacterUsage {
            character: fox,
            game_count: 10,
        }];
        source.set("AAA#1", Scripted::Profile(fetched));

        let sync = orchestrator(store.clone(), source);
        let report = sync.run_pass(None).await.unwrap();

        assert_eq!(report.fetched, 1);
        assert_eq!(
            report.appended,
            BTreeMap::from([
                (Metric::Elo, 1),
                (Metric::WinLoss, 1),
                (Metric::RegionalPlacement, 1),
                (Metric::CharacterUsage, 1),
            ])
        );

        let stored = store.player(PlayerId::new(1)).unwrap().unwrap();
        assert_eq!(stored.snapshot.main_character, fox);
        assert_eq!(stored.snapshot.elo, 1150.3);
        assert_eq!(store.timestamps().unwrap(), vec![report.at]);

        let state = sync.state().await;
        assert_eq!(state.last_sync_status, SyncStatus::Completed);
        assert_eq!(state.records_appended, 4);
    }

    #[tokio::test]
    async fn test_second_pass_appends_nothing() {
        let store = store_with(vec![player(1, "AAA#1"), player(2, "BBB#2")]);
        let source = Arc::new(ScriptedProfiles::new());
        let mut a = profile(1500.0, 10, 3);
        a.global_placement = Some(120);
        a.regional_placement = 8;
        // Listed highest id first; stored sets come back ordered by id.
        a.characters = vec![
            CharacterUsage {
                character: get_character_id("FALCO", true).unwrap(),
                game_count: 40,
            },
            CharacterUsage {
                character: get_character_id("FOX", true).unwrap(),
                game_count: 12,
            },
        ];
        source.set("AAA#1", Scripted::Profile(a));
        source.set("BBB#2", Scripted::Profile(profile(900.0, 1, 9)));

        let sync = orchestrator(store.clone(), source);
        let first = sync.run_pass(None).await.unwrap();
        assert!(first.records_appended() > 0);
        assert_eq!(first.appended.get(&Metric::CharacterUsage), Some(&2));

        let second = sync.run_pass(None).await.unwrap();
        assert_eq!(second.records_appended(), 0);
        assert!(!second.appended.contains_key(&Metric::CharacterUsage));
        assert_eq!(
            store.history(PlayerId::new(1), Metric::CharacterUsage).unwrap().len(),
            2
        );
        assert_eq!(second.fetched, 2);
        assert!(second.failures.is_empty());
    }

    #[tokio::test]
    async fn test_skipped_players_do_not_abort_pass() {
        let store = store_with(vec![
            player(1, "AAA#1"),
            player(2, "BBB#2"),
            player(3, "CCC#3"),
            player(4, "DDD#4"),
        ]);
        let source = Arc::new(ScriptedProfiles::new());
        source.set("AAA#1", Scripted::Profile(profile(1300.0, 1, 0)));
        source.set("BBB#2", Scripted::Missing);
        source.set("CCC#3", Scripted::Unavailable);
        let mut unranked = profile(1100.0, 0, 0);
        unranked.slippi_id = None;
        source.set("DDD#4", Scripted::Profile(unranked));

        let sync = orchestrator(store.clone(), source.clone());
        let report = sync.run_pass(None).await.unwrap();

        assert_eq!(report.targets, 4);
        assert_eq!(report.fetched, 1);
        assert_eq!(report.skipped, 3);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(source.calls().len(), 4);
        assert!(store.history(PlayerId::new(4), Metric::Elo).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_single_player_refresh() {
        let store = store_with(vec![player(1, "AAA#1"), player(2, "BBB#2")]);
        let source = Arc::new(ScriptedProfiles::new());
        source.set("AAA#1", Scripted::Profile(profile(1300.0, 1, 0)));
        source.set("BBB#2", Scripted::Profile(profile(1400.0, 1, 0)));

        let sync = orchestrator(store, source.clone());
        let report = sync.run_pass(Some(PlayerId::new(2))).await.unwrap();

        assert_eq!(report.targets, 1);
        assert_eq!(source.calls(), vec!["BBB#2".to_string()]);
    }

    #[tokio::test]
    async fn test_unknown_player_leaves_no_timestamp() {
        let store = store_with(vec![player(1, "AAA#1")]);
        let sync = orchestrator(store.clone(), Arc::new(ScriptedProfiles::new()));

        let err = sync.run_pass(Some(PlayerId::new(99))).await.unwrap_err();
        assert!(matches!(err, SyncError::PlayerNotFound(_)));
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(store.timestamps().unwrap().is_empty());
        assert_eq!(sync.state().await.last_sync_status, SyncStatus::Failed);
    }

    #[tokio::test]
    async fn test_trigger_refuses_overlap() {
        let store = store_with(vec![player(1, "AAA#1")]);
        let sync = orchestrator(store, Arc::new(ScriptedProfiles::new()));

        let held = sync.pass_lock.clone().try_lock_owned().unwrap();
        assert!(matches!(sync.trigger(None), Err(SyncError::AlreadyRunning)));
        assert!(matches!(
            sync.run_pass(None).await,
            Err(SyncError::AlreadyRunning)
        ));
        drop(held);

        let handle = sync.trigger(None).unwrap();
        tokio_test::assert_ok!(handle.await.unwrap());
    }

    #[tokio::test]
    async fn test_trigger_rejects_unknown_player() {
        let store = store_with(vec![player(1, "AAA#1")]);
        let sync = orchestrator(store, Arc::new(ScriptedProfiles::new()));
        assert!(matches!(
            sync.trigger(Some(PlayerId::new(5))),
            Err(SyncError::PlayerNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_pass_with_snapshot() {
        let store = store_with(vec![player(1, "AAA#1"), player(2, "BBB#2")]);
        let source = Arc::new(ScriptedProfiles::new());
        source.set("AAA#1", Scripted::Profile(profile(1300.0, 1, 0)));
        source.set("BBB#2", Scripted::Profile(profile(1700.0, 4, 1)));

        let config = SyncConfig {
            snapshot: true,
            ..Default::default()
        };
        let sync = SyncOrchestrator::new(config, store.clone(), source);
        let report = sync.run_pass(None).await.unwrap();

        assert_eq!(report.snapshot_entries, Some(2));
        let cached: Vec<LeaderboardEntry> = store.cached_leaderboard(report.at).unwrap();
        assert_eq!(cached[0].player_id, PlayerId::new(2));
    }

    #[tokio::test]
    async fn test_cancelled_pass_stops_early() {
        let store = store_with(vec![player(1, "AAA#1")]);
        let source = Arc::new(ScriptedProfiles::new());
        let sync = orchestrator(store, source.clone());

        sync.cancel().await;
        let report = sync.run_pass(None).await.unwrap();
        assert!(report.cancelled);
        assert!(source.calls().is_empty());
    }

    #[tokio::test]
    async fn test_periodic_stops_on_cancel() {
        let store = store_with(vec![]);
        let config = SyncConfig {
            interval: Duration::from_millis(10),
            snapshot: false,
        };
        let sync = Arc::new(SyncOrchestrator::new(
            config,
            store,
            Arc::new(ScriptedProfiles::new()),
        ));

        let handle = tokio::spawn(sync.clone().run_periodic());
        tokio::time::sleep(Duration::from_millis(30)).await;
        sync.cancel().await;

        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
    }

    /// Store whose commits fail while any write touches `metric`.
    struct FlakyStore {
        inner: SnapshotStore,
        metric: Metric,
        failing: AtomicBool,
    }

    impl FlakyStore {
        fn touches_metric(&self, tx: &Transaction) -> bool {
            tx.ops()
                .iter()
                .any(|op| matches!(op, WriteOp::Append(r) if r.metric() == self.metric))
        }
    }

    impl TimeSeriesStore for FlakyStore {
        fn players(&self) -> Result<Vec<Player>, StorageError> {
            self.inner.players()
        }
        fn player(&self, id: PlayerId) -> Result<Option<Player>, StorageError> {
            self.inner.player(id)
        }
        fn player_by_code(&self, code: &ConnectCode) -> Result<Option<Player>, StorageError> {
            self.inner.player_by_code(code)
        }
        fn timestamps(&self) -> Result<Vec<SnapshotTime>, StorageError> {
            self.inner.timestamps()
        }
        fn records(&self, metric: Metric) -> Result<Vec<MetricRecord>, StorageError> {
            self.inner.records(metric)
        }
        fn history(&self, player: PlayerId, metric: Metric) -> Result<Vec<MetricRecord>, StorageError> {
            self.inner.history(player, metric)
        }
        fn latest_per_entity_in(
            &self,
            metric: Metric,
            window: TimeWindow,
        ) -> Result<BTreeMap<PlayerId, MetricRecord>, StorageError> {
            self.inner.latest_per_entity_in(metric, window)
        }
        fn latest_as_of(
            &self,
            metric: Metric,
            player: PlayerId,
            at: SnapshotTime,
        ) -> Result<Option<MetricRecord>, StorageError> {
            self.inner.latest_as_of(metric, player, at)
        }
        fn latest_character_set(
            &self,
            player: PlayerId,
            at: Option<SnapshotTime>,
        ) -> Result<Vec<MetricRecord>, StorageError> {
            self.inner.latest_character_set(player, at)
        }
        fn cached_leaderboard(&self, at: SnapshotTime) -> Result<Vec<LeaderboardEntry>, StorageError> {
            self.inner.cached_leaderboard(at)
        }
        fn latest_cached_position(
            &self,
            player: PlayerId,
        ) -> Result<Option<LeaderboardEntry>, StorageError> {
            self.inner.latest_cached_position(player)
        }
        fn commit(&self, tx: Transaction) -> Result<usize, StorageError> {
            if self.failing.load(Ordering::SeqCst) && self.touches_metric(&tx) {
                return Err(StorageError::Unavailable("connection reset".to_string()));
            }
            self.inner.commit(tx)
        }
    }

    #[tokio::test]
    async fn test_failed_step_heals_on_next_pass() {
        let inner = SnapshotStore::in_memory();
        inner.register_player(player(1, "AAA#1")).unwrap();
        let store = Arc::new(FlakyStore {
            inner,
            metric: Metric::WinLoss,
            failing: AtomicBool::new(true),
        });
        let source = Arc::new(ScriptedProfiles::new());
        source.set("AAA#1", Scripted::Profile(profile(1250.0, 6, 4)));
        let sync = orchestrator(store.clone(), source);

        let first = sync.run_pass(None).await.unwrap();
        assert_eq!(first.failures.len(), 1);
        assert!(first.failures[0].contains("win_loss"));
        assert_eq!(first.appended.get(&Metric::Elo), Some(&1));
        assert_eq!(first.appended.get(&Metric::WinLoss), None);

        store.failing.store(false, Ordering::SeqCst);
        let second = sync.run_pass(None).await.unwrap();
        assert_eq!(second.appended, BTreeMap::from([(Metric::WinLoss, 1)]));

        let stored = store.player(PlayerId::new(1)).unwrap().unwrap();
        assert_eq!((stored.snapshot.wins, stored.snapshot.losses), (6, 4));
    }

    #[test]
    fn test_sync_error_kinds() {
        assert_eq!(
            SyncError::Fetch(FetchError::HttpStatus {
                status: 503,
                message: "x".to_string()
            })
            .kind(),
            ErrorKind::UpstreamUnavailable
        );
        assert_eq!(
            SyncError::Fetch(FetchError::InvalidUrl("x".to_string())).kind(),
            ErrorKind::InvalidInput
        );
        assert_eq!(SyncError::AlreadyRunning.kind(), ErrorKind::StorageConflict);
    }

    #[test]
    fn test_sync_status_serialization() {
        let status = SyncStatus::Running;
        let json = serde_json::to_string(&status).unwrap();
        assert_eq!(json, "\"running\"");

        let parsed: SyncStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, SyncStatus::Running);
    }
}
