//! Per-player reconciliation.
//!
//! Each step compares one metric of a fresh [`RankedProfile`] with what is
//! already known and, when it changed, plans a [`Transaction`] appending the
//! new record and updating the player's cached snapshot. Planning is pure;
//! [`reconcile_player`] commits the plans one step at a time.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use tracing::{debug, warn};

use crate::models::{
    elo_changed, CharacterId, Metric, MetricRecord, MetricValue, Player, PlayerId, RankedProfile,
    SnapshotTime,
};
use crate::storage::{StorageError, TimeSeriesStore, Transaction};
use crate::ErrorKind;

/// One independent diff-and-append check, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    IdentityLink,
    Elo,
    WinLoss,
    RegionalPlacement,
    GlobalPlacement,
    CharacterUsage,
}

impl Step {
    pub const ALL: [Step; 6] = [
        Step::IdentityLink,
        Step::Elo,
        Step::WinLoss,
        Step::RegionalPlacement,
        Step::GlobalPlacement,
        Step::CharacterUsage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Step::IdentityLink => "identity_link",
            Step::Elo => "elo",
            Step::WinLoss => "win_loss",
            Step::RegionalPlacement => "regional_placement",
            Step::GlobalPlacement => "global_placement",
            Step::CharacterUsage => "character_usage",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Writes for one step plus the player as it will look once they commit.
#[derive(Debug, Clone, PartialEq)]
pub struct StepPlan {
    pub tx: Transaction,
    pub player: Player,
}

impl StepPlan {
    fn append(player: Player, record: MetricRecord) -> Self {
        let mut tx = Transaction::new();
        tx.append(record).upsert_player(player.clone());
        Self { tx, player }
    }
}

pub fn plan_identity_link(player: &Player, profile: &RankedProfile) -> Option<StepPlan> {
    let slippi_id = profile.slippi_id.as_ref()?;
    if player.slippi_id.as_ref() == Some(slippi_id) {
        return None;
    }

    let updated = player.clone().with_slippi_id(slippi_id.clone());
    let mut tx = Transaction::new();
    tx.upsert_player(updated.clone());
    Some(StepPlan {
        tx,
        player: updated,
    })
}

/// Append only when the rating moved by more than epsilon.
pub fn plan_elo(player: &Player, profile: &RankedProfile, at: SnapshotTime) -> Option<StepPlan> {
    if !elo_changed(player.snapshot.elo, profile.rating) {
        return None;
    }

    let mut updated = player.clone();
    updated.snapshot.elo = profile.rating;
    let record = MetricRecord::new(player.id, at, MetricValue::Elo { elo: profile.rating });
    Some(StepPlan::append(updated, record))
}

pub fn plan_win_loss(player: &Player, profile: &RankedProfile, at: SnapshotTime) -> Option<StepPlan> {
    let snapshot = &player.snapshot;
    if snapshot.wins == profile.wins && snapshot.losses == profile.losses {
        return None;
    }

    let mut updated = player.clone();
    updated.snapshot.wins = profile.wins;
    updated.snapshot.losses = profile.losses;
    let record = MetricRecord::new(
        player.id,
        at,
        MetricValue::WinLoss {
            wins: profile.wins,
            losses: profile.losses,
        },
    );
    Some(StepPlan::append(updated, record))
}

/// Plain inequality against the cached value. A player with no placement
/// recorded yet gets one even when it is 0.
pub fn plan_regional_placement(
    player: &Player,
    profile: &RankedProfile,
    at: SnapshotTime,
) -> Option<StepPlan> {
    if player.snapshot.regional_placement == Some(profile.regional_placement) {
        return None;
    }

    let mut updated = player.clone();
    updated.snapshot.regional_placement = Some(profile.regional_placement);
    let record = MetricRecord::new(
        player.id,
        at,
        MetricValue::RegionalPlacement {
            placement: profile.regional_placement,
        },
    );
    Some(StepPlan::append(updated, record))
}

/// Compared against the most recent prior record rather than a cached field.
///
/// With no prior record only a real (non-zero) placement is appended. With a
/// prior record any difference is appended, an absent placement counting
/// as 0.
pub fn plan_global_placement(
    player: &Player,
    profile: &RankedProfile,
    at: SnapshotTime,
    prior: Option<&MetricRecord>,
) -> Option<StepPlan> {
    let incoming = profile.global_placement.unwrap_or(0);
    let changed = match prior.and_then(|r| r.placement()) {
        None => incoming != 0,
        Some(previous) => previous != incoming,
    };
    if !changed {
        return None;
    }

    let mut tx = Transaction::new();
    tx.append(MetricRecord::new(
        player.id,
        at,
        MetricValue::GlobalPlacement {
            placement: incoming,
        },
    ));
    Some(StepPlan {
        tx,
        player: player.clone(),
    })
}

/// Replace the whole character set when it differs from the latest recorded
/// one. An empty profile set changes nothing.
pub fn plan_character_usage(
    player: &Player,
    profile: &RankedProfile,
    at: SnapshotTime,
    latest: &[MetricRecord],
) -> Option<StepPlan> {
    if profile.characters.is_empty() {
        return None;
    }

    let recorded: std::collections::HashMap<CharacterId, u32> =
        latest.iter().filter_map(|r| r.character_usage()).collect();
    if recorded == profile.character_map() {
        return None;
    }

    let mut updated = player.clone();
    if let Some(main) = profile.main_character() {
        updated.snapshot.main_character = main;
    }

    let mut tx = Transaction::new();
    for usage in &profile.characters {
        tx.append(MetricRecord::new(
            player.id,
            at,
            MetricValue::CharacterUsage {
                character: usage.character,
                game_count: usage.game_count,
            },
        ));
    }
    tx.upsert_player(updated.clone());
    Some(StepPlan {
        tx,
        player: updated,
    })
}

fn plan_step(
    store: &dyn TimeSeriesStore,
    step: Step,
    player: &Player,
    profile: &RankedProfile,
    at: SnapshotTime,
) -> Result<Option<StepPlan>, StorageError> {
    Ok(match step {
        Step::IdentityLink => plan_identity_link(player, profile),
        Step::Elo => plan_elo(player, profile, at),
        Step::WinLoss => plan_win_loss(player, profile, at),
        Step::RegionalPlacement => plan_regional_placement(player, profile, at),
        Step::GlobalPlacement => {
            let prior = store.latest_as_of(Metric::GlobalPlacement, player.id, at)?;
            plan_global_placement(player, profile, at, prior.as_ref())
        }
        Step::CharacterUsage => {
            let latest = store.latest_character_set(player.id, Some(at))?;
            plan_character_usage(player, profile, at, &latest)
        }
    })
}

/// A step that could not be applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepFailure {
    pub player_id: PlayerId,
    pub step: Step,
    pub kind: ErrorKind,
    pub message: String,
}

/// What reconciling one player changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerOutcome {
    pub player_id: PlayerId,
    pub changed: Vec<Step>,
    pub appended: BTreeMap<Metric, usize>,
    pub failures: Vec<StepFailure>,
}

impl PlayerOutcome {
    pub fn records_appended(&self) -> usize {
        self.appended.values().sum()
    }
}

/// Run every step for one player, committing each on its own.
///
/// A failed step is recorded and skipped; later steps still run against the
/// player state left by the steps that did commit.
pub fn reconcile_player(
    store: &dyn TimeSeriesStore,
    player: Player,
    profile: &RankedProfile,
    at: SnapshotTime,
) -> PlayerOutcome {
    let mut outcome = PlayerOutcome {
        player_id: player.id,
        changed: Vec::new(),
        appended: BTreeMap::new(),
        failures: Vec::new(),
    };
    let mut current = player;

    for step in Step::ALL {
        let result = plan_step(store, step, &current, profile, at).and_then(|plan| {
            let Some(plan) = plan else {
                return Ok(None);
            };
            let mut appended: BTreeMap<Metric, usize> = BTreeMap::new();
            for record in plan.tx.appended() {
                *appended.entry(record.metric()).or_default() += 1;
            }
            store.commit(plan.tx)?;
            Ok(Some((plan.player, appended)))
        });

        match result {
            Ok(None) => debug!(player = %current.id, %step, "unchanged"),
            Ok(Some((updated, appended))) => {
                debug!(player = %current.id, %step, "recorded change");
                for (metric, n) in appended {
                    *outcome.appended.entry(metric).or_default() += n;
                }
                outcome.changed.push(step);
                current = updated;
            }
            Err(e) => {
                warn!(player = %current.id, %step, "Step failed: {}", e);
                outcome.failures.push(StepFailure {
                    player_id: current.id,
                    step,
                    kind: e.kind(),
                    message: e.to_string(),
                });
            }
        }
    }

    outcome
}
