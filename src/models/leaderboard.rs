//! Leaderboard rows.

use serde::{Deserialize, Serialize};

use super::{ConnectCode, PlayerId, Rank, SnapshotTime};

/// One ranked row. Derived from metric records; the persisted copy is a
/// cache and can always be rebuilt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub player_id: PlayerId,

    /// 1-based
    pub position: u32,

    pub display_name: String,
    pub connect_code: ConnectCode,
    pub elo: f64,
    pub wins: u32,
    pub losses: u32,
    pub regional_placement: u32,
    pub rank: Rank,

    /// The snapshot this row describes
    pub as_of: SnapshotTime,
}

impl LeaderboardEntry {
    /// Total ranked sets played.
    pub fn sets_played(&self) -> u32 {
        self.wins + self.losses
    }
}
