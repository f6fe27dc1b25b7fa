//! Tracked player model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{CharacterId, ConnectCode, PlayerId};

/// Rating a fresh account starts with.
pub const DEFAULT_ELO: f64 = 1100.0;

/// Cached latest values for a player.
///
/// Kept in sync with the append-only history by the reconciliation engine,
/// which is the only writer of these fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub elo: f64,
    pub wins: u32,
    pub losses: u32,

    /// `None` until a regional placement has been recorded at least once.
    pub regional_placement: Option<u32>,

    pub main_character: CharacterId,
}

impl Default for PlayerSnapshot {
    fn default() -> Self {
        Self {
            elo: DEFAULT_ELO,
            wins: 0,
            losses: 0,
            regional_placement: None,
            main_character: CharacterId::NONE,
        }
    }
}

impl PlayerSnapshot {
    /// No ranked sets played yet.
    pub fn is_unplayed(&self) -> bool {
        self.wins == 0 && self.losses == 0
    }
}

/// A tracked competitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,

    /// Correlation key with the ranking service
    pub connect_code: ConnectCode,

    pub display_name: String,

    /// Account id reported by the ranking service, once linked
    pub slippi_id: Option<String>,

    #[serde(default)]
    pub snapshot: PlayerSnapshot,

    pub registered_at: DateTime<Utc>,
}

impl Player {
    pub fn new(id: PlayerId, connect_code: ConnectCode, display_name: impl Into<String>) -> Self {
        Self {
            id,
            connect_code,
            display_name: display_name.into(),
            slippi_id: None,
            snapshot: PlayerSnapshot::default(),
            registered_at: Utc::now(),
        }
    }

    /// Builder method to set the linked account id.
    pub fn with_slippi_id(mut self, slippi_id: impl Into<String>) -> Self {
        self.slippi_id = Some(slippi_id.into());
        self
    }

    /// Builder method to replace the cached snapshot.
    pub fn with_snapshot(mut self, snapshot: PlayerSnapshot) -> Self {
        self.snapshot = snapshot;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code() -> ConnectCode {
        ConnectCode::parse("FOX#1").unwrap()
    }

    #[test]
    fn test_snapshot_defaults() {
        let snap = PlayerSnapshot::default();
        assert_eq!(snap.elo, DEFAULT_ELO);
        assert_eq!(snap.regional_placement, None);
        assert_eq!(snap.main_character, CharacterId::NONE);
        assert!(snap.is_unplayed());
    }

    #[test]
    fn test_unplayed_requires_both_zero() {
        let snap = PlayerSnapshot {
            losses: 1,
            ..Default::default()
        };
        assert!(!snap.is_unplayed());
    }

    #[test]
    fn test_player_new() {
        let player = Player::new(PlayerId::new(1), code(), "Fox Main");
        assert_eq!(player.display_name, "Fox Main");
        assert!(player.slippi_id.is_none());
        assert_eq!(player.snapshot, PlayerSnapshot::default());
    }

    #[test]
    fn test_player_builder() {
        let player = Player::new(PlayerId::new(1), code(), "x").with_slippi_id("abc");
        assert_eq!(player.slippi_id.as_deref(), Some("abc"));
    }

    #[test]
    fn test_player_serialization_round_trip() {
        let player = Player::new(PlayerId::new(5), code(), "Five");
        let json = serde_json::to_string(&player).unwrap();
        let parsed: Player = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, player);
    }
}
