//! Canonical shape of one ranked-profile fetch.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::CharacterId;

/// Games played on one character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterUsage {
    pub character: CharacterId,
    pub game_count: u32,
}

/// A normalized ranked profile. Transient: produced by the adapter,
/// consumed once by the reconciliation engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedProfile {
    /// Account id on the ranking service; empty profiles carry none
    pub slippi_id: Option<String>,
    pub display_name: Option<String>,
    pub rating: f64,
    pub wins: u32,
    pub losses: u32,

    /// 0 when unranked for the day
    pub regional_placement: u32,

    /// `None` when the service reports no placement
    pub global_placement: Option<u32>,

    /// In the order the service reported them
    pub characters: Vec<CharacterUsage>,
}

impl RankedProfile {
    /// Character usage as a mapping, for order-insensitive comparison.
    pub fn character_map(&self) -> HashMap<CharacterId, u32> {
        self.characters
            .iter()
            .map(|c| (c.character, c.game_count))
            .collect()
    }

    /// Most played character; ties go to whichever was listed first.
    pub fn main_character(&self) -> Option<CharacterId> {
        let mut best: Option<&CharacterUsage> = None;
        for usage in &self.characters {
            if best.map_or(true, |b| usage.game_count > b.game_count) {
                best = Some(usage);
            }
        }
        best.map(|b| b.character)
    }
}
