//! Convert gateway responses to model values.
//!
//! Bridges between the Slippi wire types and [`RankedProfile`], including
//! the mapping from upstream character names into internal character ids.

use tracing::warn;

use super::slippi::SlippiUser;
use crate::models::{get_character_id, CharacterUsage, RankedProfile, DEFAULT_ELO};

/// Normalize one user into a [`RankedProfile`].
///
/// A user without a ranked profile converts to an empty profile with no
/// `slippi_id`, which reconciliation skips. Unknown character names are
/// dropped.
pub fn to_ranked_profile(user: &SlippiUser) -> RankedProfile {
    let display_name = user.display_name.clone();

    let Some(ranked) = &user.ranked_netplay_profile else {
        return RankedProfile {
            slippi_id: None,
            display_name,
            rating: DEFAULT_ELO,
            wins: 0,
            losses: 0,
            regional_placement: 0,
            global_placement: None,
            characters: Vec::new(),
        };
    };

    let characters = ranked
        .characters
        .iter()
        .filter_map(|c| match get_character_id(&c.character, true) {
            Some(character) => Some(CharacterUsage {
                character,
                game_count: c.game_count,
            }),
            None => {
                warn!("Dropping unknown character {:?}", c.character);
                None
            }
        })
        .collect();

    RankedProfile {
        slippi_id: ranked.id.as_ref().map(|id| id.to_string()),
        display_name,
        rating: ranked.rating_ordinal.unwrap_or(DEFAULT_ELO),
        wins: ranked.wins.unwrap_or(0),
        losses: ranked.losses.unwrap_or(0),
        regional_placement: ranked.daily_regional_placement.unwrap_or(0),
        global_placement: ranked.daily_global_placement.filter(|p| *p != 0),
        characters,
    }
}
