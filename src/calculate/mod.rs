//! Derived views over recorded history.
//!
//! - Rank classification from a rating
//! - Leaderboard assembly at a point in time

mod leaderboard;

pub use leaderboard::{LeaderboardAssembler, LeaderboardQuery};

use crate::models::Rank;

/// Classify a rating into a rank label.
///
/// Holding a regional placement means Grandmaster regardless of rating.
pub fn classify_rank(rating: f64, has_regional_placement: bool) -> Rank {
    if has_regional_placement {
        Rank::Grandmaster
    } else {
        Rank::from_rating(rating)
    }
}

/// Calculate win rate from wins/losses.
pub fn calculate_win_rate(wins: u32, losses: u32) -> f64 {
    let total = wins + losses;
    if total == 0 {
        0.0
    } else {
        wins as f64 / total as f64
    }
}
