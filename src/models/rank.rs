//! Rank bands.

use serde::{Deserialize, Serialize};

/// Rank label, ordered from lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Rank {
    Bronze1,
    Bronze2,
    Bronze3,
    Silver1,
    Silver2,
    Silver3,
    Gold1,
    Gold2,
    Gold3,
    Platinum1,
    Platinum2,
    Platinum3,
    Diamond1,
    Diamond2,
    Diamond3,
    Master1,
    Master2,
    Master3,
    Grandmaster,
}

/// Lower bound (inclusive) of each rating band. A band ends where the next
/// one starts; the last band is unbounded above.
const RATING_BANDS: &[(f64, Rank)] = &[
    (0.0, Rank::Bronze1),
    (765.43, Rank::Bronze2),
    (913.72, Rank::Bronze3),
    (1054.87, Rank::Silver1),
    (1188.88, Rank::Silver2),
    (1315.75, Rank::Silver3),
    (1435.48, Rank::Gold1),
    (1548.07, Rank::Gold2),
    (1653.52, Rank::Gold3),
    (1751.83, Rank::Platinum1),
    (1843.0, Rank::Platinum2),
    (1927.03, Rank::Platinum3),
    (2003.92, Rank::Diamond1),
    (2073.67, Rank::Diamond2),
    (2136.28, Rank::Diamond3),
    (2191.75, Rank::Master1),
    (2275.0, Rank::Master2),
    (2350.0, Rank::Master3),
];

impl Rank {
    /// Pick the band containing `rating`.
    ///
    /// Ratings below zero (or NaN) clamp to the lowest band.
    pub fn from_rating(rating: f64) -> Self {
        RATING_BANDS
            .iter()
            .rev()
            .find(|(lower, _)| rating >= *lower)
            .map(|(_, rank)| *rank)
            .unwrap_or(Rank::Bronze1)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Rank::Bronze1 => "Bronze 1",
            Rank::Bronze2 => "Bronze 2",
            Rank::Bronze3 => "Bronze 3",
            Rank::Silver1 => "Silver 1",
            Rank::Silver2 => "Silver 2",
            Rank::Silver3 => "Silver 3",
            Rank::Gold1 => "Gold 1",
            Rank::Gold2 => "Gold 2",
            Rank::Gold3 => "Gold 3",
            Rank::Platinum1 => "Platinum 1",
            Rank::Platinum2 => "Platinum 2",
            Rank::Platinum3 => "Platinum 3",
            Rank::Diamond1 => "Diamond 1",
            Rank::Diamond2 => "Diamond 2",
            Rank::Diamond3 => "Diamond 3",
            Rank::Master1 => "Master 1",
            Rank::Master2 => "Master 2",
            Rank::Master3 => "Master 3",
            Rank::Grandmaster => "Grandmaster",
        }
    }
}

impl std::fmt::Display for Rank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}
