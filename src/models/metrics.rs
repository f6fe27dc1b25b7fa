//! Time-series metric records.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{CharacterId, PlayerId, SnapshotTime};

/// Two ratings closer than this are the same rating.
pub const ELO_EPSILON: f64 = 1e-4;

/// Kinds of tracked metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Elo,
    WinLoss,
    RegionalPlacement,
    GlobalPlacement,
    CharacterUsage,
}

impl Metric {
    pub const ALL: [Metric; 5] = [
        Metric::Elo,
        Metric::WinLoss,
        Metric::RegionalPlacement,
        Metric::GlobalPlacement,
        Metric::CharacterUsage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Elo => "elo",
            Metric::WinLoss => "win_loss",
            Metric::RegionalPlacement => "regional_placement",
            Metric::GlobalPlacement => "global_placement",
            Metric::CharacterUsage => "character_usage",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "elo" => Ok(Metric::Elo),
            "win_loss" | "winloss" => Ok(Metric::WinLoss),
            "regional_placement" | "drp" => Ok(Metric::RegionalPlacement),
            "global_placement" | "dgp" => Ok(Metric::GlobalPlacement),
            "character_usage" | "characters" => Ok(Metric::CharacterUsage),
            other => Err(format!("unknown metric: {}", other)),
        }
    }
}

/// Value carried by a metric record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "metric", rename_all = "snake_case")]
pub enum MetricValue {
    Elo { elo: f64 },
    WinLoss { wins: u32, losses: u32 },
    RegionalPlacement { placement: u32 },
    GlobalPlacement { placement: u32 },
    CharacterUsage { character: CharacterId, game_count: u32 },
}

impl MetricValue {
    pub fn metric(&self) -> Metric {
        match self {
            MetricValue::Elo { .. } => Metric::Elo,
            MetricValue::WinLoss { .. } => Metric::WinLoss,
            MetricValue::RegionalPlacement { .. } => Metric::RegionalPlacement,
            MetricValue::GlobalPlacement { .. } => Metric::GlobalPlacement,
            MetricValue::CharacterUsage { .. } => Metric::CharacterUsage,
        }
    }

    /// Metric-specific equality: epsilon for ratings, exact otherwise.
    pub fn same_as(&self, other: &MetricValue) -> bool {
        match (self, other) {
            (MetricValue::Elo { elo: a }, MetricValue::Elo { elo: b }) => !elo_changed(*a, *b),
            _ => self == other,
        }
    }
}

/// Whether two ratings differ by more than [`ELO_EPSILON`].
pub fn elo_changed(stored: f64, incoming: f64) -> bool {
    (stored - incoming).abs() > ELO_EPSILON
}

/// Identifies one series: at most one record per series per timestamp.
///
/// Character usage is one series per character, since a snapshot records
/// the full set of characters at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SeriesKey {
    pub player_id: PlayerId,
    pub metric: Metric,
    pub character: Option<CharacterId>,
}

/// An immutable, append-only fact.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub player_id: PlayerId,
    pub recorded_at: SnapshotTime,
    #[serde(flatten)]
    pub value: MetricValue,
}

impl MetricRecord {
    pub fn new(player_id: PlayerId, recorded_at: SnapshotTime, value: MetricValue) -> Self {
        Self {
            player_id,
            recorded_at,
            value,
        }
    }

    pub fn metric(&self) -> Metric {
        self.value.metric()
    }

    pub fn series_key(&self) -> SeriesKey {
        let character = match self.value {
            MetricValue::CharacterUsage { character, .. } => Some(character),
            _ => None,
        };
        SeriesKey {
            player_id: self.player_id,
            metric: self.metric(),
            character,
        }
    }

    pub fn elo(&self) -> Option<f64> {
        match self.value {
            MetricValue::Elo { elo } => Some(elo),
            _ => None,
        }
    }

    pub fn win_loss(&self) -> Option<(u32, u32)> {
        match self.value {
            MetricValue::WinLoss { wins, losses } => Some((wins, losses)),
            _ => None,
        }
    }

    pub fn placement(&self) -> Option<u32> {
        match self.value {
            MetricValue::RegionalPlacement { placement }
            | MetricValue::GlobalPlacement { placement } => Some(placement),
            _ => None,
        }
    }

    pub fn character_usage(&self) -> Option<(CharacterId, u32)> {
        match self.value {
            MetricValue::CharacterUsage {
                character,
                game_count,
            } => Some((character, game_count)),
            _ => None,
        }
    }
}
