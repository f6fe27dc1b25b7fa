//! Core data models for the rank tracker.

mod characters;
mod connect_code;
mod ids;
mod leaderboard;
mod metrics;
mod player;
mod profile;
mod rank;
mod time;

pub use characters::*;
pub use connect_code::*;
pub use ids::*;
pub use leaderboard::*;
pub use metrics::*;
pub use player::*;
pub use profile::*;
pub use rank::*;
pub use time::*;
