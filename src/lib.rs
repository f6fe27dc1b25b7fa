//! # Rank Tracker
//!
//! Tracks Slippi ranked statistics for a set of players over time.
//!
//! ## Architecture
//!
//! - **models**: Core data structures (players, metric records, ranks, etc.)
//! - **sync**: Ranked-profile client and the reconciliation engine
//! - **fetch**: Throttled HTTP client with raw response archiving
//! - **storage**: Append-only JSONL data lake and the time-series store
//! - **calculate**: Rank classification and leaderboard assembly
//! - **api**: REST API endpoints
//! - **config**: Configuration loading and validation

pub mod api;
pub mod calculate;
pub mod config;
pub mod fetch;
pub mod models;
pub mod storage;
pub mod sync;

pub use models::*;

use serde::Serialize;
use std::time::Duration;

/// How a failure should be handled, shared by every module's error type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Player or profile absent; the caller decides the fallback
    NotFound,

    /// Malformed input such as a bad connect code; never retried
    InvalidInput,

    /// Duplicate record or constraint violation; the step is rolled back
    StorageConflict,

    /// The store could not be read or written
    StorageUnavailable,

    /// The ranking service could not be reached; retried next pass
    UpstreamUnavailable,
}

/// Parse a human-friendly duration string (e.g., "6h", "30m", "90s").
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    let (num_str, multiplier) = if let Some(n) = s.strip_suffix('h') {
        (n, 3600)
    } else if let Some(n) = s.strip_suffix('m') {
        (n, 60)
    } else if let Some(n) = s.strip_suffix('s') {
        (n, 1)
    } else {
        // Default to seconds
        (s, 1)
    };

    let num: u64 = num_str.parse().ok()?;
    Some(Duration::from_secs(num * multiplier))
}
