//! Points on the shared snapshot time axis.

use chrono::{DateTime, NaiveDate, NaiveTime, SubsecRound, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single point on the shared time axis, truncated to whole seconds.
///
/// Every metric record references one of these; the store refuses records
/// whose timestamp was never registered.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotTime(DateTime<Utc>);

impl SnapshotTime {
    /// Truncate an instant to whole seconds.
    pub fn new(at: DateTime<Utc>) -> Self {
        Self(at.trunc_subsecs(0))
    }

    /// The current wall-clock time, truncated.
    pub fn now() -> Self {
        Self::new(Utc::now())
    }

    /// A fixed point predating all recorded data.
    pub fn epoch() -> Self {
        Self(Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap())
    }

    /// A snapshot at `time` (UTC) on `date`.
    pub fn at(date: NaiveDate, time: NaiveTime) -> Self {
        Self::new(date.and_time(time).and_utc())
    }

    /// Get the underlying instant.
    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }

    /// Parse either RFC 3339 or `YYYY-MM-DD` (midnight UTC).
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Some(Self::new(dt.with_timezone(&Utc)));
        }
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .ok()
            .map(|d| Self::at(d, NaiveTime::MIN))
    }
}

impl fmt::Display for SnapshotTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d %H:%M:%S"))
    }
}

impl fmt::Debug for SnapshotTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SnapshotTime({})", self)
    }
}

impl From<DateTime<Utc>> for SnapshotTime {
    fn from(at: DateTime<Utc>) -> Self {
        Self::new(at)
    }
}

/// Inclusive time window `[since, until]` used by range queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub since: SnapshotTime,
    pub until: Option<SnapshotTime>,
}

impl TimeWindow {
    /// Everything ever recorded, including backfilled history older than
    /// [`SnapshotTime::epoch`].
    pub fn all() -> Self {
        Self::through(None)
    }

    /// Everything recorded at or before `until`.
    pub fn until(until: SnapshotTime) -> Self {
        Self::through(Some(until))
    }

    /// Everything at or before `until`, with no lower bound at all.
    pub fn through(until: Option<SnapshotTime>) -> Self {
        Self {
            since: SnapshotTime(DateTime::<Utc>::MIN_UTC),
            until,
        }
    }

    pub fn between(since: SnapshotTime, until: SnapshotTime) -> Self {
        Self {
            since,
            until: Some(until),
        }
    }

    /// Whether `at` falls inside the window.
    pub fn contains(&self, at: SnapshotTime) -> bool {
        at >= self.since && self.until.map_or(true, |u| at <= u)
    }
}

impl Default for TimeWindow {
    fn default() -> Self {
        Self::all()
    }
}
