use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::state::AppState;
use crate::api::ApiError;
use crate::calculate::LeaderboardQuery;
use crate::models::{LeaderboardEntry, SnapshotTime};

#[derive(Debug, Deserialize)]
pub struct LeaderboardParams {
    /// Upper bound, RFC 3339 or `YYYY-MM-DD`
    pub until: Option<String>,
    pub since: Option<String>,

    /// Include never-played accounts
    pub all: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct LeaderboardResponse {
    pub as_of: Option<SnapshotTime>,
    pub total: usize,
    pub entries: Vec<LeaderboardEntry>,
}

fn parse_time(field: &str, value: Option<&str>) -> Result<Option<SnapshotTime>, ApiError> {
    value
        .map(|v| {
            SnapshotTime::parse(v)
                .ok_or_else(|| ApiError::BadRequest(format!("{}: not a timestamp: {}", field, v)))
        })
        .transpose()
}

pub async fn get_leaderboard(
    State(state): State<AppState>,
    Query(params): Query<LeaderboardParams>,
) -> Result<Json<LeaderboardResponse>, ApiError> {
    let mut query = LeaderboardQuery::default();
    query.until = parse_time("until", params.until.as_deref())?;
    if let Some(since) = parse_time("since", params.since.as_deref())? {
        query = query.since(since);
    }
    let show_all = params.all.unwrap_or(!state.hide_unplayed);
    query = query.show_unplayed(show_all);

    let entries = state.assembler.assemble(&query)?;
    Ok(Json(LeaderboardResponse {
        as_of: entries.first().map(|e| e.as_of),
        total: entries.len(),
        entries,
    }))
}
