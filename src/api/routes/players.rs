use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use crate::api::state::AppState;
use crate::api::ApiError;
use crate::models::{Metric, MetricRecord, Player, PlayerId};

#[derive(Debug, Serialize)]
pub struct PlayerListResponse {
    pub players: Vec<Player>,
}

pub async fn list_players(
    State(state): State<AppState>,
) -> Result<Json<PlayerListResponse>, ApiError> {
    Ok(Json(PlayerListResponse {
        players: state.store.players()?,
    }))
}

#[derive(Debug, Serialize)]
pub struct PlayerResponse {
    #[serde(flatten)]
    pub player: Player,

    pub profile_url: String,

    /// Position in the latest cached leaderboard listing the player, 0 if
    /// none does
    pub latest_position: u32,
}

const PROFILE_BASE: &str = "https://slippi.gg/user";

fn parse_player_id(id: &str) -> Result<PlayerId, ApiError> {
    id.parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid player id: {}", id)))
}

pub async fn get_player(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PlayerResponse>, ApiError> {
    let player_id = parse_player_id(&id)?;
    let player = state
        .store
        .player(player_id)?
        .ok_or_else(|| ApiError::NotFound(format!("Player {}", player_id)))?;

    Ok(Json(PlayerResponse {
        profile_url: format!("{}/{}", PROFILE_BASE, player.connect_code.to_url_slug()),
        latest_position: state.assembler.latest_position(player_id)?,
        player,
    }))
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub player_id: PlayerId,
    pub metric: Metric,
    pub records: Vec<MetricRecord>,
}

pub async fn get_history(
    State(state): State<AppState>,
    Path((id, metric)): Path<(String, String)>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let player_id = parse_player_id(&id)?;
    let metric: Metric = metric.parse().map_err(ApiError::BadRequest)?;

    if state.store.player(player_id)?.is_none() {
        return Err(ApiError::NotFound(format!("Player {}", player_id)));
    }

    Ok(Json(HistoryResponse {
        player_id,
        metric,
        records: state.store.history(player_id, metric)?,
    }))
}

#[cfg(test)]
mod tests {
    use crate::api::build_router;
    use crate::api::routes::test_support::*;
    use crate::models::{MetricRecord, MetricValue, PlayerId};
    use crate::sync::slippi::scripted::ScriptedProfiles;
    use axum::http::StatusCode;
    use std::sync::Arc;

    fn app() -> axum::Router {
        let record = |at: &str, wins: u32| {
            MetricRecord::new(
                PlayerId::new(1),
                t(at),
                MetricValue::WinLoss { wins, losses: 1 },
            )
        };
        build_router(setup_state(
            vec![played(1, "AAA#1")],
            vec![record("2024-06-02", 4), record("2024-06-01", 2)],
            Arc::new(ScriptedProfiles::new()),
        ))
    }

    #[tokio::test]
    async fn test_history_ordered() {
        let (status, json) = get_json(app(), "/api/players/1/history/win_loss").await;
        assert_eq!(status, StatusCode::OK);
        let records = json["records"].as_array().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["wins"], 2);
        assert_eq!(records[1]["wins"], 4);
    }

    #[tokio::test]
    async fn test_history_empty_metric() {
        let (status, json) = get_json(app(), "/api/players/1/history/elo").await;
        assert_eq!(status, StatusCode::OK);
        assert!(json["records"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_history_unknown_player() {
        let (status, _) = get_json(app(), "/api/players/9/history/elo").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_history_bad_metric() {
        let (status, _) = get_json(app(), "/api/players/1/history/mmr").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_list_players() {
        let (status, json) = get_json(app(), "/api/players").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["players"][0]["connect_code"], "AAA#1");
    }

    #[tokio::test]
    async fn test_player_latest_position() {
        let state = setup_state(
            vec![played(1, "AAA#1"), played(2, "BBB#2")],
            vec![
                MetricRecord::new(PlayerId::new(1), t("2024-06-01"), MetricValue::Elo { elo: 1200.0 }),
                MetricRecord::new(PlayerId::new(2), t("2024-06-01"), MetricValue::Elo { elo: 1800.0 }),
            ],
            Arc::new(ScriptedProfiles::new()),
        );
        let app = build_router(state.clone());

        let (status, json) = get_json(app.clone(), "/api/players/1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["connect_code"], "AAA#1");
        assert_eq!(json["profile_url"], "https://slippi.gg/user/AAA-1");
        assert_eq!(json["latest_position"], 0);

        state.assembler.snapshot(t("2024-06-01")).unwrap();
        let (_, json) = get_json(app, "/api/players/1").await;
        assert_eq!(json["latest_position"], 2);
    }

    #[tokio::test]
    async fn test_player_unknown_and_invalid() {
        let (status, _) = get_json(app(), "/api/players/9").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = get_json(app(), "/api/players/abc").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
