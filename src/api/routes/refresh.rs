//! On-demand reconciliation.
//!
//! `POST /api/refresh` starts a pass in the background and returns at once;
//! progress and the last outcome are polled from `/api/refresh/status`.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::api::state::AppState;
use crate::api::ApiError;
use crate::models::PlayerId;
use crate::sync::SyncState;

#[derive(Debug, Deserialize)]
pub struct RefreshParams {
    /// Refresh a single player instead of everyone
    pub player: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct RefreshStarted {
    pub status: &'static str,
    pub player: Option<PlayerId>,
}

pub async fn start_refresh(
    State(state): State<AppState>,
    Query(params): Query<RefreshParams>,
) -> Result<(StatusCode, Json<RefreshStarted>), ApiError> {
    let player = params.player.map(PlayerId::new);
    let handle = state.orchestrator.trigger(player)?;

    tokio::spawn(async move {
        match handle.await {
            Ok(Ok(report)) => info!(
                "Refresh {} finished: {} records appended",
                report.run_id,
                report.records_appended()
            ),
            Ok(Err(e)) => warn!("Refresh failed: {}", e),
            Err(e) => warn!("Refresh task panicked: {}", e),
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(RefreshStarted {
            status: "started",
            player,
        }),
    ))
}

pub async fn refresh_status(State(state): State<AppState>) -> Json<SyncState> {
    Json(state.orchestrator.state().await)
}
