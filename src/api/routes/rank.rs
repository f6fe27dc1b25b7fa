use axum::extract::Query;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::ApiError;
use crate::calculate::classify_rank;
use crate::models::Rank;

#[derive(Debug, Deserialize)]
pub struct RankParams {
    pub rating: f64,

    /// Currently holds a regional placement
    #[serde(default)]
    pub regional: bool,
}

#[derive(Debug, Serialize)]
pub struct RankResponse {
    pub rating: f64,
    pub rank: Rank,
    pub label: &'static str,
}

pub async fn get_rank(Query(params): Query<RankParams>) -> Result<Json<RankResponse>, ApiError> {
    if !params.rating.is_finite() {
        return Err(ApiError::BadRequest("rating must be a finite number".to_string()));
    }
    let rank = classify_rank(params.rating, params.regional);
    Ok(Json(RankResponse {
        rating: params.rating,
        rank,
        label: rank.label(),
    }))
}
