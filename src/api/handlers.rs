//! API handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::api::AppState;

fn default_top_n() -> usize {
    10
}

/// Health check with system status
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let indexed_profiles = state.facade.indexed_profiles().await;

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        catalog_items: state.facade.catalog_size(),
        indexed_profiles,
    })
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub catalog_items: usize,
    pub indexed_profiles: usize,
}

#[derive(Debug, Deserialize)]
pub struct RecommendationParams {
    #[serde(default)]
    pub strategy: Strategy,
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    #[default]
    Content,
    Collaborative,
}

/// Per-user recommendations using either strategy
pub async fn recommendations(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(params): Query<RecommendationParams>,
) -> Result<Json<RecommendationResponse>, (StatusCode, String)> {
    let titles = match params.strategy {
        Strategy::Content => state
            .facade
            .recommend_with_content_based(&user_id, params.top_n)
            .await,
        Strategy::Collaborative => state
            .facade
            .recommend_with_collaborative_filtering(&user_id, params.top_n)
            .await,
    }
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(Json(RecommendationResponse { user_id, titles }))
}

#[derive(Debug, Serialize)]
pub struct RecommendationResponse {
    pub user_id: String,
    pub titles: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ByTitlesRequest {
    pub titles: Vec<String>,
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

/// Recommendations seeded by explicit titles
pub async fn by_titles(
    State(state): State<AppState>,
    Json(payload): Json<ByTitlesRequest>,
) -> Result<Json<ByTitlesResponse>, (StatusCode, String)> {
    if payload.titles.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "'titles' must contain at least one title".to_string(),
        ));
    }

    let titles = state
        .facade
        .recommend_by_titles(&payload.titles, payload.top_n)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(Json(ByTitlesResponse { titles }))
}

#[derive(Debug, Serialize)]
pub struct ByTitlesResponse {
    pub titles: Vec<String>,
}

/// Schedule an asynchronous profile refresh for a user
pub async fn refresh_profile(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> (StatusCode, Json<RefreshResponse>) {
    state.facade.schedule_profile_refresh(&user_id);

    (
        StatusCode::ACCEPTED,
        Json(RefreshResponse {
            user_id,
            scheduled: true,
        }),
    )
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub user_id: String,
    pub scheduled: bool,
}
