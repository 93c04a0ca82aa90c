//! HTTP API server
//!
//! A thin wrapper over [`RecommenderFacade`]; handlers contain no
//! recommendation logic.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod handlers;
pub mod state;

pub use state::AppState;

/// Build the API router using the provided application state
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .nest(
            "/v1",
            Router::new()
                .route(
                    "/users/:user_id/recommendations",
                    get(handlers::recommendations),
                )
                .route("/users/:user_id/refresh", post(handlers::refresh_profile))
                .route("/recommendations/by-titles", post(handlers::by_titles)),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
