//! API Router configuration

use super::handlers;
use super::state::AppState;
use crate::config::ServerConfig;
use axum::{
    routing::{get, post, put},
    Router,
};
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Create the main API router
pub fn create_router(state: AppState, server: &ServerConfig) -> Router {
    let api_routes = Router::new()
        // Health
        .route("/health", get(handlers::health_check))
        // Analysis
        .route("/analysis/run", post(handlers::run_analysis))
        .route("/analysis/trigger", post(handlers::trigger_analysis))
        // Risks
        .route("/risks", get(handlers::list_risks))
        .route("/risks/:id", get(handlers::get_risk))
        .route("/risks/:id/history", get(handlers::risk_history))
        .route("/risks/:id/status", put(handlers::set_risk_status));

    let router = Router::new()
        .nest("/api/v1", api_routes)
        .layer(TimeoutLayer::new(Duration::from_secs(
            server.request_timeout_secs,
        )))
        .layer(TraceLayer::new_for_http());

    let router = if server.enable_cors {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        router
    };

    router.with_state(state)
}
