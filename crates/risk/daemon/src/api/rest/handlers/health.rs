//! Health handler

use crate::api::rest::state::AppState;
use axum::{extract::State, Json};
use risk_types::RunReport;
use serde::Serialize;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthCheckResponse {
    pub status: String,
    pub version: String,
    pub uptime: String,
    pub scheduler_running: bool,
    pub last_run: Option<RunReport>,
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthCheckResponse> {
    Json(HealthCheckResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
        uptime: state.uptime(),
        scheduler_running: state.scheduler.is_running().await,
        last_run: state.scheduler.last_report().await,
    })
}
