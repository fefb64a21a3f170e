//! Risk listing, lookup and transition handlers

use crate::api::rest::state::AppState;
use crate::error::{ApiError, ApiResult};
use axum::{
    extract::{Path, Query, State},
    Json,
};
use risk_types::{
    MilestoneId, Risk, RiskFilter, RiskHistoryEntry, RiskId, RiskListing, RiskStatus, Severity,
};
use serde::Deserialize;

/// Query parameters for listings
#[derive(Debug, Default, Deserialize)]
pub struct ListRisksParams {
    pub milestone_id: Option<String>,
    pub status: Option<String>,
    pub severity: Option<String>,
    pub limit: Option<usize>,
}

/// Status change request
#[derive(Debug, Deserialize)]
pub struct SetStatusRequest {
    pub status: String,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub actor: Option<String>,
}

const DEFAULT_ACTOR: &str = "api";

/// List risks with a summary of open risks
pub async fn list_risks(
    State(state): State<AppState>,
    Query(params): Query<ListRisksParams>,
) -> ApiResult<Json<RiskListing>> {
    let filter = RiskFilter {
        milestone_id: params.milestone_id.map(MilestoneId::new),
        status: params
            .status
            .as_deref()
            .map(str::parse::<RiskStatus>)
            .transpose()
            .map_err(|e| ApiError::BadRequest(e.to_string()))?,
        severity: params
            .severity
            .as_deref()
            .map(str::parse::<Severity>)
            .transpose()
            .map_err(|e| ApiError::BadRequest(e.to_string()))?,
    };
    let limit = state.query.effective_limit(params.limit);

    let listing = state.engine.get_risks(&filter, limit).await?;
    Ok(Json(listing))
}

/// Get a specific risk
pub async fn get_risk(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Risk>> {
    let risk = state.engine.get_risk(parse_risk_id(&id)?).await?;
    Ok(Json(risk))
}

/// Audit trail of a risk, oldest first
pub async fn risk_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<RiskHistoryEntry>>> {
    let history = state.engine.risk_history(parse_risk_id(&id)?).await?;
    Ok(Json(history))
}

/// Manually transition a risk
pub async fn set_risk_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<SetStatusRequest>,
) -> ApiResult<Json<Risk>> {
    let risk_id = parse_risk_id(&id)?;
    let status: RiskStatus = req
        .status
        .parse()
        .map_err(|e: risk_types::ParseEnumError| ApiError::BadRequest(e.to_string()))?;
    let actor = req
        .actor
        .as_deref()
        .filter(|actor| !actor.trim().is_empty())
        .unwrap_or(DEFAULT_ACTOR);

    let risk = state
        .engine
        .set_risk_status(risk_id, status, req.note, actor)
        .await?;
    Ok(Json(risk))
}

fn parse_risk_id(id: &str) -> ApiResult<RiskId> {
    id.parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid risk id: {}", id)))
}
