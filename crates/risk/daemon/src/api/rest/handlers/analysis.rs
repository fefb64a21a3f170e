//! Analysis run handlers

use crate::api::rest::state::AppState;
use crate::error::{ApiError, ApiResult};
use axum::{body::Bytes, extract::State, http::StatusCode, Json};
use risk_types::{MilestoneId, RunReport, ScopeFilter};
use serde::{Deserialize, Serialize};

/// Run request; no body or an empty list analyzes the whole portfolio
#[derive(Debug, Default, Deserialize)]
pub struct RunAnalysisRequest {
    #[serde(default)]
    pub milestone_ids: Vec<String>,
}

impl RunAnalysisRequest {
    fn scope(self) -> ScopeFilter {
        ScopeFilter::milestones(self.milestone_ids.into_iter().map(MilestoneId::new))
    }
}

/// An empty body selects the whole portfolio; anything else must parse.
fn request_scope(body: &Bytes) -> ApiResult<ScopeFilter> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(ScopeFilter::all());
    }
    let request: RunAnalysisRequest = serde_json::from_slice(body)
        .map_err(|e| ApiError::BadRequest(format!("invalid run request: {e}")))?;
    Ok(request.scope())
}

/// Queued run response
#[derive(Debug, Serialize)]
pub struct TriggerAnalysisResponse {
    pub queued: bool,
}

/// Run analysis synchronously and return its report
pub async fn run_analysis(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<RunReport>> {
    let scope = request_scope(&body)?;
    let report = state.scheduler.run_analysis(&scope).await?;
    Ok(Json(report))
}

/// Queue a run on the scheduler and return immediately
pub async fn trigger_analysis(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<TriggerAnalysisResponse>)> {
    let scope = request_scope(&body)?;
    if !state.scheduler.trigger_analysis(scope) {
        return Err(ApiError::Unavailable(
            "analysis queue is full or the scheduler has stopped".to_string(),
        ));
    }
    Ok((
        StatusCode::ACCEPTED,
        Json(TriggerAnalysisResponse { queued: true }),
    ))
}
