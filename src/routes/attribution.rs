use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::db::{attribution_queries, decision_queries};
use crate::errors::AppError;
use crate::models::{AttributionRecord, InvestmentDecision};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/:decision_id", get(get_attribution))
}

#[derive(Debug, Serialize)]
pub struct AttributionResponse {
    pub decision: InvestmentDecision,
    /// Newest first
    pub attributions: Vec<AttributionRecord>,
}

/// GET /api/attribution/:decision_id
pub async fn get_attribution(
    Path(decision_id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<AttributionResponse>, AppError> {
    let decision = decision_queries::get_decision(&state.pool, decision_id)
        .await?
        .ok_or(AppError::NotFound)?;
    let attributions = attribution_queries::attributions_for_decision(&state.pool, decision_id).await?;
    Ok(Json(AttributionResponse { decision, attributions }))
}
