use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::db::adjustment_queries;
use crate::errors::AppError;
use crate::models::{ModelAdjustment, ModelKind};
use crate::routes::bounded_limit;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/:symbol", get(get_adjustments))
}

#[derive(Debug, Deserialize)]
pub struct AdjustmentQuery {
    /// Only one model's adjustments; both when absent
    model: Option<ModelKind>,
    limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct AdjustmentsResponse {
    pub symbol: String,
    pub dcf: Vec<ModelAdjustment>,
    pub commodity: Vec<ModelAdjustment>,
}

/// GET /api/adjustments/:symbol?model=dcf&limit=50
///
/// Stock symbols and commodity names share the path segment; commodity names
/// are matched as stored, so `AAPL` and `crude_oil` both work.
pub async fn get_adjustments(
    Path(symbol): Path<String>,
    Query(query): Query<AdjustmentQuery>,
    State(state): State<AppState>,
) -> Result<Json<AdjustmentsResponse>, AppError> {
    let limit = bounded_limit(query.limit, 50);
    let wants = |kind: ModelKind| query.model.map_or(true, |m| m == kind);

    let dcf = if wants(ModelKind::Dcf) {
        adjustment_queries::adjustments_for_subject(&state.pool, ModelKind::Dcf, &symbol.to_uppercase(), limit).await?
    } else {
        Vec::new()
    };
    let commodity = if wants(ModelKind::Commodity) {
        adjustment_queries::adjustments_for_subject(&state.pool, ModelKind::Commodity, &symbol, limit).await?
    } else {
        Vec::new()
    };

    Ok(Json(AdjustmentsResponse { symbol, dcf, commodity }))
}
