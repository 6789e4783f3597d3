use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{Duration, Utc};
use serde::Deserialize;
use tracing::info;

use crate::db::correlation_queries;
use crate::errors::AppError;
use crate::models::EventCorrelation;
use crate::routes::bounded_days;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list_correlations))
}

#[derive(Debug, Deserialize)]
pub struct CorrelationQuery {
    /// Only correlations computed within this many days (default: 30)
    days: Option<i64>,
    category: Option<String>,
    indicator: Option<String>,
}

/// GET /api/correlations?days=30&category=monetary_policy&indicator=interest_rates
///
/// The latest result per category/indicator pair, including pairs that had
/// too few events for a coefficient.
pub async fn list_correlations(
    Query(query): Query<CorrelationQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<EventCorrelation>>, AppError> {
    let days = bounded_days(query.days, 30)?;
    let since = Utc::now().date_naive() - Duration::days(days);

    let correlations = correlation_queries::latest_correlations(
        &state.pool,
        since,
        query.category.as_deref(),
        query.indicator.as_deref(),
    )
    .await?;
    info!("GET /api/correlations - {} pairs since {}", correlations.len(), since);
    Ok(Json(correlations))
}
