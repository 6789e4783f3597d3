use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::db::event_queries;
use crate::errors::AppError;
use crate::models::{EventImpact, MacroEvent};
use crate::routes::{bounded_days, bounded_limit};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_events))
        .route("/:id/impacts", get(get_event_impacts))
}

#[derive(Debug, Deserialize)]
pub struct EventQuery {
    /// Events that started within this many days (default: 30)
    days: Option<i64>,
    category: Option<String>,
    limit: Option<i64>,
}

/// GET /api/events?days=30&category=monetary_policy&limit=50
pub async fn list_events(
    Query(query): Query<EventQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<MacroEvent>>, AppError> {
    let days = bounded_days(query.days, 30)?;
    let limit = bounded_limit(query.limit, 50);
    let since = Utc::now().date_naive() - Duration::days(days);

    let events = event_queries::list_events(&state.pool, since, query.category.as_deref(), limit).await?;
    info!("GET /api/events - {} events since {}", events.len(), since);
    Ok(Json(events))
}

#[derive(Debug, Serialize)]
pub struct EventImpactsResponse {
    pub event: MacroEvent,
    pub impacts: Vec<EventImpact>,
}

/// GET /api/events/:id/impacts
pub async fn get_event_impacts(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<EventImpactsResponse>, AppError> {
    let event = event_queries::get_event(&state.pool, id)
        .await?
        .ok_or(AppError::NotFound)?;
    let impacts = event_queries::impacts_for_event(&state.pool, id).await?;
    Ok(Json(EventImpactsResponse { event, impacts }))
}
