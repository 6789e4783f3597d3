use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{Duration, Utc};
use serde::Deserialize;

use crate::db::{impact_queries, keyword_queries, sentiment_queries};
use crate::errors::AppError;
use crate::models::{CategoryImpact, SentimentTrendPoint, TrendInterval, TrendingKeyword};
use crate::routes::{bounded_days, bounded_limit};
use crate::state::AppState;

pub fn keywords_router() -> Router<AppState> {
    Router::new().route("/trending", get(trending_keywords))
}

pub fn sentiment_router() -> Router<AppState> {
    Router::new().route("/trend", get(sentiment_trend))
}

pub fn impacts_router() -> Router<AppState> {
    Router::new().route("/", get(category_impacts))
}

#[derive(Debug, Deserialize)]
pub struct TrendingQuery {
    days: Option<i64>,
    category: Option<String>,
    limit: Option<i64>,
}

/// GET /api/keywords/trending?days=7&category=trade_policy&limit=20
///
/// `days` defaults to the keyword filter's configured window.
pub async fn trending_keywords(
    Query(query): Query<TrendingQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<TrendingKeyword>>, AppError> {
    let days = bounded_days(query.days, state.config.analysis.keyword_filter.days_back)?;
    let limit = bounded_limit(query.limit, 20);
    let since = Utc::now() - Duration::days(days);

    let keywords = keyword_queries::trending_keywords(&state.pool, since, query.category.as_deref(), limit).await?;
    Ok(Json(keywords))
}

#[derive(Debug, Deserialize)]
pub struct TrendQuery {
    days: Option<i64>,
    #[serde(default)]
    interval: TrendInterval,
}

/// GET /api/sentiment/trend?days=30&interval=week
pub async fn sentiment_trend(
    Query(query): Query<TrendQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<SentimentTrendPoint>>, AppError> {
    let days = bounded_days(query.days, 30)?;
    let since = Utc::now() - Duration::days(days);
    let points = sentiment_queries::sentiment_trend(&state.pool, since, query.interval).await?;
    Ok(Json(points))
}

#[derive(Debug, Deserialize)]
pub struct ImpactQuery {
    days: Option<i64>,
    category: Option<String>,
}

/// GET /api/impacts?days=28&category=monetary_policy
///
/// Aggregated category windows ending within `days`, insufficient ones
/// included. `days` defaults to the span of the configured rolling windows.
pub async fn category_impacts(
    Query(query): Query<ImpactQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<CategoryImpact>>, AppError> {
    let quantitative = &state.config.analysis.quantitative;
    let default_days = quantitative.window_days * quantitative.rolling_windows as i64;
    let days = bounded_days(query.days, default_days)?;
    let today = Utc::now().date_naive();

    let impacts = impact_queries::category_impacts_between(
        &state.pool,
        today - Duration::days(days),
        today,
        query.category.as_deref(),
    )
    .await?;
    Ok(Json(impacts))
}
