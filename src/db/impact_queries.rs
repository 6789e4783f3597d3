use chrono::NaiveDate;
use sqlx::{FromRow, PgPool};

use crate::models::{AggregateStatus, CategoryImpact};

#[derive(Debug, FromRow)]
struct CategoryImpactRow {
    category: String,
    window_start: NaiveDate,
    window_end: NaiveDate,
    status: String,
    impact_score: Option<f64>,
    confidence: Option<f64>,
    mean_polarity: Option<f64>,
    included: i32,
    excluded: i32,
}

impl From<CategoryImpactRow> for CategoryImpact {
    fn from(row: CategoryImpactRow) -> Self {
        CategoryImpact {
            category: row.category,
            window_start: row.window_start,
            window_end: row.window_end,
            status: AggregateStatus::from_str(&row.status).unwrap_or(AggregateStatus::Insufficient),
            impact_score: row.impact_score,
            confidence: row.confidence,
            mean_polarity: row.mean_polarity,
            included: row.included.max(0) as usize,
            excluded: row.excluded.max(0) as usize,
        }
    }
}

// ==============================================
// Category impacts
// ==============================================

/// Store one aggregated window; re-aggregating the same window replaces it.
pub async fn upsert_category_impact(pool: &PgPool, impact: &CategoryImpact) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO category_impacts
            (category, window_start, window_end, status, impact_score, confidence, mean_polarity, included, excluded)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ON CONFLICT (category, window_start, window_end) DO UPDATE SET
            status = EXCLUDED.status,
            impact_score = EXCLUDED.impact_score,
            confidence = EXCLUDED.confidence,
            mean_polarity = EXCLUDED.mean_polarity,
            included = EXCLUDED.included,
            excluded = EXCLUDED.excluded,
            updated_at = NOW()
        "#,
    )
    .bind(&impact.category)
    .bind(impact.window_start)
    .bind(impact.window_end)
    .bind(impact.status.as_str())
    .bind(impact.impact_score)
    .bind(impact.confidence)
    .bind(impact.mean_polarity)
    .bind(impact.included as i32)
    .bind(impact.excluded as i32)
    .execute(pool)
    .await?;

    Ok(())
}

/// Windows ending inside `[from, to]`, oldest first.
pub async fn category_impacts_between(
    pool: &PgPool,
    from: NaiveDate,
    to: NaiveDate,
    category: Option<&str>,
) -> Result<Vec<CategoryImpact>, sqlx::Error> {
    let rows = sqlx::query_as::<_, CategoryImpactRow>(
        r#"
        SELECT category, window_start, window_end, status, impact_score, confidence,
               mean_polarity, included, excluded
        FROM category_impacts
        WHERE window_end >= $1 AND window_end <= $2
          AND ($3::TEXT IS NULL OR category = $3)
        ORDER BY window_end ASC, category ASC
        "#,
    )
    .bind(from)
    .bind(to)
    .bind(category)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(CategoryImpact::from).collect())
}
