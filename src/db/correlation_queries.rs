use chrono::NaiveDate;
use sqlx::PgPool;

use crate::models::EventCorrelation;

/// Store a category/indicator correlation; a rerun on the same day replaces it.
pub async fn upsert_correlation(pool: &PgPool, c: &EventCorrelation) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO event_correlations
            (event_category, indicator, as_of, status, coefficient, valid_samples, total_weight, strength,
             window_days, average_change, median_change, standard_deviation, t_statistic, p_value,
             direction, study_strength)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
        ON CONFLICT (event_category, indicator, as_of) DO UPDATE SET
            status = EXCLUDED.status,
            coefficient = EXCLUDED.coefficient,
            valid_samples = EXCLUDED.valid_samples,
            total_weight = EXCLUDED.total_weight,
            strength = EXCLUDED.strength,
            window_days = EXCLUDED.window_days,
            average_change = EXCLUDED.average_change,
            median_change = EXCLUDED.median_change,
            standard_deviation = EXCLUDED.standard_deviation,
            t_statistic = EXCLUDED.t_statistic,
            p_value = EXCLUDED.p_value,
            direction = EXCLUDED.direction,
            study_strength = EXCLUDED.study_strength,
            created_at = NOW()
        "#,
    )
    .bind(&c.event_category)
    .bind(&c.indicator)
    .bind(c.as_of)
    .bind(&c.status)
    .bind(c.coefficient)
    .bind(c.valid_samples)
    .bind(c.total_weight)
    .bind(&c.strength)
    .bind(c.window_days)
    .bind(c.average_change)
    .bind(c.median_change)
    .bind(c.standard_deviation)
    .bind(c.t_statistic)
    .bind(c.p_value)
    .bind(&c.direction)
    .bind(&c.study_strength)
    .execute(pool)
    .await?;

    Ok(())
}

/// The most recent correlation for each category/indicator pair computed on or
/// after `since`.
pub async fn latest_correlations(
    pool: &PgPool,
    since: NaiveDate,
    category: Option<&str>,
    indicator: Option<&str>,
) -> Result<Vec<EventCorrelation>, sqlx::Error> {
    sqlx::query_as::<_, EventCorrelation>(
        r#"
        SELECT DISTINCT ON (event_category, indicator)
               event_category, indicator, as_of, status, coefficient, valid_samples, total_weight,
               strength, window_days, average_change, median_change, standard_deviation,
               t_statistic, p_value, direction, study_strength, created_at
        FROM event_correlations
        WHERE as_of >= $1
          AND ($2::TEXT IS NULL OR event_category = $2)
          AND ($3::TEXT IS NULL OR indicator = $3)
        ORDER BY event_category, indicator, as_of DESC
        "#,
    )
    .bind(since)
    .bind(category)
    .bind(indicator)
    .fetch_all(pool)
    .await
}
