use sqlx::types::Json;
use sqlx::PgPool;

use crate::models::{AttributionRecord, AttributionResult};

pub async fn insert_attribution(pool: &PgPool, result: &AttributionResult) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO attribution_results
            (decision_id, evaluation_date, actual_return, expected_return, annualized_return, contributions, fit_status)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id
        "#,
    )
    .bind(result.decision_id)
    .bind(result.evaluation_date)
    .bind(result.actual_return)
    .bind(result.expected_return)
    .bind(result.annualized_return)
    .bind(Json(&result.contributions))
    .bind(result.fit_status.as_str())
    .fetch_one(pool)
    .await
}

/// Attribution history of one decision, newest first.
pub async fn attributions_for_decision(pool: &PgPool, decision_id: i64) -> Result<Vec<AttributionRecord>, sqlx::Error> {
    sqlx::query_as::<_, AttributionRecord>(
        r#"
        SELECT id, decision_id, evaluation_date, actual_return, expected_return,
               annualized_return, contributions, fit_status
        FROM attribution_results
        WHERE decision_id = $1
        ORDER BY evaluation_date DESC, id DESC
        "#,
    )
    .bind(decision_id)
    .fetch_all(pool)
    .await
}
