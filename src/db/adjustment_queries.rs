use sqlx::PgPool;

use crate::models::{ModelAdjustment, ModelKind};

/// Store an adjustment; a rerun on the same day overwrites the earlier value.
pub async fn upsert_adjustment(pool: &PgPool, kind: ModelKind, adj: &ModelAdjustment) -> Result<(), sqlx::Error> {
    let sql = format!(
        r#"
        INSERT INTO {} (subject_symbol, date, factor_name, original_value, adjusted_value, reason, confidence, event_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (subject_symbol, date, factor_name) DO UPDATE SET
            original_value = EXCLUDED.original_value,
            adjusted_value = EXCLUDED.adjusted_value,
            reason = EXCLUDED.reason,
            confidence = EXCLUDED.confidence,
            event_id = EXCLUDED.event_id
        "#,
        kind.adjustment_table()
    );

    sqlx::query(&sql)
        .bind(&adj.subject_symbol)
        .bind(adj.date)
        .bind(&adj.factor_name)
        .bind(adj.original_value)
        .bind(adj.adjusted_value)
        .bind(&adj.reason)
        .bind(adj.confidence)
        .bind(adj.event_id)
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn adjustments_for_subject(
    pool: &PgPool,
    kind: ModelKind,
    subject: &str,
    limit: i64,
) -> Result<Vec<ModelAdjustment>, sqlx::Error> {
    let sql = format!(
        r#"
        SELECT subject_symbol, date, factor_name, original_value, adjusted_value, reason, confidence, event_id
        FROM {}
        WHERE subject_symbol = $1
        ORDER BY date DESC, factor_name ASC
        LIMIT $2
        "#,
        kind.adjustment_table()
    );

    sqlx::query_as::<_, ModelAdjustment>(&sql)
        .bind(subject)
        .bind(limit)
        .fetch_all(pool)
        .await
}
