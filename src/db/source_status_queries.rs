use sqlx::PgPool;

use crate::models::SourceType;

pub async fn record_success(pool: &PgPool, name: &str, source_type: SourceType) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO source_status (source_name, source_type, last_status, consecutive_failures, last_fetched_at)
        VALUES ($1, $2, 'ok', 0, NOW())
        ON CONFLICT (source_name, source_type) DO UPDATE SET
            last_status = 'ok',
            last_error = NULL,
            consecutive_failures = 0,
            last_fetched_at = NOW(),
            updated_at = NOW()
        "#,
    )
    .bind(name)
    .bind(source_type.as_str())
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn record_failure(
    pool: &PgPool,
    name: &str,
    source_type: SourceType,
    error: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO source_status (source_name, source_type, last_status, last_error, consecutive_failures)
        VALUES ($1, $2, 'failed', $3, 1)
        ON CONFLICT (source_name, source_type) DO UPDATE SET
            last_status = 'failed',
            last_error = EXCLUDED.last_error,
            consecutive_failures = source_status.consecutive_failures + 1,
            updated_at = NOW()
        "#,
    )
    .bind(name)
    .bind(source_type.as_str())
    .bind(error)
    .execute(pool)
    .await?;

    Ok(())
}
