use chrono::NaiveDate;
use sqlx::PgPool;

use crate::models::{CreateEconomicIndicator, EconomicIndicator, InsertOutcome};

/// Insert or replace the value for (name, country, date).
pub async fn upsert_indicator(pool: &PgPool, row: &CreateEconomicIndicator) -> Result<InsertOutcome, sqlx::Error> {
    // xmax is zero only for a freshly inserted tuple
    let inserted = sqlx::query_scalar::<_, bool>(
        r#"
        INSERT INTO economic_indicators (name, category, value, unit, country, date, source)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (name, country, date) DO UPDATE SET
            value = EXCLUDED.value,
            source = EXCLUDED.source,
            category = EXCLUDED.category,
            unit = EXCLUDED.unit,
            updated_at = NOW()
        RETURNING (xmax = 0) AS inserted
        "#,
    )
    .bind(&row.name)
    .bind(&row.category)
    .bind(row.value)
    .bind(&row.unit)
    .bind(&row.country)
    .bind(row.date)
    .bind(&row.source)
    .fetch_one(pool)
    .await?;

    Ok(if inserted { InsertOutcome::Inserted } else { InsertOutcome::Replaced })
}

/// Insert only when no row exists for (name, country, date).
pub async fn insert_indicator_if_absent(
    pool: &PgPool,
    row: &CreateEconomicIndicator,
) -> Result<Option<InsertOutcome>, sqlx::Error> {
    let id = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO economic_indicators (name, category, value, unit, country, date, source)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (name, country, date) DO NOTHING
        RETURNING id
        "#,
    )
    .bind(&row.name)
    .bind(&row.category)
    .bind(row.value)
    .bind(&row.unit)
    .bind(&row.country)
    .bind(row.date)
    .bind(&row.source)
    .fetch_optional(pool)
    .await?;

    Ok(id.map(|_| InsertOutcome::Inserted))
}

pub async fn fetch_series(
    pool: &PgPool,
    name: &str,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<EconomicIndicator>, sqlx::Error> {
    sqlx::query_as::<_, EconomicIndicator>(
        r#"
        SELECT id, name, category, value, unit, country, date, source
        FROM economic_indicators
        WHERE name = $1 AND date >= $2 AND date <= $3
        ORDER BY date ASC
        "#,
    )
    .bind(name)
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await
}

/// Last observation on or before `date`.
pub async fn latest_on_or_before(
    pool: &PgPool,
    name: &str,
    date: NaiveDate,
) -> Result<Option<EconomicIndicator>, sqlx::Error> {
    sqlx::query_as::<_, EconomicIndicator>(
        r#"
        SELECT id, name, category, value, unit, country, date, source
        FROM economic_indicators
        WHERE name = $1 AND date <= $2
        ORDER BY date DESC
        LIMIT 1
        "#,
    )
    .bind(name)
    .bind(date)
    .fetch_optional(pool)
    .await
}
