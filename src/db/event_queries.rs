use chrono::NaiveDate;
use sqlx::PgPool;

use crate::models::{CreateMacroEvent, EventImpact, EventSentiment, MacroEvent};

// ==============================================
// Events
// ==============================================

/// Create an event and link its articles in one transaction.
pub async fn create_event(pool: &PgPool, event: &CreateMacroEvent) -> Result<MacroEvent, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let created = sqlx::query_as::<_, MacroEvent>(
        r#"
        INSERT INTO macro_events (name, category, start_date, end_date, description, importance)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id, name, category, start_date, end_date, description, importance, created_at
        "#,
    )
    .bind(&event.name)
    .bind(&event.category)
    .bind(event.start_date)
    .bind(event.end_date)
    .bind(&event.description)
    .bind(event.importance)
    .fetch_one(&mut *tx)
    .await?;

    for (article_id, relevance) in &event.articles {
        sqlx::query(
            r#"
            INSERT INTO event_articles (event_id, article_id, relevance_score)
            VALUES ($1, $2, $3)
            ON CONFLICT (event_id, article_id) DO NOTHING
            "#,
        )
        .bind(created.id)
        .bind(article_id)
        .bind(relevance)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(created)
}

/// Attach articles to an existing event and widen its date range.
pub async fn extend_event(
    pool: &PgPool,
    event_id: i64,
    end_date: Option<NaiveDate>,
    importance: i32,
    articles: &[(i64, f64)],
) -> Result<u64, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let mut linked = 0;

    for (article_id, relevance) in articles {
        let result = sqlx::query(
            r#"
            INSERT INTO event_articles (event_id, article_id, relevance_score)
            VALUES ($1, $2, $3)
            ON CONFLICT (event_id, article_id) DO NOTHING
            "#,
        )
        .bind(event_id)
        .bind(article_id)
        .bind(relevance)
        .execute(&mut *tx)
        .await?;
        linked += result.rows_affected();
    }

    sqlx::query(
        r#"
        UPDATE macro_events
        SET end_date = GREATEST(COALESCE(end_date, start_date), COALESCE($2, start_date)),
            importance = GREATEST(importance, $3)
        WHERE id = $1
        "#,
    )
    .bind(event_id)
    .bind(end_date)
    .bind(importance)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(linked)
}

/// Latest event of a category that started on or after `since`.
pub async fn find_recent_event(
    pool: &PgPool,
    category: &str,
    since: NaiveDate,
) -> Result<Option<MacroEvent>, sqlx::Error> {
    sqlx::query_as::<_, MacroEvent>(
        r#"
        SELECT id, name, category, start_date, end_date, description, importance, created_at
        FROM macro_events
        WHERE category = $1 AND start_date >= $2
        ORDER BY start_date DESC, id DESC
        LIMIT 1
        "#,
    )
    .bind(category)
    .bind(since)
    .fetch_optional(pool)
    .await
}

pub async fn get_event(pool: &PgPool, event_id: i64) -> Result<Option<MacroEvent>, sqlx::Error> {
    sqlx::query_as::<_, MacroEvent>(
        r#"
        SELECT id, name, category, start_date, end_date, description, importance, created_at
        FROM macro_events
        WHERE id = $1
        "#,
    )
    .bind(event_id)
    .fetch_optional(pool)
    .await
}

pub async fn list_events(
    pool: &PgPool,
    since: NaiveDate,
    category: Option<&str>,
    limit: i64,
) -> Result<Vec<MacroEvent>, sqlx::Error> {
    sqlx::query_as::<_, MacroEvent>(
        r#"
        SELECT id, name, category, start_date, end_date, description, importance, created_at
        FROM macro_events
        WHERE start_date >= $1
          AND ($2::TEXT IS NULL OR category = $2)
        ORDER BY start_date DESC, id DESC
        LIMIT $3
        "#,
    )
    .bind(since)
    .bind(category)
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Events with the mean polarity of their linked articles, optionally limited
/// to one category, ordered oldest first.
pub async fn event_sentiments(
    pool: &PgPool,
    since: NaiveDate,
    until: NaiveDate,
    category: Option<&str>,
) -> Result<Vec<EventSentiment>, sqlx::Error> {
    sqlx::query_as::<_, EventSentiment>(
        r#"
        WITH latest AS (
            SELECT DISTINCT ON (article_id) article_id, polarity
            FROM sentiment_analysis
            ORDER BY article_id, analyzed_at DESC
        )
        SELECT e.id AS event_id, e.name, e.category, e.start_date, e.importance,
               AVG(l.polarity)::DOUBLE PRECISION AS avg_polarity,
               COUNT(ea.article_id) AS article_count
        FROM macro_events e
        LEFT JOIN event_articles ea ON ea.event_id = e.id
        LEFT JOIN latest l ON l.article_id = ea.article_id
        WHERE e.start_date >= $1 AND e.start_date <= $2
          AND ($3::TEXT IS NULL OR e.category = $3)
        GROUP BY e.id
        ORDER BY e.start_date ASC, e.id ASC
        "#,
    )
    .bind(since)
    .bind(until)
    .bind(category)
    .fetch_all(pool)
    .await
}


// ==============================================
// Impacts
// ==============================================

pub async fn upsert_impact(pool: &PgPool, impact: &EventImpact) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO event_impacts (event_id, impact_target, impact_type, impact_value, confidence, time_horizon)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (event_id, impact_target) DO UPDATE SET
            impact_type = EXCLUDED.impact_type,
            impact_value = EXCLUDED.impact_value,
            confidence = EXCLUDED.confidence,
            time_horizon = EXCLUDED.time_horizon,
            created_at = NOW()
        "#,
    )
    .bind(impact.event_id)
    .bind(&impact.impact_target)
    .bind(&impact.impact_type)
    .bind(impact.impact_value)
    .bind(impact.confidence)
    .bind(&impact.time_horizon)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn impacts_for_event(pool: &PgPool, event_id: i64) -> Result<Vec<EventImpact>, sqlx::Error> {
    sqlx::query_as::<_, EventImpact>(
        r#"
        SELECT event_id, impact_target, impact_type, impact_value, confidence, time_horizon
        FROM event_impacts
        WHERE event_id = $1
        ORDER BY impact_target
        "#,
    )
    .bind(event_id)
    .fetch_all(pool)
    .await
}

/// Impacts of events that started on or after `since`.
pub async fn impacts_since(pool: &PgPool, since: NaiveDate) -> Result<Vec<EventImpact>, sqlx::Error> {
    sqlx::query_as::<_, EventImpact>(
        r#"
        SELECT i.event_id, i.impact_target, i.impact_type, i.impact_value, i.confidence, i.time_horizon
        FROM event_impacts i
        JOIN macro_events e ON e.id = i.event_id
        WHERE e.start_date >= $1
        ORDER BY e.start_date, i.event_id, i.impact_target
        "#,
    )
    .bind(since)
    .fetch_all(pool)
    .await
}
