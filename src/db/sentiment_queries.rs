use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::models::{DatedSentiment, SentimentResult, SentimentTrendPoint, TrendInterval};

/// Re-scoring within the same run replaces the earlier row.
pub async fn upsert_sentiment(pool: &PgPool, result: &SentimentResult) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO sentiment_analysis (article_id, run_id, polarity, subjectivity, confidence, quality)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (article_id, run_id) DO UPDATE SET
            polarity = EXCLUDED.polarity,
            subjectivity = EXCLUDED.subjectivity,
            confidence = EXCLUDED.confidence,
            quality = EXCLUDED.quality,
            analyzed_at = NOW()
        "#,
    )
    .bind(result.article_id)
    .bind(result.run_id)
    .bind(result.polarity)
    .bind(result.subjectivity)
    .bind(result.confidence)
    .bind(&result.quality)
    .execute(pool)
    .await?;

    Ok(())
}

/// Most recent sentiment per article published since `since`.
pub async fn latest_sentiment_since(pool: &PgPool, since: DateTime<Utc>) -> Result<Vec<DatedSentiment>, sqlx::Error> {
    sqlx::query_as::<_, DatedSentiment>(
        r#"
        SELECT DISTINCT ON (s.article_id)
               s.article_id, a.published_date, s.polarity, s.subjectivity, s.confidence
        FROM sentiment_analysis s
        JOIN news_articles a ON a.id = s.article_id
        WHERE a.published_date >= $1
        ORDER BY s.article_id, s.analyzed_at DESC
        "#,
    )
    .bind(since)
    .fetch_all(pool)
    .await
}

pub async fn sentiment_trend(
    pool: &PgPool,
    since: DateTime<Utc>,
    interval: TrendInterval,
) -> Result<Vec<SentimentTrendPoint>, sqlx::Error> {
    sqlx::query_as::<_, SentimentTrendPoint>(
        r#"
        WITH latest AS (
            SELECT DISTINCT ON (s.article_id)
                   s.article_id, a.published_date, s.polarity, s.subjectivity
            FROM sentiment_analysis s
            JOIN news_articles a ON a.id = s.article_id
            WHERE a.published_date >= $1
            ORDER BY s.article_id, s.analyzed_at DESC
        )
        SELECT date_trunc($2, published_date) AS period,
               AVG(polarity)::DOUBLE PRECISION AS avg_polarity,
               AVG(subjectivity)::DOUBLE PRECISION AS avg_subjectivity,
               COUNT(*) AS article_count
        FROM latest
        GROUP BY period
        ORDER BY period
        "#,
    )
    .bind(since)
    .bind(interval.trunc_field())
    .fetch_all(pool)
    .await
}
