use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};

use crate::models::{DatedKeywordMatch, KeywordMatch, TrendingKeyword};

/// Weighted keyword score of one article in one category.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ArticleCategoryScore {
    pub article_id: i64,
    pub category: String,
    pub score: f64,
}

/// Replace every stored match of an article with a fresh categorization.
pub async fn replace_matches(pool: &PgPool, article_id: i64, matches: &[KeywordMatch]) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM keyword_matches WHERE article_id = $1")
        .bind(article_id)
        .execute(&mut *tx)
        .await?;

    for m in matches {
        sqlx::query(
            r#"
            INSERT INTO keyword_matches (article_id, keyword, category, weight, match_count, context)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(m.article_id)
        .bind(&m.keyword)
        .bind(&m.category)
        .bind(m.weight)
        .bind(m.match_count)
        .bind(&m.context)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await
}

pub async fn fetch_matches_since(pool: &PgPool, since: DateTime<Utc>) -> Result<Vec<DatedKeywordMatch>, sqlx::Error> {
    sqlx::query_as::<_, DatedKeywordMatch>(
        r#"
        SELECT km.article_id, km.keyword, km.category, km.match_count, a.published_date
        FROM keyword_matches km
        JOIN news_articles a ON a.id = km.article_id
        WHERE a.published_date >= $1
        ORDER BY km.article_id, km.category, km.keyword
        "#,
    )
    .bind(since)
    .fetch_all(pool)
    .await
}

pub async fn fetch_category_scores_since(
    pool: &PgPool,
    since: DateTime<Utc>,
) -> Result<Vec<ArticleCategoryScore>, sqlx::Error> {
    sqlx::query_as::<_, ArticleCategoryScore>(
        r#"
        SELECT km.article_id, km.category, SUM(km.weight * km.match_count)::DOUBLE PRECISION AS score
        FROM keyword_matches km
        JOIN news_articles a ON a.id = km.article_id
        WHERE a.published_date >= $1
        GROUP BY km.article_id, km.category
        ORDER BY km.article_id, km.category
        "#,
    )
    .bind(since)
    .fetch_all(pool)
    .await
}

pub async fn trending_keywords(
    pool: &PgPool,
    since: DateTime<Utc>,
    category: Option<&str>,
    limit: i64,
) -> Result<Vec<TrendingKeyword>, sqlx::Error> {
    sqlx::query_as::<_, TrendingKeyword>(
        r#"
        SELECT km.keyword, km.category,
               COUNT(DISTINCT km.article_id) AS article_count,
               SUM(km.match_count)::BIGINT AS total_matches
        FROM keyword_matches km
        JOIN news_articles a ON a.id = km.article_id
        WHERE a.published_date >= $1
          AND ($2::TEXT IS NULL OR km.category = $2)
        GROUP BY km.keyword, km.category
        ORDER BY article_count DESC, total_matches DESC, km.keyword ASC
        LIMIT $3
        "#,
    )
    .bind(since)
    .bind(category)
    .bind(limit)
    .fetch_all(pool)
    .await
}
