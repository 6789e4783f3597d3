use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::models::{Article, CreateArticle};

/// Insert an article unless its URL is already stored. Returns the new id,
/// or None for a duplicate.
pub async fn insert_article(pool: &PgPool, article: &CreateArticle) -> Result<Option<i64>, sqlx::Error> {
    let id = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO news_articles (title, content, source, url, published_date, category, language)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (url) DO NOTHING
        RETURNING id
        "#,
    )
    .bind(&article.title)
    .bind(&article.content)
    .bind(&article.source)
    .bind(&article.url)
    .bind(article.published_date)
    .bind(&article.category)
    .bind(&article.language)
    .fetch_optional(pool)
    .await?;

    Ok(id)
}

pub async fn fetch_articles_since(pool: &PgPool, since: DateTime<Utc>) -> Result<Vec<Article>, sqlx::Error> {
    sqlx::query_as::<_, Article>(
        r#"
        SELECT id, title, content, source, url, published_date, category, language, fetched_at
        FROM news_articles
        WHERE published_date >= $1
        ORDER BY published_date ASC, id ASC
        "#,
    )
    .bind(since)
    .fetch_all(pool)
    .await
}
