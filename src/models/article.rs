use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A fetched news article. Never modified after insert; every derived row
/// (keyword matches, sentiment, event links) hangs off `id`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Article {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub source: String,
    pub url: String,
    pub published_date: DateTime<Utc>,
    pub category: Option<String>,
    pub language: String,
    pub fetched_at: DateTime<Utc>,
}

impl Article {
    /// Title and body as one text, the unit the keyword categorizer reads.
    pub fn full_text(&self) -> String {
        format!("{} {}", self.title, self.content)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateArticle {
    pub title: String,
    pub content: String,
    pub source: String,
    pub url: String,
    pub published_date: DateTime<Utc>,
    pub category: Option<String>,
    pub language: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Rss,
    NewsApi,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Rss => "rss",
            SourceType::NewsApi => "news_api",
        }
    }
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
