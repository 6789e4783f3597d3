use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::errors::AppError;
use crate::models::{CreateArticle, SourceType};

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("network error: {0}")]
    Network(String),

    #[error("bad response: {0}")]
    BadResponse(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("rate limited")]
    RateLimited,
}

impl From<ProviderError> for AppError {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::RateLimited => AppError::RateLimited,
            ProviderError::Network(msg) | ProviderError::BadResponse(msg) => AppError::External(msg),
            ProviderError::Parse(msg) => AppError::DataQuality(msg),
        }
    }
}

/// A news source that yields articles published after a cutoff.
#[async_trait]
pub trait ArticleProvider: Send + Sync {
    fn name(&self) -> &str;

    fn source_type(&self) -> SourceType;

    async fn fetch_articles(&self, since: DateTime<Utc>) -> Result<Vec<CreateArticle>, ProviderError>;
}
