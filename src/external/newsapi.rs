use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::config::NewsApiConfig;
use crate::external::provider::{ArticleProvider, ProviderError};
use crate::models::{CreateArticle, SourceType};
use crate::services::rate_limiter::RequestThrottle;

/// One NewsAPI `everything` query. Queries for different keywords share a
/// client and a throttle so the account quota holds across them.
pub struct NewsApiProvider {
    client: reqwest::Client,
    throttle: Arc<RequestThrottle>,
    base_url: String,
    api_key: String,
    keyword: String,
    language: String,
    page_size: u32,
    name: String,
}

impl NewsApiProvider {
    pub fn new(
        client: reqwest::Client,
        throttle: Arc<RequestThrottle>,
        config: &NewsApiConfig,
        keyword: &str,
    ) -> Result<Self, ProviderError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ProviderError::BadResponse("NEWS_API_KEY not set".into()))?;

        Ok(Self {
            client,
            throttle,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            keyword: keyword.to_string(),
            language: config.language.clone(),
            page_size: config.page_size,
            name: format!("newsapi:{}", keyword),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsApiResponse {
    status: String,
    code: Option<String>,
    message: Option<String>,
    #[serde(default)]
    articles: Vec<NewsApiArticle>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewsApiArticle {
    source: NewsApiSource,
    title: Option<String>,
    description: Option<String>,
    content: Option<String>,
    url: Option<String>,
    published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct NewsApiSource {
    name: Option<String>,
}

/// Convert a decoded response into articles, surfacing API-level errors.
pub fn parse_response(body: NewsApiResponse, language: &str) -> Result<Vec<CreateArticle>, ProviderError> {
    if body.status != "ok" {
        if body.code.as_deref() == Some("rateLimited") {
            return Err(ProviderError::RateLimited);
        }
        return Err(ProviderError::BadResponse(
            body.message.or(body.code).unwrap_or_else(|| body.status.clone()),
        ));
    }

    let articles = body
        .articles
        .into_iter()
        .filter_map(|a| {
            let url = a.url.filter(|u| !u.is_empty())?;
            let content = [a.description, a.content]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join("\n");
            Some(CreateArticle {
                title: a.title.unwrap_or_default(),
                content,
                source: a.source.name.unwrap_or_else(|| "newsapi".to_string()),
                url,
                published_date: a.published_at?,
                category: None,
                language: language.to_string(),
            })
        })
        .collect();

    Ok(articles)
}

#[async_trait]
impl ArticleProvider for NewsApiProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn source_type(&self) -> SourceType {
        SourceType::NewsApi
    }

    async fn fetch_articles(&self, since: DateTime<Utc>) -> Result<Vec<CreateArticle>, ProviderError> {
        let _permit = self
            .throttle
            .acquire()
            .await
            .ok_or_else(|| ProviderError::Network("request throttle closed".into()))?;

        let from = since.format("%Y-%m-%dT%H:%M:%S").to_string();
        let page_size = self.page_size.to_string();
        let url = format!("{}/everything", self.base_url);

        let resp = self
            .client
            .get(&url)
            .query(&[
                ("q", self.keyword.as_str()),
                ("from", from.as_str()),
                ("language", self.language.as_str()),
                ("sortBy", "publishedAt"),
                ("pageSize", page_size.as_str()),
                ("apiKey", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = resp.status();
        if status.as_u16() == 429 {
            return Err(ProviderError::RateLimited);
        }
        if status.is_server_error() {
            return Err(ProviderError::Network(format!("NewsAPI returned {}", status)));
        }

        // 4xx bodies still carry the error code and message
        let body = resp
            .json::<NewsApiResponse>()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        parse_response(body, &self.language)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ok_response() {
        let body: NewsApiResponse = serde_json::from_str(
            r#"{
                "status": "ok",
                "totalResults": 2,
                "articles": [
                    {"source": {"id": null, "name": "Reuters"}, "title": "Fed holds rates",
                     "description": "The Fed held rates steady.", "content": "Full text",
                     "url": "https://example.com/fed", "publishedAt": "2024-04-15T12:00:00Z"},
                    {"source": {"name": "Blog"}, "title": "No url", "url": null,
                     "publishedAt": "2024-04-15T12:00:00Z"}
                ]
            }"#,
        )
        .unwrap();
        let articles = parse_response(body, "en").unwrap();
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].source, "Reuters");
        assert_eq!(articles[0].content, "The Fed held rates steady.\nFull text");
    }

    #[test]
    fn test_rate_limited_code() {
        let body: NewsApiResponse = serde_json::from_str(
            r#"{"status": "error", "code": "rateLimited", "message": "Too many requests"}"#,
        )
        .unwrap();
        assert!(matches!(parse_response(body, "en"), Err(ProviderError::RateLimited)));
    }

    #[test]
    fn test_api_error_message_surfaces() {
        let body: NewsApiResponse = serde_json::from_str(
            r#"{"status": "error", "code": "apiKeyInvalid", "message": "Your API key is invalid"}"#,
        )
        .unwrap();
        match parse_response(body, "en") {
            Err(ProviderError::BadResponse(msg)) => assert!(msg.contains("invalid")),
            other => panic!("unexpected {:?}", other),
        }
    }
}
