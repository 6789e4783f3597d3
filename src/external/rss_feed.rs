use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rss::Channel;
use tracing::debug;

use crate::config::RssSourceConfig;
use crate::external::provider::{ArticleProvider, ProviderError};
use crate::models::{CreateArticle, SourceType};

pub struct RssFeedProvider {
    client: reqwest::Client,
    source: RssSourceConfig,
}

impl RssFeedProvider {
    pub fn new(client: reqwest::Client, source: RssSourceConfig) -> Self {
        Self { client, source }
    }
}

/// Turn a feed document into articles. Items without a link, or published
/// before `since`, are dropped; items without a date count as fetched now.
pub fn parse_feed(
    bytes: &[u8],
    source: &RssSourceConfig,
    since: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<Vec<CreateArticle>, ProviderError> {
    let channel = Channel::read_from(bytes).map_err(|e| ProviderError::Parse(e.to_string()))?;

    let articles = channel
        .items()
        .iter()
        .filter_map(|item| {
            let url = item.link()?.trim().to_string();
            if url.is_empty() {
                return None;
            }
            let published_date = item
                .pub_date()
                .and_then(|d| DateTime::parse_from_rfc2822(d.trim()).ok())
                .map(|d| d.with_timezone(&Utc))
                .unwrap_or(now);
            if published_date < since {
                return None;
            }
            let content = item
                .content()
                .or_else(|| item.description())
                .unwrap_or_default()
                .to_string();

            Some(CreateArticle {
                title: item.title().unwrap_or_default().trim().to_string(),
                content,
                source: source.name.clone(),
                url,
                published_date,
                category: source.category.clone(),
                language: source.language.clone(),
            })
        })
        .collect();

    Ok(articles)
}

#[async_trait]
impl ArticleProvider for RssFeedProvider {
    fn name(&self) -> &str {
        &self.source.name
    }

    fn source_type(&self) -> SourceType {
        SourceType::Rss
    }

    async fn fetch_articles(&self, since: DateTime<Utc>) -> Result<Vec<CreateArticle>, ProviderError> {
        let resp = self
            .client
            .get(&self.source.url)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = resp.status();
        if status.as_u16() == 429 {
            return Err(ProviderError::RateLimited);
        }
        if !status.is_success() {
            return Err(ProviderError::BadResponse(format!("{} returned {}", self.source.url, status)));
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let articles = parse_feed(&bytes, &self.source, since, Utc::now())?;
        debug!("RSS {}: {} items after cutoff", self.source.name, articles.len());
        Ok(articles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Finance</title>
    <link>https://example.com</link>
    <description>News</description>
    <item>
      <title>央行宣布加息</title>
      <link>https://example.com/a</link>
      <description>央行今日宣布加息25个基点</description>
      <pubDate>Mon, 15 Apr 2024 08:00:00 +0000</pubDate>
    </item>
    <item>
      <title>Old news</title>
      <link>https://example.com/b</link>
      <pubDate>Mon, 01 Jan 2024 08:00:00 +0000</pubDate>
    </item>
    <item>
      <title>No link</title>
    </item>
  </channel>
</rss>"#;

    fn source() -> RssSourceConfig {
        RssSourceConfig {
            name: "example".to_string(),
            url: "https://example.com/rss".to_string(),
            category: Some("finance".to_string()),
            language: "zh".to_string(),
        }
    }

    #[test]
    fn test_parse_feed_filters_old_and_linkless_items() {
        let since = Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 4, 16, 0, 0, 0).unwrap();
        let articles = parse_feed(FEED.as_bytes(), &source(), since, now).unwrap();
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].url, "https://example.com/a");
        assert_eq!(articles[0].category.as_deref(), Some("finance"));
        assert!(articles[0].content.contains("加息"));
    }

    #[test]
    fn test_parse_feed_rejects_garbage() {
        let now = Utc::now();
        assert!(matches!(
            parse_feed(b"not xml at all", &source(), now, now),
            Err(ProviderError::Parse(_))
        ));
    }
}
