use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// How much a score can be trusted, recorded next to every result.
/// Ordered from least to most degraded.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ScoreQuality {
    Normal,
    ShortText,
    MixedLanguage,
    EmptyText,
    UnsupportedLanguage,
}

impl ScoreQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreQuality::Normal => "normal",
            ScoreQuality::ShortText => "short_text",
            ScoreQuality::MixedLanguage => "mixed_language",
            ScoreQuality::EmptyText => "empty_text",
            ScoreQuality::UnsupportedLanguage => "unsupported_language",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "normal" => Some(ScoreQuality::Normal),
            "short_text" => Some(ScoreQuality::ShortText),
            "mixed_language" => Some(ScoreQuality::MixedLanguage),
            "empty_text" => Some(ScoreQuality::EmptyText),
            "unsupported_language" => Some(ScoreQuality::UnsupportedLanguage),
            _ => None,
        }
    }
}

impl std::fmt::Display for ScoreQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Scores for a piece of text.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SentimentScore {
    pub polarity: f64,
    pub subjectivity: f64,
    pub confidence: f64,
    pub quality: ScoreQuality,
}

impl SentimentScore {
    pub fn neutral(confidence: f64, quality: ScoreQuality) -> Self {
        Self {
            polarity: 0.0,
            subjectivity: 0.0,
            confidence,
            quality,
        }
    }
}

/// Persisted per-article sentiment, one row per (article_id, run_id).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SentimentResult {
    pub article_id: i64,
    pub run_id: Uuid,
    pub polarity: f64,
    pub subjectivity: f64,
    pub confidence: f64,
    pub quality: String,
}

impl SentimentResult {
    pub fn new(article_id: i64, run_id: Uuid, score: SentimentScore) -> Self {
        Self {
            article_id,
            run_id,
            polarity: score.polarity,
            subjectivity: score.subjectivity,
            confidence: score.confidence,
            quality: score.quality.as_str().to_string(),
        }
    }

    pub fn quality(&self) -> ScoreQuality {
        ScoreQuality::from_str(&self.quality).unwrap_or(ScoreQuality::Normal)
    }
}

/// Latest sentiment of an article together with its publication time.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DatedSentiment {
    pub article_id: i64,
    pub published_date: DateTime<Utc>,
    pub polarity: f64,
    pub subjectivity: f64,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TrendInterval {
    Day,
    Week,
    Month,
}

impl TrendInterval {
    /// Postgres `date_trunc` field name.
    pub fn trunc_field(&self) -> &'static str {
        match self {
            TrendInterval::Day => "day",
            TrendInterval::Week => "week",
            TrendInterval::Month => "month",
        }
    }
}

impl Default for TrendInterval {
    fn default() -> Self {
        TrendInterval::Day
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SentimentTrendPoint {
    pub period: DateTime<Utc>,
    pub avg_polarity: f64,
    pub avg_subjectivity: f64,
    pub article_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_round_trips_through_text() {
        for quality in [
            ScoreQuality::Normal,
            ScoreQuality::ShortText,
            ScoreQuality::MixedLanguage,
            ScoreQuality::EmptyText,
            ScoreQuality::UnsupportedLanguage,
        ] {
            assert_eq!(ScoreQuality::from_str(quality.as_str()), Some(quality));
        }
        assert_eq!(ScoreQuality::from_str("bogus"), None);
    }
}
