use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One keyword found in one article.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct KeywordMatch {
    pub article_id: i64,
    pub keyword: String,
    pub category: String,
    pub weight: f64,
    pub match_count: i32,
    /// Up to five snippets around the occurrences, match wrapped in `**`.
    pub context: String,
    /// Byte offsets of the counted occurrences. Not persisted.
    #[sqlx(skip)]
    #[serde(default)]
    pub positions: Vec<usize>,
}

impl KeywordMatch {
    pub fn contribution(&self) -> f64 {
        self.weight * self.match_count as f64
    }
}

/// Output of the categorizer for a single article.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategorizationResult {
    pub article_id: i64,
    /// Every configured category, zero when nothing matched.
    pub category_scores: BTreeMap<String, f64>,
    pub matches: Vec<KeywordMatch>,
}

impl CategorizationResult {
    pub fn score(&self, category: &str) -> f64 {
        self.category_scores.get(category).copied().unwrap_or(0.0)
    }

    /// Highest scoring category with a non-zero score. Ties resolve to the
    /// alphabetically first name.
    pub fn primary_category(&self) -> Option<&str> {
        self.category_scores
            .iter()
            .filter(|(_, score)| **score > 0.0)
            .fold(None, |best: Option<(&String, f64)>, (name, score)| match best {
                Some((_, best_score)) if best_score >= *score => best,
                _ => Some((name, *score)),
            })
            .map(|(name, _)| name.as_str())
    }

    pub fn has_matches(&self) -> bool {
        !self.matches.is_empty()
    }
}

/// A keyword match joined with its article's publication time, as read back
/// for event building.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DatedKeywordMatch {
    pub article_id: i64,
    pub keyword: String,
    pub category: String,
    pub match_count: i32,
    pub published_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TrendingKeyword {
    pub keyword: String,
    pub category: String,
    pub article_count: i64,
    pub total_matches: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_category_tie_breaks_by_name() {
        let result = CategorizationResult {
            article_id: 1,
            category_scores: BTreeMap::from([
                ("trade_policy".to_string(), 1.2),
                ("monetary_policy".to_string(), 1.2),
                ("fiscal_policy".to_string(), 0.0),
            ]),
            matches: vec![],
        };
        assert_eq!(result.primary_category(), Some("monetary_policy"));
    }

    #[test]
    fn test_primary_category_none_without_scores() {
        let result = CategorizationResult {
            article_id: 1,
            category_scores: BTreeMap::from([("monetary_policy".to_string(), 0.0)]),
            matches: vec![],
        };
        assert_eq!(result.primary_category(), None);
    }
}
