use std::collections::{BTreeMap, BTreeSet};

use chrono::{Duration, NaiveDate};

use crate::config::{QuantitativeConfig, WEIGHT_SUM_TOLERANCE};
use crate::errors::ConfigError;
use crate::models::{AggregateStatus, CategoryImpact, ScoredArticle};

/// Validated blend of keyword and sentiment evidence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregationWeights {
    pub keyword_weight: f64,
    pub sentiment_weight: f64,
    pub keyword_saturation: f64,
}

impl AggregationWeights {
    pub fn new(keyword_weight: f64, sentiment_weight: f64, keyword_saturation: f64) -> Result<Self, ConfigError> {
        if !(keyword_weight.is_finite() && sentiment_weight.is_finite())
            || keyword_weight < 0.0
            || sentiment_weight < 0.0
        {
            return Err(ConfigError::invalid(
                "analysis.quantitative",
                "keyword_weight and sentiment_weight must be non-negative",
            ));
        }
        if ((keyword_weight + sentiment_weight) - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(ConfigError::invalid(
                "analysis.quantitative",
                format!("weights sum to {}, expected 1.0", keyword_weight + sentiment_weight),
            ));
        }
        if !(keyword_saturation > 0.0 && keyword_saturation.is_finite()) {
            return Err(ConfigError::invalid("analysis.quantitative.keyword_saturation", "must be positive"));
        }
        Ok(Self {
            keyword_weight,
            sentiment_weight,
            keyword_saturation,
        })
    }

    pub fn from_config(config: &QuantitativeConfig) -> Result<Self, ConfigError> {
        let keyword_weight = config
            .keyword_weight
            .ok_or_else(|| ConfigError::Missing("analysis.quantitative.keyword_weight".to_string()))?;
        let sentiment_weight = config
            .sentiment_weight
            .ok_or_else(|| ConfigError::Missing("analysis.quantitative.sentiment_weight".to_string()))?;
        Self::new(keyword_weight, sentiment_weight, config.keyword_saturation)
    }
}

/// Map an unbounded keyword score into [0, 1).
pub fn normalize_keyword_score(score: f64, saturation: f64) -> f64 {
    let score = score.max(0.0);
    score / (score + saturation)
}

pub fn article_impact(weights: &AggregationWeights, keyword_score: f64, polarity: f64) -> f64 {
    weights.keyword_weight * normalize_keyword_score(keyword_score, weights.keyword_saturation)
        + weights.sentiment_weight * polarity
}

/// mean_confidence * n/(n+1) * 1/(1+sigma). A single sample reaches at most
/// half scale; agreement across more samples raises it.
pub fn window_confidence(confidences: &[f64], impacts: &[f64]) -> f64 {
    let n = confidences.len();
    if n == 0 {
        return 0.0;
    }
    let mean_confidence = confidences.iter().sum::<f64>() / n as f64;
    let sample_factor = n as f64 / (n as f64 + 1.0);
    mean_confidence * sample_factor / (1.0 + population_std(impacts))
}

fn population_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Aggregate the articles of one category published within
/// `[window_start, window_end]`.
///
/// Articles below `confidence_threshold` are left out and counted, never
/// scored as zero. With nothing left the window is `Insufficient`.
pub fn aggregate_window(
    articles: &[ScoredArticle],
    category: &str,
    window_start: NaiveDate,
    window_end: NaiveDate,
    confidence_threshold: f64,
    weights: &AggregationWeights,
) -> CategoryImpact {
    let in_window = articles.iter().filter(|a| {
        a.published_date >= window_start
            && a.published_date <= window_end
            && a.category_scores.get(category).copied().unwrap_or(0.0) > 0.0
    });

    let mut impacts = Vec::new();
    let mut confidences = Vec::new();
    let mut polarities = Vec::new();
    let mut excluded = 0;

    for article in in_window {
        if !(article.confidence >= confidence_threshold) || !article.polarity.is_finite() {
            excluded += 1;
            continue;
        }
        let keyword_score = article.category_scores.get(category).copied().unwrap_or(0.0);
        impacts.push(article_impact(weights, keyword_score, article.polarity));
        confidences.push(article.confidence);
        polarities.push(article.polarity);
    }

    let included = impacts.len();
    let confidence_sum: f64 = confidences.iter().sum();
    if included == 0 || confidence_sum <= 0.0 {
        return CategoryImpact {
            category: category.to_string(),
            window_start,
            window_end,
            status: AggregateStatus::Insufficient,
            impact_score: None,
            confidence: None,
            mean_polarity: None,
            included: 0,
            excluded: excluded + included,
        };
    }

    let impact_score = impacts
        .iter()
        .zip(&confidences)
        .map(|(impact, confidence)| impact * confidence)
        .sum::<f64>()
        / confidence_sum;

    CategoryImpact {
        category: category.to_string(),
        window_start,
        window_end,
        status: AggregateStatus::Scored,
        impact_score: Some(impact_score),
        confidence: Some(window_confidence(&confidences, &impacts)),
        mean_polarity: Some(polarities.iter().sum::<f64>() / included as f64),
        included,
        excluded,
    }
}

/// Every category with at least one keyword hit among `articles`, aggregated
/// over one window. Sorted by category name.
pub fn aggregate_by_category(
    articles: &[ScoredArticle],
    window_start: NaiveDate,
    window_end: NaiveDate,
    confidence_threshold: f64,
    weights: &AggregationWeights,
) -> Vec<CategoryImpact> {
    let categories: BTreeSet<&str> = articles
        .iter()
        .flat_map(|a| a.category_scores.iter())
        .filter(|(_, score)| **score > 0.0)
        .map(|(name, _)| name.as_str())
        .collect();

    categories
        .into_iter()
        .map(|category| aggregate_window(articles, category, window_start, window_end, confidence_threshold, weights))
        .collect()
}

/// `count` consecutive windows of `window_days` ending at `end_date`, most
/// recent first.
pub fn rolling_windows(end_date: NaiveDate, window_days: i64, count: usize) -> Vec<(NaiveDate, NaiveDate)> {
    (0..count as i64)
        .map(|i| {
            let window_end = end_date - Duration::days(i * window_days);
            let window_start = window_end - Duration::days(window_days - 1);
            (window_start, window_end)
        })
        .collect()
}

pub fn rolling_impacts(
    articles: &[ScoredArticle],
    end_date: NaiveDate,
    window_days: i64,
    count: usize,
    confidence_threshold: f64,
    weights: &AggregationWeights,
) -> Vec<CategoryImpact> {
    rolling_windows(end_date, window_days, count)
        .into_iter()
        .flat_map(|(start, end)| aggregate_by_category(articles, start, end, confidence_threshold, weights))
        .collect()
}

/// The scored window of `category` covering `date` whose end is closest to
/// it. Insufficient windows are never returned.
pub fn scored_window_for<'a>(
    impacts: &'a [CategoryImpact],
    category: &str,
    date: NaiveDate,
) -> Option<&'a CategoryImpact> {
    impacts
        .iter()
        .filter(|i| i.category == category && i.covers(date) && i.scored_impact().is_some())
        .min_by_key(|i| ((i.window_end - date).num_days(), std::cmp::Reverse(i.window_start)))
}

/// Confidence-weighted mean of the most recent scored window of each
/// category. None when no category has one.
pub fn latest_scored_mean(impacts: &[CategoryImpact]) -> Option<(f64, f64)> {
    let mut latest: BTreeMap<&str, &CategoryImpact> = BTreeMap::new();
    for impact in impacts.iter().filter(|i| i.scored_impact().is_some()) {
        let entry = latest.entry(impact.category.as_str()).or_insert(impact);
        if impact.window_end > entry.window_end {
            *entry = impact;
        }
    }
    let scored: Vec<(f64, f64)> = latest.values().filter_map(|i| i.scored_impact()).collect();
    let confidence_sum: f64 = scored.iter().map(|(_, c)| c).sum();
    if scored.is_empty() || !(confidence_sum > 0.0) {
        return None;
    }
    let impact = scored.iter().map(|(s, c)| s * c).sum::<f64>() / confidence_sum;
    Some((impact, confidence_sum / scored.len() as f64))
}
