use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use tracing::debug;

use crate::config::{FactorSource, ImpactFactorConfig};
use crate::models::{CategoryImpact, EventImpact, EventSentiment, ModelAdjustment, ModelParameters};
use crate::services::quantitative_service::{latest_scored_mean, scored_window_for};

/// Trade-policy relevance never moves a parameter by more than this.
const KEYWORD_IMPACT_LIMIT: f64 = 0.2;
const TRADE_POLICY: &str = "trade_policy";

/// A configured factor with its evidence resolved to one number.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedFactor {
    pub name: String,
    pub target: String,
    pub weight: f64,
    pub impact: f64,
    pub confidence: f64,
    pub event_ids: Vec<i64>,
}

/// Indicator a factor reads when the config names none.
pub fn default_indicator_for(factor_name: &str) -> Option<&'static str> {
    match factor_name {
        "interest_rate" | "interest_rates" => Some("interest_rates"),
        "gdp" | "gdp_growth" | "demand_forecast" => Some("gdp"),
        "inflation" | "cpi" => Some("cpi"),
        "global_trade" | "global_supply" => Some("global_trade"),
        "commodity_prices" => Some("commodity_prices"),
        _ => None,
    }
}

/// Non-finite impacts contribute nothing.
pub fn clamp_impact(impact: f64) -> f64 {
    if impact.is_finite() {
        impact.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

/// original * (1 + sum(weight * clamp(impact))).
pub fn adjust_parameter(original: f64, factors: &[ResolvedFactor]) -> f64 {
    let shift: f64 = factors.iter().map(|f| f.weight * clamp_impact(f.impact)).sum();
    original * (1.0 + shift)
}

/// Evidence available to resolve factors for one subject.
pub struct FactorEvidence<'a> {
    pub impacts: &'a [EventImpact],
    pub events: &'a [EventSentiment],
    /// Aggregated category windows over the same lookback.
    pub category_impacts: &'a [CategoryImpact],
    /// Words tying an event to the subject, e.g. "原油" for crude oil.
    pub subject_keywords: &'a [String],
}

/// Resolve one configured factor. None when there is no evidence for it.
pub fn resolve_factor(config: &ImpactFactorConfig, evidence: &FactorEvidence) -> Option<ResolvedFactor> {
    let resolved = match config.source {
        FactorSource::Indicators => {
            let indicator = config
                .indicator
                .as_deref()
                .or_else(|| default_indicator_for(&config.name))?;
            resolve_indicator_factor(indicator, evidence.impacts)
        }
        FactorSource::Analysis => resolve_sentiment_factor(evidence.events, evidence.category_impacts),
        FactorSource::Keywords => resolve_keyword_factor(evidence.events, evidence.subject_keywords),
    };

    resolved.map(|(impact, confidence, event_ids)| ResolvedFactor {
        name: config.name.clone(),
        target: config.target.clone(),
        weight: config.weight,
        impact,
        confidence,
        event_ids,
    })
}

/// Confidence-weighted mean of event impacts on `indicator`.
fn resolve_indicator_factor(indicator: &str, impacts: &[EventImpact]) -> Option<(f64, f64, Vec<i64>)> {
    let relevant: Vec<&EventImpact> = impacts
        .iter()
        .filter(|i| i.impact_target == indicator && i.impact_value.is_finite() && i.confidence > 0.0)
        .collect();
    let confidence_sum: f64 = relevant.iter().map(|i| i.confidence).sum();
    if relevant.is_empty() || !(confidence_sum > 0.0) {
        return None;
    }
    let impact = relevant.iter().map(|i| i.confidence * i.impact_value).sum::<f64>() / confidence_sum;
    let confidence = confidence_sum / relevant.len() as f64;
    Some((impact, confidence, distinct_ids(relevant.iter().map(|i| i.event_id))))
}

/// Importance-weighted mean of recent events, each taking the aggregated
/// impact of the scored window covering it and its mean polarity otherwise.
/// With no events, the latest scored window of each category stands in.
fn resolve_sentiment_factor(
    events: &[EventSentiment],
    category_impacts: &[CategoryImpact],
) -> Option<(f64, f64, Vec<i64>)> {
    let scored: Vec<(&EventSentiment, f64)> = events
        .iter()
        .filter_map(|e| {
            let aggregated = scored_window_for(category_impacts, &e.category, e.start_date)
                .and_then(CategoryImpact::scored_impact)
                .map(|(impact, _)| impact);
            aggregated
                .or(e.avg_polarity)
                .filter(|v| v.is_finite())
                .map(|v| (e, v))
        })
        .collect();
    let importance_sum: f64 = scored.iter().map(|(e, _)| e.importance as f64).sum();
    if scored.is_empty() || !(importance_sum > 0.0) {
        return latest_scored_mean(category_impacts).map(|(impact, confidence)| (impact, confidence, Vec::new()));
    }
    let impact = scored.iter().map(|(e, v)| e.importance as f64 * v).sum::<f64>() / importance_sum;
    let n = scored.len() as f64;
    Some((impact, n / (n + 1.0), distinct_ids(scored.iter().map(|(e, _)| e.event_id))))
}

/// Trade-policy events whose name mentions the subject, weighted by how many
/// of the subject's keywords they mention. Bounded to +-0.2.
fn resolve_keyword_factor(events: &[EventSentiment], subject_keywords: &[String]) -> Option<(f64, f64, Vec<i64>)> {
    if subject_keywords.is_empty() {
        return None;
    }
    let relevant: Vec<(&EventSentiment, f64)> = events
        .iter()
        .filter(|e| e.category == TRADE_POLICY)
        .filter_map(|e| {
            let name = e.name.to_lowercase();
            let hits = subject_keywords
                .iter()
                .filter(|k| name.contains(&k.to_lowercase()))
                .count();
            (hits > 0).then(|| (e, hits as f64 / subject_keywords.len() as f64))
        })
        .collect();
    if relevant.is_empty() {
        return None;
    }

    let n = relevant.len() as f64;
    let impact = relevant
        .iter()
        .map(|(e, relevance)| relevance * e.avg_polarity.unwrap_or(0.0) * e.importance as f64 / 5.0)
        .sum::<f64>()
        / n;
    let confidence = relevant.iter().map(|(_, relevance)| relevance).sum::<f64>() / n;
    Some((
        impact.clamp(-KEYWORD_IMPACT_LIMIT, KEYWORD_IMPACT_LIMIT),
        confidence,
        distinct_ids(relevant.iter().map(|(e, _)| e.event_id)),
    ))
}

fn distinct_ids(ids: impl Iterator<Item = i64>) -> Vec<i64> {
    ids.collect::<BTreeSet<_>>().into_iter().collect()
}

/// Apply resolved factors to a baseline, one adjustment per touched
/// parameter. Returns the adjusted parameters and the adjustment records.
pub fn apply_factors<P: ModelParameters>(
    subject: &str,
    baseline: &P,
    factors: &[ResolvedFactor],
    date: NaiveDate,
) -> (P, Vec<ModelAdjustment>) {
    let mut adjusted = baseline.clone();
    let mut adjustments = Vec::new();

    let mut by_target: BTreeMap<&str, Vec<ResolvedFactor>> = BTreeMap::new();
    for factor in factors {
        by_target.entry(factor.target.as_str()).or_default().push(factor.clone());
    }

    for (target, target_factors) in by_target {
        let Some(original) = baseline.get(target) else {
            debug!("{} has no parameter '{}', skipping", subject, target);
            continue;
        };
        let adjusted_value = adjust_parameter(original, &target_factors);
        if adjusted_value == original {
            continue;
        }

        let weight_sum: f64 = target_factors.iter().map(|f| f.weight.abs()).sum();
        let confidence = if weight_sum > 0.0 {
            target_factors.iter().map(|f| f.weight.abs() * f.confidence).sum::<f64>() / weight_sum
        } else {
            0.0
        };
        let events: BTreeSet<i64> = target_factors.iter().flat_map(|f| f.event_ids.iter().copied()).collect();
        let event_id = if events.len() == 1 { events.into_iter().next() } else { None };

        let reason = target_factors
            .iter()
            .map(|f| format!("{} (weight {:.2}, impact {:+.4})", f.name, f.weight, clamp_impact(f.impact)))
            .collect::<Vec<_>>()
            .join("; ");

        adjusted.set(target, adjusted_value);
        adjustments.push(ModelAdjustment {
            subject_symbol: subject.to_string(),
            date,
            factor_name: target.to_string(),
            original_value: original,
            adjusted_value,
            reason,
            confidence,
            event_id,
        });
    }

    (adjusted, adjustments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DcfBaseline;

    fn factor(name: &str, target: &str, weight: f64, impact: f64, events: &[i64]) -> ResolvedFactor {
        ResolvedFactor {
            name: name.to_string(),
            target: target.to_string(),
            weight,
            impact,
            confidence: 0.8,
            event_ids: events.to_vec(),
        }
    }

    fn event(id: i64, category: &str, name: &str, importance: i32, polarity: f64) -> EventSentiment {
        EventSentiment {
            event_id: id,
            name: name.to_string(),
            category: category.to_string(),
            start_date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            importance,
            avg_polarity: Some(polarity),
            article_count: 5,
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 10).unwrap()
    }

    #[test]
    fn test_adjust_parameter_example() {
        let adjusted = adjust_parameter(0.08, &[factor("interest_rate", "discount_rate", 0.4, 0.5, &[])]);
        assert!((adjusted - 0.096).abs() < 1e-12);
    }

    #[test]
    fn test_impact_is_clamped() {
        let adjusted = adjust_parameter(0.10, &[factor("x", "discount_rate", 0.5, 40.0, &[])]);
        assert!((adjusted - 0.15).abs() < 1e-12);
        assert_eq!(clamp_impact(f64::NAN), 0.0);
    }

    #[test]
    fn test_single_event_sets_event_id() {
        let baseline = DcfBaseline::default();
        let factors = vec![
            factor("interest_rate", "discount_rate", 0.3, 0.1, &[7]),
            factor("market_sentiment", "discount_rate", 0.2, -0.1, &[7]),
            factor("gdp_growth", "growth_rate", 0.3, 0.2, &[7, 8]),
        ];
        let (params, adjustments) = apply_factors("AAPL", &baseline, &factors, date());
        assert_eq!(adjustments.len(), 2);

        let discount = adjustments.iter().find(|a| a.factor_name == "discount_rate").unwrap();
        assert_eq!(discount.event_id, Some(7));
        assert!((discount.adjusted_value - 0.10 * 1.01).abs() < 1e-12);
        assert_eq!(params.discount_rate, discount.adjusted_value);

        let growth = adjustments.iter().find(|a| a.factor_name == "growth_rate").unwrap();
        assert_eq!(growth.event_id, None);
    }

    #[test]
    fn test_indicator_factor_is_confidence_weighted() {
        let impacts = vec![
            EventImpact::new(1, "interest_rates", crate::models::ImpactType::Direct, 0.04, 0.9, crate::models::TimeHorizon::Short),
            EventImpact::new(2, "interest_rates", crate::models::ImpactType::Direct, 0.01, 0.3, crate::models::TimeHorizon::Short),
            EventImpact::new(3, "gdp", crate::models::ImpactType::Direct, -0.5, 0.9, crate::models::TimeHorizon::Short),
        ];
        let config = ImpactFactorConfig {
            name: "interest_rate".to_string(),
            target: "discount_rate".to_string(),
            weight: 0.3,
            source: FactorSource::Indicators,
            indicator: None,
            allow_negative: false,
        };
        let evidence = FactorEvidence {
            impacts: &impacts,
            events: &[],
            category_impacts: &[],
            subject_keywords: &[],
        };
        let resolved = resolve_factor(&config, &evidence).unwrap();
        assert!((resolved.impact - (0.9 * 0.04 + 0.3 * 0.01) / 1.2).abs() < 1e-12);
        assert!((resolved.confidence - 0.6).abs() < 1e-12);
        assert_eq!(resolved.event_ids, vec![1, 2]);
    }

    #[test]
    fn test_keyword_factor_is_bounded() {
        let events = vec![
            event(1, "trade_policy", "Trade Policy: 原油, 关税", 5, -1.0),
            event(2, "monetary_policy", "Monetary Policy: 原油", 5, -1.0),
        ];
        let keywords = vec!["原油".to_string()];
        let evidence = FactorEvidence {
            impacts: &[],
            events: &events,
            category_impacts: &[],
            subject_keywords: &keywords,
        };
        let config = ImpactFactorConfig {
            name: "trade_policy".to_string(),
            target: "supply".to_string(),
            weight: 0.2,
            source: FactorSource::Keywords,
            indicator: None,
            allow_negative: false,
        };
        let resolved = resolve_factor(&config, &evidence).unwrap();
        assert_eq!(resolved.impact, -0.2);
        assert_eq!(resolved.event_ids, vec![1]);
    }

    #[test]
    fn test_no_evidence_no_factor() {
        let config = ImpactFactorConfig {
            name: "market_sentiment".to_string(),
            target: "discount_rate".to_string(),
            weight: 0.2,
            source: FactorSource::Analysis,
            indicator: None,
            allow_negative: false,
        };
        let evidence = FactorEvidence {
            impacts: &[],
            events: &[],
            category_impacts: &[],
            subject_keywords: &[],
        };
        assert!(resolve_factor(&config, &evidence).is_none());
    }
}
