use std::collections::{BTreeMap, BTreeSet};

use chrono::{Duration, NaiveDate};

use crate::config::EventConfig;
use crate::models::{
    CategoryImpact, CorrelationOutcome, CorrelationSample, CreateMacroEvent, DatedKeywordMatch, EconomicIndicator,
    EventImpact, EventSentiment, ImpactType, TimeHorizon,
};
use crate::services::correlation_service;
use crate::services::indicator_service::change_around;
use crate::services::quantitative_service::scored_window_for;

const ARTICLES_PER_IMPORTANCE_LEVEL: usize = 5;
const NAME_KEYWORDS: usize = 5;
/// Average indicator change above which an event counts as a direct driver.
const DIRECT_IMPACT_THRESHOLD: f64 = 0.01;
const MAX_IMPACT_CONFIDENCE: f64 = 0.95;

#[derive(Default)]
struct CategoryCluster {
    articles: BTreeMap<i64, i64>,
    keywords: BTreeMap<String, i64>,
    first_seen: Option<NaiveDate>,
    last_seen: Option<NaiveDate>,
}

/// Group recent keyword matches by category into event candidates. A
/// category becomes an event once `min_articles` distinct articles matched it
/// within `lookback_days` of `today`.
pub fn identify_events(matches: &[DatedKeywordMatch], config: &EventConfig, today: NaiveDate) -> Vec<CreateMacroEvent> {
    let since = today - Duration::days(config.lookback_days);
    let mut clusters: BTreeMap<&str, CategoryCluster> = BTreeMap::new();

    for m in matches {
        let date = m.published_date.date_naive();
        if date < since || date > today {
            continue;
        }
        let cluster = clusters.entry(m.category.as_str()).or_default();
        *cluster.articles.entry(m.article_id).or_insert(0) += m.match_count as i64;
        *cluster.keywords.entry(m.keyword.clone()).or_insert(0) += m.match_count as i64;
        cluster.first_seen = Some(cluster.first_seen.map_or(date, |d| d.min(date)));
        cluster.last_seen = Some(cluster.last_seen.map_or(date, |d| d.max(date)));
    }

    clusters
        .into_iter()
        .filter(|(_, cluster)| cluster.articles.len() >= config.min_articles)
        .filter_map(|(category, cluster)| {
            let start_date = cluster.first_seen?;
            let article_count = cluster.articles.len();

            let mut ranked: Vec<(&String, &i64)> = cluster.keywords.iter().collect();
            ranked.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
            let keywords: Vec<String> = ranked.into_iter().take(NAME_KEYWORDS).map(|(k, _)| k.clone()).collect();

            let max_hits = cluster.articles.values().copied().max().unwrap_or(1).max(1) as f64;
            let articles = cluster
                .articles
                .iter()
                .map(|(id, hits)| (*id, *hits as f64 / max_hits))
                .collect();

            Some(CreateMacroEvent {
                name: format!("{}: {}", title_case(category), keywords.join(", ")),
                category: category.to_string(),
                start_date,
                end_date: cluster.last_seen,
                description: Some(format!(
                    "{} articles in the last {} days matched {} {} keywords",
                    article_count,
                    config.lookback_days,
                    cluster.keywords.len(),
                    category
                )),
                importance: importance_for(article_count),
                keywords,
                articles,
            })
        })
        .collect()
}

/// One importance level per five articles, between 1 and 5.
pub fn importance_for(article_count: usize) -> i32 {
    (article_count / ARTICLES_PER_IMPORTANCE_LEVEL).clamp(1, 5) as i32
}

/// Signed strength of an event: mean article polarity scaled by importance.
pub fn event_signal(importance: i32, avg_polarity: f64) -> f64 {
    avg_polarity * importance as f64 / 5.0
}

/// Event signal preferring the aggregated category impact of the window
/// covering the event. Falls back to mean polarity when that window was not
/// scored.
pub fn aggregated_signal(importance: i32, avg_polarity: Option<f64>, window: Option<&CategoryImpact>) -> f64 {
    match window.and_then(CategoryImpact::scored_impact) {
        Some((impact, _)) => event_signal(importance, impact),
        None => event_signal(importance, avg_polarity.unwrap_or(0.0)),
    }
}

/// Pair each past event with the change in `series` around it. Events with
/// no indicator value near both ends are dropped.
pub fn impact_observations(
    past: &[EventSentiment],
    series: &[EconomicIndicator],
    aggregates: &[CategoryImpact],
    offset_days: i64,
    tolerance_days: i64,
) -> Vec<ImpactObservation> {
    past.iter()
        .filter_map(|event| {
            let change = change_around(series, event.start_date, offset_days, tolerance_days)?;
            let window = scored_window_for(aggregates, &event.category, event.start_date);
            Some(ImpactObservation {
                event_date: event.start_date,
                event_signal: aggregated_signal(event.importance, event.avg_polarity, window),
                change,
            })
        })
        .collect()
}

/// Indicator movement around one earlier event of the same category.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImpactObservation {
    pub event_date: NaiveDate,
    pub event_signal: f64,
    pub change: f64,
}

/// Estimate the impact of an event on `target` from what the indicator did
/// around similar past events.
///
/// The value is the decay-weighted mean change. Confidence starts from the
/// number of precedents and is scaled by how tightly event strength and
/// indicator movement correlated, when that correlation is defined.
pub fn derive_impact(
    event_id: i64,
    target: &str,
    observations: &[ImpactObservation],
    as_of: NaiveDate,
    correlation_window: i64,
    decay: f64,
    offset_days: i64,
) -> Option<EventImpact> {
    let samples: Vec<CorrelationSample> = observations
        .iter()
        .map(|o| CorrelationSample {
            date: o.event_date,
            event_signal: o.event_signal,
            indicator_change: o.change,
        })
        .collect();

    let weighted: Vec<(f64, f64)> = samples
        .iter()
        .filter_map(|s| {
            correlation_service::sample_weight(s, as_of, correlation_window, decay).map(|w| (w, s.indicator_change))
        })
        .collect();
    let total_weight: f64 = weighted.iter().map(|(w, _)| w).sum();
    if weighted.is_empty() || !(total_weight > 0.0) {
        return None;
    }
    let impact_value = weighted.iter().map(|(w, c)| w * c).sum::<f64>() / total_weight;

    let mut confidence = (0.5 + weighted.len() as f64 / 20.0).min(MAX_IMPACT_CONFIDENCE);
    if let CorrelationOutcome::Coefficient(c) =
        correlation_service::weighted_correlation(&samples, as_of, correlation_window, decay)
    {
        confidence *= 0.5 + 0.5 * c.coefficient.abs();
    }

    let impact_type = if impact_value.abs() > DIRECT_IMPACT_THRESHOLD {
        ImpactType::Direct
    } else {
        ImpactType::Indirect
    };

    Some(EventImpact::new(
        event_id,
        target,
        impact_type,
        impact_value,
        confidence,
        TimeHorizon::from_offset_days(offset_days),
    ))
}

fn title_case(category: &str) -> String {
    category
        .split('_')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Distinct article ids among the matches, for logging.
pub fn matched_article_count(matches: &[DatedKeywordMatch]) -> usize {
    matches.iter().map(|m| m.article_id).collect::<BTreeSet<_>>().len()
}
