use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::errors::ConfigError;
use crate::models::{CommodityParameters, DcfBaseline, DuplicatePolicy, ModelKind, ModelParameters};
use crate::services::integration_service;
use crate::services::quantitative_service::AggregationWeights;

/// Languages the sentiment lexicons cover.
pub const SUPPORTED_LANGUAGES: &[&str] = &["en", "zh"];

pub(crate) const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

/// Top-level configuration, loaded once from YAML and passed by reference
/// into every stage. Nothing in here is mutated after `validate` succeeds.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub data_sources: DataSourcesConfig,
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub indicators: IndicatorConfig,
    #[serde(default)]
    pub model_integration: ModelIntegrationConfig,
    pub attribution: AttributionConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DataSourcesConfig {
    #[serde(default)]
    pub rss: RssConfig,
    #[serde(default)]
    pub news_api: NewsApiConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RssConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub sources: Vec<RssSourceConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RssSourceConfig {
    pub name: String,
    pub url: String,
    pub category: Option<String>,
    #[serde(default = "default_language")]
    pub language: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewsApiConfig {
    #[serde(default)]
    pub enabled: bool,
    pub api_key: Option<String>,
    #[serde(default = "default_news_api_url")]
    pub base_url: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default = "default_days_back")]
    pub days_back: i64,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,
}

impl Default for NewsApiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: None,
            base_url: default_news_api_url(),
            keywords: Vec::new(),
            days_back: default_days_back(),
            language: default_language(),
            page_size: default_page_size(),
            requests_per_minute: default_requests_per_minute(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisConfig {
    pub keyword_filter: KeywordFilterConfig,
    pub sentiment: SentimentConfig,
    pub quantitative: QuantitativeConfig,
    #[serde(default)]
    pub events: EventConfig,
}

/// Category -> keyword -> weight. BTreeMaps keep iteration order stable so
/// scoring never depends on hash order.
#[derive(Debug, Clone, Deserialize)]
pub struct KeywordFilterConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_days_back")]
    pub days_back: i64,
    pub categories: BTreeMap<String, BTreeMap<String, f64>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentMethod {
    /// Lexicon scoring with negation and intensifier handling.
    Lexicon,
    /// Lexicon scoring plus punctuation and capitalisation emphasis.
    Vader,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SentimentConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_sentiment_method")]
    pub method: SentimentMethod,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_min_text_length")]
    pub min_text_length: usize,
    #[serde(default = "default_days_back")]
    pub days_back: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuantitativeConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_window_days")]
    pub window_days: i64,
    #[serde(default = "default_rolling_windows")]
    pub rolling_windows: usize,
    #[serde(alias = "historical_correlation_window")]
    pub correlation_window: i64,
    pub impact_decay_factor: f64,
    pub confidence_threshold: f64,
    /// Both weights are required; a missing weight fails validation rather
    /// than silently defaulting to zero.
    pub keyword_weight: Option<f64>,
    pub sentiment_weight: Option<f64>,
    #[serde(default = "default_keyword_saturation")]
    pub keyword_saturation: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_event_lookback_days")]
    pub lookback_days: i64,
    #[serde(default = "default_min_articles")]
    pub min_articles: usize,
    #[serde(default = "default_impact_targets")]
    pub impact_targets: Vec<String>,
    #[serde(default = "default_offset_days")]
    pub offset_days: i64,
    #[serde(default = "default_match_tolerance_days")]
    pub match_tolerance_days: i64,
    #[serde(default = "default_similar_events_limit")]
    pub similar_events_limit: i64,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            lookback_days: default_event_lookback_days(),
            min_articles: default_min_articles(),
            impact_targets: default_impact_targets(),
            offset_days: default_offset_days(),
            match_tolerance_days: default_match_tolerance_days(),
            similar_events_limit: default_similar_events_limit(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IndicatorConfig {
    #[serde(default)]
    pub duplicate_policy: DuplicatePolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FactorSource {
    /// Confidence-weighted event impacts on an economic indicator.
    #[serde(alias = "fred", alias = "world_bank")]
    Indicators,
    /// Importance-weighted event sentiment.
    Analysis,
    /// Keyword relevance of trade-policy events to a commodity.
    #[serde(alias = "keyword_filter")]
    Keywords,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImpactFactorConfig {
    pub name: String,
    /// Model parameter this factor adjusts, e.g. `discount_rate` or `supply`.
    pub target: String,
    pub weight: f64,
    pub source: FactorSource,
    /// Indicator consulted for `indicators` factors. Falls back to a
    /// well-known mapping of the factor name when omitted.
    pub indicator: Option<String>,
    /// Inverse factors must opt in to a negative weight.
    #[serde(default)]
    pub allow_negative: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "P: Deserialize<'de> + Default"))]
pub struct ModelConfig<P> {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub subjects: Vec<String>,
    #[serde(default)]
    pub impact_factors: Vec<ImpactFactorConfig>,
    #[serde(default = "default_event_lookback_days")]
    pub event_lookback_days: i64,
    #[serde(default)]
    pub default_baseline: P,
    #[serde(default)]
    pub baselines: BTreeMap<String, P>,
}

impl<P: Default> Default for ModelConfig<P> {
    fn default() -> Self {
        Self {
            enabled: false,
            subjects: Vec::new(),
            impact_factors: Vec::new(),
            event_lookback_days: default_event_lookback_days(),
            default_baseline: P::default(),
            baselines: BTreeMap::new(),
        }
    }
}

impl<P: Clone> ModelConfig<P> {
    /// Baseline parameters for a subject, falling back to the default baseline.
    pub fn baseline_for(&self, subject: &str) -> P {
        self.baselines
            .get(subject)
            .cloned()
            .unwrap_or_else(|| self.default_baseline.clone())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelIntegrationConfig {
    #[serde(default)]
    pub dcf: ModelConfig<DcfBaseline>,
    #[serde(default)]
    pub commodity: ModelConfig<CommodityParameters>,
    /// Commodity -> keywords that tie trade-policy events to it.
    #[serde(default)]
    pub commodity_keywords: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    Html,
    Pdf,
    Csv,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributionSource {
    Indicator,
    Sentiment,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AttributionFactorConfig {
    pub name: String,
    pub source: AttributionSource,
    pub indicator: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AttributionConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub lookback_period: i64,
    #[serde(default)]
    pub factors: Vec<AttributionFactorConfig>,
    #[serde(default = "default_benchmark_returns")]
    pub benchmark_returns: BTreeMap<String, f64>,
    #[serde(default = "default_benchmark_return")]
    pub default_benchmark_return: f64,
    #[serde(default = "default_report_format")]
    pub report_format: ReportFormat,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// How far a factor observation may sit from a price date and still be
    /// paired with it.
    #[serde(default = "default_attribution_tolerance_days")]
    pub match_tolerance_days: i64,
}

impl AttributionConfig {
    pub fn benchmark_for(&self, asset_type: &str) -> f64 {
        self.benchmark_returns
            .get(asset_type)
            .copied()
            .unwrap_or(self.default_benchmark_return)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            retry: RetryConfig::default(),
        }
    }
}

impl AppConfig {
    /// Read, apply environment overrides, and validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let mut config: AppConfig = serde_yaml::from_str(&raw)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate without consulting the environment.
    pub fn from_yaml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = serde_yaml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("DATABASE_URL") {
            self.database.url = Some(url);
        }
        if let Ok(key) = std::env::var("NEWS_API_KEY") {
            self.data_sources.news_api.api_key = Some(key);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_data_sources()?;
        self.validate_keywords()?;
        self.validate_sentiment()?;
        self.validate_quantitative()?;
        self.validate_events()?;
        validate_model_factors(ModelKind::Dcf, &self.model_integration.dcf.impact_factors, DcfBaseline::names())?;
        validate_model_factors(
            ModelKind::Commodity,
            &self.model_integration.commodity.impact_factors,
            CommodityParameters::names(),
        )?;
        self.validate_attribution()?;
        self.validate_pipeline()
    }

    fn validate_data_sources(&self) -> Result<(), ConfigError> {
        let news_api = &self.data_sources.news_api;
        if news_api.enabled {
            if news_api.api_key.as_deref().map_or(true, |k| k.trim().is_empty()) {
                return Err(ConfigError::Missing("data_sources.news_api.api_key".to_string()));
            }
            if news_api.days_back <= 0 {
                return Err(ConfigError::invalid("data_sources.news_api.days_back", "must be positive"));
            }
            if news_api.requests_per_minute == 0 {
                return Err(ConfigError::invalid(
                    "data_sources.news_api.requests_per_minute",
                    "must be positive",
                ));
            }
        }

        let mut seen = HashSet::new();
        for source in &self.data_sources.rss.sources {
            if !seen.insert(source.name.as_str()) {
                return Err(ConfigError::invalid(
                    "data_sources.rss.sources",
                    format!("duplicate source name '{}'", source.name),
                ));
            }
            url::Url::parse(&source.url).map_err(|e| {
                ConfigError::invalid(format!("data_sources.rss.sources.{}.url", source.name), e.to_string())
            })?;
        }
        Ok(())
    }

    fn validate_keywords(&self) -> Result<(), ConfigError> {
        let filter = &self.analysis.keyword_filter;
        if filter.enabled && filter.categories.is_empty() {
            return Err(ConfigError::Missing("analysis.keyword_filter.categories".to_string()));
        }

        for (category, keywords) in &filter.categories {
            let key = format!("analysis.keyword_filter.categories.{}", category);
            if keywords.is_empty() {
                return Err(ConfigError::invalid(key, "category has no keywords"));
            }
            let mut lowered = HashSet::new();
            for (keyword, weight) in keywords {
                if keyword.trim().is_empty() {
                    return Err(ConfigError::invalid(&key, "blank keyword"));
                }
                if !weight.is_finite() || *weight < 0.0 {
                    return Err(ConfigError::invalid(
                        &key,
                        format!("keyword '{}' has invalid weight {}", keyword, weight),
                    ));
                }
                if !lowered.insert(keyword.to_lowercase()) {
                    return Err(ConfigError::invalid(
                        &key,
                        format!("keyword '{}' is listed twice (case-insensitive)", keyword),
                    ));
                }
            }
        }
        Ok(())
    }

    fn validate_sentiment(&self) -> Result<(), ConfigError> {
        let sentiment = &self.analysis.sentiment;
        if !SUPPORTED_LANGUAGES.contains(&sentiment.language.as_str()) {
            return Err(ConfigError::invalid(
                "analysis.sentiment.language",
                format!("'{}' is not one of {:?}", sentiment.language, SUPPORTED_LANGUAGES),
            ));
        }
        if sentiment.min_text_length == 0 {
            return Err(ConfigError::invalid("analysis.sentiment.min_text_length", "must be positive"));
        }
        Ok(())
    }

    fn validate_quantitative(&self) -> Result<(), ConfigError> {
        let quant = &self.analysis.quantitative;
        if !(quant.impact_decay_factor > 0.0 && quant.impact_decay_factor < 1.0) {
            return Err(ConfigError::invalid(
                "analysis.quantitative.impact_decay_factor",
                "must lie strictly between 0 and 1",
            ));
        }
        if !(0.0..=1.0).contains(&quant.confidence_threshold) {
            return Err(ConfigError::invalid(
                "analysis.quantitative.confidence_threshold",
                "must lie in [0, 1]",
            ));
        }
        if quant.window_days <= 0 || quant.correlation_window <= 0 {
            return Err(ConfigError::invalid(
                "analysis.quantitative",
                "window_days and correlation_window must be positive",
            ));
        }
        if quant.rolling_windows == 0 {
            return Err(ConfigError::invalid("analysis.quantitative.rolling_windows", "must be at least 1"));
        }
        AggregationWeights::from_config(quant)?;
        Ok(())
    }

    fn validate_events(&self) -> Result<(), ConfigError> {
        let events = &self.analysis.events;
        if events.min_articles == 0 {
            return Err(ConfigError::invalid("analysis.events.min_articles", "must be at least 1"));
        }
        if events.lookback_days <= 0 || events.offset_days <= 0 || events.match_tolerance_days < 0 {
            return Err(ConfigError::invalid("analysis.events", "day counts must be positive"));
        }
        if events.similar_events_limit <= 0 {
            return Err(ConfigError::invalid("analysis.events.similar_events_limit", "must be positive"));
        }
        Ok(())
    }

    fn validate_attribution(&self) -> Result<(), ConfigError> {
        let attribution = &self.attribution;
        if attribution.lookback_period <= 0 {
            return Err(ConfigError::invalid("attribution.lookback_period", "must be positive"));
        }
        if attribution.match_tolerance_days < 0 {
            return Err(ConfigError::invalid("attribution.match_tolerance_days", "must not be negative"));
        }
        let mut names = HashSet::new();
        for factor in &attribution.factors {
            if factor.name == crate::models::UNEXPLAINED {
                return Err(ConfigError::invalid(
                    "attribution.factors",
                    format!("'{}' is reserved for the residual bucket", crate::models::UNEXPLAINED),
                ));
            }
            if !names.insert(factor.name.as_str()) {
                return Err(ConfigError::invalid(
                    "attribution.factors",
                    format!("duplicate factor '{}'", factor.name),
                ));
            }
            if factor.source == AttributionSource::Indicator && factor.indicator.is_none() {
                return Err(ConfigError::Missing(format!("attribution.factors.{}.indicator", factor.name)));
            }
        }
        for (asset_type, annual) in &attribution.benchmark_returns {
            if !annual.is_finite() || *annual <= -1.0 {
                return Err(ConfigError::invalid(
                    format!("attribution.benchmark_returns.{}", asset_type),
                    "must be a finite return above -100%",
                ));
            }
        }
        Ok(())
    }

    fn validate_pipeline(&self) -> Result<(), ConfigError> {
        let pipeline = &self.pipeline;
        if pipeline.max_concurrency == 0 {
            return Err(ConfigError::invalid("pipeline.max_concurrency", "must be at least 1"));
        }
        if pipeline.retry.max_attempts == 0 {
            return Err(ConfigError::invalid("pipeline.retry.max_attempts", "must be at least 1"));
        }
        if pipeline.retry.timeout_secs == 0 {
            return Err(ConfigError::invalid("pipeline.retry.timeout_secs", "must be positive"));
        }
        Ok(())
    }
}

/// Impact-factor rules shared by both models:
/// - the target must be an adjustable parameter of the model
/// - negative weights need `allow_negative`
/// - per target, the absolute weights may not exceed 1, so a clamped impact
///   can never flip the parameter's sign
fn validate_model_factors(
    model: ModelKind,
    factors: &[ImpactFactorConfig],
    parameter_names: &[&str],
) -> Result<(), ConfigError> {
    let prefix = format!("model_integration.{}.impact_factors", model.as_str());
    let mut abs_weight_by_target: HashMap<&str, f64> = HashMap::new();
    let mut names = HashSet::new();

    for factor in factors {
        let key = format!("{}.{}", prefix, factor.name);
        if !names.insert((factor.name.as_str(), factor.target.as_str())) {
            return Err(ConfigError::invalid(&key, "factor listed twice for the same target"));
        }
        if !parameter_names.contains(&factor.target.as_str()) {
            return Err(ConfigError::invalid(
                &key,
                format!("unknown target '{}', expected one of {:?}", factor.target, parameter_names),
            ));
        }
        if !factor.weight.is_finite() {
            return Err(ConfigError::invalid(&key, "weight must be finite"));
        }
        if factor.weight < 0.0 && !factor.allow_negative {
            return Err(ConfigError::invalid(
                &key,
                "negative weight requires allow_negative: true",
            ));
        }
        if factor.source == FactorSource::Indicators
            && factor.indicator.is_none()
            && integration_service::default_indicator_for(&factor.name).is_none()
        {
            return Err(ConfigError::Missing(format!("{}.indicator", key)));
        }
        *abs_weight_by_target.entry(factor.target.as_str()).or_insert(0.0) += factor.weight.abs();
    }

    for (target, total) in abs_weight_by_target {
        if total > 1.0 + WEIGHT_SUM_TOLERANCE {
            return Err(ConfigError::invalid(
                &prefix,
                format!("absolute weights targeting '{}' sum to {} (> 1)", target, total),
            ));
        }
    }
    Ok(())
}

fn default_true() -> bool {
    true
}
fn default_max_connections() -> u32 {
    10
}
fn default_news_api_url() -> String {
    "https://newsapi.org/v2".to_string()
}
fn default_language() -> String {
    "zh".to_string()
}
fn default_days_back() -> i64 {
    1
}
fn default_page_size() -> u32 {
    100
}
fn default_requests_per_minute() -> u32 {
    30
}
fn default_sentiment_method() -> SentimentMethod {
    SentimentMethod::Lexicon
}
fn default_min_text_length() -> usize {
    40
}
fn default_window_days() -> i64 {
    7
}
fn default_rolling_windows() -> usize {
    4
}
fn default_keyword_saturation() -> f64 {
    1.0
}
fn default_event_lookback_days() -> i64 {
    7
}
fn default_min_articles() -> usize {
    5
}
fn default_impact_targets() -> Vec<String> {
    ["gdp", "interest_rates", "cpi", "commodity_prices"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_offset_days() -> i64 {
    30
}
fn default_match_tolerance_days() -> i64 {
    7
}
fn default_attribution_tolerance_days() -> i64 {
    3
}
fn default_similar_events_limit() -> i64 {
    10
}
fn default_benchmark_returns() -> BTreeMap<String, f64> {
    BTreeMap::from([("stock".to_string(), 0.10), ("commodity".to_string(), 0.05)])
}
fn default_benchmark_return() -> f64 {
    0.07
}
fn default_report_format() -> ReportFormat {
    ReportFormat::Csv
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("reports")
}
fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    500
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_concurrency() -> usize {
    8
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const MINIMAL: &str = r#"
analysis:
  keyword_filter:
    categories:
      monetary_policy:
        加息: 0.9
        央行: 0.7
  sentiment:
    language: zh
  quantitative:
    correlation_window: 365
    impact_decay_factor: 0.95
    confidence_threshold: 0.5
    keyword_weight: 0.4
    sentiment_weight: 0.6
attribution:
  lookback_period: 90
"#;

    #[test]
    fn test_minimal_config_validates() {
        let config = AppConfig::from_yaml_str(MINIMAL).unwrap();
        assert_eq!(config.analysis.quantitative.window_days, 7);
        assert_eq!(config.indicators.duplicate_policy, DuplicatePolicy::Upsert);
        assert_eq!(config.attribution.benchmark_for("stock"), 0.10);
        assert_eq!(config.attribution.benchmark_for("bond"), 0.07);
    }

    #[test]
    fn test_missing_sentiment_weight_is_rejected() {
        let raw = MINIMAL.replace("    sentiment_weight: 0.6\n", "");
        let err = AppConfig::from_yaml_str(&raw).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(ref key) if key.ends_with("sentiment_weight")));
    }

    #[test]
    fn test_weights_must_sum_to_one() {
        let raw = MINIMAL.replace("sentiment_weight: 0.6", "sentiment_weight: 0.5");
        assert!(matches!(
            AppConfig::from_yaml_str(&raw),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_decay_factor_bounds() {
        let raw = MINIMAL.replace("impact_decay_factor: 0.95", "impact_decay_factor: 1.0");
        assert!(AppConfig::from_yaml_str(&raw).is_err());
    }

    #[test]
    fn test_historical_window_alias() {
        let raw = MINIMAL.replace("correlation_window", "historical_correlation_window");
        let config = AppConfig::from_yaml_str(&raw).unwrap();
        assert_eq!(config.analysis.quantitative.correlation_window, 365);
    }

    #[test]
    fn test_infinite_saturation_is_rejected() {
        let raw = MINIMAL.replace("  quantitative:\n", "  quantitative:\n    keyword_saturation: .inf\n");
        assert!(matches!(
            AppConfig::from_yaml_str(&raw),
            Err(ConfigError::Invalid { ref key, .. }) if key.ends_with("keyword_saturation")
        ));
    }

    #[test]
    fn test_attribution_tolerance_is_its_own_setting() {
        let config = AppConfig::from_yaml_str(MINIMAL).unwrap();
        assert_eq!(config.attribution.match_tolerance_days, 3);
        assert_eq!(config.analysis.events.match_tolerance_days, 7);

        let raw = MINIMAL.replace("  lookback_period: 90\n", "  lookback_period: 90\n  match_tolerance_days: 1\n");
        let config = AppConfig::from_yaml_str(&raw).unwrap();
        assert_eq!(config.attribution.match_tolerance_days, 1);
        assert_eq!(config.analysis.events.match_tolerance_days, 7);

        let raw = MINIMAL.replace("  lookback_period: 90\n", "  lookback_period: 90\n  match_tolerance_days: -2\n");
        assert!(AppConfig::from_yaml_str(&raw).is_err());
    }
}
