use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use futures::stream::{self, StreamExt};
use sqlx::PgPool;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::{AppConfig, AttributionFactorConfig, AttributionSource, ModelConfig};
use crate::db::keyword_queries::ArticleCategoryScore;
use crate::db::{
    adjustment_queries, article_queries, attribution_queries, correlation_queries, decision_queries, event_queries,
    impact_queries, indicator_queries, keyword_queries, sentiment_queries, source_status_queries,
};
use crate::errors::AppError;
use crate::external::newsapi::NewsApiProvider;
use crate::external::provider::ArticleProvider;
use crate::external::rss_feed::RssFeedProvider;
use crate::models::{
    price_indicator_name, CorrelationSample, CreateArticle, CreateMacroEvent, DatedSentiment, DecisionType, FactorExposure,
    InvestmentDecision, ModelKind, ModelParameters, RunMode, RunSummary, ScoredArticle, Stage, StageSummary,
    TrendInterval,
};
use crate::services::attribution_service::{
    align_to_dates, compute_returns, decompose, exposures_from_fit, fit_factor_betas, level_changes, period_returns,
};
use crate::services::correlation_service::{correlation_record, indicator_change};
use crate::services::event_service::{self, derive_impact, identify_events, impact_observations};
use crate::services::failure_cache::{SourceFailure, SourceFailureCache};
use crate::services::integration_service::{apply_factors, resolve_factor, FactorEvidence, ResolvedFactor};
use crate::services::keyword_service::KeywordCategorizer;
use crate::services::quantitative_service::{rolling_impacts, AggregationWeights};
use crate::services::rate_limiter::RequestThrottle;
use crate::services::report_service::{write_report, AttributionReportRow};
use crate::services::retry::{with_retry, RetryPolicy};
use crate::services::sentiment_service::SentimentScorer;
use crate::services::valuation_service;

/// Runs the stages in order: fetch, analysis (keywords, sentiment,
/// aggregation, events, correlation), integration, attribution.
///
/// Stages only talk through the database, so any suffix of the pipeline can
/// be rerun on its own. A failed record is counted and the run moves on.
pub struct PipelineRunner {
    pool: PgPool,
    config: Arc<AppConfig>,
    categorizer: KeywordCategorizer,
    scorer: SentimentScorer,
    weights: AggregationWeights,
    retry: RetryPolicy,
    failures: SourceFailureCache,
    client: reqwest::Client,
}

impl PipelineRunner {
    pub fn new(pool: PgPool, config: Arc<AppConfig>) -> Result<Self, AppError> {
        let categorizer = KeywordCategorizer::from_config(&config.analysis.keyword_filter)?;
        let scorer = SentimentScorer::from_config(&config.analysis.sentiment);
        let weights = AggregationWeights::from_config(&config.analysis.quantitative)?;
        let retry = RetryPolicy::from_config(&config.pipeline.retry);
        let client = reqwest::Client::builder()
            .timeout(retry.timeout)
            .user_agent(concat!("macrolens/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::External(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            pool,
            config,
            categorizer,
            scorer,
            weights,
            retry,
            failures: SourceFailureCache::new(),
            client,
        })
    }

    pub async fn run(&self, mode: RunMode) -> RunSummary {
        let now = Utc::now();
        let today = now.date_naive();
        let run_id = Uuid::new_v4();
        info!("🚀 Starting {:?} run {}", mode, run_id);

        let mut summary = RunSummary::default();
        if mode.runs_fetch() {
            summary.push(self.fetch_stage(now).await);
        }
        if mode.runs_analysis() {
            summary.push(self.keyword_stage(now).await);
            summary.push(self.sentiment_stage(run_id, now).await);
            summary.push(self.aggregation_stage(now).await);
            summary.push(self.event_stage(today).await);
            summary.push(self.correlation_stage(today).await);
        }
        if mode.runs_integration() {
            summary.push(self.integration_stage(today).await);
        }
        if mode.runs_attribution() {
            summary.push(self.attribution_stage(now).await);
        }

        for stage in &summary.stages {
            info!(
                "📋 {}: {} processed, {} skipped, {} failed",
                stage.stage, stage.processed, stage.skipped, stage.failed
            );
        }
        summary
    }

    fn concurrency(&self) -> usize {
        self.config.pipeline.max_concurrency.max(1)
    }

    /// A database call under the run's timeout and retry budget.
    async fn query<T, F, Fut>(&self, label: &str, mut call: F) -> Result<T, AppError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, sqlx::Error>>,
    {
        with_retry(&self.retry, label, || {
            let fut = call();
            async move { fut.await.map_err(AppError::from) }
        })
        .await
    }

    // ==============================================
    // Fetch
    // ==============================================

    fn providers(&self, summary: &mut StageSummary) -> Vec<Arc<dyn ArticleProvider>> {
        let sources = &self.config.data_sources;
        let mut providers: Vec<Arc<dyn ArticleProvider>> = Vec::new();

        if sources.rss.enabled {
            for source in &sources.rss.sources {
                providers.push(Arc::new(RssFeedProvider::new(self.client.clone(), source.clone())));
            }
        }
        if sources.news_api.enabled {
            let throttle = Arc::new(RequestThrottle::new(
                self.concurrency(),
                sources.news_api.requests_per_minute,
            ));
            for keyword in &sources.news_api.keywords {
                match NewsApiProvider::new(self.client.clone(), throttle.clone(), &sources.news_api, keyword) {
                    Ok(provider) => providers.push(Arc::new(provider)),
                    Err(e) => {
                        warn!("⚠️ Skipping NewsAPI query '{}': {}", keyword, e);
                        summary.skipped += 1;
                    }
                }
            }
        }
        providers
    }

    /// Counts: processed = articles stored, skipped = duplicates and sources
    /// still backing off, failed = sources or inserts that ran out of retries.
    async fn fetch_stage(&self, now: DateTime<Utc>) -> StageSummary {
        let mut summary = StageSummary::new(Stage::Fetch);
        let providers = self.providers(&mut summary);
        let since = now - Duration::days(self.config.data_sources.news_api.days_back);
        info!("📰 Fetching from {} sources since {}", providers.len(), since.format("%Y-%m-%d"));

        let fetched: Vec<Result<Option<Vec<CreateArticle>>, AppError>> = stream::iter(providers)
            .map(|provider| self.fetch_source(provider, since, now))
            .buffer_unordered(self.concurrency())
            .collect()
            .await;

        // the same story often comes through several feeds
        let mut by_url: BTreeMap<String, CreateArticle> = BTreeMap::new();
        for outcome in fetched {
            match outcome {
                Ok(Some(batch)) => {
                    for article in batch {
                        if by_url.contains_key(&article.url) {
                            summary.skipped += 1;
                        } else {
                            by_url.insert(article.url.clone(), article);
                        }
                    }
                }
                Ok(None) => summary.skipped += 1,
                Err(e) => {
                    warn!("⚠️ Source fetch failed: {}", e);
                    summary.failed += 1;
                }
            }
        }

        let outcomes: Vec<Result<Option<()>, AppError>> = stream::iter(by_url.into_values())
            .map(|article| async move {
                let id = self
                    .query("insert article", || article_queries::insert_article(&self.pool, &article))
                    .await?;
                Ok(id.map(|_| ()))
            })
            .buffer_unordered(self.concurrency())
            .collect()
            .await;
        tally(&mut summary, outcomes);
        summary
    }

    async fn fetch_source(
        &self,
        provider: Arc<dyn ArticleProvider>,
        since: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Option<Vec<CreateArticle>>, AppError> {
        let name = provider.name().to_string();
        let source_type = provider.source_type();

        if let Some(info) = self.failures.check(source_type, &name, now) {
            debug!("Skipping {} source {} until {}", source_type, name, info.retry_after);
            return Ok(None);
        }

        let label = format!("{} fetch {}", source_type, name);
        let result = with_retry(&self.retry, &label, || {
            let provider = provider.clone();
            async move { provider.fetch_articles(since).await.map_err(AppError::from) }
        })
        .await;

        match result {
            Ok(articles) => {
                self.failures.clear(source_type, &name);
                if let Err(e) = source_status_queries::record_success(&self.pool, &name, source_type).await {
                    warn!("Failed to record status for {}: {}", name, e);
                }
                info!("✓ {} {}: {} articles", source_type, name, articles.len());
                Ok(Some(articles))
            }
            Err(e) => {
                self.failures.record(source_type, &name, SourceFailure::from_error(&e), now);
                if let Err(db) =
                    source_status_queries::record_failure(&self.pool, &name, source_type, &e.to_string()).await
                {
                    warn!("Failed to record status for {}: {}", name, db);
                }
                Err(e)
            }
        }
    }

    // ==============================================
    // Analysis
    // ==============================================

    async fn keyword_stage(&self, now: DateTime<Utc>) -> StageSummary {
        let mut summary = StageSummary::new(Stage::Keywords);
        let config = &self.config.analysis.keyword_filter;
        if !config.enabled {
            info!("Keyword filter disabled");
            return summary;
        }

        let since = now - Duration::days(config.days_back);
        let articles = match self
            .query("load articles", || article_queries::fetch_articles_since(&self.pool, since))
            .await
        {
            Ok(articles) => articles,
            Err(e) => {
                error!("❌ Keyword stage could not load articles: {}", e);
                summary.failed += 1;
                return summary;
            }
        };
        info!("🔎 Categorizing {} articles", articles.len());

        let outcomes: Vec<Result<Option<()>, AppError>> = stream::iter(articles.iter())
            .map(|article| async move {
                let result = self.categorizer.categorize(article.id, &article.title, &article.content);
                self.query("store keyword matches", || {
                    keyword_queries::replace_matches(&self.pool, article.id, &result.matches)
                })
                .await?;
                Ok(result.has_matches().then_some(()))
            })
            .buffer_unordered(self.concurrency())
            .collect()
            .await;
        tally(&mut summary, outcomes);
        summary
    }

    async fn sentiment_stage(&self, run_id: Uuid, now: DateTime<Utc>) -> StageSummary {
        let mut summary = StageSummary::new(Stage::Sentiment);
        let config = &self.config.analysis.sentiment;
        if !config.enabled {
            info!("Sentiment analysis disabled");
            return summary;
        }

        let since = now - Duration::days(config.days_back);
        let articles = match self
            .query("load articles", || article_queries::fetch_articles_since(&self.pool, since))
            .await
        {
            Ok(articles) => articles,
            Err(e) => {
                error!("❌ Sentiment stage could not load articles: {}", e);
                summary.failed += 1;
                return summary;
            }
        };
        info!("💬 Scoring sentiment of {} articles (run {})", articles.len(), run_id);

        let outcomes: Vec<Result<Option<()>, AppError>> = stream::iter(articles.iter())
            .map(|article| async move {
                let score = self
                    .scorer
                    .score_article(&article.title, &article.content, Some(&article.language));
                let result = crate::models::SentimentResult::new(article.id, run_id, score);
                self.query("store sentiment", || sentiment_queries::upsert_sentiment(&self.pool, &result))
                    .await?;
                Ok(Some(()))
            })
            .buffer_unordered(self.concurrency())
            .collect()
            .await;
        tally(&mut summary, outcomes);
        summary
    }

    /// Scores and stores every (category, window) pair of the rolling windows
    /// ending today. Insufficient windows are stored too and count as skipped.
    async fn aggregation_stage(&self, now: DateTime<Utc>) -> StageSummary {
        let mut summary = StageSummary::new(Stage::Aggregation);
        let config = &self.config.analysis.quantitative;
        if !config.enabled {
            info!("Quantitative aggregation disabled");
            return summary;
        }

        let today = now.date_naive();
        let span = config.window_days * config.rolling_windows as i64;
        let since = start_of_day(today - Duration::days(span));

        let loaded = async {
            let scores = self
                .query("load category scores", || {
                    keyword_queries::fetch_category_scores_since(&self.pool, since)
                })
                .await?;
            let sentiments = self
                .query("load sentiment", || sentiment_queries::latest_sentiment_since(&self.pool, since))
                .await?;
            Ok::<_, AppError>((scores, sentiments))
        }
        .await;
        let (scores, sentiments) = match loaded {
            Ok(loaded) => loaded,
            Err(e) => {
                error!("❌ Aggregation stage could not load scores: {}", e);
                summary.failed += 1;
                return summary;
            }
        };

        let articles = join_scored_articles(&scores, &sentiments);
        let impacts = rolling_impacts(
            &articles,
            today,
            config.window_days,
            config.rolling_windows,
            config.confidence_threshold,
            &self.weights,
        );

        let outcomes: Vec<Result<Option<()>, AppError>> = stream::iter(impacts.iter())
            .map(|impact| async move {
                self.query("store category impact", || {
                    impact_queries::upsert_category_impact(&self.pool, impact)
                })
                .await?;
                match impact.scored_impact() {
                    Some((score, confidence)) => {
                        info!(
                            "📊 {} {}..{}: impact {:+.3}, confidence {:.2} ({} included, {} excluded)",
                            impact.category,
                            impact.window_start,
                            impact.window_end,
                            score,
                            confidence,
                            impact.included,
                            impact.excluded
                        );
                        Ok(Some(()))
                    }
                    None => {
                        debug!(
                            "{} {}..{}: insufficient ({} excluded)",
                            impact.category, impact.window_start, impact.window_end, impact.excluded
                        );
                        Ok(None)
                    }
                }
            })
            .buffer_unordered(self.concurrency())
            .collect()
            .await;
        tally(&mut summary, outcomes);
        summary
    }

    async fn event_stage(&self, today: NaiveDate) -> StageSummary {
        let mut summary = StageSummary::new(Stage::Events);
        let config = &self.config.analysis.events;
        if !config.enabled {
            info!("Event identification disabled");
            return summary;
        }

        let since = start_of_day(today - Duration::days(config.lookback_days));
        let matches = match self
            .query("load keyword matches", || keyword_queries::fetch_matches_since(&self.pool, since))
            .await
        {
            Ok(matches) => matches,
            Err(e) => {
                error!("❌ Event stage could not load keyword matches: {}", e);
                summary.failed += 1;
                return summary;
            }
        };

        let candidates = identify_events(&matches, config, today);
        info!(
            "🗓️ {} candidate events from {} matched articles",
            candidates.len(),
            event_service::matched_article_count(&matches)
        );

        let outcomes: Vec<Result<Option<()>, AppError>> = stream::iter(candidates.iter())
            .map(|candidate| self.record_event(candidate, today))
            .buffer_unordered(self.concurrency())
            .collect()
            .await;
        tally(&mut summary, outcomes);
        summary
    }

    /// Fold a candidate into the category's recent event if one exists,
    /// otherwise create it, then refresh the event's impacts.
    async fn record_event(&self, candidate: &CreateMacroEvent, today: NaiveDate) -> Result<Option<()>, AppError> {
        let config = &self.config.analysis.events;
        let recent_since = today - Duration::days(config.lookback_days);

        let existing = self
            .query("find recent event", || {
                event_queries::find_recent_event(&self.pool, &candidate.category, recent_since)
            })
            .await?;

        let (event_id, start_date) = match existing {
            Some(event) => {
                let linked = self
                    .query("extend event", || {
                        event_queries::extend_event(
                            &self.pool,
                            event.id,
                            candidate.end_date,
                            candidate.importance,
                            &candidate.articles,
                        )
                    })
                    .await?;
                debug!("Event {} '{}': {} new articles linked", event.id, event.name, linked);
                (event.id, event.start_date)
            }
            None => {
                let created = self
                    .query("create event", || event_queries::create_event(&self.pool, candidate))
                    .await?;
                info!(
                    "🆕 Event '{}' ({} articles, importance {})",
                    created.name,
                    candidate.articles.len(),
                    created.importance
                );
                (created.id, created.start_date)
            }
        };

        let stored = self
            .derive_event_impacts(event_id, &candidate.category, start_date, today)
            .await?;
        debug!("Event {}: {} impacts stored", event_id, stored);
        Ok(Some(()))
    }

    /// Impacts on each configured target, estimated from what the target
    /// indicator did around earlier events of the same category.
    async fn derive_event_impacts(
        &self,
        event_id: i64,
        category: &str,
        start_date: NaiveDate,
        today: NaiveDate,
    ) -> Result<usize, AppError> {
        let config = &self.config.analysis.events;
        let quantitative = &self.config.analysis.quantitative;
        let history_start = start_date - Duration::days(quantitative.correlation_window);
        let history_end = start_date - Duration::days(1);

        let mut past = self
            .query("load past events", || {
                event_queries::event_sentiments(&self.pool, history_start, history_end, Some(category))
            })
            .await?;
        let limit = config.similar_events_limit.max(0) as usize;
        if past.len() > limit {
            past.drain(..past.len() - limit);
        }
        let (Some(earliest), Some(latest)) = (past.first(), past.last()) else {
            debug!("No earlier {} events before {}", category, start_date);
            return Ok(0);
        };

        let margin = Duration::days(config.offset_days + config.match_tolerance_days);
        let (from, to) = (earliest.start_date - margin, latest.start_date + margin);
        let aggregates = self
            .query("load category impacts", || {
                impact_queries::category_impacts_between(&self.pool, earliest.start_date, today, Some(category))
            })
            .await?;
        let mut stored = 0;

        for target in &config.impact_targets {
            let series = self
                .query("load indicator series", || {
                    indicator_queries::fetch_series(&self.pool, target, from, to)
                })
                .await?;
            let observations = impact_observations(
                &past,
                &series,
                &aggregates,
                config.offset_days,
                config.match_tolerance_days,
            );

            let Some(impact) = derive_impact(
                event_id,
                target,
                &observations,
                today,
                quantitative.correlation_window,
                quantitative.impact_decay_factor,
                config.offset_days,
            ) else {
                continue;
            };

            self.query("store impact", || event_queries::upsert_impact(&self.pool, &impact))
                .await?;
            stored += 1;
        }
        Ok(stored)
    }

    /// Correlates each keyword category with each impact target over the
    /// correlation window. Pairs without a defined coefficient are stored with
    /// their status and count as skipped.
    async fn correlation_stage(&self, today: NaiveDate) -> StageSummary {
        let mut summary = StageSummary::new(Stage::Correlation);
        let events = &self.config.analysis.events;
        if !events.enabled || events.impact_targets.is_empty() {
            info!("Event correlation disabled");
            return summary;
        }

        let pairs: Vec<(&str, &str)> = self
            .categorizer
            .category_names()
            .flat_map(move |category| events.impact_targets.iter().map(move |target| (category, target.as_str())))
            .collect();
        info!("🔗 Correlating {} category/indicator pairs", pairs.len());

        let outcomes: Vec<Result<Option<()>, AppError>> = stream::iter(pairs)
            .map(|(category, target)| self.correlate_pair(category, target, today))
            .buffer_unordered(self.concurrency())
            .collect()
            .await;
        tally(&mut summary, outcomes);
        summary
    }

    async fn correlate_pair(&self, category: &str, target: &str, today: NaiveDate) -> Result<Option<()>, AppError> {
        let config = &self.config.analysis.events;
        let quantitative = &self.config.analysis.quantitative;
        let history_start = today - Duration::days(quantitative.correlation_window);

        let past = self
            .query("load past events", || {
                event_queries::event_sentiments(&self.pool, history_start, today, Some(category))
            })
            .await?;
        let (Some(earliest), Some(latest)) = (past.first(), past.last()) else {
            debug!("No {} events to correlate with {}", category, target);
            return Ok(None);
        };

        let margin = Duration::days(config.offset_days + config.match_tolerance_days);
        let series = self
            .query("load indicator series", || {
                indicator_queries::fetch_series(
                    &self.pool,
                    target,
                    earliest.start_date - margin,
                    latest.start_date + margin,
                )
            })
            .await?;
        let aggregates = self
            .query("load category impacts", || {
                impact_queries::category_impacts_between(&self.pool, earliest.start_date, today, Some(category))
            })
            .await?;

        let samples: Vec<CorrelationSample> =
            impact_observations(&past, &series, &aggregates, config.offset_days, config.match_tolerance_days)
                .into_iter()
                .map(|o| CorrelationSample {
                    date: o.event_date,
                    event_signal: o.event_signal,
                    indicator_change: o.change,
                })
                .collect();

        let record = correlation_record(
            category,
            target,
            today,
            quantitative.correlation_window,
            quantitative.impact_decay_factor,
            config.offset_days,
            &samples,
        );
        self.query("store correlation", || correlation_queries::upsert_correlation(&self.pool, &record))
            .await?;

        match record.coefficient {
            Some(coefficient) => {
                info!(
                    "✓ {} ~ {}: r = {:+.2} ({}, {} events)",
                    category,
                    target,
                    coefficient,
                    record.strength.as_deref().unwrap_or("none"),
                    record.valid_samples
                );
                Ok(Some(()))
            }
            None => {
                debug!("{} ~ {}: {} ({} events)", category, target, record.status, record.valid_samples);
                Ok(None)
            }
        }
    }

    // ==============================================
    // Integration
    // ==============================================

    async fn integration_stage(&self, today: NaiveDate) -> StageSummary {
        let mut summary = StageSummary::new(Stage::Integration);
        let models = &self.config.model_integration;

        if models.dcf.enabled {
            self.integrate_model(ModelKind::Dcf, &models.dcf, today, &mut summary, |subject, params| {
                let valuation = valuation_service::dcf_valuation(subject, params)?;
                Ok(format!("{:.2}/share", valuation.per_share_value))
            })
            .await;
        }
        if models.commodity.enabled {
            self.integrate_model(ModelKind::Commodity, &models.commodity, today, &mut summary, |subject, params| {
                let forecast = valuation_service::commodity_forecast(subject, params)?;
                Ok(format!("{:.2} ({:+.1}%)", forecast.predicted_price, forecast.price_change * 100.0))
            })
            .await;
        }
        summary
    }

    async fn integrate_model<P, V>(
        &self,
        kind: ModelKind,
        model: &ModelConfig<P>,
        today: NaiveDate,
        summary: &mut StageSummary,
        value: V,
    ) where
        P: ModelParameters,
        V: Fn(&str, &P) -> Result<String, AppError>,
    {
        let since = today - Duration::days(model.event_lookback_days);
        let loaded = async {
            let impacts = self
                .query("load event impacts", || event_queries::impacts_since(&self.pool, since))
                .await?;
            let events = self
                .query("load event sentiment", || {
                    event_queries::event_sentiments(&self.pool, since, today, None)
                })
                .await?;
            let windows = self
                .query("load category impacts", || {
                    impact_queries::category_impacts_between(&self.pool, since, today, None)
                })
                .await?;
            Ok::<_, AppError>((impacts, events, windows))
        }
        .await;
        let (impacts, events, windows) = match loaded {
            Ok(loaded) => loaded,
            Err(e) => {
                error!("❌ {} integration could not load evidence: {}", kind, e);
                summary.failed += 1;
                return;
            }
        };
        info!(
            "🔧 Integrating {} {} subjects with {} events, {} impacts and {} category windows",
            model.subjects.len(),
            kind,
            events.len(),
            impacts.len(),
            windows.len()
        );

        let keywords = &self.config.model_integration.commodity_keywords;
        let (impacts, events, windows, value) = (&impacts, &events, &windows, &value);
        let outcomes: Vec<Result<Option<()>, AppError>> = stream::iter(model.subjects.iter())
            .map(|subject| async move {
                let evidence = FactorEvidence {
                    impacts,
                    events,
                    category_impacts: windows,
                    subject_keywords: keywords.get(subject).map(Vec::as_slice).unwrap_or(&[]),
                };
                let factors: Vec<ResolvedFactor> = model
                    .impact_factors
                    .iter()
                    .filter_map(|factor| resolve_factor(factor, &evidence))
                    .collect();

                let baseline = model.baseline_for(subject);
                let (adjusted, adjustments) = apply_factors(subject, &baseline, &factors, today);
                for adjustment in &adjustments {
                    self.query("store adjustment", || {
                        adjustment_queries::upsert_adjustment(&self.pool, kind, adjustment)
                    })
                    .await?;
                }

                let before = value(subject, &baseline)?;
                let after = value(subject, &adjusted)?;
                info!(
                    "✓ {} {}: {} adjustments, {} -> {}",
                    kind,
                    subject,
                    adjustments.len(),
                    before,
                    after
                );
                Ok((!adjustments.is_empty()).then_some(()))
            })
            .buffer_unordered(self.concurrency())
            .collect()
            .await;
        tally(summary, outcomes);
    }

    // ==============================================
    // Attribution
    // ==============================================

    async fn attribution_stage(&self, now: DateTime<Utc>) -> StageSummary {
        let mut summary = StageSummary::new(Stage::Attribution);
        let config = &self.config.attribution;
        if !config.enabled {
            info!("Attribution disabled");
            return summary;
        }

        let decisions = match self
            .query("load decisions", || decision_queries::list_decisions(&self.pool))
            .await
        {
            Ok(decisions) => decisions,
            Err(e) => {
                error!("❌ Attribution stage could not load decisions: {}", e);
                summary.failed += 1;
                return summary;
            }
        };
        info!("🧮 Attributing {} decisions", decisions.len());

        let outcomes: Vec<Result<Option<AttributionReportRow>, AppError>> = stream::iter(decisions.iter())
            .map(|decision| self.attribute_decision(decision, now))
            .buffer_unordered(self.concurrency())
            .collect()
            .await;
        let mut rows = tally(&mut summary, outcomes);
        rows.sort_by_key(|row| row.result.decision_id);

        if !rows.is_empty() {
            if let Err(e) = write_report(&rows, config.report_format, &config.output_dir) {
                error!("❌ Failed to write attribution report: {}", e);
                summary.failed += 1;
            }
        }
        summary
    }

    async fn attribute_decision(
        &self,
        decision: &InvestmentDecision,
        now: DateTime<Utc>,
    ) -> Result<Option<AttributionReportRow>, AppError> {
        let config = &self.config.attribution;
        let kind = decision.decision().ok_or_else(|| {
            AppError::Validation(format!(
                "decision {}: unknown decision type '{}'",
                decision.id, decision.decision_type
            ))
        })?;
        let today = now.date_naive();
        let price_name = price_indicator_name(&decision.symbol);

        let Some(current) = self
            .query("load current price", || {
                indicator_queries::latest_on_or_before(&self.pool, &price_name, today)
            })
            .await?
        else {
            warn!("No price for {}, skipping decision {}", decision.symbol, decision.id);
            return Ok(None);
        };

        let metrics = compute_returns(decision, current.value, now, config.benchmark_for(&decision.asset_type))?;
        let names: Vec<String> = config.factors.iter().map(|f| f.name.clone()).collect();
        let exposures = self.factor_exposures(decision, kind, &names, today).await?;
        if exposures.is_none() && !names.is_empty() {
            debug!("Decision {}: factor fit unavailable, excess left unexplained", decision.id);
        }

        let result = decompose(decision.id, now, &metrics, &names, exposures.as_deref())?;
        self.query("store attribution", || attribution_queries::insert_attribution(&self.pool, &result))
            .await?;

        Ok(Some(AttributionReportRow {
            symbol: decision.symbol.clone(),
            asset_type: decision.asset_type.clone(),
            decision_type: kind.as_str().to_string(),
            result,
        }))
    }

    /// Betas fitted over the lookback window before the decision, paired with
    /// each factor's move over the holding period. None when any series is
    /// missing or the regression cannot be fitted.
    async fn factor_exposures(
        &self,
        decision: &InvestmentDecision,
        kind: DecisionType,
        names: &[String],
        today: NaiveDate,
    ) -> Result<Option<Vec<FactorExposure>>, AppError> {
        let config = &self.config.attribution;
        if config.factors.is_empty() {
            return Ok(None);
        }
        let tolerance = config.match_tolerance_days;
        let entry = decision.decision_date.date_naive();
        let window_start = entry - Duration::days(config.lookback_period);
        let price_name = price_indicator_name(&decision.symbol);

        let prices = self
            .query("load price history", || {
                indicator_queries::fetch_series(&self.pool, &price_name, window_start, entry)
            })
            .await?;
        let dates: Vec<NaiveDate> = prices.iter().map(|p| p.date).collect();
        let values: Vec<f64> = prices.iter().map(|p| p.value).collect();
        let asset_returns = period_returns(&values);

        let mut factor_series = Vec::with_capacity(config.factors.len());
        let mut holding_moves = Vec::with_capacity(config.factors.len());
        for factor in &config.factors {
            let points = self.factor_points(factor, window_start, today).await?;
            let (Some(aligned), Some(ends)) = (
                align_to_dates(&points, &dates, tolerance),
                align_to_dates(&points, &[entry, today], tolerance),
            ) else {
                debug!("Factor {} has gaps around decision {}", factor.name, decision.id);
                return Ok(None);
            };

            let (changes, holding_move) = match factor.source {
                AttributionSource::Indicator => (period_returns(&aligned), indicator_change(ends[0], ends[1])),
                AttributionSource::Sentiment => (level_changes(&aligned), Some(ends[1] - ends[0])),
            };
            let Some(holding_move) = holding_move else {
                return Ok(None);
            };
            factor_series.push(changes);
            holding_moves.push(holding_move);
        }

        Ok(fit_factor_betas(&asset_returns, &factor_series)
            .map(|betas| exposures_from_fit(names, &betas, &holding_moves, kind)))
    }

    async fn factor_points(
        &self,
        factor: &AttributionFactorConfig,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<(NaiveDate, f64)>, AppError> {
        match factor.source {
            AttributionSource::Indicator => {
                let name = factor.indicator.as_deref().unwrap_or(&factor.name);
                let rows = self
                    .query("load factor series", || indicator_queries::fetch_series(&self.pool, name, from, to))
                    .await?;
                Ok(rows.into_iter().map(|row| (row.date, row.value)).collect())
            }
            AttributionSource::Sentiment => {
                let since = start_of_day(from);
                let points = self
                    .query("load sentiment trend", || {
                        sentiment_queries::sentiment_trend(&self.pool, since, TrendInterval::Day)
                    })
                    .await?;
                Ok(points
                    .into_iter()
                    .map(|point| (point.period.date_naive(), point.avg_polarity))
                    .collect())
            }
        }
    }
}

/// Add per-record outcomes to a stage summary: `Some` is processed, `None`
/// skipped. Insufficient data counts as skipped, anything else as failed.
fn tally<T>(summary: &mut StageSummary, outcomes: Vec<Result<Option<T>, AppError>>) -> Vec<T> {
    let mut kept = Vec::new();
    for outcome in outcomes {
        match outcome {
            Ok(Some(value)) => {
                summary.processed += 1;
                kept.push(value);
            }
            Ok(None) => summary.skipped += 1,
            Err(AppError::DataQuality(msg)) => {
                warn!("⚠️ {}: {}", summary.stage, msg);
                summary.skipped += 1;
            }
            Err(e @ AppError::Invariant(_)) => {
                error!("❌ {}: {}", summary.stage, e);
                summary.failed += 1;
            }
            Err(e) => {
                warn!("⚠️ {} record failed: {}", summary.stage, e);
                summary.failed += 1;
            }
        }
    }
    kept
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

/// Join per-article category scores with each article's latest sentiment.
/// Articles without a sentiment row are left out.
pub fn join_scored_articles(scores: &[ArticleCategoryScore], sentiments: &[DatedSentiment]) -> Vec<ScoredArticle> {
    let mut by_article: BTreeMap<i64, BTreeMap<String, f64>> = BTreeMap::new();
    for score in scores {
        by_article
            .entry(score.article_id)
            .or_default()
            .insert(score.category.clone(), score.score);
    }

    sentiments
        .iter()
        .filter_map(|sentiment| {
            let category_scores = by_article.get(&sentiment.article_id)?;
            Some(ScoredArticle {
                article_id: sentiment.article_id,
                published_date: sentiment.published_date.date_naive(),
                category_scores: category_scores.clone(),
                polarity: sentiment.polarity,
                confidence: sentiment.confidence,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(article_id: i64, category: &str, score: f64) -> ArticleCategoryScore {
        ArticleCategoryScore {
            article_id,
            category: category.to_string(),
            score,
        }
    }

    fn sentiment(article_id: i64, polarity: f64) -> DatedSentiment {
        DatedSentiment {
            article_id,
            published_date: Utc.with_ymd_and_hms(2024, 3, 5, 9, 30, 0).unwrap(),
            polarity,
            subjectivity: 0.4,
            confidence: 0.8,
        }
    }

    #[test]
    fn test_join_groups_categories_per_article() {
        let scores = vec![
            score(1, "monetary_policy", 1.6),
            score(1, "inflation", 0.8),
            score(2, "trade_policy", 0.9),
        ];
        let sentiments = vec![sentiment(1, 0.2), sentiment(3, -0.5)];

        let joined = join_scored_articles(&scores, &sentiments);
        assert_eq!(joined.len(), 1);
        assert_eq!(joined[0].article_id, 1);
        assert_eq!(joined[0].category_scores.len(), 2);
        assert_eq!(joined[0].published_date, NaiveDate::from_ymd_opt(2024, 3, 5).unwrap());
    }

    #[test]
    fn test_tally_classifies_outcomes() {
        let mut summary = StageSummary::new(Stage::Events);
        let kept = tally(
            &mut summary,
            vec![
                Ok(Some(1)),
                Ok(None),
                Err(AppError::DataQuality("thin".into())),
                Err(AppError::Invariant("broken".into())),
                Err(AppError::Timeout(30)),
            ],
        );
        assert_eq!(kept, vec![1]);
        assert_eq!((summary.processed, summary.skipped, summary.failed), (1, 2, 2));
    }

    #[test]
    fn test_start_of_day() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        assert_eq!(start_of_day(date), Utc.with_ymd_and_hms(2024, 3, 5, 0, 0, 0).unwrap());
    }
}
