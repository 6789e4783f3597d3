mod article;
mod keyword;
mod sentiment;
mod event;
mod indicator;
mod impact;
mod correlation;
mod adjustment;
mod decision;
mod attribution;
mod run;

pub use article::{Article, CreateArticle, SourceType};
pub use keyword::{CategorizationResult, DatedKeywordMatch, KeywordMatch, TrendingKeyword};
pub use sentiment::{DatedSentiment, ScoreQuality, SentimentResult, SentimentScore, SentimentTrendPoint, TrendInterval};
pub use event::{CreateMacroEvent, EventImpact, EventSentiment, ImpactType, MacroEvent, TimeHorizon};
pub use indicator::{
    price_indicator_name, CreateEconomicIndicator, DuplicatePolicy, EconomicIndicator, IndicatorKey,
    InsertOutcome, PRICE_INDICATOR_PREFIX,
};
pub use impact::{AggregateStatus, CategoryImpact, ScoredArticle};
pub use correlation::{
    CorrelationOutcome, CorrelationSample, EventCorrelation, EventWindowStudy, ImpactDirection, ImpactStrength,
    WeightedCorrelation,
};
pub use adjustment::{
    CommodityForecast, CommodityParameters, DcfBaseline, DcfValuation, ModelAdjustment, ModelKind,
    ModelParameters,
};
pub use decision::{CreateInvestmentDecision, DecisionType, InvestmentDecision};
pub use attribution::{AttributionRecord, AttributionResult, FactorExposure, FitStatus, ReturnMetrics, UNEXPLAINED};
pub use run::{RunMode, RunSummary, Stage, StageSummary};
