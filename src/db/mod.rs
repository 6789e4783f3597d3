pub mod article_queries;
pub mod keyword_queries;
pub mod sentiment_queries;
pub mod event_queries;
pub mod indicator_queries;
pub mod adjustment_queries;
pub mod decision_queries;
pub mod attribution_queries;
pub mod source_status_queries;
pub mod impact_queries;
pub mod correlation_queries;
