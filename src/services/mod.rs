pub mod keyword_service;
pub mod sentiment_service;
pub mod quantitative_service;
pub mod correlation_service;
pub mod event_service;
pub mod indicator_service;
pub mod integration_service;
pub mod valuation_service;
pub mod attribution_service;
pub mod report_service;
pub mod decision_service;
pub mod pipeline_service;
pub mod retry;
pub mod failure_cache;
pub mod rate_limiter;
