use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

use crate::errors::AppError;
use crate::models::SourceType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFailure {
    /// Feed or API could not be reached.
    Unreachable,
    /// Provider asked us to slow down.
    RateLimited,
    /// Reachable, but the payload could not be parsed.
    Malformed,
}

impl SourceFailure {
    /// Classify a failed fetch after retries ran out.
    pub fn from_error(error: &AppError) -> Self {
        match error {
            AppError::RateLimited => SourceFailure::RateLimited,
            AppError::DataQuality(_) => SourceFailure::Malformed,
            _ => SourceFailure::Unreachable,
        }
    }

    fn backoff(&self) -> Duration {
        match self {
            SourceFailure::Unreachable => Duration::minutes(30),
            SourceFailure::RateLimited => Duration::minutes(15),
            SourceFailure::Malformed => Duration::hours(6),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SourceFailureInfo {
    pub failed_at: DateTime<Utc>,
    pub failure: SourceFailure,
    pub retry_after: DateTime<Utc>,
}

/// Sources that failed recently, shared across concurrent fetches so one bad
/// feed is not hammered within a run or across runs of a long-lived process.
#[derive(Clone, Default)]
pub struct SourceFailureCache {
    entries: Arc<DashMap<(SourceType, String), SourceFailureInfo>>,
}

impl SourceFailureCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The live failure for a source, dropping it once its backoff expired.
    pub fn check(&self, source_type: SourceType, name: &str, now: DateTime<Utc>) -> Option<SourceFailureInfo> {
        let key = (source_type, name.to_string());
        let info = self.entries.get(&key).map(|entry| entry.value().clone())?;
        if now < info.retry_after {
            Some(info)
        } else {
            self.entries.remove(&key);
            None
        }
    }

    pub fn record(&self, source_type: SourceType, name: &str, failure: SourceFailure, now: DateTime<Utc>) {
        self.entries.insert(
            (source_type, name.to_string()),
            SourceFailureInfo {
                failed_at: now,
                failure,
                retry_after: now + failure.backoff(),
            },
        );
    }

    pub fn clear(&self, source_type: SourceType, name: &str) {
        self.entries.remove(&(source_type, name.to_string()));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_is_remembered_until_backoff_expires() {
        let cache = SourceFailureCache::new();
        let now = Utc::now();
        cache.record(SourceType::Rss, "reuters", SourceFailure::RateLimited, now);

        let info = cache.check(SourceType::Rss, "reuters", now + Duration::minutes(5)).unwrap();
        assert_eq!(info.failure, SourceFailure::RateLimited);
        assert!(cache.check(SourceType::Rss, "reuters", now + Duration::minutes(16)).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_source_type_is_part_of_the_key() {
        let cache = SourceFailureCache::new();
        let now = Utc::now();
        cache.record(SourceType::NewsApi, "macro", SourceFailure::Unreachable, now);
        assert!(cache.check(SourceType::Rss, "macro", now).is_none());
        assert!(cache.check(SourceType::NewsApi, "macro", now).is_some());

        cache.clear(SourceType::NewsApi, "macro");
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_malformed_feeds_back_off_longest() {
        assert!(SourceFailure::Malformed.backoff() > SourceFailure::Unreachable.backoff());
        assert!(SourceFailure::Unreachable.backoff() > SourceFailure::RateLimited.backoff());
    }
}
