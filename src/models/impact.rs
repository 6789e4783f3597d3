use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// An article ready for aggregation: its category scores joined with the
/// sentiment of the current run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredArticle {
    pub article_id: i64,
    pub published_date: NaiveDate,
    pub category_scores: BTreeMap<String, f64>,
    pub polarity: f64,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AggregateStatus {
    Scored,
    /// Nothing cleared the confidence threshold; no score is reported.
    Insufficient,
}

impl AggregateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregateStatus::Scored => "scored",
            AggregateStatus::Insufficient => "insufficient",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "scored" => Some(AggregateStatus::Scored),
            "insufficient" => Some(AggregateStatus::Insufficient),
            _ => None,
        }
    }
}

/// Aggregated impact of one category over one window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoryImpact {
    pub category: String,
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    pub status: AggregateStatus,
    pub impact_score: Option<f64>,
    pub confidence: Option<f64>,
    pub mean_polarity: Option<f64>,
    pub included: usize,
    pub excluded: usize,
}

impl CategoryImpact {
    pub fn is_scored(&self) -> bool {
        self.status == AggregateStatus::Scored
    }

    pub fn covers(&self, date: NaiveDate) -> bool {
        self.window_start <= date && date <= self.window_end
    }

    /// The window score, only when the window was scored with a finite value.
    pub fn scored_impact(&self) -> Option<(f64, f64)> {
        if !self.is_scored() {
            return None;
        }
        match (self.impact_score, self.confidence) {
            (Some(score), Some(confidence)) if score.is_finite() => Some((score, confidence)),
            _ => None,
        }
    }
}
