use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A cluster of recent articles about one macro development.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MacroEvent {
    pub id: i64,
    pub name: String,
    pub category: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub description: Option<String>,
    /// 1 (minor) to 5 (major).
    pub importance: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateMacroEvent {
    pub name: String,
    pub category: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub description: Option<String>,
    pub importance: i32,
    pub keywords: Vec<String>,
    /// (article_id, relevance_score)
    pub articles: Vec<(i64, f64)>,
}

/// An event together with the mean polarity of its linked articles.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EventSentiment {
    pub event_id: i64,
    pub name: String,
    pub category: String,
    pub start_date: NaiveDate,
    pub importance: i32,
    pub avg_polarity: Option<f64>,
    pub article_count: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ImpactType {
    Direct,
    Indirect,
}

impl ImpactType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImpactType::Direct => "direct",
            ImpactType::Indirect => "indirect",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TimeHorizon {
    Short,
    Medium,
    Long,
}

impl TimeHorizon {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeHorizon::Short => "short",
            TimeHorizon::Medium => "medium",
            TimeHorizon::Long => "long",
        }
    }

    /// Horizon implied by the pre/post offset used to measure an impact.
    pub fn from_offset_days(days: i64) -> Self {
        if days <= 30 {
            TimeHorizon::Short
        } else if days <= 180 {
            TimeHorizon::Medium
        } else {
            TimeHorizon::Long
        }
    }
}

/// Estimated effect of an event on an indicator. `impact_value` is the
/// signed fractional indicator change.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct EventImpact {
    pub event_id: i64,
    pub impact_target: String,
    pub impact_type: String,
    pub impact_value: f64,
    pub confidence: f64,
    pub time_horizon: String,
}

impl EventImpact {
    pub fn new(
        event_id: i64,
        impact_target: impl Into<String>,
        impact_type: ImpactType,
        impact_value: f64,
        confidence: f64,
        time_horizon: TimeHorizon,
    ) -> Self {
        Self {
            event_id,
            impact_target: impact_target.into(),
            impact_type: impact_type.as_str().to_string(),
            impact_value,
            confidence,
            time_horizon: time_horizon.as_str().to_string(),
        }
    }
}
