use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Residual bucket present in every contributions map.
pub const UNEXPLAINED: &str = "unexplained";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FitStatus {
    Fitted,
    /// No usable regression; the whole excess sits in `unexplained`.
    Insufficient,
}

impl FitStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FitStatus::Fitted => "fitted",
            FitStatus::Insufficient => "insufficient",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ReturnMetrics {
    pub actual_return: f64,
    pub expected_return: f64,
    pub annualized_return: f64,
    pub holding_period_days: i64,
}

/// Sensitivity of an asset to one factor and how far that factor moved over
/// the holding period.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FactorExposure {
    pub name: String,
    pub beta: f64,
    pub factor_move: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttributionResult {
    pub decision_id: i64,
    pub evaluation_date: DateTime<Utc>,
    pub actual_return: f64,
    pub expected_return: f64,
    pub annualized_return: f64,
    pub contributions: BTreeMap<String, f64>,
    pub fit_status: FitStatus,
}

impl AttributionResult {
    pub fn excess_return(&self) -> f64 {
        self.actual_return - self.expected_return
    }

    pub fn unexplained(&self) -> f64 {
        self.contributions.get(UNEXPLAINED).copied().unwrap_or(0.0)
    }
}

/// Attribution row as stored, contributions kept as JSON.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AttributionRecord {
    pub id: i64,
    pub decision_id: i64,
    pub evaluation_date: DateTime<Utc>,
    pub actual_return: f64,
    pub expected_return: f64,
    pub annualized_return: f64,
    pub contributions: sqlx::types::Json<BTreeMap<String, f64>>,
    pub fit_status: String,
}
