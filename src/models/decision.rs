use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DecisionType {
    Buy,
    Sell,
    Hold,
}

impl DecisionType {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "buy" => Some(DecisionType::Buy),
            "sell" => Some(DecisionType::Sell),
            "hold" => Some(DecisionType::Hold),
            _ => None,
        }
    }

    /// +1 when the position profits from a price rise, -1 otherwise.
    pub fn direction(&self) -> f64 {
        match self {
            DecisionType::Buy | DecisionType::Hold => 1.0,
            DecisionType::Sell => -1.0,
        }
    }
}

/// A recorded investment decision. Rows are never updated.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InvestmentDecision {
    pub id: i64,
    pub asset_type: String,
    pub symbol: String,
    pub decision_type: String,
    pub decision_date: DateTime<Utc>,
    pub price: f64,
    pub quantity: f64,
    pub dcf_valuation: Option<f64>,
    pub macro_adjustment: Option<f64>,
    pub confidence: f64,
    pub reasoning: Option<String>,
}

impl InvestmentDecision {
    pub fn decision(&self) -> Option<DecisionType> {
        DecisionType::from_str(&self.decision_type)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateInvestmentDecision {
    pub asset_type: String,
    pub symbol: String,
    pub decision_type: DecisionType,
    pub decision_date: DateTime<Utc>,
    pub price: f64,
    pub quantity: f64,
    pub dcf_valuation: Option<f64>,
    pub macro_adjustment: Option<f64>,
    pub confidence: f64,
    pub reasoning: Option<String>,
}

impl DecisionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionType::Buy => "buy",
            DecisionType::Sell => "sell",
            DecisionType::Hold => "hold",
        }
    }
}
