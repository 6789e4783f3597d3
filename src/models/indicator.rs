use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Prefix for asset price series stored alongside the macro indicators.
pub const PRICE_INDICATOR_PREFIX: &str = "price:";

pub fn price_indicator_name(symbol: &str) -> String {
    format!("{}{}", PRICE_INDICATOR_PREFIX, symbol)
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct EconomicIndicator {
    pub id: i64,
    pub name: String,
    pub category: String,
    pub value: f64,
    pub unit: Option<String>,
    pub country: String,
    pub date: NaiveDate,
    pub source: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateEconomicIndicator {
    pub name: String,
    pub category: String,
    pub value: f64,
    pub unit: Option<String>,
    pub country: String,
    pub date: NaiveDate,
    pub source: String,
}

impl CreateEconomicIndicator {
    pub fn key(&self) -> IndicatorKey {
        IndicatorKey {
            name: self.name.clone(),
            country: self.country.clone(),
            date: self.date,
        }
    }
}

/// Natural key of an indicator row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IndicatorKey {
    pub name: String,
    pub country: String,
    pub date: NaiveDate,
}

/// What happens when a second row arrives for an existing (name, country, date).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Replace value and source.
    #[default]
    Upsert,
    /// Refuse the second row.
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    Replaced,
}
