use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Dcf,
    Commodity,
}

impl ModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Dcf => "dcf",
            ModelKind::Commodity => "commodity",
        }
    }

    pub fn adjustment_table(&self) -> &'static str {
        match self {
            ModelKind::Dcf => "dcf_adjustments",
            ModelKind::Commodity => "commodity_adjustments",
        }
    }
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Named, adjustable numeric parameters of a valuation model.
pub trait ModelParameters: Clone {
    /// Parameters impact factors may target.
    fn names() -> &'static [&'static str];
    fn get(&self, name: &str) -> Option<f64>;
    /// Returns false for an unknown name.
    fn set(&mut self, name: &str, value: f64) -> bool;
}

/// DCF inputs for one company. Rates are fractions; cash flow, debt and
/// share count are in the company's reporting units.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DcfBaseline {
    pub discount_rate: f64,
    pub growth_rate: f64,
    pub terminal_growth_rate: f64,
    pub free_cash_flow: f64,
    pub net_debt: f64,
    pub shares_outstanding: f64,
    pub projection_years: u32,
}

impl Default for DcfBaseline {
    fn default() -> Self {
        Self {
            discount_rate: 0.10,
            growth_rate: 0.05,
            terminal_growth_rate: 0.02,
            free_cash_flow: 1_000.0,
            net_debt: 0.0,
            shares_outstanding: 100.0,
            projection_years: 5,
        }
    }
}

impl ModelParameters for DcfBaseline {
    fn names() -> &'static [&'static str] {
        &["discount_rate", "growth_rate", "terminal_growth_rate"]
    }

    fn get(&self, name: &str) -> Option<f64> {
        match name {
            "discount_rate" => Some(self.discount_rate),
            "growth_rate" => Some(self.growth_rate),
            "terminal_growth_rate" => Some(self.terminal_growth_rate),
            _ => None,
        }
    }

    fn set(&mut self, name: &str, value: f64) -> bool {
        match name {
            "discount_rate" => self.discount_rate = value,
            "growth_rate" => self.growth_rate = value,
            "terminal_growth_rate" => self.terminal_growth_rate = value,
            _ => return false,
        }
        true
    }
}

/// Supply/demand inputs for one commodity. Quantities share one unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CommodityParameters {
    pub supply: f64,
    pub demand: f64,
    pub inventory: f64,
    pub production_growth: f64,
    pub consumption_growth: f64,
    /// Negative: price rises when supply falls.
    pub price_elasticity: f64,
    pub seasonal_factor: f64,
    pub current_price: f64,
}

impl Default for CommodityParameters {
    fn default() -> Self {
        Self {
            supply: 1_000.0,
            demand: 950.0,
            inventory: 200.0,
            production_growth: 0.02,
            consumption_growth: 0.03,
            price_elasticity: -0.5,
            seasonal_factor: 1.0,
            current_price: 100.0,
        }
    }
}

impl ModelParameters for CommodityParameters {
    fn names() -> &'static [&'static str] {
        &[
            "supply",
            "demand",
            "inventory",
            "production_growth",
            "consumption_growth",
            "seasonal_factor",
        ]
    }

    fn get(&self, name: &str) -> Option<f64> {
        match name {
            "supply" => Some(self.supply),
            "demand" => Some(self.demand),
            "inventory" => Some(self.inventory),
            "production_growth" => Some(self.production_growth),
            "consumption_growth" => Some(self.consumption_growth),
            "seasonal_factor" => Some(self.seasonal_factor),
            _ => None,
        }
    }

    fn set(&mut self, name: &str, value: f64) -> bool {
        match name {
            "supply" => self.supply = value,
            "demand" => self.demand = value,
            "inventory" => self.inventory = value,
            "production_growth" => self.production_growth = value,
            "consumption_growth" => self.consumption_growth = value,
            "seasonal_factor" => self.seasonal_factor = value,
            _ => return false,
        }
        true
    }
}

/// A single parameter change produced by the integrator.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct ModelAdjustment {
    pub subject_symbol: String,
    pub date: NaiveDate,
    pub factor_name: String,
    pub original_value: f64,
    pub adjusted_value: f64,
    pub reason: String,
    pub confidence: f64,
    /// Set only when exactly one event drove the change.
    pub event_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DcfValuation {
    pub symbol: String,
    pub projected_cash_flows: Vec<f64>,
    pub terminal_value: f64,
    pub enterprise_value: f64,
    pub equity_value: f64,
    pub per_share_value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommodityForecast {
    pub commodity: String,
    pub projected_supply: f64,
    pub projected_demand: f64,
    pub balance: f64,
    pub current_price: f64,
    pub price_change: f64,
    pub predicted_price: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_named_parameter_is_readable_and_writable() {
        let mut dcf = DcfBaseline::default();
        for name in DcfBaseline::names() {
            assert!(dcf.get(name).is_some());
            assert!(dcf.set(name, 0.5));
            assert_eq!(dcf.get(name), Some(0.5));
        }
        let mut commodity = CommodityParameters::default();
        for name in CommodityParameters::names() {
            assert!(commodity.set(name, 7.0));
            assert_eq!(commodity.get(name), Some(7.0));
        }
        assert!(!commodity.set("price_elasticity", 1.0));
    }
}
