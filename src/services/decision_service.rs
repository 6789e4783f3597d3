use std::path::Path;

use anyhow::{bail, Context};
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use csv::ReaderBuilder;
use serde::Deserialize;
use sqlx::PgPool;
use tracing::info;

use crate::db::decision_queries;
use crate::errors::AppError;
use crate::models::{CreateInvestmentDecision, DecisionType};

#[derive(Debug, Deserialize)]
struct DecisionCsvRow {
    asset_type: String,
    symbol: String,
    decision_type: String,
    decision_date: String,
    price: f64,
    quantity: f64,
    dcf_valuation: Option<f64>,
    macro_adjustment: Option<f64>,
    confidence: f64,
    reasoning: Option<String>,
}

/// Accepts RFC 3339 timestamps or plain `YYYY-MM-DD` dates (midnight UTC).
fn parse_decision_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .map(|d| Utc.from_utc_datetime(&d.and_time(NaiveTime::MIN)))
}

/// Read decisions from a CSV with headers
/// `asset_type,symbol,decision_type,decision_date,price,quantity,dcf_valuation,macro_adjustment,confidence,reasoning`.
pub fn read_decision_csv(path: &Path) -> anyhow::Result<Vec<CreateInvestmentDecision>> {
    let mut reader = ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("Failed to open decision file {}", path.display()))?;

    let mut decisions = Vec::new();
    for (index, record) in reader.deserialize::<DecisionCsvRow>().enumerate() {
        let line = index + 2;
        let record = record.with_context(|| format!("Bad decision row {} in {}", line, path.display()))?;

        let Some(decision_type) = DecisionType::from_str(&record.decision_type) else {
            bail!("Row {}: unknown decision type '{}'", line, record.decision_type);
        };
        let Some(decision_date) = parse_decision_date(&record.decision_date) else {
            bail!("Row {}: unparseable decision date '{}'", line, record.decision_date);
        };
        if !(record.price.is_finite() && record.price > 0.0) {
            bail!("Row {}: price must be positive", line);
        }
        if !(0.0..=1.0).contains(&record.confidence) {
            bail!("Row {}: confidence must be within [0, 1]", line);
        }

        decisions.push(CreateInvestmentDecision {
            asset_type: record.asset_type.to_lowercase(),
            symbol: record.symbol.to_uppercase(),
            decision_type,
            decision_date,
            price: record.price,
            quantity: record.quantity,
            dcf_valuation: record.dcf_valuation,
            macro_adjustment: record.macro_adjustment,
            confidence: record.confidence,
            reasoning: record.reasoning.filter(|r| !r.is_empty()),
        });
    }
    Ok(decisions)
}

/// Decisions are append-only; every row becomes a new record.
pub async fn import_decisions(pool: &PgPool, decisions: &[CreateInvestmentDecision]) -> Result<usize, AppError> {
    for decision in decisions {
        decision_queries::insert_decision(pool, decision).await?;
    }
    info!("📥 Imported {} investment decisions", decisions.len());
    Ok(decisions.len())
}
