use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use chrono::{Duration, NaiveDate};
use csv::ReaderBuilder;
use serde::Deserialize;
use sqlx::PgPool;
use tracing::{info, warn};

use crate::db::indicator_queries;
use crate::errors::AppError;
use crate::models::{CreateEconomicIndicator, DuplicatePolicy, EconomicIndicator, IndicatorKey, InsertOutcome};

/// In-memory view of a batch of indicator rows that enforces the
/// one-value-per-(name, country, date) rule under the configured policy.
#[derive(Debug, Clone)]
pub struct IndicatorBook {
    policy: DuplicatePolicy,
    rows: BTreeMap<IndicatorKey, CreateEconomicIndicator>,
}

impl IndicatorBook {
    pub fn new(policy: DuplicatePolicy) -> Self {
        Self {
            policy,
            rows: BTreeMap::new(),
        }
    }

    /// `Upsert` replaces value and source; `Reject` refuses the second row.
    pub fn insert(&mut self, row: CreateEconomicIndicator) -> Result<InsertOutcome, AppError> {
        if !row.value.is_finite() {
            return Err(AppError::Validation(format!(
                "indicator {} on {} has non-finite value",
                row.name, row.date
            )));
        }
        match self.rows.entry(row.key()) {
            Entry::Vacant(slot) => {
                slot.insert(row);
                Ok(InsertOutcome::Inserted)
            }
            Entry::Occupied(mut slot) => match self.policy {
                DuplicatePolicy::Upsert => {
                    let existing = slot.get_mut();
                    existing.value = row.value;
                    existing.source = row.source;
                    Ok(InsertOutcome::Replaced)
                }
                DuplicatePolicy::Reject => {
                    let key = slot.key();
                    Err(AppError::Invariant(format!(
                        "duplicate indicator {} / {} / {} (existing value {}, rejected value {})",
                        key.name,
                        key.country,
                        key.date,
                        slot.get().value,
                        row.value
                    )))
                }
            },
        }
    }

    pub fn get(&self, key: &IndicatorKey) -> Option<&CreateEconomicIndicator> {
        self.rows.get(key)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn into_rows(self) -> Vec<CreateEconomicIndicator> {
        self.rows.into_values().collect()
    }
}

/// Value of the observation closest to `target`, if one lies within
/// `tolerance_days`. Ties go to the earlier observation.
pub fn nearest_value(rows: &[EconomicIndicator], target: NaiveDate, tolerance_days: i64) -> Option<f64> {
    rows.iter()
        .map(|row| ((row.date - target).num_days().abs(), row.date, row.value))
        .filter(|(distance, _, _)| *distance <= tolerance_days)
        .min_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)))
        .map(|(_, _, value)| value)
}

/// Fractional indicator change from `offset_days` before `date` to
/// `offset_days` after it.
pub fn change_around(rows: &[EconomicIndicator], date: NaiveDate, offset_days: i64, tolerance_days: i64) -> Option<f64> {
    let before = nearest_value(rows, date - Duration::days(offset_days), tolerance_days)?;
    let after = nearest_value(rows, date + Duration::days(offset_days), tolerance_days)?;
    crate::services::correlation_service::indicator_change(before, after)
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestSummary {
    pub inserted: usize,
    pub replaced: usize,
    pub rejected: usize,
}

/// Store a batch of indicator rows. Duplicates inside the batch and against
/// stored rows are handled by the same policy; rejected rows are logged and
/// counted.
pub async fn ingest(
    pool: &PgPool,
    rows: Vec<CreateEconomicIndicator>,
    policy: DuplicatePolicy,
) -> Result<IngestSummary, AppError> {
    let mut summary = IngestSummary::default();
    let mut book = IndicatorBook::new(policy);

    for row in rows {
        match book.insert(row) {
            Ok(InsertOutcome::Replaced) => summary.replaced += 1,
            Ok(InsertOutcome::Inserted) => {}
            Err(e) => {
                warn!("Skipping indicator row: {}", e);
                summary.rejected += 1;
            }
        }
    }

    for row in book.into_rows() {
        let outcome = match policy {
            DuplicatePolicy::Upsert => Some(indicator_queries::upsert_indicator(pool, &row).await?),
            DuplicatePolicy::Reject => indicator_queries::insert_indicator_if_absent(pool, &row).await?,
        };
        match outcome {
            Some(InsertOutcome::Inserted) => summary.inserted += 1,
            Some(InsertOutcome::Replaced) => summary.replaced += 1,
            None => {
                warn!(
                    "Rejected duplicate indicator {} / {} / {}",
                    row.name, row.country, row.date
                );
                summary.rejected += 1;
            }
        }
    }

    info!(
        "📈 Indicators: {} inserted, {} replaced, {} rejected",
        summary.inserted, summary.replaced, summary.rejected
    );
    Ok(summary)
}

#[derive(Debug, Deserialize)]
struct IndicatorCsvRow {
    name: String,
    category: String,
    value: f64,
    unit: Option<String>,
    country: String,
    date: NaiveDate,
    source: String,
}

/// Read indicator rows from a CSV with headers
/// `name,category,value,unit,country,date,source`.
pub fn read_indicator_csv(path: &Path) -> anyhow::Result<Vec<CreateEconomicIndicator>> {
    let mut reader = ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("Failed to open indicator file {}", path.display()))?;

    let mut rows = Vec::new();
    for (line, record) in reader.deserialize::<IndicatorCsvRow>().enumerate() {
        let record = record.with_context(|| format!("Bad indicator row {} in {}", line + 2, path.display()))?;
        rows.push(CreateEconomicIndicator {
            name: record.name,
            category: record.category,
            value: record.value,
            unit: record.unit.filter(|u| !u.is_empty()),
            country: record.country,
            date: record.date,
            source: record.source,
        });
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn row(value: f64, source: &str) -> CreateEconomicIndicator {
        CreateEconomicIndicator {
            name: "cpi".to_string(),
            category: "inflation".to_string(),
            value,
            unit: Some("index".to_string()),
            country: "US".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
            source: source.to_string(),
        }
    }

    fn stored(day: u32, value: f64) -> EconomicIndicator {
        EconomicIndicator {
            id: day as i64,
            name: "interest_rates".to_string(),
            category: "monetary".to_string(),
            value,
            unit: None,
            country: "US".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Duration::days(day as i64),
            source: "fred".to_string(),
        }
    }

    #[test]
    fn test_upsert_policy_replaces_value_and_source() {
        let mut book = IndicatorBook::new(DuplicatePolicy::Upsert);
        assert_eq!(book.insert(row(310.0, "fred")).unwrap(), InsertOutcome::Inserted);
        assert_eq!(book.insert(row(311.5, "world_bank")).unwrap(), InsertOutcome::Replaced);
        assert_eq!(book.len(), 1);
        let kept = book.get(&row(0.0, "").key()).unwrap();
        assert_eq!(kept.value, 311.5);
        assert_eq!(kept.source, "world_bank");
    }

    #[test]
    fn test_reject_policy_keeps_first_row() {
        let mut book = IndicatorBook::new(DuplicatePolicy::Reject);
        book.insert(row(310.0, "fred")).unwrap();
        assert!(matches!(book.insert(row(311.5, "world_bank")), Err(AppError::Invariant(_))));
        assert_eq!(book.get(&row(0.0, "").key()).unwrap().value, 310.0);
    }

    #[test]
    fn test_nearest_value_respects_tolerance() {
        let rows = vec![stored(0, 5.0), stored(10, 5.25)];
        let target = NaiveDate::from_ymd_opt(2024, 1, 4).unwrap();
        assert_eq!(nearest_value(&rows, target, 7), Some(5.0));
        assert_eq!(nearest_value(&rows, target + Duration::days(30), 7), None);
    }

    #[test]
    fn test_change_around_event() {
        let rows = vec![stored(0, 4.0), stored(60, 5.0)];
        let event = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        let change = change_around(&rows, event, 30, 7).unwrap();
        assert!((change - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_read_indicator_csv() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "name,category,value,unit,country,date,source").unwrap();
        writeln!(file, "gdp,growth,2.5,percent,US,2024-03-31,fred").unwrap();
        writeln!(file, "price:AAPL,price,172.3,,US,2024-03-29,market").unwrap();
        let rows = read_indicator_csv(file.path()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].unit, None);
        assert_eq!(rows[1].name, "price:AAPL");
    }
}
