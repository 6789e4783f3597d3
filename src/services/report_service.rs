use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::ReportFormat;
use crate::errors::AppError;
use crate::models::{AttributionResult, UNEXPLAINED};

/// One line of the attribution report.
#[derive(Debug, Clone, Serialize)]
pub struct AttributionReportRow {
    pub symbol: String,
    pub asset_type: String,
    pub decision_type: String,
    #[serde(flatten)]
    pub result: AttributionResult,
}

/// Factor columns in stable order with the residual last.
fn factor_columns(rows: &[AttributionReportRow]) -> Vec<String> {
    let named: BTreeSet<&str> = rows
        .iter()
        .flat_map(|r| r.result.contributions.keys())
        .map(|k| k.as_str())
        .filter(|k| *k != UNEXPLAINED)
        .collect();
    named
        .into_iter()
        .map(str::to_string)
        .chain(std::iter::once(UNEXPLAINED.to_string()))
        .collect()
}

const BASE_COLUMNS: &[&str] = &[
    "decision_id",
    "symbol",
    "asset_type",
    "decision_type",
    "evaluation_date",
    "actual_return",
    "expected_return",
    "excess_return",
    "annualized_return",
    "fit_status",
];

fn row_values(row: &AttributionReportRow, factors: &[String]) -> Vec<String> {
    let r = &row.result;
    let mut values = vec![
        r.decision_id.to_string(),
        row.symbol.clone(),
        row.asset_type.clone(),
        row.decision_type.clone(),
        r.evaluation_date.to_rfc3339(),
        format!("{:.6}", r.actual_return),
        format!("{:.6}", r.expected_return),
        format!("{:.6}", r.excess_return()),
        format!("{:.6}", r.annualized_return),
        r.fit_status.as_str().to_string(),
    ];
    values.extend(
        factors
            .iter()
            .map(|f| format!("{:.6}", r.contributions.get(f).copied().unwrap_or(0.0))),
    );
    values
}

pub fn write_csv(rows: &[AttributionReportRow], path: &Path) -> Result<(), AppError> {
    let factors = factor_columns(rows);
    let mut writer = csv::Writer::from_path(path).map_err(std::io::Error::from)?;

    let header: Vec<String> = BASE_COLUMNS
        .iter()
        .map(|c| c.to_string())
        .chain(factors.iter().cloned())
        .collect();
    writer.write_record(&header).map_err(std::io::Error::from)?;
    for row in rows {
        writer.write_record(row_values(row, &factors)).map_err(std::io::Error::from)?;
    }
    writer.flush()?;
    Ok(())
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

pub fn render_html(rows: &[AttributionReportRow]) -> String {
    let factors = factor_columns(rows);
    let header = BASE_COLUMNS
        .iter()
        .map(|c| c.to_string())
        .chain(factors.iter().cloned())
        .map(|c| format!("<th>{}</th>", escape_html(&c)))
        .collect::<String>();
    let body = rows
        .iter()
        .map(|row| {
            let cells = row_values(row, &factors)
                .iter()
                .map(|v| format!("<td>{}</td>", escape_html(v)))
                .collect::<String>();
            format!("<tr>{}</tr>\n", cells)
        })
        .collect::<String>();

    format!(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>Attribution report</title></head>\n<body>\n<h1>Attribution report</h1>\n<p>Generated {}</p>\n<table>\n<tr>{}</tr>\n{}</table>\n</body></html>\n",
        Utc::now().to_rfc3339(),
        header,
        body
    )
}

/// Write the report in the configured format plus a JSON copy, returning the
/// primary file path. PDF output is produced as HTML for an external
/// converter.
pub fn write_report(
    rows: &[AttributionReportRow],
    format: ReportFormat,
    output_dir: &Path,
) -> Result<PathBuf, AppError> {
    std::fs::create_dir_all(output_dir)?;
    let stem = format!("attribution_report_{}", Utc::now().format("%Y%m%d_%H%M%S"));

    let path = match format {
        ReportFormat::Csv => {
            let path = output_dir.join(format!("{}.csv", stem));
            write_csv(rows, &path)?;
            path
        }
        ReportFormat::Html | ReportFormat::Pdf => {
            if format == ReportFormat::Pdf {
                warn!("⚠️ PDF rendering is not built in; writing HTML for conversion");
            }
            let path = output_dir.join(format!("{}.html", stem));
            std::fs::write(&path, render_html(rows))?;
            path
        }
    };

    let json = serde_json::to_string_pretty(rows)
        .map_err(|e| AppError::Invariant(format!("report serialization failed: {}", e)))?;
    std::fs::write(output_dir.join(format!("{}.json", stem)), json)?;

    info!("📄 Wrote attribution report with {} rows to {}", rows.len(), path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FitStatus;
    use std::collections::BTreeMap;

    fn row(id: i64, factors: &[(&str, f64)]) -> AttributionReportRow {
        let mut contributions: BTreeMap<String, f64> =
            factors.iter().map(|(k, v)| (k.to_string(), *v)).collect();
        contributions.insert(UNEXPLAINED.to_string(), 0.01);
        AttributionReportRow {
            symbol: "AAPL".to_string(),
            asset_type: "stock".to_string(),
            decision_type: "buy".to_string(),
            result: AttributionResult {
                decision_id: id,
                evaluation_date: Utc::now(),
                actual_return: 0.1,
                expected_return: 0.05,
                annualized_return: 0.1,
                contributions,
                fit_status: FitStatus::Fitted,
            },
        }
    }

    #[test]
    fn test_csv_has_union_of_factors_and_residual_last() {
        let dir = tempfile::tempdir().unwrap();
        let rows = vec![row(1, &[("rates", 0.02)]), row(2, &[("sentiment", 0.03)])];
        let path = dir.path().join("report.csv");
        write_csv(&rows, &path).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        let columns: Vec<&str> = headers.iter().collect();
        assert_eq!(&columns[columns.len() - 3..], &["rates", "sentiment", "unexplained"]);
        assert_eq!(reader.records().count(), 2);
    }

    #[test]
    fn test_write_report_creates_primary_and_json() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("reports");
        let path = write_report(&[row(1, &[("rates", 0.04)])], ReportFormat::Html, &out).unwrap();
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("html"));
        assert!(std::fs::read_to_string(&path).unwrap().contains("<th>rates</th>"));
        let json_files = std::fs::read_dir(&out)
            .unwrap()
            .filter(|e| e.as_ref().unwrap().path().extension().and_then(|x| x.to_str()) == Some("json"))
            .count();
        assert_eq!(json_files, 1);
    }
}
