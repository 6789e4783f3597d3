use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One observation pairing an event signal with the indicator movement that
/// followed it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CorrelationSample {
    pub date: NaiveDate,
    pub event_signal: f64,
    pub indicator_change: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeightedCorrelation {
    /// Always within [-1, 1].
    pub coefficient: f64,
    pub sample_count: usize,
    pub total_weight: f64,
    pub strength: String,
    /// Per-sample weighted co-deviation terms, in the order the valid samples
    /// were given.
    pub contributions: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CorrelationOutcome {
    Coefficient(WeightedCorrelation),
    InsufficientData { valid_samples: usize },
    Degenerate { valid_samples: usize },
}

impl CorrelationOutcome {
    pub fn coefficient(&self) -> Option<f64> {
        match self {
            CorrelationOutcome::Coefficient(c) => Some(c.coefficient),
            _ => None,
        }
    }

    pub fn status(&self) -> &'static str {
        match self {
            CorrelationOutcome::Coefficient(_) => "coefficient",
            CorrelationOutcome::InsufficientData { .. } => "insufficient_data",
            CorrelationOutcome::Degenerate { .. } => "degenerate",
        }
    }

    pub fn valid_samples(&self) -> usize {
        match self {
            CorrelationOutcome::Coefficient(c) => c.sample_count,
            CorrelationOutcome::InsufficientData { valid_samples }
            | CorrelationOutcome::Degenerate { valid_samples } => *valid_samples,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ImpactDirection {
    Positive,
    Negative,
    Neutral,
}

impl ImpactDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImpactDirection::Positive => "positive",
            ImpactDirection::Negative => "negative",
            ImpactDirection::Neutral => "neutral",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ImpactStrength {
    Strong,
    Moderate,
    Weak,
    Insignificant,
}

impl ImpactStrength {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImpactStrength::Strong => "strong",
            ImpactStrength::Moderate => "moderate",
            ImpactStrength::Weak => "weak",
            ImpactStrength::Insignificant => "insignificant",
        }
    }
}

/// Pre/post indicator changes around every event of a category.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventWindowStudy {
    pub event_category: String,
    pub indicator: String,
    pub window_days: i64,
    pub sample_size: usize,
    pub average_change: f64,
    pub median_change: f64,
    pub standard_deviation: f64,
    pub t_statistic: f64,
    pub p_value: f64,
    pub direction: ImpactDirection,
    pub strength: ImpactStrength,
}

/// Stored result of correlating one event category with one indicator.
/// The study columns are empty when fewer than two events had a measurable
/// change.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct EventCorrelation {
    pub event_category: String,
    pub indicator: String,
    pub as_of: NaiveDate,
    pub status: String,
    pub coefficient: Option<f64>,
    pub valid_samples: i32,
    pub total_weight: Option<f64>,
    pub strength: Option<String>,
    pub window_days: i32,
    pub average_change: Option<f64>,
    pub median_change: Option<f64>,
    pub standard_deviation: Option<f64>,
    pub t_statistic: Option<f64>,
    pub p_value: Option<f64>,
    pub direction: Option<String>,
    pub study_strength: Option<String>,
    #[sqlx(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl EventCorrelation {
    pub fn new(
        event_category: &str,
        indicator: &str,
        as_of: NaiveDate,
        window_days: i64,
        outcome: &CorrelationOutcome,
        study: Option<&EventWindowStudy>,
    ) -> Self {
        let (coefficient, total_weight, strength) = match outcome {
            CorrelationOutcome::Coefficient(c) => (Some(c.coefficient), Some(c.total_weight), Some(c.strength.clone())),
            _ => (None, None, None),
        };
        Self {
            event_category: event_category.to_string(),
            indicator: indicator.to_string(),
            as_of,
            status: outcome.status().to_string(),
            coefficient,
            valid_samples: outcome.valid_samples() as i32,
            total_weight,
            strength,
            window_days: window_days as i32,
            average_change: study.map(|s| s.average_change),
            median_change: study.map(|s| s.median_change),
            standard_deviation: study.map(|s| s.standard_deviation),
            t_statistic: study.map(|s| s.t_statistic),
            p_value: study.map(|s| s.p_value),
            direction: study.map(|s| s.direction.as_str().to_string()),
            study_strength: study.map(|s| s.strength.as_str().to_string()),
            created_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()
    }

    #[test]
    fn test_insufficient_outcome_keeps_status_without_coefficient() {
        let outcome = CorrelationOutcome::InsufficientData { valid_samples: 1 };
        let record = EventCorrelation::new("trade_policy", "gdp", as_of(), 30, &outcome, None);
        assert_eq!(record.status, "insufficient_data");
        assert_eq!(record.coefficient, None);
        assert_eq!(record.valid_samples, 1);
        assert_eq!(record.direction, None);
    }

    #[test]
    fn test_coefficient_outcome_with_study() {
        let outcome = CorrelationOutcome::Coefficient(WeightedCorrelation {
            coefficient: -0.62,
            sample_count: 4,
            total_weight: 3.1,
            strength: "strong".to_string(),
            contributions: vec![],
        });
        let study = EventWindowStudy {
            event_category: "monetary_policy".to_string(),
            indicator: "interest_rates".to_string(),
            window_days: 30,
            sample_size: 4,
            average_change: 0.03,
            median_change: 0.025,
            standard_deviation: 0.01,
            t_statistic: 6.0,
            p_value: 0.009,
            direction: ImpactDirection::Positive,
            strength: ImpactStrength::Moderate,
        };
        let record = EventCorrelation::new("monetary_policy", "interest_rates", as_of(), 30, &outcome, Some(&study));
        assert_eq!(record.status, "coefficient");
        assert_eq!(record.coefficient, Some(-0.62));
        assert_eq!(record.valid_samples, 4);
        assert_eq!(record.direction.as_deref(), Some("positive"));
        assert_eq!(record.study_strength.as_deref(), Some("moderate"));
    }
}
