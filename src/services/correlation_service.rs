use chrono::NaiveDate;
use statrs::distribution::{ContinuousCDF, StudentsT};

use crate::models::{
    CorrelationOutcome, CorrelationSample, EventCorrelation, EventWindowStudy, ImpactDirection, ImpactStrength,
    WeightedCorrelation,
};

const SIGNIFICANCE_LEVEL: f64 = 0.05;

/// Weight of a sample `age_days` old. Strictly decreasing in age for any
/// decay in (0, 1).
pub fn decay_weight(age_days: i64, decay: f64) -> f64 {
    decay.powi(age_days.max(0) as i32)
}

/// Decay weight of a sample, or None when it is unusable: non-finite values,
/// dated in the future, or older than the window.
pub fn sample_weight(sample: &CorrelationSample, as_of: NaiveDate, window_days: i64, decay: f64) -> Option<f64> {
    if !(sample.event_signal.is_finite() && sample.indicator_change.is_finite()) {
        return None;
    }
    let age = (as_of - sample.date).num_days();
    if age < 0 || age > window_days {
        return None;
    }
    Some(decay_weight(age, decay))
}

/// Decay-weighted Pearson correlation between event signal and indicator
/// change.
pub fn weighted_correlation(
    samples: &[CorrelationSample],
    as_of: NaiveDate,
    window_days: i64,
    decay: f64,
) -> CorrelationOutcome {
    let weighted: Vec<(f64, f64, f64)> = samples
        .iter()
        .filter_map(|s| sample_weight(s, as_of, window_days, decay).map(|w| (w, s.event_signal, s.indicator_change)))
        .collect();

    let valid_samples = weighted.len();
    if valid_samples < 2 {
        return CorrelationOutcome::InsufficientData { valid_samples };
    }

    let total_weight: f64 = weighted.iter().map(|(w, _, _)| w).sum();
    if !(total_weight > 0.0) {
        return CorrelationOutcome::InsufficientData { valid_samples };
    }
    let mean_x = weighted.iter().map(|(w, x, _)| w * x).sum::<f64>() / total_weight;
    let mean_y = weighted.iter().map(|(w, _, y)| w * y).sum::<f64>() / total_weight;

    let contributions: Vec<f64> = weighted
        .iter()
        .map(|(w, x, y)| w * (x - mean_x) * (y - mean_y))
        .collect();
    let covariance: f64 = contributions.iter().sum();
    let var_x: f64 = weighted.iter().map(|(w, x, _)| w * (x - mean_x).powi(2)).sum();
    let var_y: f64 = weighted.iter().map(|(w, _, y)| w * (y - mean_y).powi(2)).sum();

    let denominator = (var_x * var_y).sqrt();
    if !(denominator > f64::EPSILON) {
        return CorrelationOutcome::Degenerate { valid_samples };
    }

    let coefficient = (covariance / denominator).clamp(-1.0, 1.0);
    CorrelationOutcome::Coefficient(WeightedCorrelation {
        coefficient,
        sample_count: valid_samples,
        total_weight,
        strength: classify_correlation_strength(coefficient).to_string(),
        contributions,
    })
}

/// Strength label for a correlation coefficient.
pub fn classify_correlation_strength(correlation: f64) -> &'static str {
    let abs_corr = correlation.abs();
    if abs_corr >= 0.7 {
        "strong"
    } else if abs_corr >= 0.4 {
        "moderate"
    } else if abs_corr >= 0.2 {
        "weak"
    } else {
        "none"
    }
}

/// Fractional change from `before` to `after`; None when the base is zero or
/// either value is not finite.
pub fn indicator_change(before: f64, after: f64) -> Option<f64> {
    if !(before.is_finite() && after.is_finite()) || before == 0.0 {
        return None;
    }
    Some((after - before) / before)
}

/// Summarise pre/post indicator changes around past events of one category
/// and test whether the mean change differs from zero.
///
/// Needs at least two finite changes.
pub fn event_window_study(
    event_category: &str,
    indicator: &str,
    window_days: i64,
    changes: &[f64],
) -> Option<EventWindowStudy> {
    let mut values: Vec<f64> = changes.iter().copied().filter(|c| c.is_finite()).collect();
    let n = values.len();
    if n < 2 {
        return None;
    }

    let mean = values.iter().sum::<f64>() / n as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    let std_dev = variance.sqrt();

    values.sort_by(|a, b| a.total_cmp(b));
    let median = if n % 2 == 0 {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    } else {
        values[n / 2]
    };

    let (t_statistic, p_value) = if std_dev > 0.0 {
        let t = mean / (std_dev / (n as f64).sqrt());
        let p = StudentsT::new(0.0, 1.0, (n - 1) as f64)
            .map(|dist| 2.0 * (1.0 - dist.cdf(t.abs())))
            .unwrap_or(1.0);
        (t, p)
    } else {
        (0.0, 1.0)
    };

    let (direction, strength) = if p_value < SIGNIFICANCE_LEVEL {
        let direction = if mean > 0.0 {
            ImpactDirection::Positive
        } else {
            ImpactDirection::Negative
        };
        let strength = if mean.abs() > 0.1 {
            ImpactStrength::Strong
        } else if mean.abs() > 0.05 {
            ImpactStrength::Moderate
        } else {
            ImpactStrength::Weak
        };
        (direction, strength)
    } else {
        (ImpactDirection::Neutral, ImpactStrength::Insignificant)
    };

    Some(EventWindowStudy {
        event_category: event_category.to_string(),
        indicator: indicator.to_string(),
        window_days,
        sample_size: n,
        average_change: mean,
        median_change: median,
        standard_deviation: std_dev,
        t_statistic,
        p_value,
        direction,
        strength,
    })
}

/// Correlate one event category with one indicator as of `as_of`.
///
/// The window study runs over the changes of the samples the correlation
/// could use; `offset_days` is how far either side of each event the change
/// was measured.
pub fn correlation_record(
    event_category: &str,
    indicator: &str,
    as_of: NaiveDate,
    window_days: i64,
    decay: f64,
    offset_days: i64,
    samples: &[CorrelationSample],
) -> EventCorrelation {
    let outcome = weighted_correlation(samples, as_of, window_days, decay);
    let changes: Vec<f64> = samples
        .iter()
        .filter(|s| sample_weight(s, as_of, window_days, decay).is_some())
        .map(|s| s.indicator_change)
        .collect();
    let study = event_window_study(event_category, indicator, offset_days, &changes);
    EventCorrelation::new(event_category, indicator, as_of, offset_days, &outcome, study.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(offset: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 30).unwrap() - chrono::Duration::days(offset)
    }

    fn sample(age: i64, x: f64, y: f64) -> CorrelationSample {
        CorrelationSample {
            date: day(age),
            event_signal: x,
            indicator_change: y,
        }
    }

    #[test]
    fn test_single_sample_is_insufficient() {
        let outcome = weighted_correlation(&[sample(1, 0.5, 0.01)], day(0), 365, 0.95);
        assert_eq!(outcome, CorrelationOutcome::InsufficientData { valid_samples: 1 });
    }

    #[test]
    fn test_out_of_window_samples_do_not_count() {
        let samples = vec![sample(1, 0.5, 0.01), sample(400, 0.2, 0.03), sample(-3, 0.1, 0.1)];
        let outcome = weighted_correlation(&samples, day(0), 365, 0.95);
        assert_eq!(outcome, CorrelationOutcome::InsufficientData { valid_samples: 1 });
    }

    #[test]
    fn test_non_finite_samples_are_invalid() {
        let samples = vec![sample(1, f64::NAN, 0.01), sample(2, 0.2, f64::INFINITY)];
        assert_eq!(
            weighted_correlation(&samples, day(0), 365, 0.95),
            CorrelationOutcome::InsufficientData { valid_samples: 0 }
        );
    }

    #[test]
    fn test_perfect_linear_relation() {
        let samples: Vec<_> = (0..6).map(|i| sample(i * 10, i as f64, 2.0 * i as f64 + 1.0)).collect();
        let coefficient = weighted_correlation(&samples, day(0), 365, 0.95).coefficient().unwrap();
        assert!((coefficient - 1.0).abs() < 1e-9);
        assert!(coefficient <= 1.0);
    }

    #[test]
    fn test_constant_series_is_degenerate() {
        let samples = vec![sample(1, 0.5, 0.01), sample(2, 0.5, 0.03), sample(3, 0.5, -0.02)];
        assert_eq!(
            weighted_correlation(&samples, day(0), 365, 0.95),
            CorrelationOutcome::Degenerate { valid_samples: 3 }
        );
    }

    #[test]
    fn test_decay_weight_strictly_decreasing() {
        for age in 0..100 {
            assert!(decay_weight(age + 1, 0.95) < decay_weight(age, 0.95));
        }
    }

    #[test]
    fn test_indicator_change_guards_zero_base() {
        assert_eq!(indicator_change(0.0, 1.0), None);
        assert!((indicator_change(100.0, 102.0).unwrap() - 0.02).abs() < 1e-12);
    }

    #[test]
    fn test_event_window_study_significant_increase() {
        let changes = [0.12, 0.15, 0.11, 0.14, 0.13, 0.16];
        let study = event_window_study("monetary_policy", "interest_rates", 30, &changes).unwrap();
        assert_eq!(study.sample_size, 6);
        assert!(study.p_value < 0.05);
        assert_eq!(study.direction, ImpactDirection::Positive);
        assert_eq!(study.strength, ImpactStrength::Strong);
        assert!((study.median_change - 0.135).abs() < 1e-12);
    }

    #[test]
    fn test_event_window_study_noise_is_insignificant() {
        let changes = [0.05, -0.04, 0.02, -0.03];
        let study = event_window_study("trade_policy", "gdp", 30, &changes).unwrap();
        assert_eq!(study.direction, ImpactDirection::Neutral);
        assert_eq!(study.strength, ImpactStrength::Insignificant);
        assert!(event_window_study("trade_policy", "gdp", 30, &[0.1]).is_none());
    }

    #[test]
    fn test_correlation_record_with_enough_events() {
        let samples = vec![sample(10, -0.2, 0.02), sample(40, -0.4, 0.05), sample(70, -0.6, 0.07), sample(400, 0.9, 0.5)];
        let record = correlation_record("monetary_policy", "interest_rates", day(0), 365, 0.99, 30, &samples);
        assert_eq!(record.status, "coefficient");
        assert!(record.coefficient.unwrap() < -0.9);
        assert_eq!(record.valid_samples, 3);
        assert_eq!(record.window_days, 30);
        // the stale sample is left out of the study as well
        assert!((record.average_change.unwrap() - 0.14 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_correlation_record_keeps_insufficient_status() {
        let record = correlation_record("trade_policy", "gdp", day(0), 365, 0.99, 30, &[sample(5, 0.3, 0.01)]);
        assert_eq!(record.status, "insufficient_data");
        assert_eq!(record.coefficient, None);
        assert_eq!(record.average_change, None);
    }
}
