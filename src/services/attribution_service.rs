use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use ndarray::{Array1, Array2};

use crate::errors::AppError;
use crate::models::{
    AttributionResult, DecisionType, FactorExposure, FitStatus, InvestmentDecision, ReturnMetrics, UNEXPLAINED,
};

/// Largest tolerated gap between the summed contributions and the excess
/// return.
pub const BALANCE_TOLERANCE: f64 = 1e-6;

const DAYS_PER_YEAR: f64 = 365.0;
const PIVOT_EPSILON: f64 = 1e-12;

/// Realised, expected and annualised return of a decision as of `evaluation_date`.
///
/// Returns are fractions. A sell profits when the price falls, so its
/// realised and expected returns are sign-flipped.
pub fn compute_returns(
    decision: &InvestmentDecision,
    current_price: f64,
    evaluation_date: DateTime<Utc>,
    annual_benchmark: f64,
) -> Result<ReturnMetrics, AppError> {
    if !(decision.price.is_finite() && decision.price > 0.0) {
        return Err(AppError::Invariant(format!(
            "decision {}: entry price {} is not a positive number",
            decision.id, decision.price
        )));
    }
    if !(current_price.is_finite() && current_price > 0.0) {
        return Err(AppError::Invariant(format!(
            "decision {}: current price {} is not a positive number",
            decision.id, current_price
        )));
    }
    let direction = decision
        .decision()
        .ok_or_else(|| AppError::Validation(format!("unknown decision type '{}'", decision.decision_type)))?
        .direction();

    let holding_period_days = (evaluation_date - decision.decision_date).num_days().max(0);
    let years = holding_period_days as f64 / DAYS_PER_YEAR;

    let price_return = current_price / decision.price - 1.0;
    let actual_return = direction * price_return;
    let expected_return = direction * ((1.0 + annual_benchmark).powf(years) - 1.0);
    let annualized_return = if holding_period_days > 0 && 1.0 + actual_return > 0.0 {
        (1.0 + actual_return).powf(1.0 / years) - 1.0
    } else {
        actual_return
    };

    Ok(ReturnMetrics {
        actual_return,
        expected_return,
        annualized_return,
        holding_period_days,
    })
}

/// Period-over-period fractional changes of a series. Steps from a zero base
/// become zero.
pub fn period_returns(series: &[f64]) -> Vec<f64> {
    series
        .windows(2)
        .map(|w| if w[0] != 0.0 { w[1] / w[0] - 1.0 } else { 0.0 })
        .collect()
}

/// Ordinary least squares of `asset` on `factors` with an intercept.
///
/// Returns one beta per factor, or None when there are too few observations
/// or the normal equations are singular.
pub fn fit_factor_betas(asset: &[f64], factors: &[Vec<f64>]) -> Option<Vec<f64>> {
    let n = asset.len();
    let k = factors.len();
    if k == 0 || n < k + 2 || factors.iter().any(|f| f.len() != n) {
        return None;
    }
    if asset.iter().chain(factors.iter().flatten()).any(|v| !v.is_finite()) {
        return None;
    }

    let mut design = Array2::<f64>::ones((n, k + 1));
    for (j, factor) in factors.iter().enumerate() {
        for (i, value) in factor.iter().enumerate() {
            design[[i, j + 1]] = *value;
        }
    }
    let y = Array1::from_vec(asset.to_vec());

    let xtx = design.t().dot(&design);
    let xty = design.t().dot(&y);
    let coefficients = solve_linear_system(xtx, xty)?;

    // skip the intercept
    Some(coefficients.iter().skip(1).copied().collect())
}

/// Gaussian elimination with partial pivoting.
fn solve_linear_system(mut a: Array2<f64>, mut b: Array1<f64>) -> Option<Array1<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[[i, col]].abs().total_cmp(&a[[j, col]].abs()))?;
        if a[[pivot, col]].abs() < PIVOT_EPSILON {
            return None;
        }
        if pivot != col {
            for j in 0..n {
                a.swap([col, j], [pivot, j]);
            }
            b.swap(col, pivot);
        }
        for row in col + 1..n {
            let factor = a[[row, col]] / a[[col, col]];
            for j in col..n {
                a[[row, j]] -= factor * a[[col, j]];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = Array1::<f64>::zeros(n);
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|j| a[[row, j]] * x[j]).sum();
        x[row] = (b[row] - tail) / a[[row, row]];
    }
    x.iter().all(|v| v.is_finite()).then_some(x)
}

/// Split the excess return into factor contributions plus `unexplained`.
///
/// `exposures` is None when no fit was possible; the whole excess then lands
/// in `unexplained` and every named factor contributes zero.
pub fn decompose(
    decision_id: i64,
    evaluation_date: DateTime<Utc>,
    metrics: &ReturnMetrics,
    factor_names: &[String],
    exposures: Option<&[FactorExposure]>,
) -> Result<AttributionResult, AppError> {
    if !(metrics.actual_return.is_finite() && metrics.expected_return.is_finite()) {
        return Err(AppError::Invariant(format!("decision {}: non-finite returns", decision_id)));
    }
    let excess = metrics.actual_return - metrics.expected_return;

    let mut contributions: BTreeMap<String, f64> = factor_names.iter().map(|name| (name.clone(), 0.0)).collect();
    let fit_status = match exposures {
        Some(exposures) => {
            for exposure in exposures {
                let contribution = exposure.beta * exposure.factor_move;
                if !contribution.is_finite() {
                    return Err(AppError::Invariant(format!(
                        "decision {}: non-finite contribution for {}",
                        decision_id, exposure.name
                    )));
                }
                contributions.insert(exposure.name.clone(), contribution);
            }
            FitStatus::Fitted
        }
        None => FitStatus::Insufficient,
    };

    let explained: f64 = contributions.values().sum();
    contributions.insert(UNEXPLAINED.to_string(), excess - explained);

    let result = AttributionResult {
        decision_id,
        evaluation_date,
        actual_return: metrics.actual_return,
        expected_return: metrics.expected_return,
        annualized_return: metrics.annualized_return,
        contributions,
        fit_status,
    };
    verify_balance(&result)?;
    Ok(result)
}

/// Contributions, `unexplained` included, must add up to the excess return.
pub fn verify_balance(result: &AttributionResult) -> Result<(), AppError> {
    let total: f64 = result.contributions.values().sum();
    let gap = (total - result.excess_return()).abs();
    if !gap.is_finite() || gap > BALANCE_TOLERANCE {
        return Err(AppError::Invariant(format!(
            "decision {}: contributions sum to {} but excess return is {}",
            result.decision_id,
            total,
            result.excess_return()
        )));
    }
    if !result.contributions.contains_key(UNEXPLAINED) {
        return Err(AppError::Invariant(format!(
            "decision {}: missing {} bucket",
            result.decision_id, UNEXPLAINED
        )));
    }
    Ok(())
}

/// Build exposures from fitted betas and the factors' holding-period moves,
/// sign-adjusted for the decision direction.
pub fn exposures_from_fit(
    names: &[String],
    betas: &[f64],
    holding_moves: &[f64],
    decision: DecisionType,
) -> Vec<FactorExposure> {
    names
        .iter()
        .zip(betas)
        .zip(holding_moves)
        .map(|((name, beta), factor_move)| FactorExposure {
            name: name.clone(),
            beta: decision.direction() * beta,
            factor_move: *factor_move,
        })
        .collect()
}

/// Values of a dated series at each of `dates`, taking the nearest point
/// within `tolerance_days`. None if any date has no point close enough.
pub fn align_to_dates(points: &[(NaiveDate, f64)], dates: &[NaiveDate], tolerance_days: i64) -> Option<Vec<f64>> {
    dates
        .iter()
        .map(|date| {
            points
                .iter()
                .map(|(d, v)| ((*d - *date).num_days().abs(), *d, *v))
                .filter(|(distance, _, v)| *distance <= tolerance_days && v.is_finite())
                .min_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)))
                .map(|(_, _, v)| v)
        })
        .collect()
}

/// Period-over-period differences, for series that are already levels
/// (sentiment) rather than prices.
pub fn level_changes(series: &[f64]) -> Vec<f64> {
    series.windows(2).map(|w| w[1] - w[0]).collect()
}
