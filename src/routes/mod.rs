use crate::errors::AppError;

pub(crate) mod health;
pub(crate) mod events;
pub(crate) mod adjustments;
pub(crate) mod attribution;
pub(crate) mod insights;
pub(crate) mod correlations;

const MAX_DAYS: i64 = 3650;
const MAX_LIMIT: i64 = 500;

/// Look-back window from a query parameter, rejecting nonsense values.
pub(crate) fn bounded_days(days: Option<i64>, default: i64) -> Result<i64, AppError> {
    match days {
        None => Ok(default),
        Some(d) if (1..=MAX_DAYS).contains(&d) => Ok(d),
        Some(d) => Err(AppError::Validation(format!(
            "days must be between 1 and {}, got {}",
            MAX_DAYS, d
        ))),
    }
}

pub(crate) fn bounded_limit(limit: Option<i64>, default: i64) -> i64 {
    limit.unwrap_or(default).clamp(1, MAX_LIMIT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounded_days() {
        assert_eq!(bounded_days(None, 30).unwrap(), 30);
        assert_eq!(bounded_days(Some(7), 30).unwrap(), 7);
        assert!(bounded_days(Some(0), 30).is_err());
    }

    #[test]
    fn test_bounded_limit() {
        assert_eq!(bounded_limit(Some(10_000), 20), MAX_LIMIT);
        assert_eq!(bounded_limit(Some(-3), 20), 1);
    }
}
