use std::future::Future;

use tokio::time::{sleep, timeout, Duration};
use tracing::{error, warn};

use crate::config::RetryConfig;
use crate::errors::AppError;

/// Attempt budget and timing for one external call.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub timeout: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

/// Run `operation` under a timeout, retrying transient failures with
/// exponential backoff. Permanent errors return immediately.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, label: &str, mut operation: F) -> Result<T, AppError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    let mut attempt = 0;
    let mut delay = policy.base_delay;

    loop {
        attempt += 1;
        let outcome = match timeout(policy.timeout, operation()).await {
            Ok(result) => result,
            Err(_) => Err(AppError::Timeout(policy.timeout.as_secs())),
        };

        match outcome {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < policy.max_attempts => {
                warn!(
                    "{} failed (attempt {}/{}): {}. Retrying in {:?}...",
                    label, attempt, policy.max_attempts, e, delay
                );
                sleep(delay).await;
                delay *= 2;
            }
            Err(e) => {
                if e.is_transient() {
                    error!("{} failed after {} attempts: {}", label, attempt, e);
                }
                return Err(e);
            }
        }
    }
}
