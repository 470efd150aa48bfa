//! Fixed-delay retry for narrowly matched transient faults

use crate::config::DatabaseConfig;
use crate::error::{Error, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

/// How many times to try and how long to wait in between
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Policy for storage calls, from `[database]` config
    pub fn storage(config: &DatabaseConfig) -> Self {
        Self::new(
            config.retry_attempts,
            Duration::from_secs(config.retry_delay_secs),
        )
    }
}

/// Run `operation` until it succeeds, fails with an error `should_retry`
/// rejects, or `policy.max_attempts` is used up.
pub async fn retry_when<F, Fut, T, P>(
    operation_name: &str,
    policy: &RetryPolicy,
    should_retry: P,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    P: Fn(&Error) -> bool,
{
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(val) => {
                if attempt > 1 {
                    info!("'{}' succeeded on attempt {}", operation_name, attempt);
                }
                return Ok(val);
            }
            Err(err) if attempt < policy.max_attempts && should_retry(&err) => {
                warn!(
                    "'{}' failed (attempt {}/{}): {}. Waiting {:?}...",
                    operation_name, attempt, policy.max_attempts, err, policy.delay
                );
                sleep(policy.delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Retry only transient storage faults
pub async fn retry_storage<F, Fut, T>(
    operation_name: &str,
    policy: &RetryPolicy,
    operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    retry_when(operation_name, policy, Error::is_transient_storage, operation).await
}
