//! Retry with exponential backoff for remote calls

use std::future::Future;
use std::time::Duration;

use crate::error::Result;

/// Delay before retry number `attempt` (0-based): 500ms, 1s, 2s, ...
pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(500 * 2u64.pow(attempt.min(6)))
}

/// Run `operation` until it succeeds, fails permanently, or `max_retries`
/// retries are spent. Only errors with `Error::is_transient` are retried.
pub async fn retry_with_backoff<F, Fut, T>(label: &str, max_retries: u32, operation: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < max_retries && e.is_transient() => {
                let delay = backoff_delay(attempt);
                tracing::warn!(
                    "{} failed (attempt {}/{}): {}; retrying in {:?}",
                    label,
                    attempt + 1,
                    max_retries + 1,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
