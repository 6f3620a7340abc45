use std::fmt::Display;

use failsafe::backoff;
use futures::future::BoxFuture;
use tracing::warn;

use crate::query::{QueryPolicy, Retryable};

/// Runs `fetch` until it succeeds, fails with a non retryable error, or the policy runs
/// out of retries. Waits between attempts grow exponentially up to the policy cap.
pub async fn with_retry<V, E, F>(policy: &QueryPolicy, fetch: &F) -> Result<V, E>
where
    E: Retryable + Display,
    F: Fn() -> BoxFuture<'static, Result<V, E>> + ?Sized,
{
    let mut delays = backoff::exponential(policy.backoff_start, policy.backoff_max);

    let mut attempt = 0;
    loop {
        let error = match fetch().await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        if attempt >= policy.retries || !error.is_retryable() {
            return Err(error);
        }

        let delay = delays.next().unwrap_or(policy.backoff_max).min(policy.backoff_max);
        attempt += 1;

        warn!(attempt, delay_ms = delay.as_millis() as u64, "retrying after error: {}", error);
        tokio::time::sleep(delay).await;
    }
}
