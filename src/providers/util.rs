use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// How often and how patiently a quote request is retried.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Attempts after the first one.
    pub retries: usize,
    /// Delay before the first retry, doubled for every further one.
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            retries: 2,
            initial_delay: Duration::from_millis(500),
        }
    }
}

/// Connection failures and timeouts are worth another try. Anything that produced a response,
/// or a malformed request, is not.
fn is_transient(err: &reqwest::Error) -> bool {
    err.is_connect() || err.is_timeout()
}

/// Runs `operation` until it succeeds, fails with a non-transient error, or `policy` runs out
/// of retries.
pub async fn with_retry<F, Fut, T>(
    mut operation: F,
    policy: RetryPolicy,
) -> Result<T, reqwest::Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, reqwest::Error>>,
{
    let mut attempt = 0;
    let mut delay = policy.initial_delay;
    loop {
        match operation().await {
            Ok(val) => return Ok(val),
            Err(err) if attempt < policy.retries && is_transient(&err) => {
                attempt += 1;
                debug!(
                    "Attempt {}/{} failed: {}. Retrying...",
                    attempt, policy.retries, err
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
            Err(err) => return Err(err),
        }
    }
}
