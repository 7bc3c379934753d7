//! Retry policy for Telegram requests.
//!
//! Only transient failures are retried: network and I/O errors back off
//! exponentially, `RetryAfter` sleeps exactly as long as Telegram asks. API
//! errors (bad token, bad request, ...) are returned at once.

use std::{future::IntoFuture, time::Duration};

use teloxide::RequestError;
use tokio::time::sleep;
use tracing::warn;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// `None` retries transient failures until they stop.
    pub max_retries: Option<usize>,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// Polling outlives any outage; only API errors end it.
    pub const POLL: RetryPolicy = RetryPolicy {
        max_retries: None,
        base_backoff: Duration::from_secs(1),
        max_backoff: Duration::from_secs(30),
    };

    /// A reply is retried once, then the handler sees the error.
    pub const SEND: RetryPolicy = RetryPolicy {
        max_retries: Some(1),
        base_backoff: Duration::from_secs(1),
        max_backoff: Duration::from_secs(1),
    };

    /// Delay before retry number `attempt` (1-based): base, 2x base, 4x base, ...
    /// capped at `max_backoff`.
    pub fn backoff(&self, attempt: usize) -> Duration {
        let shift = attempt.saturating_sub(1).min(16) as u32;
        self.base_backoff
            .saturating_mul(1u32 << shift)
            .min(self.max_backoff)
    }

    fn allows(&self, attempts: usize) -> bool {
        self.max_retries.map_or(true, |max| attempts < max)
    }
}

pub fn is_transient(e: &RequestError) -> bool {
    matches!(
        e,
        RequestError::Network(_) | RequestError::Io(_) | RequestError::RetryAfter(_)
    )
}

/// Run `op` until it succeeds, fails with a non-transient error, or the
/// policy runs out of retries.
pub async fn with_retry<T, Fut>(
    policy: RetryPolicy,
    mut op: impl FnMut() -> Fut,
) -> Result<T, RequestError>
where
    Fut: IntoFuture<Output = Result<T, RequestError>>,
{
    let mut attempts = 0usize;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if is_transient(&e) && policy.allows(attempts) => {
                attempts += 1;
                let delay = match &e {
                    RequestError::RetryAfter(d) => *d,
                    _ => policy.backoff(attempts),
                };
                warn!(
                    error = %e,
                    attempt = attempts,
                    delay_ms = delay.as_millis() as u64,
                    "transient telegram error, retrying"
                );
                sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
