//! Retry with exponential back-off for LLM requests.
//!
//! Every error is retried: a local model server that is still loading weights
//! answers with connection errors, 5xx responses and empty completions alike.

use std::future::Future;
use std::time::Duration;

use crate::error::LlmError;

/// Total attempts per request, including the first.
pub(crate) const MAX_ATTEMPTS: u32 = 3;
/// Delay before the second attempt; doubles after each failure.
pub(crate) const BACKOFF_BASE_MS: u64 = 1_000;
const MAX_DELAY_MS: u64 = 10_000;

/// Back-off before retry number `retry` (1-based), capped at 10 s.
pub(crate) fn backoff_delay_ms(backoff_base_ms: u64, retry: u32) -> u64 {
    backoff_base_ms
        .saturating_mul(1u64 << (retry.saturating_sub(1)).min(10))
        .min(MAX_DELAY_MS)
}

/// Runs `operation` up to `max_attempts` times, sleeping between failures.
///
/// | Attempt | Sleep before next attempt |
/// |---------|---------------------------|
/// | 1       | base × 2⁰                 |
/// | 2       | base × 2¹                 |
///
/// The last error is returned when every attempt fails.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_attempts: u32,
    backoff_base_ms: u64,
    mut operation: F,
) -> Result<T, LlmError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, LlmError>>,
{
    let mut attempt = 1u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= max_attempts {
                    return Err(err);
                }
                let delay_ms = backoff_delay_ms(backoff_base_ms, attempt);
                tracing::warn!(
                    attempt,
                    max_attempts,
                    delay_ms,
                    error = %err,
                    "LLM request failed, retrying after back-off"
                );
                attempt += 1;
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}
