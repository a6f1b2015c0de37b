//! Exponential backoff with jitter, applied around any fallible async
//! operation whose error reports itself as retryable.
//!
//! `delay(k) = min(initial * multiplier^k, max_delay) * (1 + U(0, 0.1))`
//! mirrors the backend's retry helper: capped exponential growth plus
//! up to 10% additive jitter to avoid thundering-herd retries.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::config::RetrySettings;
use crate::error::Error;

fn delay_for_attempt(settings: &RetrySettings, attempt: u32) -> Duration {
    let base = settings.initial_delay.as_secs_f64() * settings.multiplier.powi(attempt as i32);
    let capped = base.min(settings.max_delay.as_secs_f64());
    let jitter = rand::thread_rng().gen_range(0.0..0.1);
    Duration::from_secs_f64(capped * (1.0 + jitter))
}

/// Runs `op` up to `settings.max_attempts` times, waiting between
/// attempts only when the previous error classifies as retryable.
/// The first non-retryable error, or the last retryable one once
/// attempts are exhausted, is returned to the caller.
pub async fn with_retry<T, F, Fut>(settings: &RetrySettings, label: &str, mut op: F) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    let mut last_err = None;
    for attempt in 0..settings.max_attempts.max(1) {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !err.is_retryable() {
                    return Err(err);
                }
                let remaining = settings.max_attempts.saturating_sub(attempt + 1);
                if remaining == 0 {
                    last_err = Some(err);
                    break;
                }
                let wait = delay_for_attempt(settings, attempt);
                warn!(
                    target: "retry",
                    %label, attempt, remaining, wait_ms = wait.as_millis() as u64,
                    error = %err, "retrying after transient failure"
                );
                last_err = Some(err);
                tokio::time::sleep(wait).await;
            }
        }
    }
    Err(last_err.unwrap_or_else(|| Error::Internal("retry loop exited without a result".into())))
}
