//! Retry combinator for idempotent network operations.
//!
//! Fixed attempt count with a fixed inter-attempt delay plus random
//! jitter (0-250ms). Replaces per-call-site retry loops.

use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use rand::Rng;
use tracing::warn;

const JITTER_MS: u64 = 250;

/// Run `op` up to `max_attempts` times, sleeping `delay` plus jitter
/// between attempts. Returns the first success or the last error.
pub async fn with_retry<T, F, Fut>(
    label: &str,
    max_attempts: u32,
    delay: Duration,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < max_attempts => {
                let jitter = Duration::from_millis(rand::rng().random_range(0..JITTER_MS));
                warn!(label, attempt, error = %e, "Attempt failed, retrying after delay");
                tokio::time::sleep(delay + jitter).await;
            }
            Err(e) => {
                warn!(label, attempt, error = %e, "Attempt failed, giving up");
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use anyhow::anyhow;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn first_success_makes_a_single_attempt() {
        let calls = AtomicU32::new(0);
        let result = with_retry("ok", 3, Duration::from_millis(10), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(42) }
        })
        .await
        .unwrap();
        assert_eq!(result, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = with_retry("flaky", 3, Duration::from_millis(10), || {
            let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if attempt < 3 {
                    Err(anyhow!("transient"))
                } else {
                    Ok("done")
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(result, "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_attempts_return_the_last_error() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retry("broken", 2, Duration::from_millis(10), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(anyhow!("still down")) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
