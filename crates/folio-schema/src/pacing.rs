//! Call pacing and the single rate-limit retry.
//!
//! One [`Pacer`] is shared by every component that talks to the surface in a
//! run, so consecutive calls are spaced by the minimum interval no matter
//! which component issues them.

use std::future::Future;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep, sleep_until, Instant};
use tracing::warn;

use crate::config::Timing;
use crate::error::{RemoteError, RemoteResult};

/// Spaces remote calls and retries once after a rate-limit rejection.
#[derive(Debug)]
pub struct Pacer {
    min_interval: Duration,
    rate_limit_backoff: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl Pacer {
    #[must_use]
    pub fn new(timing: &Timing) -> Self {
        Self {
            min_interval: timing.min_call_interval,
            rate_limit_backoff: timing.rate_limit_backoff,
            last_call: Mutex::new(None),
        }
    }

    /// Wait until the minimum interval since the previous call has elapsed,
    /// then claim the slot.
    async fn wait_turn(&self) {
        let mut last_call = self.last_call.lock().await;
        if let Some(previous) = *last_call {
            let next = previous + self.min_interval;
            if Instant::now() < next {
                sleep_until(next).await;
            }
        }
        *last_call = Some(Instant::now());
    }

    fn backoff_for(&self, retry_after_secs: Option<u64>) -> Duration {
        let server = Duration::from_secs(retry_after_secs.unwrap_or(0));
        self.rate_limit_backoff.max(server)
    }

    /// Issue `call` in turn. A rate-limited call is retried exactly once after
    /// the backoff; the second outcome is returned as-is.
    pub async fn call<T, F, Fut>(&self, target: &str, mut call: F) -> RemoteResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = RemoteResult<T>>,
    {
        self.wait_turn().await;
        match call().await {
            Err(RemoteError::RateLimited { retry_after_secs }) => {
                let backoff = self.backoff_for(retry_after_secs);
                warn!(
                    target_object = %target,
                    backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
                    "rate limited, retrying once"
                );
                sleep(backoff).await;
                self.wait_turn().await;
                call().await
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn timing(min_interval_ms: u64, backoff_ms: u64) -> Timing {
        Timing {
            min_call_interval: Duration::from_millis(min_interval_ms),
            rate_limit_backoff: Duration::from_millis(backoff_ms),
            ..Timing::immediate()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_consecutive_calls_are_spaced() {
        let pacer = Pacer::new(&timing(100, 0));
        let start = Instant::now();
        for _ in 0..3 {
            pacer.call("t", || async { Ok::<_, RemoteError>(()) }).await.unwrap();
        }
        assert!(start.elapsed() >= Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_retried_once_after_backoff() {
        let pacer = Pacer::new(&timing(0, 500));
        let attempts = &AtomicUsize::new(0);
        let start = Instant::now();
        let result = pacer
            .call("t", || async move {
                if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(RemoteError::RateLimited {
                        retry_after_secs: None,
                    })
                } else {
                    Ok(7)
                }
            })
            .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert!(start.elapsed() >= Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_rate_limit_is_returned() {
        let pacer = Pacer::new(&timing(0, 0));
        let attempts = &AtomicUsize::new(0);
        let result: RemoteResult<()> = pacer
            .call("t", || async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(RemoteError::RateLimited {
                    retry_after_secs: None,
                })
            })
            .await;
        assert!(result.unwrap_err().is_rate_limited());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_backoff_honors_retry_after() {
        let pacer = Pacer::new(&timing(0, 1_000));
        assert_eq!(pacer.backoff_for(None), Duration::from_secs(1));
        assert_eq!(pacer.backoff_for(Some(4)), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_errors_are_not_retried() {
        let pacer = Pacer::new(&timing(0, 0));
        let attempts = &AtomicUsize::new(0);
        let result: RemoteResult<()> = pacer
            .call("t", || async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(RemoteError::Timeout)
            })
            .await;
        assert!(matches!(result, Err(RemoteError::Timeout)));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
