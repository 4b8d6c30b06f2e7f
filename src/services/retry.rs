use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::warn;

/// Shared retry discipline for external calls: bounded attempts with
/// exponential backoff (`base * 2^attempt`) plus uniform jitter, capped.
///
/// Both the market-data fetch path and the sector classifier use this so the
/// backoff behavior lives (and is tested) in one place.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            jitter: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
            jitter: Duration::from_secs(1),
        }
    }

    /// Policy with no delays, for tests that only care about attempt counts.
    #[cfg(test)]
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter: Duration::ZERO,
        }
    }

    /// Delay before retrying after `attempt` failures (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.max_delay);

        let jitter_ms = self.jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return exp;
        }
        exp + Duration::from_millis(rand::random_range(0..=jitter_ms))
    }

    /// Run `op` until it succeeds or `max_attempts` is exhausted, returning
    /// the last error. `op` receives the 0-based attempt number.
    pub async fn run<T, E, F, Fut>(&self, what: &str, mut op: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut attempt = 0;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    attempt += 1;
                    if attempt >= self.max_attempts {
                        warn!(
                            "{} failed after {} attempts: {}",
                            what, self.max_attempts, e
                        );
                        return Err(e);
                    }
                    let delay = self.delay_for(attempt - 1);
                    warn!(
                        "{} failed (attempt {}/{}): {}. Retrying in {:?}...",
                        what, attempt, self.max_attempts, e, delay
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn no_jitter(policy: RetryPolicy) -> RetryPolicy {
        RetryPolicy {
            jitter: Duration::ZERO,
            ..policy
        }
    }

    #[test]
    fn delay_doubles_per_attempt() {
        let policy = no_jitter(RetryPolicy::new(
            5,
            Duration::from_secs(1),
            Duration::from_secs(60),
        ));
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for(3), Duration::from_secs(8));
    }

    #[test]
    fn delay_is_capped() {
        let policy = no_jitter(RetryPolicy::new(
            10,
            Duration::from_secs(1),
            Duration::from_secs(60),
        ));
        assert_eq!(policy.delay_for(9), Duration::from_secs(60));
        assert_eq!(policy.delay_for(31), Duration::from_secs(60));
    }

    #[test]
    fn jitter_stays_within_bound() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            jitter: Duration::from_millis(500),
        };
        for _ in 0..100 {
            let d = policy.delay_for(0);
            assert!(d >= Duration::from_secs(1));
            assert!(d <= Duration::from_millis(1_500));
        }
    }

    #[tokio::test]
    async fn returns_first_success() {
        let policy = RetryPolicy::immediate(3);
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = policy
            .run("op", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(42) }
            })
            .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausts_exactly_max_attempts() {
        let policy = RetryPolicy::immediate(4);
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = policy
            .run("op", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("boom".to_string()) }
            })
            .await;
        assert_eq!(result.unwrap_err(), "boom");
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn recovers_after_transient_failures() {
        let policy = RetryPolicy::immediate(3);
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = policy
            .run("op", |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 2 {
                        Err("transient".to_string())
                    } else {
                        Ok(7)
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
