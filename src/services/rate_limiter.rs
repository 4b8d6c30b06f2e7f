use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::{sleep, Instant};

/// Enforces a fixed minimum delay between consecutive external calls.
///
/// The sector classifier issues one AI call per company in a tight loop;
/// without this the provider's per-minute quota is exhausted immediately.
pub struct Throttle {
    last_call: Mutex<Option<Instant>>,
    min_delay: Duration,
}

impl Throttle {
    pub fn new(min_delay: Duration) -> Self {
        Self {
            last_call: Mutex::new(None),
            min_delay,
        }
    }

    /// Sleep until at least `min_delay` has passed since the previous call,
    /// then mark this call as the most recent one.
    pub async fn acquire(&self) {
        let wait = {
            let last = self.last_call.lock();
            match *last {
                Some(at) if at.elapsed() < self.min_delay => Some(self.min_delay - at.elapsed()),
                _ => None,
            }
        }; // lock dropped before sleeping

        if let Some(delay) = wait {
            sleep(delay).await;
        }

        *self.last_call.lock() = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant as StdInstant;

    #[tokio::test]
    async fn first_call_is_immediate() {
        let throttle = Throttle::new(Duration::from_millis(200));
        let start = StdInstant::now();
        throttle.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn second_call_waits_min_delay() {
        let throttle = Throttle::new(Duration::from_millis(150));
        throttle.acquire().await;

        let start = StdInstant::now();
        throttle.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(120));
    }
}
