use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Enforces a minimum delay between consecutive requests to one host.
///
/// A zero interval disables throttling.
#[derive(Clone)]
pub struct Throttle {
    limiter: Option<Arc<DirectRateLimiter>>,
    min_interval: Duration,
}

impl std::fmt::Debug for Throttle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Throttle")
            .field("min_interval", &self.min_interval)
            .finish()
    }
}

impl Throttle {
    pub fn new(min_interval: Duration) -> Self {
        let limiter = Quota::with_period(min_interval)
            .map(|q| q.allow_burst(NonZeroU32::MIN))
            .map(|q| Arc::new(RateLimiter::direct(q)));
        Self {
            limiter,
            min_interval,
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait until the next request slot is available.
    pub async fn wait(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn spaces_requests_by_min_interval() {
        let throttle = Throttle::new(Duration::from_millis(40));
        let started = Instant::now();
        for _ in 0..3 {
            throttle.wait().await;
        }
        // First slot is free, the next two wait one interval each.
        assert!(
            started.elapsed() >= Duration::from_millis(70),
            "elapsed {:?}",
            started.elapsed()
        );
    }

    #[tokio::test]
    async fn zero_interval_never_waits() {
        let throttle = Throttle::new(Duration::ZERO);
        let started = Instant::now();
        for _ in 0..50 {
            throttle.wait().await;
        }
        assert!(started.elapsed() < Duration::from_millis(50));
    }
}
