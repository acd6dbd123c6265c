use governor::{DefaultDirectRateLimiter, Quota, RateLimiter as GovernorRateLimiter};
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Global token bucket shared by every request path of a session.
pub struct RateLimiter {
    limiter: DefaultDirectRateLimiter,
    issued: AtomicU64,
}

impl RateLimiter {
    pub fn new(requests_per_second: u32) -> Self {
        let rps = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        // a small burst keeps requests spread across the second
        let burst = NonZeroU32::new((rps.get() / 4).max(1)).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::per_second(rps).allow_burst(burst);

        debug!(
            "[RateLimit] {} req/s, burst {}",
            requests_per_second,
            burst.get()
        );

        Self {
            limiter: GovernorRateLimiter::direct(quota),
            issued: AtomicU64::new(0),
        }
    }

    /// Waits for a token. Every outgoing request calls this exactly once.
    pub async fn acquire(&self) {
        self.limiter.until_ready().await;
        self.issued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn issued(&self) -> u64 {
        self.issued.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_counts_acquired_tokens() {
        let limiter = RateLimiter::new(1000);
        for _ in 0..5 {
            limiter.acquire().await;
        }
        assert_eq!(limiter.issued(), 5);
    }

    #[tokio::test]
    async fn test_zero_rate_still_issues_tokens() {
        let limiter = RateLimiter::new(0);
        limiter.acquire().await;
        assert_eq!(limiter.issued(), 1);
    }
}
