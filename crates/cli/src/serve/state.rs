//! Application state and rate limiting.

use std::collections::HashMap;
use std::net::IpAddr;
use std::time::Instant;

use convenios_storage::MemoryStorage;
use convenios_workflow::Workflow;
use tokio::sync::Mutex;

use super::RATE_LIMIT_WINDOW_SECS;

/// Per-IP request tracker: (request count, window start time).
type IpTracker = HashMap<IpAddr, (u64, Instant)>;

/// In-memory per-IP rate limiter.
pub struct RateLimiter {
    tracker: Mutex<IpTracker>,
    /// Maximum requests per window.
    pub(crate) max_requests: u64,
}

impl RateLimiter {
    pub fn new(max_requests: u64) -> Self {
        Self {
            tracker: Mutex::new(HashMap::new()),
            max_requests,
        }
    }

    /// Check if a request from the given IP is allowed.
    /// Returns Ok(()) if allowed, Err(retry_after_secs) if rate limited.
    pub(crate) async fn check(&self, ip: IpAddr) -> Result<(), u64> {
        let mut tracker = self.tracker.lock().await;
        let now = Instant::now();

        let entry = tracker.entry(ip).or_insert((0, now));

        let elapsed = now.duration_since(entry.1).as_secs();
        if elapsed >= RATE_LIMIT_WINDOW_SECS {
            entry.0 = 0;
            entry.1 = now;
        }

        entry.0 += 1;
        if entry.0 > self.max_requests {
            Err(RATE_LIMIT_WINDOW_SECS.saturating_sub(elapsed))
        } else {
            Ok(())
        }
    }
}

/// Application state shared across request handlers.
pub struct AppState {
    pub workflow: Workflow<MemoryStorage>,
    pub rate_limiter: RateLimiter,
}

impl AppState {
    pub fn new(workflow: Workflow<MemoryStorage>, rate_limit: u64) -> Self {
        AppState {
            workflow,
            rate_limiter: RateLimiter::new(rate_limit),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[tokio::test]
    async fn limiter_blocks_after_max_requests() {
        let limiter = RateLimiter::new(2);
        let ip = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
        assert!(limiter.check(ip).await.is_ok());
        assert!(limiter.check(ip).await.is_ok());
        let retry_after = limiter.check(ip).await.unwrap_err();
        assert!(retry_after <= RATE_LIMIT_WINDOW_SECS);

        let other = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2));
        assert!(limiter.check(other).await.is_ok());
    }
}
