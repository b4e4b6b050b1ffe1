use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::time::Instant;

const MIN_RATE_LIMIT_BACKOFF: Duration = Duration::from_secs(5);

/// Sliding-window token bucket for one venue: at most `max_requests` per
/// `window`. Calls beyond the limit wait for the oldest timestamp to age out.
struct VenueLimiter {
    timestamps: Mutex<VecDeque<Instant>>,
    max_requests: usize,
    window: Duration,
    /// Set by `back_off` after a 429; `acquire` waits this out before
    /// admitting more requests for the venue.
    backoff_until: Mutex<Option<Instant>>,
}

impl VenueLimiter {
    fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            timestamps: Mutex::new(VecDeque::new()),
            max_requests,
            window,
            backoff_until: Mutex::new(None),
        }
    }

    async fn acquire(&self) {
        loop {
            let backoff = *self.backoff_until.lock().await;
            if let Some(until) = backoff {
                let now = Instant::now();
                if now < until {
                    tokio::time::sleep(until - now).await;
                    continue;
                }
            }

            let mut ts = self.timestamps.lock().await;
            let now = Instant::now();
            while let Some(&front) = ts.front() {
                if now.duration_since(front) >= self.window {
                    ts.pop_front();
                } else {
                    break;
                }
            }

            if ts.len() < self.max_requests {
                ts.push_back(now);
                return;
            }

            let wait_until = ts.front().copied().unwrap_or(now) + self.window;
            drop(ts);
            let sleep_dur = wait_until.saturating_duration_since(now) + Duration::from_millis(50);
            tokio::time::sleep(sleep_dur).await;
        }
    }

    async fn back_off(&self) {
        let mut b = self.backoff_until.lock().await;
        let until = Instant::now() + MIN_RATE_LIMIT_BACKOFF;
        if b.map(|existing| existing < until).unwrap_or(true) {
            *b = Some(until);
        }
    }
}

/// Process-wide scheduler: one token bucket per venue id, created lazily
/// on first use. `schedule` is the single entry point every provider call
/// passes through.
#[derive(Clone)]
pub struct RateLimiterRegistry {
    limiters: Arc<DashMap<String, Arc<VenueLimiter>>>,
    default_max_requests: usize,
    default_window: Duration,
}

impl RateLimiterRegistry {
    pub fn new(default_max_requests: usize, default_window: Duration) -> Self {
        Self {
            limiters: Arc::new(DashMap::new()),
            default_max_requests,
            default_window,
        }
    }

    fn limiter_for(&self, venue_id: &str) -> Arc<VenueLimiter> {
        self.limiters
            .entry(venue_id.to_string())
            .or_insert_with(|| Arc::new(VenueLimiter::new(self.default_max_requests, self.default_window)))
            .clone()
    }

    /// Admit the call when a token is available for `venue_id`, running
    /// `f` once admitted.
    pub async fn schedule<F, Fut, T>(&self, venue_id: &str, f: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = T>,
    {
        let limiter = self.limiter_for(venue_id);
        limiter.acquire().await;
        f().await
    }

    /// Record a 429 for `venue_id`: the next `schedule` call for that venue
    /// waits out at least `MIN_RATE_LIMIT_BACKOFF` before admitting again.
    pub async fn record_rate_limited(&self, venue_id: &str) {
        let limiter = self.limiter_for(venue_id);
        limiter.back_off().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn admits_up_to_limit_without_delay() {
        let registry = RateLimiterRegistry::new(2, Duration::from_secs(60));
        let start = Instant::now();
        for _ in 0..2 {
            registry.schedule("binance", || async { 1 }).await;
        }
        assert!(start.elapsed() < Duration::from_millis(200));
    }

    #[tokio::test]
    async fn separate_venues_have_independent_buckets() {
        let registry = RateLimiterRegistry::new(1, Duration::from_secs(60));
        registry.schedule("binance", || async { 1 }).await;
        let start = Instant::now();
        registry.schedule("bybit", || async { 1 }).await;
        assert!(start.elapsed() < Duration::from_millis(200));
    }
}
