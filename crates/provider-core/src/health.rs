use chrono::{DateTime, Utc};
use std::sync::Mutex;

const DEGRADED_THRESHOLD: u32 = 3;
const DOWN_THRESHOLD: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderStatus {
    Initializing,
    Up,
    Degraded,
    Down,
}

/// Snapshot of a provider's health at a point in time. Cheap to clone and
/// hand to callers; the mutable side lives in `HealthTracker`.
#[derive(Debug, Clone)]
pub struct ProviderHealth {
    pub status: ProviderStatus,
    pub consecutive_errors: u32,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<DateTime<Utc>>,
    pub rate_limit_remaining: Option<u32>,
    pub rate_limit_reset: Option<DateTime<Utc>>,
}

impl ProviderHealth {
    pub fn initializing() -> Self {
        Self {
            status: ProviderStatus::Initializing,
            consecutive_errors: 0,
            last_success: None,
            last_error: None,
            rate_limit_remaining: None,
            rate_limit_reset: None,
        }
    }
}

fn status_for_streak(streak: u32) -> ProviderStatus {
    if streak >= DOWN_THRESHOLD {
        ProviderStatus::Down
    } else if streak >= DEGRADED_THRESHOLD {
        ProviderStatus::Degraded
    } else {
        ProviderStatus::Up
    }
}

/// Per-provider circuit breaker. Success and failure are the only inputs;
/// rate-limit metadata rides along but never triggers a transition by
/// itself. Mutated synchronously around the single in-flight request that
/// observed the outcome — a plain mutex is sufficient, there is no
/// contention to optimize away.
pub struct HealthTracker {
    inner: Mutex<ProviderHealth>,
}

impl HealthTracker {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(ProviderHealth::initializing()),
        }
    }

    pub fn snapshot(&self) -> ProviderHealth {
        self.inner.lock().expect("health mutex poisoned").clone()
    }

    pub fn record_success(&self, now: DateTime<Utc>) {
        let mut h = self.inner.lock().expect("health mutex poisoned");
        h.consecutive_errors = 0;
        h.status = ProviderStatus::Up;
        h.last_success = Some(now);
    }

    pub fn record_failure(&self, now: DateTime<Utc>) {
        let mut h = self.inner.lock().expect("health mutex poisoned");
        h.consecutive_errors += 1;
        h.status = status_for_streak(h.consecutive_errors);
        h.last_error = Some(now);
    }

    pub fn record_rate_limit(&self, remaining: Option<u32>, reset: Option<DateTime<Utc>>) {
        let mut h = self.inner.lock().expect("health mutex poisoned");
        h.rate_limit_remaining = remaining;
        h.rate_limit_reset = reset;
    }

    pub fn reset(&self) {
        let mut h = self.inner.lock().expect("health mutex poisoned");
        h.status = ProviderStatus::Up;
        h.consecutive_errors = 0;
    }
}

impl Default for HealthTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trips_at_three_and_five() {
        let tracker = HealthTracker::new();
        let now = Utc::now();
        for _ in 0..2 {
            tracker.record_failure(now);
        }
        assert_eq!(tracker.snapshot().status, ProviderStatus::Up);

        tracker.record_failure(now);
        assert_eq!(tracker.snapshot().status, ProviderStatus::Degraded);

        for _ in 0..2 {
            tracker.record_failure(now);
        }
        assert_eq!(tracker.snapshot().status, ProviderStatus::Down);
        assert_eq!(tracker.snapshot().consecutive_errors, 5);
    }

    #[test]
    fn success_resets_streak_to_up() {
        let tracker = HealthTracker::new();
        let now = Utc::now();
        for _ in 0..5 {
            tracker.record_failure(now);
        }
        assert_eq!(tracker.snapshot().status, ProviderStatus::Down);

        tracker.record_success(now);
        let snap = tracker.snapshot();
        assert_eq!(snap.status, ProviderStatus::Up);
        assert_eq!(snap.consecutive_errors, 0);
    }

    #[test]
    fn scenario_s1_five_failures_then_one_success() {
        let tracker = HealthTracker::new();
        let now = Utc::now();
        let mut statuses = Vec::new();
        for _ in 0..5 {
            tracker.record_failure(now);
            statuses.push(tracker.snapshot().status);
        }
        assert_eq!(statuses[2], ProviderStatus::Degraded);
        assert_eq!(statuses[4], ProviderStatus::Down);

        tracker.record_success(now);
        let snap = tracker.snapshot();
        assert_eq!(snap.status, ProviderStatus::Up);
        assert_eq!(snap.consecutive_errors, 0);
    }
}
