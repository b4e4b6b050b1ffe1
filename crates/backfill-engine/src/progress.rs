use chrono::{DateTime, Duration, Utc};
use std::sync::atomic::{AtomicU64, Ordering};

/// Lifecycle of one backfill run. Mirrors the replay-session state shape
/// (active/paused/completed/abandoned) extended with the queued/failed
/// states a fire-and-forget background job needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackfillState {
    Queued,
    Running,
    Paused,
    Done,
    Failed,
    Cancelled,
}

impl std::fmt::Display for BackfillState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BackfillState::Queued => "queued",
            BackfillState::Running => "running",
            BackfillState::Paused => "paused",
            BackfillState::Done => "done",
            BackfillState::Failed => "failed",
            BackfillState::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// Point-in-time progress snapshot for one run, safe to poll from another
/// task while the engine is mid-pass.
#[derive(Debug, Clone)]
pub struct ProgressSnapshot {
    pub state: BackfillState,
    pub candles_processed: u64,
    pub observations_written: u64,
    pub ml_rows_written: u64,
    pub total_bars_estimate: u64,
    pub last_processed_timestamp: Option<DateTime<Utc>>,
    pub eta: Option<Duration>,
}

/// Shared, atomically-updated counters plus a `Mutex`-guarded state/timestamp
/// pair. Counters use relaxed atomics since progress reporting tolerates a
/// slightly stale read; state transitions go through the mutex because they
/// must be observed as a whole (state + timestamp together).
pub struct RunProgress {
    state: std::sync::Mutex<(BackfillState, Option<DateTime<Utc>>)>,
    started_at: std::sync::Mutex<Option<DateTime<Utc>>>,
    candles_processed: AtomicU64,
    observations_written: AtomicU64,
    ml_rows_written: AtomicU64,
    total_bars_estimate: u64,
}

impl RunProgress {
    pub fn new(total_bars_estimate: u64) -> Self {
        Self {
            state: std::sync::Mutex::new((BackfillState::Queued, None)),
            started_at: std::sync::Mutex::new(None),
            candles_processed: AtomicU64::new(0),
            observations_written: AtomicU64::new(0),
            ml_rows_written: AtomicU64::new(0),
            total_bars_estimate,
        }
    }

    pub fn set_state(&self, state: BackfillState) {
        if state == BackfillState::Running {
            let mut started = self.started_at.lock().unwrap();
            if started.is_none() {
                *started = Some(Utc::now());
            }
        }
        self.state.lock().unwrap().0 = state;
    }

    pub fn state(&self) -> BackfillState {
        self.state.lock().unwrap().0
    }

    pub fn record_candle(&self, timestamp: DateTime<Utc>) {
        self.candles_processed.fetch_add(1, Ordering::Relaxed);
        self.state.lock().unwrap().1 = Some(timestamp);
    }

    pub fn record_observation(&self) {
        self.observations_written.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_ml_row(&self) {
        self.ml_rows_written.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let (state, last_ts) = *self.state.lock().unwrap();
        let processed = self.candles_processed.load(Ordering::Relaxed);
        let eta = self.eta(processed);

        ProgressSnapshot {
            state,
            candles_processed: processed,
            observations_written: self.observations_written.load(Ordering::Relaxed),
            ml_rows_written: self.ml_rows_written.load(Ordering::Relaxed),
            total_bars_estimate: self.total_bars_estimate,
            last_processed_timestamp: last_ts,
            eta,
        }
    }

    fn eta(&self, processed: u64) -> Option<Duration> {
        if processed == 0 || processed >= self.total_bars_estimate {
            return None;
        }
        let started = (*self.started_at.lock().unwrap())?;
        let elapsed = Utc::now() - started;
        let remaining = self.total_bars_estimate.saturating_sub(processed);
        let per_bar = elapsed.num_milliseconds() as f64 / processed as f64;
        Some(Duration::milliseconds((per_bar * remaining as f64) as i64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eta_is_none_before_any_progress() {
        let progress = RunProgress::new(1000);
        progress.set_state(BackfillState::Running);
        assert!(progress.snapshot().eta.is_none());
    }

    #[test]
    fn counters_accumulate() {
        let progress = RunProgress::new(10);
        progress.record_candle(Utc::now());
        progress.record_observation();
        progress.record_ml_row();
        let snap = progress.snapshot();
        assert_eq!(snap.candles_processed, 1);
        assert_eq!(snap.observations_written, 1);
        assert_eq!(snap.ml_rows_written, 1);
    }
}
