use std::sync::Arc;

use chrono::Utc;
use core_types::{DriftSeverity, GuardrailState, Horizon, LifecycleEvent, LifecycleEventType};
use sqlx::SqlitePool;

use crate::error::LifecycleResult;
use crate::event_log::EventLog;

fn new_event(horizon: Horizon, event_type: LifecycleEventType, reason: impl Into<String>) -> LifecycleEvent {
    LifecycleEvent {
        id: uuid::Uuid::new_v4().to_string(),
        horizon,
        event_type,
        model_id: None,
        previous_model_id: None,
        reason: reason.into(),
        occurred_at: Utc::now(),
    }
}

/// Process-scoped guardrail posture, persisted under a generic key-value
/// table keyed by horizon — the same upsert-by-key pattern the collector's
/// upstream agent state uses, just scoped one level deeper (per horizon
/// instead of one global blob).
pub struct GuardrailStore {
    pool: SqlitePool,
    events: Arc<EventLog>,
}

impl GuardrailStore {
    pub fn new(pool: SqlitePool, events: Arc<EventLog>) -> Self {
        Self { pool, events }
    }

    pub async fn init_tables(&self) -> LifecycleResult<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS guardrail_state (
                horizon_minutes INTEGER PRIMARY KEY,
                state_json TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get(&self, horizon: Horizon) -> LifecycleResult<GuardrailState> {
        let row: Option<(String,)> = sqlx::query_as("SELECT state_json FROM guardrail_state WHERE horizon_minutes = ?")
            .bind(horizon.minutes() as i64)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some((json,)) => Ok(serde_json::from_str(&json)?),
            None => Ok(GuardrailState::fresh(horizon)),
        }
    }

    async fn persist(&self, state: &GuardrailState) -> LifecycleResult<()> {
        let json = serde_json::to_string(state)?;
        sqlx::query(
            "INSERT INTO guardrail_state (horizon_minutes, state_json) VALUES (?, ?)
             ON CONFLICT(horizon_minutes) DO UPDATE SET state_json = excluded.state_json",
        )
        .bind(state.horizon.minutes() as i64)
        .bind(json)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn set_kill_switch(&self, horizon: Horizon, engaged: bool) -> LifecycleResult<GuardrailState> {
        let mut state = self.get(horizon).await?;
        state.kill_switch_engaged = engaged;
        self.persist(&state).await?;
        Ok(state)
    }

    pub async fn lock_promotion_for(&self, horizon: Horizon, until: chrono::DateTime<Utc>) -> LifecycleResult<GuardrailState> {
        let mut state = self.get(horizon).await?;
        state.promotion_locked_until = Some(until);
        self.persist(&state).await?;
        Ok(state)
    }

    pub async fn is_promotion_locked(&self, horizon: Horizon) -> LifecycleResult<bool> {
        let state = self.get(horizon).await?;
        Ok(state.promotion_locked_until.map(|until| Utc::now() < until).unwrap_or(false))
    }

    /// `capExposure(x) = min(x, maxPortfolioExposure)`, reading the stored cap.
    pub async fn cap_exposure(&self, horizon: Horizon, requested: f64) -> LifecycleResult<f64> {
        let state = self.get(horizon).await?;
        Ok(state.cap_exposure(requested))
    }

    /// `shouldBlockTrading(vol) = vol > maxVolatilityForTrading`, reading the stored cap.
    pub async fn should_block_trading(&self, horizon: Horizon, volatility: f64) -> LifecycleResult<bool> {
        let state = self.get(horizon).await?;
        Ok(state.should_block_trading(volatility))
    }

    /// Allowed when (a) today's count is under `max_per_day` and (b) at
    /// least `min_interval_minutes` have passed since the last retrain.
    /// The daily counter resets the first time a new UTC day is observed.
    pub async fn try_record_retrain(&self, horizon: Horizon, max_per_day: u32, min_interval_minutes: i64) -> LifecycleResult<bool> {
        let mut state = self.get(horizon).await?;
        let now = Utc::now();
        let today = now.date_naive();

        if state.retrain_throttle_day != Some(today) {
            state.retrain_throttle_day = Some(today);
            state.retrain_count_today = 0;
        }

        if state.retrain_count_today >= max_per_day {
            return Ok(false);
        }

        if let Some(last) = state.last_retrain_at {
            if now - last < chrono::Duration::minutes(min_interval_minutes) {
                return Ok(false);
            }
        }

        state.retrain_count_today += 1;
        state.last_retrain_at = Some(now);
        self.persist(&state).await?;
        Ok(true)
    }

    pub async fn record_rollback(&self, horizon: Horizon) -> LifecycleResult<GuardrailState> {
        let mut state = self.get(horizon).await?;
        state.last_rollback_at = Some(Utc::now());
        state.consecutive_rollbacks += 1;
        self.persist(&state).await?;
        Ok(state)
    }

    pub async fn record_promotion(&self, horizon: Horizon) -> LifecycleResult<GuardrailState> {
        let mut state = self.get(horizon).await?;
        state.consecutive_rollbacks = 0;
        self.persist(&state).await?;
        Ok(state)
    }

    /// Mutates the stored drift severity and, if it actually changed, logs
    /// the transition: `GuardrailReset` when it falls back to `Normal`,
    /// `GuardrailTripped` otherwise.
    pub async fn set_drift_state(&self, horizon: Horizon, drift: DriftSeverity) -> LifecycleResult<GuardrailState> {
        let mut state = self.get(horizon).await?;
        let previous = state.drift_state;
        if previous == drift {
            return Ok(state);
        }

        state.drift_state = drift;
        self.persist(&state).await?;

        let event_type = if drift == DriftSeverity::Normal { LifecycleEventType::GuardrailReset } else { LifecycleEventType::GuardrailTripped };
        let event = new_event(horizon, event_type, format!("drift state changed from {previous:?} to {drift:?}"));
        self.events.record(&event).await?;

        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn store() -> GuardrailStore {
        let pool = SqlitePoolOptions::new().connect("sqlite::memory:").await.unwrap();
        let events = Arc::new(EventLog::new(pool.clone()));
        events.init_tables().await.unwrap();
        let store = GuardrailStore::new(pool, events);
        store.init_tables().await.unwrap();
        store
    }

    #[tokio::test]
    async fn fresh_state_has_no_kill_switch() {
        let store = store().await;
        let state = store.get(Horizon::H1).await.unwrap();
        assert!(!state.kill_switch_engaged);
    }

    #[tokio::test]
    async fn retrain_throttle_rejects_beyond_daily_cap() {
        let store = store().await;
        assert!(store.try_record_retrain(Horizon::H1, 2, 0).await.unwrap());
        assert!(store.try_record_retrain(Horizon::H1, 2, 0).await.unwrap());
        assert!(!store.try_record_retrain(Horizon::H1, 2, 0).await.unwrap());
    }

    #[tokio::test]
    async fn retrain_throttle_rejects_within_min_interval() {
        let store = store().await;
        assert!(store.try_record_retrain(Horizon::H1, 10, 60).await.unwrap());
        assert!(!store.try_record_retrain(Horizon::H1, 10, 60).await.unwrap());
    }

    #[tokio::test]
    async fn kill_switch_persists_across_reads() {
        let store = store().await;
        store.set_kill_switch(Horizon::H1, true).await.unwrap();
        let state = store.get(Horizon::H1).await.unwrap();
        assert!(state.kill_switch_engaged);
    }

    #[tokio::test]
    async fn cap_exposure_and_should_block_trading_read_the_stored_caps() {
        let store = store().await;
        assert_eq!(store.cap_exposure(Horizon::H1, 2.0).await.unwrap(), 1.0);
        assert!(!store.should_block_trading(Horizon::H1, 0.5).await.unwrap());

        let mut state = store.get(Horizon::H1).await.unwrap();
        state.exposure_cap = 0.25;
        state.volatility_cap = 0.1;
        store.persist(&state).await.unwrap();

        assert_eq!(store.cap_exposure(Horizon::H1, 2.0).await.unwrap(), 0.25);
        assert!(store.should_block_trading(Horizon::H1, 0.2).await.unwrap());
    }

    #[tokio::test]
    async fn set_drift_state_logs_only_on_an_actual_transition() {
        let store = store().await;
        store.set_drift_state(Horizon::H1, DriftSeverity::Normal).await.unwrap();
        let tripped_before = store.events.total_count(LifecycleEventType::GuardrailTripped, None).await.unwrap();
        assert_eq!(tripped_before, 0);

        store.set_drift_state(Horizon::H1, DriftSeverity::Critical).await.unwrap();
        let tripped = store.events.total_count(LifecycleEventType::GuardrailTripped, None).await.unwrap();
        assert_eq!(tripped, 1);

        store.set_drift_state(Horizon::H1, DriftSeverity::Normal).await.unwrap();
        let reset = store.events.total_count(LifecycleEventType::GuardrailReset, None).await.unwrap();
        assert_eq!(reset, 1);
    }
}
