use std::sync::Arc;

use chrono::Duration as ChronoDuration;
use core_types::{Direction, Horizon, Observation, Outcome, Symbol};
use observation_store::ObservationStore;

use crate::config::LabelConfig;
use crate::error::DatasetResult;

/// Pairs a t0 observation with the nearest t1 observation at or beyond
/// `t0 + horizon` and computes the realized outcome. The platform does not
/// declare LONG/SHORT trade intent (it observes, it does not trade), so the
/// realized direction is simply the sign of price change against `epsilon`.
pub struct OutcomeBuilder {
    store: Arc<ObservationStore>,
    config: LabelConfig,
}

impl OutcomeBuilder {
    pub fn new(store: Arc<ObservationStore>, config: LabelConfig) -> Self {
        Self { store, config }
    }

    /// Returns `Ok(None)` when no qualifying t1 observation exists yet —
    /// the outcome is pending, not an error.
    pub async fn build(&self, symbol: &Symbol, horizon: Horizon, t0_obs: &Observation) -> DatasetResult<Option<Outcome>> {
        let target = t0_obs.timestamp + ChronoDuration::minutes(horizon.minutes() as i64);
        let candidate = self.store.get_at_or_after(symbol.as_str(), target).await?;

        let Some(t1_obs) = candidate else {
            return Ok(None);
        };

        let tolerance = self.config.t1_tolerance;
        if t1_obs.timestamp < target - tolerance {
            return Ok(None);
        }

        Ok(Some(self.compute(symbol, horizon, t0_obs, &t1_obs)))
    }

    fn compute(&self, symbol: &Symbol, horizon: Horizon, t0: &Observation, t1: &Observation) -> Outcome {
        let return_pct = if t0.last_price > 0.0 {
            (t1.last_price - t0.last_price) / t0.last_price
        } else {
            0.0
        };

        let direction = if return_pct > self.config.epsilon {
            Direction::Win
        } else if return_pct < -self.config.epsilon {
            Direction::Loss
        } else {
            Direction::Neutral
        };

        Outcome {
            symbol: symbol.clone(),
            horizon,
            t0: t0.timestamp,
            t0_observation_id: t0.id.clone(),
            t1_observation_id: t1.id.clone(),
            t0_price: t0.last_price,
            t1_price: t1.last_price,
            return_pct,
            direction,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use core_types::{DataMode, ObservationIndicatorMeta, ObservationSource, ObservationSourceMeta};
    use sqlx::sqlite::SqlitePoolOptions;
    use std::collections::HashMap;

    async fn store() -> Arc<ObservationStore> {
        let pool = SqlitePoolOptions::new().connect("sqlite::memory:").await.unwrap();
        let store = ObservationStore::new(pool);
        store.init_tables().await.unwrap();
        Arc::new(store)
    }

    fn obs(symbol: &str, timestamp: chrono::DateTime<Utc>, price: f64) -> Observation {
        Observation {
            id: format!("obs-{}", timestamp.timestamp_millis()),
            symbol: Symbol::new(symbol),
            timestamp,
            last_price: price,
            mark_price: None,
            best_bid: Some(price - 0.1),
            best_ask: Some(price + 0.1),
            bar: None,
            indicators: HashMap::new(),
            regime: None,
            liquidation_cascade: false,
            patterns: vec![],
            source_meta: ObservationSourceMeta {
                providers_used: vec!["mock".into()],
                missing: vec![],
                data_mode: DataMode::Live,
            },
            indicator_meta: ObservationIndicatorMeta {
                completeness: 1.0,
                count: 0,
                missing_ids: vec![],
                source: ObservationSource::Polling,
            },
        }
    }

    #[tokio::test]
    async fn win_when_return_exceeds_epsilon() {
        let store = store().await;
        let t0 = Utc::now();
        let t0_obs = obs("BTCUSDT", t0, 100.0);
        let t1_obs = obs("BTCUSDT", t0 + ChronoDuration::minutes(60), 105.0);
        store.append(&t0_obs).await.unwrap();
        store.append(&t1_obs).await.unwrap();

        let builder = OutcomeBuilder::new(store, LabelConfig::default());
        let outcome = builder
            .build(&Symbol::new("BTCUSDT"), Horizon::H1, &t0_obs)
            .await
            .unwrap()
            .expect("outcome should resolve");
        assert_eq!(outcome.direction, Direction::Win);
        assert!(outcome.return_pct > 0.0);
    }

    #[tokio::test]
    async fn pending_when_no_t1_observation_exists() {
        let store = store().await;
        let t0 = Utc::now();
        let t0_obs = obs("ETHUSDT", t0, 100.0);
        store.append(&t0_obs).await.unwrap();

        let builder = OutcomeBuilder::new(store, LabelConfig::default());
        let outcome = builder.build(&Symbol::new("ETHUSDT"), Horizon::H1, &t0_obs).await.unwrap();
        assert!(outcome.is_none());
    }
}
