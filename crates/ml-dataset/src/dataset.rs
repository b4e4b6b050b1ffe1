use std::sync::Arc;

use chrono::{DateTime, Utc};
use core_types::{DatasetRow, Horizon, Observation, Symbol};
use observation_store::ObservationStore;

use crate::config::{DatasetConfig, LabelConfig};
use crate::error::DatasetResult;
use crate::outcome::OutcomeBuilder;

/// Builds causal, labeled training rows for one (symbol, horizon) pair from
/// a range of stored observations. No feature read here may depend on data
/// past its own t0 — every feature comes straight off the t0 observation's
/// own indicator map.
pub struct DatasetBuilder {
    store: Arc<ObservationStore>,
    outcomes: OutcomeBuilder,
    config: DatasetConfig,
}

impl DatasetBuilder {
    pub fn new(store: Arc<ObservationStore>, label_config: LabelConfig, config: DatasetConfig) -> Self {
        let outcomes = OutcomeBuilder::new(store.clone(), label_config);
        Self { store, outcomes, config }
    }

    fn to_row(symbol: &Symbol, horizon: Horizon, t0_obs: &Observation, outcome: &core_types::Outcome) -> Option<DatasetRow> {
        let features: Vec<(String, f64)> = t0_obs
            .indicators
            .iter()
            .map(|(id, v)| (id.clone(), v.value))
            .collect();

        Some(DatasetRow {
            symbol: symbol.clone(),
            horizon,
            t0: t0_obs.timestamp,
            features,
            label: outcome.direction,
            return_pct: outcome.return_pct,
            data_mode: t0_obs.source_meta.data_mode,
        })
    }

    /// Builds rows for every observation of `symbol` in `[start, end]`.
    /// Observations whose outcome is still pending, or whose feature count
    /// is below the configured minimum, are silently excluded — they are
    /// not errors, just not yet usable training examples.
    pub async fn build_rows(
        &self,
        symbol: &Symbol,
        horizon: Horizon,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DatasetResult<Vec<DatasetRow>> {
        let candidates = self.store.get_range(symbol.as_str(), start, end).await?;
        let mut rows = Vec::with_capacity(candidates.len());

        for t0_obs in &candidates {
            if t0_obs.indicators.len() < self.config.min_features {
                continue;
            }

            match self.outcomes.build(symbol, horizon, t0_obs).await? {
                Some(outcome) => {
                    if let Some(row) = Self::to_row(symbol, horizon, t0_obs, &outcome) {
                        rows.push(row);
                    }
                }
                None => continue,
            }
        }

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use core_types::{
        DataMode, Direction, IndicatorCategory, IndicatorValue, ObservationIndicatorMeta, ObservationSource,
        ObservationSourceMeta,
    };
    use sqlx::sqlite::SqlitePoolOptions;
    use std::collections::HashMap;

    async fn store() -> Arc<ObservationStore> {
        let pool = SqlitePoolOptions::new().connect("sqlite::memory:").await.unwrap();
        let store = ObservationStore::new(pool);
        store.init_tables().await.unwrap();
        Arc::new(store)
    }

    fn rich_obs(symbol: &str, timestamp: chrono::DateTime<Utc>, price: f64, n_features: usize) -> Observation {
        let mut indicators = HashMap::new();
        for i in 0..n_features {
            indicators.insert(
                format!("f{i}"),
                IndicatorValue::new(format!("f{i}"), IndicatorCategory::Momentum, i as f64),
            );
        }

        Observation {
            id: format!("obs-{}", timestamp.timestamp_millis()),
            symbol: Symbol::new(symbol),
            timestamp,
            last_price: price,
            mark_price: None,
            best_bid: Some(price - 0.1),
            best_ask: Some(price + 0.1),
            bar: None,
            indicators,
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
                count: n_features,
                missing_ids: vec![],
                source: ObservationSource::Polling,
            },
        }
    }

    #[tokio::test]
    async fn excludes_rows_below_minimum_feature_count() {
        let store = store().await;
        let t0 = Utc::now();
        let sparse = rich_obs("BTCUSDT", t0, 100.0, 2);
        let t1 = rich_obs("BTCUSDT", t0 + Duration::minutes(60), 110.0, 2);
        store.append(&sparse).await.unwrap();
        store.append(&t1).await.unwrap();

        let builder = DatasetBuilder::new(store, LabelConfig::default(), DatasetConfig { min_features: 8 });
        let rows = builder
            .build_rows(&Symbol::new("BTCUSDT"), Horizon::H1, t0 - Duration::minutes(1), t0 + Duration::minutes(1))
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn includes_resolved_rows_with_enough_features() {
        let store = store().await;
        let t0 = Utc::now();
        let rich = rich_obs("BTCUSDT", t0, 100.0, 10);
        let t1 = rich_obs("BTCUSDT", t0 + Duration::minutes(60), 110.0, 10);
        store.append(&rich).await.unwrap();
        store.append(&t1).await.unwrap();

        let builder = DatasetBuilder::new(store, LabelConfig::default(), DatasetConfig::default());
        let rows = builder
            .build_rows(&Symbol::new("BTCUSDT"), Horizon::H1, t0 - Duration::minutes(1), t0 + Duration::minutes(1))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].features.len(), 10);
        assert_eq!(rows[0].label, Direction::Win);
    }
}
