use chrono::{DateTime, Utc};
use core_types::Observation;
use sqlx::SqlitePool;

use crate::error::StoreResult;

/// Append-only observation collection keyed by (symbol, timestamp). Writes
/// are idempotent upserts; there is no delete path — retention is a
/// maintenance concern that lives outside this crate.
pub struct ObservationStore {
    pool: SqlitePool,
}

impl ObservationStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn init_tables(&self) -> StoreResult<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS observations (
                symbol TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                id TEXT NOT NULL,
                regime_type TEXT,
                completeness REAL NOT NULL,
                data_mode TEXT NOT NULL,
                payload TEXT NOT NULL,
                PRIMARY KEY (symbol, timestamp)
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_observations_symbol_time ON observations (symbol, timestamp)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_observations_symbol_regime_time
             ON observations (symbol, regime_type, timestamp)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_observations_symbol_completeness_time
             ON observations (symbol, completeness DESC, timestamp)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Idempotent by (symbol, timestamp): a repeat write for the same key
    /// replaces the stored payload rather than erroring or duplicating.
    pub async fn append(&self, observation: &Observation) -> StoreResult<()> {
        let payload = serde_json::to_string(observation)?;
        let regime_type = observation.regime.map(|r| r.regime_type.as_str().to_string());
        let data_mode = match observation.source_meta.data_mode {
            core_types::DataMode::Live => "live",
            core_types::DataMode::Backfill => "backfill",
        };

        sqlx::query(
            "INSERT INTO observations (symbol, timestamp, id, regime_type, completeness, data_mode, payload)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(symbol, timestamp) DO UPDATE SET
                id = excluded.id,
                regime_type = excluded.regime_type,
                completeness = excluded.completeness,
                data_mode = excluded.data_mode,
                payload = excluded.payload",
        )
        .bind(observation.symbol.as_str())
        .bind(observation.timestamp.to_rfc3339())
        .bind(&observation.id)
        .bind(regime_type)
        .bind(observation.indicator_meta.completeness)
        .bind(data_mode)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn decode(row: (String,)) -> StoreResult<Observation> {
        Ok(serde_json::from_str(&row.0)?)
    }

    pub async fn get_range(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<Observation>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT payload FROM observations
             WHERE symbol = ? AND timestamp >= ? AND timestamp <= ?
             ORDER BY timestamp ASC",
        )
        .bind(symbol)
        .bind(start.to_rfc3339())
        .bind(end.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::decode).collect()
    }

    /// Smallest observation at or after `at`, used by the outcome builder
    /// to locate t1 for a given horizon.
    pub async fn get_at_or_after(&self, symbol: &str, at: DateTime<Utc>) -> StoreResult<Option<Observation>> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT payload FROM observations
             WHERE symbol = ? AND timestamp >= ?
             ORDER BY timestamp ASC LIMIT 1",
        )
        .bind(symbol)
        .bind(at.to_rfc3339())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::decode).transpose()
    }

    pub async fn get_latest(&self, symbol: &str) -> StoreResult<Option<Observation>> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT payload FROM observations WHERE symbol = ? ORDER BY timestamp DESC LIMIT 1",
        )
        .bind(symbol)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::decode).transpose()
    }

    pub async fn get_by_regime(
        &self,
        symbol: &str,
        regime_type: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<Observation>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT payload FROM observations
             WHERE symbol = ? AND regime_type = ? AND timestamp >= ? AND timestamp <= ?
             ORDER BY timestamp ASC",
        )
        .bind(symbol)
        .bind(regime_type)
        .bind(start.to_rfc3339())
        .bind(end.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::decode).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::{DataMode, ObservationIndicatorMeta, ObservationSource, ObservationSourceMeta, Symbol};
    use sqlx::sqlite::SqlitePoolOptions;
    use std::collections::HashMap;

    async fn test_store() -> ObservationStore {
        let pool = SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .expect("in-memory sqlite pool");
        let store = ObservationStore::new(pool);
        store.init_tables().await.expect("init tables");
        store
    }

    fn sample(symbol: &str, timestamp: DateTime<Utc>) -> Observation {
        Observation {
            id: uuid_like(timestamp),
            symbol: Symbol::new(symbol),
            timestamp,
            last_price: 100.0,
            mark_price: None,
            best_bid: Some(99.9),
            best_ask: Some(100.1),
            bar: None,
            indicators: HashMap::new(),
            regime: None,
            liquidation_cascade: false,
            patterns: Vec::new(),
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

    fn uuid_like(timestamp: DateTime<Utc>) -> String {
        format!("obs-{}", timestamp.timestamp_nanos_opt().unwrap_or_default())
    }

    #[tokio::test]
    async fn append_then_read_range_round_trips() {
        let store = test_store().await;
        let t0 = Utc::now();
        store.append(&sample("BTCUSDT", t0)).await.unwrap();

        let rows = store
            .get_range("BTCUSDT", t0 - chrono::Duration::seconds(1), t0 + chrono::Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].symbol.as_str(), "BTCUSDT");
    }

    #[tokio::test]
    async fn repeat_write_at_same_timestamp_is_idempotent() {
        let store = test_store().await;
        let t0 = Utc::now();
        let mut obs = sample("ETHUSDT", t0);
        store.append(&obs).await.unwrap();

        obs.last_price = 200.0;
        store.append(&obs).await.unwrap();

        let latest = store.get_latest("ETHUSDT").await.unwrap().unwrap();
        assert_eq!(latest.last_price, 200.0);

        let rows = store
            .get_range("ETHUSDT", t0 - chrono::Duration::seconds(1), t0 + chrono::Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1, "second write must replace, not duplicate");
    }

    #[tokio::test]
    async fn get_at_or_after_finds_smallest_matching_timestamp() {
        let store = test_store().await;
        let t0 = Utc::now();
        let t1 = t0 + chrono::Duration::minutes(5);
        let t2 = t0 + chrono::Duration::minutes(10);
        store.append(&sample("BTCUSDT", t0)).await.unwrap();
        store.append(&sample("BTCUSDT", t1)).await.unwrap();
        store.append(&sample("BTCUSDT", t2)).await.unwrap();

        let found = store
            .get_at_or_after("BTCUSDT", t0 + chrono::Duration::minutes(3))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.timestamp, t1);
    }
}
