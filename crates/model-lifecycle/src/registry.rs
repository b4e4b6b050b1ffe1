use std::sync::Arc;

use chrono::Utc;
use core_types::{Horizon, LifecycleEvent, LifecycleEventType, ModelRegistryEntry};
use dashmap::DashMap;
use sqlx::SqlitePool;
use tokio::sync::Mutex;

use crate::error::{LifecycleError, LifecycleResult};

type Row = (i64, Option<String>, Option<String>, Option<String>, Option<chrono::DateTime<Utc>>, Option<chrono::DateTime<Utc>>, i64, i64, i64);

fn row_to_entry(row: Row) -> ModelRegistryEntry {
    ModelRegistryEntry {
        horizon: Horizon(row.0 as u32),
        active_model_id: row.1,
        shadow_model_id: row.2,
        prev_model_id: row.3,
        active_since: row.4,
        shadow_since: row.5,
        total_versions: row.6 as u32,
        total_promotions: row.7 as u32,
        total_rollbacks: row.8 as u32,
    }
}

fn new_event(horizon: Horizon, event_type: LifecycleEventType, model_id: Option<String>, previous_model_id: Option<String>, reason: impl Into<String>) -> LifecycleEvent {
    LifecycleEvent {
        id: uuid::Uuid::new_v4().to_string(),
        horizon,
        event_type,
        model_id,
        previous_model_id,
        reason: reason.into(),
        occurred_at: Utc::now(),
    }
}

/// Per-horizon ACTIVE/SHADOW/PREV pointer bookkeeping. Every mutating call
/// takes the horizon's own lock first, so two concurrent callers touching
/// different horizons never block each other, and two callers touching the
/// same horizon are serialized rather than racing a read-modify-write.
pub struct ModelRegistry {
    pool: SqlitePool,
    locks: DashMap<Horizon, Arc<Mutex<()>>>,
}

impl ModelRegistry {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool, locks: DashMap::new() }
    }

    pub async fn init_tables(&self) -> LifecycleResult<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS model_registry (
                horizon_minutes INTEGER PRIMARY KEY,
                active_model_id TEXT,
                shadow_model_id TEXT,
                prev_model_id TEXT,
                active_since TEXT,
                shadow_since TEXT,
                total_versions INTEGER NOT NULL DEFAULT 0,
                total_promotions INTEGER NOT NULL DEFAULT 0,
                total_rollbacks INTEGER NOT NULL DEFAULT 0
            )",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get(&self, horizon: Horizon) -> LifecycleResult<ModelRegistryEntry> {
        let row: Option<Row> = sqlx::query_as(
            "SELECT horizon_minutes, active_model_id, shadow_model_id, prev_model_id, active_since, shadow_since, total_versions, total_promotions, total_rollbacks
             FROM model_registry WHERE horizon_minutes = ?",
        )
        .bind(horizon.minutes() as i64)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(row_to_entry).unwrap_or_else(|| ModelRegistryEntry::empty(horizon)))
    }

    async fn persist(&self, entry: &ModelRegistryEntry) -> LifecycleResult<()> {
        sqlx::query(
            "INSERT INTO model_registry
                (horizon_minutes, active_model_id, shadow_model_id, prev_model_id, active_since, shadow_since, total_versions, total_promotions, total_rollbacks)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(horizon_minutes) DO UPDATE SET
                active_model_id = excluded.active_model_id,
                shadow_model_id = excluded.shadow_model_id,
                prev_model_id = excluded.prev_model_id,
                active_since = excluded.active_since,
                shadow_since = excluded.shadow_since,
                total_versions = excluded.total_versions,
                total_promotions = excluded.total_promotions,
                total_rollbacks = excluded.total_rollbacks",
        )
        .bind(entry.horizon.minutes() as i64)
        .bind(&entry.active_model_id)
        .bind(&entry.shadow_model_id)
        .bind(&entry.prev_model_id)
        .bind(entry.active_since)
        .bind(entry.shadow_since)
        .bind(entry.total_versions as i64)
        .bind(entry.total_promotions as i64)
        .bind(entry.total_rollbacks as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Clones the `Arc` out rather than returning the `DashMap` guard
    /// itself, since that guard must not be held across an `.await`.
    fn lock_for(&self, horizon: Horizon) -> Arc<Mutex<()>> {
        self.locks.entry(horizon).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    /// Moves the current ACTIVE to PREV and installs `candidate_id` as the
    /// new ACTIVE. If the candidate was the shadow, the shadow pointer is
    /// cleared — a model cannot be both active and shadow at once.
    pub async fn promote(&self, horizon: Horizon, candidate_id: &str) -> LifecycleResult<LifecycleEvent> {
        let lock = self.lock_for(horizon);
        let _guard = lock.lock().await;

        let mut entry = self.get(horizon).await?;
        let previous_active = entry.active_model_id.clone();

        entry.prev_model_id = previous_active.clone();
        entry.active_model_id = Some(candidate_id.to_string());
        entry.active_since = Some(Utc::now());
        entry.total_versions += 1;
        entry.total_promotions += 1;
        if entry.shadow_model_id.as_deref() == Some(candidate_id) {
            entry.shadow_model_id = None;
            entry.shadow_since = None;
        }

        self.persist(&entry).await?;

        Ok(new_event(
            horizon,
            LifecycleEventType::PromotedToActive,
            Some(candidate_id.to_string()),
            previous_active,
            "promoted to active",
        ))
    }

    /// Swaps ACTIVE and PREV. The model being demoted moves to the PREV
    /// slot, mirroring promote's bookkeeping, so a second rollback can undo
    /// the first.
    pub async fn rollback(&self, horizon: Horizon, reason: &str) -> LifecycleResult<LifecycleEvent> {
        let lock = self.lock_for(horizon);
        let _guard = lock.lock().await;

        let mut entry = self.get(horizon).await?;
        let restored = entry.prev_model_id.clone().ok_or(LifecycleError::NoPreviousModel(horizon))?;
        let demoted = entry.active_model_id.clone();

        entry.active_model_id = Some(restored.clone());
        entry.prev_model_id = demoted.clone();
        entry.active_since = Some(Utc::now());
        entry.total_rollbacks += 1;

        self.persist(&entry).await?;

        Ok(new_event(horizon, LifecycleEventType::RolledBack, Some(restored), demoted, reason))
    }

    /// Independent of ACTIVE/PREV. Emits an event only when the shadow
    /// pointer actually changes, so re-setting the same id is a no-op event
    /// wise even though it still re-persists the row.
    pub async fn set_shadow(&self, horizon: Horizon, shadow_id: &str) -> LifecycleResult<Option<LifecycleEvent>> {
        let lock = self.lock_for(horizon);
        let _guard = lock.lock().await;

        let mut entry = self.get(horizon).await?;
        if entry.shadow_model_id.as_deref() == Some(shadow_id) {
            return Ok(None);
        }

        entry.shadow_model_id = Some(shadow_id.to_string());
        entry.shadow_since = Some(Utc::now());
        self.persist(&entry).await?;

        Ok(Some(new_event(horizon, LifecycleEventType::PromotedToShadow, Some(shadow_id.to_string()), None, "set as shadow")))
    }

    pub async fn clear_shadow(&self, horizon: Horizon) -> LifecycleResult<Option<LifecycleEvent>> {
        let lock = self.lock_for(horizon);
        let _guard = lock.lock().await;

        let mut entry = self.get(horizon).await?;
        if entry.shadow_model_id.is_none() {
            return Ok(None);
        }

        let cleared = entry.shadow_model_id.take();
        entry.shadow_since = None;
        self.persist(&entry).await?;

        Ok(Some(new_event(horizon, LifecycleEventType::Retired, cleared, None, "shadow cleared")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn registry() -> ModelRegistry {
        let pool = SqlitePoolOptions::new().connect("sqlite::memory:").await.unwrap();
        let registry = ModelRegistry::new(pool);
        registry.init_tables().await.unwrap();
        registry
    }

    #[tokio::test]
    async fn promote_sets_active_and_records_previous() {
        let registry = registry().await;
        registry.promote(Horizon::H1, "model-a").await.unwrap();
        registry.promote(Horizon::H1, "model-b").await.unwrap();

        let entry = registry.get(Horizon::H1).await.unwrap();
        assert_eq!(entry.active_model_id.as_deref(), Some("model-b"));
        assert_eq!(entry.prev_model_id.as_deref(), Some("model-a"));
        assert_eq!(entry.total_promotions, 2);
    }

    #[tokio::test]
    async fn rollback_without_previous_model_fails() {
        let registry = registry().await;
        registry.promote(Horizon::H1, "model-a").await.unwrap();
        let result = registry.rollback(Horizon::H1, "bad performance").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn rollback_swaps_active_and_prev() {
        let registry = registry().await;
        registry.promote(Horizon::H1, "model-a").await.unwrap();
        registry.promote(Horizon::H1, "model-b").await.unwrap();

        registry.rollback(Horizon::H1, "bad performance").await.unwrap();

        let entry = registry.get(Horizon::H1).await.unwrap();
        assert_eq!(entry.active_model_id.as_deref(), Some("model-a"));
        assert_eq!(entry.prev_model_id.as_deref(), Some("model-b"));
        assert_eq!(entry.total_rollbacks, 1);
    }

    #[tokio::test]
    async fn setting_same_shadow_twice_emits_event_only_once() {
        let registry = registry().await;
        let first = registry.set_shadow(Horizon::H1, "candidate-1").await.unwrap();
        let second = registry.set_shadow(Horizon::H1, "candidate-1").await.unwrap();
        assert!(first.is_some());
        assert!(second.is_none());
    }
}
