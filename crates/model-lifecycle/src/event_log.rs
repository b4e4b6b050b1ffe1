use core_types::{Horizon, LifecycleEvent, LifecycleEventType};
use sqlx::SqlitePool;

use crate::error::LifecycleResult;

/// Append-only audit trail. Rows are never updated or deleted once written
/// — the guardrail store's own state is what gets mutated; this is the
/// record of every transition that led there.
pub struct EventLog {
    pool: SqlitePool,
}

impl EventLog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn init_tables(&self) -> LifecycleResult<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS lifecycle_events (
                id TEXT PRIMARY KEY,
                horizon_minutes INTEGER NOT NULL,
                event_type TEXT NOT NULL,
                model_id TEXT,
                previous_model_id TEXT,
                reason TEXT NOT NULL,
                occurred_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_lifecycle_events_horizon ON lifecycle_events (horizon_minutes, occurred_at)")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn record(&self, event: &LifecycleEvent) -> LifecycleResult<()> {
        sqlx::query(
            "INSERT INTO lifecycle_events (id, horizon_minutes, event_type, model_id, previous_model_id, reason, occurred_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&event.id)
        .bind(event.horizon.minutes() as i64)
        .bind(event_type_str(event.event_type))
        .bind(&event.model_id)
        .bind(&event.previous_model_id)
        .bind(&event.reason)
        .bind(event.occurred_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Most recent event of the given type for a horizon, e.g. last
    /// promotion or last rollback.
    pub async fn last_of_type(&self, horizon: Horizon, event_type: LifecycleEventType) -> LifecycleResult<Option<LifecycleEvent>> {
        let row: Option<(String, i64, String, Option<String>, Option<String>, String, chrono::DateTime<chrono::Utc>)> = sqlx::query_as(
            "SELECT id, horizon_minutes, event_type, model_id, previous_model_id, reason, occurred_at
             FROM lifecycle_events WHERE horizon_minutes = ? AND event_type = ? ORDER BY occurred_at DESC LIMIT 1",
        )
        .bind(horizon.minutes() as i64)
        .bind(event_type_str(event_type))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.and_then(|(id, horizon_minutes, event_type, model_id, previous_model_id, reason, occurred_at)| {
            Some(LifecycleEvent {
                id,
                horizon: Horizon(horizon_minutes as u32),
                event_type: event_type_from_str(&event_type)?,
                model_id,
                previous_model_id,
                reason,
                occurred_at,
            })
        }))
    }

    /// Count of events of the given type across all horizons within the
    /// trailing `since` window (e.g. promotions in the last 7 days).
    pub async fn count_since(&self, event_type: LifecycleEventType, since: chrono::DateTime<chrono::Utc>) -> LifecycleResult<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM lifecycle_events WHERE event_type = ? AND occurred_at >= ?")
            .bind(event_type_str(event_type))
            .bind(since)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }

    /// Total count of events of the given type, optionally scoped to one
    /// horizon.
    pub async fn total_count(&self, event_type: LifecycleEventType, horizon: Option<Horizon>) -> LifecycleResult<i64> {
        let row: (i64,) = match horizon {
            Some(h) => {
                sqlx::query_as("SELECT COUNT(*) FROM lifecycle_events WHERE event_type = ? AND horizon_minutes = ?")
                    .bind(event_type_str(event_type))
                    .bind(h.minutes() as i64)
                    .fetch_one(&self.pool)
                    .await?
            }
            None => {
                sqlx::query_as("SELECT COUNT(*) FROM lifecycle_events WHERE event_type = ?")
                    .bind(event_type_str(event_type))
                    .fetch_one(&self.pool)
                    .await?
            }
        };
        Ok(row.0)
    }

    pub async fn history(&self, horizon: Horizon, limit: i64) -> LifecycleResult<Vec<LifecycleEvent>> {
        let rows: Vec<(String, i64, String, Option<String>, Option<String>, String, chrono::DateTime<chrono::Utc>)> = sqlx::query_as(
            "SELECT id, horizon_minutes, event_type, model_id, previous_model_id, reason, occurred_at
             FROM lifecycle_events WHERE horizon_minutes = ? ORDER BY occurred_at DESC LIMIT ?",
        )
        .bind(horizon.minutes() as i64)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(id, horizon_minutes, event_type, model_id, previous_model_id, reason, occurred_at)| {
                Some(LifecycleEvent {
                    id,
                    horizon: Horizon(horizon_minutes as u32),
                    event_type: event_type_from_str(&event_type)?,
                    model_id,
                    previous_model_id,
                    reason,
                    occurred_at,
                })
            })
            .collect())
    }
}

fn event_type_str(t: LifecycleEventType) -> &'static str {
    match t {
        LifecycleEventType::Trained => "trained",
        LifecycleEventType::PromotedToShadow => "promoted_to_shadow",
        LifecycleEventType::PromotedToActive => "promoted_to_active",
        LifecycleEventType::RolledBack => "rolled_back",
        LifecycleEventType::Retired => "retired",
        LifecycleEventType::GuardrailTripped => "guardrail_tripped",
        LifecycleEventType::GuardrailReset => "guardrail_reset",
    }
}

/// Parses the wire form of an event type (as stored and as accepted by
/// API callers) back into the enum.
pub fn parse_event_type(s: &str) -> Option<LifecycleEventType> {
    event_type_from_str(s)
}

fn event_type_from_str(s: &str) -> Option<LifecycleEventType> {
    Some(match s {
        "trained" => LifecycleEventType::Trained,
        "promoted_to_shadow" => LifecycleEventType::PromotedToShadow,
        "promoted_to_active" => LifecycleEventType::PromotedToActive,
        "rolled_back" => LifecycleEventType::RolledBack,
        "retired" => LifecycleEventType::Retired,
        "guardrail_tripped" => LifecycleEventType::GuardrailTripped,
        "guardrail_reset" => LifecycleEventType::GuardrailReset,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn log() -> EventLog {
        let pool = SqlitePoolOptions::new().connect("sqlite::memory:").await.unwrap();
        let log = EventLog::new(pool);
        log.init_tables().await.unwrap();
        log
    }

    #[tokio::test]
    async fn records_are_returned_most_recent_first() {
        let log = log().await;
        let older = LifecycleEvent {
            id: "1".to_string(),
            horizon: Horizon::H1,
            event_type: LifecycleEventType::Trained,
            model_id: Some("model-a".to_string()),
            previous_model_id: None,
            reason: "initial training".to_string(),
            occurred_at: Utc::now() - chrono::Duration::minutes(10),
        };
        let newer = LifecycleEvent {
            id: "2".to_string(),
            horizon: Horizon::H1,
            event_type: LifecycleEventType::PromotedToActive,
            model_id: Some("model-a".to_string()),
            previous_model_id: None,
            reason: "promoted".to_string(),
            occurred_at: Utc::now(),
        };
        log.record(&older).await.unwrap();
        log.record(&newer).await.unwrap();

        let history = log.history(Horizon::H1, 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, "2");
    }

    #[tokio::test]
    async fn last_of_type_and_recent_counts() {
        let log = log().await;
        log.record(&LifecycleEvent {
            id: "1".to_string(),
            horizon: Horizon::H1,
            event_type: LifecycleEventType::PromotedToActive,
            model_id: Some("model-a".to_string()),
            previous_model_id: None,
            reason: "promoted".to_string(),
            occurred_at: Utc::now(),
        })
        .await
        .unwrap();

        let last = log.last_of_type(Horizon::H1, LifecycleEventType::PromotedToActive).await.unwrap();
        assert!(last.is_some());

        let recent = log.count_since(LifecycleEventType::PromotedToActive, Utc::now() - chrono::Duration::days(7)).await.unwrap();
        assert_eq!(recent, 1);

        let total = log.total_count(LifecycleEventType::PromotedToActive, Some(Horizon::H1)).await.unwrap();
        assert_eq!(total, 1);
    }
}
