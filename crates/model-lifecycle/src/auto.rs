use std::sync::Arc;

use chrono::Utc;
use core_types::{Horizon, LifecycleEventType, RollbackSeverity, TradeOutcome};

use crate::error::LifecycleResult;
use crate::event_log::EventLog;
use crate::guardrails::GuardrailStore;
use crate::performance::{self, ComparisonPolicy, PromotionPolicy, RollbackRuleSet};
use crate::registry::ModelRegistry;

/// Window (in days) fed to the comparison/rollback checks. Distinct from
/// `STANDARD_WINDOW_DAYS` — the auto pass always evaluates one horizon at
/// this single width rather than the full rolling ladder.
pub const DEFAULT_EVALUATION_WINDOW_DAYS: u32 = 14;

/// Minimum cooldown between two retrains of the same horizon, independent
/// of the daily cap.
pub const DEFAULT_MIN_RETRAIN_INTERVAL_MINUTES: i64 = 60;

/// Source of realized trade outcomes for a horizon, scoped to active vs.
/// shadow. Left abstract so the pass can be driven by an in-memory fixture
/// in tests and by the real observation/trading pipeline in production.
#[async_trait::async_trait]
pub trait OutcomeSource: Send + Sync {
    async fn active_outcomes(&self, horizon: Horizon, since_days: u32) -> LifecycleResult<Vec<TradeOutcome>>;
    async fn shadow_outcomes(&self, horizon: Horizon, since_days: u32) -> LifecycleResult<Vec<TradeOutcome>>;
}

#[derive(Debug, Clone, Default)]
pub struct PassSummary {
    pub promotions: u32,
    pub rollbacks: u32,
    pub skipped_kill_switch: u32,
    pub skipped_promotion_locked: u32,
}

/// Composes the registry, performance tracker, guardrails, and event log
/// into the two periodic operations the scheduler drives. Kept as its own
/// type so the scheduler only needs one capability to hold, per the
/// "lifecycle controller" seam.
pub struct AutoLifecycleController {
    registry: Arc<ModelRegistry>,
    guardrails: Arc<GuardrailStore>,
    events: Arc<EventLog>,
    outcomes: Arc<dyn OutcomeSource>,
    comparison_policy: ComparisonPolicy,
    promotion_policy: PromotionPolicy,
    rollback_rules: RollbackRuleSet,
    evaluation_window_days: u32,
    max_retrains_per_day: u32,
    min_retrain_interval_minutes: i64,
}

impl AutoLifecycleController {
    pub fn new(registry: Arc<ModelRegistry>, guardrails: Arc<GuardrailStore>, events: Arc<EventLog>, outcomes: Arc<dyn OutcomeSource>) -> Self {
        Self {
            registry,
            guardrails,
            events,
            outcomes,
            comparison_policy: ComparisonPolicy::default(),
            promotion_policy: PromotionPolicy::default(),
            rollback_rules: RollbackRuleSet::default(),
            evaluation_window_days: DEFAULT_EVALUATION_WINDOW_DAYS,
            max_retrains_per_day: 3,
            min_retrain_interval_minutes: DEFAULT_MIN_RETRAIN_INTERVAL_MINUTES,
        }
    }

    /// One promotion pass over the given horizons. No-op per horizon if the
    /// kill switch is engaged or promotion is locked.
    pub async fn run_promotion_pass(&self, horizons: &[Horizon]) -> LifecycleResult<PassSummary> {
        let mut summary = PassSummary::default();

        for &horizon in horizons {
            let guardrail = self.guardrails.get(horizon).await?;
            if guardrail.kill_switch_engaged {
                summary.skipped_kill_switch += 1;
                continue;
            }
            if self.guardrails.is_promotion_locked(horizon).await? {
                summary.skipped_promotion_locked += 1;
                continue;
            }

            let entry = self.registry.get(horizon).await?;
            let Some(shadow_id) = entry.shadow_model_id.clone() else { continue };

            let now = Utc::now();
            let active_outcomes = self.outcomes.active_outcomes(horizon, self.evaluation_window_days).await?;
            let shadow_outcomes = self.outcomes.shadow_outcomes(horizon, self.evaluation_window_days).await?;
            let active_window = performance::compute_window(&active_outcomes, self.evaluation_window_days, now);
            let shadow_window = performance::compute_window(&shadow_outcomes, self.evaluation_window_days, now);

            let comparison = performance::compare(&active_window, &shadow_window, &self.comparison_policy);
            if !performance::is_ready_for_promotion(&comparison, &shadow_window, &self.promotion_policy) {
                continue;
            }

            let event = self.registry.promote(horizon, &shadow_id).await?;
            self.events.record(&event).await?;
            self.guardrails.record_promotion(horizon).await?;
            self.guardrails.try_record_retrain(horizon, self.max_retrains_per_day, self.min_retrain_interval_minutes).await?;
            summary.promotions += 1;
        }

        Ok(summary)
    }

    /// One rollback pass over the given horizons. No-op per horizon if the
    /// kill switch is engaged (promotion lock does not gate rollback —
    /// safety actions must always be able to fire).
    pub async fn run_rollback_pass(&self, horizons: &[Horizon]) -> LifecycleResult<PassSummary> {
        let mut summary = PassSummary::default();

        for &horizon in horizons {
            let guardrail = self.guardrails.get(horizon).await?;
            if guardrail.kill_switch_engaged {
                summary.skipped_kill_switch += 1;
                continue;
            }

            let entry = self.registry.get(horizon).await?;
            if entry.active_model_id.is_none() {
                continue;
            }

            let now = Utc::now();
            let active_outcomes = self.outcomes.active_outcomes(horizon, self.evaluation_window_days).await?;
            let active_window = performance::compute_window(&active_outcomes, self.evaluation_window_days, now);
            let decision = performance::check_rollback(&active_window, &self.rollback_rules);

            if decision.severity != Some(RollbackSeverity::Critical) {
                continue;
            }
            if entry.prev_model_id.is_none() {
                tracing::warn!(?horizon, reason = %decision.reason, "rollback needed but no previous model recorded");
                continue;
            }

            let event = self.registry.rollback(horizon, &decision.reason).await?;
            self.events.record(&event).await?;
            self.guardrails.record_rollback(horizon).await?;
            summary.rollbacks += 1;
        }

        Ok(summary)
    }
}

/// Convenience used by tests and by the scheduler's startup log line.
pub fn event_type_for_pass(is_promotion: bool) -> LifecycleEventType {
    if is_promotion {
        LifecycleEventType::PromotedToActive
    } else {
        LifecycleEventType::RolledBack
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::{ConfidenceLevel, Direction, Symbol};
    use sqlx::sqlite::SqlitePoolOptions;
    use std::sync::Mutex as StdMutex;

    struct FixtureOutcomes {
        active: StdMutex<Vec<TradeOutcome>>,
        shadow: StdMutex<Vec<TradeOutcome>>,
    }

    #[async_trait::async_trait]
    impl OutcomeSource for FixtureOutcomes {
        async fn active_outcomes(&self, _horizon: Horizon, _since_days: u32) -> LifecycleResult<Vec<TradeOutcome>> {
            Ok(self.active.lock().unwrap().clone())
        }
        async fn shadow_outcomes(&self, _horizon: Horizon, _since_days: u32) -> LifecycleResult<Vec<TradeOutcome>> {
            Ok(self.shadow.lock().unwrap().clone())
        }
    }

    fn outcome(minutes_ago: i64, result: Direction, return_pct: f64, is_shadow: bool) -> TradeOutcome {
        TradeOutcome {
            timestamp: Utc::now() - chrono::Duration::minutes(minutes_ago),
            horizon: Horizon::H1,
            symbol: Symbol::new("BTCUSDT"),
            return_pct,
            result,
            model_id: if is_shadow { "shadow-1".to_string() } else { "active-1".to_string() },
            is_shadow,
        }
    }

    async fn setup() -> (ModelRegistry, GuardrailStore, Arc<EventLog>) {
        let pool = SqlitePoolOptions::new().connect("sqlite::memory:").await.unwrap();
        let registry = ModelRegistry::new(pool.clone());
        registry.init_tables().await.unwrap();
        let events = Arc::new(EventLog::new(pool.clone()));
        events.init_tables().await.unwrap();
        let guardrails = GuardrailStore::new(pool, events.clone());
        guardrails.init_tables().await.unwrap();
        (registry, guardrails, events)
    }

    #[tokio::test]
    async fn promotion_pass_promotes_a_clearly_better_shadow() {
        let (registry, guardrails, events) = setup().await;
        registry.promote(Horizon::H1, "active-1").await.unwrap();
        registry.set_shadow(Horizon::H1, "shadow-1").await.unwrap();

        let active: Vec<TradeOutcome> = (0..50).map(|i| outcome(i * 10, if i % 2 == 0 { Direction::Win } else { Direction::Loss }, 0.0, false)).collect();
        let shadow: Vec<TradeOutcome> = (0..50).map(|i| outcome(i * 10, Direction::Win, 0.02, true)).collect();

        let controller = AutoLifecycleController::new(
            Arc::new(registry),
            Arc::new(guardrails),
            events,
            Arc::new(FixtureOutcomes { active: StdMutex::new(active), shadow: StdMutex::new(shadow) }),
        );

        let summary = controller.run_promotion_pass(&[Horizon::H1]).await.unwrap();
        assert_eq!(summary.promotions, 1);

        let entry = controller.registry.get(Horizon::H1).await.unwrap();
        assert_eq!(entry.active_model_id.as_deref(), Some("shadow-1"));
    }

    #[tokio::test]
    async fn kill_switch_blocks_both_passes() {
        let (registry, guardrails, events) = setup().await;
        registry.promote(Horizon::H1, "active-1").await.unwrap();
        guardrails.set_kill_switch(Horizon::H1, true).await.unwrap();

        let controller = AutoLifecycleController::new(
            Arc::new(registry),
            Arc::new(guardrails),
            events,
            Arc::new(FixtureOutcomes { active: StdMutex::new(vec![]), shadow: StdMutex::new(vec![]) }),
        );

        let promo = controller.run_promotion_pass(&[Horizon::H1]).await.unwrap();
        assert_eq!(promo.skipped_kill_switch, 1);
        let rollback = controller.run_rollback_pass(&[Horizon::H1]).await.unwrap();
        assert_eq!(rollback.skipped_kill_switch, 1);
    }

    #[tokio::test]
    async fn rollback_pass_requires_a_previous_model_even_when_critical() {
        let (registry, guardrails, events) = setup().await;
        registry.promote(Horizon::H1, "active-1").await.unwrap();

        let mut losses: Vec<TradeOutcome> = (0..40).map(|i| outcome(i * 10, Direction::Win, 0.01, false)).collect();
        for i in 0..8 {
            losses.push(outcome(i, Direction::Loss, -0.06, false));
        }

        let controller = AutoLifecycleController::new(
            Arc::new(registry),
            Arc::new(guardrails),
            events,
            Arc::new(FixtureOutcomes { active: StdMutex::new(losses), shadow: StdMutex::new(vec![]) }),
        );

        let summary = controller.run_rollback_pass(&[Horizon::H1]).await.unwrap();
        assert_eq!(summary.rollbacks, 0);

        let entry = controller.registry.get(Horizon::H1).await.unwrap();
        assert_eq!(entry.active_model_id.as_deref(), Some("active-1"));
    }

    #[test]
    fn confidence_is_reexported_for_callers_inspecting_comparisons() {
        let _ = ConfidenceLevel::High;
    }
}
