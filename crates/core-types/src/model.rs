use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::outcome::Horizon;

/// Closed set of trainable algorithms. Only logistic regression is
/// implemented today; the enum exists so the registry and artifact format
/// don't need to change when a second algorithm is added.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    LogisticRegression,
}

/// Position of a model within its horizon's lifecycle. Exactly one model
/// per horizon may be `Active`; `Shadow` is at most one per horizon as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelStatus {
    Candidate,
    Shadow,
    Active,
    Retired,
}

/// Learned coefficients plus the standardization applied to features before
/// scoring. Serialized as-is into the registry's artifact blob column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub feature_names: Vec<String>,
    pub weights: Vec<f64>,
    pub bias: f64,
    pub feature_means: Vec<f64>,
    pub feature_stdevs: Vec<f64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub brier_score: f64,
    pub auc: Option<f64>,
    pub sample_count: u64,
}

/// Decision thresholds applied to a model's predicted probability at
/// inference time; kept alongside the artifact so a threshold retune never
/// needs a retrain.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ModelThresholds {
    pub win_probability: f64,
    pub loss_probability: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    pub id: String,
    pub horizon: Horizon,
    pub algorithm: Algorithm,
    pub trained_at: DateTime<Utc>,
    pub seed: u64,
    pub training_window_start: DateTime<Utc>,
    pub training_window_end: DateTime<Utc>,
    pub artifact: ModelArtifact,
    pub metrics: ModelMetrics,
    pub thresholds: ModelThresholds,
}

/// A horizon's current pointer set: which model id is active, which (if any)
/// is running in shadow, and when each pointer last moved. The registry
/// keeps exactly one of these per horizon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRegistryEntry {
    pub horizon: Horizon,
    pub active_model_id: Option<String>,
    pub shadow_model_id: Option<String>,
    pub prev_model_id: Option<String>,
    pub active_since: Option<DateTime<Utc>>,
    pub shadow_since: Option<DateTime<Utc>>,
    pub total_versions: u32,
    pub total_promotions: u32,
    pub total_rollbacks: u32,
}

impl ModelRegistryEntry {
    pub fn empty(horizon: Horizon) -> Self {
        Self {
            horizon,
            active_model_id: None,
            shadow_model_id: None,
            prev_model_id: None,
            active_since: None,
            shadow_since: None,
            total_versions: 0,
            total_promotions: 0,
            total_rollbacks: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEventType {
    Trained,
    PromotedToShadow,
    PromotedToActive,
    RolledBack,
    Retired,
    GuardrailTripped,
    GuardrailReset,
}

/// Append-only record of a state transition in a horizon's lifecycle. Never
/// updated or deleted once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub id: String,
    pub horizon: Horizon,
    pub event_type: LifecycleEventType,
    pub model_id: Option<String>,
    pub previous_model_id: Option<String>,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Drift between a shadow model's live performance and its training-time
/// metrics; feeds the auto-rollback guardrail alongside raw performance.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DriftState {
    pub horizon: Horizon,
    pub accuracy_delta: f64,
    pub brier_delta: f64,
    pub evaluated_at: DateTime<Utc>,
}

/// Persisted guardrail posture for a horizon: kill switch, cooldowns, and
/// the retrain throttle, surviving process restarts via the key-value store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardrailState {
    pub horizon: Horizon,
    pub kill_switch_engaged: bool,
    pub promotion_locked_until: Option<DateTime<Utc>>,
    pub last_retrain_at: Option<DateTime<Utc>>,
    pub last_rollback_at: Option<DateTime<Utc>>,
    pub consecutive_rollbacks: u32,
    pub retrain_count_today: u32,
    pub retrain_throttle_day: Option<chrono::NaiveDate>,
    pub drift_state: crate::performance::DriftSeverity,
    pub exposure_cap: f64,
    pub volatility_cap: f64,
}

impl GuardrailState {
    pub fn fresh(horizon: Horizon) -> Self {
        Self {
            horizon,
            kill_switch_engaged: false,
            promotion_locked_until: None,
            last_retrain_at: None,
            last_rollback_at: None,
            consecutive_rollbacks: 0,
            retrain_count_today: 0,
            retrain_throttle_day: None,
            drift_state: crate::performance::DriftSeverity::Normal,
            exposure_cap: 1.0,
            volatility_cap: 1.0,
        }
    }

    /// `capExposure(x) = min(x, maxPortfolioExposure)`.
    pub fn cap_exposure(&self, requested: f64) -> f64 {
        requested.min(self.exposure_cap)
    }

    /// `shouldBlockTrading(vol) = vol > maxVolatilityForTrading`.
    pub fn should_block_trading(&self, volatility: f64) -> bool {
        volatility > self.volatility_cap
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_guardrail_state_has_no_lockouts() {
        let state = GuardrailState::fresh(Horizon::H1);
        assert!(!state.kill_switch_engaged);
        assert!(state.promotion_locked_until.is_none());
        assert_eq!(state.consecutive_rollbacks, 0);
    }

    #[test]
    fn cap_exposure_clamps_to_the_configured_ceiling() {
        let mut state = GuardrailState::fresh(Horizon::H1);
        state.exposure_cap = 0.5;
        assert_eq!(state.cap_exposure(0.3), 0.3);
        assert_eq!(state.cap_exposure(0.9), 0.5);
    }

    #[test]
    fn should_block_trading_trips_only_above_the_volatility_cap() {
        let mut state = GuardrailState::fresh(Horizon::H1);
        state.volatility_cap = 0.2;
        assert!(!state.should_block_trading(0.2));
        assert!(state.should_block_trading(0.21));
    }
}
