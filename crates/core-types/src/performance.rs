use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::outcome::{Direction, Horizon};
use crate::symbol::Symbol;

/// One realized trade used for performance measurement — distinct from
/// `Outcome`, which labels a dataset row for training. A `TradeOutcome` is
/// produced once a model (active or shadow) would have acted on a signal
/// and that signal's horizon has resolved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeOutcome {
    pub timestamp: DateTime<Utc>,
    pub horizon: Horizon,
    pub symbol: Symbol,
    pub return_pct: f64,
    pub result: Direction,
    pub model_id: String,
    pub is_shadow: bool,
}

/// Rolling-window performance summary for one (symbol, horizon, window)
/// triple as of a reference time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PerformanceWindow {
    pub window_days: u32,
    pub samples: u64,
    pub wins: u64,
    pub losses: u64,
    pub neutrals: u64,
    pub win_rate: f64,
    pub mean_return: f64,
    pub std_return: f64,
    pub sharpe_like: f64,
    pub final_equity: f64,
    pub max_drawdown: f64,
    pub longest_losing_streak: u32,
    /// Run of consecutive losses ending at the most recent trade in the
    /// window — what a rollback's "streak killer" check cares about, as
    /// distinct from the longest streak seen anywhere in the window.
    pub current_losing_streak: u32,
    pub stability_score: f64,
}

impl PerformanceWindow {
    pub fn empty(window_days: u32) -> Self {
        Self {
            window_days,
            samples: 0,
            wins: 0,
            losses: 0,
            neutrals: 0,
            win_rate: 0.0,
            mean_return: 0.0,
            std_return: 0.0,
            sharpe_like: 0.0,
            final_equity: 1.0,
            max_drawdown: 0.0,
            longest_losing_streak: 0,
            current_losing_streak: 0,
            stability_score: 0.0,
        }
    }
}

/// Deltas between a shadow and active window, and the standard windows a
/// rolling computation reports over.
pub const STANDARD_WINDOW_DAYS: [u32; 7] = [7, 14, 30, 60, 90, 180, 365];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceComparison {
    pub shadow_better: bool,
    pub confidence: Option<ConfidenceLevel>,
    pub reason: String,
    pub delta_win_rate: f64,
    pub delta_max_drawdown: f64,
    pub delta_sharpe_like: f64,
    pub delta_stability_score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackSeverity {
    Warning,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackDecision {
    pub needed: bool,
    pub severity: Option<RollbackSeverity>,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftSeverity {
    Normal,
    Warning,
    Critical,
}
