use chrono::{DateTime, Duration, Utc};
use core_types::{
    ConfidenceLevel, Direction, PerformanceComparison, PerformanceWindow, RollbackDecision,
    RollbackSeverity, TradeOutcome, STANDARD_WINDOW_DAYS,
};
use std::collections::BTreeMap;

/// Sample-count floor and lift thresholds used by `compare`.
#[derive(Debug, Clone, Copy)]
pub struct ComparisonPolicy {
    pub min_samples: u64,
}

impl Default for ComparisonPolicy {
    fn default() -> Self {
        Self { min_samples: 30 }
    }
}

/// Hard safety floors a shadow must clear before promotion, on top of
/// `compare` saying it's already better.
#[derive(Debug, Clone, Copy)]
pub struct PromotionPolicy {
    pub max_dd_for_promo: f64,
    pub min_stability: f64,
    pub min_win_rate_lift: f64,
    pub min_sharpe_lift: f64,
}

impl Default for PromotionPolicy {
    fn default() -> Self {
        Self {
            max_dd_for_promo: 0.25,
            min_stability: 0.4,
            min_win_rate_lift: 0.02,
            min_sharpe_lift: 0.1,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RollbackRuleSet {
    pub min_samples: u64,
    pub win_rate_floor: f64,
    pub max_drawdown_ceil: f64,
    pub min_stability: f64,
    pub max_consecutive_losses: u32,
}

impl Default for RollbackRuleSet {
    fn default() -> Self {
        Self {
            min_samples: 30,
            win_rate_floor: 0.40,
            max_drawdown_ceil: 0.15,
            min_stability: 0.4,
            max_consecutive_losses: 6,
        }
    }
}

/// Computes the standing (symbol, horizon) window over trailing
/// `window_days` ending at `reference_time`. Outcomes outside the caller's
/// own (symbol, horizon) filtering are the caller's responsibility — this
/// function only filters by time.
pub fn compute_window(outcomes: &[TradeOutcome], window_days: u32, reference_time: DateTime<Utc>) -> PerformanceWindow {
    let cutoff = reference_time - Duration::days(window_days as i64);
    let mut windowed: Vec<&TradeOutcome> = outcomes
        .iter()
        .filter(|o| o.timestamp > cutoff && o.timestamp <= reference_time)
        .collect();
    windowed.sort_by_key(|o| o.timestamp);

    if windowed.is_empty() {
        return PerformanceWindow::empty(window_days);
    }

    let samples = windowed.len() as u64;
    let wins = windowed.iter().filter(|o| o.result == Direction::Win).count() as u64;
    let losses = windowed.iter().filter(|o| o.result == Direction::Loss).count() as u64;
    let neutrals = samples - wins - losses;
    let win_rate = if wins + losses > 0 { wins as f64 / (wins + losses) as f64 } else { 0.0 };

    let returns: Vec<f64> = windowed.iter().map(|o| o.return_pct).collect();
    let mean_return = returns.iter().sum::<f64>() / samples as f64;
    let variance = returns.iter().map(|r| (r - mean_return).powi(2)).sum::<f64>() / samples as f64;
    let std_return = variance.sqrt();
    let sharpe_like = if std_return > 0.0 { mean_return / std_return } else { 0.0 };

    let mut equity = 1.0;
    let mut peak = 1.0;
    let mut max_drawdown: f64 = 0.0;
    let mut longest_losing_streak = 0u32;
    let mut current_streak_in_loop = 0u32;
    for o in &windowed {
        equity *= 1.0 + o.return_pct;
        peak = peak.max(equity);
        let drawdown = if peak > 0.0 { (peak - equity) / peak } else { 0.0 };
        max_drawdown = max_drawdown.max(drawdown);

        if o.result == Direction::Loss {
            current_streak_in_loop += 1;
            longest_losing_streak = longest_losing_streak.max(current_streak_in_loop);
        } else {
            current_streak_in_loop = 0;
        }
    }

    let mut current_losing_streak = 0u32;
    for o in windowed.iter().rev() {
        if o.result == Direction::Loss {
            current_losing_streak += 1;
        } else {
            break;
        }
    }

    let stability_score = if std_return <= 0.0 {
        (1.0 - max_drawdown).clamp(0.0, 1.0)
    } else if mean_return.abs() < 1e-9 {
        0.0
    } else {
        (1.0 / (1.0 + std_return / mean_return.abs()) * (1.0 - max_drawdown)).clamp(0.0, 1.0)
    };

    PerformanceWindow {
        window_days,
        samples,
        wins,
        losses,
        neutrals,
        win_rate,
        mean_return,
        std_return,
        sharpe_like,
        final_equity: equity,
        max_drawdown,
        longest_losing_streak,
        current_losing_streak,
        stability_score,
    }
}

/// Rolling mode: one window per standard size, all evaluated against the
/// same trailing outcomes and reference time.
pub fn compute_rolling(outcomes: &[TradeOutcome], reference_time: DateTime<Utc>) -> BTreeMap<u32, PerformanceWindow> {
    STANDARD_WINDOW_DAYS
        .iter()
        .map(|&days| (days, compute_window(outcomes, days, reference_time)))
        .collect()
}

pub fn compare(active: &PerformanceWindow, shadow: &PerformanceWindow, policy: &ComparisonPolicy) -> PerformanceComparison {
    let delta_win_rate = shadow.win_rate - active.win_rate;
    let delta_max_drawdown = shadow.max_drawdown - active.max_drawdown;
    let delta_sharpe_like = shadow.sharpe_like - active.sharpe_like;
    let delta_stability_score = shadow.stability_score - active.stability_score;

    let base = PerformanceComparison {
        shadow_better: false,
        confidence: None,
        reason: String::new(),
        delta_win_rate,
        delta_max_drawdown,
        delta_sharpe_like,
        delta_stability_score,
    };

    if shadow.samples < policy.min_samples {
        return PerformanceComparison { reason: "SAMPLES_LOW".to_string(), ..base };
    }

    if delta_win_rate >= 0.02 && delta_max_drawdown <= 0.0 {
        let confidence = if delta_win_rate >= 0.05 { ConfidenceLevel::High } else { ConfidenceLevel::Medium };
        return PerformanceComparison {
            shadow_better: true,
            confidence: Some(confidence),
            reason: format!("win rate lift of {:.3} with no drawdown regression", delta_win_rate),
            ..base
        };
    }

    if delta_sharpe_like >= 0.1 && delta_stability_score >= 0.0 {
        let confidence = if delta_sharpe_like >= 0.2 { ConfidenceLevel::High } else { ConfidenceLevel::Medium };
        return PerformanceComparison {
            shadow_better: true,
            confidence: Some(confidence),
            reason: format!("sharpe-like lift of {:.3} with stable stability score", delta_sharpe_like),
            ..base
        };
    }

    PerformanceComparison { reason: "no sufficient edge over active".to_string(), ..base }
}

/// Comparison plus hard safety floors, per the promotion policy. `compare`
/// alone only says the shadow looks better; this additionally refuses to
/// promote a shadow that is itself unsafe.
pub fn is_ready_for_promotion(comparison: &PerformanceComparison, shadow: &PerformanceWindow, policy: &PromotionPolicy) -> bool {
    if !comparison.shadow_better {
        return false;
    }
    if shadow.max_drawdown > policy.max_dd_for_promo {
        return false;
    }
    if shadow.stability_score < policy.min_stability {
        return false;
    }
    comparison.delta_win_rate >= policy.min_win_rate_lift || comparison.delta_sharpe_like >= policy.min_sharpe_lift
}

pub fn check_rollback(window: &PerformanceWindow, rules: &RollbackRuleSet) -> RollbackDecision {
    if window.samples < rules.min_samples {
        return RollbackDecision { needed: false, severity: None, reason: "INSUFFICIENT_SAMPLES".to_string() };
    }

    let dd_bad = window.max_drawdown > rules.max_drawdown_ceil;
    let win_rate_bad = window.win_rate < rules.win_rate_floor;
    let stability_bad = window.stability_score < rules.min_stability;
    let streak_bad = window.current_losing_streak >= rules.max_consecutive_losses;

    if streak_bad && (dd_bad || win_rate_bad) {
        return RollbackDecision {
            needed: true,
            severity: Some(RollbackSeverity::Critical),
            reason: format!(
                "STREAK_KILLER: {} consecutive losses with max_drawdown={:.3} win_rate={:.3}",
                window.current_losing_streak, window.max_drawdown, window.win_rate
            ),
        };
    }

    if dd_bad && stability_bad && win_rate_bad {
        return RollbackDecision {
            needed: true,
            severity: Some(RollbackSeverity::Critical),
            reason: format!(
                "CAPITAL_INSTABILITY: max_drawdown={:.3} stability={:.3} win_rate={:.3}",
                window.max_drawdown, window.stability_score, window.win_rate
            ),
        };
    }

    if dd_bad || win_rate_bad || stability_bad || streak_bad {
        return RollbackDecision {
            needed: false,
            severity: Some(RollbackSeverity::Warning),
            reason: "one or more performance indicators breached their threshold".to_string(),
        };
    }

    RollbackDecision { needed: false, severity: None, reason: "NOMINAL".to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::{Horizon, Symbol};

    fn outcome(minutes_ago: i64, result: Direction, return_pct: f64) -> TradeOutcome {
        TradeOutcome {
            timestamp: Utc::now() - Duration::minutes(minutes_ago),
            horizon: Horizon::H1,
            symbol: Symbol::new("BTCUSDT"),
            return_pct,
            result,
            model_id: "model-a".to_string(),
            is_shadow: false,
        }
    }

    #[test]
    fn streak_killer_fires_on_consecutive_losses_and_breached_floor() {
        let mut outcomes: Vec<TradeOutcome> = (0..40).map(|i| outcome(i * 60, Direction::Win, 0.01)).collect();
        for i in 0..8 {
            outcomes.push(outcome(i, Direction::Loss, -0.05));
        }
        let window = compute_window(&outcomes, 30, Utc::now());
        let rules = RollbackRuleSet { max_consecutive_losses: 6, win_rate_floor: 0.9, ..RollbackRuleSet::default() };

        let decision = check_rollback(&window, &rules);
        assert!(decision.needed);
        assert_eq!(decision.severity, Some(RollbackSeverity::Critical));
        assert!(decision.reason.starts_with("STREAK_KILLER"));
    }

    #[test]
    fn insufficient_samples_short_circuits_rollback_check() {
        let outcomes = vec![outcome(0, Direction::Loss, -0.1)];
        let window = compute_window(&outcomes, 30, Utc::now());
        let decision = check_rollback(&window, &RollbackRuleSet::default());
        assert!(!decision.needed);
        assert_eq!(decision.reason, "INSUFFICIENT_SAMPLES");
    }

    #[test]
    fn shadow_with_better_win_rate_and_no_drawdown_regression_is_better() {
        let active = PerformanceWindow { samples: 500, win_rate: 0.50, max_drawdown: 0.20, sharpe_like: 0.8, stability_score: 0.6, ..PerformanceWindow::empty(30) };
        let shadow = PerformanceWindow { samples: 200, win_rate: 0.56, max_drawdown: 0.18, sharpe_like: 0.9, stability_score: 0.7, ..PerformanceWindow::empty(30) };

        let comparison = compare(&active, &shadow, &ComparisonPolicy { min_samples: 30 });
        assert!(comparison.shadow_better);
        assert_eq!(comparison.confidence, Some(ConfidenceLevel::High));
    }
}
