use std::collections::HashMap;

use core_types::{IndicatorValue, RegimeLabel, RegimeType};

const REQUIRED_IDS: [&str; 2] = ["trend_slope_20", "volatility_20"];

/// Market-wide aggregates derived from the indicator snapshot, independent
/// of any single indicator's raw scale.
#[derive(Debug, Clone, Copy)]
pub struct RegimeAggregates {
    pub stress: f64,
    pub order_book_pressure: f64,
    pub position_crowding: f64,
    pub normalized_volatility: f64,
    pub liquidation_cascade: bool,
}

fn get(indicators: &HashMap<String, IndicatorValue>, id: &str) -> Option<f64> {
    indicators.get(id).map(|v| v.value)
}

/// Derive the small set of cross-cutting aggregates the classifier and
/// downstream consumers read instead of the raw indicator map.
pub fn compute_aggregates(indicators: &HashMap<String, IndicatorValue>) -> RegimeAggregates {
    let volatility = get(indicators, "volatility_20").unwrap_or(0.0);
    let liquidation_pressure = get(indicators, "liquidation_pressure").unwrap_or(0.0);
    let funding_extremity = get(indicators, "funding_extremity").unwrap_or(0.0);
    let oi_to_volume = get(indicators, "oi_to_volume_ratio").unwrap_or(0.0);
    let order_book_pressure = get(indicators, "book_imbalance").unwrap_or(0.0);

    let stress = (volatility.abs() * 10.0 + liquidation_pressure + funding_extremity * 5.0).min(1.0);
    let position_crowding = (funding_extremity * 10.0 + oi_to_volume).min(1.0);
    let normalized_volatility = (volatility.abs() * 20.0).min(1.0);
    let liquidation_cascade = liquidation_pressure > 0.05
        || get(indicators, "liquidation_long_short_ratio").map(|v| v.abs() > 0.8).unwrap_or(false);

    RegimeAggregates {
        stress,
        order_book_pressure,
        position_crowding,
        normalized_volatility,
        liquidation_cascade,
    }
}

/// Closed-set rule-based classifier. Each regime accumulates a score from
/// independent threshold checks; the highest-scoring regime wins, and
/// confidence is a function of how far that score sits above the runner-up.
pub fn classify(indicators: &HashMap<String, IndicatorValue>) -> RegimeLabel {
    if REQUIRED_IDS.iter().any(|id| !indicators.contains_key(*id)) {
        return RegimeLabel::neutral();
    }

    let trend = get(indicators, "trend_slope_20").unwrap_or(0.0);
    let aggregates = compute_aggregates(indicators);

    let mut scores: Vec<(RegimeType, f64)> = vec![
        (RegimeType::TrendingUp, 0.0),
        (RegimeType::TrendingDown, 0.0),
        (RegimeType::Range, 0.0),
        (RegimeType::Chaotic, 0.0),
        (RegimeType::Transition, 0.0),
        (RegimeType::Crisis, 0.0),
        (RegimeType::Accumulation, 0.0),
    ];

    if aggregates.liquidation_cascade && aggregates.stress > 0.5 {
        scores[5].1 += 60.0;
    }
    if aggregates.normalized_volatility > 0.6 {
        scores[3].1 += 40.0;
    }
    if trend > 0.01 && aggregates.normalized_volatility < 0.4 {
        scores[0].1 += 45.0;
    }
    if trend < -0.01 && aggregates.normalized_volatility < 0.4 {
        scores[1].1 += 45.0;
    }
    if trend.abs() <= 0.003 && aggregates.normalized_volatility < 0.15 && aggregates.position_crowding < 0.3 {
        scores[6].1 += 35.0;
    }
    if trend.abs() <= 0.01 && aggregates.normalized_volatility < 0.5 {
        scores[2].1 += 25.0;
    }
    if aggregates.stress > 0.3 && aggregates.stress <= 0.5 {
        scores[4].1 += 20.0;
    }

    scores.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    let (winner, top_score) = scores[0];
    let runner_up = scores.get(1).map(|s| s.1).unwrap_or(0.0);

    if top_score <= 0.0 {
        return RegimeLabel::neutral();
    }

    let margin = (top_score - runner_up) / top_score.max(1.0);
    let confidence = (0.3 + margin * 0.65).clamp(0.3, 0.95);

    RegimeLabel {
        regime_type: winner,
        confidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::IndicatorCategory;

    fn indicator_map(pairs: &[(&str, f64)]) -> HashMap<String, IndicatorValue> {
        pairs
            .iter()
            .map(|(id, v)| (id.to_string(), IndicatorValue::new(*id, IndicatorCategory::Momentum, *v)))
            .collect()
    }

    #[test]
    fn missing_required_indicators_yields_neutral() {
        let indicators = indicator_map(&[("rsi_14", 55.0)]);
        let label = classify(&indicators);
        assert_eq!(label.regime_type, RegimeType::Neutral);
        assert_eq!(label.confidence, 0.5);
    }

    #[test]
    fn strong_uptrend_low_volatility_classifies_trending_up() {
        let indicators = indicator_map(&[("trend_slope_20", 0.02), ("volatility_20", 0.005)]);
        let label = classify(&indicators);
        assert_eq!(label.regime_type, RegimeType::TrendingUp);
        assert!(label.confidence >= 0.3 && label.confidence <= 0.95);
    }

    #[test]
    fn high_volatility_classifies_chaotic() {
        let indicators = indicator_map(&[("trend_slope_20", 0.0), ("volatility_20", 0.08)]);
        let label = classify(&indicators);
        assert_eq!(label.regime_type, RegimeType::Chaotic);
    }
}
